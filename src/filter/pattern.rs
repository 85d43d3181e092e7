use regex::Regex;
use std::fmt;

/// A case-insensitive wildcard pattern: `*` matches any run of characters (including none),
/// `?` matches exactly one character, everything else matches literally.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 8);
        expr.push_str("(?is)^");
        let mut literal = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut literal))),
            }
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> WildcardPattern {
        WildcardPattern::compile(p).unwrap()
    }

    #[test]
    fn test_star_matches_any_run() {
        let p = pattern("*spotify*");
        assert!(p.matches("Spotify.exe"));
        assert!(p.matches("SpotifyAB.SpotifyMusic_zpdnekdrzrea0!Spotify"));
        assert!(p.matches("spotify"));
        assert!(!p.matches("chrome.exe"));
    }

    #[test]
    fn test_question_mark_matches_single_character() {
        let p = pattern("song ?");
        assert!(p.matches("Song 1"));
        assert!(!p.matches("Song 12"));
        assert!(!p.matches("Song "));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(pattern("FOOBAR").matches("foobar"));
        assert!(pattern("ärzte").matches("ÄRZTE"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = pattern("AC/DC (Live) [1991] +.$");
        assert!(p.matches("ac/dc (live) [1991] +.$"));
        assert!(!p.matches("ac/dc (live) [1991] +x$"));
    }

    #[test]
    fn test_anchored_match() {
        let p = pattern("vlc");
        assert!(p.matches("VLC"));
        assert!(!p.matches("vlc.exe"));
    }
}
