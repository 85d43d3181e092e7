use deunicode::deunicode;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum Jaro-Winkler similarity between the queried and the returned title
pub const MATCH_THRESHOLD: f64 = 0.85;

/// Maximum number of genres kept per lookup
pub const MAX_GENRES: usize = 5;

/// Number of search candidates requested per lookup
const SEARCH_LIMIT: usize = 5;

/// Release year and genres found for a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub year: Option<i32>,
    pub genres: Vec<String>,
}

impl TrackMetadata {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.genres.is_empty()
    }

    /// Combine a release-group result with a recording result, field by field,
    /// preferring the release group
    pub fn merge(release_group: Option<TrackMetadata>, recording: Option<TrackMetadata>) -> TrackMetadata {
        let release_group = release_group.unwrap_or_default();
        let recording = recording.unwrap_or_default();
        TrackMetadata {
            year: release_group.year.or(recording.year),
            genres: if release_group.genres.is_empty() { recording.genres } else { release_group.genres },
        }
    }
}

/// Lower-case, ASCII-folded form with runs of whitespace collapsed to one space
pub fn normalize_text(value: &str) -> String {
    deunicode(value)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a name for fuzzy comparison: ASCII only, no punctuation, no spaces,
/// and without the filler words "the" and "and"
pub fn normalize_for_comparison(name: &str) -> String {
    let ascii_name = deunicode(name);

    let mut cleaned = String::with_capacity(ascii_name.len());
    for c in ascii_name.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            cleaned.push(c.to_ascii_lowercase());
        }
    }

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let filtered: Vec<&str> = words.iter().copied().filter(|w| *w != "the" && *w != "and").collect();

    if filtered.is_empty() {
        words.concat()
    } else {
        filtered.concat()
    }
}

/// Split an artist credit that might name several artists
pub fn split_artist(artist_name: &str) -> Vec<String> {
    const WORD_SEPARATORS: [&str; 6] = [" feat. ", " feat ", " ft. ", " featuring ", " x ", " with "];

    let mut credit = artist_name.to_string();
    let lowered = credit.to_lowercase();
    for separator in WORD_SEPARATORS {
        // Separators are ASCII so byte offsets in the lowered copy line up with the original
        if let Some(pos) = lowered.find(separator).filter(|_| lowered.len() == credit.len()) {
            let (head, tail) = credit.split_at(pos);
            credit = format!("{},{}", head, &tail[separator.len()..]);
            return split_on_characters(&credit);
        }
    }

    split_on_characters(&credit)
}

fn split_on_characters(credit: &str) -> Vec<String> {
    let artists: Vec<String> = credit
        .split([',', '&', ';', '/'])
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    debug!("Split artist '{}' into: {:?}", credit, artists);
    if artists.is_empty() {
        vec![credit.trim().to_string()]
    } else {
        artists
    }
}

/// The first credited artist, normalized
pub fn primary_artist(artist_name: &str) -> String {
    split_artist(artist_name)
        .into_iter()
        .next()
        .map(|a| normalize_text(&a))
        .unwrap_or_default()
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn search_path(entity: &str, query: &str) -> String {
    format!(
        "{}?query={}&fmt=json&limit={}",
        entity,
        urlencoding::encode(query),
        SEARCH_LIMIT
    )
}

/// Relative search path (below the web service root) for the album's release group
pub fn release_group_search_path(artist: &str, album: &str) -> String {
    let mut query = format!("releasegroup:{}", quote(album));
    if !artist.is_empty() {
        query.push_str(&format!(" AND artist:{}", quote(artist)));
    }
    search_path("release-group", &query)
}

/// Relative search path (below the web service root) for the recording
pub fn recording_search_path(title: &str, artist: &str) -> String {
    let mut query = format!("recording:{}", quote(title));
    if !artist.is_empty() {
        query.push_str(&format!(" AND artist:{}", quote(artist)));
    }
    search_path("recording", &query)
}

fn parse_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(0..4)).and_then(|y| y.parse::<i32>().ok()).filter(|y| *y > 0)
}

/// Genre names from a candidate, most votes first. Uses `genres` when present, else `tags`.
fn parse_genres(candidate: &Value) -> Vec<String> {
    let list = ["genres", "tags"]
        .iter()
        .filter_map(|field| candidate.get(*field).and_then(|v| v.as_array()))
        .find(|list| !list.is_empty());

    let Some(list) = list else {
        return Vec::new();
    };

    let mut entries: Vec<(i64, String)> = list
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?.trim().to_lowercase();
            let count = entry.get("count").and_then(|c| c.as_i64()).unwrap_or(0);
            (!name.is_empty()).then_some((count, name))
        })
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let mut genres: Vec<String> = Vec::new();
    for (_, name) in entries {
        if !genres.contains(&name) {
            genres.push(name);
        }
        if genres.len() == MAX_GENRES {
            break;
        }
    }
    genres
}

fn best_candidate<'a>(candidates: &'a [Value], wanted: &str) -> Option<&'a Value> {
    let wanted = normalize_for_comparison(wanted);
    candidates.iter().find(|candidate| {
        let title = candidate.get("title").and_then(|t| t.as_str()).unwrap_or_default();
        let similarity = strsim::jaro_winkler(&wanted, &normalize_for_comparison(title));
        debug!("Candidate '{}' similarity {:.3}", title, similarity);
        similarity >= MATCH_THRESHOLD
    })
}

/// Pick the best matching release group from a search response
pub fn parse_release_group_search(response: &Value, album: &str) -> Option<TrackMetadata> {
    let candidates = response.get("release-groups")?.as_array()?;
    let candidate = best_candidate(candidates, album)?;

    let metadata = TrackMetadata {
        year: parse_year(candidate.get("first-release-date").and_then(|d| d.as_str())),
        genres: parse_genres(candidate),
    };
    (!metadata.is_empty()).then_some(metadata)
}

/// Pick the best matching recording from a search response
pub fn parse_recording_search(response: &Value, title: &str) -> Option<TrackMetadata> {
    let candidates = response.get("recordings")?.as_array()?;
    let candidate = best_candidate(candidates, title)?;

    let year = parse_year(candidate.get("first-release-date").and_then(|d| d.as_str())).or_else(|| {
        candidate
            .get("releases")
            .and_then(|r| r.as_array())
            .into_iter()
            .flatten()
            .filter_map(|release| parse_year(release.get("date").and_then(|d| d.as_str())))
            .min()
    });

    let metadata = TrackMetadata { year, genres: parse_genres(candidate) };
    (!metadata.is_empty()).then_some(metadata)
}
