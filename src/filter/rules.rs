use log::{debug, warn};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

use crate::filter::pattern::WildcardPattern;

/// Rule set used when the rule source is absent, empty or has no valid rule
pub const DEFAULT_RULES: &str = "\
# Now-playing filter rules
#
# One rule per line: <field>:<pattern>
#   field   app, title, artist or album
#   pattern case-insensitive, * matches any run of characters, ? matches one character
#
# A track is shown when any rule matches. Lines starting with # are ignored.

app:*spotify*
";

/// Track field a rule is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FilterField {
    App,
    Title,
    Artist,
    Album,
}

/// The fields of a candidate track
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub app_id: &'a str,
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
}

impl<'a> Candidate<'a> {
    fn field(&self, field: FilterField) -> &'a str {
        match field {
            FilterField::App => self.app_id,
            FilterField::Title => self.title,
            FilterField::Artist => self.artist,
            FilterField::Album => self.album,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub field: FilterField,
    pub pattern: WildcardPattern,
}

impl FilterRule {
    pub fn matches(&self, candidate: &Candidate<'_>) -> bool {
        self.pattern.matches(candidate.field(self.field))
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.pattern)
    }
}

impl FromStr for FilterRule {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (field, pattern) = line
            .split_once(':')
            .ok_or_else(|| "expected <field>:<pattern>".to_string())?;
        let field = FilterField::from_str(field.trim()).map_err(|_| format!("unknown field '{}'", field.trim()))?;
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err("empty pattern".to_string());
        }
        let pattern = WildcardPattern::compile(pattern).map_err(|e| e.to_string())?;
        Ok(FilterRule { field, pattern })
    }
}

/// An ordered list of rules with OR semantics
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRuleSet {
    rules: Vec<FilterRule>,
    is_default: bool,
}

impl FilterRuleSet {
    /// Parse rule text. Comments, blank lines and malformed lines are skipped; if nothing
    /// valid remains the default rule set is returned instead.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<FilterRule>() {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Ignoring filter rule on line {}: '{}' ({})", number + 1, line, e),
            }
        }

        if rules.is_empty() {
            debug!("No valid filter rules, using the default rule set");
            return Self::default();
        }
        Self { rules, is_default: false }
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether this is the fallback set rather than one read from a rule source
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn allows(&self, candidate: &Candidate<'_>) -> bool {
        self.rules.iter().any(|rule| rule.matches(candidate))
    }
}

impl Default for FilterRuleSet {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.parse::<FilterRule>().ok())
            .collect();
        Self { rules, is_default: true }
    }
}
