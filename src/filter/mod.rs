// Allow-list filtering of tracks before they are published

pub mod engine;
pub mod pattern;
pub mod rules;

pub use engine::{FilterEngine, ReloadOutcome};
pub use pattern::WildcardPattern;
pub use rules::{Candidate, FilterField, FilterRule, FilterRuleSet, DEFAULT_RULES};
