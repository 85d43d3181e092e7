use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use log::{debug, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::filter::rules::{Candidate, FilterRuleSet};

/// What a reload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Rules were read from the source
    Loaded,
    /// The source is absent (or has no valid rule), the default set is active
    Defaulted,
    /// The source could not be read, the previous set stays active
    KeptPrevious,
}

/// Decides whether a track may be published, against a rule set that can be replaced at runtime
pub struct FilterEngine {
    source: Option<PathBuf>,
    rules: RwLock<Arc<FilterRuleSet>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FilterEngine {
    /// Engine using only the bundled default rules
    pub fn with_defaults() -> Self {
        Self::with_rules(FilterRuleSet::default())
    }

    pub fn with_rules(rules: FilterRuleSet) -> Self {
        Self {
            source: None,
            rules: RwLock::new(Arc::new(rules)),
            watcher: Mutex::new(None),
        }
    }

    /// Engine backed by a rule file. The file is read immediately.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let engine = Self {
            source: Some(path.as_ref().to_path_buf()),
            rules: RwLock::new(Arc::new(FilterRuleSet::default())),
            watcher: Mutex::new(None),
        };
        engine.reload();
        engine
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Current rule set
    pub fn rules(&self) -> Arc<FilterRuleSet> {
        match self.rules.read() {
            Ok(rules) => rules.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, rules: FilterRuleSet) {
        let rules = Arc::new(rules);
        match self.rules.write() {
            Ok(mut current) => *current = rules,
            Err(poisoned) => *poisoned.into_inner() = rules,
        }
    }

    pub fn allows(&self, app_id: &str, title: &str, artist: &str, album: &str) -> bool {
        self.rules().allows(&Candidate { app_id, title, artist, album })
    }

    /// Re-read the rule source
    pub fn reload(&self) -> ReloadOutcome {
        let Some(path) = &self.source else {
            self.replace(FilterRuleSet::default());
            return ReloadOutcome::Defaulted;
        };

        match fs::read_to_string(path) {
            Ok(text) => {
                let rules = FilterRuleSet::parse(&text);
                let outcome = if rules.is_default() { ReloadOutcome::Defaulted } else { ReloadOutcome::Loaded };
                let suffix = if rules.is_default() { " (default)" } else { "" };
                info!("Loaded {} filter rule(s) from {:?}{}", rules.len(), path, suffix);
                self.replace(rules);
                outcome
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Filter rules {:?} not found, using the default rule set", path);
                self.replace(FilterRuleSet::default());
                ReloadOutcome::Defaulted
            }
            Err(e) => {
                // Typically a file caught mid-write; the next change event retries
                warn!("Could not read filter rules {:?}, keeping the previous rules: {}", path, e);
                ReloadOutcome::KeptPrevious
            }
        }
    }

    /// Reload the rules whenever the rule file changes. The parent directory is watched so
    /// that editors that replace the file by renaming are picked up as well.
    pub fn watch(self: &Arc<Self>) -> notify::Result<()> {
        self.watch_with(|_| {})
    }

    /// Like [`FilterEngine::watch`], calling `on_reload` after every reload it triggers
    pub fn watch_with<F>(self: &Arc<Self>, on_reload: F) -> notify::Result<()>
    where
        F: Fn(ReloadOutcome) + Send + 'static,
    {
        let Some(path) = self.source.clone() else {
            return Ok(());
        };
        let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
            return Ok(());
        };
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let engine: Weak<FilterEngine> = Arc::downgrade(self);
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Filter rule watcher error: {}", e);
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                return;
            }
            if !event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                return;
            }
            if let Some(engine) = engine.upgrade() {
                debug!("Filter rules changed ({:?}), reloading", event.kind);
                on_reload(engine.reload());
            }
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!("Watching {:?} for filter rule changes", path);

        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(watcher);
        }
        Ok(())
    }

    /// Stop watching the rule file
    pub fn unwatch(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            slot.take();
        }
    }
}
