// Backend wiring: session adapter -> filter -> publisher -> sink

use std::sync::{Arc, Weak};
use log::{debug, info, warn};

use crate::filter::FilterEngine;
use crate::publisher::{NowPlayingPublisher, PublishError, SnapshotSink};
use crate::session::{MediaSessionSource, SessionAdapter, SessionError, SessionListener};

/// Owns the adapter and the publisher for one output location
pub struct NowPlayingService {
    adapter: Arc<SessionAdapter>,
    publisher: Arc<NowPlayingPublisher>,
    filter: Arc<FilterEngine>,
    watch_filter: bool,
}

impl NowPlayingService {
    pub fn new(source: Arc<dyn MediaSessionSource>, sink: Arc<dyn SnapshotSink>, filter: Arc<FilterEngine>) -> Self {
        let publisher = Arc::new(NowPlayingPublisher::new(sink, filter.clone()));
        Self {
            adapter: Arc::new(SessionAdapter::new(source)),
            publisher,
            filter,
            watch_filter: false,
        }
    }

    /// Republish the current session whenever the rule file changes
    pub fn with_filter_reload(mut self, enabled: bool) -> Self {
        self.watch_filter = enabled;
        self
    }

    /// Publish the startup document and attach to the session source
    pub fn start(&self) -> Result<(), SessionError> {
        if let Err(e) = self.publisher.publish_starting() {
            warn!("Failed to publish startup snapshot: {}", e);
        }

        let listener = Arc::downgrade(&self.publisher) as Weak<dyn SessionListener>;
        self.adapter.register_listener(listener);
        self.adapter.start()?;

        if self.watch_filter {
            let adapter = Arc::downgrade(&self.adapter);
            let watched = self.filter.watch_with(move |outcome| {
                debug!("Filter reload: {:?}", outcome);
                if let Some(adapter) = adapter.upgrade() {
                    adapter.refresh();
                }
            });
            if let Err(e) = watched {
                warn!("Filter hot reload unavailable: {}", e);
            }
        }

        info!("Now playing service started");
        Ok(())
    }

    pub fn publisher(&self) -> &Arc<NowPlayingPublisher> {
        &self.publisher
    }

    /// Recompute from the current session
    pub fn refresh(&self) {
        self.adapter.refresh();
    }

    /// Detach everything and publish the shutdown document
    pub fn stop(&self) -> Result<(), PublishError> {
        self.filter.unwatch();
        self.adapter.stop();
        info!("Now playing service stopped");
        self.publisher.publish_stopped()
    }
}
