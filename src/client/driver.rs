use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use log::{debug, info};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::client::enrichment::Enricher;
use crate::client::feed::SnapshotFeed;
use crate::client::renderer::Renderer;
use crate::client::state_machine::OverlayClient;
use crate::data::TrackIdentity;
use crate::helpers::musicbrainz::TrackMetadata;

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Run the overlay client until `shutdown` flips to true.
///
/// Polls, timers and enrichment results are handled on this one task; only the enrichment
/// lookups themselves run concurrently.
pub async fn run_client<R: Renderer>(
    mut client: OverlayClient<R>,
    feed: Arc<dyn SnapshotFeed>,
    enricher: Option<Arc<Enricher>>,
    mut shutdown: watch::Receiver<bool>,
) -> OverlayClient<R> {
    let (results_tx, mut results) = mpsc::unbounded_channel::<(TrackIdentity, TrackMetadata)>();
    let mut poll = tokio::time::interval(client.config().poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Overlay client started, polling every {:?}", client.config().poll_interval);

    loop {
        let deadline = client.next_deadline();
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = poll.tick() => {
                if let Some(snapshot) = feed.fetch().await {
                    client.on_poll(snapshot, Instant::now(), Utc::now());
                }
            }
            _ = wait_until(deadline) => {
                client.on_tick(Instant::now(), Utc::now());
            }
            Some((identity, metadata)) = results.recv() => {
                client.on_enrichment(&identity, &metadata);
            }
        }

        for identity in client.take_enrichment_requests() {
            let Some(enricher) = enricher.clone() else { continue };
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let metadata = enricher.lookup(&identity.title, &identity.artist, &identity.album).await;
                if results_tx.send((identity, metadata)).is_err() {
                    debug!("Client stopped before enrichment finished");
                }
            });
        }
    }

    info!("Overlay client stopped");
    client
}
