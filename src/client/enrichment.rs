use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use log::{debug, warn};
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use thiserror::Error;

use crate::helpers::attributecache::AttributeCache;
use crate::helpers::http_client::{HttpClient, HttpClientError};
use crate::helpers::musicbrainz::{
    normalize_text, parse_recording_search, parse_release_group_search, primary_artist, recording_search_path,
    release_group_search_path, TrackMetadata,
};

/// How long a successful lookup is reused
pub const ENRICHMENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const MEMORY_CAPACITY: u64 = 1_000;
const DURABLE_PREFIX: &str = "enrichment";

/// Normalized (title, primary artist, album)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnrichmentKey {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl EnrichmentKey {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: normalize_text(title),
            artist: primary_artist(artist),
            album: normalize_text(album),
        }
    }

    fn durable_key(&self) -> String {
        format!("{}::{}", DURABLE_PREFIX, self)
    }
}

impl fmt::Display for EnrichmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.title, self.artist, self.album)
    }
}

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Metadata lookups failed: {0}")]
    Lookup(#[from] HttpClientError),

    /// One search failed. The other one's result is shown but never cached.
    #[error("Metadata lookup incomplete: {source}")]
    Partial {
        metadata: TrackMetadata,
        source: HttpClientError,
    },
}

#[derive(Debug, Clone)]
struct CachedMetadata {
    metadata: TrackMetadata,
    expires_at: Instant,
}

/// Memory entries live until the deadline they carry, so a durable hit keeps only its remaining lifetime
struct UntilDeadline;

impl Expiry<EnrichmentKey, CachedMetadata> for UntilDeadline {
    fn expire_after_create(&self, _key: &EnrichmentKey, value: &CachedMetadata, created_at: Instant) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &EnrichmentKey,
        value: &CachedMetadata,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(updated_at))
    }
}

/// Release year and genre lookups with a two-tier cache.
///
/// Identical concurrent lookups share one in-flight request. Failed lookups are not cached.
pub struct Enricher {
    memory: Cache<EnrichmentKey, CachedMetadata>,
    durable: Option<Arc<AttributeCache>>,
    client: Arc<dyn HttpClient>,
    relay_base: Option<String>,
    direct_base: String,
    ttl: Duration,
}

fn with_slash(base: &str) -> String {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

impl Enricher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        relay_base: Option<&str>,
        direct_base: &str,
        durable: Option<Arc<AttributeCache>>,
    ) -> Self {
        Self::with_ttl(client, relay_base, direct_base, durable, ENRICHMENT_TTL)
    }

    pub fn with_ttl(
        client: Arc<dyn HttpClient>,
        relay_base: Option<&str>,
        direct_base: &str,
        durable: Option<Arc<AttributeCache>>,
        ttl: Duration,
    ) -> Self {
        Self {
            memory: Cache::builder().max_capacity(MEMORY_CAPACITY).expire_after(UntilDeadline).build(),
            durable,
            client,
            relay_base: relay_base.map(with_slash),
            direct_base: with_slash(direct_base),
            ttl,
        }
    }

    /// Year and genres for a track. Any failure yields empty metadata.
    pub async fn lookup(&self, title: &str, artist: &str, album: &str) -> TrackMetadata {
        if title.trim().is_empty() {
            return TrackMetadata::default();
        }
        let key = EnrichmentKey::new(title, artist, album);
        match self.memory.try_get_with(key.clone(), self.load(&key)).await {
            Ok(cached) => cached.metadata,
            Err(e) => match e.as_ref() {
                EnrichmentError::Partial { metadata, source } => {
                    debug!("Partial enrichment for {}, not cached: {}", key, source);
                    metadata.clone()
                }
                EnrichmentError::Lookup(source) => {
                    debug!("No enrichment for {}: {}", key, source);
                    TrackMetadata::default()
                }
            },
        }
    }

    async fn load(&self, key: &EnrichmentKey) -> Result<CachedMetadata, EnrichmentError> {
        if let Some(durable) = &self.durable {
            match durable.get_with_expiry::<TrackMetadata>(&key.durable_key()) {
                Ok(Some((metadata, expires_at))) => {
                    debug!("Durable cache hit for {}", key);
                    return Ok(CachedMetadata {
                        metadata,
                        expires_at: self.remaining_deadline(expires_at),
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Durable enrichment cache unavailable: {}", e),
            }
        }

        let release_group = if key.album.is_empty() {
            Ok(None)
        } else {
            self.search(&release_group_search_path(&key.artist, &key.album))
                .await
                .map(|response| parse_release_group_search(&response, &key.album))
        };
        let recording = self
            .search(&recording_search_path(&key.title, &key.artist))
            .await
            .map(|response| parse_recording_search(&response, &key.title));

        let metadata = match (release_group, recording) {
            (Ok(release_group), Ok(recording)) => TrackMetadata::merge(release_group, recording),
            (Err(e), Err(_)) => return Err(e.into()),
            (Err(source), Ok(recording)) => {
                return Err(EnrichmentError::Partial { metadata: TrackMetadata::merge(None, recording), source })
            }
            (Ok(release_group), Err(source)) => {
                return Err(EnrichmentError::Partial { metadata: TrackMetadata::merge(release_group, None), source })
            }
        };
        let expires_at = Instant::now() + self.ttl;

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.set_with_ttl(&key.durable_key(), &metadata, self.ttl) {
                warn!("Could not store enrichment for {}: {}", key, e);
            }
        }
        debug!("Enriched {}: {:?}", key, metadata);
        Ok(CachedMetadata { metadata, expires_at })
    }

    /// Memory deadline for an entry read back from the durable tier
    fn remaining_deadline(&self, expires_at_ms: Option<i64>) -> Instant {
        let remaining = match expires_at_ms {
            Some(at) => Duration::from_millis((at - Utc::now().timestamp_millis()).max(0) as u64).min(self.ttl),
            None => self.ttl,
        };
        Instant::now() + remaining
    }

    /// Relay first, then the metadata service directly
    async fn search(&self, path: &str) -> Result<Value, HttpClientError> {
        if let Some(relay) = &self.relay_base {
            match self.client.get_json(&format!("{}{}", relay, path)).await {
                Ok(value) => return Ok(value),
                Err(e) => debug!("Relay lookup failed, going direct: {}", e),
            }
        }
        self.client.get_json(&format!("{}{}", self.direct_base, path)).await
    }

    pub fn invalidate_memory(&self) {
        self.memory.invalidate_all();
    }
}
