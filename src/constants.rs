// Names and defaults shared between the publisher, the gateway and the client

/// Prefix for all API routes
pub const API_PREFIX: &str = "/api";

/// Name of the metadata relay below the API prefix
pub const RELAY_NAME: &str = "musicbrainz";

/// Default upstream of the metadata relay
pub const RELAY_UPSTREAM: &str = "https://musicbrainz.org/ws/2/";

/// Snapshot document file name (durable mode) and route (serving mode)
pub const SNAPSHOT_FILE: &str = "nowplaying.json";

/// Cover blob file name (durable mode) and route (serving mode)
pub const COVER_FILE: &str = "cover.jpg";

/// Filter rules file name inside the output directory
pub const FILTER_FILE: &str = "filter.txt";

/// Lock file guarding the output directory against a second instance
pub const LOCK_FILE: &str = ".nowplaying.lock";

pub const DEFAULT_OUTPUT_DIR: &str = "nowplaying";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9863;

/// Identifying header value sent to the metadata service
pub fn user_agent() -> String {
    format!("nowplaying-overlay/{}", env!("CARGO_PKG_VERSION"))
}
