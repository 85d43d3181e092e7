/// Snapshot, track and cover data types
pub mod data;

/// Media session contract, adapter and session sources
pub mod session;

/// Allow-list filtering with hot-reloadable rules
pub mod filter;

/// Snapshot builder, sinks and overlay assets
pub mod publisher;

/// HTTP gateway for serving mode
pub mod api;

/// Overlay client state machine and its collaborators
pub mod client;

/// Helper utilities for I/O and other common tasks
pub mod helpers;

pub mod config;
pub mod constants;
pub mod logging;
pub mod service;

// Re-export the types most callers need
pub use data::{NowPlayingSnapshot, PlaybackStatus, TrackSnapshot};
pub use service::NowPlayingService;
