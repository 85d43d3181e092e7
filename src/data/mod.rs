// Data structures shared by the publisher, the gateway and the overlay client

pub mod cover;
pub mod playback_status;
pub mod snapshot;
pub mod track;

// Re-export types from child modules
pub use cover::*;
pub use playback_status::*;
pub use snapshot::*;
pub use track::*;
