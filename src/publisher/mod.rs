// Snapshot building and the two publication backends

pub mod assets;
pub mod builder;
pub mod file_sink;
pub mod memory_sink;
pub mod sink;

pub use assets::{Asset, AssetStore};
pub use builder::NowPlayingPublisher;
pub use file_sink::FileSink;
pub use memory_sink::{MemorySink, Published};
pub use sink::{PublishError, SnapshotSink};
