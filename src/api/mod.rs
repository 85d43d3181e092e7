// HTTP gateway for serving mode
pub use crate::constants::API_PREFIX;

pub mod cors;
pub mod overlay;
pub mod relay;
pub mod server;

pub use overlay::GatewayState;
pub use relay::MetadataRelay;
pub use server::{build_rocket, start_rocket_server};
