// Media session contract, the adapter that serializes its notifications, and session sources

pub mod adapter;
#[cfg(windows)]
pub mod gsmtc;
pub mod manual;
pub mod source;

pub use adapter::{SessionAdapter, SessionListener, SessionReading};
#[cfg(windows)]
pub use gsmtc::GsmtcSessionSource;
pub use manual::{ManualSession, ManualSessionSource, SessionCommand, SessionEvent};
pub use source::{
    ChangeCallback, ChangeKind, MediaProperties, MediaSession, MediaSessionSource, SessionError, SubscriptionToken,
    TimelineReading,
};
