//! Concrete frame sources

pub mod replay;
pub mod signalr;

pub use replay::{ReplayFeed, ReplayProvider};
pub use signalr::SignalRProvider;
