//! Transport: one persistent connection to a provider hub.
//!
//! The [`Transport`] owns a [`Provider`](crate::provider::Provider), keeps it
//! connected for as long as it runs, sends the subscription invocation on every
//! connect, and routes each inbound hub frame to the handlers registered for its
//! `(hub, method)` pair.
//!
//! ```rust,no_run
//! use racecontrol::providers::SignalRProvider;
//! use racecontrol::transport::{HubSubscription, Transport};
//! use racecontrol::TransportConfig;
//! use serde_json::json;
//!
//! # async fn demo() {
//! let subscription = HubSubscription::new(
//!     "https://livetiming.formula1.com",
//!     "Streaming",
//!     vec![json!(["TrackStatus"])],
//! );
//! let mut transport = Transport::new(
//!     subscription,
//!     Box::new(SignalRProvider::new()),
//!     TransportConfig::default(),
//! );
//! transport.add_handler("Streaming", "feed", |args| println!("{args:?}"));
//!
//! let handle = transport.handle();
//! tokio::spawn(transport.run("Subscribe"));
//! // ...
//! handle.stop();
//! # }
//! ```

mod client;
mod frame;
mod subscription;

pub use client::{FrameHandler, Transport, TransportHandle};
pub use frame::{HubFrame, HubInvocation, decode};
pub use subscription::{HubSubscription, ProtocolVersion};
