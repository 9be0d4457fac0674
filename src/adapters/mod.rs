//! Provider protocol adapters
//!
//! An adapter owns one [`Transport`](crate::transport::Transport), registers the
//! handlers for its provider's feed topology, and turns provider frames into
//! [`AdapterEvent`]s. Events go to a single [`EventSink`] owned by whoever started
//! the adapter, normally the [`Scheduler`](crate::scheduler::Scheduler).
//!
//! | Category | Adapter | Feeds |
//! |---|---|---|
//! | `f1` | [`Formula1Adapter`] | `Streaming.feed`, multiplexed track status and race control |
//! | `f2`, `f3` | [`FiaAdapter`] | `Streaming.timefeed`, `Streaming.trackfeed`, `Streaming.sessionfeed` |
//!
//! Parsing runs synchronously on the connection task. A malformed payload is logged
//! and dropped; it never ends the receive loop.

use std::sync::Arc;

use crate::arbiter::FlagView;
use crate::config::TransportConfig;
use crate::provider::Provider;
use crate::{AdapterState, Category, FlagData, Result, Session};

mod fia;
mod formula1;
pub mod race_control;
mod registry;
mod runtime;
pub mod track_status;

pub use fia::{FiaAdapter, FiaParser, parse_session_clock};
pub use formula1::{Formula1Adapter, Formula1Parser};
pub use registry::resolve;

/// Signal emitted by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    FlagParsed(FlagData),
    SessionFinished,
}

/// Single subscriber for adapter events. Invoked inline on the connection task.
pub type EventSink = Arc<dyn Fn(AdapterEvent) + Send + Sync>;

/// Everything an adapter needs from its owner.
#[derive(Clone)]
pub struct AdapterContext {
    pub events: EventSink,
    /// Stored flag, read by parsers whose rules depend on it.
    pub flags: FlagView,
    /// Base URL of the provider.
    pub endpoint: String,
    pub transport: TransportConfig,
}

/// A provider-specific protocol translator.
#[async_trait::async_trait]
pub trait Adapter: Send {
    fn category(&self) -> Category;

    fn state(&self) -> AdapterState;

    /// Connect through `provider` and subscribe for `session`.
    ///
    /// Returns once the subscription request has been sent. If that does not happen
    /// within the start timeout a `Timeout` error is returned while the connection
    /// keeps retrying in the background.
    async fn start(&mut self, session: &Session, provider: Box<dyn Provider>) -> Result<()>;

    /// Close the connection and wait for the connection task to end. Idempotent.
    async fn stop(&mut self);
}
