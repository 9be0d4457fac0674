//! Adapter lifecycle states

use serde::{Deserialize, Serialize};

/// Runtime status of a protocol adapter and its connection.
///
/// The declaration order is the lifecycle order, so states compare with `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum AdapterState {
    Idle,
    Connecting,
    /// Subscription invocation has been sent.
    Subscribed,
    /// At least one hub frame arrived on the current connection.
    Receiving,
    /// The provider signalled the end of the session.
    Finished,
    Stopped,
}

impl AdapterState {
    /// Whether the subscription request has gone out on some connection.
    pub fn has_subscribed(self) -> bool {
        matches!(self, AdapterState::Subscribed | AdapterState::Receiving | AdapterState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_is_not_subscribed() {
        assert!(!AdapterState::Idle.has_subscribed());
        assert!(!AdapterState::Connecting.has_subscribed());
        assert!(AdapterState::Subscribed.has_subscribed());
        assert!(AdapterState::Receiving.has_subscribed());
        assert!(AdapterState::Finished.has_subscribed());
        assert!(!AdapterState::Stopped.has_subscribed());
    }
}
