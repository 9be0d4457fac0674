//! Provider trait for upstream frame sources

use crate::Result;
use crate::transport::HubSubscription;

/// Trait for upstream frame sources
///
/// Providers abstract over where raw hub frames come from (a live SignalR
/// websocket, a recorded capture) so the transport loop stays the same for
/// both. A provider holds at most one connection at a time; the transport
/// decides when to (re)connect.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Open a connection and send the subscription invocation
    ///
    /// Returns once `method(subscription.args)` has been sent. Any previous
    /// connection is discarded.
    async fn connect(&mut self, subscription: &HubSubscription, method: &str) -> Result<()>;

    /// Get the next raw text message
    ///
    /// Returns:
    /// - `Ok(Some(text))` - Message received
    /// - `Ok(None)` - Connection closed by the remote end
    /// - `Err(e)` - Connection failed
    async fn next_frame(&mut self) -> Result<Option<String>>;

    /// Close the current connection, if any
    async fn close(&mut self);
}

#[async_trait::async_trait]
impl Provider for Box<dyn Provider> {
    async fn connect(&mut self, subscription: &HubSubscription, method: &str) -> Result<()> {
        (**self).connect(subscription, method).await
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        (**self).next_frame().await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
