//! Hub subscription settings

use serde_json::Value;
use std::fmt;
use url::Url;

use crate::Result;

/// SignalR client protocol version sent during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::new(1, 5)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Everything the transport needs to reach a hub and subscribe to it.
#[derive(Debug, Clone, PartialEq)]
pub struct HubSubscription {
    /// Base URL of the provider, e.g. `https://livetiming.formula1.com`.
    pub endpoint: String,
    /// Hub name used in `connectionData` and in the subscription invocation.
    pub hub: String,
    /// Argument list of the subscription invocation, sent as-is.
    pub args: Vec<Value>,
    pub protocol: Option<ProtocolVersion>,
    /// Replaces the default `/signalr` path.
    pub path: Option<String>,
}

impl HubSubscription {
    pub const DEFAULT_PATH: &'static str = "/signalr";

    pub fn new(endpoint: impl Into<String>, hub: impl Into<String>, args: Vec<Value>) -> Self {
        Self { endpoint: endpoint.into(), hub: hub.into(), args, protocol: None, path: None }
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol.unwrap_or_default()
    }

    /// Endpoint with the hub path applied.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        let path = self.path.as_deref().unwrap_or(Self::DEFAULT_PATH);
        url.set_path(path);
        Ok(url)
    }

    /// `connectionData` query value: `[{"name":"<hub>"}]`.
    pub fn connection_data(&self) -> String {
        serde_json::json!([{ "name": self.hub }]).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_path_and_protocol() {
        let sub = HubSubscription::new("https://livetiming.formula1.com", "Streaming", vec![]);
        assert_eq!(sub.base_url().unwrap().as_str(), "https://livetiming.formula1.com/signalr");
        assert_eq!(sub.protocol_version().to_string(), "1.5");
    }

    #[test]
    fn path_override() {
        let sub = HubSubscription::new("https://ltss.fiaformula2.com", "streaming", vec![json!("F2")])
            .with_path("/streaming")
            .with_protocol(ProtocolVersion::new(2, 1));
        assert_eq!(sub.base_url().unwrap().as_str(), "https://ltss.fiaformula2.com/streaming");
        assert_eq!(sub.protocol_version().to_string(), "2.1");
        assert_eq!(sub.connection_data(), r#"[{"name":"streaming"}]"#);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let sub = HubSubscription::new("not a url", "Streaming", vec![]);
        assert!(sub.base_url().is_err());
    }
}
