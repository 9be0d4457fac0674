//! Live SignalR provider
//!
//! Speaks the classic ASP.NET SignalR protocol used by the timing providers:
//! an HTTP `negotiate` call hands out a connection token, the websocket is opened
//! on `<path>/connect`, and the subscription is a hub invocation sent as text.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::provider::Provider;
use crate::transport::{HubInvocation, HubSubscription};
use crate::{RaceControlError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Reply to the negotiate request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NegotiateResponse {
    connection_token: String,
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    protocol_version: Option<String>,
}

/// Provider backed by a live SignalR websocket.
pub struct SignalRProvider {
    http: reqwest::Client,
    socket: Option<WsStream>,
    next_invocation_id: u64,
}

impl SignalRProvider {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new(), socket: None, next_invocation_id: 0 }
    }

    /// Negotiate a connection token. Returns the token and the cookies the
    /// server set, which must accompany the websocket upgrade.
    async fn negotiate(&self, subscription: &HubSubscription) -> Result<(NegotiateResponse, Option<String>)> {
        let url = negotiate_url(subscription)?;
        debug!("Negotiating at {}", url);

        let response = self.http.get(url.clone()).send().await?.error_for_status()?;

        let cookies: Vec<&str> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect();
        let cookie = (!cookies.is_empty()).then(|| cookies.join("; "));

        let negotiated: NegotiateResponse = response
            .json()
            .await
            .map_err(|e| RaceControlError::negotiate(url.as_str(), e.to_string()))?;

        info!(
            connection_id = negotiated.connection_id.as_deref().unwrap_or("-"),
            protocol = negotiated.protocol_version.as_deref().unwrap_or("-"),
            "Negotiated SignalR connection"
        );

        Ok((negotiated, cookie))
    }
}

impl Default for SignalRProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// `<base>/negotiate?clientProtocol=..&connectionData=..`
pub(crate) fn negotiate_url(subscription: &HubSubscription) -> Result<Url> {
    let mut url = subscription.base_url()?;
    push_segment(&mut url, "negotiate")?;
    url.query_pairs_mut()
        .append_pair("clientProtocol", &subscription.protocol_version().to_string())
        .append_pair("connectionData", &subscription.connection_data());
    Ok(url)
}

/// `ws(s)://<host><path>/connect?transport=webSockets&..`
pub(crate) fn connect_url(subscription: &HubSubscription, token: &str) -> Result<Url> {
    let mut url = subscription.base_url()?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| RaceControlError::parse("endpoint url", format!("cannot use scheme {scheme}")))?;
    push_segment(&mut url, "connect")?;
    url.query_pairs_mut()
        .append_pair("transport", "webSockets")
        .append_pair("clientProtocol", &subscription.protocol_version().to_string())
        .append_pair("connectionToken", token)
        .append_pair("connectionData", &subscription.connection_data());
    Ok(url)
}

fn push_segment(url: &mut Url, segment: &str) -> Result<()> {
    url.path_segments_mut()
        .map_err(|_| RaceControlError::parse("endpoint url", "endpoint cannot be a base url"))?
        .pop_if_empty()
        .push(segment);
    Ok(())
}

#[async_trait::async_trait]
impl Provider for SignalRProvider {
    async fn connect(&mut self, subscription: &HubSubscription, method: &str) -> Result<()> {
        self.close().await;

        let (negotiated, cookie) = self.negotiate(subscription).await?;
        let url = connect_url(subscription, &negotiated.connection_token)?;

        let mut request = url.as_str().into_client_request()?;
        if let Some(cookie) = cookie {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| RaceControlError::transport_with_source("invalid cookie header", Box::new(e)))?;
            request.headers_mut().insert(COOKIE, value);
        }

        let (mut socket, response) = connect_async(request).await?;
        info!("Connected to {} ({})", subscription.endpoint, response.status());

        self.next_invocation_id += 1;
        let invocation = HubInvocation {
            hub: subscription.hub.clone(),
            method: method.to_string(),
            args: subscription.args.clone(),
            id: self.next_invocation_id,
        };
        socket.send(Message::Text(invocation.to_json()?)).await?;
        debug!(hub = %subscription.hub, method, "Subscription invoked");

        self.socket = Some(socket);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(RaceControlError::transport("not connected"));
        };

        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => warn!("Dropping non UTF-8 binary message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed the socket: {:?}", frame);
                    self.socket = None;
                    return Ok(None);
                }
                Some(Ok(_)) => trace!("Control message"),
                Some(Err(e)) => {
                    self.socket = None;
                    return Err(e.into());
                }
                None => {
                    self.socket = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            debug!("Closing websocket");
            socket.close(None).await.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ProtocolVersion;
    use serde_json::json;

    #[test]
    fn negotiate_url_for_default_path() {
        let sub = HubSubscription::new("https://livetiming.formula1.com", "Streaming", vec![]);
        let url = negotiate_url(&sub).unwrap();
        assert_eq!(url.path(), "/signalr/negotiate");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("clientProtocol".into(), "1.5".into())));
        assert!(query.contains(&("connectionData".into(), r#"[{"name":"Streaming"}]"#.into())));
    }

    #[test]
    fn connect_url_switches_to_websocket_scheme() {
        let sub = HubSubscription::new("https://ltss.fiaformula3.com", "streaming", vec![json!("F3")])
            .with_path("/streaming")
            .with_protocol(ProtocolVersion::new(2, 1));
        let url = connect_url(&sub, "tok/en+1").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/streaming/connect");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("transport".into(), "webSockets".into())));
        assert!(query.contains(&("connectionToken".into(), "tok/en+1".into())));
        assert!(query.contains(&("clientProtocol".into(), "2.1".into())));
    }

    #[test]
    fn plain_http_maps_to_ws() {
        let sub = HubSubscription::new("http://127.0.0.1:8080", "Streaming", vec![]);
        assert_eq!(connect_url(&sub, "t").unwrap().scheme(), "ws");
    }

    #[test]
    fn negotiate_response_shape() {
        let body = r#"{"Url":"/signalr","ConnectionToken":"abc","ConnectionId":"id-1","ProtocolVersion":"1.5","TryWebSockets":true}"#;
        let parsed: NegotiateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.connection_token, "abc");
        assert_eq!(parsed.connection_id.as_deref(), Some("id-1"));
    }

    #[tokio::test]
    async fn next_frame_without_connection_is_a_transport_error() {
        let mut provider = SignalRProvider::new();
        assert!(matches!(provider.next_frame().await, Err(RaceControlError::Transport { .. })));
    }
}
