//! Connection seam between the transport session and the actual network.
//!
//! The session run loop only sees the [`Connector`]/[`WireConnection`]
//! traits; production uses the tokio-tungstenite implementation, tests use
//! scripted mocks.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use url::Url;

use client_core::{ChatError, ChatErrorCategory, ConversationId};

/// One live bidirectional text connection.
#[async_trait]
pub trait WireConnection: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: &str) -> Result<(), ChatError>;

    /// Next inbound text frame; `None` when the peer closed the stream.
    async fn next_text(&mut self) -> Option<Result<String, ChatError>>;

    /// Release the underlying connection.
    async fn close(&mut self);
}

/// Opens connections to a conversation's event channel.
///
/// An `Auth`-category error means the handshake itself was rejected and the
/// caller must not retry; every other error is a transport-level failure.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn WireConnection>, ChatError>;
}

/// Derive the per-conversation connection target:
/// `{base}/ws/{conversation}?token={credential}`.
///
/// The credential travels as a connection-establishment parameter only and
/// is never renegotiated mid-session.
pub fn endpoint_url(
    base: &Url,
    conversation: &ConversationId,
    credential: &str,
) -> Result<Url, ChatError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| {
            ChatError::new(
                ChatErrorCategory::Usage,
                "invalid_base_url",
                format!("base url '{base}' cannot carry path segments"),
            )
        })?
        .pop_if_empty()
        .push("ws")
        .push(conversation.as_str());
    url.query_pairs_mut().append_pair("token", credential);
    Ok(url)
}

/// tokio-tungstenite backed [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn WireConnection>, ChatError> {
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(map_handshake_error)?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WireConnection for WsConnection {
    async fn send_text(&mut self, text: &str) -> Result<(), ChatError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| ChatError::transport_drop(format!("websocket send failed: {err}")))
    }

    async fn next_text(&mut self) -> Option<Result<String, ChatError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
                Some(Ok(Message::Close(_))) | None => return None,
                // Ping/pong are answered by tungstenite; binary frames are
                // not part of the live event protocol.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return Some(Err(ChatError::transport_drop(format!(
                        "websocket receive failed: {err}"
                    ))));
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Split handshake rejection (terminal) from transport failure (retried).
fn map_handshake_error(err: tungstenite::Error) -> ChatError {
    match err {
        tungstenite::Error::Http(response)
            if response.status() == 401 || response.status() == 403 =>
        {
            ChatError::auth_rejected(format!(
                "handshake rejected with status {}",
                response.status()
            ))
        }
        other => ChatError::transport_drop(format!("websocket connect failed: {other}")),
    }
}
