//! Live telemetry WebSocket connection.
//!
//! A [`LiveStream`] is one physical connection to the backend's push
//! endpoint. It does not reconnect; the owning channel in `scadalink-core`
//! decides whether and when to open another one.
//!
//! # Example
//!
//! ```rust,ignore
//! use scadalink_api::websocket::{self, StreamEvent};
//!
//! let url = client.stream_url(&token)?;
//! let mut stream = websocket::connect(&url).await?;
//! while let StreamEvent::Text(text) = stream.next_event().await {
//!     println!("{text}");
//! }
//! ```

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

// ── StreamEvent ──────────────────────────────────────────────────────

/// What happened on the connection since the last call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text frame, unparsed.
    Text(String),
    /// The server closed the connection. `code` is `None` when the stream
    /// ended without a close frame.
    Closed { code: Option<u16>, reason: String },
    /// The connection broke with a protocol or I/O error.
    Failed(String),
}

// ── LiveStream ───────────────────────────────────────────────────────

/// An open connection to the live telemetry endpoint.
pub struct LiveStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream").finish_non_exhaustive()
    }
}

/// Open the live stream at `url` (which already carries the token).
///
/// A handshake refused with HTTP 401 or 403 is reported as
/// [`Error::Authentication`] so callers can tell it apart from network
/// trouble.
pub async fn connect(url: &Url) -> Result<LiveStream, Error> {
    let shown = redacted(url);
    tracing::info!(url = %shown, "connecting to live stream");

    match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((inner, _response)) => {
            tracing::info!(url = %shown, "live stream connected");
            Ok(LiveStream { inner })
        }
        Err(tungstenite::Error::Http(resp)) => {
            let status = resp.status().as_u16();
            if status == 401 || status == 403 {
                Err(Error::Authentication {
                    message: format!("stream handshake rejected (HTTP {status})"),
                })
            } else {
                Err(Error::WebSocketConnect(format!(
                    "stream handshake failed (HTTP {status})"
                )))
            }
        }
        Err(e) => Err(Error::WebSocketConnect(e.to_string())),
    }
}

impl LiveStream {
    /// Wait for the next meaningful event. Ping, pong and binary frames are
    /// skipped; tungstenite answers pings on its own.
    pub async fn next_event(&mut self) -> StreamEvent {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return StreamEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(cf) => (Some(u16::from(cf.code)), cf.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    tracing::info!(?code, %reason, "live stream closed by server");
                    return StreamEvent::Closed { code, reason };
                }
                Some(Ok(_)) => {
                    tracing::trace!("ignoring non-text frame");
                }
                Some(Err(e)) => return StreamEvent::Failed(e.to_string()),
                None => {
                    tracing::info!("live stream ended");
                    return StreamEvent::Closed {
                        code: None,
                        reason: String::new(),
                    };
                }
            }
        }
    }

    /// Close the connection with a normal close code. Errors are logged and
    /// swallowed: the peer may already be gone.
    pub async fn close(mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client shutdown".into(),
        };
        if let Err(e) = self.inner.close(Some(frame)).await {
            tracing::debug!(error = %e, "error while closing live stream");
        }
    }
}

/// The URL without its query string, safe to log.
fn redacted(url: &Url) -> Url {
    let mut clean = url.clone();
    clean.set_query(None);
    clean
}
