use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::BoxError;

/// Capacity of each direction of a [`Link`].
pub const LINK_CAPACITY: usize = 64;

/// A text-message link to the coordinator.
///
/// Background tasks own the socket; the client only sees two channels.
/// Dropping the link closes both channels, which stops those tasks.
#[derive(Debug)]
pub struct Link {
    // Channel to send messages to background writer task
    tx: mpsc::Sender<String>,
    // Channel to receive messages from background reader task
    rx: mpsc::Receiver<String>,
}

impl Link {
    pub fn new(tx: mpsc::Sender<String>, rx: mpsc::Receiver<String>) -> Self {
        Self { tx, rx }
    }

    /// Two connected in-memory ends.
    pub fn pair(capacity: usize) -> (Link, Link) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (Link::new(a_tx, a_rx), Link::new(b_tx, b_rx))
    }

    /// Queue a message without waiting. Fails when the queue is full or
    /// the writer has gone away.
    pub fn try_send(&self, text: String) -> Result<(), BoxError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BoxError::Other("link queue full".into()),
            mpsc::error::TrySendError::Closed(_) => BoxError::ChannelClosed,
        })
    }

    pub async fn send(&self, text: String) -> Result<(), BoxError> {
        Ok(self.tx.send(text).await?)
    }

    /// Next inbound message; `None` once the transport has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Next inbound message if one is already queued.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Whether the remote end has stopped reading.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Endpoint ─────────────────────────────────────────────────────

/// Where the coordinator lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// WebSocket URL, with the `EIO` and `transport` query parameters
    /// added when the configured path lacks them.
    pub fn url(&self) -> String {
        let mut path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        for (key, value) in [("EIO", "4"), ("transport", "websocket")] {
            let has_key = path
                .split_once('?')
                .map(|(_, q)| q.split('&').any(|kv| kv.split('=').next() == Some(key)))
                .unwrap_or(false);
            if !has_key {
                let sep = if path.contains('?') {
                    if path.ends_with('?') || path.ends_with('&') { "" } else { "&" }
                } else {
                    "?"
                };
                path.push_str(sep);
                path.push_str(key);
                path.push('=');
                path.push_str(value);
            }
        }
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Connector ────────────────────────────────────────────────────

/// Opens transport links. The stream client owns one and calls it on
/// every (re)connect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, BoxError>;
}

/// Connector over a plain `ws://` WebSocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, BoxError> {
        let url = endpoint.url();
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!(%url, "websocket established");
        let (mut net_writer, mut net_reader) = stream.split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<String>(LINK_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel::<String>(LINK_CAPACITY);

        // Writer task: User -> Network
        tokio::spawn(async move {
            while let Some(text) = network_rx.recv().await {
                if let Err(e) = net_writer.send(Message::Text(text)).await {
                    warn!("websocket write error: {e}");
                    break;
                }
            }
            let _ = net_writer.close().await;
        });

        // Reader task: Network -> User
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        if network_tx.send(text).await.is_err() {
                            // user_rx was dropped, stop reading
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by peer");
                        break;
                    }
                    Ok(Message::Binary(bytes)) => {
                        debug!(len = bytes.len(), "ignoring binary websocket message");
                    }
                    // Ping/Pong are answered inside tungstenite.
                    Ok(_) => {}
                    Err(e) => {
                        warn!("websocket read error: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Link::new(user_tx, user_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_appends_transport() {
        let ep = Endpoint::new("192.168.0.112", 3000, "/socket.io/?EIO=4");
        assert_eq!(
            ep.url(),
            "ws://192.168.0.112:3000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn url_fills_missing_query() {
        let ep = Endpoint::new("coord", 80, "socket.io/");
        assert_eq!(ep.url(), "ws://coord:80/socket.io/?EIO=4&transport=websocket");
    }

    #[test]
    fn url_keeps_explicit_params() {
        let ep = Endpoint::new("h", 1, "/socket.io/?transport=websocket&EIO=4");
        assert_eq!(ep.url(), "ws://h:1/socket.io/?transport=websocket&EIO=4");
    }

    #[tokio::test]
    async fn pair_delivers_both_ways() {
        let (mut a, mut b) = Link::pair(4);
        a.send("40".into()).await.unwrap();
        b.try_send("0{}".into()).unwrap();
        assert_eq!(b.recv().await.as_deref(), Some("40"));
        assert_eq!(a.recv().await.as_deref(), Some("0{}"));
    }

    #[tokio::test]
    async fn dropping_one_end_closes_the_other() {
        let (mut a, b) = Link::pair(4);
        drop(b);
        assert!(a.is_closed());
        assert!(a.recv().await.is_none());
        assert!(matches!(a.try_send("x".into()), Err(BoxError::ChannelClosed)));
    }

    #[tokio::test]
    async fn ws_connector_reports_refused() {
        // Port 9 on localhost is almost never listening.
        let ep = Endpoint::new("127.0.0.1", 9, "/socket.io/");
        let err = WsConnector.connect(&ep).await.unwrap_err();
        assert!(err.is_transport());
    }
}
