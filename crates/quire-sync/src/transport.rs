//! Transport seam between a sync session and the network.
//!
//! The session only needs to know whether the channel is open, to push a
//! text frame, and to close it. Inbound frames are fed to the session by
//! whoever owns the receiving half.

use smol_str::SmolStr;
use tokio::sync::mpsc;
use url::Url;

use crate::envelope::SenderId;
use crate::error::TransportError;

/// Path the relay server accepts socket connections on.
pub const SOCKET_PATH: &str = "/ws/markdown";

/// Connection state, mirroring the browser WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events a transport delivers to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound text frame.
    Message(String),
    /// The connection went away.
    Closed,
}

/// Bidirectional message channel used by `SyncSession`.
pub trait Transport {
    fn ready_state(&self) -> ReadyState;

    /// Send one text frame. Fire-and-forget: success means queued.
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    fn close(&mut self);

    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }
}

/// Who this session is: the document it edits and its echo id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub document_name: SmolStr,
    pub document_id: i64,
    pub sender_id: SenderId,
}

impl SessionIdentity {
    /// Identity for `document_id` with a freshly drawn sender id.
    pub fn new(document_name: impl Into<SmolStr>, document_id: i64) -> Self {
        Self {
            document_name: document_name.into(),
            document_id,
            sender_id: SenderId::random(),
        }
    }

    /// Socket URL for this session on the server at `base`.
    ///
    /// `http` maps to `ws` and `https` to `wss`.
    pub fn connect_url(&self, base: &Url) -> Result<Url, TransportError> {
        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            _ => return Err(TransportError::InvalidUrl(base.to_string())),
        };
        let mut url = base
            .join(SOCKET_PATH)
            .map_err(|_| TransportError::InvalidUrl(base.to_string()))?;
        url.set_scheme(scheme)
            .map_err(|_| TransportError::InvalidUrl(base.to_string()))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("DocName", &self.document_name)
            .append_pair("DocId", &self.document_id.to_string())
            .append_pair("RandomId", &self.sender_id.to_string());
        Ok(url)
    }
}

/// In-process transport backed by an unbounded channel.
///
/// The receiving half gets every frame sent while the transport is open.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
    state: ReadyState,
}

impl ChannelTransport {
    /// Open transport plus the receiver its frames arrive on.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                state: ReadyState::Open,
            },
            rx,
        )
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.state = state;
    }
}

impl Transport for ChannelTransport {
    fn ready_state(&self) -> ReadyState {
        if self.state == ReadyState::Open && self.tx.is_closed() {
            return ReadyState::Closed;
        }
        self.state
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.tx.send(text).map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        self.state = ReadyState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_url_mirrors_scheme() {
        let identity = SessionIdentity {
            document_name: "my notes".into(),
            document_id: 12,
            sender_id: SenderId(777),
        };

        let url = identity
            .connect_url(&Url::parse("http://localhost:8080/docs/12").unwrap())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8080/ws/markdown?DocName=my+notes&DocId=12&RandomId=777"
        );

        let url = identity
            .connect_url(&Url::parse("https://quire.example").unwrap())
            .unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), SOCKET_PATH);
    }

    #[test]
    fn test_connect_url_rejects_other_schemes() {
        let identity = SessionIdentity::new("x", 1);
        let result = identity.connect_url(&Url::parse("ftp://host").unwrap());
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_channel_transport_send_and_close() {
        let (mut transport, mut rx) = ChannelTransport::pair();
        assert!(transport.is_open());
        transport.send("one".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "one");

        transport.close();
        assert_eq!(transport.ready_state(), ReadyState::Closed);
        assert!(matches!(
            transport.send("two".into()),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn test_channel_transport_dropped_receiver() {
        let (transport, rx) = ChannelTransport::pair();
        drop(rx);
        assert_eq!(transport.ready_state(), ReadyState::Closed);
    }
}
