//! WebSocket transport for native hosts.
//!
//! The socket is split into a writer task, fed through an unbounded channel
//! so `Transport::send` never blocks, and a reader task that forwards text
//! frames as `TransportEvent`s.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::TransportError;
use crate::transport::{ReadyState, Transport, TransportEvent};

/// Messages sent to the writer task
enum WriteCommand {
    Text(String),
    Pong(bytes::Bytes),
    Close,
}

/// `Transport` over a tokio-tungstenite connection.
pub struct WsTransport {
    commands: mpsc::UnboundedSender<WriteCommand>,
    state: Arc<watch::Sender<ReadyState>>,
}

impl WsTransport {
    /// Connect and spawn the reader and writer tasks.
    ///
    /// Returns the transport plus the receiver for inbound events.
    pub async fn connect(
        url: &Url,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        info!(url = %url, "connecting to relay");
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        info!("connected to relay");

        let (write, read) = ws_stream.split();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(watch::Sender::new(ReadyState::Open));

        tokio::spawn(run_writer(write, command_rx, state.clone()));
        tokio::spawn(run_reader(read, event_tx, command_tx.clone(), state.clone()));

        Ok((
            Self {
                commands: command_tx,
                state,
            },
            event_rx,
        ))
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ReadyState> {
        self.state.subscribe()
    }
}

impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.commands
            .send(WriteCommand::Text(text))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.state.send_replace(ReadyState::Closing);
        if self.commands.send(WriteCommand::Close).is_err() {
            self.state.send_replace(ReadyState::Closed);
        }
    }
}

async fn run_reader<S>(
    mut read: S,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    command_tx: mpsc::UnboundedSender<WriteCommand>,
    state: Arc<watch::Sender<ReadyState>>,
) where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                trace!(len = text.len(), "frame received");
                if event_tx
                    .send(TransportEvent::Message(text.as_str().to_owned()))
                    .is_err()
                {
                    debug!("event receiver dropped, stopping reader");
                    break;
                }
            }
            Ok(Message::Ping(data)) => {
                if command_tx.send(WriteCommand::Pong(data)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "relay closed connection");
                break;
            }
            Ok(_) => {
                // Ignore binary, pong, etc.
            }
            Err(e) => {
                warn!(error = %e, "relay reader error");
                break;
            }
        }
    }
    state.send_replace(ReadyState::Closed);
    let _ = event_tx.send(TransportEvent::Closed);
}

async fn run_writer<S>(
    mut write: S,
    mut command_rx: mpsc::UnboundedReceiver<WriteCommand>,
    state: Arc<watch::Sender<ReadyState>>,
) where
    S: SinkExt<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(command) = command_rx.recv().await {
        let result = match command {
            WriteCommand::Text(text) => write.send(Message::Text(text.into())).await,
            WriteCommand::Pong(data) => write.send(Message::Pong(data)).await,
            WriteCommand::Close => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "close frame not sent");
                }
                break;
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write frame");
            break;
        }
    }
    state.send_replace(ReadyState::Closed);
}
