//! Diff-based collaborative text sync.
//!
//! This crate provides:
//! - `diff` - char-level diff encoder and applier
//! - `SyncEnvelope` - the JSON message exchanged between peers
//! - `SyncSession` - per-connection state machine over a `Transport`
//! - `EditorHost` - owner of the document store and its active session
//! - `persist` - document load/save API types (and HTTP client with `native`)
//!
//! With the `native` feature a tokio-tungstenite `WsTransport` is available.

pub mod diff;
pub mod envelope;
pub mod error;
pub mod host;
pub mod persist;
pub mod session;
pub mod transport;
#[cfg(feature = "native")]
pub mod ws;

pub use diff::{Diff, DiffSegment, MAX_EDIT_DISTANCE, apply, encode};
pub use envelope::{Operation, SenderId, SyncEnvelope};
pub use error::{MalformedDiff, SyncError, TransportError};
pub use host::{EditorHost, SyncWarning};
pub use session::{IgnoreReason, ReceiveOutcome, SendOutcome, SessionPhase, SyncSession};
pub use transport::{ChannelTransport, ReadyState, SessionIdentity, Transport, TransportEvent};
#[cfg(feature = "native")]
pub use ws::WsTransport;
