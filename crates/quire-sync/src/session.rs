//! Per-connection sync state machine.
//!
//! A `SyncSession` exists from the moment a document is loaded and its
//! transport is handed over. It tracks two baselines: the text last sent to
//! peers and the text last reconstructed from them. Local edits are diffed
//! against the former, remote diffs are replayed against the latter.
//!
//! ```text
//!  local edit ──► encode(last_sent, current) ──► transport.send(json)
//!                                                     │
//!                                                  (relay)
//!                                                     ▼
//!  store.set_text ◄── apply(last_applied, diffs) ◄── on_message(json)
//! ```

use quire_editor_core::DocumentStore;
use tracing::{debug, trace, warn};

use crate::diff::{self, Diff};
use crate::envelope::{SenderId, SyncEnvelope};
use crate::error::{SyncError, TransportError};
use crate::transport::{SessionIdentity, Transport};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Open,
    /// Terminal. Every event is a no-op.
    Closed,
}

/// Result of a local-edit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Text matches the last-sent baseline, nothing to send.
    Unchanged,
    /// Diff sent; baselines advanced.
    Sent { segments: usize },
    /// Session is closed.
    Closed,
}

/// Why an inbound envelope was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// We sent it.
    SelfEcho,
    /// Addressed to another document.
    WrongDocument,
    /// Operation is not `Update`.
    NotUpdate,
    /// No diff segments, or none that insert or delete.
    EmptyDiff,
    /// Session is closed.
    Closed,
}

/// Result of an envelope-received event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Ignored(IgnoreReason),
    /// Remote diff applied to the store.
    Applied { version: u64 },
}

/// Sync state for one open document.
pub struct SyncSession<T: Transport> {
    identity: SessionIdentity,
    transport: T,
    phase: SessionPhase,
    last_sent: String,
    last_applied: String,
    version: u64,
}

impl<T: Transport> SyncSession<T> {
    /// Start a session for a freshly loaded document.
    ///
    /// Both baselines start as the store's current text.
    pub fn open<D: DocumentStore + ?Sized>(
        identity: SessionIdentity,
        transport: T,
        store: &D,
    ) -> Self {
        let text = store.text();
        debug!(
            doc_id = identity.document_id,
            sender_id = %identity.sender_id,
            len = text.len(),
            "sync session opened"
        );
        Self {
            identity,
            transport,
            phase: SessionPhase::Open,
            last_sent: text.clone(),
            last_applied: text,
            version: 1,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn document_id(&self) -> i64 {
        self.identity.document_id
    }

    pub fn sender_id(&self) -> SenderId {
        self.identity.sender_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == SessionPhase::Open
    }

    /// Count of remote updates applied, starting at 1.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_sent(&self) -> &str {
        &self.last_sent
    }

    pub fn last_applied(&self) -> &str {
        &self.last_applied
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Local-edit event: diff the store against the last-sent baseline and
    /// send it.
    ///
    /// If the transport is not open the baseline stays put, so the next edit
    /// re-diffs from the same point.
    pub fn on_local_edit<D: DocumentStore + ?Sized>(
        &mut self,
        store: &D,
    ) -> Result<SendOutcome, SyncError> {
        if !self.is_open() {
            return Ok(SendOutcome::Closed);
        }

        let current = store.text();
        let diffs = diff::encode(&self.last_sent, &current);
        if !diffs.has_changes() {
            return Ok(SendOutcome::Unchanged);
        }

        if !self.transport.is_open() {
            debug!(
                doc_id = self.identity.document_id,
                state = ?self.transport.ready_state(),
                "transport not open, holding local edit"
            );
            return Err(SyncError::TransportUnavailable(TransportError::NotOpen));
        }

        let segments = diffs.len();
        let envelope = SyncEnvelope::update(&self.identity, diffs);
        let json = envelope
            .to_json()
            .map_err(|e| SyncError::Encode(e.to_string()))?;
        self.transport
            .send(json)
            .map_err(SyncError::TransportUnavailable)?;

        trace!(doc_id = self.identity.document_id, segments, "sent local edit");
        self.last_sent = current.clone();
        self.last_applied = current;
        Ok(SendOutcome::Sent { segments })
    }

    /// Envelope-received event, from a raw JSON frame.
    pub fn on_message<D: DocumentStore + ?Sized>(
        &mut self,
        json: &str,
        store: &mut D,
    ) -> Result<ReceiveOutcome, SyncError> {
        if !self.is_open() {
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::Closed));
        }
        let envelope = SyncEnvelope::from_json(json)?;
        self.on_envelope(&envelope, store)
    }

    /// Envelope-received event.
    ///
    /// On success the store gets the reconstructed text with the cursor
    /// preserved and both baselines move to it. A diff that does not fit
    /// the baseline is dropped and returned as `MalformedDiff`.
    pub fn on_envelope<D: DocumentStore + ?Sized>(
        &mut self,
        envelope: &SyncEnvelope,
        store: &mut D,
    ) -> Result<ReceiveOutcome, SyncError> {
        if let Some(reason) = self.ignore_reason(envelope) {
            trace!(
                doc_id = self.identity.document_id,
                ?reason,
                "ignoring envelope"
            );
            return Ok(ReceiveOutcome::Ignored(reason));
        }
        let Some(diffs) = envelope.diff() else {
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::EmptyDiff));
        };

        let reconstructed = diff::apply(&self.last_applied, diffs.segments())?;
        if !diffs.has_changes() {
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::EmptyDiff));
        }
        self.check_coverage(diffs);

        store.set_text(&reconstructed, true);
        self.last_sent = reconstructed.clone();
        self.last_applied = reconstructed;
        self.version += 1;

        debug!(
            doc_id = self.identity.document_id,
            from = %envelope.sender_id,
            version = self.version,
            segments = diffs.len(),
            "applied remote update"
        );
        Ok(ReceiveOutcome::Applied {
            version: self.version,
        })
    }

    /// Close event. Idempotent.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.transport.close();
        self.phase = SessionPhase::Closed;
        debug!(doc_id = self.identity.document_id, "sync session closed");
    }

    fn ignore_reason(&self, envelope: &SyncEnvelope) -> Option<IgnoreReason> {
        if !self.is_open() {
            Some(IgnoreReason::Closed)
        } else if envelope.sender_id == self.identity.sender_id {
            Some(IgnoreReason::SelfEcho)
        } else if envelope.document_id != self.identity.document_id {
            Some(IgnoreReason::WrongDocument)
        } else if !envelope.is_update() {
            Some(IgnoreReason::NotUpdate)
        } else if envelope.diff().is_none() {
            Some(IgnoreReason::EmptyDiff)
        } else {
            None
        }
    }

    /// Warn when the sender's baseline was shorter than ours.
    fn check_coverage(&self, diffs: &Diff) {
        let covered = diffs.source_len();
        let baseline = self.last_applied.chars().count();
        if covered < baseline {
            warn!(
                doc_id = self.identity.document_id,
                covered,
                baseline,
                "remote diff does not cover local baseline, documents may have diverged"
            );
        }
    }
}

impl<T: Transport> Drop for SyncSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
