//! Editor host: owns the document store and at most one sync session.
//!
//! Opening a document tears down whatever session was active before. Errors
//! from the session are recoverable by construction, so the host logs them
//! and keeps them as warnings for the UI rather than propagating them.

use quire_editor_core::DocumentStore;
use tracing::warn;

use crate::error::SyncError;
use crate::session::{ReceiveOutcome, SendOutcome, SyncSession};
use crate::transport::{SessionIdentity, Transport};

/// A recoverable sync problem surfaced to the user.
#[derive(Debug)]
pub struct SyncWarning {
    pub document_id: i64,
    pub error: SyncError,
}

/// Owner of the editor document and its sync session.
pub struct EditorHost<D: DocumentStore, T: Transport> {
    store: D,
    session: Option<SyncSession<T>>,
    warnings: Vec<SyncWarning>,
}

impl<D: DocumentStore, T: Transport> EditorHost<D, T> {
    pub fn new(store: D) -> Self {
        Self {
            store,
            session: None,
            warnings: Vec::new(),
        }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Mutable access for local editing. Call `local_change` afterwards.
    pub fn store_mut(&mut self) -> &mut D {
        &mut self.store
    }

    pub fn session(&self) -> Option<&SyncSession<T>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut SyncSession<T>> {
        self.session.as_mut()
    }

    /// Load `content` and start a session for it, closing any previous one.
    pub fn open_document(&mut self, identity: SessionIdentity, content: &str, transport: T) {
        self.close();
        self.store.set_text(content, false);
        self.session = Some(SyncSession::open(identity, transport, &self.store));
    }

    /// Local-edit event.
    pub fn local_change(&mut self) -> Option<SendOutcome> {
        let session = self.session.as_mut()?;
        match session.on_local_edit(&self.store) {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                warn!(doc_id = session.document_id(), error = %error, "local edit not sent");
                self.warnings.push(SyncWarning {
                    document_id: session.document_id(),
                    error,
                });
                None
            }
        }
    }

    /// Inbound frame event.
    pub fn receive(&mut self, json: &str) -> Option<ReceiveOutcome> {
        let session = self.session.as_mut()?;
        match session.on_message(json, &mut self.store) {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                warn!(doc_id = session.document_id(), error = %error, "remote update dropped");
                self.warnings.push(SyncWarning {
                    document_id: session.document_id(),
                    error,
                });
                None
            }
        }
    }

    /// Take the warnings collected since the last call.
    pub fn drain_warnings(&mut self) -> Vec<SyncWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Close and drop the active session.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Give back the store, closing the session.
    pub fn into_store(mut self) -> D {
        self.close();
        self.store
    }
}
