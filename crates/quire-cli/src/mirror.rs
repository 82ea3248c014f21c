//! Live session driver: keeps a local file and a relay room in step.

use std::path::PathBuf;
use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use quire_editor_core::DocumentStore;
use quire_sync::persist::{DocumentClient, PersistError};
use quire_sync::{
    EditorHost, ReceiveOutcome, SendOutcome, SessionIdentity, Transport, TransportEvent,
    WsTransport,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::file_doc::FileDocument;

pub struct MirrorOptions {
    pub file: PathBuf,
    pub identity: SessionIdentity,
    pub server: Url,
    pub poll_interval: Duration,
    /// Start from the file as it is instead of the stored document.
    pub local_only: bool,
}

/// Counts reported when the session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStats {
    pub sent: usize,
    pub applied: usize,
    pub warnings: usize,
}

/// Mirror until ctrl-c or the relay closes the connection.
pub async fn run(options: MirrorOptions) -> Result<MirrorStats> {
    let MirrorOptions {
        file,
        identity,
        server,
        poll_interval,
        local_only,
    } = options;

    let mut document = FileDocument::open(&file).await.into_diagnostic()?;
    if !local_only {
        pull_initial(&server, identity.document_id, &mut document).await?;
    }
    let initial = document.text();

    let url = identity.connect_url(&server).into_diagnostic()?;
    let (transport, mut events) = WsTransport::connect(&url).await.into_diagnostic()?;

    let mut host = EditorHost::new(document);
    host.open_document(identity, &initial, transport);
    info!(path = %file.display(), "mirroring file, ctrl-c to stop");

    let mut stats = MirrorStats::default();
    let mut tick = tokio::time::interval(poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => send_local_edit(&mut host, &mut stats).await,
            event = events.recv() => match event {
                Some(TransportEvent::Message(frame)) => {
                    apply_remote(&mut host, &frame, &mut stats).await;
                }
                Some(TransportEvent::Closed) | None => {
                    warn!("relay closed the connection");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
        stats.warnings += host.drain_warnings().len();
    }

    let mut document = host.into_store();
    document.flush().await.into_diagnostic()?;
    Ok(stats)
}

/// Send whatever changed in the file since the last check.
async fn send_local_edit<T: Transport>(
    host: &mut EditorHost<FileDocument, T>,
    stats: &mut MirrorStats,
) {
    match host.store_mut().refresh().await {
        Ok(true) => send_pending(host, stats),
        Ok(false) => {}
        Err(e) => warn!(path = %host.store().path().display(), error = %e, "could not read file"),
    }
}

fn send_pending<T: Transport>(host: &mut EditorHost<FileDocument, T>, stats: &mut MirrorStats) {
    if let Some(SendOutcome::Sent { segments }) = host.local_change() {
        debug!(segments, "local edit sent");
        stats.sent += 1;
    }
}

/// Apply a relay frame and write the result to the file.
///
/// Local edits saved since the last tick go out first so the remote update
/// cannot overwrite them unsent.
async fn apply_remote<T: Transport>(
    host: &mut EditorHost<FileDocument, T>,
    frame: &str,
    stats: &mut MirrorStats,
) {
    send_local_edit(host, stats).await;
    let Some(ReceiveOutcome::Applied { version }) = host.receive(frame) else {
        return;
    };
    stats.applied += 1;
    match host.store_mut().flush().await {
        Ok(true) => debug!(version, "remote update written"),
        // edited while the update was applied: keep the file, send the edit
        Ok(false) => send_pending(host, stats),
        Err(e) => warn!(path = %host.store().path().display(), error = %e, "could not write file"),
    }
}

/// Replace the file with the stored document so both ends share a baseline.
async fn pull_initial(server: &Url, doc_id: i64, document: &mut FileDocument) -> Result<()> {
    match DocumentClient::new(server.clone()).fetch(doc_id).await {
        Ok(record) => {
            info!(doc_id, version = record.version, "loaded stored document");
            document.set_text(&record.markdown, false);
            document.flush().await.into_diagnostic()?;
            Ok(())
        }
        Err(PersistError::NotFound) => {
            info!(doc_id, "no stored document, starting from the file");
            Ok(())
        }
        Err(e) => Err(e).into_diagnostic(),
    }
}
