//! HTTP and socket handlers.

use axum::Json;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::{Sink, SinkExt, StreamExt};
use quire_sync::persist::{
    DocumentRecord, ERRCODE_NOT_FOUND, ERRCODE_VERSION_CONFLICT, SaveRequest, SaveResponse,
};
use quire_sync::{Operation, SyncEnvelope};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::relay::{RelayOutcome, Room};
use quire_common::telemetry;

/// Query string of `/ws/markdown`.
#[derive(Debug, Deserialize)]
pub struct SocketParams {
    #[serde(rename = "DocName")]
    pub doc_name: Option<String>,
    #[serde(rename = "DocId")]
    pub doc_id: Option<String>,
    #[serde(rename = "RandomId")]
    pub random_id: Option<String>,
}

impl SocketParams {
    /// Document name and id, if both are usable.
    fn target(&self) -> Option<(&str, i64)> {
        let name = self.doc_name.as_deref().filter(|n| !n.is_empty())?;
        let id = self.doc_id.as_deref()?.parse::<i64>().ok().filter(|id| *id > 0)?;
        Some((name, id))
    }
}

/// `GET /ws/markdown`: join the document's relay room.
pub async fn ws_markdown(
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some((name, doc_id)) = params.target() else {
        debug!(?params, "socket request without document, redirecting");
        return (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response();
    };
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let name = name.to_owned();
    let client = params.random_id.clone().unwrap_or_default();
    upgrade.on_upgrade(move |socket| handle_socket(socket, state, doc_id, name, client))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    doc_id: i64,
    name: String,
    client: String,
) {
    let room = state
        .hub
        .join(doc_id, &name, || state.repo.markdown(doc_id));
    info!(doc_id, client = %client, connections = room.connections(), "socket joined");

    let (sender, mut receiver) = socket.split();
    let mut send_task = tokio::spawn(forward_frames(room.subscribe(), sender, doc_id));

    loop {
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            _ = &mut send_task => {
                debug!(doc_id, "forwarding stopped, closing socket");
                break;
            }
        };
        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(doc_id, error = %e, "socket read error");
                break;
            }
        };

        let envelope = match SyncEnvelope::from_json(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(doc_id, error = %e, "unparseable frame");
                continue;
            }
        };
        if envelope.operation == Operation::Ignore {
            break;
        }
        relay_frame(&room, &envelope).await;
    }

    send_task.abort();
    state.hub.leave(&room);
    info!(doc_id, client = %client, "socket left");
}

/// Push relayed frames to one socket until either side goes away.
///
/// A socket that falls behind has missed diffs and can no longer replay
/// later ones, so it is closed instead of skipped ahead.
async fn forward_frames<S>(mut frames: broadcast::Receiver<String>, mut sink: S, doc_id: i64)
where
    S: Sink<Message> + Unpin,
{
    loop {
        match frames.recv().await {
            Ok(frame) => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(doc_id, skipped, "socket fell behind relay, closing");
                metrics::counter!("quire_relay_lagged_total").increment(1);
                let close = CloseFrame {
                    code: close_code::AGAIN,
                    reason: "fell behind the relay".into(),
                };
                let _ = sink.send(Message::Close(Some(close))).await;
                break;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn relay_frame(room: &Room, envelope: &SyncEnvelope) {
    if !envelope.is_update() {
        trace!(doc_id = room.doc_id(), op = ?envelope.operation, "skipping non-update frame");
        return;
    }
    match room.apply_update(envelope).await {
        Ok(RelayOutcome::Broadcast { .. }) => {
            metrics::counter!("quire_relay_updates_total").increment(1);
        }
        Ok(RelayOutcome::Unchanged) => {}
        Ok(RelayOutcome::WrongDocument) => {
            metrics::counter!("quire_relay_rejected_total").increment(1);
            warn!(
                doc_id = room.doc_id(),
                envelope_doc_id = envelope.document_id,
                sender = %envelope.sender_id,
                "dropped update addressed to another document"
            );
        }
        Err(e) => {
            metrics::counter!("quire_relay_rejected_total").increment(1);
            warn!(doc_id = room.doc_id(), sender = %envelope.sender_id, error = %e, "dropped update");
        }
    }
}

/// `GET /api/documents/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
) -> Result<Json<DocumentRecord>, ApiError> {
    state
        .repo
        .get(doc_id)
        .map(Json)
        .ok_or(ApiError::NotFound(doc_id))
}

/// `POST /api/documents/{id}`
pub async fn save_document(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
    Json(request): Json<SaveRequest>,
) -> (StatusCode, Json<SaveResponse>) {
    let reply = state.repo.save(doc_id, &request);
    let status = match reply.errcode {
        ERRCODE_VERSION_CONFLICT => StatusCode::CONFLICT,
        ERRCODE_NOT_FOUND => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (status, Json(reply))
}

/// Prometheus metrics endpoint
pub async fn render_metrics() -> String {
    telemetry::render()
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    rooms: usize,
    connections: usize,
    documents: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        rooms: state.hub.room_count(),
        connections: state.hub.connection_count(),
        documents: state.repo.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayHub;
    use quire_sync::{SenderId, SessionIdentity, encode};

    fn update(old: &str, new: &str) -> SyncEnvelope {
        let identity = SessionIdentity {
            document_name: "doc".into(),
            document_id: 1,
            sender_id: SenderId(9),
        };
        SyncEnvelope::update(&identity, encode(old, new))
    }

    #[tokio::test]
    async fn test_lagging_socket_is_closed() {
        let hub = RelayHub::new(1);
        let room = hub.join(1, "doc", || Some("a".into()));
        let frames = room.subscribe();

        room.apply_update(&update("a", "ab")).await.unwrap();
        room.apply_update(&update("ab", "abc")).await.unwrap();

        let mut sent: Vec<Message> = Vec::new();
        forward_frames(frames, &mut sent, 1).await;

        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Message::Close(Some(frame)) => assert_eq!(frame.code, close_code::AGAIN),
            other => panic!("expected a close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frames_forwarded_in_order() {
        let hub = RelayHub::new(8);
        let room = hub.join(1, "doc", || Some("a".into()));
        let frames = room.subscribe();

        let first = update("a", "ab");
        let second = update("ab", "abc");
        room.apply_update(&first).await.unwrap();
        room.apply_update(&second).await.unwrap();
        hub.leave(&room);
        drop(room);

        let mut sent: Vec<Message> = Vec::new();
        forward_frames(frames, &mut sent, 1).await;

        let texts: Vec<SyncEnvelope> = sent
            .iter()
            .map(|m| match m {
                Message::Text(text) => SyncEnvelope::from_json(text.as_str()).unwrap(),
                other => panic!("unexpected message {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec![first, second]);
    }
}
