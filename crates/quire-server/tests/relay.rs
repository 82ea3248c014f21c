//! Two native clients editing one document through a live server.

use std::time::Duration;

use quire_editor_core::{DocumentStore, PlainEditor};
use quire_server::config::{SeedDocument, ServerConfig};
use quire_server::{AppState, serve};
use quire_sync::{
    IgnoreReason, ReceiveOutcome, SendOutcome, SessionIdentity, SyncSession, TransportEvent,
    WsTransport,
};
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

const DOC_ID: i64 = 42;
const SEED: &str = "# Notes\n";

async fn start() -> (Url, AppState) {
    let mut config = ServerConfig::default();
    config.storage.seed.push(SeedDocument {
        doc_id: DOC_ID,
        name: "notes".into(),
        markdown: SEED.into(),
    });
    let state = AppState::new(&config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state.clone()));
    (Url::parse(&format!("http://{addr}")).unwrap(), state)
}

async fn connect(
    base: &Url,
) -> (
    SyncSession<WsTransport>,
    PlainEditor,
    UnboundedReceiver<TransportEvent>,
) {
    let identity = SessionIdentity::new("notes", DOC_ID);
    let url = identity.connect_url(base).unwrap();
    let (transport, events) = WsTransport::connect(&url).await.unwrap();
    let store = PlainEditor::from_text(SEED);
    let session = SyncSession::open(identity, transport, &store);
    (session, store, events)
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.hub.connection_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never saw {expected} connections");
}

async fn next_frame(events: &mut UnboundedReceiver<TransportEvent>) -> String {
    match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
        Ok(Some(TransportEvent::Message(frame))) => frame,
        other => panic!("expected a frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_relayed_between_clients() {
    let (base, state) = start().await;
    let (mut alice, mut alice_doc, mut alice_events) = connect(&base).await;
    let (mut bob, mut bob_doc, mut bob_events) = connect(&base).await;
    wait_for_connections(&state, 2).await;

    alice_doc.insert(8, "- milk\n");
    let sent = alice.on_local_edit(&alice_doc).unwrap();
    assert!(matches!(sent, SendOutcome::Sent { .. }));

    let frame = next_frame(&mut bob_events).await;
    let outcome = bob.on_message(&frame, &mut bob_doc).unwrap();
    assert_eq!(outcome, ReceiveOutcome::Applied { version: 2 });
    assert_eq!(bob_doc.text(), "# Notes\n- milk\n");

    // the relay echoes to the sender too
    let echo = next_frame(&mut alice_events).await;
    let outcome = alice.on_message(&echo, &mut alice_doc).unwrap();
    assert_eq!(outcome, ReceiveOutcome::Ignored(IgnoreReason::SelfEcho));

    let room = state.hub.room(DOC_ID).unwrap();
    assert_eq!(room.markdown().await, "# Notes\n- milk\n");
}

#[tokio::test]
async fn test_room_closed_after_clients_leave() {
    let (base, state) = start().await;
    let (mut alice, _alice_doc, _alice_events) = connect(&base).await;
    wait_for_connections(&state, 1).await;
    assert_eq!(state.hub.room_count(), 1);

    alice.close();
    wait_for_connections(&state, 0).await;
    assert_eq!(state.hub.room_count(), 0);
}
