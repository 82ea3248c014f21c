//! Two editors talking through an in-memory relay.

use quire_editor_core::{DocumentStore, PlainEditor};
use quire_sync::{
    ChannelTransport, EditorHost, IgnoreReason, ReceiveOutcome, SendOutcome, SenderId,
    SessionIdentity, SyncError, SyncSession, Transport,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct Peer {
    store: PlainEditor,
    session: SyncSession<ChannelTransport>,
    outbox: UnboundedReceiver<String>,
}

impl Peer {
    fn new(sender: u64, text: &str) -> Self {
        let store = PlainEditor::from_text(text);
        let (transport, outbox) = ChannelTransport::pair();
        let identity = SessionIdentity {
            document_name: "shared".into(),
            document_id: 10,
            sender_id: SenderId(sender),
        };
        let session = SyncSession::open(identity, transport, &store);
        Self {
            store,
            session,
            outbox,
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut PlainEditor)) -> SendOutcome {
        f(&mut self.store);
        self.session.on_local_edit(&self.store).unwrap()
    }

    fn sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbox.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn deliver(&mut self, frame: &str) -> Result<ReceiveOutcome, SyncError> {
        self.session.on_message(frame, &mut self.store)
    }
}

#[test]
fn test_insert_reaches_peer() {
    let mut alice = Peer::new(1, "hello world");
    let mut bob = Peer::new(2, "hello world");

    alice.edit(|s| {
        s.insert(6, "brave ");
    });
    let frames = alice.sent();
    assert_eq!(frames.len(), 1);

    let outcome = bob.deliver(&frames[0]).unwrap();
    assert_eq!(outcome, ReceiveOutcome::Applied { version: 2 });
    assert_eq!(bob.store.text(), "hello brave world");
    assert_eq!(alice.store.text(), bob.store.text());
}

#[test]
fn test_relay_echo_does_not_touch_sender() {
    let mut alice = Peer::new(1, "abc");
    alice.edit(|s| {
        s.delete(0..1);
    });
    let frame = alice.sent().remove(0);

    let outcome = alice.deliver(&frame).unwrap();
    assert_eq!(outcome, ReceiveOutcome::Ignored(IgnoreReason::SelfEcho));
    assert_eq!(alice.store.text(), "bc");
    assert_eq!(alice.session.version(), 1);
}

#[test]
fn test_baselines_chain_across_updates() {
    let mut alice = Peer::new(1, "one");
    let mut bob = Peer::new(2, "one");

    alice.edit(|s| {
        s.insert(3, " two");
    });
    alice.edit(|s| {
        s.insert(7, " three");
    });
    let frames = alice.sent();
    assert_eq!(frames.len(), 2);

    // second diff is relative to "one two", not "one"
    for frame in &frames {
        bob.deliver(frame).unwrap();
    }
    assert_eq!(bob.store.text(), "one two three");
    assert_eq!(bob.session.version(), 3);
}

#[test]
fn test_edits_flow_both_ways() {
    let mut alice = Peer::new(1, "# Title\n");
    let mut bob = Peer::new(2, "# Title\n");

    alice.edit(|s| {
        s.insert(8, "first line\n");
    });
    for frame in alice.sent() {
        bob.deliver(&frame).unwrap();
    }

    // Bob's baseline moved with the remote update, so his diff applies on Alice's side.
    let outcome = bob.edit(|s| {
        s.replace(2..7, "Heading");
    });
    assert!(matches!(outcome, SendOutcome::Sent { .. }));
    for frame in bob.sent() {
        alice.deliver(&frame).unwrap();
    }

    assert_eq!(alice.store.text(), "# Heading\nfirst line\n");
    assert_eq!(bob.store.text(), alice.store.text());
}

#[test]
fn test_remote_update_keeps_local_cursor() {
    let mut alice = Peer::new(1, "hello world");
    let mut bob = Peer::new(2, "hello world");
    bob.store.set_cursor_offset(8);

    alice.edit(|s| {
        s.insert(0, ">> ");
    });
    for frame in alice.sent() {
        bob.deliver(&frame).unwrap();
    }
    assert_eq!(bob.store.cursor_offset(), 11);
}

#[test]
fn test_diverged_baseline_reports_malformed_diff() {
    let mut alice = Peer::new(1, "a much longer starting text");
    let mut bob = Peer::new(2, "short");

    alice.edit(|s| {
        s.insert(0, "!");
    });
    let frame = alice.sent().remove(0);
    let err = bob.deliver(&frame).unwrap_err();
    assert!(matches!(err, SyncError::MalformedDiff(_)));
    assert_eq!(bob.store.text(), "short");
}

#[test]
fn test_host_reopen_tears_down_previous_session() {
    let mut host: EditorHost<PlainEditor, ChannelTransport> =
        EditorHost::new(PlainEditor::default());

    let (first, mut first_rx) = ChannelTransport::pair();
    host.open_document(SessionIdentity::new("first", 1), "first doc", first);
    host.store_mut().insert(0, "> ");
    assert!(matches!(host.local_change(), Some(SendOutcome::Sent { .. })));
    assert!(first_rx.try_recv().is_ok());

    let (second, _second_rx) = ChannelTransport::pair();
    host.open_document(SessionIdentity::new("second", 2), "second doc", second);

    let session = host.session().unwrap();
    assert_eq!(session.document_id(), 2);
    assert_eq!(session.last_sent(), "second doc");
    assert_eq!(host.store().text(), "second doc");
    assert_eq!(host.store().cursor_offset(), 0);

    // the first transport was closed, so nothing else arrives on it
    host.store_mut().insert(0, "x");
    host.local_change();
    assert!(first_rx.try_recv().is_err());
}

#[test]
fn test_host_collects_warnings() {
    let mut host: EditorHost<PlainEditor, ChannelTransport> =
        EditorHost::new(PlainEditor::default());
    let (transport, _rx) = ChannelTransport::pair();
    host.open_document(SessionIdentity::new("doc", 5), "abc", transport);

    assert_eq!(host.receive("not json"), None);
    let bad = r#"{"opt":1,"name":"doc","diffs":[{"count":9,"type":0,"value":""}],"doc_id":5,"mark_down":"","random_id":100000001}"#;
    assert_eq!(host.receive(bad), None);

    let warnings = host.drain_warnings();
    assert_eq!(warnings.len(), 2);
    assert!(matches!(warnings[0].error, SyncError::Decode(_)));
    assert!(matches!(warnings[1].error, SyncError::MalformedDiff(_)));
    assert!(host.drain_warnings().is_empty());
    assert_eq!(host.store().text(), "abc");
}

#[test]
fn test_host_close_closes_transport() {
    let mut host: EditorHost<PlainEditor, ChannelTransport> =
        EditorHost::new(PlainEditor::default());
    let (transport, _rx) = ChannelTransport::pair();
    host.open_document(SessionIdentity::new("doc", 5), "abc", transport);
    assert!(host.session().unwrap().transport().is_open());

    host.close();
    assert!(host.session().is_none());
    assert_eq!(host.local_change(), None);
}
