use super::*;
use crate::client::drag::DropOutcome;
use crate::model::MoveRequest;
use crate::services::presence::PresenceUser;
use crate::state::test_helpers::{column_named, sample_board};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

struct Rig {
    dispatcher: Dispatcher,
    heartbeat: HeartbeatMonitor,
    drag: DragNegotiator,
    events: mpsc::UnboundedReceiver<UiEvent>,
}

impl Rig {
    fn new() -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            dispatcher: Dispatcher::new(tx),
            heartbeat: HeartbeatMonitor::new(Duration::from_secs(30), Duration::from_secs(10)),
            drag: DragNegotiator::new(),
            events,
        }
    }

    fn dispatch(&mut self, envelope: &Envelope) -> PostDispatch {
        self.dispatcher
            .dispatch(envelope, &mut self.heartbeat, &mut self.drag, Instant::now())
    }

    fn drain(&mut self) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn sync_env(board: &crate::model::Board, seq: u64, users: Vec<PresenceUser>) -> Envelope {
    Envelope::board_sync(&SyncPayload { board: board.clone(), seq, users })
}

fn seeded_rig() -> (Rig, crate::model::Board) {
    let board = sample_board();
    let mut rig = Rig::new();
    rig.dispatch(&sync_env(&board, 0, vec![]));
    rig.drain();
    (rig, board)
}

fn event_for(board: &crate::model::Board, seq: u64) -> MoveEvent {
    let item = column_named(board, "Backlog").items[0].clone();
    MoveEvent {
        item_id: item.id,
        item_type: item.kind,
        from_column_id: column_named(board, "Backlog").id,
        column_id: column_named(board, "Review").id,
        position: 2,
        moved_by: "bob".into(),
        seq,
        nonce: Uuid::new_v4(),
    }
}

// =============================================================================
// routing
// =============================================================================

#[test]
fn pong_settles_the_heartbeat() {
    let mut rig = Rig::new();
    let now = Instant::now();
    rig.heartbeat.start(now);
    rig.heartbeat.on_tick(now + Duration::from_secs(30));
    assert!(rig.heartbeat.awaiting_pong());

    assert_eq!(rig.dispatch(&Envelope::pong()), PostDispatch::None);
    assert!(!rig.heartbeat.awaiting_pong());
    assert!(rig.drain().is_empty());
}

#[test]
fn board_sync_installs_the_snapshot() {
    let board = sample_board();
    let mut rig = Rig::new();
    assert_eq!(rig.dispatch(&sync_env(&board, 3, vec![])), PostDispatch::None);
    assert_eq!(rig.drain(), vec![UiEvent::BoardReplaced]);
    assert_eq!(rig.dispatcher.mirror.board(), Some(&board));
    assert_eq!(rig.dispatcher.mirror.last_seq(), 3);
}

#[test]
fn board_sync_seeds_the_presence_set() {
    let board = sample_board();
    let mut rig = Rig::new();
    let users = vec![
        PresenceUser { user_id: Uuid::new_v4(), name: "bob".into() },
        PresenceUser { user_id: Uuid::new_v4(), name: "alice".into() },
    ];
    rig.dispatch(&sync_env(&board, 0, users));
    assert_eq!(rig.dispatcher.online_users(), vec!["alice", "bob"]);
}

#[test]
fn board_refresh_clears_and_requests_a_sync() {
    let (mut rig, _board) = seeded_rig();
    assert_eq!(rig.dispatch(&Envelope::board_refresh()), PostDispatch::RequestSync);
    assert!(rig.dispatcher.mirror.board().is_none());
}

#[test]
fn item_moved_updates_the_mirror_and_surfaces_the_event() {
    let (mut rig, board) = seeded_rig();
    let event = event_for(&board, 1);

    assert_eq!(rig.dispatch(&Envelope::item_moved(&event)), PostDispatch::None);
    assert_eq!(rig.drain(), vec![UiEvent::ItemMoved(event.clone())]);
    let (col, _) = rig
        .dispatcher
        .mirror
        .find_item(event.item_id)
        .expect("item present");
    assert_eq!(col.id, event.column_id);
}

#[test]
fn duplicate_item_moved_is_silently_ignored() {
    let (mut rig, board) = seeded_rig();
    let event = event_for(&board, 1);
    rig.dispatch(&Envelope::item_moved(&event));
    rig.drain();

    assert_eq!(rig.dispatch(&Envelope::item_moved(&event)), PostDispatch::None);
    assert!(rig.drain().is_empty());
}

#[test]
fn gapped_item_moved_requests_a_sync() {
    let (mut rig, board) = seeded_rig();
    assert_eq!(
        rig.dispatch(&Envelope::item_moved(&event_for(&board, 4))),
        PostDispatch::RequestSync
    );
    assert!(rig.drain().is_empty());
}

#[test]
fn item_moved_resolves_a_matching_pending_drag() {
    let (mut rig, board) = seeded_rig();
    let item = column_named(&board, "Backlog").items[0].clone();
    let review = column_named(&board, "Review");
    rig.drag.begin(&rig.dispatcher.mirror, item.id);
    let DropOutcome::Request(req) = rig.drag.drop_on(&rig.dispatcher.mirror, review.id, None)
    else {
        panic!("expected a request");
    };

    let mut event = event_for(&board, 1);
    event.nonce = req.nonce;
    rig.dispatch(&Envelope::item_moved(&event));
    let events = rig.drain();
    assert_eq!(
        events,
        vec![
            UiEvent::DragResolved(DragResolution::Accepted { event: event.clone() }),
            UiEvent::ItemMoved(event),
        ]
    );
}

#[test]
fn move_rejected_reverts_a_matching_pending_drag() {
    let (mut rig, board) = seeded_rig();
    let item = column_named(&board, "Backlog").items[0].clone();
    let review = column_named(&board, "Review");
    rig.drag.begin(&rig.dispatcher.mirror, item.id);
    let DropOutcome::Request(req) = rig.drag.drop_on(&rig.dispatcher.mirror, review.id, None)
    else {
        panic!("expected a request");
    };

    struct Full;
    impl std::fmt::Display for Full {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "column is full")
        }
    }
    impl crate::envelope::WireErrorKind for Full {
        fn wire_kind(&self) -> &'static str {
            "wip_limit_exceeded"
        }
    }

    rig.dispatch(&Envelope::move_rejected(req.nonce, &Full));
    assert_eq!(
        rig.drain(),
        vec![UiEvent::DragResolved(DragResolution::Rejected {
            error: "wip_limit_exceeded".into(),
            message: "column is full".into()
        })]
    );
}

#[test]
fn presence_envelopes_surface_as_presence_events() {
    let mut rig = Rig::new();
    let alice = PresenceUser { user_id: Uuid::new_v4(), name: "alice".into() };
    rig.dispatch(&Envelope::user_joined(&alice, 2));
    assert_eq!(rig.dispatcher.online_users(), vec!["alice"]);
    rig.dispatch(&Envelope::user_left(&alice, 1));
    assert!(rig.dispatcher.online_users().is_empty());
    assert_eq!(
        rig.drain(),
        vec![
            UiEvent::Presence { user: "alice".into(), online: 2, joined: true },
            UiEvent::Presence { user: "alice".into(), online: 1, joined: false },
        ]
    );
}

#[test]
fn typing_surfaces_without_touching_the_mirror() {
    let (mut rig, board) = seeded_rig();
    let item = column_named(&board, "Doing").items[0].clone();
    let payload = TypingPayload {
        user_id: Some(Uuid::new_v4()),
        user: "bob".into(),
        item_id: item.id,
        item_type: item.kind,
        is_typing: true,
    };
    assert_eq!(rig.dispatch(&Envelope::user_typing(&payload)), PostDispatch::None);
    assert_eq!(rig.drain(), vec![UiEvent::Typing(payload)]);
    assert_eq!(rig.dispatcher.mirror.board(), Some(&board));
}

#[test]
fn item_created_surfaces_and_requests_a_sync() {
    let (mut rig, board) = seeded_rig();
    let payload = ItemCreatedPayload {
        item_id: Uuid::new_v4(),
        item_type: crate::model::ItemKind::Bug,
        title: "new bug".into(),
        column_id: column_named(&board, "Backlog").id,
        created_by: "bob".into(),
    };
    assert_eq!(
        rig.dispatch(&Envelope::item_created(&payload)),
        PostDispatch::RequestSync
    );
    assert_eq!(rig.drain(), vec![UiEvent::ItemCreated(payload)]);
}

#[test]
fn comment_added_surfaces_without_side_effects() {
    let (mut rig, board) = seeded_rig();
    let item = column_named(&board, "Doing").items[0].clone();
    let payload = CommentPayload {
        item_id: item.id,
        item_type: item.kind,
        author: "bob".into(),
        text: "looks good".into(),
    };
    assert_eq!(rig.dispatch(&Envelope::comment_added(&payload)), PostDispatch::None);
    assert_eq!(rig.drain(), vec![UiEvent::CommentAdded(payload)]);
}

// =============================================================================
// hostile input
// =============================================================================

#[test]
fn unknown_kinds_are_dropped() {
    let mut rig = Rig::new();
    let envelope = Envelope::new("reticulate_splines", json!({"x": 1}));
    assert_eq!(rig.dispatch(&envelope), PostDispatch::None);
    assert!(rig.drain().is_empty());
}

#[test]
fn malformed_payloads_are_dropped() {
    let (mut rig, board) = seeded_rig();
    for kind in ["board_sync", "item_moved", "move_rejected", "user_joined", "user_typing"] {
        let envelope = Envelope::new(kind, json!({"garbage": true}));
        assert_eq!(rig.dispatch(&envelope), PostDispatch::None, "kind {kind}");
    }
    assert!(rig.drain().is_empty());
    assert_eq!(rig.dispatcher.mirror.board(), Some(&board));
}
