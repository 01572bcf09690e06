use super::*;
use crate::model::MoveEvent;
use crate::state::test_helpers::{column_named, sample_board};

fn mirror_of(board: &crate::model::Board) -> BoardMirror {
    let mut mirror = BoardMirror::new();
    mirror.replace(board.clone(), 0);
    mirror
}

fn accepted_event(req: &MoveRequest, seq: u64) -> MoveEvent {
    MoveEvent {
        item_id: req.item_id,
        item_type: req.item_type,
        from_column_id: req.source_column_id.expect("drag requests carry a source"),
        column_id: req.target_column_id,
        position: 2,
        moved_by: "alice".into(),
        seq,
        nonce: req.nonce,
    }
}

// =============================================================================
// begin
// =============================================================================

#[test]
fn begin_captures_the_items_source_column() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let backlog = column_named(&board, "Backlog");
    let item = backlog.items[0].clone();

    let mut drag = DragNegotiator::new();
    assert!(drag.begin(&mirror, item.id));
    assert_eq!(
        drag.phase(),
        DragPhase::Dragging {
            item_id: item.id,
            item_type: item.kind,
            source_column: backlog.id
        }
    );
}

#[test]
fn begin_refuses_unknown_items_and_busy_negotiators() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();
    let other = column_named(&board, "Backlog").items[1].clone();

    let mut drag = DragNegotiator::new();
    assert!(!drag.begin(&mirror, Uuid::new_v4()));
    assert!(drag.begin(&mirror, item.id));
    assert!(!drag.begin(&mirror, other.id), "one drag at a time");
}

// =============================================================================
// drop_on
// =============================================================================

#[test]
fn drop_without_a_drag_is_refused() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let mut drag = DragNegotiator::new();
    assert_eq!(
        drag.drop_on(&mirror, column_named(&board, "Done").id, None),
        DropOutcome::NotDragging
    );
}

#[test]
fn same_column_drop_resolves_locally_with_no_request() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let backlog = column_named(&board, "Backlog");
    let item = backlog.items[0].clone();

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    assert_eq!(drag.drop_on(&mirror, backlog.id, Some(1)), DropOutcome::NoOp);
    assert_eq!(drag.phase(), DragPhase::Idle);
}

#[test]
fn drop_on_a_visibly_full_column_is_refused_locally() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();
    let doing = column_named(&board, "Doing");

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    assert_eq!(
        drag.drop_on(&mirror, doing.id, None),
        DropOutcome::RejectedLocally { limit: 3 }
    );
    assert_eq!(drag.phase(), DragPhase::Idle);
}

#[test]
fn drop_on_an_open_column_produces_a_request_and_goes_pending() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let backlog = column_named(&board, "Backlog");
    let item = backlog.items[0].clone();
    let review = column_named(&board, "Review");

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    let DropOutcome::Request(req) = drag.drop_on(&mirror, review.id, Some(1)) else {
        panic!("expected a request");
    };
    assert_eq!(req.item_id, item.id);
    assert_eq!(req.item_type, item.kind);
    assert_eq!(req.source_column_id, Some(backlog.id));
    assert_eq!(req.target_column_id, review.id);
    assert_eq!(req.position, Some(1));
    assert!(matches!(drag.phase(), DragPhase::Pending { nonce, .. } if nonce == req.nonce));
}

// =============================================================================
// resolution
// =============================================================================

#[test]
fn matching_canonical_event_accepts_the_pending_drop() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();
    let review = column_named(&board, "Review");

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    let DropOutcome::Request(req) = drag.drop_on(&mirror, review.id, None) else {
        panic!("expected a request");
    };

    let event = accepted_event(&req, 1);
    assert_eq!(
        drag.on_canonical(&event),
        Some(DragResolution::Accepted { event: event.clone() })
    );
    assert_eq!(drag.phase(), DragPhase::Idle);
}

#[test]
fn foreign_events_leave_the_pending_drop_alone() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();
    let review = column_named(&board, "Review");

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    let DropOutcome::Request(req) = drag.drop_on(&mirror, review.id, None) else {
        panic!("expected a request");
    };

    let mut foreign = accepted_event(&req, 1);
    foreign.nonce = Uuid::new_v4();
    assert_eq!(drag.on_canonical(&foreign), None);
    assert_eq!(drag.on_rejected(Uuid::new_v4(), "stale_move", "someone else"), None);
    assert!(matches!(drag.phase(), DragPhase::Pending { .. }));
}

#[test]
fn matching_rejection_reverts_the_pending_drop() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();
    let review = column_named(&board, "Review");

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    let DropOutcome::Request(req) = drag.drop_on(&mirror, review.id, None) else {
        panic!("expected a request");
    };

    let resolution = drag.on_rejected(req.nonce, "wip_limit_exceeded", "column is full");
    assert_eq!(
        resolution,
        Some(DragResolution::Rejected {
            error: "wip_limit_exceeded".into(),
            message: "column is full".into()
        })
    );
    assert_eq!(drag.phase(), DragPhase::Idle);
}

#[test]
fn cancel_returns_to_idle_from_any_phase() {
    let board = sample_board();
    let mirror = mirror_of(&board);
    let item = column_named(&board, "Backlog").items[0].clone();

    let mut drag = DragNegotiator::new();
    drag.begin(&mirror, item.id);
    drag.cancel();
    assert_eq!(drag.phase(), DragPhase::Idle);
    assert!(drag.begin(&mirror, item.id), "cancel frees the negotiator");
}
