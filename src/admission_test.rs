use super::*;
use crate::model::{Item, ItemKind};
use uuid::Uuid;

fn column_with(wip_limit: Option<u32>, count: usize) -> Column {
    Column {
        id: Uuid::new_v4(),
        title: "col".into(),
        wip_limit,
        items: (0..count)
            .map(|i| Item {
                id: Uuid::new_v4(),
                kind: ItemKind::Feature,
                title: format!("item {i}"),
                position: u32::try_from(i).expect("small"),
            })
            .collect(),
    }
}

#[test]
fn unbounded_column_accepts_anything() {
    assert_eq!(evaluate(&column_with(None, 100), false), Admission::Accept);
}

#[test]
fn below_limit_accepts() {
    assert_eq!(evaluate(&column_with(Some(5), 4), false), Admission::Accept);
}

#[test]
fn at_limit_rejects_with_the_limit() {
    assert_eq!(
        evaluate(&column_with(Some(3), 3), false),
        Admission::Reject(RejectReason::WipLimitExceeded { limit: 3 })
    );
}

#[test]
fn over_limit_rejects() {
    // Limits can drop below the current count via out-of-band edits.
    assert_eq!(
        evaluate(&column_with(Some(2), 5), false),
        Admission::Reject(RejectReason::WipLimitExceeded { limit: 2 })
    );
}

#[test]
fn reorder_within_a_full_column_is_exempt() {
    assert_eq!(evaluate(&column_with(Some(3), 3), true), Admission::Accept);
}

#[test]
fn explicit_zero_limit_rejects_inserts() {
    assert_eq!(
        evaluate(&column_with(Some(0), 0), false),
        Admission::Reject(RejectReason::WipLimitExceeded { limit: 0 })
    );
}
