//! Admission controller — the single WIP-limit decision point.
//!
//! DESIGN
//! ======
//! Pure function over a column snapshot. The hub calls it strictly inside the
//! per-board serialization point, so it never observes a racing insertion.
//! The client-side pre-check in `client::drag` reuses the same column state
//! through its mirror, but only as a latency optimization — correctness rests
//! entirely on this evaluation under the hub's lock.

use crate::model::Column;

/// Outcome of evaluating a proposed insertion against a target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The target column already holds `limit` items.
    WipLimitExceeded { limit: u32 },
}

/// Decide whether one item may be inserted into `target`.
///
/// Unbounded columns accept everything. Moves within the same column never
/// count against the limit (`moving_within`), since the post-removal count
/// stays unchanged. Otherwise accept iff the current count is below the limit.
#[must_use]
pub fn evaluate(target: &Column, moving_within: bool) -> Admission {
    let Some(limit) = target.wip_limit else {
        return Admission::Accept;
    };
    if moving_within {
        return Admission::Accept;
    }
    if target.items.len() < limit as usize {
        Admission::Accept
    } else {
        Admission::Reject(RejectReason::WipLimitExceeded { limit })
    }
}

#[cfg(test)]
#[path = "admission_test.rs"]
mod tests;
