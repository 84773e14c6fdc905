//! Calendar reconciliation: diffing, applying, change detection.
//!
//! The diff engine compares a freshly computed schedule against whatever
//! is already materialized externally (matched by embedded tag) so that
//! re-running the planner never duplicates blocks or clobbers user edits.

mod apply;
mod diff;
mod digest;

pub use apply::{ApplyFailure, ApplyReport, PendingDiff, ReconciliationApplier};
pub use diff::{
    build_diff, proposed_blocks, MovedBlock, ProposedBlock, RemovedBlock, ResizedBlock,
    ScheduleConflict, ScheduleDiff,
};
pub use digest::{completion_digest, scheduling_digest};
