//! Applying an accepted diff to the external calendar.
//!
//! Every tagged event's write is independent and best-effort: one failure
//! never aborts the rest of the batch. Read-only calendars and events are
//! skipped silently; real I/O failures are aggregated into the report.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarRead, CalendarWrite, NewCalendarEvent, SessionTag};
use crate::error::CalendarError;
use crate::sync::diff::ScheduleDiff;

/// One failed event write within a reconciliation pass.
#[derive(Debug)]
pub struct ApplyFailure {
    pub tag: SessionTag,
    pub operation: &'static str,
    pub error: CalendarError,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Writes skipped because the target was read-only or already done.
    pub skipped: usize,
    pub failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A diff awaiting (possibly partial) application.
///
/// Partial application consumes the non-conflicting entries and retains
/// the conflicts for a later decision; conflicts persist across partial
/// applies, everything else is consumed once applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingDiff {
    pub diff: ScheduleDiff,
}

impl PendingDiff {
    pub fn new(diff: ScheduleDiff) -> Self {
        Self { diff }
    }

    pub fn is_settled(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Applies accepted diffs to a calendar collaborator.
pub struct ReconciliationApplier {
    /// Horizon used when listing existing events for the race guard.
    lookback: Duration,
    lookahead: Duration,
}

impl ReconciliationApplier {
    pub fn new() -> Self {
        Self {
            lookback: Duration::days(31),
            lookahead: Duration::days(93),
        }
    }

    /// Apply the whole diff. Conflicts are never applied; they ride along
    /// in the diff purely for reporting.
    pub fn apply<C>(&self, diff: &ScheduleDiff, calendar: &mut C) -> ApplyReport
    where
        C: CalendarRead + CalendarWrite,
    {
        let mut report = ApplyReport::default();
        let now = Utc::now();

        // Snapshot of existing tagged events for the add race guard and
        // for resolving tags to store identifiers.
        let existing = calendar
            .list_events(now - self.lookback, now + self.lookahead)
            .unwrap_or_default();
        let find = |tag: SessionTag| existing.iter().find(|e| e.tag() == Some(tag));

        for block in &diff.added {
            if let Some(event) = find(block.tag) {
                // Already materialized by a concurrent pass.
                tracing::debug!(tag = %block.tag, event = %event.id, "addition already present; skipping");
                report.skipped += 1;
                continue;
            }
            let notes = block.tag.embed("");
            match calendar.create_event(NewCalendarEvent {
                title: block.title.clone(),
                start: block.start,
                end: block.end(),
                notes,
            }) {
                Ok(_) => report.created += 1,
                Err(CalendarError::PermissionDenied(reason)) => {
                    tracing::debug!(tag = %block.tag, %reason, "calendar refused the create; skipping");
                    report.skipped += 1;
                }
                Err(error) => report.failures.push(ApplyFailure {
                    tag: block.tag,
                    operation: "create",
                    error,
                }),
            }
        }

        for removal in &diff.removed {
            let Some(event) = find(removal.tag) else {
                report.skipped += 1;
                continue;
            };
            if !event.writable {
                // Read-only calendars are expected, not an error.
                report.skipped += 1;
                continue;
            }
            match calendar.delete_event(&event.id) {
                Ok(()) => report.deleted += 1,
                Err(CalendarError::PermissionDenied(_)) => report.skipped += 1,
                Err(error) => report.failures.push(ApplyFailure {
                    tag: removal.tag,
                    operation: "delete",
                    error,
                }),
            }
        }

        // Move and resize may target the same tag; fold them into one write.
        let mut retimed: std::collections::HashMap<SessionTag, (Option<DateTime<Utc>>, Option<i64>)> =
            std::collections::HashMap::new();
        for m in &diff.moved {
            retimed.entry(m.tag).or_default().0 = Some(m.new_start);
        }
        for r in &diff.resized {
            retimed.entry(r.tag).or_default().1 = Some(r.new_duration_minutes);
        }

        let mut tags: Vec<_> = retimed.keys().copied().collect();
        tags.sort();
        for tag in tags {
            let (new_start, new_duration) = retimed[&tag];
            let Some(event) = find(tag) else {
                report.skipped += 1;
                continue;
            };
            if !event.writable {
                report.skipped += 1;
                continue;
            }
            let start = new_start.unwrap_or(event.start);
            let duration = new_duration.unwrap_or_else(|| event.duration_minutes());
            let end = start + Duration::minutes(duration);
            let notes = tag.embed(&event.notes);
            match calendar.update_event(&event.id, start, end, notes) {
                Ok(()) => report.updated += 1,
                Err(CalendarError::PermissionDenied(_)) => report.skipped += 1,
                Err(error) => report.failures.push(ApplyFailure {
                    tag,
                    operation: "update",
                    error,
                }),
            }
        }

        report
    }

    /// Best-effort partial apply: materialize only the entries not touching
    /// a conflict, leaving the conflicts open in the pending diff.
    pub fn apply_non_conflicting<C>(&self, pending: &mut PendingDiff, calendar: &mut C) -> ApplyReport
    where
        C: CalendarRead + CalendarWrite,
    {
        let partial = pending.diff.non_conflicting_changes();
        let report = self.apply(&partial, calendar);

        let conflicted = pending.diff.conflicting_tags();
        let diff = &mut pending.diff;
        diff.added.retain(|b| conflicted.contains(&b.tag));
        diff.moved.retain(|b| conflicted.contains(&b.tag));
        diff.resized.retain(|b| conflicted.contains(&b.tag));
        diff.removed.retain(|b| conflicted.contains(&b.tag));
        // diff.conflicts stays as-is for a later decision.

        report
    }
}

impl Default for ReconciliationApplier {
    fn default() -> Self {
        Self::new()
    }
}
