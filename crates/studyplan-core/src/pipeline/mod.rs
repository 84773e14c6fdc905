//! The full planning pass and the debounced background worker.
//!
//! One pass runs: change detection, session decomposition, placement,
//! conflict detection, and diffing against the external calendar. The
//! pass itself is pure; persisting and applying are the caller's choice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::calendar::ExternalCalendarEvent;
use crate::planner::{detect_conflicts, sessions_for, BusyInterval, Scheduler};
use crate::storage::PlanningSettings;
use crate::store::ProposalMetadata;
use crate::sync::{
    build_diff, completion_digest, proposed_blocks, scheduling_digest, RemovedBlock, ScheduleDiff,
};
use crate::task::Task;

/// Result of one planning pass.
#[derive(Debug)]
pub struct PlanOutcome {
    /// Digest of the inputs this plan was computed from.
    pub input_hash: String,
    /// Digest of the completion states this plan reflects.
    pub completion_hash: String,
    /// False when the digest matched and placement was skipped. A
    /// completion-only change still emits removals without recomputing.
    pub recomputed: bool,
    pub scheduled: Vec<crate::planner::PlacedSession>,
    pub overflow: Vec<crate::planner::OverflowSession>,
    pub diff: ScheduleDiff,
    pub meta: ProposalMetadata,
}

impl PlanOutcome {
    fn light(
        input_hash: String,
        completion_hash: String,
        diff: ScheduleDiff,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: ProposalMetadata::new(input_hash.clone(), computed_at),
            input_hash,
            completion_hash,
            recomputed: false,
            scheduled: Vec::new(),
            overflow: Vec::new(),
            diff,
        }
    }
}

/// Runs planning passes against a settings snapshot.
pub struct Planner {
    settings: PlanningSettings,
}

impl Planner {
    pub fn new(settings: PlanningSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlanningSettings {
        &self.settings
    }

    /// Run one pass.
    ///
    /// When `last_hash` matches the current input digest, placement is
    /// skipped. If only completion states changed since
    /// `last_completion_hash`, the outcome carries removals for the done
    /// tasks' blocks without re-placing anything else; un-completing a
    /// task falls through to a full pass so its blocks come back.
    pub fn plan(
        &self,
        tasks: &[Task],
        busy: &[BusyInterval],
        existing_events: &[ExternalCalendarEvent],
        last_hash: Option<&str>,
        last_completion_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> PlanOutcome {
        let input_hash = scheduling_digest(tasks, busy, &self.settings);
        let completion_hash = completion_digest(tasks);
        if last_hash == Some(input_hash.as_str()) {
            if last_completion_hash == Some(completion_hash.as_str()) {
                tracing::debug!(%input_hash, "inputs unchanged; skipping recompute");
                return PlanOutcome::light(input_hash, completion_hash, ScheduleDiff::default(), now);
            }
            if let Some(diff) = completion_only_diff(tasks, existing_events) {
                tracing::info!(
                    removed = diff.removed.len(),
                    "completion change only; syncing annotations without re-placement"
                );
                return PlanOutcome::light(input_hash, completion_hash, diff, now);
            }
        }

        let candidates: Vec<_> = tasks
            .iter()
            .flat_map(|t| sessions_for(t, &self.settings))
            .collect();
        let outcome = Scheduler::new(&self.settings).schedule(candidates, busy, now);
        let conflicts = detect_conflicts(&outcome.scheduled, busy);

        let proposed = proposed_blocks(&outcome.scheduled);
        let diff = build_diff(&proposed, existing_events, conflicts);

        tracing::info!(
            scheduled = outcome.scheduled.len(),
            overflow = outcome.overflow.len(),
            changes = diff.summary(),
            "planning pass complete"
        );

        PlanOutcome {
            meta: ProposalMetadata::new(input_hash.clone(), now),
            input_hash,
            completion_hash,
            recomputed: true,
            scheduled: outcome.scheduled,
            overflow: outcome.overflow,
            diff,
        }
    }
}

/// Diff for a pass where only completion states moved: remove the done
/// tasks' blocks and leave every other block where it is.
///
/// Returns `None` when a task still needing sessions has no blocks on the
/// calendar (it was un-completed, or its additions were never applied);
/// those need a full pass.
fn completion_only_diff(
    tasks: &[Task],
    existing_events: &[ExternalCalendarEvent],
) -> Option<ScheduleDiff> {
    let present: std::collections::HashSet<uuid::Uuid> = existing_events
        .iter()
        .filter_map(|e| e.tag())
        .map(|tag| tag.task_id)
        .collect();
    if tasks
        .iter()
        .any(|t| t.needs_scheduling() && !present.contains(&t.id))
    {
        return None;
    }

    let done: std::collections::HashSet<uuid::Uuid> =
        tasks.iter().filter(|t| t.completed).map(|t| t.id).collect();
    let mut removed: Vec<RemovedBlock> = existing_events
        .iter()
        .filter_map(|e| e.tag())
        .filter(|tag| done.contains(&tag.task_id))
        .map(|tag| RemovedBlock { tag })
        .collect();
    removed.sort_by_key(|b| b.tag);

    Some(ScheduleDiff {
        removed,
        ..ScheduleDiff::default()
    })
}

/// Debounced recompute trigger.
///
/// Edits arrive in bursts; the worker coalesces every trigger inside the
/// debounce window into a single pass. A generation counter makes sure a
/// pass that raced with a newer trigger never publishes its result over
/// the fresher one.
pub struct RecomputeWorker {
    tx: mpsc::UnboundedSender<()>,
    generation: Arc<AtomicU64>,
}

impl RecomputeWorker {
    /// Spawn the worker. `run_pass` is invoked with the generation that
    /// was current when the debounce window closed; it should discard its
    /// result if `is_current` returns false afterwards.
    pub fn spawn<F>(debounce: StdDuration, mut run_pass: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let generation = Arc::new(AtomicU64::new(0));
        let gen_for_loop = Arc::clone(&generation);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Coalesce the burst: keep extending the window while
                // triggers keep arriving.
                loop {
                    tokio::time::sleep(debounce).await;
                    match rx.try_recv() {
                        Ok(()) => continue,
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => return,
                    }
                }
                let current = gen_for_loop.load(Ordering::SeqCst);
                run_pass(current);
            }
        });

        Self { tx, generation }
    }

    /// Request a recompute. Cheap, callable from any thread.
    pub fn trigger(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    /// Whether a pass started at `generation` is still the latest.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SessionTag;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::AtomicUsize;

    fn monday_8am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()
    }

    fn task(title: &str, days_out: u32, estimate: u32) -> Task {
        Task::new(
            title,
            NaiveDate::from_ymd_opt(2025, 3, 3 + days_out),
            estimate,
        )
    }

    #[test]
    fn pass_produces_additions_for_fresh_inputs() {
        let planner = Planner::new(PlanningSettings::default());
        let tasks = vec![task("Essay draft", 4, 60)];
        let outcome = planner.plan(&tasks, &[], &[], None, None, monday_8am());

        assert!(outcome.recomputed);
        assert_eq!(outcome.scheduled.len(), 1);
        assert_eq!(outcome.diff.added.len(), 1);
        assert_eq!(
            outcome.diff.added[0].tag,
            SessionTag::new(tasks[0].id, 0)
        );
    }

    #[test]
    fn matching_digest_skips_the_pass() {
        let planner = Planner::new(PlanningSettings::default());
        let tasks = vec![task("Essay draft", 4, 60)];
        let first = planner.plan(&tasks, &[], &[], None, None, monday_8am());

        let second = planner.plan(
            &tasks,
            &[],
            &[],
            Some(&first.input_hash),
            Some(&first.completion_hash),
            monday_8am(),
        );
        assert!(!second.recomputed);
        assert!(second.diff.is_empty());
        assert_eq!(second.input_hash, first.input_hash);
    }

    /// Stand-in for applied additions: the events a clean apply would leave
    /// on the calendar.
    fn materialize(diff: &ScheduleDiff) -> Vec<ExternalCalendarEvent> {
        diff.added
            .iter()
            .map(|block| ExternalCalendarEvent {
                id: block.tag.to_string(),
                title: block.title.clone(),
                start: block.start,
                end: block.end(),
                notes: block.tag.embed(""),
                calendar_id: "device".to_string(),
                writable: true,
            })
            .collect()
    }

    #[test]
    fn completion_toggle_removes_blocks_without_replacement() {
        let planner = Planner::new(PlanningSettings::default());
        let mut tasks = vec![task("Essay draft", 4, 60), task("Problem set", 2, 90)];
        let first = planner.plan(&tasks, &[], &[], None, None, monday_8am());
        let events = materialize(&first.diff);

        tasks[0].completed = true;
        let second = planner.plan(
            &tasks,
            &[],
            &events,
            Some(&first.input_hash),
            Some(&first.completion_hash),
            monday_8am(),
        );
        assert!(!second.recomputed);
        assert_ne!(second.completion_hash, first.completion_hash);
        // Only the finished task's block goes; the other stays untouched.
        assert_eq!(second.diff.removed.len(), 1);
        assert_eq!(second.diff.removed[0].tag.task_id, tasks[0].id);
        assert!(second.diff.added.is_empty());
        assert!(second.diff.moved.is_empty());
    }

    #[test]
    fn uncompleting_a_task_falls_back_to_a_full_pass() {
        let planner = Planner::new(PlanningSettings::default());
        let mut tasks = vec![task("Essay draft", 4, 60), task("Problem set", 2, 90)];
        let first = planner.plan(&tasks, &[], &[], None, None, monday_8am());
        let mut events = materialize(&first.diff);

        tasks[0].completed = true;
        let second = planner.plan(
            &tasks,
            &[],
            &events,
            Some(&first.input_hash),
            Some(&first.completion_hash),
            monday_8am(),
        );
        events.retain(|e| {
            !second
                .diff
                .removed
                .iter()
                .any(|r| e.tag() == Some(r.tag))
        });

        tasks[0].completed = false;
        let third = planner.plan(
            &tasks,
            &[],
            &events,
            Some(&second.input_hash),
            Some(&second.completion_hash),
            monday_8am(),
        );
        assert!(third.recomputed);
        assert!(third
            .scheduled
            .iter()
            .any(|s| s.session.task_id == tasks[0].id));
    }

    #[test]
    fn identical_passes_are_deterministic() {
        let planner = Planner::new(PlanningSettings::default());
        let tasks = vec![
            task("Essay draft", 4, 120),
            task("Problem set", 2, 90),
            task("Read chapter", 6, 45),
        ];
        let a = planner.plan(&tasks, &[], &[], None, None, monday_8am());
        let b = planner.plan(&tasks, &[], &[], None, None, monday_8am());
        assert_eq!(a.scheduled, b.scheduled);
        assert_eq!(a.input_hash, b.input_hash);
    }

    #[tokio::test]
    async fn worker_coalesces_a_burst_into_one_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let worker = RecomputeWorker::spawn(StdDuration::from_millis(20), move |_gen| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            worker.trigger();
        }
        tokio::time::sleep(StdDuration::from_millis(120)).await;
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_generation_is_detectable() {
        let worker = RecomputeWorker::spawn(StdDuration::from_millis(5), |_gen| {});
        worker.trigger();
        let seen = 1;
        worker.trigger();
        assert!(!worker.is_current(seen - 1));
        assert!(worker.is_current(2));
    }
}
