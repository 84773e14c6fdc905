//! End-to-end tests for the planning pipeline.
//!
//! Each scenario drives the real pipeline against a JSON-file calendar:
//! plan, reconcile, recompute, and check that repeated runs converge to
//! an empty diff.

use chrono::{DateTime, Days, Duration, Utc};
use uuid::Uuid;

use studyplan_core::{
    build_diff, proposed_blocks, JsonCalendar, PlanDb, Planner, PlanningSettings, ProposalMetadata,
    ReconciliationApplier, SessionTag, Task,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Anchor every scenario near the real clock so the applier's event
/// listing window covers the placed sessions. Each scenario captures one
/// instant and reuses it for every pass; placement is a function of `now`,
/// so passes sharing an instant are comparable.
fn now() -> DateTime<Utc> {
    Utc::now()
}

fn task_due_in(title: &str, days: u64, estimated_minutes: u32) -> Task {
    let due = Utc::now().date_naive().checked_add_days(Days::new(days));
    Task::new(title, due, estimated_minutes)
}

fn plan_and_apply(
    planner: &Planner,
    tasks: &[Task],
    calendar: &mut JsonCalendar,
    last_hash: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    let events = calendar.events.clone();
    let outcome = planner.plan(tasks, &[], &events, last_hash, None, at);
    let report = ReconciliationApplier::new().apply(&outcome.diff, calendar);
    assert!(report.is_clean(), "apply failed: {:?}", report.failures);
    outcome.input_hash
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn plan_apply_replan_converges_to_empty_diff() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![
        task_due_in("Essay draft", 5, 180),
        task_due_in("Problem set", 3, 60),
    ];
    let mut calendar = JsonCalendar::new("device");

    plan_and_apply(&planner, &tasks, &mut calendar, None, at);
    assert_eq!(calendar.events.len(), 3); // 180 splits into two sessions

    // Same inputs, calendar now materialized: the diff must be empty.
    let outcome = planner.plan(&tasks, &[], &calendar.events.clone(), None, None, at);
    assert!(
        outcome.diff.is_empty(),
        "expected convergence, got {}",
        outcome.diff.summary()
    );
}

#[test]
fn digest_gate_skips_recompute_for_unchanged_inputs() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let mut calendar = JsonCalendar::new("device");

    let hash = plan_and_apply(&planner, &tasks, &mut calendar, None, at);
    let completion = studyplan_core::completion_digest(&tasks);
    let outcome = planner.plan(
        &tasks,
        &[],
        &calendar.events.clone(),
        Some(&hash),
        Some(&completion),
        at,
    );
    assert!(!outcome.recomputed);
    assert!(outcome.diff.is_empty());
}

#[test]
fn completing_a_task_clears_only_its_events() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let mut tasks = vec![
        task_due_in("Essay draft", 5, 60),
        task_due_in("Problem set", 3, 60),
    ];
    let mut calendar = JsonCalendar::new("device");
    let hash = plan_and_apply(&planner, &tasks, &mut calendar, None, at);
    let completion = studyplan_core::completion_digest(&tasks);
    assert_eq!(calendar.events.len(), 2);

    tasks[0].completed = true;
    let outcome = planner.plan(
        &tasks,
        &[],
        &calendar.events.clone(),
        Some(&hash),
        Some(&completion),
        at,
    );
    // Checking a box must not re-place the other task's block.
    assert!(!outcome.recomputed);
    assert!(outcome.diff.moved.is_empty());
    assert!(outcome.diff.added.is_empty());
    assert_eq!(outcome.diff.removed.len(), 1);

    ReconciliationApplier::new().apply(&outcome.diff, &mut calendar);
    assert_eq!(calendar.events.len(), 1);
    assert_eq!(
        calendar.events[0].tag().map(|t| t.task_id),
        Some(tasks[1].id)
    );
}

#[test]
fn removing_a_task_removes_its_events() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let mut tasks = vec![
        task_due_in("Essay draft", 5, 60),
        task_due_in("Problem set", 3, 60),
    ];
    let mut calendar = JsonCalendar::new("device");
    plan_and_apply(&planner, &tasks, &mut calendar, None, at);
    assert_eq!(calendar.events.len(), 2);

    let removed_id = tasks.pop().unwrap().id;
    let outcome = planner.plan(&tasks, &[], &calendar.events.clone(), None, None, at);
    assert_eq!(outcome.diff.removed.len(), 1);
    assert_eq!(outcome.diff.removed[0].tag.task_id, removed_id);

    ReconciliationApplier::new().apply(&outcome.diff, &mut calendar);
    assert_eq!(calendar.events.len(), 1);
}

#[test]
fn untagged_events_are_never_touched() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let mut calendar = JsonCalendar::new("device");

    // A hand-made event with no tag in its notes.
    calendar.events.push(studyplan_core::ExternalCalendarEvent {
        id: "manual-1".to_string(),
        title: "Dentist".to_string(),
        start: at + Duration::hours(2),
        end: at + Duration::hours(3),
        notes: "bring insurance card".to_string(),
        calendar_id: "device".to_string(),
        writable: true,
    });

    plan_and_apply(&planner, &tasks, &mut calendar, None, at);
    let outcome = planner.plan(&tasks, &[], &calendar.events.clone(), None, None, at);
    assert!(outcome.diff.is_empty());
    assert!(calendar.events.iter().any(|e| e.id == "manual-1"));
}

#[test]
fn tag_survives_user_note_edits() {
    let at = now();
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let mut calendar = JsonCalendar::new("device");
    plan_and_apply(&planner, &tasks, &mut calendar, None, at);

    let tag = calendar.events[0].tag().unwrap();
    calendar.events[0].notes = format!("remember citations!\n{}", calendar.events[0].notes);
    assert_eq!(calendar.events[0].tag(), Some(tag));

    let outcome = planner.plan(&tasks, &[], &calendar.events.clone(), None, None, at);
    assert!(outcome.diff.added.is_empty(), "edited notes must not orphan the event");
}

#[test]
fn partial_apply_keeps_conflicts_pending() {
    use studyplan_core::{PendingDiff, ProposedBlock, ScheduleConflict};

    let mut calendar = JsonCalendar::new("device");
    let clean_tag = SessionTag::new(Uuid::new_v4(), 0);
    let dirty_tag = SessionTag::new(Uuid::new_v4(), 0);
    let blocks = vec![
        ProposedBlock {
            tag: clean_tag,
            title: "Homework Session".to_string(),
            start: now() + Duration::hours(1),
            duration_minutes: 60,
        },
        ProposedBlock {
            tag: dirty_tag,
            title: "Homework Session".to_string(),
            start: now() + Duration::hours(2),
            duration_minutes: 60,
        },
    ];
    let conflicts = vec![ScheduleConflict {
        tag: dirty_tag,
        conflicting_tag: None,
        reason: "overlaps a pinned session".to_string(),
    }];

    let mut pending = PendingDiff::new(build_diff(&blocks, &[], conflicts));
    let report = ReconciliationApplier::new().apply_non_conflicting(&mut pending, &mut calendar);

    assert_eq!(report.created, 1);
    assert_eq!(calendar.events[0].tag(), Some(clean_tag));
    assert!(!pending.is_settled());
    assert_eq!(pending.diff.added.len(), 1);
    assert_eq!(pending.diff.added[0].tag, dirty_tag);
}

#[test]
fn persisted_plan_survives_through_sqlite_and_user_edit() {
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let outcome = planner.plan(&tasks, &[], &[], None, None, now());

    let mut db = PlanDb::open_memory().unwrap();
    for task in &tasks {
        db.create_task(task).unwrap();
    }
    db.persist_plan(&outcome.scheduled, &outcome.overflow, &outcome.meta)
        .unwrap();

    // The user drags the session to the evening.
    let tag = outcome.scheduled[0].tag();
    let evening = now() + Duration::hours(10);
    db.mark_session_user_edited(tag, evening, evening + Duration::hours(1))
        .unwrap();

    // A recompute from the same inputs must not undo the edit.
    db.persist_plan(&outcome.scheduled, &outcome.overflow, &outcome.meta)
        .unwrap();
    let stored = db.list_scheduled_sessions().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_user_edited);
    assert_eq!(stored[0].start, evening);
}

#[test]
fn overflow_is_reported_not_errored() {
    let planner = Planner::new(PlanningSettings::default());
    // More work than two whole workdays can hold, due tomorrow.
    let tasks = vec![task_due_in("Cram everything", 1, 1600)];
    let outcome = planner.plan(&tasks, &[], &[], None, None, now());

    assert!(outcome.recomputed);
    assert!(!outcome.overflow.is_empty());
    let placed: u32 = outcome
        .scheduled
        .iter()
        .map(|s| s.session.estimated_minutes)
        .sum();
    let spilled: u32 = outcome
        .overflow
        .iter()
        .map(|o| o.session.estimated_minutes)
        .sum();
    assert_eq!(placed + spilled, 1600);
}

#[test]
fn calendar_file_round_trips_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calendar.json");

    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let mut calendar = JsonCalendar::new("device");
    plan_and_apply(&planner, &tasks, &mut calendar, None, now());
    calendar.save(&path).unwrap();

    let reloaded = JsonCalendar::load(&path).unwrap();
    assert_eq!(reloaded.events.len(), calendar.events.len());
    assert_eq!(reloaded.events[0].tag(), calendar.events[0].tag());
}

#[test]
fn proposal_metadata_carries_the_input_hash() {
    let planner = Planner::new(PlanningSettings::default());
    let tasks = vec![task_due_in("Essay draft", 5, 60)];
    let outcome = planner.plan(&tasks, &[], &[], None, None, now());

    assert_eq!(outcome.meta.input_hash, outcome.input_hash);
    let blocks = proposed_blocks(&outcome.scheduled);
    assert_eq!(blocks.len(), outcome.scheduled.len());
    let _ = ProposalMetadata::new(outcome.input_hash.clone(), now());
}
