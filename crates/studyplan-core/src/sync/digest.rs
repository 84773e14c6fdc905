//! Input fingerprints that gate recomputation.
//!
//! Two digests cover the two kinds of change worth reacting to: the
//! scheduling digest covers everything that can alter placement, while the
//! completion digest only tracks done-ness so a checkbox toggle can refresh
//! views without rebuilding the whole plan. Cosmetic fields (titles, notes)
//! are deliberately outside both.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::planner::BusyInterval;
use crate::storage::PlanningSettings;
use crate::task::Task;

#[derive(Serialize)]
struct TaskFingerprint<'a> {
    id: &'a uuid::Uuid,
    due: Option<chrono::NaiveDate>,
    due_time_minutes: Option<u32>,
    estimated_minutes: u32,
    min_block_minutes: u32,
    max_block_minutes: u32,
    difficulty: f64,
    importance: f64,
    locked: bool,
}

/// The settings knobs that can move a session. `debounce_ms` only tunes
/// the worker, so it stays out of the fingerprint.
#[derive(Serialize)]
struct SettingsFingerprint<'a> {
    workday_start_hour: u32,
    workday_end_hour: u32,
    min_block_minutes: u32,
    max_block_minutes: u32,
    horizon_days: u32,
    max_study_minutes_per_day: u32,
    hour_weights: &'a [f64; 24],
}

/// Digest over every input that can change where a session lands.
///
/// Completion is deliberately excluded: a checkbox toggle is routed
/// through the completion digest instead of forcing a full re-placement.
pub fn scheduling_digest(tasks: &[Task], busy: &[BusyInterval], settings: &PlanningSettings) -> String {
    let mut fingerprints: Vec<TaskFingerprint<'_>> = tasks
        .iter()
        .map(|t| TaskFingerprint {
            id: &t.id,
            due: t.due,
            due_time_minutes: t.due_time_minutes,
            estimated_minutes: t.estimated_minutes,
            min_block_minutes: t.min_block_minutes,
            max_block_minutes: t.max_block_minutes,
            difficulty: t.difficulty,
            importance: t.importance,
            locked: t.locked,
        })
        .collect();
    fingerprints.sort_by(|a, b| a.id.cmp(b.id));

    let mut intervals: Vec<(String, String)> = busy
        .iter()
        .map(|b| (b.start.to_rfc3339(), b.end.to_rfc3339()))
        .collect();
    intervals.sort();

    let mut hasher = Sha256::new();
    hasher.update(b"tasks:");
    hasher.update(canonical(&fingerprints));
    hasher.update(b"|busy:");
    hasher.update(canonical(&intervals));
    hasher.update(b"|settings:");
    hasher.update(canonical(&SettingsFingerprint {
        workday_start_hour: settings.workday_start_hour,
        workday_end_hour: settings.workday_end_hour,
        min_block_minutes: settings.min_block_minutes,
        max_block_minutes: settings.max_block_minutes,
        horizon_days: settings.horizon_days,
        max_study_minutes_per_day: settings.max_study_minutes_per_day,
        hour_weights: &settings.hour_weights,
    }));
    hex::encode(hasher.finalize())
}

/// Digest over completion state only, sorted by task id.
pub fn completion_digest(tasks: &[Task]) -> String {
    let mut states: Vec<(&uuid::Uuid, bool)> = tasks.iter().map(|t| (&t.id, t.completed)).collect();
    states.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    hasher.update(canonical(&states));
    hex::encode(hasher.finalize())
}

fn canonical<T: Serialize>(value: &T) -> Vec<u8> {
    // Struct fields serialize in declaration order, so the encoding is
    // stable for a given crate version.
    serde_json::to_vec(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(estimate: u32) -> Task {
        Task::new("Essay draft", None, estimate)
    }

    #[test]
    fn digest_is_stable_for_identical_inputs() {
        let tasks = vec![task(60), task(90)];
        let settings = PlanningSettings::default();
        let a = scheduling_digest(&tasks, &[], &settings);
        let b = scheduling_digest(&tasks, &[], &settings);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn digest_ignores_task_ordering() {
        let t1 = task(60);
        let t2 = task(90);
        let settings = PlanningSettings::default();
        let forward = scheduling_digest(&[t1.clone(), t2.clone()], &[], &settings);
        let backward = scheduling_digest(&[t2, t1], &[], &settings);
        assert_eq!(forward, backward);
    }

    #[test]
    fn digest_ignores_title_edits() {
        let mut t = task(60);
        let settings = PlanningSettings::default();
        let before = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        t.title = "Essay final".to_string();
        let after = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        assert_eq!(before, after);
    }

    #[test]
    fn digest_reacts_to_estimate_change() {
        let mut t = task(60);
        let settings = PlanningSettings::default();
        let before = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        t.estimated_minutes = 61;
        let after = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        assert_ne!(before, after);
    }

    #[test]
    fn digest_ignores_completion_toggles() {
        let mut t = task(60);
        let settings = PlanningSettings::default();
        let before = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        t.completed = true;
        let after = scheduling_digest(std::slice::from_ref(&t), &[], &settings);
        assert_eq!(before, after);
    }

    #[test]
    fn digest_ignores_debounce_tuning() {
        let tasks = vec![task(60)];
        let mut settings = PlanningSettings::default();
        let before = scheduling_digest(&tasks, &[], &settings);
        settings.debounce_ms = 1500;
        assert_eq!(before, scheduling_digest(&tasks, &[], &settings));
        settings.workday_end_hour = 20;
        assert_ne!(before, scheduling_digest(&tasks, &[], &settings));
    }

    #[test]
    fn completion_digest_tracks_only_done_state() {
        let mut t = task(60);
        let before = completion_digest(std::slice::from_ref(&t));
        t.estimated_minutes = 999;
        assert_eq!(before, completion_digest(std::slice::from_ref(&t)));
        t.completed = true;
        assert_ne!(before, completion_digest(std::slice::from_ref(&t)));
    }
}
