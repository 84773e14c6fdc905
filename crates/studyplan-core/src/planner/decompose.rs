//! Splitting a task's estimated effort into candidate sessions.

use crate::planner::session::CandidateSession;
use crate::storage::PlanningSettings;
use crate::task::Task;

/// Decompose one task into an ordered list of candidate sessions.
///
/// Locked tasks produce exactly one session pinned to the due instant.
/// Otherwise the estimate is split into the smallest number of blocks in
/// `[min_block, max_block]` whose sum covers it; the last session absorbs
/// the remainder. Ordering is deterministic given identical task fields,
/// which is what keeps tags stable across runs.
///
/// Tasks without a due date, completed tasks, and zero-estimate tasks
/// produce nothing.
pub fn sessions_for(task: &Task, settings: &PlanningSettings) -> Vec<CandidateSession> {
    let Some(due) = task.due else {
        return Vec::new();
    };
    if !task.needs_scheduling() {
        return Vec::new();
    }

    let make = |index: u32, count: u32, minutes: u32| CandidateSession {
        task_id: task.id,
        session_index: index,
        session_count: count,
        title: task.title.clone(),
        due,
        due_time_minutes: task.due_time_minutes,
        estimated_minutes: minutes,
        locked_to_due_date: task.locked,
        category: task.category,
        urgency: task.importance,
        difficulty: task.difficulty,
    };

    if task.locked {
        return vec![make(0, 1, task.estimated_minutes)];
    }

    let (min_block, max_block) = effective_blocks(task, settings);
    let estimate = task.estimated_minutes;

    // Smallest N with N * max_block >= estimate.
    let count = estimate.div_ceil(max_block).max(1);
    let base = estimate / count;
    let remainder = estimate % count;

    (0..count)
        .map(|index| {
            // Earlier sessions take the larger share so the tail stays small.
            let mut minutes = base + if index < remainder { 1 } else { 0 };
            minutes = minutes.clamp(min_block, max_block);
            if index == count - 1 {
                // Last session absorbs whatever the clamped siblings left over.
                let placed: u32 = (0..count - 1)
                    .map(|i| (base + if i < remainder { 1 } else { 0 }).clamp(min_block, max_block))
                    .sum();
                minutes = estimate.saturating_sub(placed).clamp(min_block, max_block);
            }
            make(index, count, minutes)
        })
        .collect()
}

/// Per-task block bounds, falling back to settings when unset or inverted.
fn effective_blocks(task: &Task, settings: &PlanningSettings) -> (u32, u32) {
    let mut min_block = if task.min_block_minutes > 0 {
        task.min_block_minutes
    } else {
        settings.min_block_minutes
    };
    let mut max_block = if task.max_block_minutes > 0 {
        task.max_block_minutes
    } else {
        settings.max_block_minutes
    };
    if max_block == 0 {
        max_block = 60;
    }
    if min_block > max_block {
        min_block = max_block;
    }
    (min_block, max_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task(estimate: u32, min_block: u32, max_block: u32) -> Task {
        let mut t = Task::new("Reading ch. 4", NaiveDate::from_ymd_opt(2025, 5, 2), estimate);
        t.min_block_minutes = min_block;
        t.max_block_minutes = max_block;
        t
    }

    #[test]
    fn splits_estimate_across_min_max_blocks() {
        let sessions = sessions_for(&task(120, 30, 90), &PlanningSettings::default());
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].estimated_minutes + sessions[1].estimated_minutes, 120);
        assert!(sessions.iter().all(|s| (30..=90).contains(&s.estimated_minutes)));
        assert_eq!(sessions[0].session_index, 0);
        assert_eq!(sessions[1].session_index, 1);
        assert_eq!(sessions[0].session_count, 2);
    }

    #[test]
    fn single_block_when_estimate_fits() {
        let sessions = sessions_for(&task(45, 20, 60), &PlanningSettings::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].estimated_minutes, 45);
    }

    #[test]
    fn short_estimate_clamps_up_to_min_block() {
        let sessions = sessions_for(&task(10, 20, 60), &PlanningSettings::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].estimated_minutes, 20);
    }

    #[test]
    fn locked_task_yields_one_pinned_session() {
        let mut t = task(180, 30, 60);
        t.locked = true;
        let sessions = sessions_for(&t, &PlanningSettings::default());
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].locked_to_due_date);
        assert_eq!(sessions[0].estimated_minutes, 180);
    }

    #[test]
    fn completed_and_dateless_tasks_produce_nothing() {
        let mut done = task(60, 20, 60);
        done.completed = true;
        assert!(sessions_for(&done, &PlanningSettings::default()).is_empty());

        let mut dateless = task(60, 20, 60);
        dateless.due = None;
        assert!(sessions_for(&dateless, &PlanningSettings::default()).is_empty());
    }

    #[test]
    fn decomposition_is_deterministic() {
        let t = task(250, 25, 80);
        let a = sessions_for(&t, &PlanningSettings::default());
        let b = sessions_for(&t, &PlanningSettings::default());
        assert_eq!(a, b);
    }
}
