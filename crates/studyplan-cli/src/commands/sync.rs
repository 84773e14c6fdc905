//! Calendar reconciliation commands.
//!
//! Works against a JSON calendar file standing in for a device calendar.
//! `diff` is read-only; `apply` rewrites the file.

use std::path::Path;

use clap::Subcommand;
use studyplan_core::{
    BusyInterval, JsonCalendar, PendingDiff, PlanDb, Planner, PlanningSettings,
    ReconciliationApplier, ScheduleDiff,
};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show the pending calendar changes without writing anything
    Diff {
        /// JSON calendar file
        #[arg(long)]
        calendar: String,
        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Write the pending changes to the calendar
    Apply {
        /// JSON calendar file
        #[arg(long)]
        calendar: String,
        /// Apply only entries not touching a conflict
        #[arg(long)]
        non_conflicting: bool,
    },
}

pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Diff { calendar, json } => {
            let cal = JsonCalendar::load(Path::new(&calendar))?;
            let diff = compute_diff(&cal)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else if diff.is_empty() {
                println!("Calendar is up to date.");
            } else {
                print_diff(&diff);
            }
            Ok(())
        }
        SyncAction::Apply {
            calendar,
            non_conflicting,
        } => {
            let path = Path::new(&calendar);
            let mut cal = JsonCalendar::load(path)?;
            let diff = compute_diff(&cal)?;
            if diff.is_empty() {
                println!("Calendar is up to date.");
                return Ok(());
            }

            let applier = ReconciliationApplier::new();
            let report = if non_conflicting {
                let mut pending = PendingDiff::new(diff);
                let report = applier.apply_non_conflicting(&mut pending, &mut cal);
                if !pending.is_settled() {
                    println!(
                        "{} conflicting change(s) left pending.",
                        pending.diff.conflicts.len()
                    );
                }
                report
            } else {
                applier.apply(&diff, &mut cal)
            };

            cal.save(path)?;
            println!(
                "Applied: {} created, {} updated, {} deleted, {} skipped.",
                report.created, report.updated, report.deleted, report.skipped
            );
            for failure in &report.failures {
                eprintln!("warning: {} {} failed: {}", failure.operation, failure.tag, failure.error);
            }
            Ok(())
        }
    }
}

/// Recompute the plan from stored tasks and diff it against the calendar.
fn compute_diff(cal: &JsonCalendar) -> Result<ScheduleDiff, Box<dyn std::error::Error>> {
    let settings = PlanningSettings::load()?;
    let db = PlanDb::open()?;
    let tasks = db.list_tasks()?;

    let busy: Vec<BusyInterval> = cal
        .events
        .iter()
        .filter(|e| e.tag().is_none())
        .map(|e| BusyInterval {
            start: e.start,
            end: e.end,
        })
        .collect();

    let planner = Planner::new(settings);
    let outcome = planner.plan(&tasks, &busy, &cal.events, None, None, chrono::Utc::now());
    Ok(outcome.diff)
}

fn print_diff(diff: &ScheduleDiff) {
    if !diff.added.is_empty() {
        println!("Add:");
        for block in &diff.added {
            println!(
                "  {}  {} ({} min) at {}",
                block.tag,
                block.title,
                block.duration_minutes,
                block.start.format("%Y-%m-%d %H:%M")
            );
        }
    }
    if !diff.moved.is_empty() {
        println!("Move:");
        for block in &diff.moved {
            println!("  {} -> {}", block.tag, block.new_start.format("%Y-%m-%d %H:%M"));
        }
    }
    if !diff.resized.is_empty() {
        println!("Resize:");
        for block in &diff.resized {
            println!("  {} -> {} min", block.tag, block.new_duration_minutes);
        }
    }
    if !diff.removed.is_empty() {
        println!("Remove:");
        for block in &diff.removed {
            println!("  {}", block.tag);
        }
    }
    if !diff.conflicts.is_empty() {
        println!("Conflicts:");
        for conflict in &diff.conflicts {
            println!("  {}: {}", conflict.tag, conflict.reason);
        }
    }
}
