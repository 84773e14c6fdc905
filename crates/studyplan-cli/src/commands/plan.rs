//! Planning pass commands.

use clap::Subcommand;
use studyplan_core::{BusyInterval, JsonCalendar, PlanDb, Planner, PlanningSettings};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Recompute the schedule and persist it
    Run {
        /// JSON calendar file to diff against and treat as busy time
        #[arg(long)]
        calendar: Option<String>,
        /// Recompute even when inputs are unchanged
        #[arg(long)]
        force: bool,
    },
    /// Show the persisted schedule
    Show {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Drop the persisted plan, keeping tasks
    Reset,
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PlanAction::Run { calendar, force } => run_pass(calendar.as_deref(), force),
        PlanAction::Show { json } => show(json),
        PlanAction::Reset => {
            let db = PlanDb::open()?;
            let dropped = db.reset_plan()?;
            println!("Dropped {dropped} persisted session(s).");
            Ok(())
        }
    }
}

fn run_pass(calendar_path: Option<&str>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let settings = PlanningSettings::load()?;
    let mut db = PlanDb::open()?;
    let tasks = db.list_tasks()?;

    let (events, busy) = match calendar_path {
        Some(path) => {
            let calendar = JsonCalendar::load(std::path::Path::new(path))?;
            // Untagged events are other people's time; tagged ones are
            // ours and get diffed instead.
            let busy: Vec<BusyInterval> = calendar
                .events
                .iter()
                .filter(|e| e.tag().is_none())
                .map(|e| BusyInterval {
                    start: e.start,
                    end: e.end,
                })
                .collect();
            (calendar.events, busy)
        }
        None => (Vec::new(), Vec::new()),
    };

    let (last_hash, last_completion) = if force {
        (None, None)
    } else {
        (db.last_input_hash()?, db.last_completion_hash()?)
    };
    let planner = Planner::new(settings);
    let outcome = planner.plan(
        &tasks,
        &busy,
        &events,
        last_hash.as_deref(),
        last_completion.as_deref(),
        chrono::Utc::now(),
    );

    if !outcome.recomputed {
        if last_completion.as_deref() != Some(outcome.completion_hash.as_str()) {
            db.set_last_completion_hash(&outcome.completion_hash)?;
        }
        if outcome.diff.is_empty() {
            println!("Inputs unchanged; plan is up to date.");
            return Ok(());
        }
        // Completion-only change: drop the done tasks' stored sessions,
        // leave the rest of the plan in place.
        for task in tasks.iter().filter(|t| t.completed) {
            db.clear_sessions_for_task(&task.id)?;
        }
        println!(
            "Completion change: {} block(s) to remove, nothing re-planned.",
            outcome.diff.removed.len()
        );
        println!("Run `studyplan sync apply` to reconcile.");
        return Ok(());
    }

    db.persist_plan(&outcome.scheduled, &outcome.overflow, &outcome.meta)?;
    db.set_last_completion_hash(&outcome.completion_hash)?;

    println!(
        "Planned {} session(s), {} overflow.",
        outcome.scheduled.len(),
        outcome.overflow.len()
    );
    if !outcome.diff.is_empty() {
        println!("Calendar changes pending: {}", outcome.diff.summary());
        println!("Run `studyplan sync apply` to reconcile.");
    }
    if !outcome.diff.conflicts.is_empty() {
        println!("Conflicts:");
        for conflict in &outcome.diff.conflicts {
            println!("  {}: {}", conflict.tag, conflict.reason);
        }
    }

    Ok(())
}

fn show(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = PlanDb::open()?;
    let sessions = db.list_scheduled_sessions()?;
    let overflow = db.list_overflow_sessions()?;

    if json {
        let value = serde_json::json!({
            "scheduled": sessions,
            "overflow": overflow,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if sessions.is_empty() && overflow.is_empty() {
        println!("No plan yet. Run `studyplan plan run`.");
        return Ok(());
    }

    for session in &sessions {
        let marker = if session.is_user_edited { "*" } else { " " };
        println!(
            "{marker} {} - {}  {} ({}/{})",
            session.start.format("%Y-%m-%d %H:%M"),
            session.end.format("%H:%M"),
            session.title,
            session.session_index + 1,
            session.session_count
        );
    }
    if !overflow.is_empty() {
        println!("Could not fit before due date:");
        for item in &overflow {
            let due = item
                .due
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {} ({} min, due {due})", item.title, item.estimated_minutes);
        }
    }

    Ok(())
}
