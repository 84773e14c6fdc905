//! Recurring task expansion commands.

use clap::Subcommand;
use studyplan_core::{next_occurrence, NoHolidays, PlanDb};

#[derive(Subcommand)]
pub enum RecurAction {
    /// Materialize the next occurrence of each completed recurring task
    Advance,
}

pub fn run(action: RecurAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RecurAction::Advance => advance(),
    }
}

fn advance() -> Result<(), Box<dyn std::error::Error>> {
    let db = PlanDb::open()?;
    let tasks = db.list_tasks()?;
    let mut created = 0usize;

    for task in tasks.iter().filter(|t| t.completed && t.recurrence.is_some()) {
        let Some(series_id) = task.series_id else {
            tracing::warn!(task = %task.id, "recurring task without series id; skipping");
            continue;
        };
        let existing = db.series_occurrence_indices(series_id)?;
        match next_occurrence(task, &existing, &NoHolidays) {
            Ok(Some(next)) => {
                db.create_task(&next)?;
                created += 1;
                println!(
                    "Created occurrence {} of '{}', due {}",
                    next.occurrence_index.unwrap_or(0),
                    next.title,
                    next.due.map(|d| d.to_string()).unwrap_or_default()
                );
            }
            Ok(None) => {}
            Err(e) => eprintln!("warning: {}: {e}", task.title),
        }
    }

    if created == 0 {
        println!("Nothing to advance.");
    }
    Ok(())
}
