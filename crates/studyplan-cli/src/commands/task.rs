//! Task management commands.

use chrono::NaiveDate;
use clap::Subcommand;
use studyplan_core::{Frequency, PlanDb, RecurrenceRule, Task, TaskCategory};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Due time of day, HH:MM
        #[arg(long)]
        due_time: Option<String>,
        /// Estimated effort in minutes
        #[arg(long, default_value = "60")]
        estimate: u32,
        /// Category: homework, reading, review, exam, quiz, project, practice-test
        #[arg(long, default_value = "homework")]
        category: String,
        /// Difficulty in [0, 1]
        #[arg(long, default_value = "0.5")]
        difficulty: f64,
        /// Importance in [0, 1]
        #[arg(long, default_value = "0.5")]
        importance: f64,
        /// Pin the single session at the due instant (exams, quizzes)
        #[arg(long)]
        locked: bool,
        /// Recur: daily, weekly, monthly, or yearly
        #[arg(long)]
        repeat: Option<String>,
        /// Recurrence interval (e.g. 2 for every other week)
        #[arg(long, default_value = "1")]
        every: u32,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mark a task complete
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a task and its sessions
    Remove {
        /// Task ID
        id: String,
    },
}

fn parse_category(s: &str) -> TaskCategory {
    match s {
        "reading" => TaskCategory::Reading,
        "review" => TaskCategory::Review,
        "exam" => TaskCategory::Exam,
        "quiz" => TaskCategory::Quiz,
        "project" => TaskCategory::Project,
        "practice-test" => TaskCategory::PracticeTest,
        _ => TaskCategory::Homework,
    }
}

fn parse_due(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}', expected YYYY-MM-DD").into())
}

fn parse_due_time(s: &str) -> Result<u32, Box<dyn std::error::Error>> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid time '{s}', expected HH:MM"))?;
    let hours: u32 = h.parse().map_err(|_| format!("invalid time '{s}'"))?;
    let minutes: u32 = m.parse().map_err(|_| format!("invalid time '{s}'"))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("invalid time '{s}'").into());
    }
    Ok(hours * 60 + minutes)
}

fn parse_frequency(s: &str) -> Result<Frequency, Box<dyn std::error::Error>> {
    match s {
        "daily" => Ok(Frequency::Daily),
        "weekly" => Ok(Frequency::Weekly),
        "monthly" => Ok(Frequency::Monthly),
        "yearly" => Ok(Frequency::Yearly),
        other => Err(format!("unknown frequency '{other}'").into()),
    }
}

fn find_task(db: &PlanDb, id: &str) -> Result<Task, Box<dyn std::error::Error>> {
    let uuid = Uuid::parse_str(id).map_err(|_| format!("invalid task id '{id}'"))?;
    db.get_task(uuid)?
        .ok_or_else(|| format!("no task with id {id}").into())
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = PlanDb::open()?;

    match action {
        TaskAction::Add {
            title,
            due,
            due_time,
            estimate,
            category,
            difficulty,
            importance,
            locked,
            repeat,
            every,
        } => {
            let due = due.as_deref().map(parse_due).transpose()?;
            let mut task = Task::new(title, due, estimate);
            task.due_time_minutes = due_time.as_deref().map(parse_due_time).transpose()?;
            task.category = parse_category(&category);
            task.difficulty = difficulty.clamp(0.0, 1.0);
            task.importance = importance.clamp(0.0, 1.0);
            task.locked = locked;
            if let Some(freq) = repeat {
                if due.is_none() {
                    return Err("a recurring task needs a due date".into());
                }
                task.recurrence = Some(RecurrenceRule::every(parse_frequency(&freq)?, every.max(1)));
                task.series_id = Some(Uuid::new_v4());
                task.occurrence_index = Some(0);
            }
            db.create_task(&task)?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { all, json } => {
            let tasks: Vec<_> = db
                .list_tasks()?
                .into_iter()
                .filter(|t| all || !t.completed)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in &tasks {
                    let due = task
                        .due
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "no due date".to_string());
                    let done = if task.completed { "x" } else { " " };
                    println!(
                        "[{done}] {}  {}  ({} min, due {due})",
                        task.id,
                        task.title,
                        task.estimated_minutes
                    );
                }
            }
        }
        TaskAction::Done { id } => {
            let mut task = find_task(&db, &id)?;
            task.completed = true;
            db.update_task(&task)?;
            println!("Task completed: {}", task.title);
        }
        TaskAction::Remove { id } => {
            let task = find_task(&db, &id)?;
            db.delete_task(task.id)?;
            println!("Task removed: {}", task.title);
        }
    }

    Ok(())
}
