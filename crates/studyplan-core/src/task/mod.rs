//! Task domain types.
//!
//! A [`Task`] is one unit of academic work fed into the planner: an
//! assignment, exam, quiz, reading and so on. Due dates are date-only with
//! an optional minutes-from-midnight offset, matching how syllabi state
//! deadlines ("due Friday", "due Friday 23:59").

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::RecurrenceRule;

/// Category of academic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Homework,
    Reading,
    Review,
    Exam,
    Quiz,
    Project,
    PracticeTest,
}

impl TaskCategory {
    /// Display label used in generated calendar event titles.
    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Homework => "Homework",
            TaskCategory::Reading => "Reading",
            TaskCategory::Review => "Review",
            TaskCategory::Exam => "Exam",
            TaskCategory::Quiz => "Quiz",
            TaskCategory::Project => "Project",
            TaskCategory::PracticeTest => "Practice Test",
        }
    }
}

/// One unit of academic work.
///
/// Invariants:
/// - a task carrying a recurrence rule always has a due date;
/// - a generated occurrence carries the same `series_id` as its parent and
///   a strictly increasing `occurrence_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    /// Owning course, if any (personal tasks have none).
    pub course_id: Option<Uuid>,
    /// Due date, date-only. Recurring tasks must have one.
    pub due: Option<NaiveDate>,
    /// Optional due time as minutes from midnight.
    pub due_time_minutes: Option<u32>,
    /// Total estimated effort in minutes.
    pub estimated_minutes: u32,
    /// Smallest useful work block for this task.
    pub min_block_minutes: u32,
    /// Largest tolerable work block for this task.
    pub max_block_minutes: u32,
    /// Subjective difficulty in [0, 1].
    pub difficulty: f64,
    /// Subjective importance in [0, 1].
    pub importance: f64,
    pub category: TaskCategory,
    pub completed: bool,
    /// Locked tasks must not move off their due date.
    pub locked: bool,
    pub recurrence: Option<RecurrenceRule>,
    /// Identity shared by every occurrence generated from one rule.
    pub series_id: Option<Uuid>,
    /// Position of this occurrence within its series, starting at 0.
    pub occurrence_index: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with sensible defaults for the optional fields.
    pub fn new(title: impl Into<String>, due: Option<NaiveDate>, estimated_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            course_id: None,
            due,
            due_time_minutes: None,
            estimated_minutes,
            min_block_minutes: 20,
            max_block_minutes: 120,
            difficulty: 0.5,
            importance: 0.5,
            category: TaskCategory::Homework,
            completed: false,
            locked: false,
            recurrence: None,
            series_id: None,
            occurrence_index: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The concrete due instant: due date plus the time offset, or end of
    /// day (23:59) when no explicit time was given.
    pub fn due_instant(&self) -> Option<DateTime<Utc>> {
        let due = self.due?;
        let base = Utc.from_utc_datetime(&due.and_time(NaiveTime::MIN));
        match self.due_time_minutes {
            Some(minutes) => Some(base + Duration::minutes(i64::from(minutes))),
            None => Some(base + Duration::minutes(23 * 60 + 59)),
        }
    }

    /// Whether this task still needs scheduling.
    pub fn needs_scheduling(&self) -> bool {
        !self.completed && self.estimated_minutes > 0
    }
}
