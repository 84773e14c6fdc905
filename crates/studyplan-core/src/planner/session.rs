//! Ephemeral session types flowing through the planner.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::SessionTag;
use crate::task::TaskCategory;

/// A candidate work session produced by decomposition, not yet placed.
///
/// Recomputed every pass and never persisted directly; identity across
/// runs is `(task_id, session_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSession {
    pub task_id: Uuid,
    pub session_index: u32,
    /// Total number of sibling sessions for the owning task.
    pub session_count: u32,
    pub title: String,
    pub due: NaiveDate,
    pub due_time_minutes: Option<u32>,
    pub estimated_minutes: u32,
    pub locked_to_due_date: bool,
    pub category: TaskCategory,
    /// Importance carried over from the task, drives placement order.
    pub urgency: f64,
    pub difficulty: f64,
}

impl CandidateSession {
    /// Stable tag identifying this session across runs.
    pub fn tag(&self) -> SessionTag {
        SessionTag::new(self.task_id, self.session_index)
    }

    /// The instant work on this session must be finished by.
    pub fn due_instant(&self) -> DateTime<Utc> {
        let base = Utc.from_utc_datetime(&self.due.and_time(NaiveTime::MIN));
        match self.due_time_minutes {
            Some(minutes) => base + Duration::minutes(i64::from(minutes)),
            None => base + Duration::minutes(23 * 60 + 59),
        }
    }
}

/// A candidate session with a concrete start/end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedSession {
    pub session: CandidateSession,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PlacedSession {
    pub fn tag(&self) -> SessionTag {
        self.session.tag()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this session overlaps a time range.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// A candidate session that could not be placed before its due date.
///
/// Retains the original candidate fields for display and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowSession {
    pub session: CandidateSession,
}

/// A pre-existing commitment the scheduler must not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}
