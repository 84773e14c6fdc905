//! # StudyPlan Core Library
//!
//! This library provides the core business logic for StudyPlan, a planner
//! that turns academic tasks (assignments, exams, quizzes) with due dates
//! and effort estimates into a day-by-day schedule of work sessions, and
//! keeps that schedule synchronized with an externally editable calendar.
//!
//! ## Architecture
//!
//! - **Recurrence**: pure next-occurrence expansion with skip-weekend /
//!   skip-holiday adjustment and termination guarantees
//! - **Planner**: session decomposition and deterministic greedy placement
//!   into free time, honoring workday bounds and hour-of-day preferences
//! - **Sync**: tag-keyed diffing against materialized calendar events and a
//!   best-effort reconciliation applier, so repeated runs are idempotent
//! - **Storage**: SQLite-based task and session persistence plus TOML-based
//!   planning settings
//!
//! ## Key Components
//!
//! - [`next_occurrence`]: recurrence expansion
//! - [`Scheduler`]: candidate placement engine
//! - [`build_diff`]: schedule diff computation
//! - [`ReconciliationApplier`]: calendar write-back
//! - [`Planner`]: the full digest-gated pipeline

pub mod calendar;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod recurrence;
pub mod storage;
pub mod store;
pub mod sync;
pub mod task;

pub use calendar::{
    CalendarRead, CalendarWrite, ExternalCalendarEvent, JsonCalendar, NewCalendarEvent, SessionTag,
};
pub use error::{CalendarError, ConfigError, CoreError, RecurrenceError, Result, StorageError, ValidationError};
pub use pipeline::{PlanOutcome, Planner, RecomputeWorker};
pub use planner::{
    detect_conflicts, sessions_for, BusyInterval, CandidateSession, OverflowSession, PlacedSession,
    ScheduleOutcome, Scheduler,
};
pub use recurrence::{
    next_occurrence, Frequency, HolidayAnswer, HolidayLookup, NoHolidays, RecurrenceEnd,
    RecurrenceRule,
};
pub use storage::{PlanDb, PlanningSettings};
pub use store::{merge_session, ProposalMetadata, StoredOverflowSession, StoredScheduledSession};
pub use sync::{
    build_diff, completion_digest, proposed_blocks, scheduling_digest, ApplyReport, PendingDiff,
    ProposedBlock, ReconciliationApplier, ScheduleConflict, ScheduleDiff,
};
pub use task::{Task, TaskCategory};
