//! Session decomposition and placement.
//!
//! The planner is the pure middle of the pipeline: tasks are decomposed
//! into candidate sessions ([`decompose`]), and candidates are placed into
//! concrete start/end times against busy intervals ([`scheduler`]).
//! Nothing in this module touches a collaborator.

pub mod decompose;
pub mod scheduler;
mod session;

pub use decompose::sessions_for;
pub use scheduler::{detect_conflicts, ScheduleOutcome, Scheduler};
pub use session::{BusyInterval, CandidateSession, OverflowSession, PlacedSession};
