//! Persisted plan state and the merge rule that protects user edits.
//!
//! A scheduled session the user has dragged or resized belongs to the user
//! from that moment on. A later machine proposal may only replace it when
//! the proposal was computed after the edit was made.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::SessionTag;
use crate::planner::{OverflowSession, PlacedSession};

/// Provenance attached to every machine-produced plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    /// Scheduling digest of the inputs the plan was computed from.
    pub input_hash: String,
    pub computed_at: DateTime<Utc>,
    /// Heuristic placement quality in `[0, 1]`.
    pub confidence: f64,
    pub provenance: String,
}

impl ProposalMetadata {
    pub fn new(input_hash: impl Into<String>, computed_at: DateTime<Utc>) -> Self {
        Self {
            input_hash: input_hash.into(),
            computed_at,
            confidence: 1.0,
            provenance: "greedy-v1".to_string(),
        }
    }
}

/// A session as it lives in the plan database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredScheduledSession {
    pub task_id: Uuid,
    pub session_index: u32,
    pub session_count: u32,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub locked: bool,
    /// Set once the user moves or resizes the session by hand.
    pub is_user_edited: bool,
    pub user_edited_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
    pub input_hash: String,
}

impl StoredScheduledSession {
    pub fn from_placed(placed: &PlacedSession, meta: &ProposalMetadata) -> Self {
        Self {
            task_id: placed.session.task_id,
            session_index: placed.session.session_index,
            session_count: placed.session.session_count,
            title: placed.session.title.clone(),
            start: placed.start,
            end: placed.end,
            locked: placed.session.locked_to_due_date,
            is_user_edited: false,
            user_edited_at: None,
            computed_at: meta.computed_at,
            input_hash: meta.input_hash.clone(),
        }
    }

    pub fn tag(&self) -> SessionTag {
        SessionTag::new(self.task_id, self.session_index)
    }

    /// Record a manual move or resize.
    pub fn mark_user_edited(&mut self, start: DateTime<Utc>, end: DateTime<Utc>, at: DateTime<Utc>) {
        self.start = start;
        self.end = end;
        self.is_user_edited = true;
        self.user_edited_at = Some(at);
    }
}

/// Work that could not be placed before its due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOverflowSession {
    pub task_id: Uuid,
    pub session_index: u32,
    pub title: String,
    pub estimated_minutes: u32,
    pub due: Option<chrono::NaiveDate>,
    pub recorded_at: DateTime<Utc>,
}

impl StoredOverflowSession {
    pub fn from_overflow(overflow: &OverflowSession, recorded_at: DateTime<Utc>) -> Self {
        Self {
            task_id: overflow.session.task_id,
            session_index: overflow.session.session_index,
            title: overflow.session.title.clone(),
            estimated_minutes: overflow.session.estimated_minutes,
            due: Some(overflow.session.due),
            recorded_at,
        }
    }

    pub fn tag(&self) -> SessionTag {
        SessionTag::new(self.task_id, self.session_index)
    }
}

/// Decide which version of a session survives a recompute.
///
/// The existing row wins when the user edited it at or after the moment the
/// new proposal was computed. Ties favor the user.
pub fn merge_session(
    existing: Option<&StoredScheduledSession>,
    proposed: &PlacedSession,
    meta: &ProposalMetadata,
) -> StoredScheduledSession {
    if let Some(current) = existing {
        if current.is_user_edited {
            let edited_at = current.user_edited_at.unwrap_or(current.computed_at);
            if edited_at >= meta.computed_at {
                tracing::debug!(tag = %current.tag(), "keeping user-edited session over new proposal");
                return current.clone();
            }
        }
    }
    StoredScheduledSession::from_placed(proposed, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CandidateSession;
    use crate::task::TaskCategory;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    fn placed(hour: u32) -> PlacedSession {
        let session = CandidateSession {
            task_id: Uuid::new_v4(),
            session_index: 0,
            session_count: 1,
            title: "Essay draft".to_string(),
            due: chrono::NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            due_time_minutes: None,
            estimated_minutes: 60,
            locked_to_due_date: false,
            category: TaskCategory::Homework,
            urgency: 0.5,
            difficulty: 0.5,
        };
        PlacedSession {
            session,
            start: at(hour),
            end: at(hour) + Duration::minutes(60),
        }
    }

    #[test]
    fn fresh_proposal_is_stored_verbatim() {
        let p = placed(9);
        let meta = ProposalMetadata::new("abc", at(8));
        let stored = merge_session(None, &p, &meta);
        assert_eq!(stored.start, p.start);
        assert!(!stored.is_user_edited);
        assert_eq!(stored.input_hash, "abc");
    }

    #[test]
    fn user_edit_survives_stale_recompute() {
        let p = placed(9);
        let meta = ProposalMetadata::new("abc", at(8));
        let mut stored = merge_session(None, &p, &meta);
        stored.mark_user_edited(at(14), at(15), at(10));

        // Proposal computed before the edit must not clobber it.
        let stale = ProposalMetadata::new("def", at(9));
        let merged = merge_session(Some(&stored), &placed(11), &stale);
        assert_eq!(merged.start, at(14));
        assert!(merged.is_user_edited);
    }

    #[test]
    fn newer_proposal_replaces_old_user_edit() {
        let p = placed(9);
        let meta = ProposalMetadata::new("abc", at(8));
        let mut stored = merge_session(None, &p, &meta);
        stored.mark_user_edited(at(14), at(15), at(10));

        let fresh = ProposalMetadata::new("def", at(12));
        let merged = merge_session(Some(&stored), &placed(11), &fresh);
        assert_eq!(merged.start, at(11));
        assert!(!merged.is_user_edited);
    }

    #[test]
    fn tie_favors_the_user_edit() {
        let p = placed(9);
        let meta = ProposalMetadata::new("abc", at(8));
        let mut stored = merge_session(None, &p, &meta);
        stored.mark_user_edited(at(14), at(15), at(10));

        let simultaneous = ProposalMetadata::new("def", at(10));
        let merged = merge_session(Some(&stored), &placed(11), &simultaneous);
        assert_eq!(merged.start, at(14));
    }
}
