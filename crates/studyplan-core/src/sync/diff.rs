//! Schedule diff computation.
//!
//! Pure comparison of proposed blocks against tagged external events.
//! A tag never appears in more than one bucket except that a block may be
//! both moved and resized in the same pass.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{ExternalCalendarEvent, SessionTag};
use crate::planner::PlacedSession;

/// A block the planner wants materialized externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedBlock {
    pub tag: SessionTag,
    pub title: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl ProposedBlock {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + chrono::Duration::minutes(self.duration_minutes)
    }
}

/// An existing tagged event whose start changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovedBlock {
    pub tag: SessionTag,
    pub new_start: DateTime<Utc>,
}

/// An existing tagged event whose duration changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizedBlock {
    pub tag: SessionTag,
    pub new_duration_minutes: i64,
}

/// A tagged event no longer backed by any proposed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedBlock {
    pub tag: SessionTag,
}

/// An overlap the scheduler could not avoid; surfaced for human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub tag: SessionTag,
    pub conflicting_tag: Option<SessionTag>,
    pub reason: String,
}

/// The additions/moves/resizes/removals needed to align the external
/// calendar with a freshly computed schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDiff {
    pub added: Vec<ProposedBlock>,
    pub moved: Vec<MovedBlock>,
    pub resized: Vec<ResizedBlock>,
    pub removed: Vec<RemovedBlock>,
    pub conflicts: Vec<ScheduleConflict>,
}

impl ScheduleDiff {
    /// No changes and no conflicts.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.moved.is_empty()
            && self.resized.is_empty()
            && self.removed.is_empty()
            && self.conflicts.is_empty()
    }

    /// True when no tag appears in more than one exclusive bucket
    /// (moved and resized may legitimately share a tag).
    pub fn is_idempotent(&self) -> bool {
        let added: HashSet<_> = self.added.iter().map(|b| b.tag).collect();
        let moved: HashSet<_> = self.moved.iter().map(|b| b.tag).collect();
        let resized: HashSet<_> = self.resized.iter().map(|b| b.tag).collect();
        let removed: HashSet<_> = self.removed.iter().map(|b| b.tag).collect();

        added.is_disjoint(&moved)
            && added.is_disjoint(&resized)
            && added.is_disjoint(&removed)
            && moved.is_disjoint(&removed)
            && resized.is_disjoint(&removed)
    }

    /// Tags touched by any conflict.
    pub fn conflicting_tags(&self) -> HashSet<SessionTag> {
        self.conflicts
            .iter()
            .flat_map(|c| std::iter::once(c.tag).chain(c.conflicting_tag))
            .collect()
    }

    /// The diff with every entry touching a conflicting tag removed, for
    /// best-effort partial application. Conflicts themselves are dropped
    /// here; [`crate::sync::PendingDiff`] keeps them for later decision.
    pub fn non_conflicting_changes(&self) -> ScheduleDiff {
        let conflicted = self.conflicting_tags();
        ScheduleDiff {
            added: self
                .added
                .iter()
                .filter(|b| !conflicted.contains(&b.tag))
                .cloned()
                .collect(),
            moved: self
                .moved
                .iter()
                .filter(|b| !conflicted.contains(&b.tag))
                .cloned()
                .collect(),
            resized: self
                .resized
                .iter()
                .filter(|b| !conflicted.contains(&b.tag))
                .cloned()
                .collect(),
            removed: self
                .removed
                .iter()
                .filter(|b| !conflicted.contains(&b.tag))
                .cloned()
                .collect(),
            conflicts: Vec::new(),
        }
    }

    /// One-line summary for review prompts and logs.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("add {}", self.added.len()));
        }
        if !self.moved.is_empty() {
            parts.push(format!("move {}", self.moved.len()));
        }
        if !self.resized.is_empty() {
            parts.push(format!("resize {}", self.resized.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("remove {}", self.removed.len()));
        }
        if !self.conflicts.is_empty() {
            parts.push(format!("conflicts {}", self.conflicts.len()));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Convert placed sessions into proposed blocks with generated titles.
pub fn proposed_blocks(scheduled: &[PlacedSession]) -> Vec<ProposedBlock> {
    scheduled
        .iter()
        .map(|placed| ProposedBlock {
            tag: placed.tag(),
            title: format!("{} Session", placed.session.category.label()),
            start: placed.start,
            duration_minutes: placed.duration_minutes(),
        })
        .collect()
}

/// Compare proposed blocks against existing tagged events.
///
/// Untagged events are invisible here: they were accounted for upstream
/// as busy intervals. Conflicts detected upstream pass through unchanged.
pub fn build_diff(
    proposed: &[ProposedBlock],
    existing: &[ExternalCalendarEvent],
    conflicts: Vec<ScheduleConflict>,
) -> ScheduleDiff {
    let mut existing_by_tag: HashMap<SessionTag, &ExternalCalendarEvent> = HashMap::new();
    for event in existing {
        if let Some(tag) = event.tag() {
            existing_by_tag.insert(tag, event);
        }
    }

    let mut diff = ScheduleDiff {
        conflicts,
        ..ScheduleDiff::default()
    };
    let mut proposed_tags: HashSet<SessionTag> = HashSet::new();

    for block in proposed {
        proposed_tags.insert(block.tag);
        match existing_by_tag.get(&block.tag) {
            None => diff.added.push(block.clone()),
            Some(event) => {
                if event.start != block.start {
                    diff.moved.push(MovedBlock {
                        tag: block.tag,
                        new_start: block.start,
                    });
                }
                if event.duration_minutes() != block.duration_minutes {
                    diff.resized.push(ResizedBlock {
                        tag: block.tag,
                        new_duration_minutes: block.duration_minutes,
                    });
                }
            }
        }
    }

    for tag in existing_by_tag.keys() {
        if !proposed_tags.contains(tag) {
            diff.removed.push(RemovedBlock { tag: *tag });
        }
    }
    diff.removed.sort_by_key(|r| r.tag);

    diff
}
