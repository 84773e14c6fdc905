//! Stable session tags embedded in calendar event notes.
//!
//! A tag marks "this event materializes session N of task T" across runs.
//! It must survive arbitrary surrounding user text, so extraction is a
//! substring search rather than a whole-field parse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TAG_PREFIX: &str = "[StudyPlan:";
const TAG_SUFFIX: char = ']';

/// Stable identity of one scheduled session: `(task id, session index)`.
///
/// Rendered as `[StudyPlan:<uuid>-<index>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionTag {
    pub task_id: Uuid,
    pub session_index: u32,
}

impl SessionTag {
    pub fn new(task_id: Uuid, session_index: u32) -> Self {
        Self {
            task_id,
            session_index,
        }
    }

    /// Extract the first tag found anywhere in free-form notes text.
    pub fn extract(notes: &str) -> Option<Self> {
        let start = notes.find(TAG_PREFIX)?;
        let rest = &notes[start + TAG_PREFIX.len()..];
        let end = rest.find(TAG_SUFFIX)?;
        rest[..end].parse().ok()
    }

    /// Append this tag to existing notes, unless it is already present.
    pub fn embed(&self, notes: &str) -> String {
        let rendered = self.to_string();
        if notes.contains(&rendered) {
            return notes.to_string();
        }
        if notes.is_empty() {
            rendered
        } else {
            format!("{notes}\n{rendered}")
        }
    }
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TAG_PREFIX}{}-{}{TAG_SUFFIX}", self.task_id, self.session_index)
    }
}

impl FromStr for SessionTag {
    type Err = ();

    /// Parse the `<uuid>-<index>` payload (without the bracket wrapper).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (uuid_part, index_part) = s.rsplit_once('-').ok_or(())?;
        let task_id = Uuid::parse_str(uuid_part).map_err(|_| ())?;
        let session_index = index_part.parse().map_err(|_| ())?;
        Ok(Self {
            task_id,
            session_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_extracts() {
        let tag = SessionTag::new(Uuid::nil(), 3);
        let rendered = tag.to_string();
        assert_eq!(
            rendered,
            "[StudyPlan:00000000-0000-0000-0000-000000000000-3]"
        );
        assert_eq!(SessionTag::extract(&rendered), Some(tag));
    }

    #[test]
    fn survives_surrounding_user_text() {
        let tag = SessionTag::new(Uuid::new_v4(), 12);
        let notes = format!("Remember the library books!\n{tag}\nmoved by me");
        assert_eq!(SessionTag::extract(&notes), Some(tag));
    }

    #[test]
    fn embed_is_idempotent() {
        let tag = SessionTag::new(Uuid::new_v4(), 0);
        let once = tag.embed("user notes");
        let twice = tag.embed(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn garbage_does_not_extract() {
        assert_eq!(SessionTag::extract("no tag here"), None);
        assert_eq!(SessionTag::extract("[StudyPlan:not-a-uuid-x]"), None);
        assert_eq!(SessionTag::extract("[StudyPlan:truncated"), None);
    }
}
