//! External calendar capability.
//!
//! The platform calendar store is a collaborator, not a dependency: the
//! core sees it only through [`CalendarRead`] and [`CalendarWrite`].
//! Writes are per-event and independently failable; a read-only calendar
//! is an expected condition, not an error.

mod tag;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CalendarError;

pub use tag::SessionTag;

/// A calendar event as seen from the core (read-only snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCalendarEvent {
    /// Store-assigned event identifier.
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Free-text annotation; may carry an embedded [`SessionTag`].
    pub notes: String,
    /// Identity of the calendar this event lives on.
    pub calendar_id: String,
    /// Whether the store allows the core to modify this event.
    pub writable: bool,
}

impl ExternalCalendarEvent {
    /// The session tag embedded in this event's notes, if any.
    pub fn tag(&self) -> Option<SessionTag> {
        SessionTag::extract(&self.notes)
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Fields for a newly created event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub notes: String,
}

/// Capability: list events within a half-open time range.
pub trait CalendarRead {
    fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalCalendarEvent>, CalendarError>;
}

/// Capability: mutate events one at a time. Each call is independently
/// failable; callers must not treat one failure as fatal to a batch.
pub trait CalendarWrite {
    fn create_event(&mut self, event: NewCalendarEvent) -> Result<String, CalendarError>;
    fn update_event(
        &mut self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        notes: String,
    ) -> Result<(), CalendarError>;
    fn delete_event(&mut self, id: &str) -> Result<(), CalendarError>;
}

/// A calendar backed by a JSON file on disk.
///
/// Used by the CLI and by tests as a stand-in for a platform calendar
/// store; it honors per-event writability like a real store would.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonCalendar {
    pub calendar_id: String,
    pub writable: bool,
    pub events: Vec<ExternalCalendarEvent>,
}

impl JsonCalendar {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            writable: true,
            events: Vec::new(),
        }
    }

    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

impl CalendarRead for JsonCalendar {
    fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExternalCalendarEvent>, CalendarError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.end > from && e.start < to)
            .cloned()
            .collect())
    }
}

impl CalendarWrite for JsonCalendar {
    fn create_event(&mut self, event: NewCalendarEvent) -> Result<String, CalendarError> {
        if !self.writable {
            return Err(CalendarError::PermissionDenied(
                "calendar is read-only".to_string(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        self.events.push(ExternalCalendarEvent {
            id: id.clone(),
            title: event.title,
            start: event.start,
            end: event.end,
            notes: event.notes,
            calendar_id: self.calendar_id.clone(),
            writable: true,
        });
        Ok(id)
    }

    fn update_event(
        &mut self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        notes: String,
    ) -> Result<(), CalendarError> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalendarError::EventNotFound(id.to_string()))?;
        if !event.writable {
            return Err(CalendarError::PermissionDenied(
                "event is read-only".to_string(),
            ));
        }
        event.start = start;
        event.end = end;
        event.notes = notes;
        Ok(())
    }

    fn delete_event(&mut self, id: &str) -> Result<(), CalendarError> {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        if self.events.len() == before {
            return Err(CalendarError::EventNotFound(id.to_string()));
        }
        Ok(())
    }
}
