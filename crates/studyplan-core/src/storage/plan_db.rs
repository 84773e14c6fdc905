//! SQLite-based storage for tasks and the persisted plan.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use crate::calendar::SessionTag;
use crate::error::{Result, StorageError};
use crate::planner::{OverflowSession, PlacedSession};
use crate::store::{merge_session, ProposalMetadata, StoredOverflowSession, StoredScheduledSession};
use crate::task::{Task, TaskCategory};

// === Helper Functions ===

/// Parse task category from database string
fn parse_task_category(category_str: &str) -> TaskCategory {
    match category_str {
        "reading" => TaskCategory::Reading,
        "review" => TaskCategory::Review,
        "exam" => TaskCategory::Exam,
        "quiz" => TaskCategory::Quiz,
        "project" => TaskCategory::Project,
        "practice_test" => TaskCategory::PracticeTest,
        _ => TaskCategory::Homework,
    }
}

/// Format task category for database storage
fn format_task_category(category: TaskCategory) -> &'static str {
    match category {
        TaskCategory::Homework => "homework",
        TaskCategory::Reading => "reading",
        TaskCategory::Review => "review",
        TaskCategory::Exam => "exam",
        TaskCategory::Quiz => "quiz",
        TaskCategory::Project => "project",
        TaskCategory::PracticeTest => "practice_test",
    }
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(column: usize, value: String) -> std::result::Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn row_to_task(row: &rusqlite::Row) -> std::result::Result<Task, rusqlite::Error> {
    let id = parse_uuid(0, row.get::<_, String>(0)?)?;
    let course_id = row
        .get::<_, Option<String>>(2)?
        .map(|s| parse_uuid(2, s))
        .transpose()?;
    let due = row
        .get::<_, Option<String>>(3)?
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
    let category_str: String = row.get(10)?;
    let recurrence = row
        .get::<_, Option<String>>(13)?
        .and_then(|json| serde_json::from_str(&json).ok());
    let series_id = row
        .get::<_, Option<String>>(14)?
        .map(|s| parse_uuid(14, s))
        .transpose()?;

    Ok(Task {
        id,
        title: row.get(1)?,
        course_id,
        due,
        due_time_minutes: row.get(4)?,
        estimated_minutes: row.get(5)?,
        min_block_minutes: row.get(6)?,
        max_block_minutes: row.get(7)?,
        difficulty: row.get(8)?,
        importance: row.get(9)?,
        category: parse_task_category(&category_str),
        completed: row.get(11)?,
        locked: row.get(12)?,
        recurrence,
        series_id,
        occurrence_index: row.get(15)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(16)?),
        updated_at: parse_datetime_fallback(&row.get::<_, String>(17)?),
    })
}

const TASK_COLUMNS: &str = "id, title, course_id, due, due_time_minutes, estimated_minutes,
     min_block_minutes, max_block_minutes, difficulty, importance, category,
     completed, locked, recurrence, series_id, occurrence_index, created_at, updated_at";

fn row_to_scheduled_session(
    row: &rusqlite::Row,
) -> std::result::Result<StoredScheduledSession, rusqlite::Error> {
    Ok(StoredScheduledSession {
        task_id: parse_uuid(0, row.get::<_, String>(0)?)?,
        session_index: row.get(1)?,
        session_count: row.get(2)?,
        title: row.get(3)?,
        start: parse_datetime_fallback(&row.get::<_, String>(4)?),
        end: parse_datetime_fallback(&row.get::<_, String>(5)?),
        locked: row.get(6)?,
        is_user_edited: row.get(7)?,
        user_edited_at: row
            .get::<_, Option<String>>(8)?
            .map(|s| parse_datetime_fallback(&s)),
        computed_at: parse_datetime_fallback(&row.get::<_, String>(9)?),
        input_hash: row.get(10)?,
    })
}

/// Handle to the plan database.
pub struct PlanDb {
    conn: Connection,
}

impl PlanDb {
    /// Open the plan database at `~/.config/studyplan/studyplan.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("studyplan.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database. Used by tests and dry runs.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id                 TEXT PRIMARY KEY,
                    title              TEXT NOT NULL,
                    course_id          TEXT,
                    due                TEXT,
                    due_time_minutes   INTEGER,
                    estimated_minutes  INTEGER NOT NULL DEFAULT 0,
                    min_block_minutes  INTEGER NOT NULL DEFAULT 20,
                    max_block_minutes  INTEGER NOT NULL DEFAULT 120,
                    difficulty         REAL NOT NULL DEFAULT 0.5,
                    importance         REAL NOT NULL DEFAULT 0.5,
                    category           TEXT NOT NULL DEFAULT 'homework',
                    completed          INTEGER NOT NULL DEFAULT 0,
                    locked             INTEGER NOT NULL DEFAULT 0,
                    recurrence         TEXT,
                    series_id          TEXT,
                    occurrence_index   INTEGER,
                    created_at         TEXT NOT NULL,
                    updated_at         TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS scheduled_sessions (
                    task_id        TEXT NOT NULL,
                    session_index  INTEGER NOT NULL,
                    session_count  INTEGER NOT NULL DEFAULT 1,
                    title          TEXT NOT NULL,
                    start_time     TEXT NOT NULL,
                    end_time       TEXT NOT NULL,
                    locked         INTEGER NOT NULL DEFAULT 0,
                    is_user_edited INTEGER NOT NULL DEFAULT 0,
                    user_edited_at TEXT,
                    computed_at    TEXT NOT NULL,
                    input_hash     TEXT NOT NULL,
                    PRIMARY KEY (task_id, session_index)
                );

                CREATE TABLE IF NOT EXISTS overflow_sessions (
                    task_id           TEXT NOT NULL,
                    session_index     INTEGER NOT NULL,
                    title             TEXT NOT NULL,
                    estimated_minutes INTEGER NOT NULL,
                    due               TEXT,
                    recorded_at       TEXT NOT NULL,
                    PRIMARY KEY (task_id, session_index)
                );

                CREATE TABLE IF NOT EXISTS plan_meta (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(StorageError::from)?;

        migrations::migrate(&self.conn)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    // === Task CRUD ===

    /// Create a new task.
    pub fn create_task(&self, task: &Task) -> Result<()> {
        let recurrence_json = task
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn
            .execute(
                "INSERT INTO tasks (id, title, course_id, due, due_time_minutes, estimated_minutes,
                    min_block_minutes, max_block_minutes, difficulty, importance, category,
                    completed, locked, recurrence, series_id, occurrence_index, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    task.id.to_string(),
                    task.title,
                    task.course_id.map(|id| id.to_string()),
                    task.due.map(|d| d.to_string()),
                    task.due_time_minutes,
                    task.estimated_minutes,
                    task.min_block_minutes,
                    task.max_block_minutes,
                    task.difficulty,
                    task.importance,
                    format_task_category(task.category),
                    task.completed,
                    task.locked,
                    recurrence_json,
                    task.series_id.map(|id| id.to_string()),
                    task.occurrence_index,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
                row_to_task,
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(task)
    }

    /// All tasks, due dates first, dateless work last.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 ORDER BY due IS NULL, due ASC, created_at ASC"
            ))
            .map_err(StorageError::from)?;
        let mut rows = stmt.query([]).map_err(StorageError::from)?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            tasks.push(row_to_task(row).map_err(StorageError::from)?);
        }
        Ok(tasks)
    }

    pub fn update_task(&self, task: &Task) -> Result<()> {
        let recurrence_json = task
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn
            .execute(
                "UPDATE tasks SET title = ?2, course_id = ?3, due = ?4, due_time_minutes = ?5,
                    estimated_minutes = ?6, min_block_minutes = ?7, max_block_minutes = ?8,
                    difficulty = ?9, importance = ?10, category = ?11, completed = ?12,
                    locked = ?13, recurrence = ?14, series_id = ?15, occurrence_index = ?16,
                    updated_at = ?17
                 WHERE id = ?1",
                params![
                    task.id.to_string(),
                    task.title,
                    task.course_id.map(|id| id.to_string()),
                    task.due.map(|d| d.to_string()),
                    task.due_time_minutes,
                    task.estimated_minutes,
                    task.min_block_minutes,
                    task.max_block_minutes,
                    task.difficulty,
                    task.importance,
                    format_task_category(task.category),
                    task.completed,
                    task.locked,
                    recurrence_json,
                    task.series_id.map(|id| id.to_string()),
                    task.occurrence_index,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Delete a task and its persisted sessions.
    pub fn delete_task(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        self.conn
            .execute("DELETE FROM scheduled_sessions WHERE task_id = ?1", params![id])
            .map_err(StorageError::from)?;
        self.conn
            .execute("DELETE FROM overflow_sessions WHERE task_id = ?1", params![id])
            .map_err(StorageError::from)?;
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Indices already materialized for a recurrence series. Feeds the
    /// expansion idempotence guard.
    pub fn series_occurrence_indices(&self, series_id: Uuid) -> Result<std::collections::HashSet<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT occurrence_index FROM tasks WHERE series_id = ?1 AND occurrence_index IS NOT NULL")
            .map_err(StorageError::from)?;
        let mut rows = stmt
            .query(params![series_id.to_string()])
            .map_err(StorageError::from)?;
        let mut indices = std::collections::HashSet::new();
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            indices.insert(row.get(0).map_err(StorageError::from)?);
        }
        Ok(indices)
    }

    // === Persisted plan ===

    /// Persist a freshly computed plan, preserving newer user edits.
    ///
    /// Each proposed session is merged against the stored row with the
    /// same tag; rows for tags absent from the proposal are dropped.
    pub fn persist_plan(
        &mut self,
        scheduled: &[PlacedSession],
        overflow: &[OverflowSession],
        meta: &ProposalMetadata,
    ) -> Result<()> {
        let existing: std::collections::HashMap<SessionTag, StoredScheduledSession> = self
            .list_scheduled_sessions()?
            .into_iter()
            .map(|s| (s.tag(), s))
            .collect();

        let tx = self.conn.transaction().map_err(StorageError::from)?;
        tx.execute("DELETE FROM scheduled_sessions", [])
            .map_err(StorageError::from)?;
        tx.execute("DELETE FROM overflow_sessions", [])
            .map_err(StorageError::from)?;

        for placed in scheduled {
            let merged = merge_session(existing.get(&placed.tag()), placed, meta);
            tx.execute(
                "INSERT INTO scheduled_sessions (task_id, session_index, session_count, title,
                    start_time, end_time, locked, is_user_edited, user_edited_at,
                    computed_at, input_hash, confidence, provenance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    merged.task_id.to_string(),
                    merged.session_index,
                    merged.session_count,
                    merged.title,
                    merged.start.to_rfc3339(),
                    merged.end.to_rfc3339(),
                    merged.locked,
                    merged.is_user_edited,
                    merged.user_edited_at.map(|t| t.to_rfc3339()),
                    merged.computed_at.to_rfc3339(),
                    merged.input_hash,
                    meta.confidence,
                    meta.provenance,
                ],
            )
            .map_err(StorageError::from)?;
        }

        for item in overflow {
            let stored = StoredOverflowSession::from_overflow(item, meta.computed_at);
            tx.execute(
                "INSERT INTO overflow_sessions (task_id, session_index, title,
                    estimated_minutes, due, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stored.task_id.to_string(),
                    stored.session_index,
                    stored.title,
                    stored.estimated_minutes,
                    stored.due.map(|d| d.to_string()),
                    stored.recorded_at.to_rfc3339(),
                ],
            )
            .map_err(StorageError::from)?;
        }

        tx.execute(
            "INSERT INTO plan_meta (key, value) VALUES ('last_input_hash', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![meta.input_hash],
        )
        .map_err(StorageError::from)?;

        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    pub fn list_scheduled_sessions(&self) -> Result<Vec<StoredScheduledSession>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT task_id, session_index, session_count, title, start_time, end_time,
                        locked, is_user_edited, user_edited_at, computed_at, input_hash
                 FROM scheduled_sessions
                 ORDER BY start_time ASC",
            )
            .map_err(StorageError::from)?;
        let mut rows = stmt.query([]).map_err(StorageError::from)?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            sessions.push(row_to_scheduled_session(row).map_err(StorageError::from)?);
        }
        Ok(sessions)
    }

    pub fn list_overflow_sessions(&self) -> Result<Vec<StoredOverflowSession>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT task_id, session_index, title, estimated_minutes, due, recorded_at
                 FROM overflow_sessions
                 ORDER BY due IS NULL, due ASC, task_id ASC",
            )
            .map_err(StorageError::from)?;
        let mut rows = stmt.query([]).map_err(StorageError::from)?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().map_err(StorageError::from)? {
            sessions.push(StoredOverflowSession {
                task_id: parse_uuid(0, row.get::<_, String>(0)?).map_err(StorageError::from)?,
                session_index: row.get(1).map_err(StorageError::from)?,
                title: row.get(2).map_err(StorageError::from)?,
                estimated_minutes: row.get(3).map_err(StorageError::from)?,
                due: row
                    .get::<_, Option<String>>(4)
                    .map_err(StorageError::from)?
                    .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                recorded_at: parse_datetime_fallback(
                    &row.get::<_, String>(5).map_err(StorageError::from)?,
                ),
            });
        }
        Ok(sessions)
    }

    /// Record a manual move or resize on one stored session.
    pub fn mark_session_user_edited(
        &self,
        tag: SessionTag,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE scheduled_sessions
                 SET start_time = ?3, end_time = ?4, is_user_edited = 1, user_edited_at = ?5
                 WHERE task_id = ?1 AND session_index = ?2",
                params![
                    tag.task_id.to_string(),
                    tag.session_index,
                    start.to_rfc3339(),
                    end.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Drop the persisted plan (sessions, overflow, digest gate row)
    /// while leaving tasks untouched. The next pass rebuilds from scratch.
    pub fn reset_plan(&self) -> Result<usize> {
        let sessions = self
            .conn
            .execute("DELETE FROM scheduled_sessions", [])
            .map_err(StorageError::from)?;
        let overflow = self
            .conn
            .execute("DELETE FROM overflow_sessions", [])
            .map_err(StorageError::from)?;
        self.conn
            .execute(
                "DELETE FROM plan_meta WHERE key IN ('last_input_hash', 'last_completion_hash')",
                [],
            )
            .map_err(StorageError::from)?;
        Ok(sessions + overflow)
    }

    /// Scheduling digest of the last persisted plan, if any.
    pub fn last_input_hash(&self) -> Result<Option<String>> {
        self.meta_value("last_input_hash")
    }

    /// Completion digest the persisted plan reflects, if any.
    pub fn last_completion_hash(&self) -> Result<Option<String>> {
        self.meta_value("last_completion_hash")
    }

    /// Record the completion digest after a pass or an annotations-only
    /// sync so a repeated toggle does not re-run it.
    pub fn set_last_completion_hash(&self, hash: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO plan_meta (key, value) VALUES ('last_completion_hash', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![hash],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Drop the persisted sessions of one task without touching the rest
    /// of the plan. Used when a completed task's blocks come off the
    /// calendar.
    pub fn clear_sessions_for_task(&self, task_id: &Uuid) -> Result<usize> {
        let n = self
            .conn
            .execute(
                "DELETE FROM scheduled_sessions WHERE task_id = ?1",
                params![task_id.to_string()],
            )
            .map_err(StorageError::from)?;
        Ok(n)
    }

    fn meta_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM plan_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }
}
