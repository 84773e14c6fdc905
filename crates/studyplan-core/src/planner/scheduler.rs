//! Greedy deterministic placement of candidate sessions.
//!
//! The scheduler scans forward day by day from "today" through each
//! candidate's due date, subtracting busy intervals and already-placed
//! sessions from the workday window, and picks a start on a 30-minute grid.
//! The earliest feasible day is a hard constraint; the hour-of-day
//! preference weight only ranks starts within that day. "No capacity" is
//! never an error -- unplaceable candidates land in `overflow`.

use chrono::{DateTime, Duration, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::planner::session::{BusyInterval, CandidateSession, OverflowSession, PlacedSession};
use crate::storage::PlanningSettings;
use crate::sync::ScheduleConflict;

/// Grid granularity for candidate start positions.
const START_GRID_MINUTES: i64 = 30;

/// Result of one placement pass.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub scheduled: Vec<PlacedSession>,
    pub overflow: Vec<OverflowSession>,
}

/// A free stretch of time within one day's workday window.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FreeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl FreeInterval {
    fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Deterministic greedy scheduler.
pub struct Scheduler<'a> {
    settings: &'a PlanningSettings,
}

impl<'a> Scheduler<'a> {
    pub fn new(settings: &'a PlanningSettings) -> Self {
        Self { settings }
    }

    /// Place candidates into concrete start/end times.
    ///
    /// `now` is the earliest instant anything may be scheduled; the busy
    /// snapshot must be consistent for the whole invocation.
    pub fn schedule(
        &self,
        candidates: Vec<CandidateSession>,
        busy: &[BusyInterval],
        now: DateTime<Utc>,
    ) -> ScheduleOutcome {
        let mut ordered = candidates;
        // Due asc, urgency desc, difficulty desc, then id for total determinism.
        ordered.sort_by(|a, b| {
            a.due
                .cmp(&b.due)
                .then_with(|| b.urgency.partial_cmp(&a.urgency).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| {
                    b.difficulty
                        .partial_cmp(&a.difficulty)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| (a.task_id, a.session_index).cmp(&(b.task_id, b.session_index)))
        });

        let mut outcome = ScheduleOutcome::default();
        let mut minutes_per_day: std::collections::HashMap<NaiveDate, i64> =
            std::collections::HashMap::new();

        for candidate in ordered {
            if candidate.locked_to_due_date {
                // Pinned placement bypasses the search entirely; overlaps
                // are surfaced later by detect_conflicts.
                let placed = self.place_pinned(&candidate);
                *minutes_per_day.entry(placed.start.date_naive()).or_insert(0) +=
                    placed.duration_minutes();
                outcome.scheduled.push(placed);
                continue;
            }

            match self.place(&candidate, busy, &outcome.scheduled, &minutes_per_day, now) {
                Some(placed) => {
                    *minutes_per_day.entry(placed.start.date_naive()).or_insert(0) +=
                        placed.duration_minutes();
                    outcome.scheduled.push(placed);
                }
                None => outcome.overflow.push(OverflowSession { session: candidate }),
            }
        }

        outcome.scheduled.sort_by_key(|s| s.start);
        outcome
    }

    /// Pin a locked session at its due instant (due time offset when
    /// present, else the workday start of the due date).
    fn place_pinned(&self, candidate: &CandidateSession) -> PlacedSession {
        let day = Utc.from_utc_datetime(&candidate.due.and_time(NaiveTime::MIN));
        let start = match candidate.due_time_minutes {
            Some(minutes) => day + Duration::minutes(i64::from(minutes)),
            None => day + Duration::hours(i64::from(self.settings.workday_start_hour)),
        };
        let end = start + Duration::minutes(i64::from(candidate.estimated_minutes));
        PlacedSession {
            session: candidate.clone(),
            start,
            end,
        }
    }

    fn place(
        &self,
        candidate: &CandidateSession,
        busy: &[BusyInterval],
        placed: &[PlacedSession],
        minutes_per_day: &std::collections::HashMap<NaiveDate, i64>,
        now: DateTime<Utc>,
    ) -> Option<PlacedSession> {
        let duration = Duration::minutes(i64::from(candidate.estimated_minutes));
        let due_instant = candidate.due_instant();
        let horizon_end = now + Duration::days(i64::from(self.settings.horizon_days.max(1)));
        let last_day = candidate.due.min(horizon_end.date_naive());

        let mut day = now.date_naive();
        while day <= last_day {
            if self.day_is_full(day, minutes_per_day, candidate.estimated_minutes) {
                day = day.checked_add_days(Days::new(1))?;
                continue;
            }
            let free = self.free_intervals(day, busy, placed, now);
            if let Some(start) = self.best_start(&free, duration, due_instant) {
                return Some(PlacedSession {
                    session: candidate.clone(),
                    start,
                    end: start + duration,
                });
            }
            day = day.checked_add_days(Days::new(1))?;
        }
        None
    }

    fn day_is_full(
        &self,
        day: NaiveDate,
        minutes_per_day: &std::collections::HashMap<NaiveDate, i64>,
        wanted: u32,
    ) -> bool {
        let cap = i64::from(self.settings.max_study_minutes_per_day);
        if cap == 0 {
            return false;
        }
        minutes_per_day.get(&day).copied().unwrap_or(0) + i64::from(wanted) > cap
    }

    /// Workday window of one day minus busy intervals and already-placed
    /// sessions, clipped to start no earlier than `now`.
    fn free_intervals(
        &self,
        day: NaiveDate,
        busy: &[BusyInterval],
        placed: &[PlacedSession],
        now: DateTime<Utc>,
    ) -> Vec<FreeInterval> {
        let midnight = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
        let window_start = midnight + Duration::hours(i64::from(self.settings.workday_start_hour));
        let window_end = midnight + Duration::hours(i64::from(self.settings.workday_end_hour));
        if window_end <= window_start {
            return Vec::new();
        }
        let window_start = window_start.max(round_up_to_grid(now, window_start));

        let mut intervals = vec![FreeInterval {
            start: window_start,
            end: window_end,
        }];

        let mut occupied: Vec<(DateTime<Utc>, DateTime<Utc>)> = busy
            .iter()
            .filter(|b| b.overlaps(window_start, window_end))
            .map(|b| (b.start, b.end))
            .chain(
                placed
                    .iter()
                    .filter(|p| p.overlaps(window_start, window_end))
                    .map(|p| (p.start, p.end)),
            )
            .collect();
        occupied.sort_by_key(|(start, _)| *start);

        for (start, end) in occupied {
            intervals = subtract(&intervals, start, end);
        }
        intervals.retain(|f| f.duration_minutes() > 0);
        intervals
    }

    /// The best feasible start within one day's free intervals: highest
    /// preference weight of the start hour, ties broken by earliest start.
    fn best_start(
        &self,
        free: &[FreeInterval],
        duration: Duration,
        due_instant: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut best: Option<(f64, DateTime<Utc>)> = None;
        for interval in free {
            // Candidate starts stay on the half-hour grid even when an
            // odd-length neighbor ends off it.
            let midnight = Utc.from_utc_datetime(&interval.start.date_naive().and_time(NaiveTime::MIN));
            let mut start = round_up_to_grid(interval.start, midnight);
            while start + duration <= interval.end {
                if start + duration > due_instant {
                    break;
                }
                let weight = self.settings.hour_weight(start.hour() as usize);
                let better = match best {
                    None => true,
                    // Strictly-greater keeps the earliest start on ties.
                    Some((best_weight, _)) => weight > best_weight,
                };
                if better {
                    best = Some((weight, start));
                }
                start += Duration::minutes(START_GRID_MINUTES);
            }
        }
        best.map(|(_, start)| start)
    }
}

/// Round an instant up to the scheduling grid so placements stay aligned.
fn round_up_to_grid(instant: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
    if instant <= floor {
        return floor;
    }
    let offset = (instant - floor).num_seconds();
    let grid = START_GRID_MINUTES * 60;
    let rounded = ((offset + grid - 1) / grid) * grid;
    floor + Duration::seconds(rounded)
}

/// Remove `[start, end)` from every interval, keeping the remainders.
fn subtract(
    intervals: &[FreeInterval],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<FreeInterval> {
    let mut result = Vec::with_capacity(intervals.len() + 1);
    for interval in intervals {
        if end <= interval.start || start >= interval.end {
            result.push(*interval);
            continue;
        }
        if start > interval.start {
            result.push(FreeInterval {
                start: interval.start,
                end: start,
            });
        }
        if end < interval.end {
            result.push(FreeInterval {
                start: end,
                end: interval.end,
            });
        }
    }
    result
}

/// Detect overlaps involving pinned sessions or unavoidable busy-interval
/// collisions. The scheduler never resolves these; they are reported so a
/// human can decide.
pub fn detect_conflicts(scheduled: &[PlacedSession], busy: &[BusyInterval]) -> Vec<ScheduleConflict> {
    let mut conflicts = Vec::new();
    for (i, session) in scheduled.iter().enumerate() {
        for other in scheduled.iter().skip(i + 1) {
            if session.overlaps(other.start, other.end) {
                conflicts.push(ScheduleConflict {
                    tag: session.tag(),
                    conflicting_tag: Some(other.tag()),
                    reason: "sessions overlap".to_string(),
                });
            }
        }
        if let Some(interval) = busy.iter().find(|b| b.overlaps(session.start, session.end)) {
            conflicts.push(ScheduleConflict {
                tag: session.tag(),
                conflicting_tag: None,
                reason: format!(
                    "overlaps busy interval {} - {}",
                    interval.start.format("%Y-%m-%d %H:%M"),
                    interval.end.format("%H:%M")
                ),
            });
        }
    }
    conflicts
}
