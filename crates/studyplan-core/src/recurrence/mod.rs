//! Recurrence rules and next-occurrence expansion.
//!
//! [`next_occurrence`] is a pure function: it computes the next generated
//! task of a recurring series without touching any store. The caller
//! persists the result and triggers downstream recomputation.
//!
//! Skip adjustment (weekends/holidays) probes forward one day at a time
//! with an explicit iteration bound so a pathological holiday source can
//! never hang the expansion.

use std::collections::HashSet;

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecurrenceError;
use crate::task::Task;

/// Upper bound on forward probing when skipping weekends/holidays.
///
/// A little over a year of consecutive skip days; if every probe is
/// skipped we give up and keep the last probed date.
const MAX_FORWARD_PROBES: u32 = 370;

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn name(&self) -> &'static str {
        match self {
            Frequency::Daily => "days",
            Frequency::Weekly => "weeks",
            Frequency::Monthly => "months",
            Frequency::Yearly => "years",
        }
    }
}

/// Termination condition for a recurrence series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecurrenceEnd {
    /// The series never terminates on its own.
    Never,
    /// Stop once the pre-adjustment candidate date exceeds this date.
    Until { date: NaiveDate },
    /// Stop once the series has this many occurrences (indices 0..count-1).
    AfterOccurrences { count: u32 },
}

/// Where holiday information comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidaySource {
    None,
    SystemCalendar,
    UsFederal,
    Custom,
}

/// How skipped dates are adjusted. Only forward adjustment is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipAdjustment {
    Forward,
}

/// Weekend/holiday skip policy for a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    #[serde(default)]
    pub skip_weekends: bool,
    #[serde(default)]
    pub skip_holidays: bool,
    #[serde(default = "default_holiday_source")]
    pub holiday_source: HolidaySource,
    #[serde(default = "default_adjustment")]
    pub adjustment: SkipAdjustment,
}

fn default_holiday_source() -> HolidaySource {
    HolidaySource::None
}

fn default_adjustment() -> SkipAdjustment {
    SkipAdjustment::Forward
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            skip_weekends: false,
            skip_holidays: false,
            holiday_source: HolidaySource::None,
            adjustment: SkipAdjustment::Forward,
        }
    }
}

/// A recurrence rule attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Units of `frequency` between occurrences; at least 1.
    pub interval: u32,
    pub end: RecurrenceEnd,
    #[serde(default)]
    pub skip_policy: SkipPolicy,
}

impl RecurrenceRule {
    /// Simple every-N rule with no skip policy and no end.
    pub fn every(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval: interval.max(1),
            end: RecurrenceEnd::Never,
            skip_policy: SkipPolicy::default(),
        }
    }
}

/// Answer from a holiday lookup.
///
/// `Unavailable` is distinct from `NotHoliday` so call sites can log the
/// degradation, but both fail open: the date is treated as a working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayAnswer {
    Holiday,
    NotHoliday,
    Unavailable,
}

/// Capability: answer whether a date is a holiday for a given source.
pub trait HolidayLookup {
    fn is_holiday(&self, date: NaiveDate, source: HolidaySource) -> HolidayAnswer;
}

/// Holiday lookup that knows nothing; every query reports unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayLookup for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate, _source: HolidaySource) -> HolidayAnswer {
        HolidayAnswer::Unavailable
    }
}

/// Compute the next occurrence of a recurring task.
///
/// Returns `Ok(None)` when the series has terminated or the next index
/// already exists (idempotence guard: calling twice with identical series
/// state is a no-op the second time). Returns `Err` when the task violates
/// the recurrence data-model invariants.
pub fn next_occurrence(
    task: &Task,
    existing_indices: &HashSet<u32>,
    holidays: &dyn HolidayLookup,
) -> Result<Option<Task>, RecurrenceError> {
    let Some(rule) = task.recurrence else {
        return Ok(None);
    };
    let due = task
        .due
        .ok_or(RecurrenceError::MissingDueDate { task_id: task.id })?;
    let series_id = task
        .series_id
        .ok_or(RecurrenceError::MissingSeriesId { task_id: task.id })?;

    let current_index = task.occurrence_index.unwrap_or(0);
    let next_index = current_index + 1;

    if !series_continues(&rule, next_index, due) {
        return Ok(None);
    }
    if existing_indices.contains(&next_index) {
        tracing::debug!(series = %series_id, index = next_index, "occurrence already generated; skipping");
        return Ok(None);
    }

    let candidate = advance(due, rule.frequency, rule.interval)?;

    // until-date checks the pre-adjustment candidate
    if let RecurrenceEnd::Until { date } = rule.end {
        if candidate > date {
            return Ok(None);
        }
    }

    let adjusted = adjust_forward(candidate, &rule.skip_policy, holidays);

    let mut next = task.clone();
    next.id = Uuid::new_v4();
    next.due = Some(adjusted);
    next.completed = false;
    next.series_id = Some(series_id);
    next.occurrence_index = Some(next_index);
    next.updated_at = chrono::Utc::now();
    Ok(Some(next))
}

fn series_continues(rule: &RecurrenceRule, next_index: u32, base: NaiveDate) -> bool {
    match rule.end {
        RecurrenceEnd::Never => true,
        RecurrenceEnd::AfterOccurrences { count } => next_index < count,
        RecurrenceEnd::Until { date } => base <= date,
    }
}

/// Advance a date by `interval` units of `frequency` with calendar-correct
/// arithmetic (month advancement lands on a valid day).
fn advance(
    base: NaiveDate,
    frequency: Frequency,
    interval: u32,
) -> Result<NaiveDate, RecurrenceError> {
    let interval = interval.max(1);
    let next = match frequency {
        Frequency::Daily => base.checked_add_days(Days::new(u64::from(interval))),
        Frequency::Weekly => base.checked_add_days(Days::new(u64::from(interval) * 7)),
        Frequency::Monthly => base.checked_add_months(Months::new(interval)),
        Frequency::Yearly => base.checked_add_months(Months::new(interval * 12)),
    };
    next.ok_or(RecurrenceError::DateOverflow {
        base,
        interval,
        frequency: frequency.name(),
    })
}

/// Probe forward day by day until the date is neither a skipped weekend day
/// nor a holiday, giving up after [`MAX_FORWARD_PROBES`] days.
fn adjust_forward(date: NaiveDate, policy: &SkipPolicy, holidays: &dyn HolidayLookup) -> NaiveDate {
    if !policy.skip_weekends && !policy.skip_holidays {
        return date;
    }
    let mut current = date;
    for _ in 0..MAX_FORWARD_PROBES {
        if !is_skipped(current, policy, holidays) {
            return current;
        }
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    tracing::warn!(%date, "forward skip adjustment gave up after {MAX_FORWARD_PROBES} probes");
    current
}

fn is_skipped(date: NaiveDate, policy: &SkipPolicy, holidays: &dyn HolidayLookup) -> bool {
    if policy.skip_weekends && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return true;
    }
    if policy.skip_holidays {
        match holidays.is_holiday(date, policy.holiday_source) {
            HolidayAnswer::Holiday => return true,
            HolidayAnswer::NotHoliday => {}
            HolidayAnswer::Unavailable => {
                // Fail open: an unreachable holiday source never blocks
                // generation, but the degradation is logged distinctly.
                tracing::debug!(%date, source = ?policy.holiday_source, "holiday source unavailable; treating as working day");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct FixedHolidays(Vec<NaiveDate>);

    impl HolidayLookup for FixedHolidays {
        fn is_holiday(&self, date: NaiveDate, _source: HolidaySource) -> HolidayAnswer {
            if self.0.contains(&date) {
                HolidayAnswer::Holiday
            } else {
                HolidayAnswer::NotHoliday
            }
        }
    }

    fn recurring_task(due: NaiveDate, rule: RecurrenceRule) -> Task {
        let mut task = Task::new("Weekly quiz", Some(due), 45);
        task.recurrence = Some(rule);
        task.series_id = Some(Uuid::new_v4());
        task.occurrence_index = Some(0);
        task
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_advances_by_interval() {
        let task = recurring_task(date(2025, 3, 3), RecurrenceRule::every(Frequency::Weekly, 2));
        let next = next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .unwrap();
        assert_eq!(next.due, Some(date(2025, 3, 17)));
        assert_eq!(next.occurrence_index, Some(1));
        assert_eq!(next.series_id, task.series_id);
        assert!(!next.completed);
        assert_ne!(next.id, task.id);
    }

    #[test]
    fn monthly_lands_on_valid_day() {
        // Jan 31 + 1 month must land on a real date
        let task = recurring_task(date(2025, 1, 31), RecurrenceRule::every(Frequency::Monthly, 1));
        let next = next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .unwrap();
        assert_eq!(next.due, Some(date(2025, 2, 28)));
    }

    #[test]
    fn after_n_occurrences_terminates() {
        let rule = RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 1,
            end: RecurrenceEnd::AfterOccurrences { count: 3 },
            skip_policy: SkipPolicy::default(),
        };
        let mut task = recurring_task(date(2025, 6, 1), rule);
        let mut seen = HashSet::from([0u32]);
        let mut generated = 0;
        loop {
            match next_occurrence(&task, &seen, &NoHolidays).unwrap() {
                Some(next) => {
                    generated += 1;
                    seen.insert(next.occurrence_index.unwrap());
                    task = next;
                }
                None => break,
            }
        }
        // after-3: indices 1 and 2 generated, then termination forever
        assert_eq!(generated, 2);
        assert!(next_occurrence(&task, &seen, &NoHolidays).unwrap().is_none());
    }

    #[test]
    fn until_date_checks_pre_adjustment_candidate() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            interval: 1,
            end: RecurrenceEnd::Until { date: date(2025, 3, 9) },
            skip_policy: SkipPolicy::default(),
        };
        let task = recurring_task(date(2025, 3, 3), rule);
        // candidate 2025-03-10 > until 2025-03-09
        assert!(next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .is_none());
    }

    #[test]
    fn idempotence_guard_skips_existing_index() {
        let task = recurring_task(date(2025, 3, 3), RecurrenceRule::every(Frequency::Weekly, 1));
        let first = next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .unwrap();
        let seen = HashSet::from([first.occurrence_index.unwrap()]);
        assert!(next_occurrence(&task, &seen, &NoHolidays).unwrap().is_none());
    }

    #[test]
    fn skip_weekends_moves_to_monday() {
        let rule = RecurrenceRule {
            frequency: Frequency::Daily,
            interval: 5,
            end: RecurrenceEnd::Never,
            skip_policy: SkipPolicy {
                skip_weekends: true,
                ..SkipPolicy::default()
            },
        };
        // Mon 2025-03-03 + 5 days = Sat 2025-03-08 -> Mon 2025-03-10
        let task = recurring_task(date(2025, 3, 3), rule);
        let next = next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .unwrap();
        assert_eq!(next.due, Some(date(2025, 3, 10)));
    }

    #[test]
    fn skip_holidays_probes_past_holiday() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            interval: 1,
            end: RecurrenceEnd::Never,
            skip_policy: SkipPolicy {
                skip_holidays: true,
                holiday_source: HolidaySource::Custom,
                ..SkipPolicy::default()
            },
        };
        let task = recurring_task(date(2025, 6, 26), rule);
        let holidays = FixedHolidays(vec![date(2025, 7, 3), date(2025, 7, 4)]);
        let next = next_occurrence(&task, &HashSet::new(), &holidays)
            .unwrap()
            .unwrap();
        assert_eq!(next.due, Some(date(2025, 7, 5)));
    }

    #[test]
    fn unavailable_holiday_source_fails_open() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            interval: 1,
            end: RecurrenceEnd::Never,
            skip_policy: SkipPolicy {
                skip_holidays: true,
                holiday_source: HolidaySource::SystemCalendar,
                ..SkipPolicy::default()
            },
        };
        let task = recurring_task(date(2025, 6, 26), rule);
        let next = next_occurrence(&task, &HashSet::new(), &NoHolidays)
            .unwrap()
            .unwrap();
        assert_eq!(next.due, Some(date(2025, 7, 3)));
    }

    #[test]
    fn missing_series_id_is_an_error() {
        let mut task = recurring_task(date(2025, 3, 3), RecurrenceRule::every(Frequency::Daily, 1));
        task.series_id = None;
        let err = next_occurrence(&task, &HashSet::new(), &NoHolidays).unwrap_err();
        assert!(matches!(err, RecurrenceError::MissingSeriesId { .. }));
    }

    #[test]
    fn missing_due_date_is_an_error() {
        let mut task = recurring_task(date(2025, 3, 3), RecurrenceRule::every(Frequency::Daily, 1));
        task.due = None;
        let err = next_occurrence(&task, &HashSet::new(), &NoHolidays).unwrap_err();
        assert!(matches!(err, RecurrenceError::MissingDueDate { .. }));
    }
}
