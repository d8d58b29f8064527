//! Recurrence schedules
//!
//! A schedule is a pure function from a reference instant to the ordered
//! sequence of run instants at or after it. Variants are serialized as an
//! internally tagged union (`"type": "interval" | "dates"`).
//!
//! - `Interval`: `start_date + k * interval` for `k = 0, 1, 2, …`
//! - `Dates`: an explicit, sorted set of instants

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowError, Result};

/// Tags accepted in the `type` field of a serialized schedule
pub const SCHEDULE_TYPES: &[&str] = &["interval", "dates"];

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Run-time recurrence attached to a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Interval(IntervalSchedule),
    Dates(DateSchedule),
}

impl Schedule {
    /// Tag written to the `type` field
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Interval(_) => "interval",
            Self::Dates(_) => "dates",
        }
    }

    /// First `count` run instants at or after `on_or_after`
    pub fn next_n(&self, on_or_after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.upcoming(on_or_after).take(count).collect()
    }

    /// First `count` run instants from the current wall-clock time
    pub fn next_n_from_now(&self, count: usize) -> Vec<DateTime<Utc>> {
        self.next_n(Utc::now(), count)
    }

    /// Lazy sequence of run instants at or after `on_or_after`
    ///
    /// The iterator is `Clone`, so a caller can restart from any point.
    pub fn upcoming(&self, on_or_after: DateTime<Utc>) -> Upcoming {
        match self {
            Self::Interval(schedule) => schedule.upcoming(on_or_after),
            Self::Dates(schedule) => schedule.upcoming(on_or_after),
        }
    }

    /// Decode a schedule document, rejecting unknown tags
    pub fn from_value(value: Value) -> Result<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| FlowError::invalid_document("schedule is missing its 'type' tag"))?;
        if !SCHEDULE_TYPES.contains(&tag) {
            return Err(FlowError::UnknownScheduleType {
                tag: tag.to_string(),
            });
        }

        let decoded: Schedule = serde_json::from_value(value)?;
        decoded.validated()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Re-run constructor checks on a value that bypassed them (serde)
    fn validated(self) -> Result<Self> {
        match self {
            Self::Interval(s) => Ok(IntervalSchedule::new(s.start_date, s.interval)?.into()),
            Self::Dates(s) => Ok(DateSchedule::new(s.dates).into()),
        }
    }
}

impl From<IntervalSchedule> for Schedule {
    fn from(schedule: IntervalSchedule) -> Self {
        Self::Interval(schedule)
    }
}

impl From<DateSchedule> for Schedule {
    fn from(schedule: DateSchedule) -> Self {
        Self::Dates(schedule)
    }
}

// ═══════════════════════════════════════════════════════════════
// INTERVAL
// ═══════════════════════════════════════════════════════════════

/// Runs every `interval`, anchored at `start_date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    start_date: DateTime<Utc>,
    interval: Duration,
}

impl IntervalSchedule {
    /// Fails with `InvalidSchedule` for a zero interval or one too large
    /// to add to a timestamp.
    pub fn new(start_date: DateTime<Utc>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(FlowError::InvalidSchedule {
                reason: "interval must be greater than zero".into(),
            });
        }
        if TimeDelta::from_std(interval).is_err() {
            return Err(FlowError::InvalidSchedule {
                reason: format!("interval {interval:?} is out of range"),
            });
        }
        Ok(Self {
            start_date,
            interval,
        })
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn upcoming(&self, on_or_after: DateTime<Utc>) -> Upcoming {
        let step = self.interval.as_nanos() as i128;
        let first = if on_or_after <= self.start_date {
            0
        } else {
            // smallest k with start + k*step >= on_or_after
            let behind = delta_nanos(on_or_after.signed_duration_since(self.start_date));
            (behind + step - 1) / step
        };
        Upcoming {
            state: UpcomingState::Interval {
                start: self.start_date,
                step,
                next: first,
            },
        }
    }
}

fn delta_nanos(delta: TimeDelta) -> i128 {
    delta.num_seconds() as i128 * NANOS_PER_SEC + delta.subsec_nanos() as i128
}

fn nanos_delta(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    TimeDelta::new(secs, subsec)
}

// ═══════════════════════════════════════════════════════════════
// DATES
// ═══════════════════════════════════════════════════════════════

/// Runs at an explicit list of instants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSchedule {
    dates: Vec<DateTime<Utc>>,
}

impl DateSchedule {
    /// Dates are sorted and deduplicated
    pub fn new(mut dates: Vec<DateTime<Utc>>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    fn upcoming(&self, on_or_after: DateTime<Utc>) -> Upcoming {
        let position = self.dates.partition_point(|date| *date < on_or_after);
        Upcoming {
            state: UpcomingState::Dates {
                dates: Arc::from(self.dates.as_slice()),
                position,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// LAZY SEQUENCE
// ═══════════════════════════════════════════════════════════════

/// Iterator over run instants, produced by [`Schedule::upcoming`]
///
/// Interval sequences are unbounded until timestamp arithmetic overflows.
#[derive(Debug, Clone)]
pub struct Upcoming {
    state: UpcomingState,
}

#[derive(Debug, Clone)]
enum UpcomingState {
    Interval {
        start: DateTime<Utc>,
        step: i128,
        next: i128,
    },
    Dates {
        dates: Arc<[DateTime<Utc>]>,
        position: usize,
    },
}

impl Iterator for Upcoming {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            UpcomingState::Interval { start, step, next } => {
                let instant = next
                    .checked_mul(*step)
                    .and_then(nanos_delta)
                    .and_then(|offset| start.checked_add_signed(offset));
                // on overflow `next` stays put, so the sequence stays ended
                if instant.is_some() {
                    *next += 1;
                }
                instant
            }
            UpcomingState::Dates { dates, position } => {
                let instant = dates.get(*position).copied();
                if instant.is_some() {
                    *position += 1;
                }
                instant
            }
        }
    }
}
