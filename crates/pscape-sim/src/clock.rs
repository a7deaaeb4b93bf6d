use chrono::{Datelike, NaiveDate, TimeDelta};

use crate::error::{SimError, SimResult};

/// Tracks simulation time at daily resolution.
///
/// The clock only moves forward. It also remembers when the world was last
/// integrated so continuous processes can scale by the real elapsed time
/// rather than the nominal step.
#[derive(Debug, Clone)]
pub struct SimClock {
    current: NaiveDate,
    start: NaiveDate,
    step: TimeDelta,
    last_world_step: Option<NaiveDate>,
}

impl SimClock {
    /// Create a clock at `start` with a nominal step of `step_days`.
    pub fn new(start: NaiveDate, step_days: i64) -> Self {
        Self {
            current: start,
            start,
            step: TimeDelta::days(step_days),
            last_world_step: None,
        }
    }

    /// Current date.
    pub fn now(&self) -> NaiveDate {
        self.current
    }

    /// First day of the run.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Move the clock to `to`. Leaves the world-step marker alone.
    pub fn advance(&mut self, to: NaiveDate) -> SimResult<()> {
        if to < self.current {
            return Err(SimError::TimeOrderViolation {
                current: self.current,
                requested: to,
            });
        }
        self.current = to;
        Ok(())
    }

    /// Record the current date as the last world integration.
    pub fn mark_world_step(&mut self) {
        self.last_world_step = Some(self.current);
    }

    /// Date of the last world integration, if any.
    pub fn last_world_step(&self) -> Option<NaiveDate> {
        self.last_world_step
    }

    /// Time since the last world integration, or the nominal step if the
    /// world has never been integrated.
    pub fn elapsed_since_last_step(&self) -> TimeDelta {
        match self.last_world_step {
            Some(last) => self.current - last,
            None => self.step,
        }
    }

    /// Day of the year, 1-based.
    pub fn day_of_year(&self) -> u32 {
        self.current.ordinal()
    }

    /// Whole days since the start of the run.
    pub fn day_of_epoch(&self) -> i64 {
        (self.current - self.start).num_days()
    }

    /// Weeks, fractional, from `date` to now.
    pub fn weeks_since(&self, date: NaiveDate) -> f64 {
        (self.current - date).num_days() as f64 / 7.0
    }

    /// The day after now.
    pub fn tomorrow(&self) -> NaiveDate {
        self.current + TimeDelta::days(1)
    }

    /// Nominal step length in days.
    pub fn step_days(&self) -> i64 {
        self.step.num_days()
    }
}

/// `date` shifted by a fractional number of days, rounded to whole days.
///
/// `None` when the result is not a representable calendar date.
pub fn offset_days(date: NaiveDate, days: f64) -> Option<NaiveDate> {
    if !days.is_finite() {
        return None;
    }
    date.checked_add_signed(TimeDelta::try_days(days.round() as i64)?)
}

/// Timestamps of the paired world and agent steps: `start`, `start + step`,
/// ... while not past `end`.
pub fn enumerate_step_events(start: NaiveDate, end: NaiveDate, step_days: i64) -> Vec<NaiveDate> {
    let step = TimeDelta::days(step_days.max(1));
    let mut out = Vec::new();
    let mut t = start;
    while t <= end {
        out.push(t);
        t += step;
    }
    out
}

/// First day of every month strictly after `start` and not past `end`.
pub fn enumerate_month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut next = first_of_next_month(start);
    while let Some(date) = next {
        if date > end {
            break;
        }
        out.push(date);
        next = first_of_next_month(date);
    }
    out
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// The calendar day `(month, day)` in every year where it falls within
/// `start..=end`. Years where the day does not exist are skipped.
pub fn enumerate_annual(month: u32, day: u32, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    (start.year()..=end.year())
        .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|date| *date >= start && *date <= end)
        .collect()
}

/// The latest occurrence of any scheduled `(month, day)` at or before
/// `reference`.
pub fn most_recent(reference: NaiveDate, schedule: &[(u32, u32)]) -> Option<NaiveDate> {
    // Feb 29 can be up to eight years back across a skipped century leap year.
    let earliest = reference.year() - 8;
    schedule
        .iter()
        .filter_map(|&(month, day)| {
            (earliest..=reference.year())
                .rev()
                .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
                .find(|date| *date <= reference)
        })
        .max()
}
