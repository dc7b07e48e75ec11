//! Encode a [`ReminderSchedule`] into its [`RecurrenceDescriptor`].

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, Utc};

use super::descriptor::{ByRule, Freq, RecurrenceDescriptor, RuleParts};
use super::schedule::{Frequency, ReminderSchedule};
use crate::error::ValidationError;

/// Builds descriptors, interpreting calendar dates in one timezone offset.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceRuleBuilder {
    offset: FixedOffset,
}

impl Default for RecurrenceRuleBuilder {
    fn default() -> Self {
        Self::utc()
    }
}

impl RecurrenceRuleBuilder {
    /// Dates are UTC days.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Dates are local days at `offset`; UNTIL is still written in UTC.
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn build(&self, schedule: &ReminderSchedule) -> Result<RecurrenceDescriptor, ValidationError> {
        let start = match (&schedule.frequency, schedule.start_date) {
            (Frequency::None, _) | (_, None) => return Ok(RecurrenceDescriptor::none()),
            (_, Some(start)) => start,
        };

        let (freq, interval, by) = match &schedule.frequency {
            Frequency::None => return Ok(RecurrenceDescriptor::none()),
            Frequency::DailySingle { interval } => (Freq::Daily, *interval, ByRule::None),
            Frequency::DailyMultiple { hourly_interval } => {
                (Freq::Hourly, *hourly_interval, ByRule::None)
            }
            Frequency::Weekly { interval, weekdays } => {
                (Freq::Weekly, *interval, ByRule::Days(canonical_weekdays(weekdays)?))
            }
            Frequency::Monthly { interval } => {
                (Freq::Monthly, *interval, ByRule::MonthDay(start.day()))
            }
            Frequency::Yearly { interval } => (
                Freq::Yearly,
                *interval,
                ByRule::MonthAndDay {
                    month: start.month(),
                    day: start.day(),
                },
            ),
        };

        let until = schedule
            .end_date
            .filter(|end| *end > start)
            .map(|end| self.end_of_day_utc(end));

        Ok(RecurrenceDescriptor::from_parts(RuleParts {
            freq,
            interval: interval.get(),
            by,
            until,
        }))
    }

    /// Last second of `date` in local time, as a UTC wall-clock time. The
    /// descriptor has second resolution, so 23:59:59.999 is written as 23:59:59.
    fn end_of_day_utc(&self, date: NaiveDate) -> NaiveDateTime {
        let local = date
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| date.and_time(NaiveTime::default()));
        local - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))
    }
}

/// Sort Monday first and drop duplicates. Empty selections are rejected.
fn canonical_weekdays(weekdays: &[u8]) -> Result<Vec<u8>, ValidationError> {
    if weekdays.is_empty() {
        return Err(ValidationError::WeekdaysRequired);
    }
    if let Some(bad) = weekdays.iter().find(|d| **d > 6) {
        return Err(ValidationError::InvalidWeekday(*bad));
    }
    let mut days = weekdays.to_vec();
    days.sort_unstable();
    days.dedup();
    Ok(days)
}

/// Build with calendar dates taken as UTC days.
pub fn build(schedule: &ReminderSchedule) -> Result<RecurrenceDescriptor, ValidationError> {
    RecurrenceRuleBuilder::utc().build(schedule)
}

/// Build with calendar dates taken as local days at `offset`.
pub fn build_with_offset(
    schedule: &ReminderSchedule,
    offset: FixedOffset,
) -> Result<RecurrenceDescriptor, ValidationError> {
    RecurrenceRuleBuilder::with_offset(offset).build(schedule)
}
