//! Reminder recurrence rules.
//!
//! A [`ReminderSchedule`] from the reminder form is encoded once into a
//! [`RecurrenceDescriptor`], an iCalendar-RRULE-like string that the backend
//! stores and its trigger engine consumes. The encoding is deterministic:
//! the same schedule always produces the same bytes.

mod builder;
mod descriptor;
mod schedule;

pub use builder::{build, build_with_offset, RecurrenceRuleBuilder};
pub use descriptor::{ByRule, Freq, RecurrenceDescriptor, RuleParts, DAY_TOKENS, UNTIL_FORMAT};
pub use schedule::{Frequency, Interval, ReminderSchedule};
