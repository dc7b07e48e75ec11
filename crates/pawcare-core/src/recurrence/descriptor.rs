//! Canonical recurrence descriptors.
//!
//! ```text
//! FREQ={NONE|DAILY|HOURLY|WEEKLY|MONTHLY|YEARLY}
//!   [;INTERVAL=<int>=2>]
//!   [;BYDAY=<MO..SU>(,<MO..SU>)* | ;BYMONTHDAY=<1-31> | ;BYMONTH=<1-12>;BYMONTHDAY=<1-31>]
//!   [;UNTIL=<YYYYMMDDTHHMMSSZ>]
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Two-letter day tokens indexed 0 (Monday) ..= 6 (Sunday).
pub const DAY_TOKENS: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freq {
    None,
    Daily,
    Hourly,
    Weekly,
    Monthly,
    Yearly,
}

impl Freq {
    pub fn as_str(self) -> &'static str {
        match self {
            Freq::None => "NONE",
            Freq::Daily => "DAILY",
            Freq::Hourly => "HOURLY",
            Freq::Weekly => "WEEKLY",
            Freq::Monthly => "MONTHLY",
            Freq::Yearly => "YEARLY",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "NONE" => Freq::None,
            "DAILY" => Freq::Daily,
            "HOURLY" => Freq::Hourly,
            "WEEKLY" => Freq::Weekly,
            "MONTHLY" => Freq::Monthly,
            "YEARLY" => Freq::Yearly,
            _ => return None,
        })
    }
}

/// The BY* part of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByRule {
    None,
    /// Weekday indices, Monday first, no duplicates.
    Days(Vec<u8>),
    MonthDay(u32),
    MonthAndDay { month: u32, day: u32 },
}

/// Structured form of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleParts {
    pub freq: Freq,
    pub interval: u32,
    pub by: ByRule,
    pub until: Option<NaiveDateTime>,
}

impl RuleParts {
    pub fn none() -> Self {
        Self {
            freq: Freq::None,
            interval: 1,
            by: ByRule::None,
            until: None,
        }
    }

    pub fn parse(descriptor: &str) -> Result<Self, ValidationError> {
        let invalid = |message: &str| ValidationError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            message: message.to_string(),
        };

        let mut fields = descriptor.split(';').map(|field| {
            field
                .split_once('=')
                .ok_or_else(|| invalid(&format!("field '{field}' has no '='")))
        });

        let freq = match fields.next() {
            Some(Ok(("FREQ", value))) => {
                Freq::parse(value).ok_or_else(|| invalid(&format!("unknown FREQ '{value}'")))?
            }
            Some(Err(e)) => return Err(e),
            _ => return Err(invalid("must start with FREQ")),
        };

        let mut parts = RuleParts {
            freq,
            ..RuleParts::none()
        };
        let rest = fields.collect::<Result<Vec<_>, _>>()?;

        if freq == Freq::None {
            if !rest.is_empty() {
                return Err(invalid("FREQ=NONE takes no other fields"));
            }
            return Ok(parts);
        }

        let mut rest = rest.into_iter().peekable();

        if let Some(&("INTERVAL", value)) = rest.peek() {
            let n: u32 = value
                .parse()
                .map_err(|_| invalid(&format!("INTERVAL '{value}' is not a number")))?;
            if n < 2 {
                return Err(invalid("INTERVAL is only written when at least 2"));
            }
            parts.interval = n;
            rest.next();
        }

        match rest.peek().copied() {
            Some(("BYDAY", value)) => {
                let mut days = Vec::new();
                for token in value.split(',') {
                    let idx = DAY_TOKENS
                        .iter()
                        .position(|t| *t == token)
                        .ok_or_else(|| invalid(&format!("unknown day '{token}'")))?;
                    if days.last().is_some_and(|&last| usize::from(last) >= idx) {
                        return Err(invalid("BYDAY days must be distinct, Monday first"));
                    }
                    days.push(idx as u8);
                }
                parts.by = ByRule::Days(days);
                rest.next();
            }
            Some(("BYMONTHDAY", value)) => {
                parts.by = ByRule::MonthDay(parse_ranged(value, 1, 31).ok_or_else(|| {
                    invalid(&format!("BYMONTHDAY '{value}' out of range"))
                })?);
                rest.next();
            }
            Some(("BYMONTH", value)) => {
                let month = parse_ranged(value, 1, 12)
                    .ok_or_else(|| invalid(&format!("BYMONTH '{value}' out of range")))?;
                rest.next();
                let day = match rest.next() {
                    Some(("BYMONTHDAY", day)) => parse_ranged(day, 1, 31)
                        .ok_or_else(|| invalid(&format!("BYMONTHDAY '{day}' out of range")))?,
                    _ => return Err(invalid("BYMONTH must be followed by BYMONTHDAY")),
                };
                parts.by = ByRule::MonthAndDay { month, day };
            }
            _ => {}
        }

        if let Some(&("UNTIL", value)) = rest.peek() {
            let until = NaiveDateTime::parse_from_str(value, UNTIL_FORMAT)
                .map_err(|_| invalid(&format!("UNTIL '{value}' is not YYYYMMDDTHHMMSSZ")))?;
            parts.until = Some(until);
            rest.next();
        }

        if let Some((key, _)) = rest.next() {
            return Err(invalid(&format!("unexpected field '{key}'")));
        }
        if parts.to_string() != descriptor {
            return Err(invalid("not in canonical form"));
        }
        Ok(parts)
    }
}

fn parse_ranged(value: &str, min: u32, max: u32) -> Option<u32> {
    value.parse().ok().filter(|n| (min..=max).contains(n))
}

impl fmt::Display for RuleParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_str())?;
        if self.interval > 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        match &self.by {
            ByRule::None => {}
            ByRule::Days(days) => {
                let tokens: Vec<&str> = days
                    .iter()
                    .filter_map(|d| DAY_TOKENS.get(usize::from(*d)).copied())
                    .collect();
                write!(f, ";BYDAY={}", tokens.join(","))?;
            }
            ByRule::MonthDay(day) => write!(f, ";BYMONTHDAY={day}")?,
            ByRule::MonthAndDay { month, day } => {
                write!(f, ";BYMONTH={month};BYMONTHDAY={day}")?
            }
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format(UNTIL_FORMAT))?;
        }
        Ok(())
    }
}

/// Immutable recurrence descriptor. Editing a reminder builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecurrenceDescriptor {
    text: String,
    parts: RuleParts,
}

impl RecurrenceDescriptor {
    pub(crate) fn from_parts(parts: RuleParts) -> Self {
        Self {
            text: parts.to_string(),
            parts,
        }
    }

    pub fn none() -> Self {
        Self::from_parts(RuleParts::none())
    }

    /// Validate a descriptor received from storage or the backend.
    pub fn parse(descriptor: &str) -> Result<Self, ValidationError> {
        let parts = RuleParts::parse(descriptor)?;
        Ok(Self {
            text: descriptor.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn parts(&self) -> &RuleParts {
        &self.parts
    }

    pub fn is_recurring(&self) -> bool {
        self.parts.freq != Freq::None
    }
}

impl fmt::Display for RecurrenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for RecurrenceDescriptor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecurrenceDescriptor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parts = RuleParts::parse(&value)?;
        Ok(Self { text: value, parts })
    }
}

impl From<RecurrenceDescriptor> for String {
    fn from(descriptor: RecurrenceDescriptor) -> Self {
        descriptor.text
    }
}

impl AsRef<str> for RecurrenceDescriptor {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
