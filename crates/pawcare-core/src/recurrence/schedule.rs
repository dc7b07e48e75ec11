//! Reminder schedules as chosen in the "add reminder" form.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Repeat interval, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval(u32);

impl Interval {
    pub const ONE: Interval = Interval(1);

    /// Zero is not a valid interval and becomes 1.
    pub fn new(n: u32) -> Self {
        Interval(n.max(1))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Parse free-form text from a numeric input field.
    ///
    /// Reads an optional sign and the leading run of digits, ignoring
    /// anything after it ("3 weeks" is 3). Text without a leading number,
    /// zero and negative values all become 1.
    pub fn parse_lenient(input: &str) -> Self {
        let s = input.trim_start();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let mut value: u64 = 0;
        let mut seen_digit = false;
        for b in digits.bytes() {
            if !b.is_ascii_digit() {
                break;
            }
            seen_digit = true;
            value = value.saturating_mul(10).saturating_add(u64::from(b - b'0'));
        }

        if !seen_digit || negative || value == 0 {
            return Interval::ONE;
        }
        Interval(u32::try_from(value).unwrap_or(u32::MAX))
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Interval::new(u32::try_from(i.max(0)).unwrap_or(u32::MAX))
                } else if let Some(f) = n.as_f64() {
                    Interval::parse_lenient(&f.to_string())
                } else {
                    Interval::ONE
                }
            }
            serde_json::Value::String(s) => Interval::parse_lenient(s),
            _ => Interval::ONE,
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::ONE
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Interval {
    fn from(n: u32) -> Self {
        Interval::new(n)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

// The form sends whatever the text field holds: numbers, numeric strings,
// junk or null. All of it is accepted and coerced.
impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Interval::from_json(&raw))
    }
}

/// Frequency class with only the fields that make sense for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "kebab-case")]
pub enum Frequency {
    None,
    #[serde(alias = "daily_single")]
    DailySingle {
        #[serde(default)]
        interval: Interval,
    },
    #[serde(alias = "daily_multiple")]
    DailyMultiple {
        #[serde(default, rename = "hourlyInterval", alias = "hourly_interval")]
        hourly_interval: Interval,
    },
    Weekly {
        #[serde(default)]
        interval: Interval,
        /// 0 = Monday ..= 6 = Sunday
        #[serde(default)]
        weekdays: Vec<u8>,
    },
    Monthly {
        #[serde(default)]
        interval: Interval,
    },
    Yearly {
        #[serde(default)]
        interval: Interval,
    },
}

/// A reminder's repeat schedule.
///
/// A payload without a `frequency` (or with a null or empty one) is a
/// one-off reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderSchedule {
    #[serde(rename = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub frequency: Frequency,
}

#[derive(Deserialize)]
struct RawSchedule {
    #[serde(default, rename = "startDate", alias = "start_date")]
    start_date: Option<NaiveDate>,
    #[serde(default, rename = "endDate", alias = "end_date")]
    end_date: Option<NaiveDate>,
    #[serde(flatten)]
    frequency: Frequency,
}

impl<'de> Deserialize<'de> for ReminderSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde_json::Value;

        let mut fields = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let unset = match fields.get("frequency") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if unset {
            fields.insert("frequency".into(), Value::String("none".into()));
        }

        let raw: RawSchedule =
            serde_json::from_value(Value::Object(fields)).map_err(serde::de::Error::custom)?;
        Ok(Self {
            start_date: raw.start_date,
            end_date: raw.end_date,
            frequency: raw.frequency,
        })
    }
}

impl ReminderSchedule {
    pub fn new(start_date: NaiveDate, frequency: Frequency) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: None,
            frequency,
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn once() -> Self {
        Self {
            start_date: None,
            end_date: None,
            frequency: Frequency::None,
        }
    }
}
