use std::io::Read;
use std::path::PathBuf;

use chrono::{FixedOffset, NaiveDate};
use clap::{Args, Subcommand, ValueEnum};
use pawcare_core::recurrence::{build_with_offset, ByRule, DAY_TOKENS};
use pawcare_core::{Config, ConfigError, Frequency, Interval, RecurrenceDescriptor, ReminderSchedule};
use serde_json::json;

use crate::app::CliResult;

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Encode a reminder schedule as a recurrence descriptor
    Rule(RuleArgs),
    /// Parse a descriptor and print its fields as JSON
    Check {
        /// e.g. "FREQ=WEEKLY;BYDAY=MO,WE,FR"
        descriptor: String,
    },
}

#[derive(Args)]
pub struct RuleArgs {
    /// Schedule JSON as sent by the reminder form ("-" reads stdin)
    #[arg(conflicts_with_all = ["frequency", "start", "end", "weekdays"])]
    pub schedule: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub frequency: Option<FrequencyArg>,
    /// First occurrence (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// Last day reminders fire (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Repeat every N units (hours for daily-multiple)
    #[arg(long, default_value_t = 1)]
    pub interval: u32,
    /// Weekday indexes, 0 = Monday .. 6 = Sunday (e.g. "0,2,4")
    #[arg(long, value_delimiter = ',')]
    pub weekdays: Vec<u8>,
    /// Minutes east of UTC for the end date; defaults to reminders.utc_offset_minutes
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<i32>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    None,
    DailySingle,
    DailyMultiple,
    Weekly,
    Monthly,
    Yearly,
}

pub fn run(action: ReminderAction) -> CliResult {
    match action {
        ReminderAction::Rule(args) => {
            let offset = offset_for(args.utc_offset)?;
            let schedule = schedule_from(args)?;
            let descriptor = build_with_offset(&schedule, offset)?;
            println!("{descriptor}");
        }
        ReminderAction::Check { descriptor } => {
            let descriptor: RecurrenceDescriptor = descriptor.parse()?;
            println!("{}", serde_json::to_string_pretty(&describe(&descriptor))?);
        }
    }
    Ok(())
}

fn offset_for(minutes: Option<i32>) -> CliResult<FixedOffset> {
    let offset = match minutes {
        Some(m) => FixedOffset::east_opt(m.saturating_mul(60)).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "--utc-offset".into(),
                message: format!("{m} is not a valid UTC offset"),
            }
        })?,
        None => Config::load()?.reminders.offset()?,
    };
    Ok(offset)
}

fn schedule_from(args: RuleArgs) -> CliResult<ReminderSchedule> {
    if let Some(path) = args.schedule {
        let mut raw = String::new();
        if path.as_os_str() == "-" {
            std::io::stdin().read_to_string(&mut raw)?;
        } else {
            raw = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        }
        return Ok(serde_json::from_str(&raw)?);
    }

    let frequency = args
        .frequency
        .ok_or("either a schedule file or --frequency is required")?;
    let interval = Interval::new(args.interval);
    let frequency = match frequency {
        FrequencyArg::None => Frequency::None,
        FrequencyArg::DailySingle => Frequency::DailySingle { interval },
        FrequencyArg::DailyMultiple => Frequency::DailyMultiple {
            hourly_interval: interval,
        },
        FrequencyArg::Weekly => Frequency::Weekly {
            interval,
            weekdays: args.weekdays,
        },
        FrequencyArg::Monthly => Frequency::Monthly { interval },
        FrequencyArg::Yearly => Frequency::Yearly { interval },
    };
    Ok(ReminderSchedule {
        start_date: args.start,
        end_date: args.end,
        frequency,
    })
}

fn describe(descriptor: &RecurrenceDescriptor) -> serde_json::Value {
    let parts = descriptor.parts();
    let mut out = json!({
        "descriptor": descriptor.as_str(),
        "freq": parts.freq.as_str(),
        "interval": parts.interval,
        "recurring": descriptor.is_recurring(),
    });
    match &parts.by {
        ByRule::None => {}
        ByRule::Days(days) => {
            let tokens: Vec<&str> = days
                .iter()
                .filter_map(|d| DAY_TOKENS.get(usize::from(*d)).copied())
                .collect();
            out["byDay"] = json!(tokens);
        }
        ByRule::MonthDay(day) => out["byMonthDay"] = json!(day),
        ByRule::MonthAndDay { month, day } => {
            out["byMonth"] = json!(month);
            out["byMonthDay"] = json!(day);
        }
    }
    if let Some(until) = parts.until {
        out["until"] = json!(until.and_utc().to_rfc3339());
    }
    out
}
