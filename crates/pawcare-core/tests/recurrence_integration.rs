//! Integration tests for reminder recurrence rules.
//!
//! Drives the builder from the JSON the reminder form submits, and checks
//! that descriptors survive storage as JSON strings.

use chrono::{FixedOffset, NaiveDate};
use pawcare_core::recurrence::{build, build_with_offset, ByRule, Freq};
use pawcare_core::{Frequency, Interval, RecurrenceDescriptor, ReminderSchedule, ValidationError};
use proptest::prelude::*;
use serde_json::json;

fn schedule(value: serde_json::Value) -> ReminderSchedule {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_form_payloads_encode_to_descriptors() {
    let cases = [
        (
            json!({"startDate": "2025-01-06", "frequency": "weekly", "weekdays": [4, 0, 2]}),
            "FREQ=WEEKLY;BYDAY=MO,WE,FR",
        ),
        (
            json!({"startDate": "2025-01-06", "frequency": "daily-single", "interval": "3"}),
            "FREQ=DAILY;INTERVAL=3",
        ),
        (
            json!({"startDate": "2025-01-06", "frequency": "daily_multiple", "hourlyInterval": 8}),
            "FREQ=HOURLY;INTERVAL=8",
        ),
        (
            json!({"startDate": "2025-03-15", "frequency": "monthly", "interval": 2}),
            "FREQ=MONTHLY;INTERVAL=2;BYMONTHDAY=15",
        ),
        (
            json!({
                "startDate": "2025-07-04",
                "endDate": "2026-07-04",
                "frequency": "yearly",
                "interval": 1
            }),
            "FREQ=YEARLY;BYMONTH=7;BYMONTHDAY=4;UNTIL=20260704T235959Z",
        ),
        (json!({"frequency": "none"}), "FREQ=NONE"),
    ];

    for (payload, expected) in cases {
        let built = build(&schedule(payload.clone())).unwrap();
        assert_eq!(built.as_str(), expected, "payload {payload}");
    }
}

#[test]
fn test_garbage_interval_falls_back_to_one() {
    let s = schedule(json!({"startDate": "2025-01-06", "frequency": "daily-single", "interval": "abc"}));
    assert_eq!(build(&s).unwrap().as_str(), "FREQ=DAILY");
}

#[test]
fn test_weekly_without_days_is_a_field_error() {
    let s = schedule(json!({"startDate": "2025-01-06", "frequency": "weekly", "weekdays": []}));
    let err = build(&s).unwrap_err();
    assert_eq!(err, ValidationError::WeekdaysRequired);
    assert_eq!(err.code(), "weekdays-required");
}

#[test]
fn test_descriptor_is_stored_as_a_plain_string() {
    let s = schedule(json!({"startDate": "2025-01-06", "frequency": "weekly", "weekdays": [1, 3]}));
    let descriptor = build(&s).unwrap();

    let stored = serde_json::to_value(json!({"rule": descriptor})).unwrap();
    assert_eq!(stored["rule"], "FREQ=WEEKLY;BYDAY=TU,TH");

    let loaded: RecurrenceDescriptor = serde_json::from_value(stored["rule"].clone()).unwrap();
    assert_eq!(loaded, descriptor);
    assert_eq!(loaded.parts().by, ByRule::Days(vec![1, 3]));
}

#[test]
fn test_malformed_stored_descriptor_is_rejected() {
    for bad in ["FREQ=WEEKLY;BYDAY=XX", "FREQ=DAILY;INTERVAL=1", "BYDAY=MO", ""] {
        let result: Result<RecurrenceDescriptor, _> = serde_json::from_value(json!(bad));
        assert!(result.is_err(), "{bad:?} accepted");
    }
}

#[test]
fn test_end_date_follows_configured_offset() {
    let s = schedule(json!({
        "startDate": "2025-01-01",
        "endDate": "2025-01-10",
        "frequency": "daily-single"
    }));
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    assert_eq!(
        build_with_offset(&s, tokyo).unwrap().as_str(),
        "FREQ=DAILY;UNTIL=20250110T145959Z"
    );
}

fn weekly_strategy() -> impl Strategy<Value = ReminderSchedule> {
    (
        0i64..3650,
        1u32..10,
        prop::collection::vec(0u8..7, 1..10),
        prop::option::of(0i64..800),
    )
        .prop_map(|(start_offset, interval, weekdays, end_offset)| {
            let epoch = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let start = epoch + chrono::Duration::days(start_offset);
            let mut s = ReminderSchedule::new(
                start,
                Frequency::Weekly {
                    interval: Interval::new(interval),
                    weekdays,
                },
            );
            if let Some(days) = end_offset {
                s = s.until(start + chrono::Duration::days(days));
            }
            s
        })
}

proptest! {
    #[test]
    fn test_building_is_deterministic_and_parses_back(s in weekly_strategy()) {
        let first = build(&s).unwrap();
        let second = build(&s).unwrap();
        prop_assert_eq!(first.as_str(), second.as_str());

        let parsed: RecurrenceDescriptor = first.as_str().parse().unwrap();
        prop_assert_eq!(parsed.parts(), first.parts());
        prop_assert_eq!(parsed.parts().freq, Freq::Weekly);

        if let ByRule::Days(days) = &parsed.parts().by {
            prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
        } else {
            prop_assert!(false, "weekly rule without BYDAY");
        }
    }

    #[test]
    fn test_weekday_selection_order_is_irrelevant(s in weekly_strategy()) {
        let mut shuffled = s.clone();
        if let Frequency::Weekly { weekdays, .. } = &mut shuffled.frequency {
            weekdays.reverse();
        }
        prop_assert_eq!(build(&s).unwrap(), build(&shuffled).unwrap());
    }
}
