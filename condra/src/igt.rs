use chrono::{DateTime, Utc};
use condra_lib::Value;

/// Formats a millisecond timer as `HH:MM:SS.mmm`, wrapping every 24 hours.
pub fn format_igt(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|time| time.format("%H:%M:%S%.3f").to_string())
}

/// One output line per reading. 32-bit integers are millisecond timers and
/// print as `IGT: HH:MM:SS.mmm`; anything else is labelled with its type.
pub fn format_reading(value: Value) -> String {
    let timer = match value {
        Value::U32(_) | Value::I32(_) => value.as_i64().and_then(format_igt),
        _ => None,
    };

    match timer {
        Some(igt) => format!("IGT: {igt}"),
        None => format!("{}: {value}", value.kind()),
    }
}
