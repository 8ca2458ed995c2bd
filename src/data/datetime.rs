use chrono::{DateTime, NaiveDate, Utc};

/// Format of the time axis tick labels.
pub const TICK_FORMAT: &str = "%H:%M:%S%.3f";

/// Format of the start of the visible time range.
pub const RANGE_START_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Converts epoch seconds to a UTC timestamp, keeping sub-second precision.
pub fn to_datetime(epoch_secs: f64) -> Option<DateTime<Utc>> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Epoch seconds at midnight UTC on the given date.
pub fn epoch_seconds(year: i32, month: u32, day: u32) -> Option<f64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp() as f64)
}

/// `HH:MM:SS.ss` with hundredths, as shown under the axis ticks.
pub fn format_tick_time(epoch_secs: f64) -> String {
    match to_datetime(epoch_secs) {
        Some(dt) => {
            let mut s = dt.format(TICK_FORMAT).to_string();
            // Drop the thousandths digit.
            s.pop();
            s
        }
        None => String::new(),
    }
}

/// Human readable length of a span, largest units first and zero units
/// left out: `"1 hour 2 minutes 3 seconds"`. Fractions of a second are
/// dropped.
pub fn format_precise_duration(seconds: f64) -> String {
    let total = seconds.abs().floor() as u64;
    if total == 0 {
        return "0 seconds".to_string();
    }

    let units = [
        ("day", total / 86_400),
        ("hour", (total % 86_400) / 3_600),
        ("minute", (total % 3_600) / 60),
        ("second", total % 60),
    ];
    units
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(name, n)| {
            if *n == 1 {
                format!("{n} {name}")
            } else {
                format!("{n} {name}s")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Start of the visible range plus its length, e.g.
/// `"01 Jan 2016 00:00:00 + 30 minutes"`.
pub fn format_time_range(left: f64, right: f64) -> String {
    let start = match to_datetime(left) {
        Some(dt) => dt.format(RANGE_START_FORMAT).to_string(),
        None => return String::new(),
    };
    format!("{start} + {}", format_precise_duration(right - left))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_of_2016() {
        assert_eq!(epoch_seconds(2016, 1, 1), Some(1_451_606_400.0));
        assert_eq!(epoch_seconds(2016, 2, 30), None);
    }

    #[test]
    fn tick_labels_have_hundredths() {
        let t = 1_451_606_400.0 + 3_723.25;
        assert_eq!(format_tick_time(t), "01:02:03.25");
        assert_eq!(format_tick_time(f64::NAN), "");
    }

    #[test]
    fn precise_duration_skips_zero_units() {
        assert_eq!(format_precise_duration(0.4), "0 seconds");
        assert_eq!(format_precise_duration(61.0), "1 minute 1 second");
        assert_eq!(format_precise_duration(7_200.0), "2 hours");
        assert_eq!(format_precise_duration(90_061.9), "1 day 1 hour 1 minute 1 second");
    }

    #[test]
    fn time_range_text() {
        let start = 1_451_606_400.0;
        assert_eq!(
            format_time_range(start, start + 1_800.0),
            "01 Jan 2016 00:00:00 + 30 minutes"
        );
    }
}
