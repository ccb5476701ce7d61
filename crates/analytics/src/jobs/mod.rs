pub mod bottlenecks;
pub mod hourly;
pub mod partitions;
pub mod routes;
pub mod warmers;

use chrono::{DateTime, Duration, Timelike, Utc};

/// The previous completed hour as a half-open window, plus its bucket key.
pub fn previous_hour(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>, String, i16) {
    let current_hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let start = current_hour_start - Duration::hours(1);
    let date = start.format("%Y%m%d").to_string();
    let hour = start.hour() as i16;
    (start, current_hour_start, date, hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn previous_hour_is_half_open_and_keyed_to_its_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 14, 25, 33).unwrap();
        let (start, end, date, hour) = previous_hour(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap());
        assert_eq!(date, "20250310");
        assert_eq!(hour, 13);
    }

    #[test]
    fn previous_hour_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 0, 5, 0).unwrap();
        let (start, _, date, hour) = previous_hour(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 9, 23, 0, 0).unwrap());
        assert_eq!(date, "20250309");
        assert_eq!(hour, 23);
    }
}
