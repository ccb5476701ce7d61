//! Period strings, custom ranges, granularity selection and dense bucket
//! generation.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use ledger_domain::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

/// A resolved date range plus the granularity its buckets use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

fn parse_named_period(period: &str, today: NaiveDate) -> Result<(NaiveDate, NaiveDate, Granularity)> {
    match period {
        "today" => Ok((today, today, Granularity::Hourly)),
        "last7days" => Ok((today - Duration::days(6), today, Granularity::Daily)),
        "last30days" => Ok((today - Duration::days(29), today, Granularity::Daily)),
        "currentWeek" => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            Ok((start, today, Granularity::Daily))
        }
        "currentMonth" => {
            let start = today.with_day(1).unwrap_or(today);
            Ok((start, today, Granularity::Daily))
        }
        "currentYear" => {
            let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            Ok((start, today, Granularity::Monthly))
        }
        other => Err(Error::invalid_input(format!("invalid period: {other:?}"))),
    }
}

/// Granularity for a custom range, by inclusive day count.
pub fn granularity_for_range(start: NaiveDate, end: NaiveDate) -> Granularity {
    let days = (end - start).num_days() + 1;
    if days <= 1 {
        Granularity::Hourly
    } else if days <= 30 {
        Granularity::Daily
    } else if days <= 180 {
        Granularity::Weekly
    } else {
        Granularity::Monthly
    }
}

/// Resolve a named period or a custom `from..=to` range.
pub fn resolve(
    period: Option<&str>,
    period_from: Option<&str>,
    period_to: Option<&str>,
    today: NaiveDate,
) -> Result<ResolvedRange> {
    if let Some(period) = period {
        let (start, end, granularity) = parse_named_period(period, today)?;
        return Ok(ResolvedRange {
            start,
            end,
            granularity,
        });
    }

    let (Some(from), Some(to)) = (period_from, period_to) else {
        return Err(Error::invalid_input(
            "either period or both periodFrom and periodTo must be provided",
        ));
    };
    let start: NaiveDate = from
        .parse()
        .map_err(|_| Error::invalid_input("periodFrom must be YYYY-MM-DD"))?;
    let end: NaiveDate = to
        .parse()
        .map_err(|_| Error::invalid_input("periodTo must be YYYY-MM-DD"))?;
    if start > end {
        return Err(Error::invalid_input(
            "periodFrom must be before or equal to periodTo",
        ));
    }
    if start > today || end > today {
        return Err(Error::invalid_input("dates cannot be in the future"));
    }

    Ok(ResolvedRange {
        start,
        end,
        granularity: granularity_for_range(start, end),
    })
}

/// All expected buckets for a range: `(YYYYMMDD, hour)` pairs, hour set
/// only for hourly granularity.
pub fn buckets(range: ResolvedRange) -> Vec<(String, Option<i32>)> {
    let mut out = Vec::new();
    match range.granularity {
        Granularity::Hourly => {
            let date = range.start.format("%Y%m%d").to_string();
            for hour in 0..24 {
                out.push((date.clone(), Some(hour)));
            }
        }
        Granularity::Daily => {
            let mut current = range.start;
            while current <= range.end {
                out.push((current.format("%Y%m%d").to_string(), None));
                current += Duration::days(1);
            }
        }
        Granularity::Weekly => {
            let mut current = range.start;
            while current <= range.end {
                out.push((current.format("%Y%m%d").to_string(), None));
                current += Duration::weeks(1);
            }
        }
        Granularity::Monthly => {
            let mut current = range.start;
            while current <= range.end {
                out.push((current.format("%Y%m%d").to_string(), None));
                current = current + Months::new(1);
            }
        }
    }
    out
}

/// Map an individual day onto its bucket's date string, per granularity.
pub fn bucket_for_date(range: ResolvedRange, date: NaiveDate) -> String {
    match range.granularity {
        Granularity::Hourly | Granularity::Daily => date.format("%Y%m%d").to_string(),
        Granularity::Weekly => {
            let offset = (date - range.start).num_days().max(0) / 7;
            (range.start + Duration::weeks(offset)).format("%Y%m%d").to_string()
        }
        Granularity::Monthly => {
            let mut current = range.start;
            loop {
                let next = current + Months::new(1);
                if date < next || next > range.end {
                    break current.format("%Y%m%d").to_string();
                }
                current = next;
            }
        }
    }
}

/// Datetime window for periods used by the error list (`today` means the
/// start of today through now).
pub fn time_window(
    period: Option<&str>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    if let (Some(from), Some(to)) = (from, to) {
        return (from, to);
    }

    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    let start = match period.unwrap_or("today") {
        "today" => midnight,
        "last7days" => midnight - Duration::days(7),
        "last30days" => midnight - Duration::days(30),
        "currentWeek" => {
            midnight - Duration::days(now.date_naive().weekday().num_days_from_monday() as i64)
        }
        "currentMonth" => now
            .date_naive()
            .with_day(1)
            .unwrap_or(now.date_naive())
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc(),
        "currentYear" => NaiveDate::from_ymd_opt(now.year(), 1, 1)
            .unwrap_or(now.date_naive())
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc(),
        _ => midnight - Duration::days(1),
    };
    (start, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_is_hourly_single_day() {
        let today = date(2025, 3, 10);
        let range = resolve(Some("today"), None, None, today).unwrap();
        assert_eq!(range.granularity, Granularity::Hourly);
        assert_eq!(range.start, today);
        assert_eq!(range.end, today);
    }

    #[test]
    fn last7days_is_daily_and_spans_seven() {
        let today = date(2025, 3, 10);
        let range = resolve(Some("last7days"), None, None, today).unwrap();
        assert_eq!(range.granularity, Granularity::Daily);
        assert_eq!(buckets(range).len(), 7);
    }

    #[test]
    fn current_week_starts_monday() {
        // 2025-03-12 is a Wednesday.
        let range = resolve(Some("currentWeek"), None, None, date(2025, 3, 12)).unwrap();
        assert_eq!(range.start, date(2025, 3, 10));
    }

    #[test]
    fn current_year_is_monthly() {
        let range = resolve(Some("currentYear"), None, None, date(2025, 3, 10)).unwrap();
        assert_eq!(range.granularity, Granularity::Monthly);
        assert_eq!(buckets(range).len(), 3); // Jan, Feb, Mar
    }

    #[test]
    fn unknown_period_is_invalid() {
        assert!(resolve(Some("yesterday"), None, None, date(2025, 3, 10)).is_err());
    }

    #[test]
    fn custom_range_granularity_ladder() {
        let d = |a, b| granularity_for_range(a, b);
        assert_eq!(d(date(2025, 1, 1), date(2025, 1, 1)), Granularity::Hourly);
        assert_eq!(d(date(2025, 1, 1), date(2025, 1, 30)), Granularity::Daily);
        assert_eq!(d(date(2025, 1, 1), date(2025, 6, 29)), Granularity::Weekly);
        assert_eq!(d(date(2025, 1, 1), date(2025, 12, 31)), Granularity::Monthly);
    }

    #[test]
    fn custom_range_rejects_reversed_and_future() {
        let today = date(2025, 3, 10);
        assert!(resolve(None, Some("2025-03-05"), Some("2025-03-01"), today).is_err());
        assert!(resolve(None, Some("2025-03-01"), Some("2025-03-11"), today).is_err());
        assert!(resolve(None, Some("2025-03-01"), None, today).is_err());
    }

    #[test]
    fn hourly_buckets_cover_24_hours() {
        let range = resolve(Some("today"), None, None, date(2025, 3, 10)).unwrap();
        let buckets = buckets(range);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[0], ("20250310".into(), Some(0)));
        assert_eq!(buckets[23], ("20250310".into(), Some(23)));
    }

    #[test]
    fn monthly_buckets_step_by_month() {
        let range = ResolvedRange {
            start: date(2025, 1, 15),
            end: date(2025, 4, 15),
            granularity: Granularity::Monthly,
        };
        let buckets = buckets(range);
        assert_eq!(
            buckets.iter().map(|(d, _)| d.as_str()).collect::<Vec<_>>(),
            vec!["20250115", "20250215", "20250315", "20250415"],
        );
    }

    #[test]
    fn weekly_bucket_assignment() {
        let range = ResolvedRange {
            start: date(2025, 1, 1),
            end: date(2025, 2, 28),
            granularity: Granularity::Weekly,
        };
        assert_eq!(bucket_for_date(range, date(2025, 1, 3)), "20250101");
        assert_eq!(bucket_for_date(range, date(2025, 1, 8)), "20250108");
        assert_eq!(bucket_for_date(range, date(2025, 1, 14)), "20250108");
        assert_eq!(bucket_for_date(range, date(2025, 1, 15)), "20250115");
    }

    #[test]
    fn time_window_today_starts_at_midnight() {
        let now = date(2025, 3, 10).and_hms_opt(15, 30, 0).unwrap().and_utc();
        let (start, end) = time_window(Some("today"), None, None, now);
        assert_eq!(start, date(2025, 3, 10).and_hms_opt(0, 0, 0).unwrap().and_utc());
        assert_eq!(end, now);
    }

    #[test]
    fn time_window_explicit_bounds_win() {
        let now = Utc::now();
        let from = now - Duration::days(2);
        let to = now - Duration::days(1);
        let (start, end) = time_window(Some("today"), Some(from), Some(to), now);
        assert_eq!((start, end), (from, to));
    }
}
