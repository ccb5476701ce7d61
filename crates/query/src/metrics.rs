//! Aggregated-metric reads with dense, zero-filled buckets.
//!
//! Hourly granularity reads the stored per-hour rows for a single day;
//! coarser granularities re-aggregate per-day rows into their buckets
//! (counts summed, means averaged, extremes taken, percentiles averaged
//! as an approximation).

use sqlx::PgPool;

use ledger_domain::{Error, Result};
use ledger_store::rows::AggregatedMetricRow;

use crate::period::{buckets, bucket_for_date, Granularity, ResolvedRange};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricBucket {
    pub date: String,
    pub hour: Option<i32>,
    pub endpoint_method: Option<String>,
    pub endpoint_path: Option<String>,
    pub log_level: Option<String>,
    pub log_type: Option<String>,
    pub log_count: i64,
    pub error_count: i64,
    pub avg_duration_ms: Option<f64>,
    pub min_duration_ms: Option<i32>,
    pub max_duration_ms: Option<i32>,
    pub p95_duration_ms: Option<i32>,
    pub p99_duration_ms: Option<i32>,
}

fn validate_metric_type(metric_type: &str) -> Result<()> {
    match metric_type {
        "exception" | "endpoint" | "log_volume" => Ok(()),
        other => Err(Error::invalid_input(format!(
            "invalid metric type: {other:?}"
        ))),
    }
}

pub async fn get_aggregated_metrics(
    pool: &PgPool,
    project_id: i64,
    metric_type: &str,
    range: ResolvedRange,
    endpoint_path: Option<&str>,
) -> Result<Vec<MetricBucket>> {
    validate_metric_type(metric_type)?;

    let rows = sqlx::query_as::<_, AggregatedMetricRow>(
        "SELECT date, hour, endpoint_method, endpoint_path, log_level, log_type,
                log_count, error_count, avg_duration_ms, min_duration_ms,
                max_duration_ms, p95_duration_ms, p99_duration_ms
         FROM aggregated_metrics
         WHERE project_id = $1 AND metric_type = $2
           AND date >= $3 AND date <= $4
           AND ($5::text IS NULL OR endpoint_path = $5)
         ORDER BY date, hour",
    )
    .bind(project_id)
    .bind(metric_type)
    .bind(range.start.format("%Y%m%d").to_string())
    .bind(range.end.format("%Y%m%d").to_string())
    .bind(endpoint_path)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    Ok(fill_buckets(rows, range, endpoint_path))
}

/// Fold stored rows into the dense bucket grid for the range.
pub fn fill_buckets(
    rows: Vec<AggregatedMetricRow>,
    range: ResolvedRange,
    endpoint_path: Option<&str>,
) -> Vec<MetricBucket> {
    struct Accum {
        bucket: MetricBucket,
        avg_parts: Vec<f64>,
        p95_parts: Vec<i32>,
        p99_parts: Vec<i32>,
    }

    let grid = buckets(range);
    let mut accums: Vec<Option<Accum>> = Vec::with_capacity(grid.len());
    accums.resize_with(grid.len(), || None);

    for row in rows {
        let slot = match range.granularity {
            Granularity::Hourly => grid
                .iter()
                .position(|(date, hour)| *date == row.date && *hour == row.hour.map(i32::from)),
            _ => {
                let Ok(day) = chrono::NaiveDate::parse_from_str(&row.date, "%Y%m%d") else {
                    continue;
                };
                let key = bucket_for_date(range, day);
                grid.iter().position(|(date, _)| *date == key)
            }
        };
        let Some(slot) = slot else { continue };

        let accum = accums[slot].get_or_insert_with(|| Accum {
            bucket: MetricBucket {
                date: grid[slot].0.clone(),
                hour: grid[slot].1,
                ..MetricBucket::default()
            },
            avg_parts: Vec::new(),
            p95_parts: Vec::new(),
            p99_parts: Vec::new(),
        });

        accum.bucket.log_count += row.log_count;
        accum.bucket.error_count += row.error_count;
        accum.bucket.endpoint_method = accum.bucket.endpoint_method.take().or(row.endpoint_method);
        accum.bucket.endpoint_path = accum.bucket.endpoint_path.take().or(row.endpoint_path);
        accum.bucket.log_level = accum.bucket.log_level.take().or(row.log_level);
        accum.bucket.log_type = accum.bucket.log_type.take().or(row.log_type);

        if let Some(avg) = row.avg_duration_ms {
            accum.avg_parts.push(avg);
        }
        if let Some(min) = row.min_duration_ms {
            accum.bucket.min_duration_ms =
                Some(accum.bucket.min_duration_ms.map_or(min, |m| m.min(min)));
        }
        if let Some(max) = row.max_duration_ms {
            accum.bucket.max_duration_ms =
                Some(accum.bucket.max_duration_ms.map_or(max, |m| m.max(max)));
        }
        if let Some(p95) = row.p95_duration_ms {
            accum.p95_parts.push(p95);
        }
        if let Some(p99) = row.p99_duration_ms {
            accum.p99_parts.push(p99);
        }
    }

    fn mean_f(parts: &[f64]) -> Option<f64> {
        if parts.is_empty() {
            None
        } else {
            Some(parts.iter().sum::<f64>() / parts.len() as f64)
        }
    }
    fn mean_i(parts: &[i32]) -> Option<i32> {
        if parts.is_empty() {
            None
        } else {
            Some((parts.iter().map(|&v| v as i64).sum::<i64>() / parts.len() as i64) as i32)
        }
    }

    grid.iter()
        .enumerate()
        .map(|(i, (date, hour))| match accums[i].take() {
            Some(mut accum) => {
                accum.bucket.avg_duration_ms = mean_f(&accum.avg_parts);
                accum.bucket.p95_duration_ms = mean_i(&accum.p95_parts);
                accum.bucket.p99_duration_ms = mean_i(&accum.p99_parts);
                accum.bucket
            }
            // Zero-filled bucket: counts at zero, durations absent.
            None => MetricBucket {
                date: date.clone(),
                hour: *hour,
                endpoint_path: endpoint_path.map(str::to_owned),
                ..MetricBucket::default()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(day: &str, hour: Option<i16>, count: i64, p95: Option<i32>) -> AggregatedMetricRow {
        AggregatedMetricRow {
            date: day.into(),
            hour,
            endpoint_method: Some("GET".into()),
            endpoint_path: Some("/a".into()),
            log_level: None,
            log_type: None,
            log_count: count,
            error_count: 0,
            avg_duration_ms: Some(10.0),
            min_duration_ms: Some(1),
            max_duration_ms: Some(100),
            p95_duration_ms: p95,
            p99_duration_ms: p95,
        }
    }

    fn hourly_range(day: NaiveDate) -> ResolvedRange {
        ResolvedRange {
            start: day,
            end: day,
            granularity: Granularity::Hourly,
        }
    }

    #[test]
    fn hourly_fill_returns_24_buckets_with_zero_fill() {
        let day = date(2025, 3, 10);
        let rows = vec![row("20250310", Some(14), 100, Some(90))];
        let out = fill_buckets(rows, hourly_range(day), Some("/a"));
        assert_eq!(out.len(), 24);
        assert_eq!(out[14].log_count, 100);
        assert_eq!(out[14].p95_duration_ms, Some(90));
        // All other buckets are zero-filled and keep the requested path.
        assert_eq!(out[0].log_count, 0);
        assert_eq!(out[0].endpoint_path.as_deref(), Some("/a"));
        assert!(out[0].avg_duration_ms.is_none());
    }

    #[test]
    fn hourly_rows_for_same_hour_are_merged() {
        let day = date(2025, 3, 10);
        let rows = vec![
            row("20250310", Some(3), 10, Some(80)),
            row("20250310", Some(3), 20, Some(120)),
        ];
        let out = fill_buckets(rows, hourly_range(day), None);
        assert_eq!(out[3].log_count, 30);
        assert_eq!(out[3].p95_duration_ms, Some(100));
        assert_eq!(out[3].min_duration_ms, Some(1));
        assert_eq!(out[3].max_duration_ms, Some(100));
    }

    #[test]
    fn daily_fill_sums_hours_of_each_day() {
        let range = ResolvedRange {
            start: date(2025, 3, 9),
            end: date(2025, 3, 11),
            granularity: Granularity::Daily,
        };
        let rows = vec![
            row("20250310", Some(1), 5, None),
            row("20250310", Some(2), 7, None),
        ];
        let out = fill_buckets(rows, range, None);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].log_count, 0);
        assert_eq!(out[1].date, "20250310");
        assert_eq!(out[1].log_count, 12);
        assert_eq!(out[2].log_count, 0);
    }

    #[test]
    fn weekly_fill_groups_days_into_week_buckets() {
        let range = ResolvedRange {
            start: date(2025, 1, 1),
            end: date(2025, 1, 28),
            granularity: Granularity::Weekly,
        };
        let rows = vec![
            row("20250102", Some(0), 3, None),
            row("20250106", Some(0), 4, None), // still week 1 (Jan 1..7)
            row("20250109", Some(0), 5, None), // week 2
        ];
        let out = fill_buckets(rows, range, None);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].log_count, 7);
        assert_eq!(out[1].log_count, 5);
        assert_eq!(out[2].log_count, 0);
    }

    #[test]
    fn metric_type_is_validated() {
        assert!(validate_metric_type("endpoint").is_ok());
        assert!(validate_metric_type("log_volume").is_ok());
        assert!(validate_metric_type("bogus").is_err());
    }
}
