//! Numeric helpers for chart preprocessors

use std::collections::VecDeque;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::model::RowObject;
use crate::model::as_number;
use crate::model::value_text;

/// Arithmetic mean, `None` for no values.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of the sorted values; the mean of the middle two for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation around `mean`.
pub fn standard_deviation(values: &[f64], mean: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Summary of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub avg: f64,
    pub stdev: f64,
    pub median: f64,
}

/// Summary of `values`, `None` for no values.
pub fn statistics(values: &[f64]) -> Option<Statistics> {
    let avg = average(values)?;
    Some(Statistics {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        sum: values.iter().sum(),
        avg,
        stdev: standard_deviation(values, avg)?,
        median: median(values)?,
    })
}

/// Running mean over the last `window` values.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buffer: VecDeque<f64>,
}

impl MovingAverage {
    /// Averages the last `window` values; a zero window behaves as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buffer: VecDeque::with_capacity(window),
        }
    }

    /// Adds a value and returns the mean of the window.
    pub fn push(&mut self, value: f64) -> f64 {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window {
            self.buffer.pop_front();
        }
        self.buffer.iter().sum::<f64>() / self.buffer.len() as f64
    }
}

/// Moving average of a whole series.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let mut avg = MovingAverage::new(window);
    values.iter().map(|v| avg.push(*v)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Central-difference derivative. The end points get 0.
pub fn derivative(series: &[Point]) -> Vec<Point> {
    let last = series.len().saturating_sub(1);
    series
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i == 0 || i == last {
                return Point { x: p.x, y: 0.0 };
            }
            let dx = series[i + 1].x - series[i - 1].x;
            let dy = series[i + 1].y - series[i - 1].y;
            Point {
                x: p.x,
                y: if dx == 0.0 { 0.0 } else { dy / dx },
            }
        })
        .collect()
}

/// Least-squares line through a time series.
///
/// The slope is per millisecond since the first sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    pub start: DateTime<Utc>,
    pub start_value: f64,
    pub end: DateTime<Utc>,
    pub end_value: f64,
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` timestamps as UTC.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Fits a trend line to `rows`, reading time and value from the named fields.
///
/// Rows with an unparseable time or a non-numeric value are skipped. Fewer
/// than two usable rows, or all at the same time, give `None`.
pub fn trend_line(rows: &[RowObject], time_field: &str, value_field: &str) -> Option<TrendLine> {
    let samples: Vec<(DateTime<Utc>, f64)> = rows
        .iter()
        .filter_map(|row| {
            let time = parse_time(&value_text(row.get(time_field)?))?;
            let value = as_number(row.get(value_field)?)?;
            Some((time, value))
        })
        .collect();
    if samples.len() < 2 {
        return None;
    }

    let origin = samples[0].0;
    let n = samples.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_x2, mut sum_xy) = (0.0, 0.0, 0.0, 0.0);
    for (time, value) in &samples {
        let x = (*time - origin).num_milliseconds() as f64;
        sum_x += x;
        sum_y += value;
        sum_x2 += x * x;
        sum_xy += x * value;
    }
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let end = samples[samples.len() - 1].0;
    let end_x = (end - origin).num_milliseconds() as f64;
    Some(TrendLine {
        slope,
        intercept,
        start: origin,
        start_value: intercept,
        end,
        end_value: slope * end_x + intercept,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SAMPLE: [f64; 5] = [1.0, 2.0, 2.0, 3.0, 1.0];

    #[test]
    fn test_average_median_stdev() {
        assert!((average(&SAMPLE).unwrap() - 1.8).abs() < 1e-12);
        assert_eq!(median(&SAMPLE), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));

        // population: sqrt(((0.8^2)*2 + (0.2^2)*2 + 1.2^2) / 5)
        let stdev = standard_deviation(&SAMPLE, 1.8).unwrap();
        assert!((stdev - (2.8f64 / 5.0).sqrt()).abs() < 1e-12);
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn test_statistics_summary() {
        let stats = statistics(&SAMPLE).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.sum, 9.0);
        assert_eq!(stats.median, 2.0);
        assert!(statistics(&[]).is_none());
    }

    #[test]
    fn test_moving_average_window() {
        assert_eq!(moving_average(&[2.0, 4.0, 6.0, 8.0], 2), vec![2.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_derivative() {
        let series = [
            Point { x: 0.0, y: 0.0 },
            Point { x: 1.0, y: 1.0 },
            Point { x: 2.0, y: 4.0 },
            Point { x: 3.0, y: 9.0 },
        ];
        let d = derivative(&series);
        assert_eq!(d.iter().map(|p| p.y).collect::<Vec<_>>(), vec![0.0, 2.0, 4.0, 0.0]);
    }

    #[test]
    fn test_trend_line() {
        let rows: Vec<RowObject> = [
            json!({"at": "2024-01-01", "v": 1}),
            json!({"at": "2024-01-02", "v": 3}),
            json!({"at": "2024-01-03", "v": 5}),
            json!({"at": "not a date", "v": 100}),
        ]
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        let line = trend_line(&rows, "at", "v").unwrap();
        let per_day = line.slope * 86_400_000.0;
        assert!((per_day - 2.0).abs() < 1e-9);
        assert!((line.intercept - 1.0).abs() < 1e-9);
        assert!((line.end_value - 5.0).abs() < 1e-9);
        assert!(trend_line(&rows[..1], "at", "v").is_none());
    }
}
