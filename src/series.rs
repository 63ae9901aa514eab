//! Ordered, gap-free working series built from raw `(timestamp, value)` rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp string into an absolute instant.
///
/// RFC 3339 strings are converted to UTC; naive date-times and bare dates
/// (taken at midnight) are used as-is.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim().trim_matches('"');
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Anything that can be resolved to an instant on the series axis.
pub trait IntoInstant {
    fn into_instant(self) -> Option<NaiveDateTime>;
}

impl IntoInstant for NaiveDateTime {
    fn into_instant(self) -> Option<NaiveDateTime> {
        Some(self)
    }
}

impl IntoInstant for DateTime<Utc> {
    fn into_instant(self) -> Option<NaiveDateTime> {
        Some(self.naive_utc())
    }
}

impl IntoInstant for NaiveDate {
    fn into_instant(self) -> Option<NaiveDateTime> {
        self.and_hms_opt(0, 0, 0)
    }
}

impl IntoInstant for &str {
    fn into_instant(self) -> Option<NaiveDateTime> {
        parse_timestamp(self)
    }
}

impl IntoInstant for String {
    fn into_instant(self) -> Option<NaiveDateTime> {
        parse_timestamp(&self)
    }
}

impl IntoInstant for &String {
    fn into_instant(self) -> Option<NaiveDateTime> {
        parse_timestamp(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// A sorted series with cached `order` and `delta` columns.
///
/// Immutable once built. `order[i] == i`; `delta[0]` is zero unless a
/// baseline was supplied, in which case it is `value[0] - baseline`.
#[derive(Debug, Clone)]
pub struct Series {
    points: Vec<TimePoint>,
    deltas: Vec<f64>,
    dropped: usize,
}

impl Series {
    pub fn from_points<I, T>(points: I, baseline: Option<f64>) -> Self
    where
        I: IntoIterator<Item = (T, f64)>,
        T: IntoInstant,
    {
        let mut dropped = 0;
        let mut kept: Vec<TimePoint> = Vec::new();
        for (timestamp, value) in points {
            match timestamp.into_instant() {
                Some(timestamp) if value.is_finite() => kept.push(TimePoint { timestamp, value }),
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, kept = kept.len(), "dropped unparsable series points");
        }

        // stable: equal timestamps keep their input order
        kept.sort_by_key(|p| p.timestamp);

        let mut deltas = Vec::with_capacity(kept.len());
        for (i, point) in kept.iter().enumerate() {
            let delta = if i == 0 {
                baseline
                    .filter(|b| b.is_finite())
                    .map_or(0.0, |b| point.value - b)
            } else {
                point.value - kept[i - 1].value
            };
            deltas.push(delta);
        }

        Self {
            points: kept,
            deltas,
            dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    /// Number of input rows discarded because of an unparsable timestamp or
    /// a non-finite value.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Day-month label of the point at `order`, as used on the shared axis.
    pub fn date_label(&self, order: usize) -> Option<String> {
        self.points
            .get(order)
            .map(|p| p.timestamp.format("%m-%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01 12:30:00").is_some());
        assert!(parse_timestamp("2024-03-01 12:30").is_some());
        assert!(parse_timestamp("2024/03/01 12:30").is_some());
        assert!(parse_timestamp("2024-03-01T12:30:00+09:00").is_some());
        assert!(parse_timestamp("\"2024-03-01\"").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_rfc3339_is_converted_to_utc() {
        let ts = parse_timestamp("2024-03-01T09:00:00+09:00").unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 00:00");
    }

    #[test]
    fn test_sorted_with_deltas() {
        let series = Series::from_points(
            vec![
                ("2024-01-03", 1480.0),
                ("2024-01-01", 1500.0),
                ("2024-01-04", 1480.0),
                ("2024-01-02", 1520.0),
            ],
            None,
        );
        assert_eq!(series.values(), vec![1500.0, 1520.0, 1480.0, 1480.0]);
        assert_eq!(series.deltas(), &[0.0, 20.0, -40.0, 0.0]);
        assert_eq!(series.date_label(0).as_deref(), Some("01-01"));
    }

    #[test]
    fn test_duplicate_timestamps_keep_input_order() {
        let series = Series::from_points(
            vec![("2024-01-01", 1.0), ("2024-01-01", 2.0), ("2024-01-01", 3.0)],
            None,
        );
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_unparsable_points_are_dropped() {
        let series = Series::from_points(
            vec![
                ("garbage", 1.0),
                ("2024-01-01", 10.0),
                ("2024-01-02", f64::NAN),
                ("2024-01-03", 12.0),
            ],
            None,
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.dropped(), 2);
        assert_eq!(series.deltas(), &[0.0, 2.0]);
    }

    #[test]
    fn test_all_dropped_gives_empty_series() {
        let series = Series::from_points(vec![("x", 1.0), ("y", 2.0)], None);
        assert!(series.is_empty());
        assert!(series.deltas().is_empty());
        assert_eq!(series.date_label(0), None);
    }

    #[test]
    fn test_baseline_sets_first_delta() {
        let series =
            Series::from_points(vec![("2024-01-01", 1530.0), ("2024-01-02", 1510.0)], Some(1500.0));
        assert_eq!(series.deltas(), &[30.0, -20.0]);
    }

    #[test]
    fn test_accepts_parsed_instants() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let series = Series::from_points(vec![(day, 1.0), (day.succ_opt().unwrap(), 4.0)], None);
        assert_eq!(series.deltas(), &[0.0, 3.0]);
        assert_eq!(series.date_label(1).as_deref(), Some("05-07"));
    }
}
