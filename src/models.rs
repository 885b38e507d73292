//! Data models for the funnel tracker.
//!
//! This module contains the core data structures shared by the store,
//! the aggregator, the editor and the CSV exchange: platforms, metrics,
//! daily data points and the per-metric series built from them.

use crate::error::{FunnelError, Result};
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Funnel-stage metric tracked for every platform.
///
/// Variant order is the display order used by tables and CSV headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Posts,
    Engagement,
    Clicks,
    Views,
    Appointments,
    #[serde(rename = "Show-ups")]
    ShowUps,
    Closings,
    #[serde(rename = "Email Opens")]
    EmailOpens,
    #[serde(rename = "Recovery Actions")]
    RecoveryActions,
    Referrals,
    Retargets,
}

impl Metric {
    /// All metrics in display order.
    pub const ALL: [Metric; 11] = [
        Metric::Posts,
        Metric::Engagement,
        Metric::Clicks,
        Metric::Views,
        Metric::Appointments,
        Metric::ShowUps,
        Metric::Closings,
        Metric::EmailOpens,
        Metric::RecoveryActions,
        Metric::Referrals,
        Metric::Retargets,
    ];

    /// Human-readable column name.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Posts => "Posts",
            Metric::Engagement => "Engagement",
            Metric::Clicks => "Clicks",
            Metric::Views => "Views",
            Metric::Appointments => "Appointments",
            Metric::ShowUps => "Show-ups",
            Metric::Closings => "Closings",
            Metric::EmailOpens => "Email Opens",
            Metric::RecoveryActions => "Recovery Actions",
            Metric::Referrals => "Referrals",
            Metric::Retargets => "Retargets",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = FunnelError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FunnelError::validation(format!("unknown metric '{}'", wanted)))
    }
}

/// Marketing channel identifier. Surrounding whitespace is not part of
/// the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.len() == name.len() {
            Self(name)
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generic roster of `count` platforms labelled "Platform 1".."Platform N".
    pub fn generic(count: usize) -> Vec<Platform> {
        (1..=count)
            .map(|i| Platform::new(format!("Platform {}", i)))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Platform {
    fn from(s: &str) -> Self {
        Platform::new(s)
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        Platform::new(s)
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.0
    }
}

/// Length of the rolling tracking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// One month of daily data.
    Days31,
    /// One quarter of daily data.
    Days90,
}

impl Window {
    pub fn days(&self) -> usize {
        match self {
            Window::Days31 => 31,
            Window::Days90 => 90,
        }
    }

    /// Calendar date of a 1-based day index, if it falls inside the window.
    pub fn date_of(&self, anchor: NaiveDate, day_index: usize) -> Option<NaiveDate> {
        if day_index == 0 || day_index > self.days() {
            return None;
        }
        Some(anchor + Duration::days(day_index as i64 - 1))
    }

    /// Last tracked date for a window starting at `anchor`.
    pub fn end_date(&self, anchor: NaiveDate) -> NaiveDate {
        anchor + Duration::days(self.days() as i64 - 1)
    }
}

impl TryFrom<u32> for Window {
    type Error = FunnelError;

    fn try_from(days: u32) -> Result<Self> {
        match days {
            31 => Ok(Window::Days31),
            90 => Ok(Window::Days90),
            other => Err(FunnelError::validation(format!(
                "window must be 31 or 90 days, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.days())
    }
}

/// Inclusive range that cell values must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueBounds {
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_max_value")]
    pub max: u32,
}

impl Default for ValueBounds {
    fn default() -> Self {
        Self {
            min: 0,
            max: default_max_value(),
        }
    }
}

fn default_max_value() -> u32 {
    100
}

impl ValueBounds {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Rejects values outside the bounds instead of clamping them.
    pub fn check(&self, value: u32) -> Result<u32> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(FunnelError::validation(format!(
                "value {} is outside the allowed range {}..={}",
                value, self.min, self.max
            )))
        }
    }

    /// Clamps a raw (possibly negative) sample into the bounds. Callers
    /// validate the bounds first.
    pub(crate) fn clamp(&self, raw: i64) -> u32 {
        raw.clamp(self.min as i64, self.max as i64) as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(FunnelError::validation(format!(
                "bounds minimum {} exceeds maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// A single day's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: NaiveDate,
    pub value: u32,
}

/// Daily values of one metric for one platform.
///
/// Dates are contiguous, strictly increasing and start at the anchor date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<DataPoint>,
}

impl Series {
    /// Builds a series from explicit points, checking it covers exactly the
    /// window starting at `anchor`.
    pub fn new(points: Vec<DataPoint>, anchor: NaiveDate, window: Window) -> Result<Self> {
        if points.len() != window.days() {
            return Err(FunnelError::validation(format!(
                "series has {} points, expected {}",
                points.len(),
                window.days()
            )));
        }

        for (i, point) in points.iter().enumerate() {
            let expected = anchor + Duration::days(i as i64);
            if point.date != expected {
                return Err(FunnelError::validation(format!(
                    "series point {} is dated {}, expected {}",
                    i + 1,
                    point.date,
                    expected
                )));
            }
        }

        Ok(Self { points })
    }

    /// Builds a contiguous series from consecutive daily values.
    pub fn from_values(anchor: NaiveDate, values: impl IntoIterator<Item = u32>) -> Self {
        let points = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| DataPoint {
                date: anchor + Duration::days(i as i64),
                value,
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Value at a 0-based position.
    pub fn value_at(&self, index: usize) -> Option<u32> {
        self.points.get(index).map(|p| p.value)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn sum(&self) -> u64 {
        self.values().map(u64::from).sum()
    }

    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            0.0
        } else {
            self.sum() as f64 / self.points.len() as f64
        }
    }

    /// Replaces the value at a 0-based position, leaving the date untouched.
    pub(crate) fn set_value(&mut self, index: usize, value: u32) -> Result<()> {
        let len = self.points.len();
        let point = self.points.get_mut(index).ok_or(FunnelError::IndexOutOfRange {
            day: index + 1,
            window_days: len,
        })?;
        point.value = value;
        Ok(())
    }
}

/// Raw per-metric series for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformData {
    series: IndexMap<Metric, Series>,
}

impl PlatformData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Metric, series: Series) -> Option<Series> {
        self.series.insert(metric, series)
    }

    pub fn get(&self, metric: Metric) -> Option<&Series> {
        self.series.get(&metric)
    }

    pub(crate) fn get_mut(&mut self, metric: Metric) -> Option<&mut Series> {
        self.series.get_mut(&metric)
    }

    /// Metrics in insertion order.
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.series.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &Series)> + '_ {
        self.series.iter().map(|(m, s)| (*m, s))
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }

    /// Number of days covered; all series share the same length.
    pub fn day_count(&self) -> usize {
        self.series.values().next().map_or(0, Series::len)
    }

    /// Dates covered by the series, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.series
            .values()
            .next()
            .map(|s| s.points().iter().map(|p| p.date).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_metric_order_and_names() {
        assert_eq!(Metric::ALL.len(), 11);
        assert_eq!(Metric::ALL[0], Metric::Posts);
        assert_eq!(Metric::ALL[10], Metric::Retargets);
        assert_eq!(Metric::ShowUps.to_string(), "Show-ups");
        assert_eq!(Metric::EmailOpens.name(), "Email Opens");
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("clicks".parse::<Metric>().unwrap(), Metric::Clicks);
        assert_eq!(" Show-ups ".parse::<Metric>().unwrap(), Metric::ShowUps);
        assert_eq!(
            "RECOVERY ACTIONS".parse::<Metric>().unwrap(),
            Metric::RecoveryActions
        );
        assert!(matches!(
            "Likes".parse::<Metric>(),
            Err(FunnelError::Validation(_))
        ));
    }

    #[test]
    fn test_metric_serializes_as_display_name() {
        let json = serde_json::to_string(&Metric::RecoveryActions).unwrap();
        assert_eq!(json, "\"Recovery Actions\"");
    }

    #[test]
    fn test_generic_platforms() {
        let roster = Platform::generic(3);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[0].as_str(), "Platform 1");
        assert_eq!(roster[2].to_string(), "Platform 3");
    }

    #[test]
    fn test_platform_names_are_trimmed() {
        let padded = Platform::new(" Facebook ");
        assert_eq!(padded.as_str(), "Facebook");
        assert_eq!(padded, Platform::from("Facebook"));

        let parsed: Platform = serde_json::from_str("\"  TikTok\"").unwrap();
        assert_eq!(parsed.as_str(), "TikTok");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"TikTok\"");
    }

    #[test]
    fn test_window_conversion() {
        assert_eq!(Window::try_from(31).unwrap(), Window::Days31);
        assert_eq!(Window::try_from(90).unwrap().days(), 90);
        assert!(Window::try_from(30).is_err());
    }

    #[test]
    fn test_window_dates() {
        let anchor = date(2024, 1, 1);
        let window = Window::Days31;
        assert_eq!(window.date_of(anchor, 1), Some(anchor));
        assert_eq!(window.date_of(anchor, 31), Some(date(2024, 1, 31)));
        assert_eq!(window.date_of(anchor, 0), None);
        assert_eq!(window.date_of(anchor, 32), None);
        assert_eq!(window.end_date(anchor), date(2024, 1, 31));
    }

    #[test]
    fn test_bounds_check_and_clamp() {
        let bounds = ValueBounds::default();
        assert!(bounds.check(0).is_ok());
        assert!(bounds.check(100).is_ok());
        assert!(matches!(bounds.check(101), Err(FunnelError::Validation(_))));
        assert_eq!(bounds.clamp(-5), 0);
        assert_eq!(bounds.clamp(250), 100);
        assert_eq!(bounds.clamp(42), 42);

        let inverted = ValueBounds { min: 10, max: 5 };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_series_new_accepts_contiguous_dates() {
        let anchor = date(2024, 2, 27);
        let points: Vec<DataPoint> = (0..31)
            .map(|i| DataPoint {
                date: anchor + Duration::days(i),
                value: i as u32,
            })
            .collect();
        let series = Series::new(points, anchor, Window::Days31).unwrap();
        assert_eq!(series.len(), 31);
        // Crosses the leap day.
        assert_eq!(series.points()[2].date, date(2024, 2, 29));
    }

    #[test]
    fn test_series_new_rejects_gaps_and_wrong_length() {
        let anchor = date(2024, 1, 1);
        let mut points: Vec<DataPoint> = (0..31)
            .map(|i| DataPoint {
                date: anchor + Duration::days(i),
                value: 1,
            })
            .collect();
        points[5].date = points[4].date;
        assert!(Series::new(points.clone(), anchor, Window::Days31).is_err());

        points.truncate(30);
        assert!(Series::new(points, anchor, Window::Days31).is_err());
    }

    #[test]
    fn test_series_stats() {
        let series = Series::from_values(date(2024, 1, 1), [10, 20, 30]);
        assert_eq!(series.sum(), 60);
        assert_eq!(series.mean(), 20.0);
        assert_eq!(series.value_at(1), Some(20));
        assert_eq!(series.first_date(), Some(date(2024, 1, 1)));
        assert_eq!(series.points()[2].date, date(2024, 1, 3));
    }

    #[test]
    fn test_platform_data_dates() {
        let anchor = date(2024, 1, 1);
        let mut data = PlatformData::new();
        data.insert(Metric::Posts, Series::from_values(anchor, [1, 2]));
        data.insert(Metric::Clicks, Series::from_values(anchor, [3, 4]));
        assert_eq!(data.metric_count(), 2);
        assert_eq!(data.day_count(), 2);
        assert_eq!(data.dates(), vec![anchor, date(2024, 1, 2)]);
        assert_eq!(
            data.metrics().collect::<Vec<_>>(),
            vec![Metric::Posts, Metric::Clicks]
        );
    }
}
