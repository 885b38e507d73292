//! Table derivation and cross-platform statistics.
//!
//! Derived columns (Total, Average) are always computed from the raw metric
//! values of a row and never fed back into another aggregation.

use crate::error::{FunnelError, Result};
use crate::models::{DataPoint, Metric, Platform, PlatformData};
use crate::store::Store;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

/// One date row of a platform table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub date: NaiveDate,
    /// Raw metric values, aligned with [`PlatformTable::metrics`].
    pub values: Vec<u32>,
    pub total: u64,
    pub average: f64,
}

impl TableRow {
    /// Builds a row and derives Total/Average from `values` alone.
    pub fn new(date: NaiveDate, values: Vec<u32>) -> Self {
        let mut row = Self {
            date,
            values,
            total: 0,
            average: 0.0,
        };
        row.recompute();
        row
    }

    fn recompute(&mut self) {
        self.total = self.values.iter().copied().map(u64::from).sum();
        self.average = if self.values.is_empty() {
            0.0
        } else {
            self.total as f64 / self.values.len() as f64
        };
    }
}

/// Row-per-date view of one platform with derived Total and Average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformTable {
    pub metrics: Vec<Metric>,
    pub rows: Vec<TableRow>,
}

impl PlatformTable {
    fn column_index(&self, metric: Metric) -> Result<usize> {
        self.metrics
            .iter()
            .position(|m| *m == metric)
            .ok_or_else(|| FunnelError::validation(format!("metric '{}' is not in the table", metric)))
    }

    /// Values of one raw metric column, by date.
    pub fn column(&self, metric: Metric) -> Result<Vec<DataPoint>> {
        let idx = self.column_index(metric)?;
        Ok(self
            .rows
            .iter()
            .map(|row| DataPoint {
                date: row.date,
                value: row.values[idx],
            })
            .collect())
    }

    /// Sum of every raw metric column.
    pub fn column_totals(&self) -> IndexMap<Metric, u64> {
        self.metrics
            .iter()
            .enumerate()
            .map(|(i, metric)| {
                let sum = self.rows.iter().map(|row| u64::from(row.values[i])).sum::<u64>();
                (*metric, sum)
            })
            .collect()
    }

    /// Mean of every raw metric column.
    pub fn column_means(&self) -> IndexMap<Metric, f64> {
        let days = self.rows.len();
        self.column_totals()
            .into_iter()
            .map(|(metric, sum)| {
                let mean = if days == 0 { 0.0 } else { sum as f64 / days as f64 };
                (metric, mean)
            })
            .collect()
    }

    /// Raw columns for a subset of metrics, for trend charts.
    pub fn trend(&self, metrics: &[Metric]) -> Result<TrendView> {
        if metrics.is_empty() {
            return Err(FunnelError::validation("no metrics selected"));
        }
        let mut columns = IndexMap::new();
        for &metric in metrics {
            let idx = self.column_index(metric)?;
            columns.insert(metric, self.rows.iter().map(|r| r.values[idx]).collect());
        }
        Ok(TrendView {
            dates: self.rows.iter().map(|r| r.date).collect(),
            columns,
        })
    }

    /// Replaces one cell and recomputes that row's derived columns.
    pub(crate) fn set_cell(&mut self, row: usize, metric: Metric, value: u32) -> Result<()> {
        let idx = self.column_index(metric)?;
        let days = self.rows.len();
        let row = self.rows.get_mut(row).ok_or(FunnelError::IndexOutOfRange {
            day: row + 1,
            window_days: days,
        })?;
        row.values[idx] = value;
        row.recompute();
        Ok(())
    }
}

/// Selected metric columns over the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendView {
    pub dates: Vec<NaiveDate>,
    pub columns: IndexMap<Metric, Vec<u32>>,
}

/// Converts raw per-metric series into a row-per-date table.
pub fn to_table(data: &PlatformData) -> PlatformTable {
    let metrics: Vec<Metric> = data.metrics().collect();
    let rows = data
        .dates()
        .into_iter()
        .enumerate()
        .map(|(day, date)| {
            let values = data
                .iter()
                .map(|(_, series)| series.value_at(day).unwrap_or(0))
                .collect();
            TableRow::new(date, values)
        })
        .collect();

    PlatformTable { metrics, rows }
}

/// Per-platform metric sums over a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeSummary {
    /// First day actually covered (range clipped to the window).
    pub start: NaiveDate,
    /// Last day actually covered.
    pub end: NaiveDate,
    pub days: usize,
    pub totals: IndexMap<Platform, IndexMap<Metric, u64>>,
    /// Roster platforms skipped for lack of data.
    pub missing: Vec<Platform>,
}

/// Sums `metrics` for every platform over `[start, end]` inclusive.
///
/// The range is clipped to the window; an inverted range or one that shares
/// no day with the window fails with [`FunnelError::EmptyRange`].
pub fn summary_over_range(
    store: &Store,
    start: NaiveDate,
    end: NaiveDate,
    metrics: &[Metric],
) -> Result<RangeSummary> {
    if metrics.is_empty() {
        return Err(FunnelError::validation("no metrics selected"));
    }
    if let Some(untracked) = metrics.iter().find(|m| !store.tracks(**m)) {
        return Err(FunnelError::validation(format!(
            "metric '{}' is not tracked",
            untracked
        )));
    }

    let clipped_start = start.max(store.anchor());
    let clipped_end = end.min(store.end_date());
    if start > end || clipped_start > clipped_end {
        return Err(FunnelError::EmptyRange { start, end });
    }

    let mut totals = IndexMap::new();
    for (platform, data) in store.platforms_with_data() {
        let mut sums = IndexMap::new();
        for &metric in metrics {
            let sum = data
                .get(metric)
                .map(|series| {
                    series
                        .points()
                        .iter()
                        .filter(|p| p.date >= clipped_start && p.date <= clipped_end)
                        .map(|p| u64::from(p.value))
                        .sum::<u64>()
                })
                .unwrap_or(0);
            sums.insert(metric, sum);
        }
        totals.insert(platform.clone(), sums);
    }

    let days = (clipped_end - clipped_start).num_days() as usize + 1;
    debug!(
        "Summarized {} platforms over {}..={} ({} days)",
        totals.len(),
        clipped_start,
        clipped_end,
        days
    );

    Ok(RangeSummary {
        start: clipped_start,
        end: clipped_end,
        days,
        totals,
        missing: store.missing_platforms(),
    })
}

/// Whole-window sums of every metric for every platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossPlatformTotals {
    pub totals: IndexMap<Metric, IndexMap<Platform, u64>>,
    /// Roster platforms skipped for lack of data.
    pub missing: Vec<Platform>,
}

impl CrossPlatformTotals {
    /// Platforms that contributed, in roster order.
    pub fn platforms(&self) -> Vec<&Platform> {
        self.totals
            .values()
            .next()
            .map(|row| row.keys().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, metric: Metric, platform: &Platform) -> Option<u64> {
        self.totals.get(&metric).and_then(|row| row.get(platform)).copied()
    }
}

/// Dashboard overview grid. Missing platforms are flagged, not zero-filled.
pub fn cross_platform_totals(store: &Store) -> CrossPlatformTotals {
    let mut totals: IndexMap<Metric, IndexMap<Platform, u64>> = store
        .metrics()
        .iter()
        .map(|m| (*m, IndexMap::new()))
        .collect();

    for (platform, data) in store.platforms_with_data() {
        for (metric, series) in data.iter() {
            if let Some(row) = totals.get_mut(&metric) {
                row.insert(platform.clone(), series.sum());
            }
        }
    }

    let missing = store.missing_platforms();
    for platform in &missing {
        warn!("No data available for {}", platform);
    }

    CrossPlatformTotals { totals, missing }
}

/// A platform's mean daily value for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformRank {
    pub platform: Platform,
    pub mean: f64,
}

/// Platforms ordered by mean daily value of `metric`, highest first.
///
/// Ties keep roster order.
pub fn rank_platforms_by_metric(store: &Store, metric: Metric) -> Result<Vec<PlatformRank>> {
    if !store.tracks(metric) {
        return Err(FunnelError::validation(format!(
            "metric '{}' is not tracked",
            metric
        )));
    }

    let mut ranking: Vec<PlatformRank> = store
        .platforms_with_data()
        .filter_map(|(platform, data)| {
            data.get(metric).map(|series| PlatformRank {
                platform: platform.clone(),
                mean: series.mean(),
            })
        })
        .collect();

    // sort_by is stable, so equal means keep roster order.
    ranking.sort_by(|a, b| {
        b.mean
            .partial_cmp(&a.mean)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(ranking)
}

/// Highest-ranked platform for `metric`, if any platform has data.
pub fn top_platform(store: &Store, metric: Metric) -> Result<Option<PlatformRank>> {
    Ok(rank_platforms_by_metric(store, metric)?.into_iter().next())
}

/// The `n` days with the highest value of `metric`; earlier dates win ties.
pub fn top_days(table: &PlatformTable, metric: Metric, n: usize) -> Result<Vec<DataPoint>> {
    let mut days = table.column(metric)?;
    days.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.date.cmp(&b.date)));
    days.truncate(n);
    Ok(days)
}
