//! Week-by-weekday pivot of one metric, for heat-map rendering.

use super::aggregator::PlatformTable;
use crate::error::Result;
use crate::models::Metric;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Grid of daily values: one row per Monday-start week, one column per
/// weekday. Cells outside the window are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub metric: Metric,
    pub weeks: Vec<NaiveDate>,
    pub cells: Vec<[Option<u32>; 7]>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl Heatmap {
    /// Value for a given date, if it lies inside the grid.
    pub fn get(&self, date: NaiveDate) -> Option<u32> {
        let week = week_start(date);
        let row = self.weeks.iter().position(|w| *w == week)?;
        self.cells[row][date.weekday().num_days_from_monday() as usize]
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Pivots `metric` of a platform table into a week × weekday grid.
pub fn pivot_heatmap(table: &PlatformTable, metric: Metric) -> Result<Heatmap> {
    let column = table.column(metric)?;

    let mut weeks: Vec<NaiveDate> = Vec::new();
    let mut cells: Vec<[Option<u32>; 7]> = Vec::new();

    for point in &column {
        let week = week_start(point.date);
        if weeks.last() != Some(&week) {
            weeks.push(week);
            cells.push([None; 7]);
        }
        if let Some(row) = cells.last_mut() {
            row[point.date.weekday().num_days_from_monday() as usize] = Some(point.value);
        }
    }

    Ok(Heatmap {
        metric,
        weeks,
        cells,
        min: column.iter().map(|p| p.value).min(),
        max: column.iter().map(|p| p.value).max(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::to_table;
    use crate::models::{PlatformData, Series};

    #[test]
    fn test_pivot_layout() {
        // 2024-01-03 is a Wednesday.
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let mut data = PlatformData::new();
        data.insert(Metric::Clicks, Series::from_values(anchor, 1..=31));
        let table = to_table(&data);

        let heatmap = pivot_heatmap(&table, Metric::Clicks).unwrap();

        // Jan 3 .. Feb 2 spans 5 Monday-start weeks.
        assert_eq!(heatmap.weeks.len(), 5);
        assert_eq!(heatmap.weeks[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(heatmap.cells[0][0], None);
        assert_eq!(heatmap.cells[0][1], None);
        assert_eq!(heatmap.cells[0][2], Some(1));
        assert_eq!(heatmap.cells[4][4], Some(31));
        assert_eq!(heatmap.cells[4][5], None);
        assert_eq!(heatmap.get(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()), Some(13));
        assert_eq!(heatmap.min, Some(1));
        assert_eq!(heatmap.max, Some(31));

        let filled: usize = heatmap
            .cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_some()).count())
            .sum();
        assert_eq!(filled, 31);
    }

    #[test]
    fn test_pivot_unknown_metric() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut data = PlatformData::new();
        data.insert(Metric::Clicks, Series::from_values(anchor, [1, 2, 3]));
        assert!(pivot_heatmap(&to_table(&data), Metric::Views).is_err());
    }
}
