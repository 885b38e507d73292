//! Flat CSV exchange format.
//!
//! Header: `PlatformKey,Date,<metrics...>,Total,Average`, one row per
//! (platform, date). Total and Average are derived on export and recomputed
//! on import.

use crate::analysis::to_table;
use crate::error::{FunnelError, Result};
use crate::models::{Metric, Platform, PlatformData, Series, Window};
use crate::store::Store;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const PLATFORM_COLUMN: &str = "PlatformKey";
const DATE_COLUMN: &str = "Date";
const TOTAL_COLUMN: &str = "Total";
const AVERAGE_COLUMN: &str = "Average";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serializes every platform with data, in roster order, dates ascending.
pub fn export_csv(store: &Store) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![PLATFORM_COLUMN.to_string(), DATE_COLUMN.to_string()];
    header.extend(store.metrics().iter().map(|m| m.name().to_string()));
    header.push(TOTAL_COLUMN.to_string());
    header.push(AVERAGE_COLUMN.to_string());
    writer.write_record(&header)?;

    let mut rows = 0;
    for (platform, data) in store.platforms_with_data() {
        let table = to_table(data);
        for row in &table.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(platform.to_string());
            record.push(row.date.format(DATE_FORMAT).to_string());
            record.extend(row.values.iter().map(u32::to_string));
            record.push(row.total.to_string());
            record.push(format!("{:.2}", row.average));
            writer.write_record(&record)?;
            rows += 1;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| FunnelError::Io(e.into_error()))?;
    debug!("Exported {} CSV rows", rows);
    String::from_utf8(bytes)
        .map_err(|e| FunnelError::validation(format!("export is not UTF-8: {}", e)))
}

/// Writes the export to `path`.
pub fn write_csv(store: &Store, path: &Path) -> Result<()> {
    let content = export_csv(store)?;
    std::fs::write(path, content)?;
    info!("Exported store to {}", path.display());
    Ok(())
}

/// How `merge_into` treats staged cells that differ from existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Staged values replace existing ones.
    Overwrite,
    /// Existing values win; only absent cells are filled.
    SkipExisting,
    /// Any conflicting cell aborts the merge.
    RejectIfAnyConflict,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Overwrite => write!(f, "overwrite"),
            ConflictPolicy::SkipExisting => write!(f, "skip-existing"),
            ConflictPolicy::RejectIfAnyConflict => write!(f, "reject-if-any-conflict"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = FunnelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "skip-existing" | "skip" => Ok(ConflictPolicy::SkipExisting),
            "reject-if-any-conflict" | "reject" => Ok(ConflictPolicy::RejectIfAnyConflict),
            other => Err(FunnelError::validation(format!(
                "unknown conflict policy '{}'",
                other
            ))),
        }
    }
}

/// Outcome of a successful merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub policy: Option<ConflictPolicy>,
    /// Cells whose value changed.
    pub cells_written: usize,
    /// Staged cells equal to the existing value.
    pub cells_unchanged: usize,
    /// Conflicting cells left as they were.
    pub cells_skipped: usize,
    /// Platforms that had no data before the merge.
    pub platforms_added: Vec<Platform>,
}

/// Parsed import awaiting an explicit merge.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedDataset {
    metrics: Vec<Metric>,
    rows: IndexMap<Platform, BTreeMap<NaiveDate, Vec<u32>>>,
}

/// Parses CSV text in the export format into a staged dataset.
pub fn import_csv(text: &str) -> Result<StagedDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let header = reader.headers()?.clone();
    let metrics = parse_header(&header)?;

    let mut rows: IndexMap<Platform, BTreeMap<NaiveDate, Vec<u32>>> = IndexMap::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i + 2;
        if record.len() != header.len() {
            return Err(FunnelError::schema(format!(
                "line {}: expected {} fields, found {}",
                line,
                header.len(),
                record.len()
            )));
        }

        let platform = &record[0];
        if platform.is_empty() {
            return Err(FunnelError::validation(format!(
                "line {}: empty {}",
                line, PLATFORM_COLUMN
            )));
        }
        let date = NaiveDate::parse_from_str(&record[1], DATE_FORMAT).map_err(|e| {
            FunnelError::validation(format!("line {}: bad date '{}': {}", line, &record[1], e))
        })?;

        let mut values = Vec::with_capacity(metrics.len());
        for (offset, metric) in metrics.iter().enumerate() {
            let raw = &record[2 + offset];
            let value = raw.parse::<u32>().map_err(|_| {
                FunnelError::validation(format!(
                    "line {}: {} must be a non-negative integer, got '{}'",
                    line, metric, raw
                ))
            })?;
            values.push(value);
        }

        // Derived columns are recomputed; only their shape is checked.
        let total = &record[header.len() - 2];
        let average = &record[header.len() - 1];
        if total.parse::<f64>().is_err() || average.parse::<f64>().is_err() {
            return Err(FunnelError::validation(format!(
                "line {}: {} and {} must be numeric",
                line, TOTAL_COLUMN, AVERAGE_COLUMN
            )));
        }

        let dates = rows.entry(Platform::new(platform)).or_default();
        if dates.insert(date, values).is_some() {
            return Err(FunnelError::validation(format!(
                "line {}: duplicate row for {} on {}",
                line, platform, date
            )));
        }
    }

    let staged = StagedDataset { metrics, rows };
    debug!(
        "Staged {} rows for {} platform(s)",
        staged.row_count(),
        staged.rows.len()
    );
    Ok(staged)
}

/// Reads and parses a CSV file.
pub fn read_csv(path: &Path) -> Result<StagedDataset> {
    let text = std::fs::read_to_string(path)?;
    import_csv(&text)
}

fn parse_header(header: &csv::StringRecord) -> Result<Vec<Metric>> {
    let fields: Vec<&str> = header.iter().collect();
    if fields.len() < 5 {
        return Err(FunnelError::schema(format!(
            "expected {}, {}, metric columns, {}, {}; found {} column(s)",
            PLATFORM_COLUMN,
            DATE_COLUMN,
            TOTAL_COLUMN,
            AVERAGE_COLUMN,
            fields.len()
        )));
    }

    let expect = |idx: usize, name: &str| -> Result<()> {
        if fields[idx] == name {
            Ok(())
        } else {
            Err(FunnelError::schema(format!(
                "column {} must be '{}', found '{}'",
                idx + 1,
                name,
                fields[idx]
            )))
        }
    };
    expect(0, PLATFORM_COLUMN)?;
    expect(1, DATE_COLUMN)?;
    expect(fields.len() - 2, TOTAL_COLUMN)?;
    expect(fields.len() - 1, AVERAGE_COLUMN)?;

    let mut metrics = Vec::new();
    for name in &fields[2..fields.len() - 2] {
        let metric: Metric = name
            .parse()
            .map_err(|_| FunnelError::schema(format!("unknown metric column '{}'", name)))?;
        if metrics.contains(&metric) {
            return Err(FunnelError::schema(format!("duplicate metric column '{}'", name)));
        }
        metrics.push(metric);
    }
    Ok(metrics)
}

impl StagedDataset {
    /// Metric columns in file order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Platforms in file order.
    pub fn platforms(&self) -> impl Iterator<Item = &Platform> + '_ {
        self.rows.keys()
    }

    pub fn row_count(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First date and window length covered by the dataset.
    pub fn span(&self) -> Result<(NaiveDate, Window)> {
        let first = self
            .rows
            .values()
            .filter_map(|dates| dates.keys().next())
            .min()
            .copied()
            .ok_or_else(|| FunnelError::validation("import contains no data rows"))?;
        let last = self
            .rows
            .values()
            .filter_map(|dates| dates.keys().next_back())
            .max()
            .copied()
            .unwrap_or(first);
        let days = (last - first).num_days() + 1;
        let window = u32::try_from(days)
            .map_err(|_| FunnelError::validation(format!("import spans {} days", days)))
            .and_then(Window::try_from)?;
        Ok((first, window))
    }

    /// Merges the staged rows into `store` under `policy`.
    ///
    /// A conflict is a staged cell that already exists in the store with a
    /// different value. On any error the store is left unchanged.
    pub fn merge_into(&self, store: &mut Store, policy: ConflictPolicy) -> Result<MergeReport> {
        if let Some(untracked) = self.metrics.iter().find(|m| !store.tracks(**m)) {
            return Err(FunnelError::validation(format!(
                "imported metric '{}' is not tracked",
                untracked
            )));
        }

        let bounds = store.bounds();
        for (platform, dates) in &self.rows {
            if !store.is_on_roster(platform) {
                return Err(FunnelError::MissingPlatform(platform.to_string()));
            }
            for (date, values) in dates {
                if store.day_index_of(*date).is_none() {
                    return Err(FunnelError::validation(format!(
                        "{} on {} is outside the window {}..={}",
                        platform,
                        date,
                        store.anchor(),
                        store.end_date()
                    )));
                }
                for (metric, value) in self.metrics.iter().zip(values) {
                    bounds.check(*value).map_err(|e| {
                        FunnelError::validation(format!("{}/{}/{}: {}", platform, date, metric, e))
                    })?;
                }
            }
        }

        let mut next = store.clone();
        let mut report = MergeReport {
            policy: Some(policy),
            ..MergeReport::default()
        };
        let mut conflicts: Vec<String> = Vec::new();

        for (platform, dates) in &self.rows {
            if next.contains(platform) {
                let data = next.get_mut(platform)?;
                for (date, values) in dates {
                    let index = (*date - store.anchor()).num_days() as usize;
                    for (metric, value) in self.metrics.iter().zip(values) {
                        let series = data.get_mut(*metric).ok_or_else(|| {
                            FunnelError::validation(format!("metric '{}' is not tracked", metric))
                        })?;
                        let existing = series.value_at(index);
                        if existing == Some(*value) {
                            report.cells_unchanged += 1;
                            continue;
                        }
                        match policy {
                            ConflictPolicy::Overwrite => {
                                series.set_value(index, *value)?;
                                report.cells_written += 1;
                            }
                            ConflictPolicy::SkipExisting => report.cells_skipped += 1,
                            ConflictPolicy::RejectIfAnyConflict => {
                                conflicts.push(format!("{}/{}/{}", platform, date, metric));
                            }
                        }
                    }
                }
            } else {
                let data = self.full_platform_data(platform, dates, &next)?;
                report.cells_written += data.metric_count() * data.day_count();
                next.set(platform.clone(), data)?;
                report.platforms_added.push(platform.clone());
            }
        }

        if let Some(first) = conflicts.first() {
            return Err(FunnelError::Conflict {
                count: conflicts.len(),
                first: first.clone(),
            });
        }

        *store = next;
        info!(
            "Merged import ({}): {} written, {} unchanged, {} skipped, {} platform(s) added",
            policy,
            report.cells_written,
            report.cells_unchanged,
            report.cells_skipped,
            report.platforms_added.len()
        );
        Ok(report)
    }

    /// Builds complete data for a platform the store has no data for.
    fn full_platform_data(
        &self,
        platform: &Platform,
        dates: &BTreeMap<NaiveDate, Vec<u32>>,
        store: &Store,
    ) -> Result<PlatformData> {
        if let Some(missing) = store.metrics().iter().find(|m| !self.metrics.contains(m)) {
            return Err(FunnelError::validation(format!(
                "{} has no data yet and the import lacks '{}'",
                platform, missing
            )));
        }
        if dates.len() != store.window().days() {
            return Err(FunnelError::validation(format!(
                "{} has no data yet and the import covers {} of {} days",
                platform,
                dates.len(),
                store.window().days()
            )));
        }

        let mut data = PlatformData::new();
        for &metric in store.metrics() {
            let column = self
                .metrics
                .iter()
                .position(|m| *m == metric)
                .ok_or_else(|| FunnelError::validation(format!("missing '{}'", metric)))?;
            let values = dates.values().map(|row| row[column]);
            data.insert(metric, Series::from_values(store.anchor(), values));
        }
        Ok(data)
    }
}
