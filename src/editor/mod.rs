//! Staged cell editing.
//!
//! Edits are collected in an [`EditSession`] and only reach the [`Store`]
//! through [`EditSession::commit`]. Dropping a session discards its edits.

use crate::analysis::{to_table, PlatformTable};
use crate::error::{FunnelError, Result};
use crate::models::{Metric, Platform};
use crate::store::Store;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

/// One staged cell change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CellKey {
    metric: Metric,
    /// 1-based.
    day_index: usize,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    pub cells_written: usize,
    pub platforms: Vec<Platform>,
    pub dates: Vec<NaiveDate>,
}

/// Edits staged against a store but not yet applied to it.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    staged: IndexMap<Platform, IndexMap<CellKey, u32>>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a new value for one cell.
    ///
    /// `day_index` is 1-based. Values outside the store's bounds are
    /// rejected, never clamped. A failed call stages nothing.
    pub fn update_cell(
        &mut self,
        store: &Store,
        platform: &Platform,
        metric: Metric,
        day_index: usize,
        value: u32,
    ) -> Result<()> {
        validate_edit(store, platform, metric, day_index, value)?;

        self.staged
            .entry(platform.clone())
            .or_default()
            .insert(CellKey { metric, day_index }, value);

        debug!(
            "Staged {}/{} day {} = {}",
            platform, metric, day_index, value
        );
        Ok(())
    }

    /// Number of staged cells.
    pub fn len(&self) -> usize {
        self.staged.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Staged value of a cell, if any.
    pub fn staged_value(&self, platform: &Platform, metric: Metric, day_index: usize) -> Option<u32> {
        self.staged
            .get(platform)
            .and_then(|cells| cells.get(&CellKey { metric, day_index }))
            .copied()
    }

    /// The platform's table as it would look after commit.
    ///
    /// Only rows with staged edits have their Total/Average recomputed.
    pub fn preview(&self, store: &Store, platform: &Platform) -> Result<PlatformTable> {
        let mut table = to_table(store.get(platform)?);
        if let Some(cells) = self.staged.get(platform) {
            for (key, value) in cells {
                table.set_cell(key.day_index - 1, key.metric, *value)?;
            }
        }
        Ok(table)
    }

    /// Drops every staged edit.
    pub fn discard(&mut self) {
        if !self.is_empty() {
            debug!("Discarding {} staged edit(s)", self.len());
        }
        self.staged.clear();
    }

    /// Applies all staged edits to the store.
    ///
    /// Every edit is revalidated against the store first; if any fails the
    /// store is left untouched and the session keeps its edits.
    pub fn commit(&mut self, store: &mut Store) -> Result<CommitSummary> {
        for (platform, cells) in &self.staged {
            for (key, value) in cells {
                validate_edit(store, platform, key.metric, key.day_index, *value)?;
            }
        }

        let mut dates = Vec::new();
        let mut cells_written = 0;
        let anchor = store.anchor();
        let window = store.window();

        for (platform, cells) in &self.staged {
            let data = store.get_mut(platform)?;
            for (key, value) in cells {
                let series = data.get_mut(key.metric).ok_or_else(|| {
                    FunnelError::validation(format!("metric '{}' is not tracked", key.metric))
                })?;
                series.set_value(key.day_index - 1, *value)?;
                cells_written += 1;
                if let Some(date) = window.date_of(anchor, key.day_index) {
                    if !dates.contains(&date) {
                        dates.push(date);
                    }
                }
            }
        }
        dates.sort();

        let platforms: Vec<Platform> = self.staged.keys().cloned().collect();
        self.staged.clear();

        info!(
            "Committed {} cell(s) across {} platform(s)",
            cells_written,
            platforms.len()
        );

        Ok(CommitSummary {
            cells_written,
            platforms,
            dates,
        })
    }
}

fn validate_edit(
    store: &Store,
    platform: &Platform,
    metric: Metric,
    day_index: usize,
    value: u32,
) -> Result<()> {
    let window_days = store.window().days();
    if day_index == 0 || day_index > window_days {
        return Err(FunnelError::IndexOutOfRange {
            day: day_index,
            window_days,
        });
    }
    store.get(platform)?;
    if !store.tracks(metric) {
        return Err(FunnelError::validation(format!(
            "metric '{}' is not tracked",
            metric
        )));
    }
    store.bounds().check(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ValueBounds, Window};
    use crate::store::GeneratorSettings;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn store() -> Store {
        Store::initialize(
            vec!["Facebook".into(), "Pinterest".into()],
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            ValueBounds::default(),
            &GeneratorSettings {
                seed: Some(3),
                ..GeneratorSettings::default()
            },
        )
        .unwrap()
    }

    fn facebook() -> Platform {
        Platform::from("Facebook")
    }

    #[test]
    fn test_day_index_out_of_range() {
        let store = store();
        let mut session = EditSession::new();

        for day in [0, 32] {
            let result = session.update_cell(&store, &facebook(), Metric::Clicks, day, 5);
            assert!(matches!(
                result,
                Err(FunnelError::IndexOutOfRange { day: d, window_days: 31 }) if d == day
            ));
        }
        assert!(session.is_empty());

        let before = store.clone();
        let mut store = store;
        session.commit(&mut store).unwrap();
        assert_eq!(store, before);
    }

    #[test]
    fn test_value_out_of_bounds_is_rejected() {
        let store = store();
        let mut session = EditSession::new();
        let result = session.update_cell(&store, &facebook(), Metric::Clicks, 1, 101);
        assert!(matches!(result, Err(FunnelError::Validation(_))));
        assert!(session.is_empty());
    }

    #[test]
    fn test_missing_platform() {
        let store = store();
        let mut session = EditSession::new();
        let result = session.update_cell(&store, &"Threads".into(), Metric::Clicks, 1, 1);
        assert!(matches!(result, Err(FunnelError::MissingPlatform(_))));
    }

    #[test]
    fn test_uncommitted_edits_do_not_reach_store() {
        let store = store();
        let before = store.clone();
        let mut session = EditSession::new();
        session
            .update_cell(&store, &facebook(), Metric::Posts, 5, 99)
            .unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(store, before);

        session.discard();
        assert!(session.is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn test_commit_replaces_exactly_one_cell() {
        let mut store = store();
        let before = to_table(store.get(&facebook()).unwrap());
        let original = before.rows[9].values[2];
        let new_value = if original == 77 { 78 } else { 77 };

        let mut session = EditSession::new();
        session
            .update_cell(&store, &facebook(), Metric::Clicks, 10, new_value)
            .unwrap();
        let summary = session.commit(&mut store).unwrap();

        assert_eq!(summary.cells_written, 1);
        assert_eq!(summary.dates, vec![anchor() + chrono::Duration::days(9)]);
        assert!(session.is_empty());

        let after = to_table(store.get(&facebook()).unwrap());
        for (i, (a, b)) in before.rows.iter().zip(&after.rows).enumerate() {
            if i == 9 {
                assert_eq!(b.values[2], new_value);
                let sum: u64 = b.values.iter().map(|v| u64::from(*v)).sum();
                assert_eq!(b.total, sum);
                assert!((b.average - sum as f64 / 11.0).abs() < 1e-9);
                assert_eq!(
                    b.total as i64 - a.total as i64,
                    new_value as i64 - original as i64
                );
            } else {
                assert_eq!(a, b);
            }
        }

        let pinterest = store.get(&"Pinterest".into()).unwrap();
        assert_eq!(pinterest.day_count(), 31);
    }

    #[test]
    fn test_preview_matches_commit() {
        let mut store = store();
        let mut session = EditSession::new();
        session
            .update_cell(&store, &facebook(), Metric::Views, 1, 0)
            .unwrap();
        session
            .update_cell(&store, &facebook(), Metric::Views, 1, 42)
            .unwrap();
        session
            .update_cell(&store, &facebook(), Metric::Closings, 31, 100)
            .unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.staged_value(&facebook(), Metric::Views, 1), Some(42));

        let preview = session.preview(&store, &facebook()).unwrap();
        session.commit(&mut store).unwrap();
        assert_eq!(preview, to_table(store.get(&facebook()).unwrap()));
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let mut store = store();
        let mut session = EditSession::new();
        session
            .update_cell(&store, &facebook(), Metric::Views, 1, 42)
            .unwrap();
        session
            .update_cell(&store, &"Pinterest".into(), Metric::Views, 1, 42)
            .unwrap();

        // Pinterest loses its data after staging; the whole commit must fail.
        let mut replacement = Store::empty(
            vec!["Facebook".into(), "Pinterest".into()],
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();
        replacement
            .set(facebook(), store.get(&facebook()).unwrap().clone())
            .unwrap();
        store = replacement;
        let before = store.clone();

        assert!(matches!(
            session.commit(&mut store),
            Err(FunnelError::MissingPlatform(_))
        ));
        assert_eq!(store, before);
        assert_eq!(session.len(), 2);
    }
}
