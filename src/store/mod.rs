//! In-memory time-series store.
//!
//! The [`Store`] owns the platform roster, the tracked metrics, the window
//! and every platform's raw series. It is an explicit context value: callers
//! own it and pass it into the aggregation, editing and exchange operations.

pub mod generator;

pub use generator::{DemoGenerator, Distribution, GeneratorSettings};

use crate::error::{FunnelError, Result};
use crate::models::{Metric, Platform, PlatformData, Series, ValueBounds, Window};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Per-platform funnel data for one tracking window.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    roster: Vec<Platform>,
    metrics: Vec<Metric>,
    window: Window,
    anchor: NaiveDate,
    bounds: ValueBounds,
    data: HashMap<Platform, PlatformData>,
}

impl Store {
    /// Creates a store with a roster but no data yet.
    pub fn empty(
        roster: Vec<Platform>,
        metrics: Vec<Metric>,
        window: Window,
        anchor: NaiveDate,
        bounds: ValueBounds,
    ) -> Result<Self> {
        if roster.is_empty() {
            return Err(FunnelError::validation("platform roster is empty"));
        }
        let mut seen = HashSet::new();
        for platform in &roster {
            if platform.as_str().is_empty() {
                return Err(FunnelError::validation("platform names must not be blank"));
            }
            if !seen.insert(platform) {
                return Err(FunnelError::validation(format!(
                    "platform '{}' appears twice in the roster",
                    platform
                )));
            }
        }

        if metrics.is_empty() {
            return Err(FunnelError::validation("no metrics to track"));
        }
        let unique: HashSet<_> = metrics.iter().collect();
        if unique.len() != metrics.len() {
            return Err(FunnelError::validation("duplicate metric in tracked set"));
        }

        bounds.validate()?;

        Ok(Self {
            roster,
            metrics,
            window,
            anchor,
            bounds,
            data: HashMap::new(),
        })
    }

    /// Creates a store and fills every platform with generated demo data.
    pub fn initialize(
        roster: Vec<Platform>,
        metrics: Vec<Metric>,
        window: Window,
        anchor: NaiveDate,
        bounds: ValueBounds,
        settings: &GeneratorSettings,
    ) -> Result<Self> {
        let mut store = Self::empty(roster, metrics, window, anchor, bounds)?;
        let mut generator = DemoGenerator::new(settings)?;

        for platform in store.roster.clone() {
            let mut data = PlatformData::new();
            for &metric in &store.metrics {
                data.insert(metric, generator.series(anchor, window, &bounds)?);
            }
            store.set(platform, data)?;
        }

        debug!(
            "Generated demo data for {} platforms x {} metrics over {}",
            store.roster.len(),
            store.metrics.len(),
            window
        );
        Ok(store)
    }

    /// Data of one platform.
    pub fn get(&self, platform: &Platform) -> Result<&PlatformData> {
        self.data
            .get(platform)
            .ok_or_else(|| FunnelError::MissingPlatform(platform.to_string()))
    }

    /// Replaces one platform's data wholesale.
    ///
    /// The data must cover exactly the tracked metrics with series spanning
    /// the store's window, and every value must be within the bounds.
    pub fn set(&mut self, platform: Platform, data: PlatformData) -> Result<()> {
        if !self.roster.contains(&platform) {
            return Err(FunnelError::MissingPlatform(platform.to_string()));
        }
        let data = self.normalize(&platform, data)?;
        self.data.insert(platform, data);
        Ok(())
    }

    /// Checks `data` against the store's shape and reorders its series into
    /// tracked-metric order.
    fn normalize(&self, platform: &Platform, data: PlatformData) -> Result<PlatformData> {
        if let Some(extra) = data.metrics().find(|m| !self.metrics.contains(m)) {
            return Err(FunnelError::validation(format!(
                "{}: metric '{}' is not tracked",
                platform, extra
            )));
        }

        let mut normalized = PlatformData::new();
        for &metric in &self.metrics {
            let series = data.get(metric).ok_or_else(|| {
                FunnelError::validation(format!("{}: missing series for '{}'", platform, metric))
            })?;
            let series = Series::new(series.points().to_vec(), self.anchor, self.window)
                .map_err(|e| FunnelError::validation(format!("{}/{}: {}", platform, metric, e)))?;
            for point in series.points() {
                self.bounds.check(point.value).map_err(|e| {
                    FunnelError::validation(format!("{}/{}/{}: {}", platform, metric, point.date, e))
                })?;
            }
            normalized.insert(metric, series);
        }
        Ok(normalized)
    }

    pub(crate) fn get_mut(&mut self, platform: &Platform) -> Result<&mut PlatformData> {
        self.data
            .get_mut(platform)
            .ok_or_else(|| FunnelError::MissingPlatform(platform.to_string()))
    }

    /// Platforms in canonical roster order.
    pub fn roster(&self) -> &[Platform] {
        &self.roster
    }

    /// Tracked metrics in display order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn end_date(&self) -> NaiveDate {
        self.window.end_date(self.anchor)
    }

    pub fn bounds(&self) -> ValueBounds {
        self.bounds
    }

    pub fn is_on_roster(&self, platform: &Platform) -> bool {
        self.roster.contains(platform)
    }

    pub fn contains(&self, platform: &Platform) -> bool {
        self.data.contains_key(platform)
    }

    pub fn tracks(&self, metric: Metric) -> bool {
        self.metrics.contains(&metric)
    }

    /// Roster platforms that have data, in roster order.
    pub fn platforms_with_data(&self) -> impl Iterator<Item = (&Platform, &PlatformData)> + '_ {
        self.roster
            .iter()
            .filter_map(|p| self.data.get(p).map(|d| (p, d)))
    }

    /// Roster platforms without data, in roster order.
    pub fn missing_platforms(&self) -> Vec<Platform> {
        self.roster
            .iter()
            .filter(|p| !self.data.contains_key(*p))
            .cloned()
            .collect()
    }

    /// 1-based day index of a date inside the window.
    pub fn day_index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.anchor).num_days();
        if offset < 0 || offset >= self.window.days() as i64 {
            None
        } else {
            Some(offset as usize + 1)
        }
    }

    /// Every tracked date, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        (1..=self.window.days())
            .filter_map(|day| self.window.date_of(self.anchor, day))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataPoint;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn seeded() -> GeneratorSettings {
        GeneratorSettings {
            seed: Some(7),
            ..GeneratorSettings::default()
        }
    }

    fn roster() -> Vec<Platform> {
        vec!["Facebook".into(), "TikTok".into(), "LinkedIn".into()]
    }

    #[test]
    fn test_initialize_series_cover_window() {
        for window in [Window::Days31, Window::Days90] {
            let store = Store::initialize(
                roster(),
                Metric::ALL.to_vec(),
                window,
                anchor(),
                ValueBounds::default(),
                &seeded(),
            )
            .unwrap();

            for (_, data) in store.platforms_with_data() {
                assert_eq!(data.metric_count(), 11);
                for (_, series) in data.iter() {
                    assert_eq!(series.len(), window.days());
                    for (i, pair) in series.points().windows(2).enumerate() {
                        assert_eq!(
                            (pair[1].date - pair[0].date).num_days(),
                            1,
                            "gap after point {}",
                            i
                        );
                    }
                    assert_eq!(series.first_date(), Some(anchor()));
                    assert!(series.values().all(|v| v <= 100));
                }
            }
        }
    }

    #[test]
    fn test_initialize_is_deterministic_with_seed() {
        let a = Store::initialize(
            roster(),
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            ValueBounds::default(),
            &seeded(),
        )
        .unwrap();
        let b = Store::initialize(
            roster(),
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            ValueBounds::default(),
            &seeded(),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_rejects_bad_rosters() {
        let bounds = ValueBounds::default();
        assert!(Store::empty(vec![], Metric::ALL.to_vec(), Window::Days31, anchor(), bounds).is_err());
        assert!(Store::empty(
            vec!["A".into(), "A".into()],
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            bounds
        )
        .is_err());
        assert!(Store::empty(
            roster(),
            vec![Metric::Posts, Metric::Posts],
            Window::Days31,
            anchor(),
            bounds
        )
        .is_err());
    }

    #[test]
    fn test_get_missing_platform() {
        let store = Store::empty(
            roster(),
            Metric::ALL.to_vec(),
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();
        assert!(matches!(
            store.get(&"Facebook".into()),
            Err(FunnelError::MissingPlatform(_))
        ));
        assert_eq!(store.missing_platforms().len(), 3);
    }

    #[test]
    fn test_set_replaces_whole_table() {
        let mut store = Store::empty(
            roster(),
            vec![Metric::Posts, Metric::Clicks],
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();

        let mut data = PlatformData::new();
        // Inserted out of tracked order on purpose.
        data.insert(Metric::Clicks, Series::from_values(anchor(), vec![2; 31]));
        data.insert(Metric::Posts, Series::from_values(anchor(), vec![1; 31]));
        store.set("TikTok".into(), data).unwrap();

        let stored = store.get(&"TikTok".into()).unwrap();
        assert_eq!(
            stored.metrics().collect::<Vec<_>>(),
            vec![Metric::Posts, Metric::Clicks]
        );
        assert_eq!(stored.get(Metric::Clicks).unwrap().sum(), 62);

        let mut replacement = PlatformData::new();
        replacement.insert(Metric::Posts, Series::from_values(anchor(), vec![5; 31]));
        replacement.insert(Metric::Clicks, Series::from_values(anchor(), vec![5; 31]));
        store.set("TikTok".into(), replacement).unwrap();
        assert_eq!(
            store.get(&"TikTok".into()).unwrap().get(Metric::Clicks).unwrap().sum(),
            155
        );
    }

    #[test]
    fn test_set_rejects_invalid_data() {
        let mut store = Store::empty(
            roster(),
            vec![Metric::Posts],
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();

        // Unknown platform.
        let mut data = PlatformData::new();
        data.insert(Metric::Posts, Series::from_values(anchor(), vec![1; 31]));
        assert!(matches!(
            store.set("MySpace".into(), data.clone()),
            Err(FunnelError::MissingPlatform(_))
        ));

        // Wrong length.
        let mut short = PlatformData::new();
        short.insert(Metric::Posts, Series::from_values(anchor(), vec![1; 30]));
        assert!(store.set("TikTok".into(), short).is_err());

        // Out-of-bounds value.
        let mut loud = PlatformData::new();
        loud.insert(Metric::Posts, Series::from_values(anchor(), vec![101; 31]));
        assert!(store.set("TikTok".into(), loud).is_err());

        // Untracked metric.
        let mut extra = data.clone();
        extra.insert(Metric::Views, Series::from_values(anchor(), vec![1; 31]));
        assert!(store.set("TikTok".into(), extra).is_err());

        // Wrong anchor.
        let shifted = anchor() + chrono::Duration::days(1);
        let mut late = PlatformData::new();
        late.insert(Metric::Posts, Series::from_values(shifted, vec![1; 31]));
        assert!(store.set("TikTok".into(), late).is_err());

        assert!(!store.contains(&"TikTok".into()));
    }

    #[test]
    fn test_day_index_of() {
        let store = Store::empty(
            roster(),
            vec![Metric::Posts],
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();
        assert_eq!(store.day_index_of(anchor()), Some(1));
        assert_eq!(
            store.day_index_of(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
            Some(31)
        );
        assert_eq!(
            store.day_index_of(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            None
        );
        assert_eq!(
            store.day_index_of(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            None
        );
        assert_eq!(store.dates().len(), 31);
        assert_eq!(store.end_date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_points_keep_dates_after_set() {
        let mut store = Store::empty(
            roster(),
            vec![Metric::Posts],
            Window::Days31,
            anchor(),
            ValueBounds::default(),
        )
        .unwrap();
        let points: Vec<DataPoint> = store
            .dates()
            .into_iter()
            .map(|date| DataPoint { date, value: 3 })
            .collect();
        let mut data = PlatformData::new();
        data.insert(Metric::Posts, Series::from_values(anchor(), points.iter().map(|p| p.value)));
        store.set("Facebook".into(), data).unwrap();
        assert_eq!(
            store.get(&"Facebook".into()).unwrap().get(Metric::Posts).unwrap().points(),
            points.as_slice()
        );
    }
}
