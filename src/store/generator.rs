//! Seeded demo data generation.

use crate::error::{FunnelError, Result};
use crate::models::{Series, ValueBounds, Window};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Shape of the generated daily values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Uniform over the value bounds.
    Uniform,
    /// Gaussian noise around a random baseline per series.
    #[default]
    Normal,
}

/// Parameters of the demo data generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// Fixed seed for reproducible data; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub distribution: Distribution,
    pub baseline_min: u32,
    pub baseline_max: u32,
    pub std_dev: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            seed: None,
            distribution: Distribution::Normal,
            baseline_min: 25,
            baseline_max: 75,
            std_dev: 12.0,
        }
    }
}

/// Produces daily series from a seeded random source.
pub struct DemoGenerator {
    rng: StdRng,
    distribution: Distribution,
    baseline_min: u32,
    baseline_max: u32,
    noise: Normal<f64>,
}

impl DemoGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self> {
        if settings.baseline_min > settings.baseline_max {
            return Err(FunnelError::validation(format!(
                "baseline_min {} exceeds baseline_max {}",
                settings.baseline_min, settings.baseline_max
            )));
        }
        let noise = Normal::new(0.0, settings.std_dev)
            .map_err(|e| FunnelError::validation(format!("invalid std_dev: {}", e)))?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            distribution: settings.distribution,
            baseline_min: settings.baseline_min,
            baseline_max: settings.baseline_max,
            noise,
        })
    }

    /// Generates one series covering `window` days from `anchor`, every value
    /// clamped into `bounds`.
    pub fn series(
        &mut self,
        anchor: NaiveDate,
        window: Window,
        bounds: &ValueBounds,
    ) -> Result<Series> {
        bounds.validate()?;
        let values: Vec<u32> = match self.distribution {
            Distribution::Uniform => (0..window.days())
                .map(|_| self.rng.gen_range(bounds.min..=bounds.max))
                .collect(),
            Distribution::Normal => {
                let baseline = self.rng.gen_range(self.baseline_min..=self.baseline_max) as f64;
                (0..window.days())
                    .map(|_| {
                        let sample = baseline + self.rng.sample(self.noise);
                        bounds.clamp(sample.round() as i64)
                    })
                    .collect()
            }
        };
        Ok(Series::from_values(anchor, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_uniform_stays_in_bounds() {
        let settings = GeneratorSettings {
            seed: Some(1),
            distribution: Distribution::Uniform,
            ..GeneratorSettings::default()
        };
        let bounds = ValueBounds { min: 10, max: 20 };
        let mut generator = DemoGenerator::new(&settings).unwrap();
        let series = generator.series(anchor(), Window::Days90, &bounds).unwrap();
        assert_eq!(series.len(), 90);
        assert!(series.values().all(|v| (10..=20).contains(&v)));
    }

    #[test]
    fn test_normal_is_clamped() {
        let settings = GeneratorSettings {
            seed: Some(2),
            distribution: Distribution::Normal,
            baseline_min: 95,
            baseline_max: 100,
            std_dev: 50.0,
        };
        let bounds = ValueBounds::default();
        let mut generator = DemoGenerator::new(&settings).unwrap();
        let series = generator.series(anchor(), Window::Days90, &bounds).unwrap();
        assert!(series.values().all(|v| v <= 100));
    }

    #[test]
    fn test_same_seed_same_values() {
        let settings = GeneratorSettings {
            seed: Some(42),
            ..GeneratorSettings::default()
        };
        let bounds = ValueBounds::default();
        let a = DemoGenerator::new(&settings)
            .unwrap()
            .series(anchor(), Window::Days31, &bounds)
            .unwrap();
        let b = DemoGenerator::new(&settings)
            .unwrap()
            .series(anchor(), Window::Days31, &bounds)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_settings() {
        let inverted = GeneratorSettings {
            baseline_min: 80,
            baseline_max: 20,
            ..GeneratorSettings::default()
        };
        assert!(DemoGenerator::new(&inverted).is_err());

        let negative = GeneratorSettings {
            std_dev: -1.0,
            ..GeneratorSettings::default()
        };
        assert!(DemoGenerator::new(&negative).is_err());
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let bounds = ValueBounds { min: 10, max: 5 };
        for distribution in [Distribution::Uniform, Distribution::Normal] {
            let settings = GeneratorSettings {
                seed: Some(4),
                distribution,
                ..GeneratorSettings::default()
            };
            let mut generator = DemoGenerator::new(&settings).unwrap();
            let result = generator.series(anchor(), Window::Days31, &bounds);
            assert!(matches!(result, Err(FunnelError::Validation(_))));
        }
    }
}
