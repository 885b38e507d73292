//! Aggregation over the store.
//!
//! Platform tables with derived columns, date-range summaries,
//! cross-platform totals, rankings and heat-map pivots.

pub mod aggregator;
pub mod heatmap;

pub use aggregator::*;
pub use heatmap::{pivot_heatmap, Heatmap, WEEKDAYS};
