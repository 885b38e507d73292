//! Funneltrack - marketing funnel metrics engine.
//!
//! Tracks daily counts of funnel metrics per platform over a fixed window.
//! The [`store::Store`] holds the data, [`analysis`] derives tables and
//! rankings from it, [`editor::EditSession`] stages cell edits until an
//! explicit commit, and [`transfer`] exchanges the store as CSV with an
//! explicit conflict policy on merge.

pub mod analysis;
pub mod editor;
pub mod error;
pub mod models;
pub mod report;
pub mod store;
pub mod transfer;

pub use error::{FunnelError, Result};
