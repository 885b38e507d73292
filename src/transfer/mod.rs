//! CSV export, staged import and merge.

pub mod csv;

pub use self::csv::{
    export_csv, import_csv, read_csv, write_csv, ConflictPolicy, MergeReport, StagedDataset,
};
