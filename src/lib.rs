//! AutoDL Formatter
//!
//! Converts AutoML tabular datasets into AutoDL sequence datasets.
//!
//! # Overview
//!
//! An AutoML dataset is a directory of whitespace-separated text matrices
//! (train, validation and test features and labels) plus an info file. The
//! converter turns each example into a `tf.train.SequenceExample` stored in
//! a TFRecord file, alongside a `metadata.textproto` sidecar describing the
//! split. Test labels are withheld from the records and written to a
//! separate solution file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       AutoDL Formatter                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  loader/    - AutoML directory reader                           │
//! │  logging/   - env_logger setup for the tools                    │
//! │  matrix/    - Dense/sparse feature matrices, train+valid merge  │
//! │  labeling/  - Task kinds and label normalization                │
//! │  shape/     - (T, H, W, C) example shape resolution             │
//! │  metadata/  - Split descriptors and metadata.textproto          │
//! │  record/    - SequenceExample encoding and TFRecord framing     │
//! │  export/    - Split writer and dataset orchestrator             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use autodl_formatter::prelude::*;
//!
//! let config = ConversionConfig::new("raw/automl", "formatted", "adult")
//!     .with_max_examples(None, Some(500));
//! let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name)?;
//! let report = convert_dataset(&data, &config)?;
//! println!("{} records", report.total_emitted());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod labeling;
pub mod loader;
pub mod logging;
pub mod matrix;
pub mod metadata;
pub mod prelude;
pub mod record;
pub mod shape;

// Re-exports - Errors
pub use error::{ConvertError, Result};

// Re-exports - Config
pub use config::ConversionConfig;

// Re-exports - Data
pub use loader::{AutoMLDataset, DatasetInfo};
pub use matrix::{CsrMatrix, FeatureMatrix, FeatureRow, LabelMatrix};

// Re-exports - Labeling
pub use labeling::TaskKind;

// Re-exports - Shape and metadata
pub use metadata::{DatasetDescriptor, SplitKind, StorageFormat};
pub use shape::{ResolvedShape, ShapeSpec, TensorShape};

// Re-exports - Records
pub use record::{FeaturePayload, Record, RecordReader, RecordWriter, SequenceExample};

// Re-exports - Export
pub use export::{
    convert_dataset, prepare_split, write_split, ConversionReport, FileOutcome, PreparedSplit,
    SplitOutput,
};
