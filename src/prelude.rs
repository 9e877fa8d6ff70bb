//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use autodl_formatter::prelude::*;
//!
//! let config = ConversionConfig::load_toml("adult.toml")?;
//! let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name)?;
//! let report = convert_dataset(&data, &config)?;
//! ```
//!
//! # What's Included
//!
//! ## Conversion
//! - [`ConversionConfig`] - Conversion configuration
//! - [`convert_dataset`] - Whole-dataset conversion
//! - [`ConversionReport`] - What a conversion produced
//!
//! ## Data
//! - [`AutoMLDataset`] - Loaded source dataset
//! - [`FeatureMatrix`] / [`LabelMatrix`] - Split matrices
//! - [`TaskKind`] - Task kind and label normalization
//!
//! ## Records
//! - [`Record`] - One decoded example
//! - [`RecordReader`] / [`RecordWriter`] - TFRecord framing
//!
//! ## Errors
//! - [`ConvertError`] / [`Result`]

pub use crate::config::ConversionConfig;
pub use crate::error::{ConvertError, Result};
pub use crate::export::{convert_dataset, ConversionReport, FileOutcome};
pub use crate::labeling::TaskKind;
pub use crate::loader::AutoMLDataset;
pub use crate::matrix::{FeatureMatrix, LabelMatrix};
pub use crate::metadata::{SplitKind, StorageFormat};
pub use crate::record::{Record, RecordReader, RecordWriter};
pub use crate::shape::{ShapeSpec, TensorShape};
