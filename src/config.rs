//! Conversion configuration.
//!
//! A single [`ConversionConfig`] value describes one dataset conversion and
//! is threaded explicitly through the orchestrator. It can be saved and
//! loaded as TOML or JSON for reproducible runs.
//!
//! # Example
//!
//! ```ignore
//! use autodl_formatter::config::ConversionConfig;
//! use autodl_formatter::shape::ShapeSpec;
//!
//! let config = ConversionConfig::new("raw/automl", "formatted", "adult")
//!     .with_shape(ShapeSpec::new(1, 1, 24, 1))
//!     .with_max_examples(Some(1000), None);
//!
//! config.save_toml("adult.toml")?;
//! let loaded = ConversionConfig::load_toml("adult.toml")?;
//! ```

use crate::error::{ConvertError, Result};
use crate::shape::ShapeSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for converting one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Directory containing one sub-directory per source dataset.
    pub input_dir: PathBuf,

    /// Directory receiving the formatted dataset.
    pub output_dir: PathBuf,

    /// Basename of the source dataset (e.g. "adult").
    pub dataset_name: String,

    /// Name of the formatted dataset. Defaults to `dataset_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_dataset_name: Option<String>,

    /// Maximum number of training examples to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_examples_train: Option<usize>,

    /// Maximum number of test examples to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_examples_test: Option<usize>,

    /// Number of shards for the training set. Only one shard is written.
    #[serde(default = "default_num_shards")]
    pub num_shards_train: usize,

    /// Number of shards for the test set. Only one shard is written.
    #[serde(default = "default_num_shards")]
    pub num_shards_test: usize,

    /// Reject unrecognized task kinds instead of passing labels through.
    #[serde(default)]
    pub strict_task_kind: bool,

    /// Write `conversion_report.json` into the dataset directory.
    #[serde(default)]
    pub write_report: bool,

    /// Declared example shape. Leave empty for the flat default.
    #[serde(default)]
    pub shape: ShapeSpec,
}

fn default_num_shards() -> usize {
    1
}

impl ConversionConfig {
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_dir: P1,
        output_dir: P2,
        dataset_name: &str,
    ) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            dataset_name: dataset_name.to_string(),
            new_dataset_name: None,
            shape: ShapeSpec::default(),
            max_num_examples_train: None,
            max_num_examples_test: None,
            num_shards_train: 1,
            num_shards_test: 1,
            strict_task_kind: false,
            write_report: false,
        }
    }

    pub fn with_shape(mut self, shape: ShapeSpec) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_max_examples(mut self, train: Option<usize>, test: Option<usize>) -> Self {
        self.max_num_examples_train = train;
        self.max_num_examples_test = test;
        self
    }

    pub fn with_new_dataset_name(mut self, name: &str) -> Self {
        self.new_dataset_name = Some(name.to_string());
        self
    }

    pub fn with_strict_task_kind(mut self, strict: bool) -> Self {
        self.strict_task_kind = strict;
        self
    }

    pub fn with_report(mut self, write_report: bool) -> Self {
        self.write_report = write_report;
        self
    }

    /// Name of the formatted dataset: the base name followed by the train
    /// and test example limits, when set.
    ///
    /// `adult` limited to 1000 train and 500 test examples becomes
    /// `adult_1000_500`.
    pub fn output_dataset_name(&self) -> String {
        let mut name = self
            .new_dataset_name
            .clone()
            .unwrap_or_else(|| self.dataset_name.clone());
        if let Some(n) = self.max_num_examples_train {
            name.push_str(&format!("_{n}"));
        }
        if let Some(n) = self.max_num_examples_test {
            name.push_str(&format!("_{n}"));
        }
        name
    }

    /// Directory holding the formatted dataset.
    pub fn dataset_dir(&self) -> PathBuf {
        self.output_dir.join(self.output_dataset_name())
    }

    /// Directory holding the source dataset files.
    pub fn source_dir(&self) -> PathBuf {
        self.input_dir.join(&self.dataset_name)
    }

    /// Validate the configuration without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(ConvertError::config("dataset_name must not be empty"));
        }
        if let Some(name) = &self.new_dataset_name {
            if name.trim().is_empty() {
                return Err(ConvertError::config("new_dataset_name must not be empty"));
            }
        }
        if self.max_num_examples_train == Some(0) {
            return Err(ConvertError::config("max_num_examples_train must be > 0"));
        }
        if self.max_num_examples_test == Some(0) {
            return Err(ConvertError::config("max_num_examples_test must be > 0"));
        }
        if self.num_shards_train == 0 || self.num_shards_test == 0 {
            return Err(ConvertError::config("shard counts must be > 0"));
        }
        self.shape.validate()?;
        Ok(())
    }

    /// Log a notice for shard counts other than one; sharding is not
    /// implemented and every split is written as a single file.
    pub fn warn_ignored_shards(&self) {
        for (split, shards) in [("train", self.num_shards_train), ("test", self.num_shards_test)] {
            if shards != 1 {
                log::warn!("num_shards_{split} = {shards} ignored, writing a single shard");
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ConversionConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ConversionConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }
}
