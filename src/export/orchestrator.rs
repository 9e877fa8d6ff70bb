//! Whole-dataset conversion.
//!
//! The test split is written first with identifiers starting at zero; the
//! train split (training rows followed by validation rows) continues the
//! identifier sequence where the test split stopped. The solution file is
//! then moved up to the dataset root and the info files are copied next to
//! it. Both of these last steps are best-effort.
//!
//! Output directories are created when missing and never cleared. A failed
//! run leaves whatever was already written on disk.

use super::writer::{record_file_name, write_split, SplitOutput};
use super::{copy_best_effort, relocate, FileOutcome};
use crate::config::ConversionConfig;
use crate::error::Result;
use crate::loader::AutoMLDataset;
use crate::matrix::{check_row_correspondence, merge_train_valid, FeatureMatrix, LabelMatrix};
use crate::metadata::{self, DatasetDescriptor, SplitKind};
use crate::record;
use crate::shape::{self, ShapeSpec};
use serde::Serialize;
use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;

/// Info files copied from the source dataset, by suffix.
const INFO_FILE_SUFFIXES: [&str; 2] = ["_public", "_private"];

/// File name of the optional JSON report.
pub const REPORT_FILENAME: &str = "conversion_report.json";

// ============================================================================
// Split preparation
// ============================================================================

/// A split ready to be written: merged, normalized and shape-checked.
#[derive(Debug, Clone)]
pub struct PreparedSplit<'a> {
    pub descriptor: DatasetDescriptor,
    pub features: Cow<'a, FeatureMatrix>,
    pub labels: LabelMatrix,
    /// `true` when the default flat shape was adopted.
    pub used_default_shape: bool,
}

/// Select, merge and normalize the matrices of one split, then resolve its
/// shape and build its descriptor. Performs no I/O.
///
/// Sparse features combined with a multi-frame shape are rejected here so
/// that nothing is written for such a dataset.
pub fn prepare_split<'a>(
    data: &'a AutoMLDataset,
    split: SplitKind,
    shape_spec: &ShapeSpec,
) -> Result<PreparedSplit<'a>> {
    let (features, raw_labels) = match split {
        SplitKind::Train => {
            let (features, labels) =
                merge_train_valid(&data.x_train, &data.y_train, &data.x_valid, &data.y_valid)?;
            (Cow::Owned(features), labels)
        }
        SplitKind::Test => {
            check_row_correspondence(&data.x_test, &data.y_test, "test")?;
            (Cow::Borrowed(&data.x_test), data.y_test.clone())
        }
    };

    let labels = data.info.task.normalize(&raw_labels);
    let resolved = shape::resolve(shape_spec, features.n_cols())?;
    if features.is_sparse() && resolved.shape.sequence_size != 1 {
        return Err(record::sparse_sequence_error(resolved.shape.sequence_size));
    }
    let descriptor = metadata::build(
        split,
        resolved.shape,
        labels.ncols(),
        features.n_rows(),
        &data.info.name,
        data.info.format,
    );

    Ok(PreparedSplit {
        descriptor,
        features,
        labels,
        used_default_shape: resolved.used_default,
    })
}

// ============================================================================
// Report
// ============================================================================

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub dataset_dir: PathBuf,
    pub dataset_name: String,
    pub test: SplitOutput,
    pub train: SplitOutput,
    pub solution: FileOutcome,
    pub info_files: Vec<FileOutcome>,
}

impl ConversionReport {
    /// Best-effort operations that failed.
    pub fn warnings(&self) -> Vec<&FileOutcome> {
        std::iter::once(&self.solution)
            .chain(self.info_files.iter())
            .filter(|o| o.is_warning())
            .collect()
    }

    /// Total records written across both splits.
    pub fn total_emitted(&self) -> usize {
        self.test.emitted + self.train.emitted
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: String,
    #[serde(flatten)]
    report: &'a ConversionReport,
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert one dataset according to `config`.
///
/// Both splits are prepared, and their shapes checked, before anything is
/// written.
pub fn convert_dataset(data: &AutoMLDataset, config: &ConversionConfig) -> Result<ConversionReport> {
    config.validate()?;
    config.warn_ignored_shards();
    if config.strict_task_kind {
        data.info.task.ensure_recognized()?;
    }

    let test = prepare_split(data, SplitKind::Test, &config.shape)?;
    let train = prepare_split(data, SplitKind::Train, &config.shape)?;

    let new_name = config.output_dataset_name();
    let dataset_dir = config.dataset_dir();
    let data_dir = dataset_dir.join(format!("{new_name}.data"));

    log::info!(
        "Formatting {} into {} (task={}, format={:?})",
        config.dataset_name,
        dataset_dir.display(),
        data.info.task,
        data.info.format
    );

    // processing_test
    let test_dir = data_dir.join(SplitKind::Test.as_str());
    fs::create_dir_all(&test_dir)?;
    let test_out = write_split(
        &test_dir.join(record_file_name(&config.dataset_name, SplitKind::Test)),
        &test.descriptor,
        &test.features,
        &test.labels,
        0,
        config.max_num_examples_test,
    )?;

    // processing_train
    let train_dir = data_dir.join(SplitKind::Train.as_str());
    fs::create_dir_all(&train_dir)?;
    let train_out = write_split(
        &train_dir.join(record_file_name(&config.dataset_name, SplitKind::Train)),
        &train.descriptor,
        &train.features,
        &train.labels,
        test_out.emitted,
        config.max_num_examples_train,
    )?;

    let solution_target = dataset_dir.join(format!("{new_name}.solution"));
    let solution = match &test_out.solution_path {
        Some(path) => relocate(path, &solution_target),
        None => FileOutcome::Warning {
            path: solution_target,
            reason: "no solution file was written".to_string(),
        },
    };

    let source_dir = config.source_dir();
    let info_files = INFO_FILE_SUFFIXES
        .iter()
        .map(|suffix| {
            copy_best_effort(
                &source_dir.join(format!("{}{suffix}.info", config.dataset_name)),
                &dataset_dir.join(format!("{new_name}{suffix}.info")),
            )
        })
        .collect();

    let report = ConversionReport {
        dataset_dir,
        dataset_name: new_name,
        test: test_out,
        train: train_out,
        solution,
        info_files,
    };

    if config.write_report {
        let path = report.dataset_dir.join(REPORT_FILENAME);
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(
            file,
            &ReportFile {
                generated_at: chrono::Utc::now().to_rfc3339(),
                report: &report,
            },
        )?;
        log::debug!("Wrote {}", path.display());
    }

    log::info!(
        "Created dataset {} with {} test and {} train examples in {}",
        report.dataset_name,
        report.test.emitted,
        report.train.emitted,
        report.dataset_dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::TaskKind;
    use crate::loader::DatasetInfo;
    use crate::metadata::StorageFormat;
    use ndarray::{array, Array2};
    use std::collections::BTreeMap;

    fn toy() -> AutoMLDataset {
        AutoMLDataset {
            info: DatasetInfo {
                name: "toy".into(),
                task: TaskKind::BinaryClassification,
                format: StorageFormat::Dense,
                feat_num: Some(4),
                raw: BTreeMap::new(),
            },
            x_train: FeatureMatrix::Dense(Array2::from_elem((3, 4), 1.0)),
            y_train: array![[0.0], [1.0], [1.0]],
            x_valid: FeatureMatrix::Dense(Array2::from_elem((2, 4), 2.0)),
            y_valid: array![[0.0], [0.0]],
            x_test: FeatureMatrix::Dense(Array2::from_elem((2, 4), 3.0)),
            y_test: array![[1.0], [0.0]],
        }
    }

    #[test]
    fn test_prepare_train_merges_and_normalizes() {
        let data = toy();
        let prepared = prepare_split(&data, SplitKind::Train, &ShapeSpec::default()).unwrap();
        assert_eq!(prepared.descriptor.sample_count, 5);
        assert_eq!(prepared.descriptor.output_dim, 2);
        assert!(prepared.used_default_shape);
        assert_eq!(prepared.labels.row(3).to_vec(), vec![1.0, 0.0]);
        assert!(matches!(prepared.features, Cow::Owned(_)));
    }

    #[test]
    fn test_prepare_test_borrows_features() {
        let data = toy();
        let prepared = prepare_split(&data, SplitKind::Test, &ShapeSpec::new(2, 1, 2, 1)).unwrap();
        assert!(matches!(prepared.features, Cow::Borrowed(_)));
        assert_eq!(prepared.descriptor.shape.sequence_size, 2);
        assert!(!prepared.used_default_shape);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_task() {
        let mut data = toy();
        data.info.task = TaskKind::parse("binary.clasification");
        let out = tempfile::TempDir::new().unwrap();
        let config = ConversionConfig::new(out.path(), out.path(), "toy").with_strict_task_kind(true);
        assert!(convert_dataset(&data, &config).unwrap_err().is_configuration());
        assert!(!config.dataset_dir().exists());
    }
}
