//! Split writer.
//!
//! Encodes every row of one split into a TFRecord file, then writes the
//! `metadata.textproto` sidecar describing what was actually emitted. The
//! test split additionally gets a plain-text solution file holding the
//! withheld labels.

use crate::error::{ConvertError, Result};
use crate::matrix::{check_row_correspondence, FeatureMatrix, LabelMatrix};
use crate::metadata::{DatasetDescriptor, SplitKind};
use crate::record::{self, RecordWriter};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What [`write_split`] produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitOutput {
    /// Descriptor with `sample_count` equal to `emitted`.
    pub descriptor: DatasetDescriptor,
    pub emitted: usize,
    pub record_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Solution file, test split only.
    pub solution_path: Option<PathBuf>,
}

/// Record file name for a split, e.g. `sample-adult-train.tfrecord`.
pub fn record_file_name(dataset_name: &str, split: SplitKind) -> String {
    format!("sample-{dataset_name}-{split}.tfrecord")
}

/// Write `labels` as text: one row per line, values with one decimal,
/// separated by single spaces.
pub fn write_solution(path: &Path, labels: &LabelMatrix) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for row in labels.rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.1}")).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

/// Write one split to `filepath`.
///
/// Rows are encoded in matrix order with identifiers starting at
/// `id_offset`; at most `max_examples` records are written. The sidecar is
/// written after the record file is closed and reports the emitted count.
/// For the test split the full label matrix is first saved as
/// `<dataset_name>.solution` next to `filepath`.
///
/// `features` and `labels` must already be merged and normalized, and
/// `descriptor.shape` must come from [`crate::shape::resolve`].
///
/// # Errors
///
/// Fails before any file is touched if the matrices do not correspond
/// row-for-row, if their density differs from the descriptor's, or if
/// sparse features are combined with `sequence_size != 1`.
pub fn write_split(
    filepath: &Path,
    descriptor: &DatasetDescriptor,
    features: &FeatureMatrix,
    labels: &LabelMatrix,
    id_offset: usize,
    max_examples: Option<usize>,
) -> Result<SplitOutput> {
    let split = descriptor.split;
    let sequence_size = descriptor.shape.sequence_size;

    check_row_correspondence(features, labels, split.as_str())?;
    if features.format() != descriptor.format {
        return Err(ConvertError::InconsistentData(format!(
            "{split} features are {:?} but the dataset is declared {:?}",
            features.format(),
            descriptor.format
        )));
    }
    if features.is_sparse() && sequence_size != 1 {
        return Err(record::sparse_sequence_error(sequence_size));
    }

    let dir = filepath.parent().unwrap_or_else(|| Path::new("."));

    let solution_path = if split.is_test() {
        let path = dir.join(format!("{}.solution", descriptor.dataset_name));
        log::debug!("Writing solutions to {}", path.display());
        write_solution(&path, labels)?;
        Some(path)
    } else {
        None
    };

    let limit = max_examples.unwrap_or(usize::MAX);
    let emitted = {
        let mut writer = RecordWriter::create(filepath)?;
        for (index, (row, label_row)) in features.rows().zip(labels.rows()).take(limit).enumerate() {
            let record = record::encode(
                row,
                label_row,
                index,
                id_offset,
                split.is_test(),
                sequence_size,
            )?;
            writer.write_record(&record.to_bytes())?;
        }
        let emitted = writer.records_written();
        writer.into_inner()?;
        emitted
    };

    let final_descriptor = descriptor.with_sample_count(emitted);
    let metadata_path = final_descriptor.write_sidecar(dir)?;

    log::info!(
        "Wrote {emitted} {split} records (of {}) to {}",
        features.n_rows(),
        filepath.display()
    );

    Ok(SplitOutput {
        descriptor: final_descriptor,
        emitted,
        record_path: filepath.to_path_buf(),
        metadata_path,
        solution_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CsrMatrix;
    use crate::metadata::{build, StorageFormat};
    use crate::record::{FeaturePayload, Record, RecordReader};
    use crate::shape::TensorShape;
    use ndarray::array;
    use std::fs;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<Record> {
        RecordReader::open(path)
            .unwrap()
            .map(|bytes| Record::from_bytes(&bytes.unwrap()).unwrap())
            .collect()
    }

    fn dense_descriptor(split: SplitKind, n: usize) -> DatasetDescriptor {
        build(split, TensorShape::flat(2), 2, n, "toy", StorageFormat::Dense)
    }

    #[test]
    fn test_solution_formatting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toy.solution");
        write_solution(&path, &array![[1.0, 0.0], [0.26, 0.74]]).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "1.0 0.0\n0.3 0.7\n");
    }

    #[test]
    fn test_write_train_split() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(record_file_name("toy", SplitKind::Train));
        let features = FeatureMatrix::Dense(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let labels = array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];

        let out = write_split(
            &path,
            &dense_descriptor(SplitKind::Train, 3),
            &features,
            &labels,
            10,
            None,
        )
        .unwrap();
        assert_eq!(out.emitted, 3);
        assert!(out.solution_path.is_none());

        let records = read_records(&path);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(records[0].label_index, vec![0]);
        assert_eq!(records[2].label_index, vec![1]);
        assert_eq!(
            records[1].payload,
            FeaturePayload::Dense {
                frames: vec![vec![3.0, 4.0]]
            }
        );
    }

    #[test]
    fn test_truncation_updates_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample-toy-train.tfrecord");
        let features = FeatureMatrix::Dense(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let labels = array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];

        let out = write_split(
            &path,
            &dense_descriptor(SplitKind::Train, 3),
            &features,
            &labels,
            0,
            Some(2),
        )
        .unwrap();
        assert_eq!(out.emitted, 2);
        assert_eq!(read_records(&path).len(), 2);
        let sidecar = fs::read_to_string(&out.metadata_path).unwrap();
        assert!(sidecar.contains("sample_count: 2\n"));
    }

    #[test]
    fn test_test_split_writes_solution_and_hides_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample-toy-test.tfrecord");
        let features = FeatureMatrix::Dense(array![[1.0, 2.0], [3.0, 4.0]]);
        let labels = array![[1.0, 0.0], [0.0, 1.0]];

        let out = write_split(
            &path,
            &dense_descriptor(SplitKind::Test, 2),
            &features,
            &labels,
            0,
            Some(1),
        )
        .unwrap();
        let solution = out.solution_path.unwrap();
        assert_eq!(solution, dir.path().join("toy.solution"));
        // the solution keeps every row even when records are truncated
        assert_eq!(fs::read_to_string(solution).unwrap(), "1.0 0.0\n0.0 1.0\n");

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        assert!(records[0].label_index.is_empty());
        assert!(records[0].label_score.is_empty());
    }

    #[test]
    fn test_sparse_sequence_rejected_before_io() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample-toy-test.tfrecord");
        let features = FeatureMatrix::Sparse(
            CsrMatrix::from_rows(4, vec![vec![(0, 1.0)], vec![(3, 2.0)]]).unwrap(),
        );
        let descriptor = build(
            SplitKind::Test,
            TensorShape::new(2, 1, 2, 1),
            1,
            2,
            "toy",
            StorageFormat::Sparse,
        );

        let err = write_split(&path, &descriptor, &features, &array![[1.0], [0.0]], 0, None)
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_row_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample-toy-train.tfrecord");
        let features = FeatureMatrix::Dense(array![[1.0, 2.0]]);
        let err = write_split(
            &path,
            &dense_descriptor(SplitKind::Train, 1),
            &features,
            &array![[1.0, 0.0], [0.0, 1.0]],
            0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::InconsistentData(_)));
        assert!(!path.exists());
    }
}
