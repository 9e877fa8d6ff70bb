//! Dataset descriptors and the `metadata.textproto` sidecar.
//!
//! A [`DatasetDescriptor`] is a pure aggregate of what is known about one
//! split: its name, count, output dimensionality, tensor shape and storage
//! density. The sidecar written next to each record file is rendered from
//! it and always rewritten in full.

use crate::error::{ConvertError, Result};
use crate::shape::TensorShape;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the sidecar descriptor in every split directory.
pub const METADATA_FILENAME: &str = "metadata.textproto";

// ============================================================================
// Split and storage kinds
// ============================================================================

/// Dataset partition. `Train` always includes the validation rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Test,
}

impl SplitKind {
    /// Parse `"train"` or `"test"`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "train" => Ok(SplitKind::Train),
            "test" => Ok(SplitKind::Test),
            other => Err(ConvertError::config(format!(
                "wrong split kind '{other}', should be 'train' or 'test'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Test => "test",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, SplitKind::Test)
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature storage density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    Dense,
    Sparse,
}

impl StorageFormat {
    /// Parse an AutoML `format` value. `sparse_binary` is sparse storage.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            "dense" => Ok(StorageFormat::Dense),
            "sparse" | "sparse_binary" => Ok(StorageFormat::Sparse),
            other => Err(ConvertError::config(format!(
                "unknown storage format '{other}', expected dense, sparse or sparse_binary"
            ))),
        }
    }

    /// Value of the sidecar's `format` field.
    pub fn as_textproto(&self) -> &'static str {
        match self {
            StorageFormat::Dense => "DENSE",
            StorageFormat::Sparse => "SPARSE",
        }
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Immutable description of one split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub dataset_name: String,
    pub sample_count: usize,
    pub output_dim: usize,
    pub split: SplitKind,
    pub shape: TensorShape,
    pub format: StorageFormat,
}

/// Assemble a descriptor. No I/O, no validation: the shape is expected to
/// come from [`crate::shape::resolve`], and for [`SplitKind::Train`] the
/// `sample_count` must already include the merged validation rows.
pub fn build(
    split: SplitKind,
    shape: TensorShape,
    label_width: usize,
    sample_count: usize,
    dataset_name: &str,
    format: StorageFormat,
) -> DatasetDescriptor {
    DatasetDescriptor {
        dataset_name: dataset_name.to_string(),
        sample_count,
        output_dim: label_width,
        split,
        shape,
        format,
    }
}

impl DatasetDescriptor {
    /// Copy of this descriptor with a different sample count.
    pub fn with_sample_count(&self, sample_count: usize) -> Self {
        build(
            self.split,
            self.shape,
            self.output_dim,
            sample_count,
            &self.dataset_name,
            self.format,
        )
    }

    /// Render the sidecar text.
    pub fn to_textproto(&self) -> String {
        format!(
            "is_sequence: false
sample_count: {sample_count}
sequence_size: {sequence_size}
output_dim: {output_dim}
matrix_spec {{
  col_count: {col_count}
  row_count: {row_count}
  num_channels: {num_channels}
  is_sequence_col: false
  is_sequence_row: false
  has_locality_col: false
  has_locality_row: false
  format: {format}
}}
",
            sample_count = self.sample_count,
            sequence_size = self.shape.sequence_size,
            output_dim = self.output_dim,
            col_count = self.shape.col_count,
            row_count = self.shape.row_count,
            num_channels = self.shape.num_channels,
            format = self.format.as_textproto(),
        )
    }

    /// Write the sidecar into `dir`, replacing any previous one.
    pub fn write_sidecar(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(METADATA_FILENAME);
        fs::write(&path, self.to_textproto())?;
        log::debug!("Wrote {} ({} samples)", path.display(), self.sample_count);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor() -> DatasetDescriptor {
        build(
            SplitKind::Train,
            TensorShape::new(2, 3, 4, 1),
            2,
            100,
            "adult",
            StorageFormat::Dense,
        )
    }

    #[test]
    fn test_split_kind_parse() {
        assert_eq!(SplitKind::parse("train").unwrap(), SplitKind::Train);
        assert_eq!(SplitKind::parse("test").unwrap(), SplitKind::Test);
        assert!(SplitKind::parse("valid").unwrap_err().is_configuration());
    }

    #[test]
    fn test_storage_format_parse() {
        assert_eq!(StorageFormat::parse("dense").unwrap(), StorageFormat::Dense);
        assert_eq!(
            StorageFormat::parse("sparse_binary").unwrap(),
            StorageFormat::Sparse
        );
        assert!(StorageFormat::parse("csv").is_err());
    }

    #[test]
    fn test_textproto_layout() {
        let text = descriptor().to_textproto();
        let expected = "is_sequence: false
sample_count: 100
sequence_size: 2
output_dim: 2
matrix_spec {
  col_count: 4
  row_count: 3
  num_channels: 1
  is_sequence_col: false
  is_sequence_row: false
  has_locality_col: false
  has_locality_row: false
  format: DENSE
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_with_sample_count_keeps_everything_else() {
        let d = descriptor();
        let truncated = d.with_sample_count(10);
        assert_eq!(truncated.sample_count, 10);
        assert_eq!(truncated.shape, d.shape);
        assert_eq!(truncated.output_dim, d.output_dim);
    }

    #[test]
    fn test_write_sidecar_overwrites() {
        let dir = TempDir::new().unwrap();
        descriptor().write_sidecar(dir.path()).unwrap();

        let sparse = build(
            SplitKind::Test,
            TensorShape::flat(9),
            3,
            5,
            "adult",
            StorageFormat::Sparse,
        );
        let path = sparse.write_sidecar(dir.path()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, sparse.to_textproto());
        assert!(!text.contains("sample_count: 100"));
        assert!(text.contains("format: SPARSE"));
    }
}
