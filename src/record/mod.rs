//! Record encoding.
//!
//! One [`Record`] per example: an identifier, a sparse label encoding and a
//! feature payload. Records are converted to `tf.train.SequenceExample`
//! messages ([`proto`]) and framed into TFRecord files ([`tfrecord`]).
//!
//! # Payload layout
//!
//! | Storage | Sequence size | Feature lists |
//! |---------|---------------|---------------|
//! | dense | 1 | `0_dense_input`: one frame, the whole row |
//! | dense | T > 1 | `0_dense_input`: T contiguous frames, row-major |
//! | sparse | 1 | `0_sparse_col_index`, `0_sparse_row_index`, `0_sparse_value`: one frame each |
//! | sparse | T > 1 | rejected |
//!
//! # Example
//!
//! ```
//! use autodl_formatter::matrix::FeatureRow;
//! use autodl_formatter::record::{encode, FeaturePayload};
//! use ndarray::array;
//!
//! let features = array![1.0, 2.0, 3.0, 4.0];
//! let labels = array![0.0, 1.0];
//! let record = encode(FeatureRow::Dense(features.view()), labels.view(), 0, 10, false, 2).unwrap();
//!
//! assert_eq!(record.id, 10);
//! assert_eq!(record.label_index, vec![1]);
//! assert_eq!(
//!     record.payload,
//!     FeaturePayload::Dense { frames: vec![vec![1.0, 2.0], vec![3.0, 4.0]] }
//! );
//! ```

pub mod proto;
pub mod tfrecord;

pub use proto::{Feature, SequenceExample};
pub use tfrecord::{RecordReader, RecordWriter};

use crate::error::{ConvertError, Result};
use crate::matrix::FeatureRow;
use ndarray::ArrayView1;
use serde::Serialize;

pub const KEY_ID: &str = "id";
pub const KEY_LABEL_INDEX: &str = "label_index";
pub const KEY_LABEL_SCORE: &str = "label_score";
pub const KEY_DENSE_INPUT: &str = "0_dense_input";
pub const KEY_SPARSE_COL_INDEX: &str = "0_sparse_col_index";
pub const KEY_SPARSE_ROW_INDEX: &str = "0_sparse_row_index";
pub const KEY_SPARSE_VALUE: &str = "0_sparse_value";

// ============================================================================
// Record
// ============================================================================

/// Feature payload of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "storage", rename_all = "lowercase")]
pub enum FeaturePayload {
    /// One float list per frame.
    Dense { frames: Vec<Vec<f32>> },

    /// A single frame as three parallel lists. `row_index` is all zeros:
    /// every example is one logical row.
    Sparse {
        col_index: Vec<i64>,
        row_index: Vec<i64>,
        values: Vec<f32>,
    },
}

/// One serialized example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    /// Active class indices, ascending. Empty for test records.
    pub label_index: Vec<i64>,
    /// Values of the active classes, same order as `label_index`.
    pub label_score: Vec<f32>,
    pub payload: FeaturePayload,
}

impl Record {
    pub fn to_sequence_example(&self) -> SequenceExample {
        let mut example = SequenceExample::default();
        example
            .context
            .insert(KEY_ID.to_string(), Feature::Int64List(vec![self.id]));
        example.context.insert(
            KEY_LABEL_INDEX.to_string(),
            Feature::Int64List(self.label_index.clone()),
        );
        example.context.insert(
            KEY_LABEL_SCORE.to_string(),
            Feature::FloatList(self.label_score.clone()),
        );

        match &self.payload {
            FeaturePayload::Dense { frames } => {
                example.feature_lists.insert(
                    KEY_DENSE_INPUT.to_string(),
                    frames.iter().cloned().map(Feature::FloatList).collect(),
                );
            }
            FeaturePayload::Sparse {
                col_index,
                row_index,
                values,
            } => {
                example.feature_lists.insert(
                    KEY_SPARSE_COL_INDEX.to_string(),
                    vec![Feature::Int64List(col_index.clone())],
                );
                example.feature_lists.insert(
                    KEY_SPARSE_ROW_INDEX.to_string(),
                    vec![Feature::Int64List(row_index.clone())],
                );
                example.feature_lists.insert(
                    KEY_SPARSE_VALUE.to_string(),
                    vec![Feature::FloatList(values.clone())],
                );
            }
        }
        example
    }

    /// Serialized `SequenceExample` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_sequence_example().encode_to_vec()
    }

    /// Map a decoded example back to a record.
    pub fn from_sequence_example(example: &SequenceExample) -> Result<Self> {
        let id = match context_int64(example, KEY_ID)? {
            [id] => *id,
            other => {
                return Err(ConvertError::CorruptRecord(format!(
                    "expected exactly one id, found {}",
                    other.len()
                )))
            }
        };
        let label_index = context_int64(example, KEY_LABEL_INDEX)?.to_vec();
        let label_score = example
            .context
            .get(KEY_LABEL_SCORE)
            .and_then(Feature::as_float_list)
            .ok_or_else(|| missing(KEY_LABEL_SCORE))?
            .to_vec();

        let payload = if let Some(frames) = example.feature_lists.get(KEY_DENSE_INPUT) {
            let frames = frames
                .iter()
                .map(|f| f.as_float_list().map(<[f32]>::to_vec))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| missing(KEY_DENSE_INPUT))?;
            FeaturePayload::Dense { frames }
        } else {
            FeaturePayload::Sparse {
                col_index: single_frame(example, KEY_SPARSE_COL_INDEX, Feature::as_int64_list)?,
                row_index: single_frame(example, KEY_SPARSE_ROW_INDEX, Feature::as_int64_list)?,
                values: single_frame(example, KEY_SPARSE_VALUE, Feature::as_float_list)?,
            }
        };

        Ok(Record {
            id,
            label_index,
            label_score,
            payload,
        })
    }

    /// Parse a serialized record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_sequence_example(&SequenceExample::decode(bytes)?)
    }
}

fn missing(key: &str) -> ConvertError {
    ConvertError::CorruptRecord(format!("missing or mistyped feature '{key}'"))
}

fn context_int64<'a>(example: &'a SequenceExample, key: &str) -> Result<&'a [i64]> {
    example
        .context
        .get(key)
        .and_then(Feature::as_int64_list)
        .ok_or_else(|| missing(key))
}

fn single_frame<T: Clone>(
    example: &SequenceExample,
    key: &str,
    get: impl Fn(&Feature) -> Option<&[T]>,
) -> Result<Vec<T>> {
    match example.feature_lists.get(key).map(Vec::as_slice) {
        Some([frame]) => get(frame).map(<[T]>::to_vec).ok_or_else(|| missing(key)),
        _ => Err(missing(key)),
    }
}

// ============================================================================
// Encoder
// ============================================================================

/// Sparse label encoding: nonzero columns in ascending order with their
/// values.
pub fn sparse_label(label_row: ArrayView1<'_, f64>) -> (Vec<i64>, Vec<f32>) {
    label_row
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value != 0.0)
        .map(|(index, &value)| (index as i64, value as f32))
        .unzip()
}

/// Build the record for one example.
///
/// The identifier is `example_index + id_offset`. Test records carry empty
/// label lists. `sequence_size` must come from a resolved shape.
///
/// # Errors
///
/// [`ConvertError::Configuration`] for a sparse row with `sequence_size != 1`,
/// for an empty dense row with `sequence_size > 1`, or for
/// `sequence_size == 0`.
pub fn encode(
    feature_row: FeatureRow<'_>,
    label_row: ArrayView1<'_, f64>,
    example_index: usize,
    id_offset: usize,
    is_test: bool,
    sequence_size: usize,
) -> Result<Record> {
    if sequence_size == 0 {
        return Err(ConvertError::config("sequence_size must be at least 1"));
    }

    let (label_index, label_score) = if is_test {
        (Vec::new(), Vec::new())
    } else {
        sparse_label(label_row)
    };

    let payload = match feature_row {
        FeatureRow::Sparse { indices, values } => {
            if sequence_size != 1 {
                return Err(sparse_sequence_error(sequence_size));
            }
            FeaturePayload::Sparse {
                col_index: indices.iter().map(|&i| i as i64).collect(),
                row_index: vec![0; indices.len()],
                values: values.iter().map(|&v| v as f32).collect(),
            }
        }
        FeatureRow::Dense(row) => {
            let flat: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let frames = if sequence_size == 1 {
                vec![flat]
            } else {
                if flat.is_empty() {
                    return Err(ConvertError::config(format!(
                        "cannot split an empty feature row into {sequence_size} frames"
                    )));
                }
                if flat.len() % sequence_size != 0 {
                    return Err(ConvertError::InconsistentData(format!(
                        "row of {} features cannot be split into {sequence_size} frames",
                        flat.len()
                    )));
                }
                flat.chunks_exact(flat.len() / sequence_size)
                    .map(<[f32]>::to_vec)
                    .collect()
            };
            FeaturePayload::Dense { frames }
        }
    };

    Ok(Record {
        id: (example_index + id_offset) as i64,
        label_index,
        label_score,
        payload,
    })
}

/// Error for the unsupported sparse + sequence combination.
pub fn sparse_sequence_error(sequence_size: usize) -> ConvertError {
    ConvertError::config(format!(
        "sparse storage only supports sequence_size = 1, got {sequence_size}"
    ))
}
