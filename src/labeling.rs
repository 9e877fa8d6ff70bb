//! Label normalization.
//!
//! Source datasets encode labels differently depending on the task. The
//! target format only knows one representation: a multi-column indicator
//! matrix with one column per class. This module maps every task kind onto
//! that representation.
//!
//! | Task kind | Source labels | Normalized |
//! |-----------|---------------|------------|
//! | `regression` | one scalar per example | `[not-above-median, above-median]` |
//! | `binary.classification` | one 0/1 scalar per example | `[1 - label, label]` |
//! | `multilabel.classification` | already multi-column | unchanged |
//! | `multiclass.classification` | already one-hot | unchanged |
//! | anything else | ? | unchanged (see [`TaskKind::Other`]) |
//!
//! # Example
//!
//! ```
//! use autodl_formatter::labeling::TaskKind;
//! use ndarray::array;
//!
//! let labels = array![[0.0], [1.0], [1.0], [0.0]];
//! let normalized = TaskKind::BinaryClassification.normalize(&labels);
//! assert_eq!(normalized, array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0]]);
//! ```

use crate::error::{ConvertError, Result};
use crate::matrix::LabelMatrix;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Task Kind
// ============================================================================

/// Learning task declared by the source dataset.
///
/// Each variant owns its normalization rule, see [`TaskKind::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskKind {
    /// Single real-valued target, binarized at the median.
    Regression,

    /// Single 0/1 target, expanded to two indicator columns.
    BinaryClassification,

    /// One-hot class matrix, passed through.
    MulticlassClassification,

    /// Multi-column indicator matrix, passed through.
    MultilabelClassification,

    /// Unrecognized task name. Labels pass through unchanged, which may
    /// hide a typo in the dataset description; [`TaskKind::parse_strict`]
    /// rejects these instead.
    Other(String),
}

impl TaskKind {
    /// Parse a task name as written in AutoML info files.
    ///
    /// Never fails: unknown names become [`TaskKind::Other`].
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "regression" => TaskKind::Regression,
            "binary.classification" => TaskKind::BinaryClassification,
            "multiclass.classification" => TaskKind::MulticlassClassification,
            "multilabel.classification" => TaskKind::MultilabelClassification,
            other => TaskKind::Other(other.to_string()),
        }
    }

    /// Parse a task name, rejecting unrecognized names.
    pub fn parse_strict(name: &str) -> Result<Self> {
        let kind = Self::parse(name);
        kind.ensure_recognized()?;
        Ok(kind)
    }

    /// Fail with a configuration error if this is [`TaskKind::Other`].
    pub fn ensure_recognized(&self) -> Result<()> {
        match self {
            TaskKind::Other(name) => Err(ConvertError::config(format!(
                "unrecognized task kind '{name}' (expected one of regression, \
                 binary.classification, multiclass.classification, multilabel.classification)"
            ))),
            _ => Ok(()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, TaskKind::Other(_))
    }

    /// Canonical name.
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Regression => "regression",
            TaskKind::BinaryClassification => "binary.classification",
            TaskKind::MulticlassClassification => "multiclass.classification",
            TaskKind::MultilabelClassification => "multilabel.classification",
            TaskKind::Other(name) => name,
        }
    }

    /// Normalize `labels` into the indicator representation for this task.
    ///
    /// Scalar task kinds (regression, binary) expect a single label column;
    /// any other width is passed through unchanged.
    pub fn normalize(&self, labels: &LabelMatrix) -> LabelMatrix {
        match self {
            TaskKind::Regression | TaskKind::BinaryClassification if labels.ncols() != 1 => {
                log::warn!(
                    "{} labels have {} columns, expected 1; passing through unchanged",
                    self,
                    labels.ncols()
                );
                labels.clone()
            }
            TaskKind::Regression => regression_to_indicator(labels.column(0)),
            TaskKind::BinaryClassification => binary_to_indicator(labels.column(0)),
            TaskKind::MulticlassClassification | TaskKind::MultilabelClassification => {
                labels.clone()
            }
            TaskKind::Other(name) => {
                log::warn!("unrecognized task kind '{name}', labels passed through unchanged");
                labels.clone()
            }
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TaskKind {
    fn from(name: String) -> Self {
        TaskKind::parse(&name)
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

// ============================================================================
// Normalization rules
// ============================================================================

/// Normalize labels for `task`. See [`TaskKind::normalize`].
pub fn normalize(labels: &LabelMatrix, task: &TaskKind) -> LabelMatrix {
    task.normalize(labels)
}

/// Expand 0/1 labels into `[1 - label, label]`.
pub fn binary_to_indicator(labels: ArrayView1<'_, f64>) -> LabelMatrix {
    let mut out = Array2::zeros((labels.len(), 2));
    for (mut row, &label) in out.axis_iter_mut(Axis(0)).zip(labels.iter()) {
        row[0] = 1.0 - label;
        row[1] = label;
    }
    out
}

/// Binarize real-valued labels at their median.
///
/// Values strictly above the median map to `[0, 1]`; values equal to or
/// below it map to `[1, 0]`.
pub fn regression_to_indicator(labels: ArrayView1<'_, f64>) -> LabelMatrix {
    let threshold = median(labels);
    let above = labels.mapv(|v| if v > threshold { 1.0 } else { 0.0 });
    binary_to_indicator(above.view())
}

/// Median of `values`; the mean of the two middle values for even lengths.
///
/// Returns NaN for empty input or when any value is NaN.
pub fn median(values: ArrayView1<'_, f64>) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
