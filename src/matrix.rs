//! Feature and label matrices.
//!
//! A [`FeatureMatrix`] is either dense (an `ndarray` matrix) or sparse
//! (compressed sparse rows). Density is a dataset-wide property: the two
//! kinds are never mixed, and stacking a dense matrix onto a sparse one is
//! rejected. Labels are always dense [`LabelMatrix`] values with one row per
//! example.

use crate::error::{ConvertError, Result};
use crate::metadata::StorageFormat;
use ndarray::{concatenate, Array2, ArrayView1, Axis};

/// Dense label matrix, one row per example, one column per class.
pub type LabelMatrix = Array2<f64>;

// ============================================================================
// Sparse storage
// ============================================================================

/// Compressed sparse row matrix.
///
/// Row `i` owns the entries `indptr[i]..indptr[i + 1]` of `indices` and
/// `data`; column indices inside a row are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// An empty matrix with `n_cols` columns and no rows.
    pub fn empty(n_cols: usize) -> Self {
        Self {
            n_cols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from per-row `(column, value)` entries.
    ///
    /// Entries within a row may arrive in any order; they are sorted by
    /// column. Duplicate columns and columns `>= n_cols` are rejected.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Result<Self> {
        let mut matrix = Self::empty(n_cols);
        for (row_idx, mut row) in rows.into_iter().enumerate() {
            row.sort_by_key(|&(col, _)| col);
            for pair in row.windows(2) {
                if pair[0].0 == pair[1].0 {
                    return Err(ConvertError::InconsistentData(format!(
                        "row {row_idx} has duplicate entries for column {}",
                        pair[0].0
                    )));
                }
            }
            if let Some(&(col, _)) = row.last() {
                if col >= n_cols {
                    return Err(ConvertError::InconsistentData(format!(
                        "row {row_idx} references column {col} but matrix has {n_cols} columns"
                    )));
                }
            }
            for (col, value) in row {
                matrix.indices.push(col);
                matrix.data.push(value);
            }
            matrix.indptr.push(matrix.indices.len());
        }
        Ok(matrix)
    }

    pub fn n_rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column positions and values stored for row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows()`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Append the rows of `other` below the rows of `self`.
    pub fn vstack(&self, other: &CsrMatrix) -> Result<CsrMatrix> {
        if self.n_cols != other.n_cols {
            return Err(ConvertError::InconsistentData(format!(
                "cannot stack sparse matrices with {} and {} columns",
                self.n_cols, other.n_cols
            )));
        }
        let offset = self.nnz();
        let mut indptr = self.indptr.clone();
        indptr.extend(other.indptr[1..].iter().map(|&p| p + offset));

        let mut indices = self.indices.clone();
        indices.extend_from_slice(&other.indices);
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);

        Ok(CsrMatrix {
            n_cols: self.n_cols,
            indptr,
            indices,
            data,
        })
    }
}

// ============================================================================
// Feature matrix
// ============================================================================

/// One feature row borrowed from a [`FeatureMatrix`].
#[derive(Debug, Clone, Copy)]
pub enum FeatureRow<'a> {
    Dense(ArrayView1<'a, f64>),
    Sparse {
        indices: &'a [usize],
        values: &'a [f64],
    },
}

impl FeatureRow<'_> {
    pub fn is_sparse(&self) -> bool {
        matches!(self, FeatureRow::Sparse { .. })
    }
}

/// Uniform-width feature matrix, dense or sparse.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMatrix {
    Dense(Array2<f64>),
    Sparse(CsrMatrix),
}

impl FeatureMatrix {
    /// An empty matrix of the given density and width.
    pub fn empty(format: StorageFormat, n_cols: usize) -> Self {
        match format {
            StorageFormat::Dense => FeatureMatrix::Dense(Array2::zeros((0, n_cols))),
            StorageFormat::Sparse => FeatureMatrix::Sparse(CsrMatrix::empty(n_cols)),
        }
    }

    pub fn n_rows(&self) -> usize {
        match self {
            FeatureMatrix::Dense(m) => m.nrows(),
            FeatureMatrix::Sparse(m) => m.n_rows(),
        }
    }

    /// Flat feature width shared by every row.
    pub fn n_cols(&self) -> usize {
        match self {
            FeatureMatrix::Dense(m) => m.ncols(),
            FeatureMatrix::Sparse(m) => m.n_cols(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, FeatureMatrix::Sparse(_))
    }

    pub fn format(&self) -> StorageFormat {
        match self {
            FeatureMatrix::Dense(_) => StorageFormat::Dense,
            FeatureMatrix::Sparse(_) => StorageFormat::Sparse,
        }
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows()`.
    pub fn row(&self, i: usize) -> FeatureRow<'_> {
        match self {
            FeatureMatrix::Dense(m) => FeatureRow::Dense(m.row(i)),
            FeatureMatrix::Sparse(m) => {
                let (indices, values) = m.row(i);
                FeatureRow::Sparse { indices, values }
            }
        }
    }

    /// Iterate rows in matrix order.
    pub fn rows(&self) -> impl Iterator<Item = FeatureRow<'_>> + '_ {
        (0..self.n_rows()).map(move |i| self.row(i))
    }

    /// Stack `other` below `self`, using sparse-aware stacking for CSR input.
    pub fn vstack(&self, other: &FeatureMatrix) -> Result<FeatureMatrix> {
        match (self, other) {
            (FeatureMatrix::Dense(a), FeatureMatrix::Dense(b)) => {
                if a.ncols() != b.ncols() {
                    return Err(ConvertError::InconsistentData(format!(
                        "cannot stack dense matrices with {} and {} columns",
                        a.ncols(),
                        b.ncols()
                    )));
                }
                let stacked = concatenate(Axis(0), &[a.view(), b.view()])
                    .map_err(|e| ConvertError::InconsistentData(e.to_string()))?;
                Ok(FeatureMatrix::Dense(stacked))
            }
            (FeatureMatrix::Sparse(a), FeatureMatrix::Sparse(b)) => {
                Ok(FeatureMatrix::Sparse(a.vstack(b)?))
            }
            _ => Err(ConvertError::InconsistentData(
                "cannot mix dense and sparse feature matrices within one dataset".to_string(),
            )),
        }
    }
}

// ============================================================================
// Train/validation merge
// ============================================================================

/// Check that a feature matrix and its label matrix correspond row-for-row.
pub fn check_row_correspondence(
    features: &FeatureMatrix,
    labels: &LabelMatrix,
    what: &str,
) -> Result<()> {
    if features.n_rows() != labels.nrows() {
        return Err(ConvertError::InconsistentData(format!(
            "{what}: {} feature rows but {} label rows",
            features.n_rows(),
            labels.nrows()
        )));
    }
    Ok(())
}

/// Merge the training and validation matrices into the `train` split.
///
/// Validation rows are appended after training rows. An empty validation
/// matrix leaves the training matrices unchanged.
pub fn merge_train_valid(
    x_train: &FeatureMatrix,
    y_train: &LabelMatrix,
    x_valid: &FeatureMatrix,
    y_valid: &LabelMatrix,
) -> Result<(FeatureMatrix, LabelMatrix)> {
    check_row_correspondence(x_train, y_train, "train")?;
    if x_valid.is_empty() {
        return Ok((x_train.clone(), y_train.clone()));
    }
    check_row_correspondence(x_valid, y_valid, "valid")?;

    if y_train.ncols() != y_valid.ncols() {
        return Err(ConvertError::InconsistentData(format!(
            "train labels have {} columns but valid labels have {}",
            y_train.ncols(),
            y_valid.ncols()
        )));
    }

    let features = x_train.vstack(x_valid)?;
    let labels = concatenate(Axis(0), &[y_train.view(), y_valid.view()])
        .map_err(|e| ConvertError::InconsistentData(e.to_string()))?;
    Ok((features, labels))
}
