//! Tensor shape resolution.
//!
//! Every example is a flat feature vector that the consumer reshapes into a
//! `(T, H, W, C)` tensor:
//!
//! | Axis | Field | Meaning |
//! |------|-------|---------|
//! | T | `sequence_size` | frames (time axis) |
//! | H | `row_count` | rows per frame |
//! | W | `col_count` | columns per frame |
//! | C | `num_channels` | channels |
//!
//! [`resolve`] is the single gate that checks a declared shape against the
//! observed flat width. Nothing downstream re-checks it.
//!
//! # Example
//!
//! ```
//! use autodl_formatter::shape::{resolve, ShapeSpec, TensorShape};
//!
//! let resolved = resolve(&ShapeSpec::default(), 24).unwrap();
//! assert!(resolved.used_default);
//! assert_eq!(resolved.shape, TensorShape::new(1, 1, 24, 1));
//!
//! let declared = ShapeSpec::new(2, 3, 4, 1);
//! assert!(resolve(&declared, 24).is_ok());
//! assert!(resolve(&declared, 25).is_err());
//! ```

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Shapes
// ============================================================================

/// Fully resolved `(sequence, rows, cols, channels)` tensor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorShape {
    pub sequence_size: usize,
    pub row_count: usize,
    pub col_count: usize,
    pub num_channels: usize,
}

impl TensorShape {
    pub fn new(sequence_size: usize, row_count: usize, col_count: usize, num_channels: usize) -> Self {
        Self {
            sequence_size,
            row_count,
            col_count,
            num_channels,
        }
    }

    /// Flat single-frame, single-channel shape for `flat_width` features.
    pub fn flat(flat_width: usize) -> Self {
        Self::new(1, 1, flat_width, 1)
    }

    /// Total number of entries, or `None` on overflow.
    pub fn num_entries(&self) -> Option<usize> {
        self.sequence_size
            .checked_mul(self.row_count)?
            .checked_mul(self.col_count)?
            .checked_mul(self.num_channels)
    }

    /// Number of features in one frame.
    pub fn frame_len(&self) -> usize {
        self.row_count * self.col_count * self.num_channels
    }

    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (
            self.sequence_size,
            self.row_count,
            self.col_count,
            self.num_channels,
        )
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.sequence_size, self.row_count, self.col_count, self.num_channels
        )
    }
}

/// Shape as declared by the user. Either all four components are set or
/// none is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_channels: Option<usize>,
}

impl ShapeSpec {
    /// A fully declared shape.
    pub fn new(sequence_size: usize, row_count: usize, col_count: usize, num_channels: usize) -> Self {
        Self {
            sequence_size: Some(sequence_size),
            row_count: Some(row_count),
            col_count: Some(col_count),
            num_channels: Some(num_channels),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Names of the components that are not set.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    fn fields(&self) -> [(&'static str, Option<usize>); 4] {
        [
            ("sequence_size", self.sequence_size),
            ("row_count", self.row_count),
            ("col_count", self.col_count),
            ("num_channels", self.num_channels),
        ]
    }

    /// Structural checks that do not need the data: no partial
    /// specification, no zero components.
    pub fn validate(&self) -> Result<()> {
        if self.is_unset() {
            return Ok(());
        }
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ConvertError::config(format!(
                "some shape info is not specified: missing {}. \
                 Specify all of sequence_size, row_count, col_count, num_channels or none of them",
                missing.join(", ")
            )));
        }
        let zero: Vec<&str> = self
            .fields()
            .iter()
            .filter(|(_, v)| *v == Some(0))
            .map(|(name, _)| *name)
            .collect();
        if !zero.is_empty() {
            return Err(ConvertError::config(format!(
                "shape components must be positive: {} = 0",
                zero.join(", ")
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedShape {
    pub shape: TensorShape,
    /// `true` when no shape was declared and the flat default was adopted.
    pub used_default: bool,
}

/// Resolve a declared shape against the observed flat feature width.
///
/// # Errors
///
/// - [`ConvertError::Configuration`] if the declaration is partial or has a
///   zero component.
/// - [`ConvertError::ShapeMismatch`] if the product of the components differs
///   from `flat_width`.
pub fn resolve(spec: &ShapeSpec, flat_width: usize) -> Result<ResolvedShape> {
    spec.validate()?;

    let (Some(t), Some(h), Some(w), Some(c)) = (
        spec.sequence_size,
        spec.row_count,
        spec.col_count,
        spec.num_channels,
    ) else {
        let shape = TensorShape::flat(flat_width);
        log::warn!("No specification on example shape is given, adopting default shape {shape}");
        return Ok(ResolvedShape {
            shape,
            used_default: true,
        });
    };

    let shape = TensorShape::new(t, h, w, c);
    let declared = shape
        .num_entries()
        .ok_or_else(|| ConvertError::config(format!("shape {shape} overflows")))?;
    if declared != flat_width {
        return Err(ConvertError::ShapeMismatch {
            shape: shape.as_tuple(),
            declared,
            observed: flat_width,
        });
    }
    Ok(ResolvedShape {
        shape,
        used_default: false,
    })
}
