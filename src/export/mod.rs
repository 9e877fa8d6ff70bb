//! Dataset export.
//!
//! # Modules
//!
//! - **writer**: writes one split (records, sidecar metadata, solution file)
//! - **orchestrator**: converts a whole dataset, test split first
//!
//! # Output layout
//!
//! ```text
//! <output_dir>/<name>/
//! ├── <name>.solution
//! ├── <name>_public.info
//! ├── <name>_private.info
//! └── <name>.data/
//!     ├── test/
//!     │   ├── sample-<source>-test.tfrecord
//!     │   └── metadata.textproto
//!     └── train/
//!         ├── sample-<source>-train.tfrecord
//!         └── metadata.textproto
//! ```
//!
//! # Example
//!
//! ```ignore
//! use autodl_formatter::config::ConversionConfig;
//! use autodl_formatter::export::convert_dataset;
//! use autodl_formatter::loader::AutoMLDataset;
//!
//! let config = ConversionConfig::new("raw/automl", "formatted", "adult");
//! let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name)?;
//! let report = convert_dataset(&data, &config)?;
//! for warning in report.warnings() {
//!     eprintln!("{warning}");
//! }
//! ```

pub mod orchestrator;
pub mod writer;

pub use orchestrator::{convert_dataset, prepare_split, ConversionReport, PreparedSplit};
pub use writer::{record_file_name, write_solution, write_split, SplitOutput};

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of a best-effort file operation.
///
/// A failure never aborts the conversion; it leaves a gap in the output
/// that is reported here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Completed { from: PathBuf, to: PathBuf },
    Warning { path: PathBuf, reason: String },
}

impl FileOutcome {
    fn from_io<T>(from: &Path, to: &Path, action: &str, result: io::Result<T>) -> Self {
        match result {
            Ok(_) => {
                log::debug!("{action} {} -> {}", from.display(), to.display());
                FileOutcome::Completed {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                }
            }
            Err(e) => {
                let outcome = FileOutcome::Warning {
                    path: from.to_path_buf(),
                    reason: format!("unable to {action}: {e}"),
                };
                log::warn!("{outcome}");
                outcome
            }
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, FileOutcome::Warning { .. })
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Completed { from, to } => {
                write!(f, "{} -> {}", from.display(), to.display())
            }
            FileOutcome::Warning { path, reason } => {
                write!(f, "WARNING: {}: {reason}", path.display())
            }
        }
    }
}

/// Move `from` to `to`, reporting failure as a warning.
pub fn relocate(from: &Path, to: &Path) -> FileOutcome {
    FileOutcome::from_io(from, to, "move", fs::rename(from, to))
}

/// Copy `from` to `to`, reporting failure as a warning.
pub fn copy_best_effort(from: &Path, to: &Path) -> FileOutcome {
    FileOutcome::from_io(from, to, "copy", fs::copy(from, to))
}
