//! AutoML dataset loader.
//!
//! Reads a source dataset laid out as
//!
//! ```text
//! <input_dir>/<name>/
//! ├── <name>_public.info      (optional)
//! ├── <name>_private.info     (optional, only propagated)
//! ├── <name>_train.data
//! ├── <name>_train.solution
//! ├── <name>_valid.data       (optional, may be empty)
//! ├── <name>_valid.solution   (optional, may be empty)
//! ├── <name>_test.data
//! └── <name>_test.solution
//! ```
//!
//! `.data` files hold one example per line. Dense files contain
//! whitespace-separated numbers; sparse files contain `column:value` tokens
//! with 1-based columns, or bare 1-based columns for `sparse_binary` data.
//! `.solution` files hold one whitespace-separated label row per line.

use crate::error::{ConvertError, Result};
use crate::labeling::TaskKind;
use crate::matrix::{CsrMatrix, FeatureMatrix, LabelMatrix};
use crate::metadata::StorageFormat;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

// ============================================================================
// Dataset info
// ============================================================================

/// Dataset-level facts from `<name>_public.info`, or inferred from the data.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    /// Dataset name as declared in the info file.
    pub name: String,
    pub task: TaskKind,
    pub format: StorageFormat,
    /// Declared feature count, if any.
    pub feat_num: Option<usize>,
    /// Every `key = value` pair of the info file.
    pub raw: BTreeMap<String, String>,
}

/// Parse `key = value` lines. Quotes around values are stripped; blank
/// lines and `#` comments are ignored.
pub fn parse_info(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

// ============================================================================
// Dataset
// ============================================================================

/// All matrices of one source dataset. The converter only reads them.
#[derive(Debug, Clone)]
pub struct AutoMLDataset {
    pub info: DatasetInfo,
    pub x_train: FeatureMatrix,
    pub y_train: LabelMatrix,
    pub x_valid: FeatureMatrix,
    pub y_valid: LabelMatrix,
    pub x_test: FeatureMatrix,
    pub y_test: LabelMatrix,
}

impl AutoMLDataset {
    /// Load `<input_dir>/<dataset_name>/`.
    pub fn load<P: AsRef<Path>>(input_dir: P, dataset_name: &str) -> Result<Self> {
        let dir = input_dir.as_ref().join(dataset_name);
        let path = |suffix: &str| dir.join(format!("{dataset_name}_{suffix}"));

        let info_path = path("public.info");
        let raw_info = if info_path.is_file() {
            parse_info(&fs::read_to_string(&info_path)?)
        } else {
            log::warn!(
                "{} not found, inferring dataset info from data",
                info_path.display()
            );
            BTreeMap::new()
        };

        let train_rows = read_token_rows(&required(path("train.data"))?)?;
        let valid_rows = read_optional_token_rows(&path("valid.data"))?;
        let test_rows = read_token_rows(&required(path("test.data"))?)?;

        let format = match raw_info.get("format") {
            Some(f) => StorageFormat::parse(f)?,
            None => infer_format(&train_rows),
        };

        let y_train = read_labels(&required(path("train.solution"))?)?;
        let y_test = read_labels(&required(path("test.solution"))?)?;
        let y_valid = match read_optional_token_rows(&path("valid.solution"))? {
            Some(rows) => labels_from_rows(&path("valid.solution"), rows)?,
            None => Array2::zeros((0, 0)),
        };
        let y_valid = if y_valid.nrows() == 0 {
            Array2::zeros((0, y_train.ncols()))
        } else {
            y_valid
        };

        let feat_num = raw_info
            .get("feat_num")
            .map(|v| parse_usize(&info_path, "feat_num", v))
            .transpose()?;

        let (x_train, x_valid, x_test) = build_features(
            (&path("train.data"), train_rows),
            (&path("valid.data"), valid_rows),
            (&path("test.data"), test_rows),
            format,
            feat_num,
        )?;

        let task = match raw_info.get("task") {
            Some(t) => TaskKind::parse(t),
            None => infer_task(&y_train),
        };
        let name = raw_info
            .get("name")
            .cloned()
            .unwrap_or_else(|| dataset_name.to_string());

        log::info!(
            "Loaded {name}: task={task}, format={format:?}, train={}, valid={}, test={}, features={}",
            x_train.n_rows(),
            x_valid.n_rows(),
            x_test.n_rows(),
            x_train.n_cols()
        );

        Ok(Self {
            info: DatasetInfo {
                name,
                task,
                format,
                feat_num,
                raw: raw_info,
            },
            x_train,
            y_train,
            x_valid,
            y_valid,
            x_test,
            y_test,
        })
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

/// Whitespace-separated tokens of one line, with its 1-based line number.
type TokenRow = (usize, Vec<String>);

fn required(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConvertError::MissingFile(path))
    }
}

fn read_token_rows(path: &Path) -> Result<Vec<TokenRow>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        rows.push((
            idx + 1,
            line.split_whitespace().map(str::to_string).collect(),
        ));
    }
    Ok(rows)
}

fn read_optional_token_rows(path: &Path) -> Result<Option<Vec<TokenRow>>> {
    if path.is_file() {
        read_token_rows(path).map(Some)
    } else {
        Ok(None)
    }
}

fn parse_error(path: &Path, line: usize, message: String) -> ConvertError {
    ConvertError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    }
}

fn parse_usize(path: &Path, key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| parse_error(path, 0, format!("{key} = '{value}' is not a count")))
}

fn parse_f64(path: &Path, line: usize, token: &str) -> Result<f64> {
    token
        .parse()
        .map_err(|_| parse_error(path, line, format!("'{token}' is not a number")))
}

/// Rows of whitespace-separated numbers; blank lines are skipped.
fn dense_from_rows(path: &Path, rows: Vec<TokenRow>, width_hint: Option<usize>) -> Result<Array2<f64>> {
    let mut width = None;
    let mut n_rows = 0;
    let mut flat = Vec::new();
    for (line, tokens) in rows.into_iter().filter(|(_, t)| !t.is_empty()) {
        match width {
            None => width = Some(tokens.len()),
            Some(w) if w != tokens.len() => {
                return Err(parse_error(
                    path,
                    line,
                    format!("expected {w} values, found {}", tokens.len()),
                ))
            }
            Some(_) => {}
        }
        for token in &tokens {
            flat.push(parse_f64(path, line, token)?);
        }
        n_rows += 1;
    }
    let width = width.or(width_hint).unwrap_or(0);
    Array2::from_shape_vec((n_rows, width), flat)
        .map_err(|e| parse_error(path, 0, e.to_string()))
}

fn labels_from_rows(path: &Path, rows: Vec<TokenRow>) -> Result<LabelMatrix> {
    dense_from_rows(path, rows, None)
}

fn read_labels(path: &Path) -> Result<LabelMatrix> {
    labels_from_rows(path, read_token_rows(path)?)
}

/// Sparse rows: `col:value` or bare `col` tokens, 1-based columns.
fn sparse_entries(path: &Path, rows: Vec<TokenRow>) -> Result<Vec<Vec<(usize, f64)>>> {
    rows.into_iter()
        .map(|(line, tokens)| {
            tokens
                .iter()
                .map(|token| {
                    let (col, value) = match token.split_once(':') {
                        Some((col, value)) => (col, parse_f64(path, line, value)?),
                        None => (token.as_str(), 1.0),
                    };
                    let col: usize = col.parse().map_err(|_| {
                        parse_error(path, line, format!("'{token}' has an invalid column"))
                    })?;
                    if col == 0 {
                        return Err(parse_error(
                            path,
                            line,
                            format!("'{token}': sparse columns are 1-based"),
                        ));
                    }
                    Ok((col - 1, value))
                })
                .collect()
        })
        .collect()
}

fn build_features(
    train: (&Path, Vec<TokenRow>),
    valid: (&Path, Option<Vec<TokenRow>>),
    test: (&Path, Vec<TokenRow>),
    format: StorageFormat,
    feat_num: Option<usize>,
) -> Result<(FeatureMatrix, FeatureMatrix, FeatureMatrix)> {
    match format {
        StorageFormat::Dense => {
            let x_train = dense_from_rows(train.0, train.1, feat_num)?;
            let width = x_train.ncols();
            if let Some(declared) = feat_num {
                if declared != width {
                    return Err(ConvertError::InconsistentData(format!(
                        "feat_num = {declared} but training rows have {width} values"
                    )));
                }
            }
            let x_valid = match valid.1 {
                Some(rows) => dense_from_rows(valid.0, rows, Some(width))?,
                None => Array2::zeros((0, width)),
            };
            let x_test = dense_from_rows(test.0, test.1, Some(width))?;
            for (name, m) in [("valid", &x_valid), ("test", &x_test)] {
                if m.ncols() != width {
                    return Err(ConvertError::InconsistentData(format!(
                        "{name} features have {} columns, train has {width}",
                        m.ncols()
                    )));
                }
            }
            Ok((
                FeatureMatrix::Dense(x_train),
                FeatureMatrix::Dense(x_valid),
                FeatureMatrix::Dense(x_test),
            ))
        }
        StorageFormat::Sparse => {
            let train_entries = sparse_entries(train.0, train.1)?;
            let valid_entries = match valid.1 {
                Some(rows) => sparse_entries(valid.0, rows)?,
                None => Vec::new(),
            };
            let test_entries = sparse_entries(test.0, test.1)?;

            let observed = [&train_entries, &valid_entries, &test_entries]
                .into_iter()
                .flatten()
                .flatten()
                .map(|&(col, _)| col + 1)
                .max()
                .unwrap_or(0);
            let width = feat_num.unwrap_or(observed);
            Ok((
                FeatureMatrix::Sparse(CsrMatrix::from_rows(width, train_entries)?),
                FeatureMatrix::Sparse(CsrMatrix::from_rows(width, valid_entries)?),
                FeatureMatrix::Sparse(CsrMatrix::from_rows(width, test_entries)?),
            ))
        }
    }
}

fn infer_format(rows: &[TokenRow]) -> StorageFormat {
    if rows.iter().flat_map(|(_, t)| t).any(|t| t.contains(':')) {
        StorageFormat::Sparse
    } else {
        StorageFormat::Dense
    }
}

fn infer_task(labels: &LabelMatrix) -> TaskKind {
    if labels.ncols() > 1 {
        TaskKind::MultilabelClassification
    } else if labels.iter().all(|&v| v == 0.0 || v == 1.0) {
        TaskKind::BinaryClassification
    } else {
        TaskKind::Regression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_parse_info() {
        let info = parse_info(
            "usage = 'AutoML challenge 2014'\nname = 'adult'\ntask = 'binary.classification'\n\
             \n# comment\nfeat_num = 24\nformat = \"dense\"\n",
        );
        assert_eq!(info["name"], "adult");
        assert_eq!(info["task"], "binary.classification");
        assert_eq!(info["feat_num"], "24");
        assert_eq!(info["format"], "dense");
        assert_eq!(info["usage"], "AutoML challenge 2014");
    }

    #[test]
    fn test_load_dense_with_info() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("toy");
        fs::create_dir(&dir).unwrap();
        write(
            &dir,
            "toy_public.info",
            "name = 'toy'\ntask = 'regression'\nformat = 'dense'\nfeat_num = 2\ntest_num = 1\n",
        );
        write(&dir, "toy_train.data", "1 2 \n3 4\n");
        write(&dir, "toy_train.solution", "0.5\n1.5\n");
        write(&dir, "toy_valid.data", "");
        write(&dir, "toy_valid.solution", "");
        write(&dir, "toy_test.data", "5 6\n");
        write(&dir, "toy_test.solution", "2.5\n");

        let data = AutoMLDataset::load(root.path(), "toy").unwrap();
        assert_eq!(data.info.task, TaskKind::Regression);
        assert_eq!(data.info.format, StorageFormat::Dense);
        assert_eq!(data.x_train.n_rows(), 2);
        assert_eq!(data.x_train.n_cols(), 2);
        assert!(data.x_valid.is_empty());
        assert_eq!(data.x_valid.n_cols(), 2);
        assert_eq!(data.y_valid.ncols(), 1);
        assert_eq!(data.info.raw["test_num"], "1");
    }

    #[test]
    fn test_unused_info_keys_are_not_validated() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("toy");
        fs::create_dir(&dir).unwrap();
        write(
            &dir,
            "toy_public.info",
            "task = 'binary.classification'\ntest_num = 'unknown'\n",
        );
        write(&dir, "toy_train.data", "1 2\n");
        write(&dir, "toy_train.solution", "1\n");
        write(&dir, "toy_test.data", "3 4\n");
        write(&dir, "toy_test.solution", "0\n");

        let data = AutoMLDataset::load(root.path(), "toy").unwrap();
        assert_eq!(data.info.raw["test_num"], "unknown");
        assert_eq!(data.x_test.n_rows(), 1);
    }

    #[test]
    fn test_load_sparse_without_info() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("sp");
        fs::create_dir(&dir).unwrap();
        write(&dir, "sp_train.data", "1:0.5 3:2\n\n2:1\n");
        write(&dir, "sp_train.solution", "1 0\n0 1\n1 1\n");
        write(&dir, "sp_test.data", "4:1\n");
        write(&dir, "sp_test.solution", "0 1\n");

        let data = AutoMLDataset::load(root.path(), "sp").unwrap();
        assert_eq!(data.info.format, StorageFormat::Sparse);
        assert_eq!(data.info.task, TaskKind::MultilabelClassification);
        assert_eq!(data.info.name, "sp");
        assert_eq!(data.x_train.n_rows(), 3);
        assert_eq!(data.x_train.n_cols(), 4);
        assert!(data.x_valid.is_empty());
        assert_eq!(data.y_valid.dim(), (0, 2));
    }

    #[test]
    fn test_missing_required_file() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("none")).unwrap();
        let err = AutoMLDataset::load(root.path(), "none").unwrap_err();
        assert!(matches!(err, ConvertError::MissingFile(_)));
    }

    #[test]
    fn test_ragged_dense_rows_rejected() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("bad");
        fs::create_dir(&dir).unwrap();
        write(&dir, "bad_train.data", "1 2\n3\n");
        write(&dir, "bad_train.solution", "0\n1\n");
        write(&dir, "bad_test.data", "1 2\n");
        write(&dir, "bad_test.solution", "0\n");
        let err = AutoMLDataset::load(root.path(), "bad").unwrap_err();
        assert!(matches!(err, ConvertError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_sparse_zero_column_rejected() {
        let rows = vec![(1, vec!["0:1.0".to_string()])];
        assert!(sparse_entries(Path::new("x"), rows).is_err());
    }

    #[test]
    fn test_infer_task() {
        assert_eq!(
            infer_task(&ndarray::array![[0.0], [1.0]]),
            TaskKind::BinaryClassification
        );
        assert_eq!(infer_task(&ndarray::array![[0.2], [1.0]]), TaskKind::Regression);
    }
}
