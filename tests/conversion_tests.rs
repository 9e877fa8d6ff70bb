//! End-to-end conversion tests: AutoML directory in, TFRecord dataset out.

use autodl_formatter::prelude::*;
use autodl_formatter::record::FeaturePayload;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write an AutoML dataset named `name` under `root` and return `root`.
fn write_automl(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for (suffix, contents) in files {
        fs::write(dir.join(format!("{name}_{suffix}")), contents).unwrap();
    }
    root.to_path_buf()
}

/// Dense binary dataset: 3 train rows, 2 valid rows, 2 test rows, 4 features.
fn dense_binary(root: &Path) -> PathBuf {
    write_automl(
        root,
        "toy",
        &[
            (
                "public.info",
                "name = 'toy'\ntask = 'binary.classification'\nformat = 'dense'\nfeat_num = 4\n",
            ),
            ("train.data", "1 2 3 4\n5 6 7 8\n9 10 11 12\n"),
            ("train.solution", "0\n1\n1\n"),
            ("valid.data", "13 14 15 16\n17 18 19 20\n"),
            ("valid.solution", "0\n1\n"),
            ("test.data", "-1 -2 -3 -4\n-5 -6 -7 -8\n"),
            ("test.solution", "1\n0\n"),
            ("private.info", "title = 'toy'\n"),
        ],
    )
}

fn read_records(path: &Path) -> Vec<Record> {
    RecordReader::open(path)
        .unwrap()
        .map(|bytes| Record::from_bytes(&bytes.unwrap()).unwrap())
        .collect()
}

fn convert(input: &Path, output: &Path, configure: impl FnOnce(ConversionConfig) -> ConversionConfig) -> (ConversionConfig, ConversionReport) {
    let config = configure(ConversionConfig::new(input, output, "toy"));
    let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name).unwrap();
    let report = convert_dataset(&data, &config).unwrap();
    (config, report)
}

#[test]
fn test_dense_layout_and_ids() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let (_, report) = convert(&input, &output, |c| c);

    let dataset_dir = output.join("toy");
    assert_eq!(report.dataset_dir, dataset_dir);
    assert!(report.warnings().is_empty());

    let test_file = dataset_dir.join("toy.data/test/sample-toy-test.tfrecord");
    let train_file = dataset_dir.join("toy.data/train/sample-toy-train.tfrecord");
    assert!(dataset_dir.join("toy.data/test/metadata.textproto").is_file());
    assert!(dataset_dir.join("toy.data/train/metadata.textproto").is_file());
    assert!(dataset_dir.join("toy_public.info").is_file());
    assert!(dataset_dir.join("toy_private.info").is_file());

    // Test ids start at 0 and carry no labels.
    let test = read_records(&test_file);
    assert_eq!(test.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1]);
    assert!(test.iter().all(|r| r.label_index.is_empty() && r.label_score.is_empty()));
    assert_eq!(
        test[1].payload,
        FeaturePayload::Dense {
            frames: vec![vec![-5.0, -6.0, -7.0, -8.0]]
        }
    );

    // Train ids continue after the test split; valid rows follow train rows.
    let train = read_records(&train_file);
    assert_eq!(
        train.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![2, 3, 4, 5, 6]
    );
    assert_eq!(
        train[3].payload,
        FeaturePayload::Dense {
            frames: vec![vec![13.0, 14.0, 15.0, 16.0]]
        }
    );
    // Binary labels expand to [1 - l, l].
    assert_eq!(train[0].label_index, vec![0]);
    assert_eq!(train[1].label_index, vec![1]);
    assert_eq!(train[1].label_score, vec![1.0]);

    // The solution is moved to the dataset root.
    let solution = fs::read_to_string(dataset_dir.join("toy.solution")).unwrap();
    assert_eq!(solution, "0.0 1.0\n1.0 0.0\n");
    assert!(!dataset_dir.join("toy.data/test/toy.solution").exists());
}

#[test]
fn test_sidecar_reports_default_shape() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let (_, report) = convert(&input, &output, |c| c);

    let sidecar =
        fs::read_to_string(output.join("toy/toy.data/train/metadata.textproto")).unwrap();
    assert!(sidecar.contains("sample_count: 5\n"));
    assert!(sidecar.contains("sequence_size: 1\n"));
    assert!(sidecar.contains("output_dim: 2\n"));
    assert!(sidecar.contains("  col_count: 4\n"));
    assert!(sidecar.contains("  row_count: 1\n"));
    assert!(sidecar.contains("  format: DENSE\n"));
    assert_eq!(report.train.descriptor.shape, TensorShape::new(1, 1, 4, 1));
}

#[test]
fn test_truncation_and_directory_suffixes() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let (_, report) = convert(&input, &output, |c| c.with_max_examples(Some(2), Some(1)));

    let dataset_dir = output.join("toy_2_1");
    assert_eq!(report.dataset_name, "toy_2_1");
    assert_eq!(report.test.emitted, 1);
    assert_eq!(report.train.emitted, 2);

    let train = read_records(&dataset_dir.join("toy_2_1.data/train/sample-toy-train.tfrecord"));
    // Offset is the number of test records actually written.
    assert_eq!(train.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

    let sidecar =
        fs::read_to_string(dataset_dir.join("toy_2_1.data/test/metadata.textproto")).unwrap();
    assert!(sidecar.contains("sample_count: 1\n"));

    // The solution keeps every test label, not only the emitted ones.
    let solution = fs::read_to_string(dataset_dir.join("toy_2_1.solution")).unwrap();
    assert_eq!(solution.lines().count(), 2);
    assert!(dataset_dir.join("toy_2_1_public.info").is_file());
}

#[test]
fn test_sequence_shape_splits_frames() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let (config, report) = convert(&input, &output, |c| c.with_shape(ShapeSpec::new(2, 1, 2, 1)));

    assert_eq!(report.test.descriptor.shape.sequence_size, 2);
    let test = read_records(
        &config
            .dataset_dir()
            .join("toy.data/test/sample-toy-test.tfrecord"),
    );
    assert_eq!(
        test[0].payload,
        FeaturePayload::Dense {
            frames: vec![vec![-1.0, -2.0], vec![-3.0, -4.0]]
        }
    );
}

#[test]
fn test_shape_mismatch_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let config = ConversionConfig::new(&input, &output, "toy").with_shape(ShapeSpec::new(1, 1, 3, 1));
    let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name).unwrap();
    let err = convert_dataset(&data, &config).unwrap_err();

    assert!(matches!(
        err,
        ConvertError::ShapeMismatch {
            declared: 3,
            observed: 4,
            ..
        }
    ));
    assert!(!output.exists());
}

#[test]
fn test_partial_shape_is_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    let config = ConversionConfig::new(&input, &output, "toy").with_shape(ShapeSpec {
        col_count: Some(4),
        ..Default::default()
    });
    let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name).unwrap();
    assert!(convert_dataset(&data, &config).unwrap_err().is_configuration());
    assert!(!output.exists());
}

#[test]
fn test_rerun_overwrites_sidecar() {
    let tmp = TempDir::new().unwrap();
    let input = dense_binary(&tmp.path().join("raw"));
    let output = tmp.path().join("formatted");

    convert(&input, &output, |c| c);
    let path = output.join("toy/toy.data/test/metadata.textproto");
    let first = fs::read_to_string(&path).unwrap();

    // A second run replaces the files; the relocated solution is rewritten too.
    let (_, report) = convert(&input, &output, |c| c);
    assert_eq!(fs::read_to_string(&path).unwrap(), first);
    assert!(report.warnings().is_empty());
    assert_eq!(
        read_records(&output.join("toy/toy.data/test/sample-toy-test.tfrecord")).len(),
        2
    );
}

#[test]
fn test_missing_info_files_are_warnings() {
    let tmp = TempDir::new().unwrap();
    let input = write_automl(
        &tmp.path().join("raw"),
        "toy",
        &[
            ("train.data", "0.5 1.5\n2.5 3.5\n4.5 5.5\n"),
            ("train.solution", "0.1\n0.9\n0.5\n"),
            ("test.data", "1 1\n"),
            ("test.solution", "0.7\n"),
        ],
    );
    let output = tmp.path().join("formatted");

    let (_, report) = convert(&input, &output, |c| c.with_report(true));

    let warnings = report.warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.to_string().starts_with("WARNING")));
    assert!(output.join("toy/toy.solution").is_file());

    // Regression labels are binarized around the training median (0.5).
    let train = read_records(&output.join("toy/toy.data/train/sample-toy-train.tfrecord"));
    assert_eq!(train[0].label_index, vec![0]);
    assert_eq!(train[1].label_index, vec![1]);
    assert_eq!(train[2].label_index, vec![0]);
    assert_eq!(train[0].id, 1);

    let report_json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(output.join("toy/conversion_report.json")).unwrap(),
    )
    .unwrap();
    assert!(report_json["generated_at"].is_string());
    assert_eq!(report_json["train"]["emitted"], 3);
    assert_eq!(report_json["info_files"][0]["status"], "warning");
}

#[test]
fn test_sparse_dataset() {
    let tmp = TempDir::new().unwrap();
    let input = write_automl(
        &tmp.path().join("raw"),
        "toy",
        &[
            (
                "public.info",
                "task = 'multilabel.classification'\nformat = 'sparse'\nfeat_num = 5\n",
            ),
            ("train.data", "1:0.5 4:2\n\n5:1\n"),
            ("train.solution", "1 0 1\n0 0 0\n0 1 0\n"),
            ("test.data", "2:3\n"),
            ("test.solution", "0 0 1\n"),
        ],
    );
    let output = tmp.path().join("formatted");

    let (_, report) = convert(&input, &output, |c| c);
    assert_eq!(report.train.emitted, 3);

    let train = read_records(&output.join("toy/toy.data/train/sample-toy-train.tfrecord"));
    assert_eq!(
        train[0].payload,
        FeaturePayload::Sparse {
            col_index: vec![0, 3],
            row_index: vec![0, 0],
            values: vec![0.5, 2.0],
        }
    );
    // A blank line is an example with no nonzero features.
    assert_eq!(
        train[1].payload,
        FeaturePayload::Sparse {
            col_index: vec![],
            row_index: vec![],
            values: vec![],
        }
    );
    assert!(train[1].label_index.is_empty());
    assert_eq!(train[0].label_index, vec![0, 2]);

    let sidecar = fs::read_to_string(output.join("toy/toy.data/test/metadata.textproto")).unwrap();
    assert!(sidecar.contains("  format: SPARSE\n"));
    assert!(sidecar.contains("output_dim: 3\n"));
}

#[test]
fn test_sparse_sequence_rejected_before_io() {
    let tmp = TempDir::new().unwrap();
    let input = write_automl(
        &tmp.path().join("raw"),
        "toy",
        &[
            ("public.info", "task = 'binary.classification'\nformat = 'sparse'\nfeat_num = 4\n"),
            ("train.data", "1:1 2:1\n3:1\n"),
            ("train.solution", "0\n1\n"),
            ("test.data", "4:1\n"),
            ("test.solution", "1\n"),
        ],
    );
    let output = tmp.path().join("formatted");

    let config = ConversionConfig::new(&input, &output, "toy").with_shape(ShapeSpec::new(2, 1, 2, 1));
    let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name).unwrap();
    let err = convert_dataset(&data, &config).unwrap_err();
    assert!(err.is_configuration());
    assert!(!output.exists());
}
