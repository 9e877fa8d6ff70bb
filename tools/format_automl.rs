//! AutoML to AutoDL Format Tool
//!
//! Converts one AutoML dataset directory into the AutoDL sequence format:
//! a TFRecord file and `metadata.textproto` per split, the test solution
//! and the dataset info files.
//!
//! # Usage
//!
//! ```bash
//! # From flags
//! cargo run --release --bin format_automl -- \
//!     --input-dir raw_datasets/automl --dataset-name adult \
//!     --output-dir formatted_datasets --max-num-examples-test 500
//!
//! # From TOML config
//! cargo run --release --bin format_automl -- --config configs/adult.toml
//!
//! # Generate sample config
//! cargo run --release --bin format_automl -- --generate-config adult.toml
//! ```
//!
//! Set `RUST_LOG=debug` to see every file touched.

use autodl_formatter::config::ConversionConfig;
use autodl_formatter::export::convert_dataset;
use autodl_formatter::loader::AutoMLDataset;
use autodl_formatter::logging;
use autodl_formatter::shape::ShapeSpec;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(about = "Format an AutoML dataset into the AutoDL sequence format")]
struct Args {
    /// Directory containing the raw AutoML datasets.
    #[arg(long, default_value = "../../raw_datasets/automl/")]
    input_dir: PathBuf,

    /// Basename of the dataset to convert.
    #[arg(long, default_value = "adult")]
    dataset_name: String,

    /// Directory receiving the formatted dataset.
    #[arg(long, default_value = "../../formatted_datasets/")]
    output_dir: PathBuf,

    /// Number of frames per example.
    #[arg(long)]
    sequence_size: Option<usize>,

    /// Rows per frame.
    #[arg(long)]
    row_count: Option<usize>,

    /// Columns per frame.
    #[arg(long)]
    col_count: Option<usize>,

    /// Channels per frame.
    #[arg(long)]
    num_channels: Option<usize>,

    /// Maximum number of training examples to write.
    #[arg(long)]
    max_num_examples_train: Option<usize>,

    /// Maximum number of test examples to write.
    #[arg(long)]
    max_num_examples_test: Option<usize>,

    /// Number of shards for the training set (only 1 is written).
    #[arg(long, default_value_t = 1)]
    num_shards_train: usize,

    /// Number of shards for the test set (only 1 is written).
    #[arg(long, default_value_t = 1)]
    num_shards_test: usize,

    /// Name of the formatted dataset. Defaults to --dataset-name.
    #[arg(long)]
    new_dataset_name: Option<String>,

    /// Fail on task kinds other than regression and the classification kinds.
    #[arg(long)]
    strict_task_kind: bool,

    /// Also write conversion_report.json into the dataset directory.
    #[arg(long)]
    report: bool,

    /// Load the whole configuration from a TOML file; other flags are ignored.
    #[arg(long, conflicts_with = "generate_config")]
    config: Option<PathBuf>,

    /// Write a sample TOML configuration and exit.
    #[arg(long)]
    generate_config: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> ConversionConfig {
        let mut config = ConversionConfig::new(&self.input_dir, &self.output_dir, &self.dataset_name)
            .with_shape(ShapeSpec {
                sequence_size: self.sequence_size,
                row_count: self.row_count,
                col_count: self.col_count,
                num_channels: self.num_channels,
            })
            .with_max_examples(self.max_num_examples_train, self.max_num_examples_test)
            .with_strict_task_kind(self.strict_task_kind)
            .with_report(self.report);
        config.new_dataset_name = self.new_dataset_name.clone();
        config.num_shards_train = self.num_shards_train;
        config.num_shards_test = self.num_shards_test;
        config
    }
}

fn main() {
    logging::init();

    let args = Args::parse();

    if let Some(path) = &args.generate_config {
        generate_sample_config(path, &args);
        return;
    }

    let config = match &args.config {
        Some(path) => match ConversionConfig::load_toml(path) {
            Ok(c) => {
                println!("✅ Loaded configuration: {}", path.display());
                c
            }
            Err(e) => {
                eprintln!("❌ Failed to load config: {e}");
                std::process::exit(1);
            }
        },
        None => args.to_config(),
    };

    if let Err(e) = run(&config) {
        eprintln!("❌ Conversion failed: {e}");
        std::process::exit(1);
    }
}

fn generate_sample_config(path: &Path, args: &Args) {
    let sample = args.to_config();
    match sample.save_toml(path) {
        Ok(()) => {
            println!("✅ Generated sample config: {}", path.display());
            println!("\nEdit the following fields before running:");
            println!("  - input_dir / dataset_name: Source AutoML dataset");
            println!("  - output_dir: Where the formatted dataset is written");
            println!("  - [shape]: All four of sequence_size, row_count, col_count, num_channels, or none");
        }
        Err(e) => {
            eprintln!("Error generating config: {e}");
            std::process::exit(1);
        }
    }
}

fn run(config: &ConversionConfig) -> autodl_formatter::Result<()> {
    config.validate()?;
    print_config_summary(config);

    let data = AutoMLDataset::load(&config.input_dir, &config.dataset_name)?;
    println!(
        "📁 Loaded {}: task={}, format={:?}, train={} valid={} test={}",
        data.info.name,
        data.info.task,
        data.info.format,
        data.x_train.n_rows(),
        data.x_valid.n_rows(),
        data.x_test.n_rows()
    );

    let report = convert_dataset(&data, config)?;

    println!();
    println!("┌─ Conversion Summary ──────────────────────────────────────────┐");
    println!("│ Dataset:    {}", report.dataset_name);
    println!("│ Directory:  {}", report.dataset_dir.display());
    println!(
        "│ Test:       {} examples, shape {}",
        report.test.emitted, report.test.descriptor.shape
    );
    println!(
        "│ Train:      {} examples, shape {}",
        report.train.emitted, report.train.descriptor.shape
    );
    println!("└────────────────────────────────────────────────────────────────┘");

    let warnings = report.warnings();
    if !warnings.is_empty() {
        println!();
        for warning in warnings {
            println!("⚠️  {warning}");
        }
    }
    Ok(())
}

fn print_config_summary(config: &ConversionConfig) {
    println!("┌─ Configuration Summary ───────────────────────────────────────┐");
    println!("│ Source:     {}", config.source_dir().display());
    println!("│ Output:     {}", config.dataset_dir().display());
    if config.shape.is_unset() {
        println!("│ Shape:      default (1, 1, n_features, 1)");
    } else {
        println!("│ Shape:      {:?}", config.shape);
    }
    println!(
        "│ Limits:     train={:?} test={:?}",
        config.max_num_examples_train, config.max_num_examples_test
    );
    println!("└────────────────────────────────────────────────────────────────┘");
}
