//! Print the first records of a TFRecord file as JSON.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release --bin inspect_records -- \
//!     formatted/adult/adult.data/test/sample-adult-test.tfrecord --count 3
//! ```

use std::path::PathBuf;

use autodl_formatter::logging;
use autodl_formatter::record::{Record, RecordReader};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about = "Inspect a TFRecord file of SequenceExample records")]
struct Args {
    /// Path to the TFRecord file.
    path: PathBuf,

    /// Number of records to print.
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Count every record in the file after printing.
    #[arg(long)]
    total: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init();

    let args = Args::parse();
    let mut reader = RecordReader::open(&args.path)?;

    let mut seen = 0usize;
    while seen < args.count {
        let Some(bytes) = reader.read_record()? else {
            break;
        };
        let record = Record::from_bytes(&bytes)?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        seen += 1;
    }

    if args.total {
        let mut total = seen;
        while reader.read_record()?.is_some() {
            total += 1;
        }
        println!("{total} records in {}", args.path.display());
    }
    Ok(())
}
