//! Logger setup for the command-line tools.
//!
//! The default level is `info`; `RUST_LOG` directives are applied on top,
//! so `RUST_LOG=debug` shows every file touched.

use env_logger::Builder;
use log::LevelFilter;

/// Builder with the `info` default and the given `RUST_LOG`-style filters.
pub fn builder_with(filters: Option<&str>) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Some(filters) = filters {
        builder.parse_filters(filters);
    }
    builder
}

/// Install the global logger, reading filters from `RUST_LOG`.
pub fn init() {
    let filters = std::env::var("RUST_LOG").ok();
    builder_with(filters.as_deref()).init();
}
