//! Lambda-job tools
//!
//! CLI tools for generating job structs from lambda-job sources.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,lambdajob=debug,lambdajob_codegen=info,lambdajob_tools=debug")
    });

    fmt().with_env_filter(filter).with_target(false).init();
}
