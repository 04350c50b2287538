//! MCP API Catalog Library
//!
//! Keeps a locally persisted catalog of API operation descriptors in line
//! with a live API description, and uses it at request time to discover,
//! validate and execute calls.
//!
//! # Features
//!
//! - **Sync**: diff stored descriptors against the live description, rewrite
//!   only changed chunks, keep every chunk under the size limit
//! - **Discovery**: filtered, categorized, deterministic endpoint listing
//! - **Execution**: exact resolution, required-field checks, path/query/body
//!   routing and path interpolation before dispatch
//! - **Tool calls**: `list_api_endpoints` and `execute_api_endpoint`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod sync;
pub mod tools;

pub use catalog_core::{HttpMethod, OperationDescriptor, flatten_schema};
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(format!("Failed to install logger: {e}")))?;
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Internal(format!("Failed to install logger: {e}")))?;
        }
    }

    Ok(())
}
