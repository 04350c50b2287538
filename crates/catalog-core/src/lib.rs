//! API operation catalog core
//!
//! Data model and pure schema primitives shared by the catalog store, the
//! sync engine and the request-time executor:
//!
//! - [`HttpMethod`]: the closed set of supported HTTP methods
//! - [`OperationDescriptor`]: one catalog entry (method, path template, schemas)
//! - [`flatten_schema`]: collapses `allOf` compositions into a single object schema
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod descriptor;
mod flatten;
mod method;

pub use descriptor::{OperationDescriptor, extract_placeholders};
pub use flatten::flatten_schema;
pub use method::{HttpMethod, ParseMethodError};
