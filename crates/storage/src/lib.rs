//! Directory trees the pack reads track containers from and writes into.

pub mod backend;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

/// A backend shared between the scan, the jobs and the output writer.
pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
