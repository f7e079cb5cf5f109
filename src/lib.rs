//! arbor library crate: structural three-way merge of source files.
//!
//! The merge engine itself lives in [`arbor_core`] and works on artifact
//! trees only. This crate wraps it with the pieces an embedding tool needs:
//!
//! - [`config`]: `arbor.toml` loading and conversion into core configs.
//! - [`frontend`]: source text → artifact tree, by line or by syntax.
//! - [`driver`]: the parse → match → merge pipeline for one file.
//! - [`telemetry`]: `tracing` subscriber setup.

pub mod config;
pub mod driver;
pub mod frontend;
pub mod telemetry;

pub use config::{ArborConfig, ConfigError};
pub use driver::{SourceMerge, merge_files, merge_sources};
pub use frontend::{FrontEnd, FrontEndError, LineFrontEnd};
