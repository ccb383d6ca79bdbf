//! Path utilities.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`)
//! - [`logical`]: `/`-separated resource path handling (`normalize`, `join_relative`)

pub mod fs;
pub mod logical;

pub use fs::normalize_path;
