//! Shared helpers: hashing, paths, MIME types.

pub mod hash;
pub mod mime;
pub mod path;
