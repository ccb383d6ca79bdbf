//! Pluggable artifact compressors.
//!
//! A collection hands its raw script and stylesheet bytes to a
//! [`Compressor`] the first time the compressed artifact is requested.
//! Compressors are pure: same input, same output, no shared state.

mod minify;

pub use minify::{ScriptCompressor, ScriptOptions, StyleCompressor};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Compressor failure; aborts only the artifact being built.
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("input is not valid utf-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("script parse failed: {0}")]
    Script(String),

    #[error("stylesheet {stage} failed: {message}")]
    Style {
        stage: &'static str,
        message: String,
    },
}

/// `compress(bytes) -> bytes`.
pub trait Compressor: Send + Sync + fmt::Debug {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError>;
}

/// The compressor pair a bundle's collections use.
#[derive(Debug, Clone)]
pub struct Compressors {
    pub script: Arc<dyn Compressor>,
    pub style: Arc<dyn Compressor>,
}

impl Compressors {
    /// Minifying compressors, with script options parsed from the bundle's
    /// `jsCompilerArgs`.
    pub fn minifying(bundle: &str, compiler_args: &[String]) -> Self {
        Self {
            script: Arc::new(ScriptCompressor::new(ScriptOptions::from_args(
                bundle,
                compiler_args,
            ))),
            style: Arc::new(StyleCompressor),
        }
    }
}
