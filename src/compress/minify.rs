//! Minifying compressors: oxc for scripts, lightningcss for stylesheets.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::{CompressError, Compressor};
use crate::log;

/// Script minifier switches, derived from `jsCompilerArgs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOptions {
    pub mangle: bool,
    pub compress: bool,
    pub keep_comments: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            mangle: true,
            compress: true,
            keep_comments: false,
        }
    }
}

impl ScriptOptions {
    /// Recognized: `--no-mangle`, `--no-compress`, `--keep-comments`.
    /// Anything else is reported and ignored.
    pub fn from_args(bundle: &str, args: &[String]) -> Self {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--no-mangle" => options.mangle = false,
                "--no-compress" => options.compress = false,
                "--keep-comments" => options.keep_comments = true,
                other => log!("config"; "bundle `{}`: ignoring unknown compiler argument `{}`", bundle, other),
            }
        }
        options
    }
}

/// Minifies concatenated classic scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptCompressor {
    options: ScriptOptions,
}

impl ScriptCompressor {
    pub const fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

impl Compressor for ScriptCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        let source = std::str::from_utf8(input)?;
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
        if let Some(first) = ret.errors.first() {
            return Err(CompressError::Script(first.to_string()));
        }
        let mut program = ret.program;

        let options = MinifierOptions {
            mangle: self.options.mangle.then(MangleOptions::default),
            compress: self.options.compress.then(CompressOptions::smallest),
        };
        let ret = Minifier::new(options).minify(&allocator, &mut program);
        let comments = if self.options.keep_comments {
            CommentOptions::default()
        } else {
            CommentOptions::disabled()
        };
        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments,
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program)
            .code;
        Ok(code.into_bytes())
    }
}

/// Minifies stylesheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleCompressor;

impl Compressor for StyleCompressor {
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        let source = std::str::from_utf8(input)?;
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stylesheet =
            StyleSheet::parse(source, ParserOptions::default()).map_err(|e| CompressError::Style {
                stage: "parse",
                message: e.to_string(),
            })?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| CompressError::Style {
                stage: "print",
                message: e.to_string(),
            })?;
        Ok(result.code.into_bytes())
    }
}
