//! Bundle configuration (`sheaf.toml` / `sheaf.json`).
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── error.rs   # ConfigError, ConfigDiagnostics
//! ├── util.rs    # config file discovery, name rules
//! └── mod.rs     # Config, BundleConfig, ResolverOptions (this file)
//! ```
//!
//! # Format
//!
//! The top level maps bundle names to bundle tables, in either format:
//!
//! ```toml
//! [core]
//! files = ["core/app.js", "core/app.css"]
//! basePath = "static"         # default: the config file's directory
//! matches = ['\.(js|css)$']   # allow-list for resolvable paths
//! jsLint = true
//! checkModified = true
//! jsCompilerArgs = ["--no-mangle"]
//! ```
//!
//! Keys are camelCase; snake_case spellings are accepted too. Unknown keys
//! are reported and ignored.

mod error;
mod util;

pub use error::{ConfigDiagnostics, ConfigError};
pub use util::{find_config_file, is_valid_bundle_name};

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::de::{self, Deserializer, MapAccess};
use serde::Deserialize;

use crate::log;
use crate::resource::ResourceRef;

/// Names that collide with request routing.
pub const RESERVED_NAMES: [&str; 3] = ["all", "1", "true"];

/// Default resolved-path cache ceiling per bundle.
pub const DEFAULT_MAX_CACHED_PATHS: usize = 10_000;

/// Whether `name` is reserved (case-insensitive).
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Engine options that are not part of any config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Distinct paths a bundle may resolve before failing with a capacity
    /// error.
    pub max_cached_paths: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_cached_paths: DEFAULT_MAX_CACHED_PATHS,
        }
    }
}

// ============================================================================
// Parsed configuration
// ============================================================================

/// Bundles declared by one config source.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: ResourceRef,
    pub bundles: Vec<BundleConfig>,
}

/// One bundle's settings.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    pub name: String,
    /// Directory the bundle's paths are resolved against.
    pub base_path: PathBuf,
    /// Allow-list for resolvable paths; empty allows everything.
    pub matches: Vec<Regex>,
    pub js_lint: bool,
    /// Whether polling checks this bundle for modifications.
    pub check_modified: bool,
    pub js_compile_args: Vec<String>,
    /// Root-relative entry points, in declared order.
    pub files: Vec<String>,
    /// The config source this bundle was read from.
    pub config_resource: ResourceRef,
}

impl BundleConfig {
    pub fn new(
        name: impl Into<String>,
        base_path: impl Into<PathBuf>,
        config_resource: ResourceRef,
    ) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            matches: Vec::new(),
            js_lint: false,
            check_modified: true,
            js_compile_args: Vec::new(),
            files: Vec::new(),
            config_resource,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `path` (root-relative) passes the `matches` allow-list.
    pub fn allows(&self, path: &str) -> bool {
        self.matches.is_empty() || self.matches.iter().any(|re| re.is_match(path))
    }

    /// Equal settings, ignoring which config source they came from.
    pub fn same_settings(&self, other: &Self) -> bool {
        self.name == other.name
            && self.base_path == other.base_path
            && self.js_lint == other.js_lint
            && self.check_modified == other.check_modified
            && self.js_compile_args == other.js_compile_args
            && self.files == other.files
            && self.matches.len() == other.matches.len()
            && self
                .matches
                .iter()
                .zip(&other.matches)
                .all(|(a, b)| a.as_str() == b.as_str())
    }
}

impl Config {
    /// Parse a config source. The format follows the extension: `.json` is
    /// JSON, anything else TOML.
    pub fn parse(source: ResourceRef, file: &Path, text: &[u8]) -> Result<Self, ConfigError> {
        let (bundles, ignored) = parse_with_ignored(file, text)?;
        if !ignored.is_empty() {
            print_unknown_fields_warning(&ignored, file);
        }

        let base_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut diag = ConfigDiagnostics::new(file.display().to_string());
        if bundles.0.is_empty() {
            diag.error_with_hint("<root>", "no bundles defined", "add a `[name]` table");
        }

        let mut seen = FxHashSet::default();
        let mut configs = Vec::with_capacity(bundles.0.len());
        for (name, raw) in bundles.0 {
            if !seen.insert(name.clone()) {
                diag.error(name, "bundle defined more than once");
                continue;
            }
            if let Some(config) = raw.into_config(name, &base_dir, &source, &mut diag) {
                configs.push(config);
            }
        }
        diag.into_result()?;

        Ok(Self {
            source,
            bundles: configs,
        })
    }
}

// ============================================================================
// Raw (serde) form
// ============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBundle {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default, alias = "base_path")]
    base_path: Option<PathBuf>,
    #[serde(default)]
    matches: Vec<String>,
    #[serde(default, alias = "js_lint")]
    js_lint: bool,
    #[serde(default = "default_true", alias = "check_modified")]
    check_modified: bool,
    #[serde(
        default,
        alias = "js_compiler_args",
        alias = "jsCompileArgs",
        alias = "js_compile_args"
    )]
    js_compiler_args: Vec<String>,
}

impl RawBundle {
    fn into_config(
        self,
        name: String,
        base_dir: &Path,
        source: &ResourceRef,
        diag: &mut ConfigDiagnostics,
    ) -> Option<BundleConfig> {
        let errors = diag.len();
        if !is_valid_bundle_name(&name) {
            diag.error_with_hint(
                name.as_str(),
                "invalid bundle name",
                "use only ASCII letters, digits and `_`",
            );
        } else if is_reserved(&name) {
            diag.error(
                name.as_str(),
                format!("`{name}` is reserved ({})", RESERVED_NAMES.join(", ")),
            );
        }

        let mut matches = Vec::with_capacity(self.matches.len());
        for (i, pattern) in self.matches.iter().enumerate() {
            match Regex::new(pattern) {
                Ok(re) => matches.push(re),
                Err(e) => diag.error_with_hint(
                    format!("{name}.matches[{i}]"),
                    format!("invalid regex `{pattern}`"),
                    e.to_string(),
                ),
            }
        }

        if diag.len() > errors {
            return None;
        }

        let base_path = match self.base_path {
            Some(path) => base_dir.join(path),
            None => base_dir.to_path_buf(),
        };
        Some(BundleConfig {
            name,
            base_path,
            matches,
            js_lint: self.js_lint,
            check_modified: self.check_modified,
            js_compile_args: self.js_compiler_args,
            files: self.files,
            config_resource: source.clone(),
        })
    }
}

/// Bundle tables in document order.
struct OrderedBundles(Vec<(String, RawBundle)>);

impl<'de> Deserialize<'de> for OrderedBundles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = OrderedBundles;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of bundle names to bundle tables")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut bundles = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, RawBundle>()? {
                    bundles.push(entry);
                }
                Ok(OrderedBundles(bundles))
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}

fn is_json(file: &Path) -> bool {
    file.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse either format, collecting any unknown fields.
fn parse_with_ignored(
    file: &Path,
    text: &[u8],
) -> Result<(OrderedBundles, Vec<String>), ConfigError> {
    let mut ignored = Vec::new();
    let bundles = if is_json(file) {
        let mut deserializer = serde_json::Deserializer::from_slice(text);
        let bundles = serde_ignored::deserialize(&mut deserializer, |path| {
            ignored.push(path.to_string());
        })
        .map_err(|e| ConfigError::Json(file.to_path_buf(), e))?;
        deserializer
            .end()
            .map_err(|e| ConfigError::Json(file.to_path_buf(), e))?;
        bundles
    } else {
        let text = std::str::from_utf8(text).map_err(|e| {
            ConfigError::Validation(format!("`{}` is not valid UTF-8: {e}", file.display()))
        })?;
        let deserializer = toml::Deserializer::new(text);
        serde_ignored::deserialize(deserializer, |path| {
            ignored.push(path.to_string());
        })
        .map_err(|e| ConfigError::Toml(file.to_path_buf(), e))?
    };
    Ok((bundles, ignored))
}

/// Print warning about unknown fields.
fn print_unknown_fields_warning(fields: &[String], path: &Path) {
    log!("warning"; "unknown fields in {}, ignoring:", path.display());
    for field in fields {
        eprintln!("- {}", field);
    }
}
