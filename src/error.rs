//! Engine error types.
//!
//! Missing resources are not errors: resolution returns `Ok(None)` and
//! unresolvable file-list entries or requires tags are logged and skipped.

use thiserror::Error;

use crate::compress::CompressError;
use crate::config::ConfigError;

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

/// Errors raised while resolving or building bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A strongly connected component with more than one member.
    #[error("cyclic dependency in bundle `{bundle}`: {}", format_cycle(.chain))]
    Cycle { bundle: String, chain: Vec<String> },

    #[error("bundle `{bundle}` resolved more than {limit} distinct paths")]
    Capacity { bundle: String, limit: usize },

    #[error("`{path}` does not support {operation}")]
    Unsupported {
        path: String,
        operation: &'static str,
    },

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("failed to compress `{path}`")]
    Compress {
        path: String,
        #[source]
        source: CompressError,
    },
}

impl BundleError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }
}

/// `a -> b -> c -> a`
fn format_cycle(chain: &[String]) -> String {
    let mut out = chain.join(" -> ");
    if let Some(first) = chain.first() {
        out.push_str(" -> ");
        out.push_str(first);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_closes_chain() {
        let err = BundleError::Cycle {
            bundle: "app".into(),
            chain: vec!["app/a.js".into(), "app/b.js".into()],
        };
        assert_eq!(
            err.to_string(),
            "cyclic dependency in bundle `app`: app/a.js -> app/b.js -> app/a.js"
        );
    }

    #[test]
    fn test_capacity_display() {
        let err = BundleError::Capacity {
            bundle: "app".into(),
            limit: 3,
        };
        assert!(err.to_string().contains("more than 3"));
    }
}
