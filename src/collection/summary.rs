//! Serializable view of a collection.

use serde::Serialize;

use super::ResourceCollection;
use crate::error::Result;
use crate::resource::{LintReport, Resource};

/// What a client needs to load one collection.
///
/// `script`/`style` are the full paths of the compressed artifacts and are
/// omitted when the artifact does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub files: Vec<MemberSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint: Option<LintReport>,
}

impl CollectionSummary {
    /// Builds both compressed artifacts if needed.
    pub fn of(collection: &ResourceCollection) -> Result<Self> {
        let script = collection.compressed_script()?;
        let style = collection.compressed_style()?;

        Ok(Self {
            name: collection.origin().unwrap_or(collection.owner()).to_string(),
            script: script.exists().then(|| script.full_path()),
            style: style.exists().then(|| style.full_path()),
            files: collection
                .aggregates()
                .iter()
                .map(|member| MemberSummary {
                    path: member.full_path(),
                    lint: member.lint_report().map(|r| (*r).clone()),
                })
                .collect(),
        })
    }
}
