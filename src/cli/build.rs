//! Bundle building orchestration.
//!
//! Build phases:
//! - **Collect** - Build every bundle's collections (parallel per bundle)
//! - **Compress** - Compress and write artifacts (parallel per collection)
//! - **Lint** - Print lint reports of linted members
//! - **Manifest** - Write `manifest.json` with every collection summary

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};

use crate::bundle::{Bundle, Generation};
use crate::collection::ResourceCollection;
use crate::logger::ProgressLine;
use crate::resolver::Resolver;
use crate::resource::{ByteResource, ContentType, Resource};
use crate::{debug, log};

/// Name of the summary file written next to the artifacts.
pub const MANIFEST: &str = "manifest.json";

/// Counts of one build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub collections: usize,
    pub artifacts: usize,
    pub lint_issues: usize,
}

/// Build every bundle into `output`.
pub fn build_all(resolver: &Resolver, output: &Path, quiet: bool) -> Result<BuildReport> {
    let bundles = resolver.bundles()?;
    let report = build_bundles(resolver, &bundles, output, quiet)?;
    write_manifest(resolver, output)?;

    if !quiet {
        log!(
            "build";
            "{} bundle(s), {} collection(s), {} artifact(s) written to {}",
            bundles.len(),
            report.collections,
            report.artifacts,
            output.display()
        );
    }
    Ok(report)
}

/// Build `bundles` and write their existing compressed artifacts.
///
/// The manifest is not touched; see [`write_manifest`].
pub fn build_bundles(
    resolver: &Resolver,
    bundles: &[Arc<Bundle>],
    output: &Path,
    quiet: bool,
) -> Result<BuildReport> {
    let generations = bundles
        .par_iter()
        .map(|bundle| {
            bundle
                .resource_collections(resolver)
                .with_context(|| format!("failed to build bundle `{}`", bundle.name()))
        })
        .collect::<Result<Vec<Arc<Generation>>>>()?;

    let collections: Vec<&Arc<ResourceCollection>> =
        generations.iter().flat_map(|g| g.collections()).collect();

    let progress = (!quiet).then(|| {
        ProgressLine::new(&[
            ("scripts", count_with(&collections, ContentType::Script)),
            ("styles", count_with(&collections, ContentType::Stylesheet)),
        ])
    });

    let artifacts = AtomicUsize::new(0);
    collections.par_iter().try_for_each(|collection| -> Result<()> {
        for (counter, artifact) in [
            ("scripts", collection.compressed_script()),
            ("styles", collection.compressed_style()),
        ] {
            let artifact = artifact?;
            if !artifact.exists() {
                continue;
            }
            write_artifact(output, &artifact)?;
            artifacts.fetch_add(1, Ordering::Relaxed);
            if let Some(progress) = &progress {
                progress.inc(counter);
            }
        }
        Ok(())
    })?;

    if let Some(progress) = progress {
        progress.finish();
    }

    Ok(BuildReport {
        collections: collections.len(),
        artifacts: artifacts.into_inner(),
        lint_issues: report_lint(&collections),
    })
}

/// Collections with at least one existing member of `kind`.
fn count_with(collections: &[&Arc<ResourceCollection>], kind: ContentType) -> usize {
    collections
        .iter()
        .filter(|c| {
            c.aggregates()
                .iter()
                .any(|m| m.content_type() == kind && m.exists())
        })
        .count()
}

fn write_artifact(output: &Path, artifact: &ByteResource) -> Result<()> {
    let path = output.join(artifact.full_path());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, &*artifact.bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!("build"; "wrote {}", path.display());
    Ok(())
}

/// Log each linted member with issues once, however many collections
/// share it. Returns the number of issues.
fn report_lint(collections: &[&Arc<ResourceCollection>]) -> usize {
    let mut seen = FxHashSet::default();
    let mut issues = 0;
    for member in collections.iter().flat_map(|c| c.aggregates()) {
        let Some(report) = member.lint_report() else {
            continue;
        };
        if report.is_clean() || !seen.insert(member.full_path()) {
            continue;
        }
        issues += report.issues.len();
        log!("lint"; "{}\n{}", member.full_path(), report);
    }
    issues
}

/// `{ "<bundle>": [summary, ...], ... }` in registry order.
pub fn manifest(resolver: &Resolver, bundles: &[Arc<Bundle>]) -> Result<Map<String, Value>> {
    let mut manifest = Map::new();
    for bundle in bundles {
        let summaries = bundle
            .summaries(resolver)
            .with_context(|| format!("failed to build bundle `{}`", bundle.name()))?;
        manifest.insert(bundle.name().to_string(), serde_json::to_value(summaries)?);
    }
    Ok(manifest)
}

pub fn write_manifest(resolver: &Resolver, output: &Path) -> Result<()> {
    let manifest = manifest(resolver, &resolver.bundles()?)?;
    fs::create_dir_all(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let path = output.join(MANIFEST);
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
}
