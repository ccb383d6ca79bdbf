//! `watch`: rebuild on change.
//!
//! ```text
//! notify → Debouncer (300 ms quiet window) → Resolver::poll → rebuild
//! ```
//!
//! The watcher only decides *when* to poll; what changed is decided by the
//! resources themselves (`check_modified`). Bundles whose last build failed
//! are retried on every round, since an unbuilt bundle never reports a
//! modification.

mod debouncer;
mod roots;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use notify::RecursiveMode;
use rustc_hash::FxHashSet;

use super::build::{build_all, build_bundles, write_manifest};
use crate::bundle::Bundle;
use crate::logger::{status_error, status_success, status_unchanged};
use crate::resolver::Resolver;
use crate::utils::path::normalize_path;
use crate::{debug, log};
use debouncer::Debouncer;
use roots::WatchRoots;

/// Build once, then rebuild until the process is interrupted.
pub fn watch(resolver: &Resolver, config_files: &[PathBuf], output: &Path) -> Result<()> {
    let (tx, rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .context("failed to start file watcher")?;

    let mut roots = WatchRoots::new();
    let mut failed = FxHashSet::default();

    // Watch before the first build so no edit falls between the two.
    roots.set_desired(watch_roots(resolver, config_files), &mut watcher);
    match build_all(resolver, output, false) {
        Ok(_) => status_success("initial build done, watching for changes"),
        Err(e) => {
            let bundles = resolver.bundles().unwrap_or_default();
            failed.extend(bundles.iter().map(|b| b.name().to_string()));
            status_error("initial build failed", &format!("{e:#}"));
        }
    }

    let output = normalize_path(output);
    let mut debouncer = Debouncer::new(output.clone());
    loop {
        match rx.recv_timeout(debouncer.sleep_duration()) {
            Ok(Ok(event)) => debouncer.add_event(&event),
            Ok(Err(e)) => log!("watch"; "notify error: {}", e),
            Err(RecvTimeoutError::Timeout) => {
                roots.maintain(&mut watcher);
                let Some(changes) = debouncer.take_if_ready() else {
                    continue;
                };
                debug!("watch"; "{} path(s) changed", changes.len());
                if rebuild(resolver, &output, &mut failed) {
                    roots.set_desired(watch_roots(resolver, config_files), &mut watcher);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// One poll-and-rebuild round. Returns whether the registry was reloaded.
fn rebuild(resolver: &Resolver, output: &Path, failed: &mut FxHashSet<String>) -> bool {
    let outcome = match resolver.poll() {
        Ok(outcome) => outcome,
        Err(e) => {
            status_error("config reload failed", &format!("{e:#}"));
            return false;
        }
    };

    let bundles = match resolver.bundles() {
        Ok(bundles) => bundles,
        Err(e) => {
            status_error("config reload failed", &format!("{e:#}"));
            return outcome.reloaded;
        }
    };
    let targets: Vec<Arc<Bundle>> = bundles
        .into_iter()
        .filter(|b| {
            outcome.reloaded
                || failed.contains(b.name())
                || outcome.modified.iter().any(|name| name == b.name())
        })
        .collect();

    if targets.is_empty() {
        status_unchanged("no bundle changed");
        return outcome.reloaded;
    }

    let names: Vec<&str> = targets.iter().map(|b| b.name()).collect();
    let result = build_bundles(resolver, &targets, output, true)
        .and_then(|report| write_manifest(resolver, output).map(|()| report));
    match result {
        Ok(report) => {
            failed.clear();
            let mut message = format!("rebuilt: {}", names.join(", "));
            if report.lint_issues > 0 {
                message.push_str(&format!(" ({} lint issue(s))", report.lint_issues));
            }
            status_success(&message);
        }
        Err(e) => {
            failed.extend(names.iter().map(|name| name.to_string()));
            status_error(&format!("failed: {}", names.join(", ")), &format!("{e:#}"));
        }
    }
    outcome.reloaded
}

/// Config file directories (flat) and bundle base directories (recursive),
/// without roots nested in a recursive one.
fn watch_roots(resolver: &Resolver, config_files: &[PathBuf]) -> Vec<(PathBuf, RecursiveMode)> {
    let mut recursive: Vec<PathBuf> = resolver
        .bundles()
        .unwrap_or_default()
        .iter()
        .map(|b| normalize_path(&b.config().base_path))
        .collect();
    recursive.sort();
    recursive.dedup();

    let mut roots: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for path in recursive {
        if !roots.iter().any(|(root, _)| path.starts_with(root)) {
            roots.push((path, RecursiveMode::Recursive));
        }
    }

    let mut flat: Vec<PathBuf> = config_files
        .iter()
        .map(|file| normalize_path(file.parent().unwrap_or(Path::new("."))))
        .collect();
    flat.sort();
    flat.dedup();
    for path in flat {
        if !roots.iter().any(|(root, _)| path.starts_with(root)) {
            roots.push((path, RecursiveMode::NonRecursive));
        }
    }
    roots
}
