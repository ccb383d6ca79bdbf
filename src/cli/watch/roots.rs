use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Keeps the watcher attached to the desired roots.
///
/// Roots that do not exist yet, or were removed and recreated, are
/// attached on the next [`maintain`](Self::maintain).
pub(super) struct WatchRoots {
    desired: Vec<(PathBuf, RecursiveMode)>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new() -> Self {
        Self {
            desired: Vec::new(),
            attached: FxHashSet::default(),
        }
    }

    /// Replace the desired roots, detaching the ones no longer wanted.
    pub(super) fn set_desired(
        &mut self,
        roots: Vec<(PathBuf, RecursiveMode)>,
        watcher: &mut RecommendedWatcher,
    ) {
        self.attached.retain(|path| {
            let keep = roots.iter().any(|(root, _)| root == path);
            if !keep {
                watcher.unwatch(path).ok();
            }
            keep
        });
        self.desired = roots;
        self.maintain(watcher);
    }

    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        self.attached.retain(|path| path.exists());

        for (path, mode) in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            match watcher.watch(path, *mode) {
                Ok(()) => {
                    self.attached.insert(path.clone());
                    crate::debug!("watch"; "watching {}", path.display());
                }
                Err(e) => crate::debug!("watch"; "cannot watch {}: {}", path.display(), e),
            }
        }
    }
}
