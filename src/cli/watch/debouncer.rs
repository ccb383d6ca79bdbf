use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use rustc_hash::FxHashSet;

pub(super) const DEBOUNCE_MS: u64 = 300;

/// Collects changed paths until events stop arriving for [`DEBOUNCE_MS`].
pub(super) struct Debouncer {
    /// Written by the build itself; never a source.
    ignored: PathBuf,
    pub(super) changes: FxHashSet<PathBuf>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(ignored: PathBuf) -> Self {
        Self {
            ignored,
            changes: FxHashSet::default(),
            last_event: None,
        }
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) || path.starts_with(&self.ignored) {
                continue;
            }
            self.changes.insert(path.clone());
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the changed paths once the debounce window has passed.
    pub(super) fn take_if_ready(&mut self) -> Option<FxHashSet<PathBuf>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.changes))
    }

    pub(super) fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        last_event.elapsed() >= Duration::from_millis(DEBOUNCE_MS) && !self.changes.is_empty()
    }

    /// Time until the window could close.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(1);
        };
        Duration::from_millis(DEBOUNCE_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}
