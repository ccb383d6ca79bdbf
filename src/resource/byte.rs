//! Resource backed by a fixed in-memory buffer.

use std::sync::Arc;

use super::{Entry, Resource};

/// Immutable bytes with a fixed timestamp. Never reports modification.
///
/// Compressed collection artifacts are byte resources.
#[derive(Debug)]
pub struct ByteResource {
    base_path: String,
    path: Arc<str>,
    origin: Option<Arc<str>>,
    entry: Arc<Entry>,
}

impl ByteResource {
    pub fn new(
        base_path: impl Into<String>,
        path: impl Into<Arc<str>>,
        bytes: impl Into<Vec<u8>>,
        last_modified: i64,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            base_path: base_path.into(),
            path: path.into(),
            origin: None,
            entry: Arc::new(Entry::new(last_modified, bytes)),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<Arc<str>>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl Resource for ByteResource {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    fn path(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn entry(&self) -> Arc<Entry> {
        Arc::clone(&self.entry)
    }

    fn check_modified(&self) -> bool {
        false
    }
}
