//! `@requires` tag extraction.
//!
//! A script declares what it depends on with `@requires <path>` anywhere in
//! its text, usually inside a comment:
//!
//! ```text
//! /* @requires core/dom.js
//!  * @requires ./menu.css */
//! // @requires ../base.js
//! ```

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

static REQUIRES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@requires\s+([^\s*]+)").unwrap());

/// Declared dependency paths, in declaration order, without duplicates.
///
/// Invalid UTF-8 sequences are replaced before scanning.
pub fn extract(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut seen = FxHashSet::default();
    REQUIRES
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['*', '/', ';', ',']))
        .filter(|path| !path.is_empty())
        .filter(|path| seen.insert(path.to_string()))
        .map(str::to_string)
        .collect()
}
