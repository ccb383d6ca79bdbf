//! Logical resource paths.
//!
//! Resource paths are `/`-separated, relative to the resolver root, and
//! start with the owning bundle name (`core/widgets/menu.js`). They never
//! touch the filesystem until a bundle maps them onto its base directory.

/// Why a path was rejected by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    LeadingSeparator,
    TrailingSeparator,
    EscapesRoot,
    CollapsesToRoot,
}

impl PathRejection {
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Empty => "path is empty",
            Self::LeadingSeparator => "path must not start with '/'",
            Self::TrailingSeparator => "path must not end with '/'",
            Self::EscapesRoot => "path resolves outside the root",
            Self::CollapsesToRoot => "path resolves to the root",
        }
    }
}

/// Normalize a root-relative path, collapsing `.`, `..` and empty segments.
///
/// ```ignore
/// normalize("core/./lib/../menu.js") == Ok("core/menu.js")
/// normalize("core/../../etc")       == Err(PathRejection::EscapesRoot)
/// ```
pub fn normalize(path: &str) -> Result<String, PathRejection> {
    if path.is_empty() {
        return Err(PathRejection::Empty);
    }
    if path.starts_with('/') {
        return Err(PathRejection::LeadingSeparator);
    }
    if path.ends_with('/') {
        return Err(PathRejection::TrailingSeparator);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathRejection::EscapesRoot);
                }
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(PathRejection::CollapsesToRoot);
    }
    Ok(segments.join("/"))
}

/// Resolve `reference` against the directory of `from`.
///
/// Only `./` and `../` references are relative; anything else is returned
/// unchanged as a root-relative path.
pub fn join_relative(from: &str, reference: &str) -> String {
    if !(reference.starts_with("./") || reference.starts_with("../")) {
        return reference.to_string();
    }
    match from.rfind('/') {
        Some(idx) => format!("{}/{}", &from[..idx], reference),
        None => reference.to_string(),
    }
}
