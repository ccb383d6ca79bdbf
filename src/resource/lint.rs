//! Script linting with the oxc parser.

use std::fmt;

use oxc::allocator::Allocator;
use oxc::parser::Parser;
use oxc::span::SourceType;
use serde::Serialize;

use crate::debug;

/// Diagnostics collected for one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub issues: Vec<String>,
}

impl LintReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return f.write_str("no issues");
        }
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Parse `bytes` as a classic script and report the parser diagnostics.
///
/// Returns `None` when the bytes are not UTF-8; that is logged, not fatal.
pub fn lint_script(path: &str, bytes: &[u8]) -> Option<LintReport> {
    let Ok(source) = std::str::from_utf8(bytes) else {
        debug!("lint"; "skipping {}: not valid utf-8", path);
        return None;
    };

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    let issues = ret.errors.iter().map(ToString::to_string).collect();
    Some(LintReport { issues })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_script() {
        let report = lint_script("a.js", b"var a = 1; function f() { return a; }").unwrap();
        assert!(report.is_clean());
        assert_eq!(report.to_string(), "no issues");
    }

    #[test]
    fn test_syntax_error_reported() {
        let report = lint_script("a.js", b"var = ;").unwrap();
        assert!(!report.is_clean());
    }

    #[test]
    fn test_non_utf8_skipped() {
        assert!(lint_script("a.js", &[0xff, 0xfe, 0x00]).is_none());
    }
}
