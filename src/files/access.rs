//! Whitelist/blacklist access rules for served paths.

use std::path::{Component, Path};

use glob::{MatchOptions, Pattern};

use crate::{MuxcdnError, Result};

// `*` stops at `/`, matching shell-style path globs.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Decides which filesystem paths may be served.
///
/// A path is allowed iff it matches at least one whitelist pattern and no
/// blacklist pattern. Paths with `..` components are always denied, so a
/// request cannot climb out of a whitelisted directory.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    whitelist: Vec<Pattern>,
    blacklist: Vec<Pattern>,
}

impl AccessPolicy {
    /// Build a policy from already compiled patterns.
    pub fn new(whitelist: Vec<Pattern>, blacklist: Vec<Pattern>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    /// Compile a policy from glob strings.
    ///
    /// Returns [`MuxcdnError::InvalidPattern`] for the first pattern that
    /// does not parse.
    pub fn from_patterns<S: AsRef<str>>(whitelist: &[S], blacklist: &[S]) -> Result<Self> {
        Ok(Self::new(compile(whitelist)?, compile(blacklist)?))
    }

    /// Whether `path` may be served.
    pub fn is_allowed(&self, path: &Path) -> bool {
        if path.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        any_match(&self.whitelist, path) && !any_match(&self.blacklist, path)
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            let pattern = p.as_ref();
            Pattern::new(pattern).map_err(|source| MuxcdnError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}

fn any_match(patterns: &[Pattern], path: &Path) -> bool {
    patterns
        .iter()
        .any(|p| p.matches_path_with(path, GLOB_OPTIONS))
}
