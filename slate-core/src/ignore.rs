//! Glob-based path exclusion.
//!
//! The filter works on asset keys, never on absolute paths, so the bulk copy
//! and the live watcher ask exactly the same question. A key is ignored when
//! it, or any of its ancestor directories, matches a rule:
//!
//! - a pattern without `/` is matched against each single path component
//!   (`*.tmp`, `node_modules`, `.DS_Store`);
//! - a pattern with `/` is matched against the relative path prefix
//!   (`config/settings_data.json`, `assets/**/*.map`). A leading `/` is
//!   accepted and ignored.
//!
//! `*` never crosses a `/`; `**` does.

use glob::{MatchOptions, Pattern};

use crate::error::ConfigError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    anchored: bool,
}

/// Read-only, ordered set of ignore rules, fixed for the run.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    rules: Vec<Rule>,
}

impl IgnoreFilter {
    /// Compile `patterns`. Blank entries are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref().trim();
            let trimmed = raw.trim_start_matches('/').trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            let pattern = Pattern::new(trimmed).map_err(|source| ConfigError::Pattern {
                pattern: raw.to_string(),
                source,
            })?;
            rules.push(Rule {
                pattern,
                anchored: trimmed.contains('/'),
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.pattern.as_str())
    }

    /// Whether `key` (a `/`-separated relative path) is excluded.
    pub fn is_ignored(&self, key: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let mut prefix = String::with_capacity(key.len());
        for part in key.split('/').filter(|part| !part.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);

            let hit = self.rules.iter().any(|rule| {
                let candidate = if rule.anchored { prefix.as_str() } else { part };
                rule.pattern.matches_with(candidate, MATCH_OPTIONS)
            });
            if hit {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_ignores_nothing() {
        let filter = IgnoreFilter::default();
        assert!(!filter.is_ignored("a.liquid"));
        assert!(filter.is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = IgnoreFilter::new(&["[unclosed"]).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }), "got: {err}");
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn blank_patterns_are_skipped() {
        let filter = IgnoreFilter::new(&["", "  ", "/"]).expect("compile");
        assert!(filter.is_empty());
    }

    #[test]
    fn empty_key_is_never_ignored() {
        let filter = IgnoreFilter::new(&["*"]).expect("compile");
        assert!(!filter.is_ignored(""));
    }
}
