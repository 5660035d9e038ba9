//! Route patterns for dynamic urlPaths.
//!
//! A stored urlPath may contain `[name]` (one segment) or `[...name]` (one
//! or more segments). Patterns compile to a regex plus ordered parameter
//! names; priority is a pure function of the pattern shape, so resolution
//! order is stable under permutation of the stored set.

use regex::Regex;

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
    regex_source: String,
    pub param_names: Vec<String>,
    pub is_catch_all: bool,
    pub static_segments: usize,
    pub dynamic_segments: usize,
}

/// A pattern match against a concrete urlPath.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The stored urlPath key that matched.
    pub key: String,
    pub pattern: RoutePattern,
}

const EXACT_BONUS: u64 = 2_000_000;
const DYNAMIC_BONUS: u64 = 1_000_000;

impl RoutePattern {
    /// Whether a stored urlPath contains dynamic segments at all.
    pub fn contains_dynamic(raw: &str) -> bool {
        raw.contains('[')
    }

    /// Compile a stored urlPath string. Returns `None` if the produced
    /// regex is invalid (malformed bracket syntax degrades to literal
    /// segments, so this is rare).
    pub fn compile(raw: &str) -> Option<Self> {
        let mut source = String::from("^");
        let mut param_names = Vec::new();
        let mut is_catch_all = false;
        let mut static_segments = 0;
        let mut dynamic_segments = 0;

        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            source.push('/');
            if let Some(name) = segment
                .strip_prefix("[...")
                .and_then(|s| s.strip_suffix(']'))
            {
                // Catch-all consumes one or more segments and does not
                // terminate the regex.
                source.push_str("(.+)");
                param_names.push(name.to_string());
                is_catch_all = true;
            } else if let Some(name) =
                segment.strip_prefix('[').and_then(|s| s.strip_suffix(']'))
            {
                source.push_str("([^/]+)");
                param_names.push(name.to_string());
                dynamic_segments += 1;
            } else {
                source.push_str(&regex::escape(segment));
                static_segments += 1;
            }
        }

        if raw == "/" || raw.is_empty() {
            source.push('/');
        }
        if !is_catch_all {
            source.push_str("/?$");
        }

        let regex = Regex::new(&source).ok()?;
        Some(Self {
            raw: raw.to_string(),
            regex,
            regex_source: source,
            param_names,
            is_catch_all,
            static_segments,
            dynamic_segments,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The regex source, as embedded in injection wrappers.
    pub fn regex_source(&self) -> &str {
        &self.regex_source
    }

    pub fn matches(&self, url_path: &str) -> bool {
        self.regex.is_match(url_path)
    }

    /// Extract named parameters from a concrete urlPath.
    pub fn params(&self, url_path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.regex.captures(url_path)?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Resolution priority: exact patterns strictly beat dynamic ones,
    /// dynamic strictly beat catch-alls, ties break on static segment
    /// count.
    pub fn priority(&self) -> u64 {
        let statics = self.static_segments as u64;
        if self.is_catch_all {
            statics
        } else if self.dynamic_segments == 0 {
            EXACT_BONUS + statics
        } else {
            DYNAMIC_BONUS + statics
        }
    }
}

/// Test every stored urlPath key against a concrete urlPath and return the
/// matches sorted by priority (stable: insertion order breaks ties).
pub fn find_matching_routes<'a, I>(url_path: &str, keys: I) -> Vec<RouteMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matches: Vec<RouteMatch> = keys
        .into_iter()
        .filter_map(|key| {
            let pattern = RoutePattern::compile(key)?;
            pattern.matches(url_path).then(|| RouteMatch {
                key: key.to_string(),
                pattern,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.pattern.priority().cmp(&a.pattern.priority()));
    matches
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
