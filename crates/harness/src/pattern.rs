//! Glob-style URL matching for route rules
//!
//! Patterns follow the browser-automation convention: `**` matches any
//! run of characters including `/`, `*` matches within a single path
//! segment, `?` matches one character. Matching is anchored to the whole
//! URL, query string included.

use regex::Regex;

use crate::error::{HarnessError, HarnessResult};

/// A compiled URL glob
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a glob into a pattern. Compilation happens once, at rule
    /// registration, so matching during dispatch is allocation-free.
    pub fn new(pattern: &str) -> HarnessResult<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| HarnessError::InvalidPattern(format!("{pattern}: {e}")))?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// Whether the full URL matches this pattern
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The original glob text, as registered
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for RoutePattern {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            c if r"\.+()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}
