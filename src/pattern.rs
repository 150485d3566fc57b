//! The pattern sublanguage used for header, address and media-type matching.
//!
//! Three mutually exclusive forms, decided from the pattern text itself:
//!
//! - `/…/` — the interior is a verbatim regular expression. No anchors are
//!   added; the author controls anchoring.
//! - contains `*` — a glob. Each `*` matches one or more characters
//!   (non-greedy), everything else is literal. Anchored at both ends.
//! - anything else — byte-exact string equality. No regex is compiled, so
//!   `.` and other metacharacters in the value are compared literally.

use regex::Regex;

use crate::error::{MailknifeError, Result};

/// A compiled matcher over a string value.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact string equality (the fast path).
    Literal(String),
    /// A compiled regex (from the `/…/` or glob forms).
    Regex(Regex),
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// Fails with [`MailknifeError::InvalidPattern`] on an empty pattern or
    /// when the regex form does not compile.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(MailknifeError::InvalidPattern {
                pattern: String::new(),
                reason: "empty pattern".into(),
            });
        }

        if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
            let inner = &pattern[1..pattern.len() - 1];
            let rx = Regex::new(inner).map_err(|e| MailknifeError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Self::Regex(rx));
        }

        if pattern.contains('*') {
            let rx = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
                MailknifeError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                }
            })?;
            return Ok(Self::Regex(rx));
        }

        Ok(Self::Literal(pattern.to_string()))
    }

    /// Test a value against the compiled pattern. Never fails.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Literal(lit) => value == lit,
            Self::Regex(rx) => rx.is_match(value),
        }
    }
}

/// Translate a glob pattern into an anchored regex.
///
/// `*` becomes `.+?` (one-or-more, non-greedy) so that `*@gmail.com` does
/// not match `@gmail.com`; literal runs are escaped.
fn glob_to_regex(pattern: &str) -> String {
    let mut rx = String::with_capacity(pattern.len() + 8);
    rx.push('^');
    for (i, segment) in pattern.split('*').enumerate() {
        if i > 0 {
            rx.push_str(".+?");
        }
        rx.push_str(&regex::escape(segment));
    }
    rx.push('$');
    rx
}
