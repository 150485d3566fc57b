//! Email address list parsing (RFC 5322 §3.4).

use crate::error::{MailknifeError, Result};
use crate::parser::header::decode_encoded_words;

/// A parsed mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty), encoded-words resolved.
    pub display_name: String,
    /// The bare email address (`local-part@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox from a header value segment.
    ///
    /// Supported forms: `user@domain`, `<user@domain>`,
    /// `Display Name <user@domain>`, `"Last, First" <user@domain>` and
    /// RFC 2047 encoded display names. A segment whose bare address lacks
    /// `@` is an error; this is never absorbed.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let err = |reason: &str| MailknifeError::AddressParse {
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(err("empty address"));
        }

        if let Some(angle_start) = trimmed.rfind('<') {
            let Some(angle_end) = trimmed.rfind('>') else {
                return Err(err("unterminated angle bracket"));
            };
            if angle_end < angle_start {
                return Err(err("mismatched angle brackets"));
            }
            let address = trimmed[angle_start + 1..angle_end].trim().to_string();
            if !address.contains('@') {
                return Err(err("address without `@`"));
            }
            let name_part = strip_quotes(trimmed[..angle_start].trim());
            let display_name = decode_encoded_words(&name_part)?;
            return Ok(Self {
                display_name,
                address,
            });
        }

        if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
            return Ok(Self {
                display_name: String::new(),
                address: trimmed.to_string(),
            });
        }

        Err(err("not a mailbox"))
    }

    /// Parse a comma-separated address-list header value.
    ///
    /// Commas inside quoted strings and angle brackets do not split:
    /// `"Last, First" <a@b.com>, other@c.com` is two mailboxes. An empty
    /// list or any malformed mailbox is an error which propagates to the
    /// caller (a query-level failure, distinct from "no match").
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        if raw.trim().is_empty() {
            return Err(MailknifeError::AddressParse {
                value: raw.to_string(),
                reason: "empty address list".into(),
            });
        }

        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    results.push(Self::parse(&current)?);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        results.push(Self::parse(&current)?);

        Ok(results)
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
