//! Matching the message envelope (top-level headers) before any part
//! selection happens.

use tracing::debug;

use crate::error::{MailknifeError, Result};
use crate::model::address::EmailAddress;
use crate::parser::header::{decode_encoded_words, HeaderMap};
use crate::pattern::Pattern;

/// Apply one `Header:pattern` criterion to a header map.
///
/// In address mode the header value is parsed as an address list and each
/// bare address is tested; the criterion passes if any address matches. In
/// plain mode the decoded header value is tested as a single string (no
/// splitting on commas). A missing header yields the empty value.
pub fn match_header(header: &HeaderMap, spec: &str, address_mode: bool) -> Result<bool> {
    let Some((name, pattern_text)) = spec.split_once(':') else {
        return Err(MailknifeError::MalformedSpec(spec.to_string()));
    };
    let pattern = Pattern::compile(pattern_text)?;

    let raw = header.get(name).unwrap_or("");
    let values: Vec<String> = if address_mode {
        EmailAddress::parse_list(raw)?
            .into_iter()
            .map(|a| a.address)
            .collect()
    } else {
        vec![decode_encoded_words(raw)?]
    };

    for value in &values {
        debug!(header = name, value = %value, pattern = pattern_text, "testing envelope value");
        if pattern.matches(value) {
            return Ok(true);
        }
    }

    Ok(false)
}
