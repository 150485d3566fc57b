//! `Content-Type` / `Content-Disposition` value parsing and the media-type
//! to file-extension table used by `--save-file`.

use std::collections::BTreeMap;

use crate::error::{MailknifeError, Result};

/// Parameters of a media-type or disposition value, keys lower-cased.
pub type MimeParams = BTreeMap<String, String>;

/// Parse a `Content-Type` style value into `type/subtype` plus parameters.
///
/// The media type is normalized to lower case. Parameter values may be
/// quoted; a structurally broken value is a hard error.
pub fn parse_media_type(value: &str) -> Result<(String, MimeParams)> {
    let err = |reason: &str| MailknifeError::ContentTypeParse {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = value.split(';');
    let mtype = segments.next().unwrap_or("").trim().to_ascii_lowercase();

    let (primary, subtype) = mtype.split_once('/').ok_or_else(|| err("expected type/subtype"))?;
    if primary.is_empty() || subtype.is_empty() {
        return Err(err("empty type or subtype"));
    }
    if !is_token(primary) || !is_token(subtype) {
        return Err(err("invalid token in media type"));
    }

    let mut params = MimeParams::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            // Tolerated: trailing semicolon.
            continue;
        }
        let (key, val) = segment.split_once('=').ok_or_else(|| err("parameter without `=`"))?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() || !is_token(&key) {
            return Err(err("invalid parameter name"));
        }
        params.insert(key, unquote(val.trim()));
    }

    Ok((mtype, params))
}

/// Parse a `Content-Disposition` value, tolerantly.
///
/// Disposition is advisory metadata: absence or a malformed value yields
/// `None` rather than an error. The disposition token is lower-cased.
pub fn parse_disposition(value: Option<&str>) -> Option<(String, MimeParams)> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    // Reuse the media-type grammar by faking a subtype-free token.
    let mut segments = value.split(';');
    let token = segments.next().unwrap_or("").trim().to_ascii_lowercase();
    if token.is_empty() || !is_token(&token) {
        return None;
    }

    let mut params = MimeParams::new();
    for segment in segments {
        let segment = segment.trim();
        let Some((key, val)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.insert(key, unquote(val.trim()));
        }
    }

    Some((token, params))
}

/// RFC 2045 token check (printable ASCII minus tspecials).
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'=')
        })
}

/// Strip surrounding double-quotes and resolve `\"`-style escapes.
fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut escaped = false;
        for ch in inner.chars() {
            if escaped {
                out.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else {
                out.push(ch);
            }
        }
        out
    } else {
        s.to_string()
    }
}

/// File extension for a media type, used when a saved part has no
/// disposition filename.
pub fn extension_for_media_type(media_type: &str) -> &'static str {
    match media_type {
        "text/html" => ".html",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "text/calendar" => ".ics",
        "application/pdf" => ".pdf",
        "application/json" => ".json",
        "application/zip" => ".zip",
        "application/xml" | "text/xml" => ".xml",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "message/rfc822" => ".eml",
        _ => ".bin",
    }
}
