//! Building the MIME part tree: recursive entity parsing and the
//! boundary-delimited multipart scanner (RFC 2046).

use tracing::debug;

use crate::error::{MailknifeError, Result};
use crate::model::part::{Part, PartId, PartTree};
use crate::parser::header::{split_message, HeaderMap};
use crate::parser::mime::{parse_disposition, parse_media_type, MimeParams};

/// Build the part tree for a complete message (header block + body).
pub fn build_tree(input: &[u8]) -> Result<PartTree> {
    let (header_bytes, body) = split_message(input)?;
    build_tree_from(HeaderMap::parse(header_bytes), body)
}

/// Build the part tree for a body whose top header block is already parsed.
///
/// Used by the pipeline, which parses the top header once for envelope
/// matching before any tree construction happens.
pub fn build_tree_from(header: HeaderMap, body: &[u8]) -> Result<PartTree> {
    let mut parts = Vec::new();
    let root = build_entity(&mut parts, header, body)?;
    Ok(PartTree::new(parts, root))
}

/// Recursively build one entity and its sub-entities into the arena.
///
/// Parents are pushed before their children, so arena order is pre-order.
fn build_entity(parts: &mut Vec<Part>, header: HeaderMap, body: &[u8]) -> Result<PartId> {
    let (media_type, media_type_params) = entity_media_type(&header)?;
    let disposition = parse_disposition(header.get("Content-Disposition"));

    debug!(media_type = %media_type, body_len = body.len(), "building entity");

    let id = PartId(parts.len());
    parts.push(Part::new(
        header,
        media_type.clone(),
        media_type_params.clone(),
        disposition,
    ));

    let boundary = media_type_params.get("boundary").map(String::as_str);
    if media_type.starts_with("multipart/") && boundary.is_some_and(|b| !b.is_empty()) {
        let mut children = Vec::new();
        for section in split_multipart(body, boundary.unwrap_or_default())? {
            let (sub_header, sub_body) = split_entity(section)?;
            children.push(build_entity(parts, sub_header, sub_body)?);
        }
        if children.is_empty() {
            // Only a closing delimiter: a degenerate empty leaf, not an
            // interior node.
            parts[id.0].set_body(Vec::new());
        }
        parts[id.0].children = children;
        return Ok(id);
    }

    // Leaf. Quoted-printable is reversed eagerly here; base64 and charset
    // decoding stay deferred until the part is drained.
    let transfer_encoding = parts[id.0]
        .header
        .get("Content-Transfer-Encoding")
        .map(|v| v.trim().to_ascii_lowercase());
    let bytes = if transfer_encoding.as_deref() == Some("quoted-printable") {
        quoted_printable::decode(body, quoted_printable::ParseMode::Robust).map_err(|e| {
            MailknifeError::Decode {
                encoding: "quoted-printable".into(),
                reason: e.to_string(),
            }
        })?
    } else {
        body.to_vec()
    };
    parts[id.0].set_body(bytes);

    Ok(id)
}

/// Media type of an entity: parsed `Content-Type`, or the `text/plain`
/// default when the header is absent or empty. A present-but-malformed
/// value is a hard error.
fn entity_media_type(header: &HeaderMap) -> Result<(String, MimeParams)> {
    match header.get("Content-Type").map(str::trim) {
        None | Some("") => Ok(("text/plain".to_string(), MimeParams::new())),
        Some(value) => parse_media_type(value),
    }
}

/// Split a sub-entity into its header block and body.
///
/// A sub-entity may legitimately start with the blank line itself (no
/// headers at all); a section with no separator anywhere violates the
/// multipart structure.
fn split_entity(section: &[u8]) -> Result<(HeaderMap, &[u8])> {
    if let Some(rest) = section.strip_prefix(b"\r\n") {
        return Ok((HeaderMap::default(), rest));
    }
    if let Some(rest) = section.strip_prefix(b"\n") {
        return Ok((HeaderMap::default(), rest));
    }
    let (header_bytes, body) = split_message(section)
        .map_err(|_| MailknifeError::MultipartRead("part without header/body separator".into()))?;
    Ok((HeaderMap::parse(header_bytes), body))
}

/// Split a multipart body into its sub-entity byte ranges.
///
/// Delimiter lines are `--boundary` at the start of a line, optionally
/// followed by transport padding; `--boundary--` closes the body. The line
/// break preceding a delimiter belongs to the delimiter, the preamble and
/// epilogue are discarded. A body with no opening delimiter, or that ends
/// before the closing delimiter, is a boundary violation.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let mut sections = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut closed = false;

    let mut pos = 0;
    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| pos + p + 1)
            .unwrap_or(body.len());
        let line = &body[pos..line_end];

        if let Some(kind) = classify_line(line, delimiter.as_bytes()) {
            // Content before the first delimiter is the preamble; discard.
            if let Some(start) = current_start {
                sections.push(strip_trailing_newline(&body[start..pos]));
            }
            if kind == Delimiter::Close {
                closed = true;
                break;
            }
            current_start = Some(line_end);
        }

        pos = line_end;
    }

    if !closed {
        if current_start.is_none() {
            return Err(MailknifeError::MultipartRead(format!(
                "boundary {boundary:?} not found in body"
            )));
        }
        return Err(MailknifeError::MultipartRead(format!(
            "EOF before closing boundary {boundary:?}"
        )));
    }

    Ok(sections)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

/// Classify one line as an opening delimiter, a closing delimiter, or
/// ordinary content. Trailing transport padding (spaces, tabs) is ignored.
fn classify_line(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let mut line = line;
    while let Some((&last, rest)) = line.split_last() {
        if matches!(last, b'\n' | b'\r' | b' ' | b'\t') {
            line = rest;
        } else {
            break;
        }
    }
    if line == delimiter {
        Some(Delimiter::Open)
    } else if line.len() == delimiter.len() + 2
        && line.starts_with(delimiter)
        && line.ends_with(b"--")
    {
        Some(Delimiter::Close)
    } else {
        None
    }
}

/// Drop the line break that precedes a delimiter from a section slice.
fn strip_trailing_newline(section: &[u8]) -> &[u8] {
    if let Some(s) = section.strip_suffix(b"\r\n") {
        s
    } else if let Some(s) = section.strip_suffix(b"\n") {
        s
    } else {
        section
    }
}
