//! The MIME part tree: an arena of [`Part`] records addressed by index,
//! plus the per-part decode pipeline.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{MailknifeError, Result};
use crate::parser::header::{resolve_charset, HeaderMap};
use crate::parser::mime::MimeParams;

/// Index of a [`Part`] within its [`PartTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartId(pub(crate) usize);

/// Body bytes of a leaf, tracked through their single-consumption lifecycle.
///
/// Quoted-printable is already reversed at build time, so `Raw` holds the
/// transport bytes minus QP; base64 and charset decoding happen when the
/// part is drained.
#[derive(Debug, Clone)]
enum BodyState {
    /// A multipart node; content lives in the children.
    None,
    /// A leaf that has not been drained yet.
    Raw(Vec<u8>),
    /// A leaf whose decode pipeline has been drained once.
    Consumed,
}

/// One MIME entity: a header block plus either body bytes or sub-entities.
#[derive(Debug, Clone)]
pub struct Part {
    /// Raw (unfolded) headers of this entity.
    pub header: HeaderMap,
    /// Normalized `type/subtype`, lower-cased. `text/plain` when the
    /// `Content-Type` header is absent.
    pub media_type: String,
    /// `Content-Type` parameters (`charset`, `boundary`, …).
    pub media_type_params: MimeParams,
    /// Lower-cased `Content-Disposition` token, if present and well-formed.
    pub disposition: Option<String>,
    /// `Content-Disposition` parameters.
    pub disposition_params: MimeParams,
    /// Sub-entities, in document order. Mutually exclusive with a body.
    pub children: Vec<PartId>,

    body: BodyState,
}

impl Part {
    pub(crate) fn new(
        header: HeaderMap,
        media_type: String,
        media_type_params: MimeParams,
        disposition: Option<(String, MimeParams)>,
    ) -> Self {
        let (disposition, disposition_params) = match disposition {
            Some((d, p)) => (Some(d), p),
            None => (None, MimeParams::new()),
        };
        Self {
            header,
            media_type,
            media_type_params,
            disposition,
            disposition_params,
            children: Vec::new(),
            body: BodyState::None,
        }
    }

    pub(crate) fn set_body(&mut self, bytes: Vec<u8>) {
        self.body = BodyState::Raw(bytes);
    }

    /// `true` iff this part has no sub-entities.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `true` iff `Content-Disposition` is `attachment`.
    pub fn is_attachment(&self) -> bool {
        self.disposition.as_deref() == Some("attachment")
    }

    /// The disposition filename, for attachments that carry one.
    pub fn attachment_filename(&self) -> Option<&str> {
        if !self.is_attachment() {
            return None;
        }
        self.disposition_params.get("filename").map(String::as_str)
    }

    /// Undecoded body bytes, if this leaf has not been drained yet.
    pub fn raw_body(&self) -> Option<&[u8]> {
        match &self.body {
            BodyState::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The `Content-Transfer-Encoding` token, lower-cased.
    fn transfer_encoding(&self) -> Option<String> {
        self.header
            .get("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase())
    }
}

/// The tree of parts built from one message body.
///
/// Parts are stored in a flat arena; traversal is iterative, so pathological
/// nesting cannot overflow the stack.
#[derive(Debug, Clone)]
pub struct PartTree {
    parts: Vec<Part>,
    root: PartId,
}

impl PartTree {
    pub(crate) fn new(parts: Vec<Part>, root: PartId) -> Self {
        Self { parts, root }
    }

    /// The part representing the top-level entity's body.
    pub fn root(&self) -> PartId {
        self.root
    }

    pub fn part(&self, id: PartId) -> &Part {
        &self.parts[id.0]
    }

    /// Leaf parts in document order (pre-order depth-first walk).
    ///
    /// Multipart nodes are never yielded; only their leaf descendants are
    /// selectable.
    pub fn leaves(&self) -> Vec<PartId> {
        let mut result = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let part = self.part(id);
            if part.is_leaf() {
                result.push(id);
            } else {
                for &child in part.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        result
    }

    /// Drain a leaf part's decode pipeline: base64 transfer-decoding, then
    /// charset conversion to UTF-8 if a `charset` parameter is declared.
    ///
    /// Content is single-consumption: a second drain of the same part is a
    /// [`MailknifeError::ContentConsumed`] error, and any decode failure is
    /// surfaced annotated with the encoding name — never a silent partial
    /// result or replacement characters.
    pub fn take_decoded(&mut self, id: PartId) -> Result<Vec<u8>> {
        let part = &mut self.parts[id.0];
        let raw = match std::mem::replace(&mut part.body, BodyState::Consumed) {
            BodyState::Raw(bytes) => bytes,
            BodyState::Consumed => return Err(MailknifeError::ContentConsumed),
            BodyState::None => {
                part.body = BodyState::None;
                return Err(MailknifeError::ContentConsumed);
            }
        };
        let part = &self.parts[id.0];

        let mut bytes = raw;
        if part.transfer_encoding().as_deref() == Some("base64") {
            let compact: Vec<u8> = bytes
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            bytes = BASE64
                .decode(&compact)
                .map_err(|e| MailknifeError::Decode {
                    encoding: "base64".into(),
                    reason: e.to_string(),
                })?;
        }

        if let Some(charset) = part.media_type_params.get("charset").filter(|c| !c.is_empty()) {
            let enc = resolve_charset(charset)?;
            let (text, _, had_errors) = enc.decode(&bytes);
            if had_errors {
                return Err(MailknifeError::Decode {
                    encoding: charset.clone(),
                    reason: "invalid byte sequence".into(),
                });
            }
            bytes = text.into_owned().into_bytes();
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::part::build_tree;

    #[test]
    fn test_leaf_roundtrip_without_encodings() {
        let msg = b"Subject: t\n\nhello body\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert!(tree.part(root).is_leaf());
        assert_eq!(tree.take_decoded(root).unwrap(), b"hello body\n");
    }

    #[test]
    fn test_second_drain_is_an_error() {
        let msg = b"Subject: t\n\nbody\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        tree.take_decoded(root).unwrap();
        assert!(matches!(
            tree.take_decoded(root),
            Err(MailknifeError::ContentConsumed)
        ));
    }

    #[test]
    fn test_base64_leaf_decodes() {
        let msg = b"Content-Type: application/octet-stream\nContent-Transfer-Encoding: base64\n\naGVsbG8g\nd29ybGQ=\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert_eq!(tree.take_decoded(root).unwrap(), b"hello world");
    }

    #[test]
    fn test_corrupt_base64_is_a_decode_error() {
        let msg = b"Content-Transfer-Encoding: base64\n\n!!!not-base64!!!\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert!(matches!(
            tree.take_decoded(root),
            Err(MailknifeError::Decode { .. })
        ));
    }

    #[test]
    fn test_charset_decode_to_utf8() {
        // "café" in ISO-8859-1
        let msg = b"Content-Type: text/plain; charset=ISO-8859-1\n\ncaf\xe9";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert_eq!(tree.take_decoded(root).unwrap(), "café".as_bytes());
    }

    #[test]
    fn test_empty_charset_param_skips_conversion() {
        let msg = b"Content-Type: text/plain; charset=\"\"\n\nraw \xe9 bytes\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert_eq!(tree.take_decoded(root).unwrap(), b"raw \xe9 bytes\n");
    }

    #[test]
    fn test_unknown_charset_surfaces_at_drain_time() {
        let msg = b"Content-Type: text/plain; charset=x-bogus\n\nbody\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        assert!(matches!(
            tree.take_decoded(root),
            Err(MailknifeError::UnknownCharset(_))
        ));
    }

    #[test]
    fn test_invalid_bytes_for_charset_error_names_charset() {
        // 0xC3 alone is an incomplete UTF-8 sequence.
        let msg = b"Content-Type: text/plain; charset=utf-8\n\n\xc3\n";
        let mut tree = build_tree(msg).unwrap();
        let root = tree.root();
        match tree.take_decoded(root) {
            Err(MailknifeError::Decode { encoding, .. }) => assert_eq!(encoding, "utf-8"),
            other => panic!("expected charset decode error, got {other:?}"),
        }
    }
}
