//! RFC 5322 header parsing: block splitting, folding, and RFC 2047
//! encoded-words.

use encoding_rs::Encoding;

use crate::error::{MailknifeError, Result};

/// Ordered, case-insensitive multimap of header name → raw unfolded value.
///
/// A header may repeat; all occurrences are retained in source order.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Parse a raw header block (everything before the blank line).
    ///
    /// Continuation lines (starting with space or tab) are joined with the
    /// previous header. Lines without a colon that are not continuations are
    /// skipped; field names keep their original spelling.
    pub fn parse(raw: &[u8]) -> Self {
        let text = decode_header_bytes(raw);
        let mut entries: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = entries.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
            } else if let Some(colon_pos) = line.find(':') {
                let name = line[..colon_pos].trim().to_string();
                let value = line[colon_pos + 1..].trim().to_string();
                entries.push((name, value));
            }
        }

        Self { entries }
    }

    /// First value for a header name (case-insensitive), if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header name, in source order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a raw message into its header block and body at the first blank
/// line (`\r\n\r\n` or `\n\n`).
///
/// A missing separator is a fatal parse error.
pub fn split_message(input: &[u8]) -> Result<(&[u8], &[u8])> {
    if let Some(pos) = find(input, b"\r\n\r\n") {
        return Ok((&input[..pos], &input[pos + 4..]));
    }
    if let Some(pos) = find(input, b"\n\n") {
        return Ok((&input[..pos], &input[pos + 2..]));
    }
    // A header block terminated by EOF with no body at all.
    if input.ends_with(b"\r\n") || input.ends_with(b"\n") {
        return Ok((input, &input[input.len()..]));
    }
    Err(MailknifeError::MalformedMessage(
        "missing blank line between header and body".into(),
    ))
}

/// Naive subsequence search; inputs are mail-message scale.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every
/// byte), so a stray 8-bit byte in a header never aborts the parse.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Resolve an IANA charset label to an `encoding_rs` decoder.
pub fn resolve_charset(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| MailknifeError::UnknownCharset(label.to_string()))
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between adjacent encoded-words is elided (RFC 2047 §6.2).
/// A `=?` that never closes with `?=` is passed through verbatim; a closed
/// encoded-word with an unknown charset or an undecodable payload is an
/// error (never silently kept in its encoded form).
pub fn decode_encoded_words(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        match decode_one_word(after_start)? {
            Some(decoded) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    result.push_str(before);
                }
                result.push_str(&decoded.text);
                remaining = &after_start[decoded.consumed..];
                last_was_encoded = true;
            }
            None => {
                // No terminator in sight: plain text that happens to
                // contain "=?".
                result.push_str(before);
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    Ok(result)
}

struct DecodedWord {
    text: String,
    /// Bytes consumed from the string *after* the initial `=?`.
    consumed: usize,
}

/// Decode one encoded-word body: `charset?encoding?encoded_text?=`.
///
/// Returns `Ok(None)` when the `?=` terminator is absent (not an
/// encoded-word at all); errors when the word is closed but invalid.
fn decode_one_word(s: &str) -> Result<Option<DecodedWord>> {
    let Some(end) = s.find("?=") else {
        return Ok(None);
    };
    let word = &s[..end];

    let mut fields = word.splitn(3, '?');
    let (charset, encoding, payload) = match (fields.next(), fields.next(), fields.next()) {
        (Some(c), Some(e), Some(p)) => (c, e, p),
        _ => return Err(MailknifeError::MalformedEncodedWord(word.to_string())),
    };
    if charset.is_empty() || payload.contains(' ') {
        return Err(MailknifeError::MalformedEncodedWord(word.to_string()));
    }

    let bytes = match encoding {
        "B" | "b" => decode_b_payload(payload)
            .ok_or_else(|| MailknifeError::MalformedEncodedWord(word.to_string()))?,
        "Q" | "q" => decode_q_payload(payload)
            .ok_or_else(|| MailknifeError::MalformedEncodedWord(word.to_string()))?,
        _ => return Err(MailknifeError::MalformedEncodedWord(word.to_string())),
    };

    let enc = resolve_charset(charset)?;
    let (text, _, _) = enc.decode(&bytes);

    Ok(Some(DecodedWord {
        text: text.into_owned(),
        consumed: end + 2,
    }))
}

/// Decode the B (base64) payload of an encoded-word.
fn decode_b_payload(payload: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.decode(payload).ok()
}

/// Decode the Q payload (RFC 2047): underscores → spaces, `=XX` → byte.
///
/// A truncated or non-hex `=` escape makes the whole payload invalid.
fn decode_q_payload(payload: &str) -> Option<Vec<u8>> {
    let bytes = payload.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
                result.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message_lf() {
        let (hdr, body) = split_message(b"Subject: hi\n\nbody\n").unwrap();
        assert_eq!(hdr, b"Subject: hi");
        assert_eq!(body, b"body\n");
    }

    #[test]
    fn test_split_message_crlf() {
        let (hdr, body) = split_message(b"Subject: hi\r\n\r\nbody\r\n").unwrap();
        assert_eq!(hdr, b"Subject: hi");
        assert_eq!(body, b"body\r\n");
    }

    #[test]
    fn test_split_message_missing_separator() {
        assert!(matches!(
            split_message(b"Subject: hi"),
            Err(MailknifeError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_header_map_unfolds_and_repeats() {
        let h =
            HeaderMap::parse(b"Subject: a long\n\tsubject line\nReceived: one\nReceived: two\n");
        assert_eq!(h.get("subject"), Some("a long subject line"));
        assert_eq!(h.get("Received"), Some("one"));
        let all: Vec<_> = h.get_all("received").collect();
        assert_eq!(all, vec!["one", "two"]);
    }

    #[test]
    fn test_header_map_missing() {
        let h = HeaderMap::parse(b"Subject: hi\n");
        assert_eq!(h.get("From"), None);
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        let input = "=?UTF-8?B?SG9sYSBtdW5kbw==?=";
        assert_eq!(decode_encoded_words(input).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        let input = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input).unwrap(), "café");
    }

    #[test]
    fn test_decode_adjacent_words_elide_whitespace() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input).unwrap(), "Re: Hola there");
    }

    #[test]
    fn test_decode_emoji_subject() {
        // "mail ✉️"
        let input = "=?UTF-8?B?bWFpbCDinInvuI8=?=";
        assert_eq!(decode_encoded_words(input).unwrap(), "mail ✉️");
    }

    #[test]
    fn test_unterminated_word_is_verbatim() {
        let input = "is 1 =? 2";
        assert_eq!(decode_encoded_words(input).unwrap(), "is 1 =? 2");
    }

    #[test]
    fn test_unknown_charset_is_an_error() {
        let input = "=?X-NO-SUCH-CHARSET?B?SG9sYQ==?=";
        assert!(matches!(
            decode_encoded_words(input),
            Err(MailknifeError::UnknownCharset(_))
        ));
    }

    #[test]
    fn test_bad_encoding_letter_is_an_error() {
        let input = "=?UTF-8?Z?SG9sYQ==?=";
        assert!(matches!(
            decode_encoded_words(input),
            Err(MailknifeError::MalformedEncodedWord(_))
        ));
    }

    #[test]
    fn test_corrupt_b_payload_is_an_error() {
        let input = "=?UTF-8?B?###?=";
        assert!(matches!(
            decode_encoded_words(input),
            Err(MailknifeError::MalformedEncodedWord(_))
        ));
    }

    #[test]
    fn test_invalid_q_escape_is_an_error() {
        let input = "=?UTF-8?Q?bad=ZZescape?=";
        assert!(matches!(
            decode_encoded_words(input),
            Err(MailknifeError::MalformedEncodedWord(_))
        ));
        let truncated = "=?UTF-8?Q?end=A?=";
        assert!(matches!(
            decode_encoded_words(truncated),
            Err(MailknifeError::MalformedEncodedWord(_))
        ));
    }

    #[test]
    fn test_resolve_charset() {
        assert!(resolve_charset("utf-8").is_ok());
        assert!(resolve_charset("ISO-2022-JP").is_ok());
        assert!(resolve_charset("no-such-charset").is_err());
    }
}
