//! Centralized error types for mailknife.

use thiserror::Error;

/// All errors produced by the mailknife library.
///
/// The first two variants are expected, branchable outcomes (the CLI maps
/// them to exit code 1); everything else is a hard failure.
#[derive(Error, Debug)]
pub enum MailknifeError {
    /// An envelope match criterion was requested and did not pass.
    #[error("header match failed")]
    HeaderMatchFailed,

    /// A selection criterion was requested and matched zero parts.
    #[error("no part selected")]
    NoPartSelected,

    /// A `--match-address` / `--match-header` spec lacks the `:` separator.
    #[error("must be in the form of `header:pattern`: {0:?}")]
    MalformedSpec(String),

    /// A match pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The input could not be parsed as a mail message.
    #[error("failed to read message: {0}")]
    MalformedMessage(String),

    /// A `Content-Type` header is present but malformed.
    #[error("parsing content-type {value:?}: {reason}")]
    ContentTypeParse { value: String, reason: String },

    /// A declared multipart boundary was violated while scanning sub-entities.
    #[error("reading multipart: {0}")]
    MultipartRead(String),

    /// An address-list header could not be parsed.
    #[error("parsing {value:?} as addresses: {reason}")]
    AddressParse { value: String, reason: String },

    /// An RFC 2047 encoded-word has invalid syntax or an undecodable payload.
    #[error("malformed encoded-word: {0:?}")]
    MalformedEncodedWord(String),

    /// A declared character set is not a recognized IANA label.
    #[error("unknown charset: {0:?}")]
    UnknownCharset(String),

    /// A part's content could not be decoded from its declared encoding.
    #[error("decoding {encoding}: {reason}")]
    Decode { encoding: String, reason: String },

    /// A part's content was drained twice.
    #[error("part content already consumed")]
    ContentConsumed,

    /// An I/O error while emitting output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, MailknifeError>`.
pub type Result<T> = std::result::Result<T, MailknifeError>;

impl MailknifeError {
    /// `true` for the two outcomes callers are expected to branch on
    /// (shell exit code 1 rather than a hard failure).
    pub fn is_match_failure(&self) -> bool {
        matches!(self, Self::HeaderMatchFailed | Self::NoPartSelected)
    }
}
