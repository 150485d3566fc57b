//! `mailknife` — filter and dissect a MIME email message.
//!
//! This crate provides the core library for parsing a single mail message
//! into a tree of MIME parts, matching envelope headers and addresses
//! against patterns, selecting parts by media type, and decoding their
//! content.

pub mod app;
pub mod envelope;
pub mod error;
pub mod model;
pub mod parser;
pub mod pattern;
pub mod select;
