//! Message parsing: headers, media types, and the part tree builder.

pub mod header;
pub mod mime;
pub mod part;
