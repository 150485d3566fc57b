//! Core data types: addresses and the MIME part tree.

pub mod address;
pub mod part;
