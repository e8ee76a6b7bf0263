//! CLI command implementations.

pub mod describe;
pub mod documents;
pub mod poll;
