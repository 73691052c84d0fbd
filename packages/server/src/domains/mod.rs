//! Domain modules.

pub mod comments;
