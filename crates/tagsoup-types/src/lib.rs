//! Foundation types for tagsoup.
//!
//! This crate holds the types shared by every tagsoup crate: the error enum
//! and `Result` alias, the taxonomy of silently repaired input errors, and
//! the TOML dialect configuration.

pub mod config;
pub mod error;
pub mod recovery;
