//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Reading the single `[brick]` search record from the platform config
//!   directory, field by field, tolerating malformed values.
//! - Writing a record (or an example record) back to disk.
//! - Resolving the default search parameters used when a caller supplies none.

pub mod config;
