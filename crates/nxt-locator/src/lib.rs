//! nxt-locator library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! host adapters share the same module tree.

pub mod application;
pub mod infrastructure;
