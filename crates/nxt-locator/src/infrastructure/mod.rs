//! Infrastructure layer for the locator.
//!
//! Contains the outward-facing adapters: transport backends, configuration
//! file storage, and the command bridge consumed by host UIs.
//!
//! **Dependency rule**: this layer may depend on `application` and `nxt_core`,
//! but MUST NOT be imported by the `application` layer.

pub mod backends;
pub mod storage;
pub mod ui_bridge;
