//! Application layer: discovery and connection lifecycle.
//!
//! Use cases in this layer depend only on the capability traits from
//! `nxt_core` and never touch USB, sockets or the file system directly.
//!
//! # Sub-modules
//!
//! - **`handle`**   – [`handle::BrickHandle`], the OPEN → CLOSED state machine
//!   wrapped around every connection the locator hands out.
//!
//! - **`locator`**  – One discovery pass across the enabled backends, with
//!   per-backend and per-candidate failure isolation and strict identity
//!   filtering.
//!
//! - **`registry`** – The authoritative set of open connections plus the
//!   active selection; owns refresh, best-effort close and motor idling.

pub mod handle;
pub mod locator;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;
