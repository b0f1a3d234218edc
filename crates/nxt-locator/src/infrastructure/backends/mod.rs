//! Transport backend implementations.
//!
//! Hardware backends (USB, Bluetooth, relay) live with their protocol codecs
//! and plug into [`crate::application::locator::Locator`] through
//! [`nxt_core::TransportBackend`].  This module carries the in-memory
//! [`mock::MockBackend`], which lets tests and demos script what a medium
//! "sees" without hardware attached.

pub mod mock;
