//! # nxt-core
//!
//! Shared domain types and capability traits for locating LEGO NXT bricks.
//!
//! This crate has no I/O of its own.  It defines *what* a transport backend,
//! a discovery candidate, and an open brick connection must be able to do,
//! and the pure data that flows between them.
//!
//! # Architecture overview
//!
//! A controlling program wants to talk to one or more NXT bricks.  Bricks may
//! be plugged in over USB, paired over Bluetooth, or reachable through a TCP
//! relay.  Each of those media is a [`TransportBackend`]:
//!
//! ```text
//! TransportBackend ──enumerate(filter)──► [Candidate, ...]
//! Candidate        ──connect()──────────► BrickConnection
//! BrickConnection  ──device_info()──────► DeviceInfo { name, address, .. }
//! ```
//!
//! - **`domain`** – backend selection ([`DiscoveryMethod`]), search filtering
//!   ([`SearchFilter`]), brick identity ([`DeviceInfo`]) and port addressing.
//! - **`transport`** – the capability traits implemented by backends.
//! - **`error`** – the error taxonomy shared by backends and the locator.

pub mod domain;
pub mod error;
pub mod transport;

pub use domain::filter::{DeviceInfo, SearchFilter};
pub use domain::method::{parse_bool_flag, BackendKind, DiscoveryMethod};
pub use domain::ports::{LightColor, MotorPort, SensorKind, SensorPort};
pub use error::{
    BackendError, BrickError, ConfigFormatError, ConnectError, IdentityField, IdentityMismatch,
};
pub use transport::{BrickConnection, Candidate, TransportBackend};
