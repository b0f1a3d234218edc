//! Domain entities for brick discovery.
//!
//! Pure data and rules with no infrastructure dependencies: which backends a
//! search may use, how a found brick is matched against the caller's filter,
//! and how motor/sensor ports are addressed.

/// Search restrictions and brick identity matching.
pub mod filter;

/// Backend identifiers and the enabled-backend record.
pub mod method;

/// Motor and sensor port addressing.
pub mod ports;
