//! Backend identifiers and the [`DiscoveryMethod`] selection record.
//!
//! The set of transports is closed: a backend either has a [`BackendKind`]
//! variant or it does not exist.  Configuration text that names an unknown
//! backend is ignored (and the backend stays disabled), so a config file
//! written for a newer release never switches on something this build
//! cannot drive.
//!
//! # Method strings
//!
//! The on-disk form is a comma-separated list of `backend=flag` pairs:
//!
//! ```text
//! usb=true, bluetooth=false, relay=1
//! ```
//!
//! Flags accept `true`/`false`/`1`/`0` in any letter case.  An empty string
//! means "USB only".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigFormatError;

/// Identifies one transport medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Directly attached over USB.
    Usb,
    /// Paired over Bluetooth RFCOMM.
    Bluetooth,
    /// Reached through a TCP relay ("fantom") server.
    Relay,
}

impl BackendKind {
    /// Every backend, in discovery order.
    pub const ALL: [BackendKind; 3] = [BackendKind::Usb, BackendKind::Bluetooth, BackendKind::Relay];

    /// Canonical lowercase name used in method strings and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Usb => "usb",
            BackendKind::Bluetooth => "bluetooth",
            BackendKind::Relay => "relay",
        }
    }

    /// Resolves a method-string key, including legacy aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "usb" => Some(BackendKind::Usb),
            "bluetooth" | "bt" => Some(BackendKind::Bluetooth),
            "relay" | "fantom" | "fantomusb" | "ipsock" => Some(BackendKind::Relay),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backends a discovery pass may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryMethod {
    pub usb: bool,
    pub bluetooth: bool,
    pub relay: bool,
}

impl Default for DiscoveryMethod {
    fn default() -> Self {
        Self {
            usb: true,
            bluetooth: false,
            relay: false,
        }
    }
}

impl DiscoveryMethod {
    /// A method with every backend disabled.
    pub fn none() -> Self {
        Self {
            usb: false,
            bluetooth: false,
            relay: false,
        }
    }

    /// A method with every backend enabled.
    pub fn all() -> Self {
        Self {
            usb: true,
            bluetooth: true,
            relay: true,
        }
    }

    /// Returns a copy with `kind` switched on or off.
    pub fn with(mut self, kind: BackendKind, enabled: bool) -> Self {
        match kind {
            BackendKind::Usb => self.usb = enabled,
            BackendKind::Bluetooth => self.bluetooth = enabled,
            BackendKind::Relay => self.relay = enabled,
        }
        self
    }

    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Usb => self.usb,
            BackendKind::Bluetooth => self.bluetooth,
            BackendKind::Relay => self.relay,
        }
    }

    /// Enabled backends in discovery order.
    pub fn enabled(&self) -> impl Iterator<Item = BackendKind> + '_ {
        BackendKind::ALL
            .into_iter()
            .filter(move |kind| self.is_enabled(*kind))
    }

    /// `true` when no backend is enabled.
    pub fn is_empty(&self) -> bool {
        self.enabled().next().is_none()
    }

    /// Parses a method string such as `"usb=true, relay=1"`.
    ///
    /// Backends not mentioned are disabled; a blank string yields
    /// [`DiscoveryMethod::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFormatError`] for a pair without `=` or a flag outside
    /// the accepted vocabulary.
    pub fn parse(text: &str) -> Result<Self, ConfigFormatError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut method = Self::none();
        for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigFormatError::new("method", pair))?;

            let key = key.trim();
            let enabled = parse_bool_flag(&format!("method.{key}"), value)?;
            match BackendKind::from_name(key) {
                Some(kind) => method = method.with(kind, enabled),
                None => warn!("ignoring unknown backend `{key}` in discovery method"),
            }
        }
        Ok(method)
    }
}

impl FromStr for DiscoveryMethod {
    type Err = ConfigFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "usb={}, bluetooth={}, relay={}",
            self.usb, self.bluetooth, self.relay
        )
    }
}

/// Parses a boolean-like config value: `true`, `false`, `1` or `0`.
///
/// # Errors
///
/// Returns [`ConfigFormatError`] naming `field` for anything else.
pub fn parse_bool_flag(field: &str, value: &str) -> Result<bool, ConfigFormatError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigFormatError::new(field, value.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_method_is_usb_only() {
        let method = DiscoveryMethod::default();
        assert!(method.usb);
        assert!(!method.bluetooth);
        assert!(!method.relay);
    }

    #[test]
    fn test_enabled_yields_backends_in_discovery_order() {
        let method = DiscoveryMethod::all();
        let kinds: Vec<_> = method.enabled().collect();
        assert_eq!(
            kinds,
            vec![BackendKind::Usb, BackendKind::Bluetooth, BackendKind::Relay]
        );
    }

    #[test]
    fn test_none_is_empty() {
        assert!(DiscoveryMethod::none().is_empty());
        assert!(!DiscoveryMethod::default().is_empty());
    }

    #[test]
    fn test_parse_blank_string_returns_default() {
        assert_eq!(DiscoveryMethod::parse("").unwrap(), DiscoveryMethod::default());
        assert_eq!(DiscoveryMethod::parse("   ").unwrap(), DiscoveryMethod::default());
    }

    #[test]
    fn test_parse_mixed_case_flags() {
        // Arrange
        let text = "usb=True, bluetooth=FALSE, relay=1";

        // Act
        let method = DiscoveryMethod::parse(text).unwrap();

        // Assert
        assert_eq!(
            method,
            DiscoveryMethod {
                usb: true,
                bluetooth: false,
                relay: true
            }
        );
    }

    #[test]
    fn test_parse_unmentioned_backends_are_disabled() {
        let method = DiscoveryMethod::parse("bluetooth=1").unwrap();
        assert_eq!(method, DiscoveryMethod::none().with(BackendKind::Bluetooth, true));
    }

    #[test]
    fn test_parse_all_disabled_is_valid() {
        let method = DiscoveryMethod::parse("usb=0, bluetooth=0").unwrap();
        assert!(method.is_empty());
    }

    #[test]
    fn test_parse_fantom_alias_maps_to_relay() {
        let method = DiscoveryMethod::parse("fantom=true").unwrap();
        assert!(method.relay);
        assert!(!method.usb);
    }

    #[test]
    fn test_parse_legacy_fantomusb_key_maps_to_relay() {
        // Key written by older nxt-python config generators.
        let method = DiscoveryMethod::parse("usb=True, bluetooth=False, fantomusb=True").unwrap();
        assert_eq!(method, DiscoveryMethod::default().with(BackendKind::Relay, true));
    }

    #[test]
    fn test_parse_unknown_backend_is_ignored() {
        let method = DiscoveryMethod::parse("usb=true, zigbee=true").unwrap();
        assert_eq!(method, DiscoveryMethod::default());
    }

    #[test]
    fn test_parse_rejects_bad_flag_with_field_name() {
        let err = DiscoveryMethod::parse("usb=yes").unwrap_err();
        assert_eq!(err.field, "method.usb");
        assert_eq!(err.value, "yes");
    }

    #[test]
    fn test_parse_rejects_pair_without_equals() {
        let err = DiscoveryMethod::parse("usb").unwrap_err();
        assert_eq!(err.field, "method");
    }

    #[test]
    fn test_display_parses_back_to_same_method() {
        let method = DiscoveryMethod::none().with(BackendKind::Relay, true);
        let parsed: DiscoveryMethod = method.to_string().parse().unwrap();
        assert_eq!(parsed, method);
    }

    #[test]
    fn test_parse_bool_flag_vocabulary() {
        assert_eq!(parse_bool_flag("f", "1"), Ok(true));
        assert_eq!(parse_bool_flag("f", " TRUE "), Ok(true));
        assert_eq!(parse_bool_flag("f", "0"), Ok(false));
        assert_eq!(parse_bool_flag("f", "False"), Ok(false));
        assert!(parse_bool_flag("f", "on").is_err());
        assert!(parse_bool_flag("f", "").is_err());
    }

    #[test]
    fn test_backend_kind_from_name_aliases() {
        assert_eq!(BackendKind::from_name("BT"), Some(BackendKind::Bluetooth));
        assert_eq!(BackendKind::from_name("ipsock"), Some(BackendKind::Relay));
        assert_eq!(BackendKind::from_name("serial"), None);
    }
}
