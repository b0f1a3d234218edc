//! Search restrictions and brick identity.
//!
//! A [`SearchFilter`] is handed to every backend's enumeration as a hint
//! ("only look for this MAC / this name").  Backends may or may not honour
//! it.  When the filter is *strict*, the locator additionally asks each
//! connected brick for its [`DeviceInfo`] and rejects bricks that do not
//! match.

use serde::{Deserialize, Serialize};

use crate::error::{IdentityField, IdentityMismatch};

/// Identity and status reported by a brick's device-info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Brick name as reported, possibly padded with trailing NUL bytes.
    pub name: String,
    /// Bluetooth address, e.g. `"00:16:53:0A:1B:2C"`.
    pub address: String,
    /// Bluetooth signal strength.
    pub signal_strength: u32,
    /// Free user flash in bytes.
    pub free_flash: u32,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            signal_strength: 0,
            free_flash: 0,
        }
    }

    /// The brick name with transport padding stripped.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim_end_matches('\0')
    }
}

/// Optional identity restrictions for a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub host: Option<String>,
    pub name: Option<String>,
    /// Reject connected bricks whose identity does not match.
    pub strict: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            host: None,
            name: None,
            strict: true,
        }
    }
}

impl SearchFilter {
    /// A filter that accepts any brick.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// `true` when a host or name restriction is present.
    pub fn has_identity(&self) -> bool {
        self.host.is_some() || self.name.is_some()
    }

    /// `true` when connected bricks must be queried and matched.
    pub fn requires_identity_check(&self) -> bool {
        self.strict && self.has_identity()
    }

    /// Checks a brick's reported identity against this filter.
    ///
    /// Hosts compare case-insensitively; names compare exactly after
    /// trailing NUL padding is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityMismatch`] for the first field that does not match.
    pub fn check_identity(&self, info: &DeviceInfo) -> Result<(), IdentityMismatch> {
        if let Some(host) = &self.host {
            if !host.trim().eq_ignore_ascii_case(info.address.trim()) {
                return Err(IdentityMismatch {
                    field: IdentityField::Host,
                    expected: host.clone(),
                    reported: info.address.clone(),
                });
            }
        }
        if let Some(name) = &self.name {
            let reported = info.trimmed_name();
            if name != reported {
                return Err(IdentityMismatch {
                    field: IdentityField::Name,
                    expected: name.clone(),
                    reported: reported.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_name_strips_nul_padding() {
        let info = DeviceInfo::new("MyNXT\0\0\0", "00:16:53:00:00:01");
        assert_eq!(info.trimmed_name(), "MyNXT");
    }

    #[test]
    fn test_default_filter_is_strict_without_identity() {
        let filter = SearchFilter::default();
        assert!(filter.strict);
        assert!(!filter.has_identity());
        assert!(!filter.requires_identity_check());
    }

    #[test]
    fn test_non_strict_filter_skips_identity_check() {
        let filter = SearchFilter::any().with_name("MyNXT").with_strict(false);
        assert!(filter.has_identity());
        assert!(!filter.requires_identity_check());
    }

    #[test]
    fn test_check_identity_accepts_padded_name() {
        let filter = SearchFilter::any().with_name("MyNXT");
        let info = DeviceInfo::new("MyNXT\0\0", "00:16:53:00:00:01");
        assert!(filter.check_identity(&info).is_ok());
    }

    #[test]
    fn test_check_identity_rejects_other_name() {
        // Arrange
        let filter = SearchFilter::any().with_name("MyNXT");
        let info = DeviceInfo::new("Other\0\0", "00:16:53:00:00:01");

        // Act
        let err = filter.check_identity(&info).unwrap_err();

        // Assert
        assert_eq!(err.field, IdentityField::Name);
        assert_eq!(err.reported, "Other");
    }

    #[test]
    fn test_check_identity_host_is_case_insensitive() {
        let filter = SearchFilter::any().with_host("00:16:53:0a:1b:2c");
        let info = DeviceInfo::new("MyNXT", "00:16:53:0A:1B:2C");
        assert!(filter.check_identity(&info).is_ok());
    }

    #[test]
    fn test_check_identity_requires_both_host_and_name() {
        let filter = SearchFilter::any()
            .with_host("00:16:53:00:00:01")
            .with_name("MyNXT");
        let info = DeviceInfo::new("MyNXT", "00:16:53:00:00:02");
        let err = filter.check_identity(&info).unwrap_err();
        assert_eq!(err.field, IdentityField::Host);
    }
}
