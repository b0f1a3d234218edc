//! TOML-based persistence of the default brick search record.
//!
//! Reads and writes one `[brick]` table in the platform-appropriate config
//! file:
//! - Windows:  `%APPDATA%\NxtLocator\config.toml`
//! - Linux:    `~/.config/nxt-locator/config.toml`
//! - macOS:    `~/Library/Application Support/NxtLocator/config.toml`
//!
//! ```toml
//! [brick]
//! name = "MyNXT"
//! host = "00:16:53:0A:1B:2C"
//! strict = false
//! method = "usb=true, bluetooth=false, relay=true"
//! ```
//!
//! # Lenient reading
//!
//! The record only supplies *defaults* for a search, so a damaged file must
//! never stop discovery.  Reading is done field by field: a field with a bad
//! value falls back to its default and is reported as a
//! [`ConfigFormatError`] warning, unknown keys are ignored, and a missing
//! file yields [`BrickConfigRecord::default`].

use std::path::{Path, PathBuf};

use nxt_core::{parse_bool_flag, ConfigFormatError, DiscoveryMethod, SearchFilter};
use serde::{Serialize, Serializer};
use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, warn};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML at all.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The record could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema ─────────────────────────────────────────────────────────────

/// The persisted default search parameters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BrickConfigRecord {
    /// Bluetooth address to restrict the search to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Brick name to restrict the search to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reject bricks whose reported identity does not match.
    pub strict: bool,
    /// Enabled backends, stored as a method string.
    #[serde(serialize_with = "serialize_method")]
    pub method: DiscoveryMethod,
}

impl Default for BrickConfigRecord {
    fn default() -> Self {
        Self {
            host: None,
            name: None,
            strict: true,
            method: DiscoveryMethod::default(),
        }
    }
}

impl BrickConfigRecord {
    /// The record as locator inputs.
    pub fn search_params(&self) -> (DiscoveryMethod, SearchFilter) {
        let filter = SearchFilter {
            host: self.host.clone(),
            name: self.name.clone(),
            strict: self.strict,
        };
        (self.method, filter)
    }
}

fn serialize_method<S: Serializer>(method: &DiscoveryMethod, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&method.to_string())
}

#[derive(Serialize)]
struct ConfigDocument<'a> {
    brick: &'a BrickConfigRecord,
}

/// A record read from disk plus the field-level problems found on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    pub record: BrickConfigRecord,
    pub warnings: Vec<ConfigFormatError>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses config text, falling back to defaults field by field.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] only when the text is not TOML at all.
pub fn parse_config(text: &str) -> Result<ParsedConfig, ConfigError> {
    let document: Table = toml::from_str(text)?;
    let mut parsed = ParsedConfig::default();

    let brick = match document.get("brick") {
        Some(Value::Table(table)) => table,
        Some(other) => {
            parsed
                .warnings
                .push(ConfigFormatError::new("brick", other.to_string()));
            return Ok(parsed);
        }
        None => return Ok(parsed),
    };

    let record = &mut parsed.record;
    let warnings = &mut parsed.warnings;

    if let Some(value) = brick.get("host") {
        record.host = optional_string("host", value).unwrap_or_else(|e| {
            warnings.push(e);
            None
        });
    }
    if let Some(value) = brick.get("name") {
        record.name = optional_string("name", value).unwrap_or_else(|e| {
            warnings.push(e);
            None
        });
    }
    if let Some(value) = brick.get("strict") {
        match bool_like("strict", value) {
            Ok(strict) => record.strict = strict,
            Err(e) => warnings.push(e),
        }
    }
    if let Some(value) = brick.get("method") {
        match method_value(value) {
            Ok(method) => record.method = method,
            Err(e) => warnings.push(e),
        }
    }

    Ok(parsed)
}

/// A string field; an empty string counts as absent.
fn optional_string(field: &str, value: &Value) -> Result<Option<String>, ConfigFormatError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(ConfigFormatError::new(field, other.to_string())),
    }
}

/// A boolean written as a TOML bool, `0`/`1`, or a string of either.
fn bool_like(field: &str, value: &Value) -> Result<bool, ConfigFormatError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::String(s) => parse_bool_flag(field, s),
        other => Err(ConfigFormatError::new(field, other.to_string())),
    }
}

fn method_value(value: &Value) -> Result<DiscoveryMethod, ConfigFormatError> {
    match value {
        Value::String(s) => DiscoveryMethod::parse(s),
        other => Err(ConfigFormatError::new("method", other.to_string())),
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Reads the record at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the file is not TOML.
pub fn read_config(path: &Path) -> Result<ParsedConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config file at {}; using defaults", path.display());
            Ok(ParsedConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `record` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn write_config(path: &Path, record: &BrickConfigRecord) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(&ConfigDocument { brick: record })?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a starter record that users are expected to edit.
///
/// Returns the record that was written.
pub fn write_example_config(path: &Path) -> Result<BrickConfigRecord, ConfigError> {
    let record = BrickConfigRecord {
        host: Some("00:16:53:00:00:00".to_string()),
        name: Some("MyNXT".to_string()),
        strict: false,
        method: DiscoveryMethod {
            usb: true,
            bluetooth: false,
            relay: true,
        },
    };
    if path.exists() {
        warn!("overwriting existing config at {}", path.display());
    }
    write_config(path, &record)?;
    Ok(record)
}

/// Loads the default search parameters.  Never fails.
///
/// Reads `path` if given, otherwise the platform config file.  A missing,
/// unreadable or malformed file degrades to defaults (USB only, no identity
/// restriction, strict); every problem is logged with `warn!`.
pub fn read_default_search_params(path: Option<&Path>) -> (DiscoveryMethod, SearchFilter) {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Ok(p) => p,
            Err(e) => {
                warn!("{e}; using default search parameters");
                return BrickConfigRecord::default().search_params();
            }
        },
    };

    match read_config(&path) {
        Ok(parsed) => {
            for warning in &parsed.warnings {
                warn!("{}: {warning}; using default", path.display());
            }
            parsed.record.search_params()
        }
        Err(e) => {
            warn!("{e}; using default search parameters");
            BrickConfigRecord::default().search_params()
        }
    }
}

/// Resolves the platform config directory for this application.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("NxtLocator"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("nxt-locator"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("NxtLocator")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
