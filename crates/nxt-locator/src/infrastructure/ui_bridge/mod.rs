//! Command bridge: the primitive surface consumed by host UI adapters.
//!
//! A visual-programming host registers blocks such as "refresh bricks",
//! "select brick", "turn motor".  Each block delegates to one method of
//! [`BrickSession`], which owns the locator, the connection registry and the
//! per-brick motor offsets for one application session.
//!
//! Commands return typed [`CommandError`]s.  Adapters that need a uniform
//! `{ success, data, error }` shape wrap results in [`CommandResult`].
//!
//! # Concurrency
//!
//! The registry sits behind an async `RwLock`.  A refresh holds the write
//! lock from the moment it starts closing the old set until the new set is
//! installed, so commands never observe a half-replaced registry; they wait.
//! A second refresh arriving meanwhile is rejected immediately with
//! [`RegistryError::DiscoveryInProgress`].
//!
//! Dropping a refresh future midway leaves the session with no bricks; every
//! connection the old and the interrupted set held is closed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use nxt_core::{
    BackendKind, BrickError, DiscoveryMethod, LightColor, MotorPort, SearchFilter, SensorKind,
    SensorPort,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::application::{
    handle::{BrickHandle, ConnectionId},
    locator::Locator,
    registry::{CleanupReport, ConnectionRegistry, RegistryError},
};
use crate::infrastructure::storage::config::read_default_search_params;

/// Largest accepted motor power magnitude.
pub const MAX_POWER: i32 = 127;

/// Error type for bridge commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Brick(#[from] BrickError),
    #[error("invalid motor port {0:?}; use A, B or C")]
    InvalidMotorPort(String),
    #[error("invalid sensor port {0:?}; use 1, 2, 3 or 4")]
    InvalidSensorPort(String),
    #[error("unknown sensor {0:?}")]
    UnknownSensor(String),
    #[error("power {0} is outside -127..=127")]
    PowerOutOfRange(i32),
}

/// Snapshot of one held connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrickSummary {
    /// 1-based index as used by [`BrickSession::select`].
    pub index: usize,
    pub connection_id: ConnectionId,
    pub backend: BackendKind,
    pub origin: String,
    pub active: bool,
    pub closed: bool,
}

/// Unified response wrapper for adapters that cannot carry typed errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

impl<T: Serialize> From<Result<T, CommandError>> for CommandResult<T> {
    fn from(result: Result<T, CommandError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Tacho counts recorded by `reset_motor`, indexed by [`MotorPort::index`].
type TachoOffsets = [i32; 3];

/// One application session's view of the bricks.
pub struct BrickSession {
    locator: Locator,
    method: DiscoveryMethod,
    filter: SearchFilter,
    registry: RwLock<ConnectionRegistry>,
    refresh_gate: Mutex<()>,
    tacho_offsets: Mutex<HashMap<ConnectionId, TachoOffsets>>,
}

impl BrickSession {
    /// Creates a session that refreshes with the given search parameters.
    pub fn new(locator: Locator, method: DiscoveryMethod, filter: SearchFilter) -> Arc<Self> {
        Arc::new(Self {
            locator,
            method,
            filter,
            registry: RwLock::new(ConnectionRegistry::new()),
            refresh_gate: Mutex::new(()),
            tacho_offsets: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a session whose search parameters come from the config file.
    ///
    /// Falls back to defaults if no (valid) config file exists.
    pub fn from_config(locator: Locator, config_path: Option<&Path>) -> Arc<Self> {
        let (method, filter) = read_default_search_params(config_path);
        Self::new(locator, method, filter)
    }

    pub fn search_params(&self) -> (DiscoveryMethod, SearchFilter) {
        (self.method, self.filter.clone())
    }

    // ── Registry commands ─────────────────────────────────────────────────────

    /// Re-discovers bricks with the session's search parameters.
    ///
    /// Returns the number of bricks found.
    pub async fn refresh(&self) -> Result<usize, CommandError> {
        self.refresh_with(&self.method, &self.filter).await
    }

    /// Re-discovers bricks with explicit search parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DiscoveryInProgress`] if another refresh is
    /// running.
    pub async fn refresh_with(
        &self,
        method: &DiscoveryMethod,
        filter: &SearchFilter,
    ) -> Result<usize, CommandError> {
        let _gate = self
            .refresh_gate
            .try_lock()
            .map_err(|_| RegistryError::DiscoveryInProgress)?;

        let mut registry = self.registry.write().await;
        self.tacho_offsets.lock().await.clear();
        let found = registry.refresh(&self.locator, method, filter).await;

        if found == 0 {
            info!("no NXT bricks found");
        } else {
            info!("NXT found {found} brick(s)");
        }
        Ok(found)
    }

    /// Makes the brick at 1-based `index` the target of later commands.
    pub async fn select(&self, index: i64) -> Result<(), CommandError> {
        self.registry.write().await.select(index)?;
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.registry.read().await.count()
    }

    /// Name of the brick at 1-based `index`, without NUL padding.
    pub async fn brick_name(&self, index: i64) -> Result<String, CommandError> {
        let handle = self.registry.read().await.get(index)?;
        let info = handle.device_info().await?;
        Ok(info.trimmed_name().to_string())
    }

    /// Snapshot of every held connection.
    pub async fn bricks(&self) -> Vec<BrickSummary> {
        let registry = self.registry.read().await;
        let active = registry.active_index();
        registry
            .all()
            .iter()
            .enumerate()
            .map(|(i, handle)| BrickSummary {
                index: i + 1,
                connection_id: handle.id(),
                backend: handle.backend(),
                origin: handle.origin().to_string(),
                active: active == Some(i),
                closed: handle.is_closed(),
            })
            .collect()
    }

    /// Idles every motor on every brick (the host's "stop" signal).
    pub async fn stop(&self) -> CleanupReport {
        self.registry.read().await.idle_motors().await
    }

    /// Idles motors and closes every brick (the host's "quit" signal).
    pub async fn quit(&self) -> CleanupReport {
        let registry = self.registry.read().await;
        let idled = registry.idle_motors().await;
        if !idled.is_clean() {
            debug!("{} brick(s) could not be idled before closing", idled.failures.len());
        }
        registry.close_all().await
    }

    // ── Motor commands ────────────────────────────────────────────────────────

    /// Turns one motor `turns` revolutions, then brakes.  Negative turns run
    /// the motor backwards.
    pub async fn turn_motor(&self, port: &str, turns: f64, power: i32) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let port = motor_port(port)?;
        let power = checked_power(power)?;
        let (power, degrees) = signed_run(power, turns);

        let mut connection = brick.connection().await?;
        if degrees > 0 {
            connection.run_motor(port, power, degrees).await?;
        }
        connection.brake_motor(port).await?;
        Ok(())
    }

    /// Runs motors B and C in lock-step for `turns` revolutions.
    pub async fn sync_motors(&self, power: i32, turns: f64) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let power = checked_power(power)?;
        let (power, degrees) = signed_run(power, turns);
        if degrees == 0 {
            return Ok(());
        }

        brick
            .connection()
            .await?
            .run_synchronized(MotorPort::B, MotorPort::C, power, degrees)
            .await?;
        Ok(())
    }

    /// Runs motors B and C in lock-step until told otherwise.
    pub async fn sync_motors_forever(&self, power: i32) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let power = checked_power(power)?;
        brick
            .connection()
            .await?
            .run_synchronized(MotorPort::B, MotorPort::C, power, 0)
            .await?;
        Ok(())
    }

    /// Runs one motor until told otherwise.
    pub async fn start_motor(&self, port: &str, power: i32) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let port = motor_port(port)?;
        let power = checked_power(power)?;
        brick.connection().await?.run_motor(port, power, 0).await?;
        Ok(())
    }

    pub async fn brake_motor(&self, port: &str) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let port = motor_port(port)?;
        brick.connection().await?.brake_motor(port).await?;
        Ok(())
    }

    /// Makes the motor's current position the zero of
    /// [`motor_position`](Self::motor_position) and lets it coast.
    pub async fn reset_motor(&self, port: &str) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let port = motor_port(port)?;

        let mut connection = brick.connection().await?;
        let tacho = connection.tacho_count(port).await?;
        self.tacho_offsets
            .lock()
            .await
            .entry(brick.id())
            .or_default()[port.index()] = tacho;
        connection.idle_motor(port).await?;
        Ok(())
    }

    /// Degrees turned since the last [`reset_motor`](Self::reset_motor).
    pub async fn motor_position(&self, port: &str) -> Result<i32, CommandError> {
        let brick = self.active().await?;
        let port = motor_port(port)?;

        let tacho = brick.connection().await?.tacho_count(port).await?;
        let offset = self
            .tacho_offsets
            .lock()
            .await
            .get(&brick.id())
            .map_or(0, |offsets| offsets[port.index()]);
        Ok(tacho - offset)
    }

    // ── Sensor and brick commands ─────────────────────────────────────────────

    /// Reads a sensor.  Returns `-1` when no brick is connected or the read
    /// fails, so polling blocks keep running.
    pub async fn read_sensor(&self, port: &str, sensor: &str) -> Result<i32, CommandError> {
        let port =
            SensorPort::from_label(port).ok_or_else(|| CommandError::InvalidSensorPort(port.to_string()))?;
        let kind =
            SensorKind::from_name(sensor).ok_or_else(|| CommandError::UnknownSensor(sensor.to_string()))?;

        let Ok(brick) = self.active().await else {
            return Ok(-1);
        };
        let reading = match brick.connection().await {
            Ok(mut connection) => connection.read_sensor(port, kind).await,
            Err(e) => Err(e),
        };
        Ok(reading.unwrap_or_else(|e| {
            debug!("sensor read on port {port} failed: {e}");
            -1
        }))
    }

    /// Sets the color sensor lamp.
    pub async fn set_light_color(&self, port: &str, color: LightColor) -> Result<(), CommandError> {
        let brick = self.active().await?;
        let port =
            SensorPort::from_label(port).ok_or_else(|| CommandError::InvalidSensorPort(port.to_string()))?;
        brick.connection().await?.set_light_color(port, color).await?;
        Ok(())
    }

    pub async fn play_tone(&self, frequency_hz: u16, duration_ms: u16) -> Result<(), CommandError> {
        let brick = self.active().await?;
        brick
            .connection()
            .await?
            .play_tone(frequency_hz, duration_ms)
            .await?;
        Ok(())
    }

    /// Battery level of the active brick in millivolts.
    pub async fn battery_level(&self) -> Result<u16, CommandError> {
        let brick = self.active().await?;
        let level = brick.connection().await?.battery_level().await?;
        Ok(level)
    }

    async fn active(&self) -> Result<Arc<BrickHandle>, CommandError> {
        Ok(self.registry.read().await.active()?)
    }
}

fn motor_port(label: &str) -> Result<MotorPort, CommandError> {
    MotorPort::from_label(label).ok_or_else(|| CommandError::InvalidMotorPort(label.to_string()))
}

fn checked_power(power: i32) -> Result<i8, CommandError> {
    if !(-MAX_POWER..=MAX_POWER).contains(&power) {
        return Err(CommandError::PowerOutOfRange(power));
    }
    i8::try_from(power).map_err(|_| CommandError::PowerOutOfRange(power))
}

/// Folds the sign of `turns` into the power and converts turns to degrees.
fn signed_run(power: i8, turns: f64) -> (i8, u32) {
    let degrees = (turns.abs() * 360.0) as u32;
    if turns < 0.0 {
        (power.saturating_neg(), degrees)
    } else {
        (power, degrees)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
