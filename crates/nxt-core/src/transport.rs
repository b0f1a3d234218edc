//! Capability traits implemented by transport backends.
//!
//! The locator only needs two things from a medium: list what is reachable
//! right now, and open one of those things.  Everything below that line
//! (USB descriptor matching, RFCOMM, socket framing, the telegram codec) is
//! the backend's business.
//!
//! # Testability
//!
//! All three traits are object safe, so the locator stores backends as
//! `Box<dyn TransportBackend>` and tests inject in-memory doubles.

use async_trait::async_trait;

use crate::domain::filter::{DeviceInfo, SearchFilter};
use crate::domain::method::BackendKind;
use crate::domain::ports::{LightColor, MotorPort, SensorKind, SensorPort};
use crate::error::{BackendError, BrickError, ConnectError};

/// A medium that can enumerate bricks.
#[async_trait]
pub trait TransportBackend: Send + Sync {
    /// Which medium this backend drives.
    fn kind(&self) -> BackendKind;

    /// Lists candidates reachable right now.
    ///
    /// `filter` is a restriction hint: a backend that can narrow its search
    /// by address or name should do so, but the locator does not rely on it.
    async fn enumerate(&self, filter: &SearchFilter)
        -> Result<Vec<Box<dyn Candidate>>, BackendError>;
}

/// A not-yet-connected device produced by one enumeration.
#[async_trait]
pub trait Candidate: Send {
    /// Short human-readable description for logs (`usb:003/007`, a MAC, ...).
    fn describe(&self) -> String;

    /// Opens a connection, consuming the candidate.
    async fn connect(self: Box<Self>) -> Result<Box<dyn BrickConnection>, ConnectError>;
}

/// An open control channel to one brick.
///
/// `tacho_limit` of `0` means "run until told otherwise".  Implementations
/// must return [`BrickError::Closed`] from every method once
/// [`close`](BrickConnection::close) has succeeded.
#[async_trait]
pub trait BrickConnection: Send {
    /// Queries the brick's name, address and status.
    async fn device_info(&mut self) -> Result<DeviceInfo, BrickError>;

    /// Releases the underlying transport.
    async fn close(&mut self) -> Result<(), BrickError>;

    /// Runs one motor at `power` (-127..=127) for `tacho_limit` degrees.
    async fn run_motor(
        &mut self,
        port: MotorPort,
        power: i8,
        tacho_limit: u32,
    ) -> Result<(), BrickError>;

    /// Runs two motors in lock-step.
    async fn run_synchronized(
        &mut self,
        leader: MotorPort,
        follower: MotorPort,
        power: i8,
        tacho_limit: u32,
    ) -> Result<(), BrickError>;

    /// Stops a motor and holds its position.
    async fn brake_motor(&mut self, port: MotorPort) -> Result<(), BrickError>;

    /// Cuts power to a motor and lets it coast.
    async fn idle_motor(&mut self, port: MotorPort) -> Result<(), BrickError>;

    /// Current rotation counter of a motor, in degrees.
    async fn tacho_count(&mut self, port: MotorPort) -> Result<i32, BrickError>;

    async fn read_sensor(&mut self, port: SensorPort, kind: SensorKind)
        -> Result<i32, BrickError>;

    async fn set_light_color(
        &mut self,
        port: SensorPort,
        color: LightColor,
    ) -> Result<(), BrickError>;

    async fn play_tone(&mut self, frequency_hz: u16, duration_ms: u16) -> Result<(), BrickError>;

    /// Battery voltage in millivolts.
    async fn battery_level(&mut self) -> Result<u16, BrickError>;
}
