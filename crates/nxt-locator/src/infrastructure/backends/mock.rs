//! In-memory transport backend for tests and demos.
//!
//! A [`MockBackend`] stands in for one medium.  Tests script what it "sees"
//! (bricks that connect, candidates that refuse, an absent radio) and then
//! inspect what the locator did to each [`MockBrick`] through its shared
//! state: whether it was closed, which motors ran, which tones played.
//!
//! Cloning a `MockBrick` shares its state, so the test keeps one clone as a
//! probe while the backend hands the other to the locator.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use nxt_core::{
    BackendError, BackendKind, BrickConnection, BrickError, Candidate, ConnectError, DeviceInfo,
    LightColor, MotorPort, SearchFilter, SensorKind, SensorPort, TransportBackend,
};

/// What a motor was last told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Idle,
    Running { power: i8, tacho_limit: u32 },
    Braked,
}

#[derive(Debug)]
struct BrickState {
    info: DeviceInfo,
    open: bool,
    connects: u32,
    closes: u32,
    motors: [MotorState; 3],
    tacho: [i32; 3],
    sensors: HashMap<(SensorPort, SensorKind), i32>,
    lights: HashMap<SensorPort, LightColor>,
    tones: Vec<(u16, u16)>,
    battery_mv: u16,
    fail_close: bool,
    fail_motors: bool,
}

/// A simulated brick.  Clones share state.
#[derive(Debug, Clone)]
pub struct MockBrick {
    state: Arc<Mutex<BrickState>>,
}

impl MockBrick {
    /// Creates a closed brick that reports `name` and `address`.
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrickState {
                info: DeviceInfo::new(name, address),
                open: false,
                connects: 0,
                closes: 0,
                motors: [MotorState::Idle; 3],
                tacho: [0; 3],
                sensors: HashMap::new(),
                lights: HashMap::new(),
                tones: Vec::new(),
                battery_mv: 8000,
                fail_close: false,
                fail_motors: false,
            })),
        }
    }

    /// Sets the value returned for a sensor reading.
    pub fn with_sensor(self, port: SensorPort, kind: SensorKind, value: i32) -> Self {
        self.lock().sensors.insert((port, kind), value);
        self
    }

    pub fn with_battery(self, millivolts: u16) -> Self {
        self.lock().battery_mv = millivolts;
        self
    }

    /// Makes `close` report a transport error (the brick still ends closed).
    pub fn failing_close(self) -> Self {
        self.lock().fail_close = true;
        self
    }

    /// Makes every motor command report a transport error.
    pub fn failing_motors(self) -> Self {
        self.lock().fail_motors = true;
        self
    }

    /// Simulates the motor being turned by hand.
    pub fn set_tacho(&self, port: MotorPort, degrees: i32) {
        self.lock().tacho[port.index()] = degrees;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn connect_count(&self) -> u32 {
        self.lock().connects
    }

    pub fn close_count(&self) -> u32 {
        self.lock().closes
    }

    pub fn motor(&self, port: MotorPort) -> MotorState {
        self.lock().motors[port.index()]
    }

    pub fn tacho(&self, port: MotorPort) -> i32 {
        self.lock().tacho[port.index()]
    }

    pub fn light(&self, port: SensorPort) -> Option<LightColor> {
        self.lock().lights.get(&port).copied()
    }

    pub fn tones(&self) -> Vec<(u16, u16)> {
        self.lock().tones.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrickState> {
        self.state.lock().expect("lock poisoned")
    }

    fn open_state(&self) -> Result<std::sync::MutexGuard<'_, BrickState>, BrickError> {
        let state = self.lock();
        if state.open {
            Ok(state)
        } else {
            Err(BrickError::Closed)
        }
    }

    fn motor_state(&self) -> Result<std::sync::MutexGuard<'_, BrickState>, BrickError> {
        let state = self.open_state()?;
        if state.fail_motors {
            return Err(BrickError::Io("motor command failed".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl BrickConnection for MockBrick {
    async fn device_info(&mut self) -> Result<DeviceInfo, BrickError> {
        Ok(self.open_state()?.info.clone())
    }

    async fn close(&mut self) -> Result<(), BrickError> {
        let mut state = self.open_state()?;
        state.open = false;
        state.closes += 1;
        if state.fail_close {
            return Err(BrickError::Io("close failed".to_string()));
        }
        Ok(())
    }

    async fn run_motor(
        &mut self,
        port: MotorPort,
        power: i8,
        tacho_limit: u32,
    ) -> Result<(), BrickError> {
        let mut state = self.motor_state()?;
        state.motors[port.index()] = MotorState::Running { power, tacho_limit };
        let turned = i32::try_from(tacho_limit).unwrap_or(i32::MAX);
        state.tacho[port.index()] += if power < 0 { -turned } else { turned };
        Ok(())
    }

    async fn run_synchronized(
        &mut self,
        leader: MotorPort,
        follower: MotorPort,
        power: i8,
        tacho_limit: u32,
    ) -> Result<(), BrickError> {
        self.run_motor(leader, power, tacho_limit).await?;
        self.run_motor(follower, power, tacho_limit).await
    }

    async fn brake_motor(&mut self, port: MotorPort) -> Result<(), BrickError> {
        self.motor_state()?.motors[port.index()] = MotorState::Braked;
        Ok(())
    }

    async fn idle_motor(&mut self, port: MotorPort) -> Result<(), BrickError> {
        self.motor_state()?.motors[port.index()] = MotorState::Idle;
        Ok(())
    }

    async fn tacho_count(&mut self, port: MotorPort) -> Result<i32, BrickError> {
        Ok(self.motor_state()?.tacho[port.index()])
    }

    async fn read_sensor(
        &mut self,
        port: SensorPort,
        kind: SensorKind,
    ) -> Result<i32, BrickError> {
        self.open_state()?
            .sensors
            .get(&(port, kind))
            .copied()
            .ok_or_else(|| BrickError::Rejected(format!("no {kind:?} sensor on port {port}")))
    }

    async fn set_light_color(
        &mut self,
        port: SensorPort,
        color: LightColor,
    ) -> Result<(), BrickError> {
        self.open_state()?.lights.insert(port, color);
        Ok(())
    }

    async fn play_tone(&mut self, frequency_hz: u16, duration_ms: u16) -> Result<(), BrickError> {
        self.open_state()?.tones.push((frequency_hz, duration_ms));
        Ok(())
    }

    async fn battery_level(&mut self) -> Result<u16, BrickError> {
        Ok(self.open_state()?.battery_mv)
    }
}

/// What a scripted candidate does when the locator connects it.
#[derive(Debug, Clone)]
enum Slot {
    Brick(MockBrick),
    Refuse(String),
}

struct MockCandidate {
    label: String,
    slot: Slot,
}

#[async_trait]
impl Candidate for MockCandidate {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn connect(self: Box<Self>) -> Result<Box<dyn BrickConnection>, ConnectError> {
        match self.slot {
            Slot::Brick(brick) => {
                {
                    let mut state = brick.lock();
                    if state.open {
                        return Err(ConnectError::failed(self.label, "device busy"));
                    }
                    state.open = true;
                    state.connects += 1;
                }
                Ok(Box::new(brick))
            }
            Slot::Refuse(reason) => Err(ConnectError::failed(self.label, reason)),
        }
    }
}

/// A scripted transport backend.
///
/// Every `enumerate` call offers the full script again, like real hardware
/// that stays plugged in.  A brick that is still open refuses a second
/// connection with "device busy".
pub struct MockBackend {
    kind: BackendKind,
    slots: Mutex<Vec<Slot>>,
    outage: Mutex<Option<String>>,
    enumerations: Arc<AtomicUsize>,
    filters: Arc<Mutex<Vec<SearchFilter>>>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            slots: Mutex::new(Vec::new()),
            outage: Mutex::new(None),
            enumerations: Arc::new(AtomicUsize::new(0)),
            filters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a brick that connects successfully.
    pub fn with_brick(self, brick: MockBrick) -> Self {
        self.slots.lock().expect("lock poisoned").push(Slot::Brick(brick));
        self
    }

    /// Adds a candidate whose connect attempt always fails.
    pub fn with_refusing_candidate(self, reason: &str) -> Self {
        self.slots
            .lock()
            .expect("lock poisoned")
            .push(Slot::Refuse(reason.to_string()));
        self
    }

    /// Makes enumeration fail as if the medium were absent.
    pub fn unavailable(self, reason: &str) -> Self {
        *self.outage.lock().expect("lock poisoned") = Some(reason.to_string());
        self
    }

    /// Shared counter of `enumerate` calls, readable after the backend is
    /// moved into a locator.
    pub fn enumeration_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.enumerations)
    }

    /// Shared log of the filters passed to `enumerate`, in call order,
    /// readable after the backend is moved into a locator.
    pub fn filter_log(&self) -> Arc<Mutex<Vec<SearchFilter>>> {
        Arc::clone(&self.filters)
    }

    /// The filter passed to the most recent enumeration.
    pub fn last_filter(&self) -> Option<SearchFilter> {
        self.filters.lock().expect("lock poisoned").last().cloned()
    }
}

#[async_trait]
impl TransportBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn enumerate(
        &self,
        filter: &SearchFilter,
    ) -> Result<Vec<Box<dyn Candidate>>, BackendError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.filters
            .lock()
            .expect("lock poisoned")
            .push(filter.clone());

        if let Some(reason) = self.outage.lock().expect("lock poisoned").clone() {
            return Err(BackendError::unavailable(self.kind, reason));
        }

        let slots = self.slots.lock().expect("lock poisoned").clone();
        Ok(slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                Box::new(MockCandidate {
                    label: format!("mock-{}:{i}", self.kind),
                    slot,
                }) as Box<dyn Candidate>
            })
            .collect())
    }
}
