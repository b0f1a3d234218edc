//! Test doubles shared by the application-layer unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use nxt_core::{
    BackendError, BackendKind, BrickConnection, BrickError, Candidate, ConnectError, DeviceInfo,
    LightColor, MotorPort, SearchFilter, SensorKind, SensorPort, TransportBackend,
};

mock! {
    pub Conn {}

    #[async_trait]
    impl BrickConnection for Conn {
        async fn device_info(&mut self) -> Result<DeviceInfo, BrickError>;
        async fn close(&mut self) -> Result<(), BrickError>;
        async fn run_motor(
            &mut self,
            port: MotorPort,
            power: i8,
            tacho_limit: u32,
        ) -> Result<(), BrickError>;
        async fn run_synchronized(
            &mut self,
            leader: MotorPort,
            follower: MotorPort,
            power: i8,
            tacho_limit: u32,
        ) -> Result<(), BrickError>;
        async fn brake_motor(&mut self, port: MotorPort) -> Result<(), BrickError>;
        async fn idle_motor(&mut self, port: MotorPort) -> Result<(), BrickError>;
        async fn tacho_count(&mut self, port: MotorPort) -> Result<i32, BrickError>;
        async fn read_sensor(
            &mut self,
            port: SensorPort,
            kind: SensorKind,
        ) -> Result<i32, BrickError>;
        async fn set_light_color(
            &mut self,
            port: SensorPort,
            color: LightColor,
        ) -> Result<(), BrickError>;
        async fn play_tone(&mut self, frequency_hz: u16, duration_ms: u16) -> Result<(), BrickError>;
        async fn battery_level(&mut self) -> Result<u16, BrickError>;
    }
}

/// A connection that reports `name` and closes cleanly any number of times.
pub(crate) fn conn_named(name: &str) -> MockConn {
    let info = DeviceInfo::new(name, "00:16:53:00:00:01");
    let mut conn = MockConn::new();
    conn.expect_device_info()
        .returning(move || Ok(info.clone()));
    conn.expect_close().returning(|| Ok(()));
    conn
}

/// What a scripted candidate does when connected.
pub(crate) enum Script {
    Opens(MockConn),
    Refuses,
}

struct ScriptedCandidate {
    label: String,
    script: Script,
}

#[async_trait]
impl Candidate for ScriptedCandidate {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn connect(self: Box<Self>) -> Result<Box<dyn BrickConnection>, ConnectError> {
        match self.script {
            Script::Opens(conn) => Ok(Box::new(conn)),
            Script::Refuses => Err(ConnectError::failed(self.label, "refused")),
        }
    }
}

/// A backend that hands out its scripted candidates once.
pub(crate) struct ScriptedBackend {
    kind: BackendKind,
    scripts: Mutex<Vec<Script>>,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub(crate) fn new(kind: BackendKind, scripts: Vec<Script>) -> Self {
        Self {
            kind,
            scripts: Mutex::new(scripts),
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn unavailable(kind: BackendKind) -> Self {
        Self {
            unavailable: true,
            ..Self::new(kind, Vec::new())
        }
    }

    /// Shared counter of `enumerate` calls, readable after the backend is boxed.
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TransportBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn enumerate(
        &self,
        _filter: &SearchFilter,
    ) -> Result<Vec<Box<dyn Candidate>>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(BackendError::unavailable(self.kind, "scripted outage"));
        }
        let scripts = std::mem::take(&mut *self.scripts.lock().unwrap());
        Ok(scripts
            .into_iter()
            .enumerate()
            .map(|(i, script)| {
                Box::new(ScriptedCandidate {
                    label: format!("{}:{i}", self.kind),
                    script,
                }) as Box<dyn Candidate>
            })
            .collect())
    }
}
