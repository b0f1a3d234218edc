//! Motor and sensor port addressing.
//!
//! An NXT brick has three motor outputs (A, B, C) and four sensor inputs
//! (1–4).  The UI refers to them by label; these types validate labels once
//! so brick connections only ever see valid ports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the brick's motor outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorPort {
    A,
    B,
    C,
}

impl MotorPort {
    pub const ALL: [MotorPort; 3] = [MotorPort::A, MotorPort::B, MotorPort::C];

    /// Parses `"A"`, `"b"`, ... (case-insensitive, surrounding space ignored).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "A" => Some(MotorPort::A),
            "B" => Some(MotorPort::B),
            "C" => Some(MotorPort::C),
            _ => None,
        }
    }

    /// Zero-based output number as used on the wire.
    pub fn index(self) -> usize {
        match self {
            MotorPort::A => 0,
            MotorPort::B => 1,
            MotorPort::C => 2,
        }
    }
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MotorPort::A => "A",
            MotorPort::B => "B",
            MotorPort::C => "C",
        };
        f.write_str(label)
    }
}

/// One of the brick's sensor inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorPort {
    S1,
    S2,
    S3,
    S4,
}

impl SensorPort {
    /// Maps the 1-based number printed on the brick.
    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(SensorPort::S1),
            2 => Some(SensorPort::S2),
            3 => Some(SensorPort::S3),
            4 => Some(SensorPort::S4),
            _ => None,
        }
    }

    /// Parses a label such as `"3"`.
    pub fn from_label(label: &str) -> Option<Self> {
        label.trim().parse::<i64>().ok().and_then(Self::from_number)
    }

    pub fn number(self) -> u8 {
        match self {
            SensorPort::S1 => 1,
            SensorPort::S2 => 2,
            SensorPort::S3 => 3,
            SensorPort::S4 => 4,
        }
    }
}

impl fmt::Display for SensorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// How a sensor reading should be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Color sensor, returns a color code.
    Color,
    /// Light sensor with its lamp off (ambient light).
    Light,
    /// Ultrasonic distance in centimetres.
    Distance,
    /// Touch sensor, 1 when pressed.
    Button,
    /// Sound level.
    Sound,
    /// Light sensor with its lamp on (reflected light).
    Gray,
}

impl SensorKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "color" => Some(SensorKind::Color),
            "light" => Some(SensorKind::Light),
            "distance" => Some(SensorKind::Distance),
            "button" => Some(SensorKind::Button),
            "sound" => Some(SensorKind::Sound),
            "gray" => Some(SensorKind::Gray),
            _ => None,
        }
    }
}

/// Lamp color of the color sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    Full,
    Red,
    Green,
    Blue,
    None,
}

impl LightColor {
    /// Maps a UI color name; anything unrecognised turns the lamp off.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" | "full" => LightColor::Full,
            "red" => LightColor::Red,
            "green" => LightColor::Green,
            "blue" => LightColor::Blue,
            _ => LightColor::None,
        }
    }
}
