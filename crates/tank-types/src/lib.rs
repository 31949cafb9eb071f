use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One independently driven degree of motion of the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Chain-driven rotation stage, wired to the mixing extruder.
    Chain,
    /// Slow gun-elevation axis.
    Gun,
}

impl Axis {
    /// G-code axis letter the motion controller uses for this axis.
    pub fn gcode_letter(self) -> char {
        match self {
            Axis::Chain => 'E',
            Axis::Gun => 'Z',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Chain => write!(f, "chain"),
            Axis::Gun => write!(f, "gun"),
        }
    }
}

/// Key identifying an audible reaction.
///
/// Resolved by the speech capability to a prerecorded clip stored under a
/// folder of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhraseCue {
    /// Played whenever a person is being tracked.
    Human,
    /// Faint periodic sound that keeps the amplifier awake.
    Heartbeat,
    /// Any other phrase folder.
    Named(String),
}

impl PhraseCue {
    pub fn key(&self) -> &str {
        match self {
            PhraseCue::Human => "human",
            PhraseCue::Heartbeat => "heartbeat",
            PhraseCue::Named(name) => name,
        }
    }
}

impl From<&str> for PhraseCue {
    fn from(key: &str) -> Self {
        match key {
            "human" => PhraseCue::Human,
            "heartbeat" => PhraseCue::Heartbeat,
            other => PhraseCue::Named(other.to_string()),
        }
    }
}

impl fmt::Display for PhraseCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of polling the person signal once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionResult {
    /// Horizontal offset of the most prominent person in `[-0.5, 0.5]`;
    /// `0.0` is centred, negative is left, positive is right.
    pub relative_x: Option<f32>,
    /// When the camera last produced any frame. `None` until the first frame.
    pub camera_last_seen: Option<Instant>,
}

impl DetectionResult {
    pub fn person_detected(&self) -> bool {
        self.relative_x.is_some()
    }
}

/// Error type shared by every tank crate.
///
/// Only [`TankError::Transport`] and [`TankError::Config`] are allowed to
/// reach the process boundary; the other variants are absorbed by the
/// component that produced them.
#[derive(Error, Debug)]
pub enum TankError {
    #[error("Transport Error during {operation}: {details}")]
    Transport { operation: String, details: String },

    #[error("Hardware Unavailable on {component}: {details}")]
    HardwareUnavailable { component: String, details: String },

    #[error("Network Unready: {0}")]
    NetworkUnready(String),

    #[error("Speech Failure: {0}")]
    SpeechFailure(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl TankError {
    pub fn transport(operation: impl Into<String>, details: impl Into<String>) -> Self {
        TankError::Transport {
            operation: operation.into(),
            details: details.into(),
        }
    }

    pub fn unavailable(component: impl Into<String>, details: impl Into<String>) -> Self {
        TankError::HardwareUnavailable {
            component: component.into(),
            details: details.into(),
        }
    }

    /// `true` for errors that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TankError::Transport { .. } | TankError::Config(_))
    }
}
