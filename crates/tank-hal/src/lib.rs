//! `tank-hal` – hardware access for the tank.
//!
//! # Modules
//!
//! - [`axis`] – [`AxisState`][axis::AxisState]: open-loop belief of the chain
//!   and gun positions plus move-duration estimation.
//! - [`motion`] – [`MotionClient`][motion::MotionClient]: the exclusive link
//!   to the OctoPrint-driven motion controller, over a pluggable
//!   [`MotionTransport`][motion::MotionTransport] (REST or dry run).
//! - [`retry`] – [`FixedBackoff`][retry::FixedBackoff] used while waiting for
//!   the controller to power on.
//! - [`camera`] – [`Camera`][camera::Camera] trait and frame sources.
//! - [`speech`] – [`Speaker`][speech::Speaker] trait, the prerecorded
//!   [`PhraseLibrary`][speech::PhraseLibrary] and command-line playback.
//! - [`clock`] – injectable [`Clock`][clock::Clock] so every wait can be
//!   tested without real delays.

pub mod axis;
pub mod camera;
pub mod clock;
pub mod motion;
pub mod retry;
pub mod speech;

pub use axis::{AxisLimits, AxisState};
pub use camera::{Camera, CameraFrame, DisconnectedCamera, HttpSnapshotCamera};
pub use clock::{Clock, ManualClock, SystemClock};
pub use motion::{
    ConnectionParams, DryRunTransport, LinkState, MotionClient, MotionTransport,
    OctoPrintTransport, SentLog, linear_move,
};
pub use retry::FixedBackoff;
pub use speech::{PhraseLibrary, PlayerSpeaker, SilentSpeaker, Speaker};
