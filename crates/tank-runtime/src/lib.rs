//! `tank-runtime` – the tank's control loop and process plumbing.
//!
//! # Modules
//!
//! - [`behavior`] – [`BehaviorController`][behavior::BehaviorController]:
//!   poll the person signal, pick tracking / idle / unavailable behavior,
//!   issue moves and wait them out.
//! - [`speech_cue`] – [`SpeechCue`][speech_cue::SpeechCue]: speech that can
//!   fail without the loop noticing.
//! - [`telemetry`] – `tracing` subscriber setup with optional OTLP export.

pub mod behavior;
pub mod speech_cue;
pub mod telemetry;

pub use behavior::{BehaviorController, ControllerConfig, CycleReport, CycleState};
pub use speech_cue::SpeechCue;
pub use telemetry::{TracerProviderGuard, init_tracing};
