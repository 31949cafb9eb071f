//! `tank-perception` – seeing people.
//!
//! # Modules
//!
//! - [`detector`] – [`Detector`][detector::Detector] capability and the
//!   detection data model, with an HTTP inference-server client.
//! - [`person`] – [`PersonSignal`][person::PersonSignal]: camera + detector
//!   reduced to the horizontal offset of the most prominent person, plus
//!   camera liveness.
//! - [`recorder`] – [`DetectionRecorder`][recorder::DetectionRecorder]:
//!   rate-limited JSON dumps of detector output.

pub mod detector;
pub mod person;
pub mod recorder;

pub use detector::{BoundingBox, Detection, Detections, Detector, HttpDetector, NoDetector};
pub use person::{PersonFilter, PersonSignal};
pub use recorder::DetectionRecorder;
