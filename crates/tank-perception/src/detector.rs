//! Object-detector capability.
//!
//! The model itself is opaque: it receives one frame and returns labelled
//! boxes with confidence scores plus the size of the image it looked at.
//! [`HttpDetector`] talks to an inference server that exposes exactly that
//! contract as JSON.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tank_hal::CameraFrame;
use tank_types::TankError;

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Horizontal centre in pixels.
    pub fn center_x(&self) -> f32 {
        self.left + self.width() / 2.0
    }
}

/// One labelled box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub score: f32,
    pub bbox: BoundingBox,
}

/// Everything the detector found in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detections {
    pub image_width: u32,
    pub image_height: u32,
    /// Detections in the order the model produced them.
    pub instances: Vec<Detection>,
}

/// A person/object detector.
pub trait Detector: Send {
    /// Run the model once on `frame`.
    ///
    /// # Errors
    ///
    /// [`TankError::HardwareUnavailable`] when inference cannot run.
    fn detect(&mut self, frame: &CameraFrame) -> Result<Detections, TankError>;
}

/// Detector backed by an HTTP inference server.
///
/// The frame bytes are POSTed as `application/octet-stream` with the frame
/// size in `X-Frame-Width` / `X-Frame-Height`; the server answers with a
/// JSON [`Detections`] document.
pub struct HttpDetector {
    url: String,
    client: Client,
}

impl HttpDetector {
    pub fn new(url: impl Into<String>) -> Result<Self, TankError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TankError::unavailable("detector", e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Detector for HttpDetector {
    fn detect(&mut self, frame: &CameraFrame) -> Result<Detections, TankError> {
        self.client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header("X-Frame-Width", frame.width)
            .header("X-Frame-Height", frame.height)
            .body(frame.data.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<Detections>())
            .map_err(|e| TankError::unavailable("detector", e.to_string()))
    }
}

/// Stand-in used when no inference server is configured.  Every call
/// reports the detector as unavailable, which the person signal treats as
/// "nobody seen".
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDetector;

impl Detector for NoDetector {
    fn detect(&mut self, _frame: &CameraFrame) -> Result<Detections, TankError> {
        Err(TankError::unavailable("detector", "no detector configured"))
    }
}
