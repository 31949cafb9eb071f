//! Generic `Camera` trait and the frame sources the tank ships with.

use std::time::Duration;

use reqwest::blocking::Client;
use tank_types::TankError;
use tracing::debug;

/// A single frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels (0 when the driver does not know it).
    pub width: u32,
    /// Frame height in pixels (0 when the driver does not know it).
    pub height: u32,
    /// Pixel data, raw or encoded depending on the driver.
    pub data: Vec<u8>,
}

/// A camera or image-capture device.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`TankError::HardwareUnavailable`] if no frame can be
    /// captured (device unplugged, still booting, stream stalled).  Callers
    /// treat this as an expected condition and try again next cycle.
    fn capture(&mut self) -> Result<CameraFrame, TankError>;
}

/// Camera that fetches one encoded still per capture from an HTTP snapshot
/// endpoint (e.g. a streaming daemon's `?action=snapshot` URL).
pub struct HttpSnapshotCamera {
    id: String,
    url: String,
    width: u32,
    height: u32,
    client: Client,
}

impl HttpSnapshotCamera {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Result<Self, TankError> {
        let id = id.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| TankError::unavailable(id.clone(), e.to_string()))?;
        Ok(Self {
            id,
            url: url.into(),
            width,
            height,
            client,
        })
    }
}

impl Camera for HttpSnapshotCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, TankError> {
        debug!(camera = %self.id, "recording image");
        let response = self
            .client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TankError::unavailable(self.id.clone(), e.to_string()))?;
        let data = response
            .bytes()
            .map_err(|e| TankError::unavailable(self.id.clone(), e.to_string()))?;
        if data.is_empty() {
            return Err(TankError::unavailable(self.id.clone(), "empty snapshot"));
        }
        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            data: data.to_vec(),
        })
    }
}

/// Stand-in used when no camera is configured: every capture fails, which
/// drives the controller into its idle fallback.
#[derive(Debug, Clone)]
pub struct DisconnectedCamera {
    id: String,
}

impl DisconnectedCamera {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Camera for DisconnectedCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, TankError> {
        Err(TankError::unavailable(self.id.clone(), "no camera configured"))
    }
}
