//! Vision memory: periodic dumps of what the detector saw.
//!
//! At most once per interval the raw detector output is written to
//! `<dir>/<YYYYmmdd-HHMMSS>.json`.  Failing to write is logged and otherwise
//! ignored; the memory is a diagnostic aid, not part of the control loop.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::detector::Detections;

pub struct DetectionRecorder {
    dir: PathBuf,
    interval: Duration,
    last_saved: Option<Instant>,
}

impl DetectionRecorder {
    pub fn new(dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
            last_saved: None,
        }
    }

    /// Save `detections` if the interval has elapsed since the last save.
    /// Returns the file written, if any.
    pub fn maybe_record(&mut self, now: Instant, detections: &Detections) -> Option<PathBuf> {
        if self
            .last_saved
            .is_some_and(|last| now.saturating_duration_since(last) <= self.interval)
        {
            return None;
        }
        self.last_saved = Some(now);

        let name = format!("{}.json", chrono::Local::now().format("%Y%m%d-%H%M%S"));
        let path = self.dir.join(name);
        let written = fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|()| serde_json::to_vec_pretty(detections).map_err(|e| e.to_string()))
            .and_then(|bytes| fs::write(&path, bytes).map_err(|e| e.to_string()));
        match written {
            Ok(()) => {
                info!(path = %path.display(), "saved detection");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not save detection");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BoundingBox, Detection};

    fn detections() -> Detections {
        Detections {
            image_width: 640,
            image_height: 480,
            instances: vec![Detection {
                class_id: 0,
                score: 0.8,
                bbox: BoundingBox {
                    left: 1.0,
                    top: 2.0,
                    right: 3.0,
                    bottom: 4.0,
                },
            }],
        }
    }

    #[test]
    fn first_detection_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = DetectionRecorder::new(dir.path().join("vision"), Duration::from_secs(60));
        let path = recorder.maybe_record(Instant::now(), &detections()).unwrap();
        let saved: Detections = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved, detections());
        assert_eq!(path.extension().unwrap(), "json");
    }

    #[test]
    fn saves_are_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = DetectionRecorder::new(dir.path(), Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(recorder.maybe_record(t0, &detections()).is_some());
        assert!(recorder.maybe_record(t0 + Duration::from_secs(30), &detections()).is_none());
        assert!(recorder.maybe_record(t0 + Duration::from_secs(61), &detections()).is_some());
    }

    #[test]
    fn unwritable_dir_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let mut recorder = DetectionRecorder::new(blocker.join("vision"), Duration::ZERO);
        assert!(recorder.maybe_record(Instant::now(), &detections()).is_none());
    }
}
