//! [`PersonSignal`] – where is the most prominent person?
//!
//! One poll grabs a frame, runs the detector and reduces the result to a
//! single normalized horizontal offset:
//!
//! ```text
//! relative_x = (left + width / 2) / image_width − 0.5
//! ```
//!
//! `0.0` means centred, `-0.5` the left edge and `0.5` the right edge.
//! Only boxes of the person class at or above the confidence threshold count;
//! among those the widest box wins (the nearest person is the biggest), and
//! on an exact width tie the first box in detector order wins.
//!
//! A missing frame is normal (camera still booting or unplugged) and simply
//! yields "no detection".  The poll also remembers when the camera last
//! delivered a frame so the controller can tell "nobody there" apart from
//! "camera dead".

use std::sync::Arc;
use std::time::Instant;

use tank_hal::{Camera, Clock};
use tank_types::DetectionResult;
use tracing::{debug, info, warn};

use crate::detector::{Detection, Detections, Detector};
use crate::recorder::DetectionRecorder;

/// Which detections count as a person.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonFilter {
    pub person_class: u32,
    pub confidence_threshold: f32,
}

impl PersonFilter {
    /// Offset of the widest valid person box, if any.
    pub fn largest_person_relative_x(&self, detections: &Detections) -> Option<f32> {
        let persons = || {
            detections
                .instances
                .iter()
                .filter(|d| d.class_id == self.person_class)
        };

        let mut largest: Option<&Detection> = None;
        let mut valid = 0usize;
        for person in persons().filter(|d| d.score >= self.confidence_threshold) {
            valid += 1;
            // Strictly wider only: the first box keeps an exact tie.
            if largest.is_none_or(|best| person.bbox.width() > best.bbox.width()) {
                largest = Some(person);
            }
        }

        let Some(person) = largest else {
            let weak: Vec<f32> = persons().map(|d| d.score).collect();
            if weak.is_empty() {
                info!("no valid person detected");
            } else {
                let max_confidence = weak.iter().copied().fold(f32::MIN, f32::max);
                info!(
                    invalid_persons = weak.len(),
                    max_confidence = format_args!("{max_confidence:.2}"),
                    "no valid person detected, only low-confidence ones"
                );
            }
            return None;
        };

        if detections.image_width == 0 {
            warn!("detector reported zero image width; ignoring detection");
            return None;
        }
        let relative_x =
            (person.bbox.center_x() / detections.image_width as f32 - 0.5).clamp(-0.5, 0.5);
        info!(
            valid_persons = valid,
            relative_x = format_args!("{relative_x:.2}"),
            "largest person located"
        );
        Some(relative_x)
    }
}

/// Camera + detector reduced to a [`DetectionResult`] per poll.
pub struct PersonSignal {
    camera: Box<dyn Camera>,
    detector: Box<dyn Detector>,
    filter: PersonFilter,
    clock: Arc<dyn Clock>,
    camera_last_seen: Option<Instant>,
    recorder: Option<DetectionRecorder>,
}

impl PersonSignal {
    pub fn new(
        camera: Box<dyn Camera>,
        detector: Box<dyn Detector>,
        filter: PersonFilter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            camera,
            detector,
            filter,
            clock,
            camera_last_seen: None,
            recorder: None,
        }
    }

    /// Keep a periodic record of detector output.
    pub fn with_recorder(mut self, recorder: DetectionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn camera_last_seen(&self) -> Option<Instant> {
        self.camera_last_seen
    }

    /// Poll once.  Never fails: camera and detector problems are logged and
    /// reported as "no detection".
    pub fn poll(&mut self) -> DetectionResult {
        let relative_x = self.locate();
        DetectionResult {
            relative_x,
            camera_last_seen: self.camera_last_seen,
        }
    }

    fn locate(&mut self) -> Option<f32> {
        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(camera = %self.camera.id(), error = %e, "no frame");
                return None;
            }
        };
        let now = self.clock.now();
        self.camera_last_seen = Some(now);

        debug!("detecting persons");
        let detections = match self.detector.detect(&frame) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "detector failed");
                return None;
            }
        };
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.maybe_record(now, &detections);
        }
        self.filter.largest_person_relative_x(&detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BoundingBox;
    use std::time::Duration;
    use tank_hal::{CameraFrame, ManualClock};
    use tank_types::TankError;

    const PERSON: u32 = 0;
    const DOG: u32 = 16;

    fn filter() -> PersonFilter {
        PersonFilter {
            person_class: PERSON,
            confidence_threshold: 0.5,
        }
    }

    fn det(class_id: u32, score: f32, left: f32, right: f32) -> Detection {
        Detection {
            class_id,
            score,
            bbox: BoundingBox {
                left,
                top: 0.0,
                right,
                bottom: 100.0,
            },
        }
    }

    fn frame_of(instances: Vec<Detection>) -> Detections {
        Detections {
            image_width: 1000,
            image_height: 500,
            instances,
        }
    }

    #[test]
    fn centred_person_is_zero() {
        let d = frame_of(vec![det(PERSON, 0.9, 400.0, 600.0)]);
        assert_eq!(filter().largest_person_relative_x(&d), Some(0.0));
    }

    #[test]
    fn widest_person_wins() {
        let d = frame_of(vec![
            det(PERSON, 0.9, 0.0, 100.0),
            det(PERSON, 0.9, 700.0, 1000.0),
            det(PERSON, 0.9, 400.0, 500.0),
        ]);
        let x = filter().largest_person_relative_x(&d).unwrap();
        assert!((x - 0.35).abs() < 1e-6);
    }

    #[test]
    fn equal_widths_keep_first_seen() {
        let d = frame_of(vec![
            det(PERSON, 0.9, 0.0, 200.0),
            det(PERSON, 0.9, 800.0, 1000.0),
        ]);
        let x = filter().largest_person_relative_x(&d).unwrap();
        assert!((x - (-0.4)).abs() < 1e-6);
    }

    #[test]
    fn low_confidence_and_wrong_class_are_ignored() {
        let d = frame_of(vec![
            det(PERSON, 0.2, 0.0, 900.0),
            det(DOG, 0.99, 0.0, 900.0),
        ]);
        assert_eq!(filter().largest_person_relative_x(&d), None);
    }

    #[test]
    fn threshold_is_inclusive() {
        let d = frame_of(vec![det(PERSON, 0.5, 0.0, 100.0)]);
        let x = filter().largest_person_relative_x(&d).unwrap();
        assert!((x - (-0.45)).abs() < 1e-6);
    }

    #[test]
    fn wider_low_confidence_box_does_not_shadow_valid_one() {
        let d = frame_of(vec![
            det(PERSON, 0.1, 0.0, 1000.0),
            det(PERSON, 0.8, 900.0, 1000.0),
        ]);
        let x = filter().largest_person_relative_x(&d).unwrap();
        assert!((x - 0.45).abs() < 1e-6);
    }

    #[test]
    fn zero_image_width_yields_nothing() {
        let mut d = frame_of(vec![det(PERSON, 0.9, 0.0, 10.0)]);
        d.image_width = 0;
        assert_eq!(filter().largest_person_relative_x(&d), None);
    }

    #[test]
    fn offset_is_clamped_to_frame() {
        let d = frame_of(vec![det(PERSON, 0.9, 1500.0, 1700.0)]);
        assert_eq!(filter().largest_person_relative_x(&d), Some(0.5));
    }

    // ── PersonSignal ────────────────────────────────────────────────────────

    struct ScriptedCamera {
        frames: Vec<bool>,
    }

    impl Camera for ScriptedCamera {
        fn id(&self) -> &str {
            "scripted"
        }

        fn capture(&mut self) -> Result<CameraFrame, TankError> {
            let ok = if self.frames.is_empty() {
                false
            } else {
                self.frames.remove(0)
            };
            if ok {
                Ok(CameraFrame {
                    width: 1000,
                    height: 500,
                    data: vec![0],
                })
            } else {
                Err(TankError::unavailable("scripted", "no frame"))
            }
        }
    }

    struct FixedDetector {
        result: Result<Detections, ()>,
        calls: usize,
    }

    impl Detector for FixedDetector {
        fn detect(&mut self, _frame: &CameraFrame) -> Result<Detections, TankError> {
            self.calls += 1;
            self.result
                .clone()
                .map_err(|()| TankError::unavailable("detector", "model crashed"))
        }
    }

    fn signal(frames: Vec<bool>, result: Result<Detections, ()>, clock: Arc<ManualClock>) -> PersonSignal {
        PersonSignal::new(
            Box::new(ScriptedCamera { frames }),
            Box::new(FixedDetector { result, calls: 0 }),
            filter(),
            clock,
        )
    }

    #[test]
    fn missing_frame_is_no_detection_and_not_seen() {
        let clock = Arc::new(ManualClock::new());
        let mut s = signal(vec![false], Ok(frame_of(vec![])), clock);
        let r = s.poll();
        assert!(!r.person_detected());
        assert!(r.camera_last_seen.is_none());
    }

    #[test]
    fn frame_updates_last_seen() {
        let clock = Arc::new(ManualClock::new());
        clock.advance(Duration::from_secs(5));
        let t = clock.now();
        let mut s = signal(
            vec![true, false],
            Ok(frame_of(vec![det(PERSON, 0.9, 400.0, 600.0)])),
            clock.clone(),
        );
        let r = s.poll();
        assert_eq!(r.relative_x, Some(0.0));
        assert_eq!(r.camera_last_seen, Some(t));

        clock.advance(Duration::from_secs(1));
        let r = s.poll();
        assert!(!r.person_detected());
        assert_eq!(r.camera_last_seen, Some(t));
    }

    #[test]
    fn detector_failure_still_counts_camera_as_seen() {
        let clock = Arc::new(ManualClock::new());
        let mut s = signal(vec![true], Err(()), clock);
        let r = s.poll();
        assert!(!r.person_detected());
        assert!(r.camera_last_seen.is_some());
    }

    #[test]
    fn recorder_receives_detections() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let mut s = signal(vec![true], Ok(frame_of(vec![])), clock)
            .with_recorder(DetectionRecorder::new(dir.path(), Duration::from_secs(60)));
        s.poll();
        let saved = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(saved, 1);
    }
}
