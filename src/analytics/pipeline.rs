use opencv::core::{Mat, Rect};

use crate::camera::{CameraCapture, DeviceError, FrameSource};
use crate::event::{Frame, MotionEvent};

use super::motion::MotionDetector;
use super::preview::{self, Preview};

pub type SourceOpener =
    Box<dyn Fn(&str) -> Result<Box<dyn FrameSource>, DeviceError> + Send + 'static>;

/// Turns frames from a capture device into motion events.
pub trait Detector: Send {
    fn open(&mut self, device_id: &str) -> Result<(), DeviceError>;

    /// Processes one frame. `Ok(None)` covers both "no frame ready" and
    /// "no motion"; only device failures are errors.
    fn process(
        &mut self,
        show_video: bool,
        min_area: f64,
    ) -> Result<Option<MotionEvent>, DeviceError>;

    fn close(&mut self);
}

struct ActivePipeline {
    source: Box<dyn FrameSource>,
    detector: MotionDetector,
    preview: Preview,
}

pub struct MotionPipeline {
    opener: SourceOpener,
    active: Option<ActivePipeline>,
    annotate_snapshots: bool,
}

impl MotionPipeline {
    pub fn new() -> Self {
        Self::with_opener(Box::new(|device_id: &str| {
            CameraCapture::open(device_id).map(|c| Box::new(c) as Box<dyn FrameSource>)
        }))
    }

    pub fn with_opener(opener: SourceOpener) -> Self {
        Self {
            opener,
            active: None,
            annotate_snapshots: false,
        }
    }

    /// Draws the motion outlines and caption onto event frames.
    pub fn annotate_snapshots(mut self, enabled: bool) -> Self {
        self.annotate_snapshots = enabled;
        self
    }

    fn snapshot(&self, frame: &Mat, regions: &[Rect]) -> Option<Frame> {
        let annotated;
        let frame = if self.annotate_snapshots {
            match preview::annotate(frame, regions) {
                Ok(mat) => {
                    annotated = mat;
                    &annotated
                }
                Err(e) => {
                    tracing::trace!(error = %e, "failed to annotate snapshot");
                    frame
                }
            }
        } else {
            frame
        };

        match Frame::from_mat(frame) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::trace!(error = %e, "failed to snapshot frame");
                None
            }
        }
    }
}

impl Default for MotionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MotionPipeline {
    fn open(&mut self, device_id: &str) -> Result<(), DeviceError> {
        // Re-opening starts from a fresh background model.
        self.close();

        let source = (self.opener)(device_id)?;
        let detector = MotionDetector::new().map_err(|source| DeviceError::Open {
            device: device_id.to_string(),
            source,
        })?;

        self.active = Some(ActivePipeline {
            source,
            detector,
            preview: Preview::default(),
        });
        Ok(())
    }

    fn process(
        &mut self,
        show_video: bool,
        min_area: f64,
    ) -> Result<Option<MotionEvent>, DeviceError> {
        let active = self.active.as_mut().ok_or(DeviceError::NotOpen)?;

        let Some(frame) = active.source.read_frame()? else {
            return Ok(None);
        };

        let regions = active.detector.detect(&frame, min_area);

        if show_video {
            active.preview.show(&frame, &regions);
        }

        if regions.is_empty() {
            return Ok(None);
        }

        tracing::trace!(regions = regions.len(), "motion regions found");

        Ok(self
            .snapshot(&frame, &regions)
            .map(MotionEvent::captured))
    }

    fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Err(e) = active.source.release() {
            tracing::warn!(error = %e, "failed to release capture device");
        }
        active.preview.close();
    }
}
