use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open capture device {device}: {source}")]
    Open {
        device: String,
        source: opencv::Error,
    },
    #[error("capture device {0} is not available")]
    Unavailable(String),
    #[error("video capture device is closed")]
    Closed,
    #[error("failed to read frame: {0}")]
    Read(#[from] opencv::Error),
    #[error("capture device has not been opened")]
    NotOpen,
}

/// A device yielding one raw frame per poll.
///
/// `Ok(None)` means the device is healthy but had no frame ready.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Option<Mat>, DeviceError>;
    fn release(&mut self) -> Result<(), DeviceError>;
}

pub struct CameraCapture {
    device_id: String,
    capture: VideoCapture,
}

impl CameraCapture {
    /// Opens a camera by index (`"0"`) or a file path / stream URL.
    pub fn open(device_id: &str) -> Result<Self, DeviceError> {
        let capture = match device_id.trim().parse::<i32>() {
            Ok(index) => VideoCapture::new(index, videoio::CAP_ANY),
            Err(_) => VideoCapture::from_file(device_id, videoio::CAP_ANY),
        }
        .map_err(|source| DeviceError::Open {
            device: device_id.to_string(),
            source,
        })?;

        if !capture.is_opened()? {
            return Err(DeviceError::Unavailable(device_id.to_string()));
        }

        tracing::info!(device = %device_id, "capture device opened");

        Ok(Self {
            device_id: device_id.to_string(),
            capture,
        })
    }
}

impl FrameSource for CameraCapture {
    fn read_frame(&mut self) -> Result<Option<Mat>, DeviceError> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? {
            return Err(DeviceError::Closed);
        }
        if frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<(), DeviceError> {
        self.capture.release()?;
        tracing::info!(device = %self.device_id, "capture device released");
        Ok(())
    }
}
