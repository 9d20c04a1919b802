use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use opencv::core::{Mat, Vector, CV_8U};
use opencv::imgcodecs;
use opencv::prelude::*;

const FILE_PATTERN: &str = "%Y-%m-%d-%H-%M-%S";
const FILE_EXT: &str = "png";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Owned 8-bit pixel buffer, never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if expected == 0 || data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Copies an 8-bit matrix out of OpenCV-owned memory.
    pub fn from_mat(mat: &Mat) -> opencv::Result<Option<Self>> {
        if mat.empty() || mat.depth() != CV_8U {
            return Ok(None);
        }

        let contiguous;
        let src = if mat.is_continuous() {
            mat
        } else {
            contiguous = mat.try_clone()?;
            &contiguous
        };

        Ok(Self::new(
            src.cols() as u32,
            src.rows() as u32,
            src.channels() as u32,
            src.data_bytes()?.to_vec(),
        ))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn encode_png(&self) -> opencv::Result<Vec<u8>> {
        let mat = Mat::from_slice(self.data())?;
        let mat = mat.reshape(self.channels() as i32, self.height() as i32)?;

        let mut buf = Vector::<u8>::new();
        let params = Vector::<i32>::new();
        imgcodecs::imencode(".png", &mat, &mut buf, &params)?;
        Ok(buf.to_vec())
    }
}

/// A detected motion. `detected_at` is monotonic and orders events for
/// debouncing; `timestamp` is wall-clock and only names and labels them.
#[derive(Debug)]
pub struct MotionEvent {
    pub frame: Frame,
    pub detected_at: Instant,
    pub timestamp: DateTime<Local>,
}

impl MotionEvent {
    pub fn new(frame: Frame, detected_at: Instant, timestamp: DateTime<Local>) -> Self {
        Self {
            frame,
            detected_at,
            timestamp,
        }
    }

    /// Stamps the frame with the current monotonic and wall-clock time.
    pub fn captured(frame: Frame) -> Self {
        Self::new(frame, Instant::now(), Local::now())
    }

    /// Sortable image file name derived from the event time, e.g.
    /// `2024-03-01-14-05-09.png`.
    pub fn image_file_name(&self) -> String {
        format!("{}.{}", self.timestamp.format(FILE_PATTERN), FILE_EXT)
    }

    pub fn image_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.image_file_name())
    }

    pub fn display_time(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }
}
