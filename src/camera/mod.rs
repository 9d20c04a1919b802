mod capture;

pub use capture::{CameraCapture, DeviceError, FrameSource};
