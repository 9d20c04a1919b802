mod motion;
mod pipeline;
mod preview;

pub use pipeline::{Detector, MotionPipeline};
