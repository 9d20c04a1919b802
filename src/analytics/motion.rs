use opencv::{
    core::{self, Mat, Point, Rect, Size, Vector},
    imgproc,
    prelude::*,
    video::{self, BackgroundSubtractorTrait},
    Result as CvResult,
};

const HISTORY: i32 = 500;
const VAR_THRESHOLD: f64 = 16.0;
const FOREGROUND_THRESHOLD: f64 = 25.0;
const KERNEL_SIZE: i32 = 3;

/// Background subtraction plus contour filtering.
///
/// Owns the MOG2 model; every call to [`MotionDetector::detect`] feeds it,
/// whether or not motion is reported.
pub struct MotionDetector {
    mog2: core::Ptr<video::BackgroundSubtractorMOG2>,
    fg_mask: Mat,
    thresh: Mat,
    dilated: Mat,
    kernel: Mat,
    learning_rate: f64,
}

impl MotionDetector {
    pub fn new() -> CvResult<Self> {
        let mog2 = video::create_background_subtractor_mog2(HISTORY, VAR_THRESHOLD, true)?;
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(KERNEL_SIZE, KERNEL_SIZE),
            Point::new(-1, -1),
        )?;

        Ok(Self {
            mog2,
            fg_mask: Mat::default(),
            thresh: Mat::default(),
            dilated: Mat::default(),
            kernel,
            learning_rate: -1.0,
        })
    }

    /// Returns the bounding boxes of foreground regions larger than
    /// `min_area`. Processing failures yield no regions.
    pub fn detect(&mut self, frame: &Mat, min_area: f64) -> Vec<Rect> {
        match self.try_detect(frame, min_area) {
            Ok(regions) => regions,
            Err(e) => {
                tracing::trace!(error = %e, "frame processing error");
                Vec::new()
            }
        }
    }

    fn try_detect(&mut self, frame: &Mat, min_area: f64) -> CvResult<Vec<Rect>> {
        BackgroundSubtractorTrait::apply(
            &mut self.mog2,
            frame,
            &mut self.fg_mask,
            self.learning_rate,
        )?;

        imgproc::threshold(
            &self.fg_mask,
            &mut self.thresh,
            FOREGROUND_THRESHOLD,
            255.0,
            imgproc::THRESH_BINARY,
        )?;

        imgproc::dilate(
            &self.thresh,
            &mut self.dilated,
            &self.kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &self.dilated,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        motion_regions(&contours, min_area)
    }
}

pub fn motion_regions(contours: &Vector<Vector<Point>>, min_area: f64) -> CvResult<Vec<Rect>> {
    let mut regions = Vec::new();
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        if !exceeds_min_area(area, min_area) {
            continue;
        }
        regions.push(imgproc::bounding_rect(&contour)?);
    }
    Ok(regions)
}

fn exceeds_min_area(area: f64, min_area: f64) -> bool {
    area > min_area
}
