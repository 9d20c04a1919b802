use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::prelude::*;
use opencv::{highgui, imgproc, Result as CvResult};

const WINDOW_NAME: &str = "Motion Detector";

/// Copy of `frame` with each region outlined and a status caption in the
/// top-left corner.
pub fn annotate(frame: &Mat, regions: &[Rect]) -> CvResult<Mat> {
    let mut canvas = frame.try_clone()?;

    let red = Scalar::new(0.0, 0.0, 255.0, 0.0);
    let green = Scalar::new(0.0, 255.0, 0.0, 0.0);

    for region in regions {
        imgproc::rectangle(&mut canvas, *region, red, 2, imgproc::LINE_8, 0)?;
    }

    let (status, color) = if regions.is_empty() {
        ("Ready", green)
    } else {
        ("Motion detected", red)
    };
    imgproc::put_text(
        &mut canvas,
        status,
        Point::new(10, 20),
        imgproc::FONT_HERSHEY_PLAIN,
        1.2,
        color,
        2,
        imgproc::LINE_8,
        false,
    )?;

    Ok(canvas)
}

/// Live preview window. Rendering never affects detection results.
#[derive(Default)]
pub struct Preview {
    window_open: bool,
}

impl Preview {
    pub fn show(&mut self, frame: &Mat, regions: &[Rect]) {
        if let Err(e) = self.render(frame, regions) {
            tracing::debug!(error = %e, "preview render failed");
        }
    }

    fn render(&mut self, frame: &Mat, regions: &[Rect]) -> CvResult<()> {
        let canvas = annotate(frame, regions)?;

        if !self.window_open {
            highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
            self.window_open = true;
        }
        highgui::imshow(WINDOW_NAME, &canvas)?;
        highgui::wait_key(1)?;
        Ok(())
    }

    pub fn close(&mut self) {
        if !self.window_open {
            return;
        }
        self.window_open = false;
        if let Err(e) = highgui::destroy_window(WINDOW_NAME) {
            tracing::warn!(error = %e, "failed to close preview window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Vec3b, CV_8UC3};

    #[test]
    fn test_annotate_outlines_regions_on_a_copy() {
        let frame =
            Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
        let region = Rect::new(40, 30, 40, 40);

        let annotated = annotate(&frame, &[region]).unwrap();

        assert_eq!(*annotated.at_2d::<Vec3b>(30, 40).unwrap(), Vec3b::from([0, 0, 255]));
        assert_eq!(*annotated.at_2d::<Vec3b>(50, 60).unwrap(), Vec3b::from([0, 0, 0]));
        assert_eq!(*frame.at_2d::<Vec3b>(30, 40).unwrap(), Vec3b::from([0, 0, 0]));
    }
}
