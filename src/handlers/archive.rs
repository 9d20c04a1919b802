use std::path::PathBuf;

use crate::event::MotionEvent;

use super::{Handler, HandlerError};

const PARTIAL_EXT: &str = "png.partial";

/// Writes the triggering frame as a PNG under the data directory.
///
/// The image is written beside its final name and renamed into place, so
/// the archived path only ever holds a complete file.
pub struct ArchiveHandler {
    data_dir: PathBuf,
}

impl ArchiveHandler {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

impl Handler for ArchiveHandler {
    fn handle(&self, event: &MotionEvent) -> Result<(), HandlerError> {
        std::fs::create_dir_all(&self.data_dir)?;

        let path = event.image_path(&self.data_dir);
        let partial = path.with_extension(PARTIAL_EXT);
        let png = event.frame.encode_png()?;

        let written = std::fs::write(&partial, png).and_then(|()| std::fs::rename(&partial, &path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }

        tracing::info!(
            path = %path.display(),
            width = event.frame.width(),
            height = event.frame.height(),
            "motion capture saved"
        );
        Ok(())
    }
}
