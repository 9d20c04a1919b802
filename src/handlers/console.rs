use crate::event::MotionEvent;

use super::{Handler, HandlerError};

pub struct ConsoleHandler;

impl Handler for ConsoleHandler {
    fn handle(&self, event: &MotionEvent) -> Result<(), HandlerError> {
        tracing::info!(at = %event.display_time(), "motion detected");
        Ok(())
    }
}
