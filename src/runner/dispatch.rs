use std::sync::Arc;

use tokio::runtime::Handle;

use crate::event::MotionEvent;
use crate::handlers::NamedHandler;

/// Fans an admitted event out to every handler.
///
/// Each handler runs as its own detached task on the blocking pool. Nothing
/// joins these tasks: a slow or hung handler never holds up the polling loop,
/// and delivery is best effort.
pub struct Dispatcher {
    runtime: Handle,
    handlers: Vec<NamedHandler>,
}

impl Dispatcher {
    pub fn new(runtime: Handle, handlers: Vec<NamedHandler>) -> Self {
        Self { runtime, handlers }
    }

    pub fn handlers(&self) -> &[NamedHandler] {
        &self.handlers
    }

    pub fn dispatch(&self, event: MotionEvent) {
        let event = Arc::new(event);

        for entry in &self.handlers {
            let name = entry.name.clone();
            let handler = Arc::clone(&entry.handler);
            let event = Arc::clone(&event);
            let at = event.display_time();

            self.runtime.spawn(async move {
                let result = tokio::task::spawn_blocking(move || handler.handle(&event)).await;
                match result {
                    Ok(Ok(())) => {
                        tracing::debug!(handler = %name, at = %at, "handler finished");
                    }
                    Ok(Err(e)) => {
                        tracing::error!(handler = %name, at = %at, error = %e, "handler failed");
                    }
                    Err(e) => {
                        tracing::error!(handler = %name, at = %at, error = %e, "handler panicked");
                    }
                }
            });
        }
    }
}
