mod dispatch;
mod gate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tokio::runtime::Handle;

use crate::analytics::Detector;
use crate::camera::DeviceError;
use crate::config::Config;
use crate::handlers::{build_handlers, RegistryError};

pub use dispatch::Dispatcher;
pub use gate::EventGate;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Suppressed,
    Dispatched { event_count: u64 },
}

/// Drives detection at a fixed rate and hands admitted events to the
/// dispatcher. The detector and the gate are only touched from the thread
/// running the loop.
pub struct Runner<D: Detector> {
    config: Config,
    detector: D,
    gate: EventGate,
    dispatcher: Dispatcher,
}

impl<D: Detector> Runner<D> {
    /// Registers handlers, then opens the capture device.
    pub fn init(config: Config, mut detector: D, runtime: Handle) -> Result<Self, RunnerError> {
        let handlers = build_handlers(&config.handlers, &config)?;
        detector.open(&config.device_id)?;

        let gate = EventGate::new(Instant::now(), config.min_interval());

        Ok(Self {
            config,
            detector,
            gate,
            dispatcher: Dispatcher::new(runtime, handlers),
        })
    }

    pub fn tick(&mut self) -> Result<TickOutcome, DeviceError> {
        let Some(event) = self
            .detector
            .process(self.config.show_video, self.config.min_area)?
        else {
            return Ok(TickOutcome::Idle);
        };

        if !self.gate.admit(event.detected_at) {
            tracing::trace!(
                at = %event.display_time(),
                threshold = ?self.gate.threshold(),
                "motion suppressed"
            );
            return Ok(TickOutcome::Suppressed);
        }

        // Logged here rather than from handler tasks, which would race with
        // later admissions.
        let event_count = self.gate.event_count();
        tracing::info!(event_count, at = %event.display_time(), "motion event admitted");

        self.dispatcher.dispatch(event);
        Ok(TickOutcome::Dispatched { event_count })
    }

    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        let interval = self.config.tick_interval();
        tracing::info!(
            device = %self.config.device_id,
            interval_ms = interval.as_millis() as u64,
            handlers = self.dispatcher().handlers().len(),
            "motion runner started"
        );

        let mut next_tick = Instant::now();
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.tick() {
                tracing::warn!(error = %e, "motion detection error");
            }

            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                // behind schedule: drop missed ticks
                next_tick = now;
            }
        }

        self.close();
        tracing::info!(
            events = self.gate().event_count(),
            "motion runner stopped"
        );
    }

    pub fn close(&mut self) {
        self.detector.close();
    }

    pub fn gate(&self) -> &EventGate {
        &self.gate
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

pub fn spawn_runner<D: Detector + 'static>(
    runner: Runner<D>,
    shutdown: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || runner.run(shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use chrono::{Local, TimeDelta};

    use crate::event::{Frame, MotionEvent};

    enum Step {
        Motion,
        /// Motion stamped with a wall-clock time shifted from now.
        MotionWallClock(TimeDelta),
        NoFrame,
        Fail,
    }

    #[derive(Default)]
    struct Calls {
        open: AtomicUsize,
        process: AtomicUsize,
        close: AtomicUsize,
    }

    struct MockDetector {
        steps: VecDeque<Step>,
        calls: Arc<Calls>,
    }

    impl MockDetector {
        fn new(steps: Vec<Step>) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            let detector = Self {
                steps: steps.into(),
                calls: Arc::clone(&calls),
            };
            (detector, calls)
        }
    }

    impl Detector for MockDetector {
        fn open(&mut self, _device_id: &str) -> Result<(), DeviceError> {
            self.calls.open.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn process(
            &mut self,
            _show_video: bool,
            _min_area: f64,
        ) -> Result<Option<MotionEvent>, DeviceError> {
            self.calls.process.fetch_add(1, Ordering::SeqCst);
            match self.steps.pop_front() {
                Some(Step::Motion) => Ok(Some(motion_event(TimeDelta::zero()))),
                Some(Step::MotionWallClock(shift)) => Ok(Some(motion_event(shift))),
                Some(Step::Fail) => Err(DeviceError::Closed),
                Some(Step::NoFrame) | None => Ok(None),
            }
        }

        fn close(&mut self) {
            self.calls.close.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn motion_event(wall_clock_shift: TimeDelta) -> MotionEvent {
        let frame = Frame::new(1, 1, 3, vec![0, 0, 255]).unwrap();
        MotionEvent::new(
            frame,
            Instant::now() + Duration::from_millis(1),
            Local::now() + wall_clock_shift,
        )
    }

    fn test_config() -> Config {
        Config {
            min_interval_secs: 30,
            show_video: false,
            handlers: vec!["console".to_string()],
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_init_opens_device_and_registers_handlers() {
        let (detector, calls) = MockDetector::new(Vec::new());
        let runner = Runner::init(test_config(), detector, Handle::current()).unwrap();

        assert_eq!(calls.open.load(Ordering::SeqCst), 1);
        assert_eq!(runner.dispatcher().handlers().len(), 1);
        assert_eq!(runner.gate().event_count(), 0);
    }

    #[tokio::test]
    async fn test_init_with_unknown_handler_leaves_device_closed() {
        let config = Config {
            handlers: vec!["console".to_string(), "reporter".to_string()],
            ..test_config()
        };
        let (detector, calls) = MockDetector::new(Vec::new());

        let result = Runner::init(config, detector, Handle::current());

        assert!(matches!(
            result,
            Err(RunnerError::Registry(RegistryError::UnknownHandler(_)))
        ));
        assert_eq!(calls.open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_burst_admits_first_event_only() {
        let (detector, calls) = MockDetector::new(vec![Step::Motion, Step::Motion, Step::Motion]);
        let mut runner = Runner::init(test_config(), detector, Handle::current()).unwrap();

        assert_eq!(
            runner.tick().unwrap(),
            TickOutcome::Dispatched { event_count: 1 }
        );
        assert_eq!(runner.tick().unwrap(), TickOutcome::Suppressed);
        assert_eq!(runner.tick().unwrap(), TickOutcome::Suppressed);

        assert_eq!(calls.process.load(Ordering::SeqCst), 3);
        assert_eq!(runner.gate().event_count(), 1);
    }

    #[tokio::test]
    async fn test_wall_clock_step_back_does_not_suppress() {
        let (detector, _) = MockDetector::new(vec![
            Step::Motion,
            Step::MotionWallClock(TimeDelta::hours(-1)),
        ]);
        let config = Config {
            min_interval_secs: 0,
            ..test_config()
        };
        let mut runner = Runner::init(config, detector, Handle::current()).unwrap();

        assert_eq!(
            runner.tick().unwrap(),
            TickOutcome::Dispatched { event_count: 1 }
        );
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(
            runner.tick().unwrap(),
            TickOutcome::Dispatched { event_count: 2 }
        );
    }

    #[tokio::test]
    async fn test_no_frame_leaves_gate_untouched() {
        let (detector, _) = MockDetector::new(vec![Step::NoFrame]);
        let mut runner = Runner::init(test_config(), detector, Handle::current()).unwrap();
        let threshold = runner.gate().threshold();

        assert_eq!(runner.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(runner.gate().threshold(), threshold);
        assert_eq!(runner.gate().event_count(), 0);
    }

    #[tokio::test]
    async fn test_device_error_does_not_stop_ticks() {
        let (detector, _) = MockDetector::new(vec![Step::Fail, Step::Motion]);
        let mut runner = Runner::init(test_config(), detector, Handle::current()).unwrap();

        assert!(matches!(runner.tick(), Err(DeviceError::Closed)));
        assert_eq!(
            runner.tick().unwrap(),
            TickOutcome::Dispatched { event_count: 1 }
        );
    }

    #[tokio::test]
    async fn test_close_releases_detector() {
        let (detector, calls) = MockDetector::new(Vec::new());
        let mut runner = Runner::init(test_config(), detector, Handle::current()).unwrap();
        runner.close();
        assert_eq!(calls.close.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (detector, calls) = MockDetector::new(vec![Step::Fail, Step::Motion, Step::NoFrame]);
        let config = Config {
            fps: 100,
            ..test_config()
        };
        let runner = Runner::init(config, detector, Handle::current()).unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_runner(runner, Arc::clone(&shutdown));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.store(true, Ordering::Relaxed);
        handle.await.unwrap();

        assert!(calls.process.load(Ordering::SeqCst) >= 3);
        assert_eq!(calls.close.load(Ordering::SeqCst), 1);
    }
}
