// src/acquisition.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::clock::{Clock, EpochReference, MonotonicClock};
use crate::config::AcquisitionConfig;
use crate::drivers::{self, DeviceLink};
use crate::error::{AcquisitionError, AcquisitionResult};
use crate::notify::{Consumer, NullConsumer};
use crate::parser::parse_sample;
use crate::types::{AcquisitionState, Sample};
use crate::window::{SharedWindow, WindowSnapshot};

const THREAD_NAME: &str = "serialscope-acquisition";

/// Running totals for one acquisition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub accepted: u64,
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    skipped: AtomicU64,
}

/// One acquisition run: device link, background thread and rolling window.
///
/// `start()` opens the link and spawns the reader thread; `stop()` asks it to
/// finish, waits for it, and returns the error that ended the run, if any.
/// The loop checks for `stop()` once per read, and a read gives up after
/// `read_timeout_ms`, so `stop()` returns within roughly one read timeout.
pub struct Acquisition {
    config: AcquisitionConfig,
    window: SharedWindow,
    state: Arc<Mutex<AcquisitionState>>,
    stop_requested: Arc<AtomicBool>,
    counters: Arc<Counters>,
    consumer: Option<Box<dyn Consumer>>,
    clock: Option<Box<dyn Clock>>,
    worker: Option<JoinHandle<AcquisitionResult<()>>>,
}

impl Acquisition {
    pub fn new(config: AcquisitionConfig, consumer: impl Consumer + 'static) -> AcquisitionResult<Self> {
        config.validate()?;
        Ok(Self {
            window: SharedWindow::new(config.window_capacity),
            config,
            state: Arc::new(Mutex::new(AcquisitionState::Idle)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            consumer: Some(Box::new(consumer) as Box<dyn Consumer>),
            clock: None,
            worker: None,
        })
    }

    /// Acquisition whose consumer only polls `current_window()`.
    pub fn polling(config: AcquisitionConfig) -> AcquisitionResult<Self> {
        Self::new(config, NullConsumer)
    }

    /// Replaces the default monotonic clock. Only meaningful before `start()`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock) as Box<dyn Clock>);
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        *self.state.lock()
    }

    pub fn current_window(&self) -> WindowSnapshot {
        self.window.snapshot()
    }

    /// Cheap handle for reading the window from another thread.
    pub fn window(&self) -> SharedWindow {
        self.window.clone()
    }

    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// True once the reader thread has exited, whether stopped or failed.
    /// A run that was never started is not finished.
    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Some(worker) => worker.is_finished(),
            None => self.state() == AcquisitionState::Stopped,
        }
    }

    /// Opens the link selected by the config and starts reading.
    pub fn start(&mut self) -> AcquisitionResult<()> {
        self.start_with(drivers::open_link)
    }

    /// Starts reading from a link produced by `open`.
    ///
    /// If `open` fails the acquisition stays `Idle`.
    pub fn start_with<L, F>(&mut self, open: F) -> AcquisitionResult<()>
    where
        L: DeviceLink + 'static,
        F: FnOnce(&AcquisitionConfig) -> AcquisitionResult<L>,
    {
        let state = self.state();
        if state != AcquisitionState::Idle {
            return Err(AcquisitionError::InvalidState {
                operation: "start",
                state,
            });
        }
        let link = open(&self.config)?;
        let cycle = AcquisitionCycle {
            link,
            clock: self
                .clock
                .take()
                .unwrap_or_else(|| Box::new(MonotonicClock::new()) as Box<dyn Clock>),
            consumer: self
                .consumer
                .take()
                .unwrap_or_else(|| Box::new(NullConsumer) as Box<dyn Consumer>),
            window: self.window.clone(),
            stop_requested: Arc::clone(&self.stop_requested),
            counters: Arc::clone(&self.counters),
            epoch: EpochReference::new(),
        };
        *self.state.lock() = AcquisitionState::Running;
        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || {
                let result = cycle.run();
                *state.lock() = AcquisitionState::Stopped;
                result
            });
        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                // The link went down with the closure; this run cannot be retried.
                *self.state.lock() = AcquisitionState::Stopped;
                Err(AcquisitionError::Spawn(e))
            }
        }
    }

    /// Stops the run and waits until the reader thread has released the link.
    ///
    /// Returns the error that terminated the loop early, if there was one.
    /// Calling it again after it returned is a no-op.
    pub fn stop(&mut self) -> AcquisitionResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                AcquisitionState::Idle => {
                    *state = AcquisitionState::Stopped;
                    return Ok(());
                }
                AcquisitionState::Running => *state = AcquisitionState::Stopping,
                AcquisitionState::Stopping | AcquisitionState::Stopped => {}
            }
        }
        self.stop_requested.store(true, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        debug!("Waiting for acquisition thread to exit");
        let result = worker.join().unwrap_or(Err(AcquisitionError::WorkerPanicked));
        *self.state.lock() = AcquisitionState::Stopped;
        result
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.stop() {
                warn!("Acquisition ended with error during drop: {e}");
            }
        }
    }
}

/// State owned by the reader thread.
struct AcquisitionCycle<L> {
    link: L,
    clock: Box<dyn Clock>,
    consumer: Box<dyn Consumer>,
    window: SharedWindow,
    stop_requested: Arc<AtomicBool>,
    counters: Arc<Counters>,
    epoch: EpochReference,
}

impl<L: DeviceLink> AcquisitionCycle<L> {
    fn run(mut self) -> AcquisitionResult<()> {
        info!("Acquisition started on {}", self.link.name());
        let result = self.pump();
        self.link.close();
        let accepted = self.counters.accepted.load(Ordering::Relaxed);
        let skipped = self.counters.skipped.load(Ordering::Relaxed);
        match &result {
            Ok(()) => info!("Acquisition stopped ({accepted} samples, {skipped} skipped lines)"),
            Err(e) => error!("Acquisition aborted after {accepted} samples: {e}"),
        }
        result
    }

    fn pump(&mut self) -> AcquisitionResult<()> {
        while !self.stop_requested.load(Ordering::Acquire) {
            let Some(line) = self.link.read_line()? else {
                continue;
            };
            self.ingest(&line);
        }
        Ok(())
    }

    /// Handles one line. Unparsable lines are dropped without touching the
    /// epoch, the window or the consumer.
    fn ingest(&mut self, line: &[u8]) {
        let value = match parse_sample(line) {
            Ok(value) => value,
            Err(e) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                debug!("Skipping line {:?}: {e}", String::from_utf8_lossy(line));
                return;
            }
        };
        let elapsed = self.epoch.stamp(self.clock.now_ms());
        let sample = Sample::new(elapsed, value);
        self.window.append(sample);
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        self.consumer.on_sample(&sample);
    }
}
