// src/notify.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;

use crate::types::Sample;

/// Receives every accepted sample, on the acquisition thread.
///
/// Implementations must return quickly; anything slow belongs on the
/// consumer's own thread behind an [`UpdateSender`].
pub trait Consumer: Send {
    fn on_sample(&mut self, sample: &Sample);
}

impl<F> Consumer for F
where
    F: FnMut(&Sample) + Send,
{
    fn on_sample(&mut self, sample: &Sample) {
        self(sample)
    }
}

/// Consumer that ignores everything; for callers that only poll the window.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullConsumer;

impl Consumer for NullConsumer {
    fn on_sample(&mut self, _sample: &Sample) {}
}

/// Creates a latest-value notification channel.
///
/// The sender overwrites a single slot and rings a one-slot wake-up channel,
/// so it never blocks. A sample that replaces one the receiver has not picked
/// up yet counts as coalesced; the receiver re-reads the whole window when it
/// wakes up, so no data is lost.
pub fn update_channel() -> (UpdateSender, UpdateReceiver) {
    let (wake_tx, wake_rx) = sync_channel(1);
    let latest = Arc::new(Mutex::new(None));
    let coalesced = Arc::new(AtomicU64::new(0));
    (
        UpdateSender {
            wake: wake_tx,
            latest: Arc::clone(&latest),
            coalesced: Arc::clone(&coalesced),
            receiver_gone: false,
        },
        UpdateReceiver {
            wake: wake_rx,
            latest,
            coalesced,
        },
    )
}

pub struct UpdateSender {
    wake: SyncSender<()>,
    latest: Arc<Mutex<Option<Sample>>>,
    coalesced: Arc<AtomicU64>,
    receiver_gone: bool,
}

impl Consumer for UpdateSender {
    fn on_sample(&mut self, sample: &Sample) {
        if self.receiver_gone {
            return;
        }
        if self.latest.lock().replace(*sample).is_some() {
            let total = self.coalesced.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                "notice coalesced at t={:.3}s ({} so far)",
                sample.elapsed_seconds, total
            );
        }
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("update receiver dropped; notifications disabled");
                self.receiver_gone = true;
            }
        }
    }
}

pub struct UpdateReceiver {
    wake: Receiver<()>,
    latest: Arc<Mutex<Option<Sample>>>,
    coalesced: Arc<AtomicU64>,
}

impl UpdateReceiver {
    /// Newest pending sample, without blocking.
    pub fn drain_latest(&self) -> Option<Sample> {
        let _ = self.wake.try_recv();
        self.latest.lock().take()
    }

    /// Waits up to `timeout` for a pending sample and returns the newest one.
    ///
    /// `Disconnected` is only reported once the sender is gone and nothing
    /// is left in the slot.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Sample, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(sample) = self.drain_latest() {
                return Ok(sample);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RecvTimeoutError::Timeout);
            }
            match self.wake.recv_timeout(remaining) {
                // Stale wake-ups from an already drained slot just loop again.
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => return Err(RecvTimeoutError::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return self
                        .latest
                        .lock()
                        .take()
                        .ok_or(RecvTimeoutError::Disconnected)
                }
            }
        }
    }

    /// Samples overwritten before the receiver picked them up.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drain_returns_newest_of_burst() {
        let (mut tx, rx) = update_channel();
        for i in 0..5 {
            tx.on_sample(&Sample::new(i as f64 * 0.1, i as f64));
        }
        let latest = rx.drain_latest().unwrap();
        assert_eq!(latest.value, 4.0);
        assert_eq!(rx.coalesced(), 4);
        assert_eq!(rx.drain_latest(), None);
    }

    #[test]
    fn slow_receiver_gets_coalesced_notices() {
        let (mut tx, rx) = update_channel();
        let started = Instant::now();
        for i in 0..1_000 {
            tx.on_sample(&Sample::new(i as f64, i as f64));
        }
        // Never blocks on the receiver.
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(rx.drain_latest(), Some(Sample::new(999.0, 999.0)));
        assert_eq!(rx.coalesced(), 999);
        tx.on_sample(&Sample::new(1_000.0, 1.0));
        assert_eq!(rx.coalesced(), 999);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Ok(Sample::new(1_000.0, 1.0))
        );
    }

    #[test]
    fn recv_timeout_wakes_on_send_from_another_thread() {
        let (mut tx, rx) = update_channel();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.on_sample(&Sample::new(0.02, 7.5));
        });
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.value, 7.5);
        sender.join().unwrap();
    }

    #[test]
    fn pending_sample_outlives_sender() {
        let (mut tx, rx) = update_channel();
        tx.on_sample(&Sample::new(0.0, 2.0));
        drop(tx);
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(5)),
            Ok(Sample::new(0.0, 2.0))
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(5)),
            Err(RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (mut tx, rx) = update_channel();
        drop(rx);
        tx.on_sample(&Sample::new(0.0, 1.0));
        tx.on_sample(&Sample::new(0.1, 2.0));
        assert!(tx.receiver_gone);
    }

    #[test]
    fn closures_are_consumers() {
        let mut seen = Vec::new();
        {
            let mut consumer = |s: &Sample| seen.push(s.value);
            consumer.on_sample(&Sample::new(0.0, 3.0));
        }
        assert_eq!(seen, vec![3.0]);
    }

    #[test]
    fn recv_timeout_reports_empty_channel() {
        let (_tx, rx) = update_channel();
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(5)),
            Err(RecvTimeoutError::Timeout)
        );
    }
}
