//! Display feedback: applied gains echoed to observers as per-cell events.
//!
//! The engine only stores into [`AppliedGains`]; diffing and sending happen
//! here, off the audio thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::{AppliedGains, Cell, MixerResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainEvent {
    pub cell: Cell,
    pub value: f32,
}

pub type FeedbackSender = flume::Sender<GainEvent>;
pub type FeedbackReceiver = flume::Receiver<GainEvent>;

pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    flume::unbounded()
}

/// Remembers the last value sent per cell so only changes go out.
pub struct FeedbackTracker {
    applied: AppliedGains,
    sent: Vec<Option<f32>>,
    current: Vec<f32>,
}

impl FeedbackTracker {
    pub fn new(applied: AppliedGains) -> Self {
        let cells = applied.shape().cells();
        Self {
            applied,
            sent: vec![None; cells],
            current: vec![0.0; cells],
        }
    }

    /// Events for every cell whose applied gain changed since the last poll.
    /// The first poll reports every cell.
    pub fn poll(&mut self) -> Vec<GainEvent> {
        let shape = self.applied.shape();
        self.applied.snapshot_into(&mut self.current);

        let mut events = Vec::new();
        for (index, (&value, sent)) in self.current.iter().zip(self.sent.iter_mut()).enumerate() {
            if *sent != Some(value) {
                *sent = Some(value);
                events.push(GainEvent {
                    cell: shape.cell(index),
                    value,
                });
            }
        }
        events
    }

    /// Sends changed cells; returns how many went out, or `None` once every
    /// receiver is gone.
    pub fn publish(&mut self, tx: &FeedbackSender) -> Option<usize> {
        let events = self.poll();
        let count = events.len();
        for event in events {
            tx.send(event).ok()?;
        }
        Some(count)
    }

    /// Forces the next poll to report every cell again.
    pub fn invalidate(&mut self) {
        self.sent.fill(None);
    }
}

/// Background thread publishing applied-gain changes at a fixed interval.
pub struct FeedbackWorker {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FeedbackWorker {
    pub fn spawn(
        applied: AppliedGains,
        tx: FeedbackSender,
        interval: Duration,
    ) -> MixerResult<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let thread = std::thread::Builder::new()
            .name("matmix-feedback".into())
            .spawn(move || {
                let mut tracker = FeedbackTracker::new(applied);
                log::info!("Feedback worker started ({interval:?} interval)");
                while flag.load(Ordering::Relaxed) {
                    if tracker.publish(&tx).is_none() {
                        log::info!("Feedback worker: receiver dropped, shutting down");
                        return;
                    }
                    std::thread::sleep(interval);
                }
                log::info!("Feedback worker stopped");
            })?;

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Feedback worker panicked");
            }
        }
    }
}

impl Drop for FeedbackWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
