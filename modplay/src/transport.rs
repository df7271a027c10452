//! Transport controller
//!
//! Drives one playback session through a sink:
//!
//! ```text
//! Idle -> Configuring -> Streaming -> Completed
//!              |             |
//!              +-> Failed <--+
//! ```
//!
//! The sink is stopped on every exit path once it has started.

use crate::error::Result;
use crate::playback::PipelineBuilder;
use crate::sink::{Sink, SinkReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Configuring,
    Streaming,
    Completed,
    Failed,
}

/// Request to end playback early, checked between polls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub sink: SinkReport,
    /// Playback was cut short by a cancel request.
    pub cancelled: bool,
}

/// Runs the render pipeline through a sink until it finishes, fails or is
/// cancelled.
#[derive(Debug)]
pub struct TransportController {
    state: TransportState,
    cancel: CancelToken,
}

impl TransportController {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            state: TransportState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    fn transition(&mut self, next: TransportState) {
        debug!("Transport {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Play `pipeline` through `sink` to the end.
    ///
    /// # Errors
    /// The first error from `start`, `poll` or `stop`. When `poll` fails,
    /// `stop` is still called and its own error is only logged.
    pub fn run<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        pipeline: PipelineBuilder,
    ) -> Result<SessionReport> {
        self.transition(TransportState::Configuring);
        if let Err(e) = sink.start(pipeline) {
            self.transition(TransportState::Failed);
            return Err(e);
        }
        self.transition(TransportState::Streaming);

        let mut cancelled = false;
        let outcome = loop {
            if self.cancel.is_cancelled() {
                info!("Playback cancelled");
                cancelled = true;
                break Ok(());
            }
            if !sink.is_active() {
                break Ok(());
            }
            if let Err(e) = sink.poll() {
                break Err(e);
            }
        };

        let stopped = sink.stop();
        match (outcome, stopped) {
            (Ok(()), Ok(report)) => {
                self.transition(TransportState::Completed);
                info!(
                    "Session complete: {} frames ({:.2} s at {} Hz), {} bytes written",
                    report.frames,
                    report.seconds(),
                    report.sample_rate,
                    report.data_bytes
                );
                Ok(SessionReport {
                    sink: report,
                    cancelled,
                })
            }
            (Ok(()), Err(e)) => {
                self.transition(TransportState::Failed);
                Err(e)
            }
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    warn!("Failed to stop sink after error: {}", stop_err);
                }
                self.transition(TransportState::Failed);
                Err(e)
            }
        }
    }
}
