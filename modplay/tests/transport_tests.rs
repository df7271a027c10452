//! Transport controller tests
//!
//! **Test Coverage:**
//! - State transitions for success, start failure and poll failure
//! - stop() on every exit path after a successful start
//! - Cancellation before the first poll

mod helpers;

use helpers::*;
use modplay::{
    CancelToken, Error, PipelineBuilder, Sink, SinkReport, TransportController, TransportState,
};
use modplay_common::ChannelLayout;

/// Sink that records calls and fails where told to.
#[derive(Default)]
struct MockSink {
    fail_start: bool,
    fail_poll_at: Option<usize>,
    active_polls: usize,
    polls: usize,
    started: bool,
    stopped: usize,
}

impl Sink for MockSink {
    fn start(&mut self, _pipeline: PipelineBuilder) -> modplay::Result<()> {
        if self.fail_start {
            return Err(Error::Device("No default output device found".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn poll(&mut self) -> modplay::Result<()> {
        self.polls += 1;
        if self.fail_poll_at == Some(self.polls) {
            return Err(Error::Device("stream error".to_string()));
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.polls < self.active_polls
    }

    fn stop(&mut self) -> modplay::Result<SinkReport> {
        self.stopped += 1;
        Ok(SinkReport {
            frames: self.polls as u64 * 512,
            sample_rate: 44100,
            channels: 2,
            data_bytes: 0,
        })
    }
}

fn builder() -> PipelineBuilder {
    pipeline(ScriptedSource::new(), ChannelLayout::Stereo)
}

#[test]
fn test_session_completes() {
    let mut sink = MockSink {
        active_polls: 5,
        ..Default::default()
    };
    let mut controller = TransportController::new(CancelToken::new());
    assert_eq!(controller.state(), TransportState::Idle);

    let report = controller.run(&mut sink, builder()).unwrap();

    assert_eq!(controller.state(), TransportState::Completed);
    assert!(!report.cancelled);
    assert_eq!(report.sink.frames, 5 * 512);
    assert_eq!(sink.polls, 5);
    assert_eq!(sink.stopped, 1);
}

#[test]
fn test_start_failure() {
    let mut sink = MockSink {
        fail_start: true,
        active_polls: 5,
        ..Default::default()
    };
    let mut controller = TransportController::new(CancelToken::new());

    let err = controller.run(&mut sink, builder()).unwrap_err();

    assert!(matches!(err, Error::Device(_)));
    assert_eq!(controller.state(), TransportState::Failed);
    assert_eq!(sink.polls, 0);
    assert_eq!(sink.stopped, 0);
}

#[test]
fn test_poll_failure_still_stops() {
    let mut sink = MockSink {
        active_polls: 10,
        fail_poll_at: Some(3),
        ..Default::default()
    };
    let mut controller = TransportController::new(CancelToken::new());

    let err = controller.run(&mut sink, builder()).unwrap_err();

    assert!(matches!(err, Error::Device(_)));
    assert_eq!(controller.state(), TransportState::Failed);
    assert_eq!(sink.polls, 3);
    assert_eq!(sink.stopped, 1);
}

#[test]
fn test_cancel_before_first_poll() {
    let token = CancelToken::new();
    token.cancel();
    let mut sink = MockSink {
        active_polls: 10,
        ..Default::default()
    };
    let mut controller = TransportController::new(token);

    let report = controller.run(&mut sink, builder()).unwrap();

    assert!(report.cancelled);
    assert_eq!(controller.state(), TransportState::Completed);
    assert!(sink.started);
    assert_eq!(sink.polls, 0);
    assert_eq!(sink.stopped, 1);
}

#[test]
fn test_inactive_sink_is_not_polled() {
    let mut sink = MockSink::default();
    let mut controller = TransportController::new(CancelToken::new());

    controller.run(&mut sink, builder()).unwrap();
    assert_eq!(sink.polls, 0);
    assert_eq!(controller.state(), TransportState::Completed);
}
