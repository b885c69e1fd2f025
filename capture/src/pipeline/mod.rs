pub mod slot;
pub mod stop;

use std::sync::Arc;
use std::time::Duration;

use cloud_vision_client::{Completion, Dispatcher, RequestKind};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::encoder::FrameEncoder;
use crate::sampler::Sampler;
use crate::sink::ResultSink;

pub use slot::CallSlot;
pub use stop::{StopCondition, StopSignal};

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(300);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Counters kept by a running loop. The stop condition sees them after
/// every iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    /// Iterations where the interval had elapsed and a capture was tried.
    pub attempts: u64,
    pub dispatches: u64,
    pub sample_failures: u64,
    pub encode_failures: u64,
    /// Frames not dispatched because a call was still outstanding.
    pub overlap_skips: u64,
}

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Minimum interval not yet elapsed.
    Idle,
    SampleFailed,
    /// Frame captured and shown, but a call was still outstanding.
    Overlapped,
    EncodeFailed,
    Dispatched,
}

/// Time of the last dispatch. Only the loop touches it.
#[derive(Debug, Default)]
struct LoopClock {
    last_dispatch: Option<Instant>,
}

impl LoopClock {
    fn due(&self, now: Instant, min_interval: Duration) -> bool {
        match self.last_dispatch {
            None => true,
            Some(last) => now.duration_since(last) >= min_interval,
        }
    }

    fn mark(&mut self, now: Instant) {
        self.last_dispatch = Some(now);
    }
}

/// Samples a source at a bounded rate and keeps at most one platform call in
/// flight, handing every result to the sink.
pub struct CaptureLoop<S, E, D> {
    sampler: S,
    encoder: E,
    dispatcher: D,
    sink: Arc<dyn ResultSink>,
    kind: RequestKind,
    min_interval: Duration,
    poll_interval: Duration,
    stop: StopCondition,
    clock: LoopClock,
    slot: CallSlot,
    stats: LoopStats,
}

impl<S, E, D> CaptureLoop<S, E, D>
where
    S: Sampler,
    E: FrameEncoder,
    D: Dispatcher,
{
    pub fn new(sampler: S, encoder: E, dispatcher: D, sink: Arc<dyn ResultSink>, kind: RequestKind) -> Self {
        Self {
            sampler,
            encoder,
            dispatcher,
            sink,
            kind,
            min_interval: DEFAULT_MIN_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop: StopCondition::never(),
            clock: LoopClock::default(),
            slot: CallSlot::new(),
            stats: LoopStats::default(),
        }
    }

    /// Set the minimum spacing between dispatches and the termination check.
    pub fn configure(&mut self, min_interval: Duration, stop: StopCondition) -> &mut Self {
        self.min_interval = min_interval;
        self.stop = stop;
        self
    }

    /// How long an iteration sleeps before the next one.
    pub fn set_poll_interval(&mut self, poll_interval: Duration) -> &mut Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Handle on the outstanding-call flag, e.g. to wait for the last reply.
    pub fn call_slot(&self) -> CallSlot {
        self.slot.clone()
    }

    /// Run until the stop condition holds. Returns without waiting for an
    /// outstanding call; its completion still reaches the sink.
    pub async fn run(&mut self) -> LoopStats {
        info!(
            kind = self.kind.name(),
            sampler = self.sampler.name(),
            dispatcher = self.dispatcher.name(),
            sink = self.sink.name(),
            min_interval_ms = self.min_interval.as_millis() as u64,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "capture loop started"
        );

        loop {
            let tick = self.tick().await;
            self.stats.iterations += 1;
            if tick != Tick::Idle {
                debug!(?tick, iteration = self.stats.iterations, "capture tick");
            }

            if self.stop.should_stop(&self.stats) {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        info!(
            iterations = self.stats.iterations,
            dispatches = self.stats.dispatches,
            sample_failures = self.stats.sample_failures,
            encode_failures = self.stats.encode_failures,
            overlap_skips = self.stats.overlap_skips,
            call_outstanding = self.slot.is_busy(),
            "capture loop stopped"
        );
        self.stats.clone()
    }

    /// One iteration: sample, show, encode and dispatch if the interval has
    /// elapsed and no call is outstanding.
    pub async fn tick(&mut self) -> Tick {
        if !self.clock.due(Instant::now(), self.min_interval) {
            return Tick::Idle;
        }
        self.stats.attempts += 1;

        let frame = match self.sampler.try_capture().await {
            Ok(f) => f,
            Err(e) => {
                self.stats.sample_failures += 1;
                warn!(error = %e, sampler = self.sampler.name(), "capture failed, retrying next tick");
                return Tick::SampleFailed;
            }
        };

        self.sink.present(&frame);

        if self.slot.is_busy() {
            self.stats.overlap_skips += 1;
            return Tick::Overlapped;
        }

        let payload = match self.encoder.encode(&frame) {
            Ok(p) => p,
            Err(e) => {
                self.stats.encode_failures += 1;
                warn!(error = %e, seq = frame.seq, "encode failed, retrying next tick");
                return Tick::EncodeFailed;
            }
        };
        drop(frame);

        let Some(guard) = self.slot.try_acquire() else {
            self.stats.overlap_skips += 1;
            return Tick::Overlapped;
        };

        self.clock.mark(Instant::now());
        self.stats.dispatches += 1;

        let seq = payload.seq;
        let sink = Arc::clone(&self.sink);
        debug!(seq, bytes = payload.len(), kind = self.kind.name(), "dispatching frame");
        self.dispatcher.dispatch(
            self.kind.with_image(payload),
            Completion::new(move |result| {
                sink.apply(seq, result);
                drop(guard);
            }),
        );
        Tick::Dispatched
    }
}
