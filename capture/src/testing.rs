//! Fakes shared by the capture tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloud_vision_client::{CloudRequest, Completion, Dispatcher};
use cloud_vision_common::detection::{CallError, DetectionResult, Region};
use cloud_vision_common::frame::{EncodedPayload, Frame};
use image::RgbImage;
use tokio::time::Instant;

use crate::encoder::{CodecEncoder, EncodeError, FrameEncoder};
use crate::sampler::{SampleError, Sampler};
use crate::sink::ResultSink;

/// Records everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    presented: Mutex<Vec<u64>>,
    applied: Mutex<Vec<(u64, DetectionResult)>>,
}

impl RecordingSink {
    pub fn presented(&self) -> Vec<u64> {
        self.presented.lock().unwrap().clone()
    }

    pub fn applied(&self) -> Vec<(u64, DetectionResult)> {
        self.applied.lock().unwrap().clone()
    }
}

impl ResultSink for RecordingSink {
    fn apply(&self, seq: u64, result: DetectionResult) {
        self.applied.lock().unwrap().push((seq, result));
    }

    fn present(&self, frame: &Frame) {
        self.presented.lock().unwrap().push(frame.seq);
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Fails the first `fail_first` captures, then yields small black frames.
pub struct ScriptedSampler {
    fail_first: u64,
    calls: u64,
    seq: u64,
}

impl ScriptedSampler {
    pub fn always_ok() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(fail_first: u64) -> Self {
        Self {
            fail_first,
            calls: 0,
            seq: 0,
        }
    }
}

impl Sampler for ScriptedSampler {
    async fn try_capture(&mut self) -> Result<Frame, SampleError> {
        self.calls += 1;
        if self.calls <= self.fail_first {
            return Err(SampleError::Status(503));
        }
        let frame = Frame::new(RgbImage::new(8, 6), 0, self.seq);
        self.seq += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn ok_encoder() -> CodecEncoder {
    CodecEncoder::png(1)
}

/// Fails the first `n` encodes.
pub fn failing_encoder(n: u64) -> FailingEncoder {
    FailingEncoder {
        remaining: AtomicU64::new(n),
        inner: ok_encoder(),
    }
}

pub struct FailingEncoder {
    remaining: AtomicU64,
    inner: CodecEncoder,
}

impl FrameEncoder for FailingEncoder {
    fn encode(&self, frame: &Frame) -> Result<EncodedPayload, EncodeError> {
        let failed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(EncodeError::EmptyFrame(frame.width(), frame.height()));
        }
        self.inner.encode(frame)
    }
}

enum ReplyMode {
    After(Duration),
    Manual,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Dispatcher that records each call and either replies after a fixed delay
/// or holds completions until the test releases them.
pub struct FakeDispatcher {
    mode: ReplyMode,
    started: Instant,
    counters: Arc<Counters>,
    dispatched: Mutex<Vec<(u64, u64)>>,
    pending: Mutex<Vec<(u64, Completion)>>,
}

impl FakeDispatcher {
    pub fn replying_after(delay: Duration) -> Self {
        Self::with_mode(ReplyMode::After(delay))
    }

    pub fn manual() -> Self {
        Self::with_mode(ReplyMode::Manual)
    }

    fn with_mode(mode: ReplyMode) -> Self {
        Self {
            mode,
            started: Instant::now(),
            counters: Arc::default(),
            dispatched: Mutex::default(),
            pending: Mutex::default(),
        }
    }

    /// The reply given for frame `seq`.
    pub fn result_for(seq: u64) -> DetectionResult {
        let x = seq as i32;
        DetectionResult::Faces(vec![Region::from_corners(x, x, x + 2, x + 2)])
    }

    pub fn dispatched_seqs(&self) -> Vec<u64> {
        self.dispatched.lock().unwrap().iter().map(|(seq, _)| *seq).collect()
    }

    /// Dispatch times in milliseconds since the dispatcher was built.
    pub fn dispatched_offsets_ms(&self) -> Vec<u64> {
        self.dispatched.lock().unwrap().iter().map(|(_, ms)| *ms).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_pending(&self) -> Vec<(u64, Completion)> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    pub fn release_all(&self) {
        for (seq, completion) in self.take_pending() {
            self.counters.leave();
            completion.complete(Self::result_for(seq));
        }
    }

    pub fn fail_all(&self, error: CallError) {
        for (_, completion) in self.take_pending() {
            self.counters.leave();
            completion.complete(DetectionResult::Failed(error.clone()));
        }
    }

    pub fn drop_all(&self) {
        for (_, completion) in self.take_pending() {
            self.counters.leave();
            drop(completion);
        }
    }
}

impl Dispatcher for FakeDispatcher {
    fn dispatch(&self, request: CloudRequest, on_complete: Completion) {
        let seq = request.image().map(|p| p.seq).unwrap_or_default();
        let offset = self.started.elapsed().as_millis() as u64;
        self.dispatched.lock().unwrap().push((seq, offset));
        self.counters.enter();

        match self.mode {
            ReplyMode::After(delay) => {
                let counters = Arc::clone(&self.counters);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    counters.leave();
                    on_complete.complete(Self::result_for(seq));
                });
            }
            ReplyMode::Manual => self.pending.lock().unwrap().push((seq, on_complete)),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
