pub mod log;
pub mod overlay;
pub mod speech;

use std::sync::Arc;

use cloud_vision_common::detection::DetectionResult;
use cloud_vision_common::frame::Frame;

/// Consumer of call results and sampled frames.
///
/// `apply` runs on whatever task completes the call, possibly after the
/// capture loop has stopped. Implementations guard their own state.
pub trait ResultSink: Send + Sync {
    /// Consume the result of the call made for frame `seq`.
    fn apply(&self, seq: u64, result: DetectionResult);

    /// Called with every sampled frame, whether or not it is dispatched.
    fn present(&self, _frame: &Frame) {}

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Forwards to each sink in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ResultSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl ResultSink for FanoutSink {
    fn apply(&self, seq: u64, result: DetectionResult) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.apply(seq, result.clone());
            }
            last.apply(seq, result);
        }
    }

    fn present(&self, frame: &Frame) {
        for sink in &self.sinks {
            sink.present(frame);
        }
    }

    fn name(&self) -> &str {
        "fanout"
    }
}
