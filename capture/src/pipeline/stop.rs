use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::LoopStats;

/// Externally raised request to stop (Ctrl-C, a key press, the viewer).
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    raised: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    /// Resolve once the signal has been raised.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

type Predicate = Box<dyn FnMut(&LoopStats) -> bool + Send>;

/// Termination predicate checked once per loop iteration.
pub struct StopCondition {
    predicate: Predicate,
}

impl StopCondition {
    pub fn new<F>(predicate: F) -> Self
    where
        F: FnMut(&LoopStats) -> bool + Send + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }

    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Stop after the first iteration that tried to capture, whether or not
    /// it led to a dispatch.
    pub fn single_shot() -> Self {
        Self::new(|stats| stats.attempts >= 1)
    }

    pub fn signal(signal: StopSignal) -> Self {
        Self::new(move |_| signal.is_raised())
    }

    /// Stop once `limit` has passed since the first check.
    pub fn after(limit: Duration) -> Self {
        let mut started: Option<Instant> = None;
        Self::new(move |_| {
            let start = *started.get_or_insert_with(Instant::now);
            start.elapsed() >= limit
        })
    }

    /// Stop when any of `conditions` holds. Every condition is evaluated on
    /// each check so stateful ones stay in step.
    pub fn any(conditions: Vec<StopCondition>) -> Self {
        let mut conditions = conditions;
        Self::new(move |stats| {
            conditions
                .iter_mut()
                .fold(false, |stop, c| c.should_stop(stats) || stop)
        })
    }

    pub fn should_stop(&mut self, stats: &LoopStats) -> bool {
        (self.predicate)(stats)
    }
}

impl std::fmt::Debug for StopCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StopCondition")
    }
}
