use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Marks whether a loop has a call in flight. Shared between the loop task
/// and whichever task fires the completion.
#[derive(Debug, Clone, Default)]
pub struct CallSlot {
    busy: Arc<AtomicBool>,
}

/// Held by an outstanding call; dropping it frees the slot.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl CallSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the slot, or `None` if a call is already outstanding.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Wait until the slot is free, polling every `poll`.
    pub async fn wait_idle(&self, poll: Duration) {
        while self.is_busy() {
            tokio::time::sleep(poll).await;
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_guard_at_a_time() {
        let slot = CallSlot::new();
        let guard = slot.try_acquire().expect("fresh slot is free");
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());
        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn guard_released_from_another_thread() {
        let slot = CallSlot::new();
        let guard = slot.try_acquire().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(!slot.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_returns_after_release() {
        let slot = CallSlot::new();
        let guard = slot.try_acquire().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            drop(guard);
        });
        let start = tokio::time::Instant::now();
        slot.wait_idle(Duration::from_millis(10)).await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
