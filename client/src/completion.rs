use cloud_vision_common::detection::{CallError, DetectionResult};
use tracing::warn;

type Handler = Box<dyn FnOnce(DetectionResult) + Send + 'static>;

/// Single-use completion handler registered with a dispatch.
///
/// The handler runs exactly once. Calling [`Completion::complete`] consumes
/// the value; dropping it without completing (a panicking or cancelled call
/// task) runs the handler with [`CallError::Abandoned`].
pub struct Completion {
    handler: Option<Handler>,
}

impl Completion {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnOnce(DetectionResult) + Send + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
        }
    }

    pub fn complete(mut self, result: DetectionResult) {
        if let Some(handler) = self.handler.take() {
            handler(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            warn!("completion dropped without a result, reporting abandoned call");
            handler(DetectionResult::Failed(CallError::Abandoned));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<DetectionResult>>>, Completion) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let completion = Completion::new(move |r| sink.lock().unwrap().push(r));
        (seen, completion)
    }

    #[test]
    fn complete_runs_handler_once() {
        let (seen, completion) = recorder();
        completion.complete(DetectionResult::Object(Some("cup".into())));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[DetectionResult::Object(Some("cup".into()))]);
    }

    #[test]
    fn drop_reports_abandoned() {
        let (seen, completion) = recorder();
        drop(completion);
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[DetectionResult::Failed(CallError::Abandoned)]
        );
    }

    #[tokio::test]
    async fn panicking_task_still_completes() {
        let (seen, completion) = recorder();
        let handle = tokio::spawn(async move {
            let _completion = completion;
            panic!("transport blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
