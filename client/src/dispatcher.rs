use crate::completion::Completion;
use crate::request::CloudRequest;

/// Fire-and-forget access to the platform.
///
/// `dispatch` must return without waiting for the network exchange and must
/// complete `on_complete` exactly once, on success and on failure alike. The
/// completion may run on any thread.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: CloudRequest, on_complete: Completion);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for std::sync::Arc<D> {
    fn dispatch(&self, request: CloudRequest, on_complete: Completion) {
        (**self).dispatch(request, on_complete)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
