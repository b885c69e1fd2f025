//! Client side of the cloud vision platform: typed requests, the
//! fire-and-forget [`Dispatcher`] contract and its HTTP implementation.

pub mod completion;
pub mod dispatcher;
pub mod platform;
pub mod request;

pub use completion::Completion;
pub use dispatcher::Dispatcher;
pub use platform::{ClientError, PlatformClient};
pub use request::{CloudRequest, RequestKind};
