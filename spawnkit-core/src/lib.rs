pub mod args;
pub mod env;
pub mod error;
pub mod models;

pub use args::{quote, split};
pub use env::env_with_overrides;
pub use error::{ExecError, ProcessFailure, Result};
pub use models::{CaptureBuffer, Completion, Input, Invocation, Sink, StreamKind};
