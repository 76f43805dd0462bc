pub mod blocking;
pub mod executor;
pub mod process;
pub mod streams;

pub use executor::{call, check_call, check_output, run};
pub use spawnkit_core::{
    env_with_overrides, quote, CaptureBuffer, Completion, ExecError, Input, Invocation,
    ProcessFailure, Result, Sink, StreamKind,
};
