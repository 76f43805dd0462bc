//! Synchronous versions of the call modes.
//!
//! Each call builds a single-threaded runtime and blocks the calling thread
//! until the child exits. They panic if called from inside an async runtime;
//! use the functions at the crate root there instead.

use crate::executor;
use spawnkit_core::{Completion, ExecError, Invocation, Result};
use std::future::Future;

pub fn run(invocation: Invocation) -> Result<Completion> {
    block_on(executor::run(invocation))
}

pub fn call(invocation: Invocation) -> Result<Completion> {
    block_on(executor::call(invocation))
}

pub fn check_call(invocation: Invocation) -> Result<Completion> {
    block_on(executor::check_call(invocation))
}

pub fn check_output(invocation: Invocation) -> Result<String> {
    block_on(executor::check_output(invocation))
}

fn block_on<T, F>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ExecError::Runtime)?;
    runtime.block_on(future)
}
