use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::StreamKind;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Failed(#[from] ProcessFailure),

    #[error("Failed to launch '{executable}': {source}")]
    Launch {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for '{executable}': {source}")]
    Wait {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on child {stream}: {source}")]
    Stream {
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    #[error("Invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ExecError {
    /// The structured failure record, if the process ran and exited non-zero.
    pub fn as_failure(&self) -> Option<&ProcessFailure> {
        match self {
            ExecError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// A process that ran to completion but exited with a non-zero code.
///
/// The record is immutable: the message is rendered once when the failure is
/// constructed and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    executable: String,
    args: Option<String>,
    cwd: Option<PathBuf>,
    error_output: String,
    exit_code: i32,
    message: String,
}

impl ProcessFailure {
    pub fn new(
        executable: impl Into<String>,
        args: Option<String>,
        cwd: Option<PathBuf>,
        error_output: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        let executable = executable.into();
        let error_output = error_output.into();
        let message = render_message(
            &executable,
            args.as_deref(),
            cwd.as_deref(),
            &error_output,
            exit_code,
        );
        Self {
            executable,
            args,
            cwd,
            error_output,
            exit_code,
            message,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// The argument string, or `None` if the process was invoked without one.
    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }

    /// The working directory, or `None` if the caller's own was used.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Everything the process wrote to stderr.
    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProcessFailure {}

fn render_message(
    executable: &str,
    args: Option<&str>,
    cwd: Option<&Path>,
    error_output: &str,
    exit_code: i32,
) -> String {
    let args_part = match args {
        Some(args) => format!("with arguments '{}'", args),
        None => "without args".to_string(),
    };
    let working_dir = match cwd {
        Some(dir) => dir.display().to_string(),
        None => std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| ".".to_string()),
    };
    format!(
        "Command '{}' {} at working dir '{}' failed with error code '{}' and error output: {}",
        executable, args_part, working_dir, exit_code, error_output
    )
}
