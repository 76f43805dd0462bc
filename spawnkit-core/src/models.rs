use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};

/// Everything needed to launch one child process and talk to it.
///
/// Every optional field falls back to a documented default when `None`:
/// no arguments, the caller's working directory, the caller's environment,
/// no input, and the call mode's default sinks.
pub struct Invocation {
    pub executable: String,
    pub args: Option<String>,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub stdin: Option<Input>,
    pub stdout: Option<Sink>,
    pub stderr: Option<Sink>,
}

impl Invocation {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: None,
            cwd: None,
            env: None,
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    /// Raw argument line, usually produced by [`crate::args::quote`].
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn with_cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Replaces the child's whole environment with `env`.
    ///
    /// Only Unicode variables can be expressed here. A map built by
    /// [`env_with_overrides`](crate::env_with_overrides) lacks the parent's
    /// non-Unicode variables, so the child will not see them either.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_stdin(mut self, input: impl Into<Input>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_stdout(mut self, sink: Sink) -> Self {
        self.stdout = Some(sink);
        self
    }

    pub fn with_stderr(mut self, sink: Sink) -> Self {
        self.stderr = Some(sink);
        self
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("executable", &self.executable)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &self.env.as_ref().map(|env| env.len()))
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .finish()
    }
}

/// Destination for one of the child's output streams.
pub enum Sink {
    /// The calling process's own standard output.
    Stdout,
    /// The calling process's own standard error.
    Stderr,
    /// Drained and thrown away.
    Null,
    Buffer(CaptureBuffer),
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
}

impl Sink {
    pub fn writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Sink::Writer(Box::new(writer))
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Stdout => f.write_str("Stdout"),
            Sink::Stderr => f.write_str("Stderr"),
            Sink::Null => f.write_str("Null"),
            Sink::Buffer(buffer) => f.debug_tuple("Buffer").field(&buffer.len()).finish(),
            Sink::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// Shared in-memory sink. Clones refer to the same bytes, so the caller keeps
/// one clone and hands the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Captured bytes as text; invalid UTF-8 is replaced.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Caller-supplied data for the child's standard input.
pub struct Input {
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl Input {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
        }
    }

    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.reader
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::reader(Cursor::new(bytes))
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::from(text.into_bytes())
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::from(text.to_owned())
    }
}

/// A child that has exited and been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub pid: Option<u32>,
    pub exit_code: i32,
}

impl Completion {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        };
        f.write_str(name)
    }
}
