use spawnkit_core::{CaptureBuffer, ExecError, Input, Result, Sink, StreamKind};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;
use tracing::debug;

/// Input is copied into the child's stdin this many bytes at a time.
pub const STDIN_CHUNK_SIZE: usize = 4096;

/// Where the lines of one output stream go.
pub struct Route {
    pub sink: Sink,
    pub capture: Option<CaptureBuffer>,
}

impl Route {
    pub fn to(sink: Sink) -> Self {
        Self {
            sink,
            capture: None,
        }
    }

    /// Records every line in `capture` in addition to writing it to `sink`.
    pub fn captured(sink: Sink, capture: CaptureBuffer) -> Self {
        Self {
            sink,
            capture: Some(capture),
        }
    }
}

/// The background tasks draining and feeding one running child.
pub struct Streams {
    stdout: JoinHandle<io::Result<()>>,
    stderr: JoinHandle<io::Result<()>>,
    stdin: Option<JoinHandle<io::Result<()>>>,
}

impl Streams {
    /// Starts draining stdout and stderr and, if `input` is given, feeding
    /// stdin. Without input the child's stdin is closed straight away.
    pub fn attach(
        child: &mut Child,
        input: Option<Input>,
        stdout: Route,
        stderr: Route,
    ) -> Result<Self> {
        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| not_piped(StreamKind::Stdout))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| not_piped(StreamKind::Stderr))?;
        let child_stdin = child.stdin.take();

        let stdout = tokio::spawn(drain(child_stdout, StreamKind::Stdout, stdout));
        let stderr = tokio::spawn(drain(child_stderr, StreamKind::Stderr, stderr));

        let stdin = match (input, child_stdin) {
            (Some(input), Some(child_stdin)) => Some(tokio::spawn(pump(input, child_stdin))),
            (Some(_), None) => return Err(not_piped(StreamKind::Stdin)),
            (None, child_stdin) => {
                drop(child_stdin);
                None
            }
        };

        Ok(Self { stdout, stderr, stdin })
    }

    /// Waits until both output pipes are closed and all input is delivered.
    pub async fn finish(self) -> Result<()> {
        let stdout = join(self.stdout, StreamKind::Stdout).await;
        let stderr = join(self.stderr, StreamKind::Stderr).await;
        let stdin = match self.stdin {
            Some(handle) => join(handle, StreamKind::Stdin).await,
            None => Ok(()),
        };
        stdin.and(stdout).and(stderr)
    }

    /// Cancels the background tasks and waits until they have stopped.
    pub async fn abort(self) {
        for handle in [Some(self.stdout), Some(self.stderr), self.stdin]
            .into_iter()
            .flatten()
        {
            handle.abort();
            let _ = handle.await;
        }
    }
}

fn not_piped(stream: StreamKind) -> ExecError {
    ExecError::Stream {
        stream,
        source: io::Error::new(io::ErrorKind::Other, format!("child {} is not piped", stream)),
    }
}

async fn join(handle: JoinHandle<io::Result<()>>, stream: StreamKind) -> Result<()> {
    match handle.await {
        Ok(result) => result.map_err(|source| ExecError::Stream { stream, source }),
        Err(join_error) => Err(ExecError::Stream {
            stream,
            source: io::Error::new(
                io::ErrorKind::Other,
                format!("{} task failed: {}", stream, join_error),
            ),
        }),
    }
}

/// Reads `reader` line by line until it closes, forwarding each line.
///
/// A failing sink does not stop the reading: the rest of the stream is still
/// consumed so the child never blocks on a full pipe, and the first write
/// error is returned at the end.
async fn drain<R>(reader: R, stream: StreamKind, route: Route) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Route { sink, capture } = route;
    let mut reader = BufReader::new(reader);
    let mut target = Target::open(sink);
    let mut line = Vec::new();
    let mut sink_error = None;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if let Some(capture) = &capture {
            capture.append(&line);
        }
        if sink_error.is_none() {
            if let Err(err) = target.write_line(&line).await {
                debug!(stream = %stream, error = %err, "Sink rejected output, discarding the rest");
                sink_error = Some(err);
            }
        }
    }

    match sink_error {
        Some(err) => Err(err),
        None => target.close().await,
    }
}

/// Copies `input` into the child's stdin, then closes it.
async fn pump(input: Input, mut stdin: ChildStdin) -> io::Result<()> {
    let mut reader = input.into_reader();
    let mut chunk = vec![0u8; STDIN_CHUNK_SIZE];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        match stdin.write_all(&chunk[..read]).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Child closed stdin before all input was written");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }

    match stdin.flush().await {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(err),
        _ => Ok(()),
    }
}

/// A [`Sink`] opened for writing.
enum Target {
    Stdout(tokio::io::Stdout),
    Stderr(tokio::io::Stderr),
    Null,
    Buffer(CaptureBuffer),
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
}

impl Target {
    fn open(sink: Sink) -> Self {
        match sink {
            Sink::Stdout => Target::Stdout(tokio::io::stdout()),
            Sink::Stderr => Target::Stderr(tokio::io::stderr()),
            Sink::Null => Target::Null,
            Sink::Buffer(buffer) => Target::Buffer(buffer),
            Sink::Writer(writer) => Target::Writer(writer),
        }
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Target::Stdout(out) => write_flushed(out, line).await,
            Target::Stderr(err) => write_flushed(err, line).await,
            Target::Null => Ok(()),
            Target::Buffer(buffer) => {
                buffer.append(line);
                Ok(())
            }
            Target::Writer(writer) => write_flushed(writer, line).await,
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        match self {
            Target::Writer(writer) => writer.shutdown().await,
            _ => Ok(()),
        }
    }
}

async fn write_flushed<W>(writer: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(line).await?;
    writer.flush().await
}
