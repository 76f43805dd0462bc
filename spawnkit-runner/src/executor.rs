use crate::process::prepare;
use crate::streams::{Route, Streams};
use spawnkit_core::{CaptureBuffer, Completion, ExecError, Invocation, ProcessFailure, Result, Sink};
use std::path::PathBuf;
use std::process::ExitStatus;
use tracing::{debug, warn};

/// Runs the executable and waits for it to exit.
///
/// Output goes to the invocation's sinks, or to this process's own stdout
/// and stderr when none are given. A non-zero exit code is not an error;
/// inspect [`Completion::exit_code`].
pub async fn run(mut invocation: Invocation) -> Result<Completion> {
    let stdout = Route::to(invocation.stdout.take().unwrap_or(Sink::Stdout));
    let stderr = Route::to(invocation.stderr.take().unwrap_or(Sink::Stderr));
    execute(invocation, stdout, stderr).await?.completion()
}

/// Like [`run`], but output is discarded unless the invocation names a sink.
pub async fn call(mut invocation: Invocation) -> Result<Completion> {
    let stdout = Route::to(invocation.stdout.take().unwrap_or(Sink::Null));
    let stderr = Route::to(invocation.stderr.take().unwrap_or(Sink::Null));
    execute(invocation, stdout, stderr).await?.completion()
}

/// Runs the executable and fails with [`ExecError::Failed`] if it exits
/// with a non-zero code. Stdout is discarded unless the invocation names a
/// sink; stderr is captured for the failure report.
///
/// A non-zero exit is reported even when a caller sink also failed.
pub async fn check_call(mut invocation: Invocation) -> Result<Completion> {
    let error_output = CaptureBuffer::new();
    let stdout = Route::to(invocation.stdout.take().unwrap_or(Sink::Null));
    let stderr = Route::captured(
        invocation.stderr.take().unwrap_or(Sink::Null),
        error_output.clone(),
    );
    let origin = Origin::of(&invocation);
    let exit = execute(invocation, stdout, stderr).await?;
    let completion = origin.assert_success(exit.completion, &error_output)?;
    exit.drained?;
    Ok(completion)
}

/// Runs the executable and returns everything it wrote to stdout. Fails with
/// [`ExecError::Failed`] if it exits with a non-zero code.
pub async fn check_output(mut invocation: Invocation) -> Result<String> {
    let output = CaptureBuffer::new();
    let error_output = CaptureBuffer::new();
    let stdout = Route::captured(
        invocation.stdout.take().unwrap_or(Sink::Null),
        output.clone(),
    );
    let stderr = Route::captured(
        invocation.stderr.take().unwrap_or(Sink::Null),
        error_output.clone(),
    );
    let origin = Origin::of(&invocation);
    let exit = execute(invocation, stdout, stderr).await?;
    origin.assert_success(exit.completion, &error_output)?;
    exit.drained?;
    Ok(output.contents())
}

/// A reaped child together with the outcome of draining its streams.
struct Exit {
    completion: Completion,
    drained: Result<()>,
}

impl Exit {
    fn completion(self) -> Result<Completion> {
        self.drained?;
        Ok(self.completion)
    }
}

async fn execute(
    mut invocation: Invocation,
    stdout: Route,
    stderr: Route,
) -> Result<Exit> {
    let mut command = prepare(&invocation)?;
    let mut child = command.spawn().map_err(|source| ExecError::Launch {
        executable: invocation.executable.clone(),
        source,
    })?;
    let pid = child.id();

    debug!(
        executable = %invocation.executable,
        args = ?invocation.args,
        cwd = ?invocation.cwd,
        pid = ?pid,
        "Process started"
    );

    let streams = Streams::attach(&mut child, invocation.stdin.take(), stdout, stderr)?;

    let status = match child.wait().await {
        Ok(status) => status,
        Err(source) => {
            streams.abort().await;
            return Err(ExecError::Wait {
                executable: invocation.executable.clone(),
                source,
            });
        }
    };
    let drained = streams.finish().await;

    let completion = Completion {
        pid,
        exit_code: exit_code(status),
    };

    debug!(
        executable = %invocation.executable,
        pid = ?pid,
        exit_code = completion.exit_code,
        "Process exited"
    );

    Ok(Exit { completion, drained })
}

/// Exit code of a reaped child. On Unix a child killed by a signal reports
/// `128 + signal`, the same as a shell would.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// The parts of an invocation that end up in a failure report.
struct Origin {
    executable: String,
    args: Option<String>,
    cwd: Option<PathBuf>,
}

impl Origin {
    fn of(invocation: &Invocation) -> Self {
        Self {
            executable: invocation.executable.clone(),
            args: invocation.args.clone(),
            cwd: invocation.cwd.clone(),
        }
    }

    fn assert_success(
        self,
        completion: Completion,
        error_output: &CaptureBuffer,
    ) -> Result<Completion> {
        if completion.success() {
            return Ok(completion);
        }

        warn!(
            executable = %self.executable,
            exit_code = completion.exit_code,
            "Process exited with a non-zero code"
        );

        Err(ProcessFailure::new(
            self.executable,
            self.args,
            self.cwd,
            error_output.contents(),
            completion.exit_code,
        )
        .into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use spawnkit_core::{env_with_overrides, quote, StreamKind};

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").with_args(quote(["-c", script]))
    }

    #[tokio::test]
    async fn test_run_returns_exit_code() {
        let completion = run(sh("exit 3").with_stdout(Sink::Null)).await.unwrap();
        assert_eq!(completion.exit_code, 3);
        assert!(!completion.success());
        assert!(completion.pid.is_some());
    }

    #[tokio::test]
    async fn test_run_forwards_to_supplied_sinks() {
        let out = CaptureBuffer::new();
        let err = CaptureBuffer::new();
        run(sh("echo out; echo err >&2")
            .with_stdout(Sink::Buffer(out.clone()))
            .with_stderr(Sink::Buffer(err.clone())))
        .await
        .unwrap();
        assert_eq!(out.contents(), "out\n");
        assert_eq!(err.contents(), "err\n");
    }

    #[tokio::test]
    async fn test_run_pumps_stdin() {
        let out = CaptureBuffer::new();
        let input = "x".repeat(10_000) + "\nsecond line\n";
        run(Invocation::new("cat")
            .with_stdin(input.clone())
            .with_stdout(Sink::Buffer(out.clone())))
        .await
        .unwrap();
        assert_eq!(out.contents(), input);
    }

    #[tokio::test]
    async fn test_run_ignores_unread_stdin() {
        let input = "y\n".repeat(100_000);
        let completion = run(sh("exit 0").with_stdin(input)).await.unwrap();
        assert_eq!(completion.exit_code, 0);
    }

    #[tokio::test]
    async fn test_call_suppresses_output() {
        let completion = call(sh("echo hidden; echo hidden >&2; exit 5")).await.unwrap();
        assert_eq!(completion.exit_code, 5);
    }

    #[tokio::test]
    async fn test_env_override_reaches_child() {
        let env = env_with_overrides([("SPAWNKIT_CHILD_VAR", "override")]);
        let output = check_output(sh("printf %s \"$SPAWNKIT_CHILD_VAR\"").with_env(env))
            .await
            .unwrap();
        assert_eq!(output, "override");
    }

    #[tokio::test]
    async fn test_check_call_captures_stderr_in_failure() {
        let err = check_call(sh("echo Sparta >&2; exit 42")).await.unwrap_err();
        let failure = err.as_failure().expect("expected a process failure");
        assert_eq!(failure.exit_code(), 42);
        assert_eq!(failure.error_output().trim(), "Sparta");
        assert_eq!(failure.executable(), "sh");
        assert!(err.to_string().contains("error output: Sparta"));
    }

    #[tokio::test]
    async fn test_check_call_tees_to_caller_sink() {
        let err_sink = CaptureBuffer::new();
        let invocation = sh("echo teed >&2; exit 1").with_stderr(Sink::Buffer(err_sink.clone()));
        let err = check_call(invocation).await.unwrap_err();
        assert_eq!(err_sink.contents(), "teed\n");
        assert_eq!(err.as_failure().map(|f| f.error_output()), Some("teed\n"));
    }

    #[tokio::test]
    async fn test_check_call_reports_failure_despite_broken_sink() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let invocation =
            sh("echo out; echo Sparta >&2; exit 42").with_stdout(Sink::writer(writer));
        let err = check_call(invocation).await.unwrap_err();
        let failure = err.as_failure().expect("expected a process failure");
        assert_eq!(failure.exit_code(), 42);
        assert_eq!(failure.error_output(), "Sparta\n");
    }

    #[tokio::test]
    async fn test_check_output_reports_failure_despite_broken_sink() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let invocation = sh("echo Sparta >&2; exit 3").with_stderr(Sink::writer(writer));
        let err = check_output(invocation).await.unwrap_err();
        assert_eq!(err.as_failure().map(|f| f.exit_code()), Some(3));
        assert_eq!(err.as_failure().map(|f| f.error_output()), Some("Sparta\n"));
    }

    #[tokio::test]
    async fn test_broken_sink_fails_successful_process() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let err = check_call(sh("echo out").with_stdout(Sink::writer(writer)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Stream { stream: StreamKind::Stdout, .. }));

        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let err = run(sh("echo out; exit 7").with_stdout(Sink::writer(writer)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Stream { stream: StreamKind::Stdout, .. }));
    }

    #[tokio::test]
    async fn test_check_output_returns_stdout() {
        let output = check_output(sh("echo Sparta")).await.unwrap();
        assert_eq!(output, "Sparta\n");
    }

    #[tokio::test]
    async fn test_check_output_uses_working_dir() {
        let dir = std::env::temp_dir().canonicalize().unwrap();
        let output = check_output(sh("pwd").with_cwd(&dir)).await.unwrap();
        assert_eq!(output.trim(), dir.display().to_string());
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        let err = run(Invocation::new("/definitely/not/a/real/executable"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_signal_exit_code() {
        let completion = call(sh("kill -9 $$")).await.unwrap();
        assert_eq!(completion.exit_code, 128 + 9);
    }
}
