use anyhow::Context;
use clap::{Parser, Subcommand};
use spawnkit_runner::{quote, Invocation};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "spawnkit-tester")]
#[command(about = "Black-box program for exercising the spawnkit process runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the given text to stdout
    Echo {
        text: String,
    },

    /// Write text to the given file
    OutputFile {
        file: String,

        #[arg(default_value = "")]
        text: String,
    },

    /// Print text to stderr and exit with the given code
    ErrorExit {
        exit_code: u8,

        #[arg(default_value = "")]
        error_text: String,
    },

    /// Write the value of an environment variable to the given file
    EnvvarToFile {
        file: String,

        #[arg(default_value = "")]
        env_var: String,
    },

    /// Read one line from stdin and print it back
    EchoInput,

    /// Run an executable, forwarding its output, and exit with its exit code
    Run {
        executable: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        arguments: Vec<String>,
    },

    /// Run an executable with all output suppressed and exit with its exit code
    Call {
        executable: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        arguments: Vec<String>,
    },

    /// Write the given number of bytes to both stdout and stderr, interleaved
    Flood {
        bytes: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Echo { text } => {
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        Commands::OutputFile { file, text } => {
            fs::write(&file, text).with_context(|| format!("Failed to write {}", file))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ErrorExit {
            exit_code,
            error_text,
        } => {
            eprintln!("{}", error_text);
            Ok(ExitCode::from(exit_code))
        }
        Commands::EnvvarToFile { file, env_var } => {
            let value = std::env::var(&env_var).unwrap_or_default();
            fs::write(&file, value).with_context(|| format!("Failed to write {}", file))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::EchoInput => {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read stdin")?;
            println!("{}", line.trim_end_matches(&['\r', '\n'][..]));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            executable,
            arguments,
        } => {
            let completion = spawnkit_runner::run(invocation(executable, &arguments)).await?;
            Ok(exit_code(completion.exit_code))
        }
        Commands::Call {
            executable,
            arguments,
        } => {
            let completion = spawnkit_runner::call(invocation(executable, &arguments)).await?;
            Ok(exit_code(completion.exit_code))
        }
        Commands::Flood { bytes } => {
            flood(bytes)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn invocation(executable: String, arguments: &[String]) -> Invocation {
    let invocation = Invocation::new(executable);
    if arguments.is_empty() {
        invocation
    } else {
        invocation.with_args(quote(arguments))
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Alternates 1 KiB lines between stdout and stderr until `bytes` have been
/// written to each.
fn flood(bytes: usize) -> io::Result<()> {
    const LINE_LEN: usize = 1024;

    let mut line = vec![b'x'; LINE_LEN - 1];
    line.push(b'\n');

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let mut written = 0;
    while written < bytes {
        let len = LINE_LEN.min(bytes - written);
        let chunk = &line[LINE_LEN - len..];
        out.write_all(chunk)?;
        out.flush()?;
        err.write_all(chunk)?;
        err.flush()?;
        written += len;
    }

    Ok(())
}
