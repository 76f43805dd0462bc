// Shared by several test crates; each uses a different subset.
#![allow(dead_code)]

pub use assert_cmd::Command;
use spawnkit_runner::{quote, Invocation};

/// Path of the tester binary built for this test run.
pub fn tester_path() -> &'static str {
    env!("CARGO_BIN_EXE_spawnkit-tester")
}

/// Invocation of the tester with `tokens` quoted into its argument line.
pub fn tester<I, S>(tokens: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Invocation::new(tester_path()).with_args(quote(tokens))
}

pub fn tester_cmd() -> Command {
    Command::new(tester_path())
}
