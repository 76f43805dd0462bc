use spawnkit_core::{ExecError, Invocation, Result};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Builds the command for `invocation` without starting it.
///
/// The executable is launched directly, never through a shell. All three
/// standard streams are piped back to the caller. A supplied environment
/// replaces the inherited one entirely.
pub fn prepare(invocation: &Invocation) -> Result<Command> {
    if invocation.executable.is_empty() {
        return Err(ExecError::InvalidInvocation(
            "executable path must not be empty".to_string(),
        ));
    }

    let mut command = Command::new(&invocation.executable);

    if let Some(args) = invocation.args.as_deref() {
        apply_args(&mut command, args);
    }

    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    if let Some(env) = &invocation.env {
        command.env_clear();
        command.envs(env);
    }

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);

    Ok(command)
}

#[cfg(windows)]
fn apply_args(command: &mut Command, args: &str) {
    command.raw_arg(args);
}

#[cfg(not(windows))]
fn apply_args(command: &mut Command, args: &str) {
    command.args(spawnkit_core::split(args));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::ffi::OsStr;
    use std::path::Path;

    #[test]
    fn test_prepare_rejects_empty_executable() {
        let err = prepare(&Invocation::new("")).unwrap_err();
        assert!(matches!(err, ExecError::InvalidInvocation(_)));
    }

    #[test]
    fn test_prepare_without_options() {
        let command = prepare(&Invocation::new("tool")).unwrap();
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), OsStr::new("tool"));
        assert_eq!(std_command.get_args().count(), 0);
        assert!(std_command.get_current_dir().is_none());
        assert_eq!(std_command.get_envs().count(), 0);
    }

    #[test]
    fn test_prepare_sets_working_dir() {
        let command = prepare(&Invocation::new("tool").with_cwd("/some/dir")).unwrap();
        assert_eq!(command.as_std().get_current_dir(), Some(Path::new("/some/dir")));
    }

    #[test]
    fn test_prepare_applies_env_mapping() {
        let mut env = HashMap::new();
        env.insert("ONLY".to_string(), "this".to_string());
        let command = prepare(&Invocation::new("tool").with_env(env)).unwrap();
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(envs, vec![(OsStr::new("ONLY"), Some(OsStr::new("this")))]);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_prepare_splits_argument_line() {
        let invocation = Invocation::new("tool").with_args("echo \"a b\" c\"\"\"d");
        let command = prepare(&invocation).unwrap();
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, vec![OsStr::new("echo"), OsStr::new("a b"), OsStr::new("c\"d")]);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_prepare_empty_argument_line_has_no_args() {
        let command = prepare(&Invocation::new("tool").with_args("")).unwrap();
        assert_eq!(command.as_std().get_args().count(), 0);
    }
}
