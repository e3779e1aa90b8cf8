//! Single external command execution.
//!
//! Commands are built as an argument list and never routed through a shell
//! unless the caller explicitly asks for [`shell`]. A non-zero exit is a hard
//! failure: [`run`] returns `Error::command_failed` and callers propagate it
//! with `?`, which aborts the whole workflow.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::shell;

/// Exit code reported when the process could not be started or ended in a
/// way that yields no status code (e.g. killed by a signal).
pub const DEFAULT_FAILED_CODE: i32 = 1;

/// Program, arguments and execution environment for one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub stdin_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Feed the contents of `path` to the command's standard input.
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    /// Human-readable command line, shell-quoted.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            return shell::quote_arg(&self.program);
        }
        format!("{} {}", shell::quote_arg(&self.program), shell::quote_args(&self.args))
    }

    /// Build the `std::process::Command` without configuring stdio.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    pub(crate) fn open_stdin(&self) -> std::io::Result<Stdio> {
        match &self.stdin_file {
            Some(path) => Ok(Stdio::from(File::open(path)?)),
            None => Ok(Stdio::null()),
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(DEFAULT_FAILED_CODE)
}

/// Run a command to completion, capturing stdout and stderr separately.
///
/// Never fails: launch errors are folded into the output with
/// [`DEFAULT_FAILED_CODE`] and the error text as stderr.
pub fn execute(spec: &CommandSpec) -> CommandOutput {
    let command_line = spec.display();
    log::info!("run command: {}", command_line);

    let stdin = match spec.open_stdin() {
        Ok(stdin) => stdin,
        Err(e) => {
            return CommandOutput {
                stdout: String::new(),
                stderr: format!("failed to open stdin for {}: {}", command_line, e),
                exit_code: DEFAULT_FAILED_CODE,
            }
        }
    };

    let result = spec
        .to_command()
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    match result {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            exit_code: exit_code_of(out.status),
        },
        Err(e) => {
            log::warn!("could not get exit code for failed program: {}", command_line);
            CommandOutput {
                stdout: String::new(),
                stderr: e.to_string(),
                exit_code: DEFAULT_FAILED_CODE,
            }
        }
    }
}

/// Run a command and require a zero exit code.
pub fn run(spec: &CommandSpec) -> Result<CommandOutput> {
    let output = execute(spec);
    check(spec, output)
}

fn check(spec: &CommandSpec, output: CommandOutput) -> Result<CommandOutput> {
    if !output.success() {
        log::error!(
            "command result, stdout: {}, stderr: {}, exitCode: {}",
            output.stdout.trim_end(),
            output.stderr.trim_end(),
            output.exit_code
        );
        return Err(Error::command_failed(CommandFailedDetails {
            command: spec.display(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }));
    }

    log::debug!(
        "command result, stdout: {}, stderr: {}, exitCode: {}",
        output.stdout.trim_end(),
        output.stderr.trim_end(),
        output.exit_code
    );
    Ok(output)
}

/// Run a program with plain string arguments.
pub fn run_args(program: &str, args: &[&str]) -> Result<CommandOutput> {
    run(&CommandSpec::new(program).args(args.iter().copied()))
}

/// Run a verbatim shell command line with `bash -c`.
///
/// Only for command strings that come from configuration and may use shell
/// features; everything else goes through [`run`].
pub fn shell(command: &str, dir: Option<&Path>) -> Result<CommandOutput> {
    let mut spec = CommandSpec::new("bash").arg("-c").arg(command);
    if let Some(dir) = dir {
        spec = spec.current_dir(dir);
    }
    run(&spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn execute_captures_stdout_and_stderr_separately() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2"]);
        let output = execute(&spec);

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 0);
    }

    #[test]
    fn execute_reports_process_exit_code() {
        let output = execute(&CommandSpec::new("sh").args(["-c", "exit 7"]));
        assert_eq!(output.exit_code, 7);
    }

    #[test]
    fn execute_missing_program_uses_fallback_code_and_error_text() {
        let output = execute(&CommandSpec::new("nonexistent_command_xyz"));

        assert_eq!(output.exit_code, DEFAULT_FAILED_CODE);
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn run_fails_fast_on_non_zero_exit() {
        let err = run_args("false", &[]).unwrap_err();

        assert_eq!(err.code.as_str(), "command.failed");
        assert_eq!(err.details["exitCode"], 1);
        assert_eq!(err.details["command"], "false");
    }

    #[test]
    fn run_error_keeps_captured_streams() {
        let spec = CommandSpec::new("sh").args(["-c", "echo partial; echo broken >&2; exit 3"]);
        let err = run(&spec).unwrap_err();

        assert_eq!(err.details["stdout"], "partial\n");
        assert_eq!(err.details["stderr"], "broken\n");
        assert_eq!(err.details["exitCode"], 3);
    }

    #[test]
    fn run_feeds_stdin_from_file() {
        let mut input = NamedTempFile::new().unwrap();
        write!(input, "from file").unwrap();

        let spec = CommandSpec::new("cat").stdin_file(input.path());
        let output = run(&spec).unwrap();

        assert_eq!(output.stdout, "from file");
    }

    #[test]
    fn run_respects_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("pwd").current_dir(dir.path());
        let output = run(&spec).unwrap();

        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn shell_runs_command_string() {
        let output = shell("echo a && echo b", None).unwrap();
        assert_eq!(output.stdout, "a\nb\n");
    }

    #[test]
    fn display_quotes_arguments() {
        let spec = CommandSpec::new("find").args([".", "-name", "*.sql.gz"]);
        assert_eq!(spec.display(), "find . -name '*.sql.gz'");
    }
}
