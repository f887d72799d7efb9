//! External tool invocation.
//!
//! Bundlers never spawn processes directly. They build a [`ToolCommand`] and
//! hand it to the [`ToolRunner`] of their build context, which lets tests
//! substitute a recording fake for the real [`ProcessRunner`].

use crate::bundler::error::{Error, Result};
use async_trait::async_trait;
use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc,
};

/// Exit code reported when the executable could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;

/// One external tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed without shell interpretation.
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub working_dir: Option<PathBuf>,
    /// Version probe: non-zero exits other than "not found" are tolerated.
    pub probe_only: bool,
    /// Upper bound on the run time; unbounded when `None`.
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    /// Creates a command for `program`.
    pub fn new(program: impl AsRef<std::ffi::OsStr>) -> Self {
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            args: Vec::new(),
            working_dir: None,
            probe_only: false,
            timeout: None,
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Marks the command as a version probe.
    pub fn probe(mut self) -> Self {
        self.probe_only = true;
        self
    }

    /// Bounds the run time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit code and combined stdout/stderr of a finished tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Process exit code, `-1` when terminated by a signal.
    pub exit_code: i32,
    /// Interleaved stdout and stderr lines.
    pub output: String,
}

impl ToolOutput {
    /// Whether the tool exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the command to completion. Only spawn failures other than a
    /// missing executable are errors; exit codes are reported, not judged.
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Applies the exit code policy to a finished run.
pub fn check_exit(command: &ToolCommand, output: ToolOutput) -> Result<ToolOutput> {
    if output.success() {
        return Ok(output);
    }
    if command.probe_only && output.exit_code != NOT_FOUND_EXIT_CODE {
        log::debug!("Probe {} exited with {}", command, output.exit_code);
        return Ok(output);
    }
    Err(Error::ToolFailed {
        command: command.to_string(),
        exit_code: output.exit_code,
        output: output.output,
    })
}

/// [`ToolRunner`] backed by real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        log::debug!("Running {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found: {}", command.program, e);
                return Ok(ToolOutput {
                    exit_code: NOT_FOUND_EXIT_CODE,
                    output: format!("{}: command not found", command.program),
                });
            }
            Err(error) => {
                return Err(Error::CommandFailed {
                    command: command.to_string(),
                    error,
                });
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            tokio::join!(drain(stdout, tx.clone()), drain(stderr, tx));
            child.wait().await
        };
        let status = match command.timeout {
            Some(limit) => tokio::time::timeout(limit, finished).await.ok(),
            None => Some(finished.await),
        };

        let status = match status {
            Some(Ok(status)) => status,
            Some(Err(error)) => {
                return Err(Error::CommandFailed {
                    command: command.to_string(),
                    error,
                });
            }
            None => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {}", command.program, e);
                }
                return Err(Error::packaging(
                    format!(
                        "{} did not finish within {} seconds",
                        command.program,
                        command.timeout.map(|t| t.as_secs()).unwrap_or_default()
                    ),
                    "Re-run with --verbose to see the tool output",
                ));
            }
        };

        let mut output = String::new();
        while let Ok(line) = rx.try_recv() {
            output.push_str(&line);
            output.push('\n');
        }

        Ok(ToolOutput {
            exit_code: status.code().unwrap_or(-1),
            output,
        })
    }
}

async fn drain<R>(stream: Option<R>, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    // Output may be in a legacy code page. Decode lossily and read to EOF.
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']).to_string();
                log::debug!("  {}", line);
                let _ = tx.send(line);
            }
            Err(e) => {
                log::debug!("Stopped reading tool output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_spaces() {
        let cmd = ToolCommand::new("iscc").arg("/q").arg("My App.iss");
        assert_eq!(cmd.to_string(), "iscc /q \"My App.iss\"");
    }

    #[test]
    fn test_probe_tolerates_nonzero_exit() {
        let probe = ToolCommand::new("candle").arg("-?").probe();
        let output = ToolOutput {
            exit_code: 1,
            output: "Windows Installer XML Toolset Compiler version 3.11".into(),
        };
        assert!(check_exit(&probe, output).is_ok());
    }

    #[test]
    fn test_probe_still_fails_when_missing() {
        let probe = ToolCommand::new("candle").probe();
        let output = ToolOutput {
            exit_code: NOT_FOUND_EXIT_CODE,
            output: String::new(),
        };
        let err = check_exit(&probe, output).unwrap_err();
        assert_eq!(err.exit_code(), Some(NOT_FOUND_EXIT_CODE));
    }

    #[test]
    fn test_regular_command_fails_on_nonzero() {
        let cmd = ToolCommand::new("dpkg-deb").arg("--build");
        let output = ToolOutput {
            exit_code: 3,
            output: "boom\n".into(),
        };
        let err = check_exit(&cmd, output).unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.tool_output(), Some("boom\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_both_streams() {
        let cmd = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = ProcessRunner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(output.output.contains("out"));
        assert!(output.output.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_survives_non_utf8_output() {
        let cmd = ToolCommand::new("sh").arg("-c").arg(
            "printf '\\377\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; echo done; exit 0",
        );
        let output = ProcessRunner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.output.starts_with('\u{FFFD}'));
        assert!(output.output.contains("done"));
        assert!(output.output.len() > 300_000);
    }

    #[tokio::test]
    async fn test_process_runner_reports_missing_executable() {
        let cmd = ToolCommand::new("definitely-not-a-real-tool-4821");
        let output = ProcessRunner.run(&cmd).await.unwrap();
        assert_eq!(output.exit_code, NOT_FOUND_EXIT_CODE);
    }
}
