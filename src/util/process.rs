//! Subprocess execution utilities.

use std::convert::Infallible;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use anyhow::{Context, Result};

/// Where a child's output stream goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Redirect {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Discard.
    Null,
    /// Write into a file, truncating it.
    File(PathBuf),
}

impl Redirect {
    fn to_stdio(&self) -> Result<Stdio> {
        Ok(match self {
            Redirect::Inherit => Stdio::inherit(),
            Redirect::Null => Stdio::null(),
            Redirect::File(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to open `{}`", path.display()))?;
                Stdio::from(file)
            }
        })
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    stdout: Redirect,
    stderr: Redirect,
    /// The command line when the builder wraps a shell invocation.
    shell_text: Option<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdout: Redirect::Inherit,
            stderr: Redirect::Inherit,
            shell_text: None,
        }
    }

    /// Run `text` through the platform shell (`sh -c` or `cmd /C`).
    pub fn shell(text: impl Into<String>) -> Self {
        let text = text.into();
        let builder = if cfg!(windows) {
            ProcessBuilder::new("cmd").arg("/C").arg(&text)
        } else {
            ProcessBuilder::new("sh").arg("-c").arg(&text)
        };
        ProcessBuilder {
            shell_text: Some(text),
            ..builder
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Route the child's stdout.
    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    /// Route the child's stderr.
    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute and return status only.
    pub fn status(&self) -> Result<ExitStatus> {
        let mut cmd = self.build_command();
        cmd.stdout(self.stdout.to_stdio()?);
        cmd.stderr(self.stderr.to_stdio()?);
        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.display_command()))?;
        Ok(status)
    }

    /// Execute the command and capture its output.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.display_command()))
    }

    /// Replace the current process with this command.
    ///
    /// On Unix the process image is replaced and this only returns on
    /// failure. Elsewhere the child is run to completion and the current
    /// process exits with its status.
    pub fn replace_process(&self) -> Result<Infallible> {
        replace(self.build_command())
            .with_context(|| format!("failed to execute `{}`", self.display_command()))
    }

    /// Display the command for messages.
    pub fn display_command(&self) -> String {
        if let Some(text) = &self.shell_text {
            return text.clone();
        }
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

#[cfg(unix)]
fn replace(mut cmd: Command) -> Result<Infallible> {
    use std::os::unix::process::CommandExt;
    Err(cmd.exec().into())
}

#[cfg(not(unix))]
fn replace(mut cmd: Command) -> Result<Infallible> {
    let status = cmd.status()?;
    std::process::exit(exit_code(&status))
}

/// Exit code of a finished child; -1 when it was killed by a signal.
pub fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
