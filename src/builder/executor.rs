//! Command executor.
//!
//! Runs a [`CommandValue`] through the platform shell unless its declared
//! inputs and outputs say it is already up to date.

use anyhow::{Context, Result};

use crate::builder::command::CommandValue;
use crate::builder::context::BuildContext;
use crate::builder::error::BuildError;
use crate::util::process::{exit_code, ProcessBuilder, Redirect};
use crate::util::shell::Status;

/// Result of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command was up to date and no process was spawned.
    Skipped,
    /// The command ran; `code` is -1 if the child was killed by a signal.
    Completed { code: i32 },
}

impl Outcome {
    /// Exit code, 0 when skipped.
    pub fn code(&self) -> i32 {
        match self {
            Outcome::Skipped => 0,
            Outcome::Completed { code } => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code() == 0
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

/// Runs commands for a build context.
pub struct Executor<'a> {
    ctx: &'a BuildContext,
    suppress_output: bool,
    plain_errors: bool,
    force: bool,
    status: Status,
}

impl<'a> Executor<'a> {
    /// Create a new executor.
    pub fn new(ctx: &'a BuildContext) -> Self {
        Executor {
            ctx,
            suppress_output: false,
            plain_errors: false,
            force: false,
            status: Status::Running,
        }
    }

    /// Discard the child's stdout (ignored under `--verbose`).
    pub fn suppress_output(mut self, suppress: bool) -> Self {
        self.suppress_output = suppress;
        self
    }

    /// Let the child write stderr directly instead of capturing it.
    pub fn plain_errors(mut self, plain: bool) -> Self {
        self.plain_errors = plain;
        self
    }

    /// Run even if the command is up to date.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Status word echoed before the command.
    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Run `cmd`, or skip it if it is up to date.
    ///
    /// A non-zero exit is reported and returned as [`Outcome::Completed`];
    /// only failures to spawn the process are errors.
    pub fn run(&self, cmd: &CommandValue) -> Result<Outcome> {
        let shell = &self.ctx.shell;
        let text = cmd.text();

        if !self.force && !self.ctx.is_clean() && cmd.is_up_to_date() {
            tracing::debug!(
                "up to date: inputs {:?}, outputs {:?}",
                cmd.latest_input(),
                cmd.earliest_output()
            );
            shell.status(Status::Skipped, &text);
            shell.record_skipped();
            return Ok(Outcome::Skipped);
        }

        shell.status(self.status, &text);

        let suppress = self.suppress_output && !shell.is_verbose();
        let mut process = ProcessBuilder::shell(&text)
            .cwd(cmd.working_directory())
            .stdout(if suppress { Redirect::Null } else { Redirect::Inherit });

        // One scratch file per invocation; concurrent runs never share it.
        let scratch = if self.plain_errors {
            None
        } else {
            let file = tempfile::Builder::new()
                .prefix("keel-stderr-")
                .suffix(".txt")
                .tempfile_in(&self.ctx.scratch_dir)
                .with_context(|| {
                    format!(
                        "failed to create scratch file in {}",
                        self.ctx.scratch_dir.display()
                    )
                })?;
            process = process.stderr(Redirect::File(file.path().to_path_buf()));
            Some(file)
        };

        let status = process.status()?;

        if let Some(file) = scratch {
            let bytes = std::fs::read(file.path())
                .with_context(|| format!("failed to read {}", file.path().display()))?;
            let captured = String::from_utf8_lossy(&bytes);
            if !captured.trim().is_empty() {
                shell.stderr_lines(&captured);
            }
        }

        let code = exit_code(&status);
        if code == 0 {
            shell.record_ran();
        } else {
            shell.record_failed();
            shell.error(BuildError::ChildProcessFailure {
                command: text,
                code,
            });
        }

        Ok(Outcome::Completed { code })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::builder::bootstrap::DriverFlags;
    use crate::builder::toolchain::{GccToolchain, ToolchainPlatform};
    use crate::util::shell::{Shell, Verbosity};
    use std::fs::File;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn touch(path: &Path, secs: u64) {
        let file = File::create(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    fn context(tmp: &TempDir) -> BuildContext {
        let tc = GccToolchain::new(PathBuf::from("g++"), PathBuf::from("ar"), ToolchainPlatform::Gcc);
        let scratch = tmp.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        BuildContext::new(Arc::new(tc))
            .with_shell(Arc::new(Shell::new(Verbosity::Quiet)))
            .with_working_dir(tmp.path())
            .with_scratch_dir(scratch)
    }

    fn marker_command(tmp: &TempDir, input: &Path, output: &Path) -> CommandValue {
        CommandValue::plain(tmp.path())
            .append("touch marker", false)
            .declare_input(input)
            .declare_output(output)
    }

    #[test]
    fn test_up_to_date_command_is_not_spawned() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in.c"), tmp.path().join("out.o"));
        touch(&input, 100);
        touch(&output, 200);

        let ctx = context(&tmp);
        let outcome = Executor::new(&ctx)
            .run(&marker_command(&tmp, &input, &output))
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(outcome.code(), 0);
        assert!(!tmp.path().join("marker").exists());
        assert_eq!(ctx.shell.counts().skipped, 1);
        assert_eq!(ctx.shell.counts().ran, 0);
    }

    #[test]
    fn test_stale_command_is_spawned() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in.c"), tmp.path().join("out.o"));
        touch(&input, 300);
        touch(&output, 200);

        let ctx = context(&tmp);
        let outcome = Executor::new(&ctx)
            .run(&marker_command(&tmp, &input, &output))
            .unwrap();

        assert_eq!(outcome, Outcome::Completed { code: 0 });
        assert!(tmp.path().join("marker").exists());
        assert_eq!(ctx.shell.counts().ran, 1);
    }

    #[test]
    fn test_clean_and_force_ignore_staleness() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in.c"), tmp.path().join("out.o"));
        touch(&input, 100);
        touch(&output, 200);
        let cmd = marker_command(&tmp, &input, &output);

        let forced = context(&tmp);
        assert!(!Executor::new(&forced).force(true).run(&cmd).unwrap().is_skipped());

        std::fs::remove_file(tmp.path().join("marker")).unwrap();
        let clean = context(&tmp).with_flags(DriverFlags {
            clean: true,
            ..Default::default()
        });
        assert!(!Executor::new(&clean).run(&cmd).unwrap().is_skipped());
        assert!(tmp.path().join("marker").exists());
    }

    #[test]
    fn test_failure_code_is_returned() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let cmd = CommandValue::plain(tmp.path()).append("exit 3", false);

        let outcome = Executor::new(&ctx).run(&cmd).unwrap();
        assert_eq!(outcome.code(), 3);
        assert!(!outcome.is_success());
        assert_eq!(ctx.shell.counts().failed, 1);
    }

    #[test]
    fn test_scratch_files_are_removed() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let cmd = CommandValue::plain(tmp.path()).append("echo oops >&2; exit 1", false);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = ctx.clone();
                let cmd = cmd.clone();
                std::thread::spawn(move || Executor::new(&ctx).run(&cmd).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().code(), 1);
        }

        assert_eq!(ctx.shell.counts().failed, 4);
        let leftover = std::fs::read_dir(&ctx.scratch_dir).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_suppressed_output_still_runs() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let cmd = CommandValue::plain(tmp.path()).append("echo hidden && touch marker", false);
        let outcome = Executor::new(&ctx)
            .suppress_output(true)
            .plain_errors(true)
            .run(&cmd)
            .unwrap();
        assert!(outcome.is_success());
        assert!(tmp.path().join("marker").exists());
    }
}
