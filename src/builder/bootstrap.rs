//! Self-rebuild bootstrap.
//!
//! A driver binary built from a source file next to it can check on startup
//! whether that source changed, rebuild itself in place and relaunch the new
//! binary with the same arguments:
//!
//! ```text
//! Fresh ──────────────────────────────▶ run normally
//! Stale ─▶ Recompiling ─▶ Relaunching ─▶ process replaced
//! ```
//!
//! The relaunched process always receives `--no-rebuild`, so one invocation
//! rebuilds at most once.

use std::convert::Infallible;
use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};

use crate::builder::command::{CommandValue, Stamp};
use crate::builder::context::BuildContext;
use crate::builder::error::BuildError;
use crate::builder::executor::Executor;
use crate::builder::token::{ArgumentToken, CompilerFlag, LanguageStandard};
use crate::util::fs::rotate_backup;
use crate::util::process::ProcessBuilder;
use crate::util::shell::Status;

/// Switch injected into the relaunched process.
pub const NO_REBUILD: &str = "--no-rebuild";

/// Switches every driver understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct DriverFlags {
    /// Never rebuild the driver, even if its source changed
    #[arg(long, global = true)]
    pub no_rebuild: bool,

    /// Skip the configured init script
    #[arg(long, global = true)]
    pub no_init_script: bool,

    /// Build with debug information
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print errors only
    #[arg(long, global = true)]
    pub silent: bool,

    /// Ignore timestamps and run every action
    #[arg(long, global = true)]
    pub clean: bool,

    /// Print debug logs and the output of every action
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl DriverFlags {
    /// Set the switch named by `token`, returning false if it is not one.
    pub fn accept(&mut self, token: &str) -> bool {
        let slot = match token {
            NO_REBUILD => &mut self.no_rebuild,
            "--no-init-script" => &mut self.no_init_script,
            "--debug" => &mut self.debug,
            "--silent" => &mut self.silent,
            "--clean" => &mut self.clean,
            "--verbose" | "-v" => &mut self.verbose,
            _ => return false,
        };
        *slot = true;
        true
    }

    /// Check if `token` is a recognized switch.
    pub fn is_recognized(token: &str) -> bool {
        DriverFlags::default().accept(token)
    }

    /// The set switches other than `--no-rebuild`, as arguments.
    pub fn to_args(&self) -> Vec<String> {
        [
            (self.no_init_script, "--no-init-script"),
            (self.debug, "--debug"),
            (self.silent, "--silent"),
            (self.clean, "--clean"),
            (self.verbose, "--verbose"),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, flag)| flag.to_string())
        .collect()
    }
}

/// Command line of a driver program: switches plus free-form arguments.
#[derive(Debug, Clone, Parser)]
#[command(about = "Self-rebuilding build driver")]
pub struct DriverArgs {
    #[command(flatten)]
    pub flags: DriverFlags,

    /// Arguments for the driver program itself
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub passthrough: Vec<OsString>,
}

/// Whether a stale driver is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecompilePolicy {
    #[default]
    Always,
    /// Ask on stdin first.
    Ask,
    Never,
}

/// Everything the bootstrap needs to know about this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapState {
    pub executable: PathBuf,
    pub driving_source: PathBuf,
    pub flags: DriverFlags,
    /// Kept as given, including arguments that are not valid UTF-8.
    pub passthrough: Vec<OsString>,
}

impl BootstrapState {
    pub fn new(executable: impl Into<PathBuf>, driving_source: impl Into<PathBuf>) -> Self {
        BootstrapState {
            executable: executable.into(),
            driving_source: driving_source.into(),
            flags: DriverFlags::default(),
            passthrough: Vec::new(),
        }
    }

    /// Split `args` (without the program name) into switches and passthrough.
    ///
    /// Switches are recognized anywhere; everything else is kept in order,
    /// byte for byte.
    pub fn from_args<I, S>(
        executable: impl Into<PathBuf>,
        driving_source: impl Into<PathBuf>,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut state = BootstrapState::new(executable, driving_source);
        for arg in args {
            let arg = arg.into();
            let accepted = arg.to_str().is_some_and(|s| state.flags.accept(s));
            if !accepted {
                state.passthrough.push(arg);
            }
        }
        state
    }

    /// Build the state from parsed [`DriverArgs`].
    pub fn from_driver_args(
        executable: impl Into<PathBuf>,
        driving_source: impl Into<PathBuf>,
        args: DriverArgs,
    ) -> Self {
        BootstrapState {
            executable: executable.into(),
            driving_source: driving_source.into(),
            flags: args.flags,
            passthrough: args.passthrough,
        }
    }

    /// Build the state for the running process.
    ///
    /// A relative `driving_source` is resolved against the directory of the
    /// running executable.
    pub fn from_env(driving_source: &Path) -> Result<Self> {
        let executable = std::env::current_exe().context("failed to locate the running executable")?;
        let source = match executable.parent() {
            Some(dir) if driving_source.is_relative() => dir.join(driving_source),
            _ => driving_source.to_path_buf(),
        };
        Ok(BootstrapState::from_args(executable, source, std::env::args_os().skip(1)))
    }

    /// Arguments for the relaunched binary: `--no-rebuild`, the set switches,
    /// then the passthrough arguments unchanged.
    pub fn relaunch_args(&self) -> Vec<OsString> {
        std::iter::once(NO_REBUILD.to_string())
            .chain(self.flags.to_args())
            .map(OsString::from)
            .chain(self.passthrough.iter().cloned())
            .collect()
    }
}

/// Why no rebuild is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshReason {
    /// `--no-rebuild` was given or the policy is `never`.
    RebuildDisabled,
    SourceMissing,
    /// The binary is not older than its source.
    UpToDate,
    /// The user answered no.
    Declined,
}

/// Result of comparing the binary with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh(FreshReason),
    Stale,
}

/// Outcome of [`Bootstrap::run`].
#[derive(Debug)]
pub enum Phase {
    /// Continue with normal program logic.
    Fresh(FreshReason),
    /// The binary was rebuilt; replace this process with it.
    Relaunch(Relaunch),
}

/// A pending relaunch of the rebuilt binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relaunch {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Relaunch {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Relaunch {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Replace the current process with the rebuilt binary.
    ///
    /// Only returns if the new binary could not be started.
    pub fn exec(&self) -> Result<Infallible> {
        ProcessBuilder::new(&self.program)
            .args(&self.args)
            .replace_process()
    }
}

/// Drives the rebuild-and-relaunch protocol.
pub struct Bootstrap<'a> {
    ctx: &'a BuildContext,
    policy: RecompilePolicy,
    standard: LanguageStandard,
    confirm: Box<dyn Fn(&BootstrapState) -> bool + 'a>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Bootstrap {
            ctx,
            policy: RecompilePolicy::default(),
            standard: LanguageStandard::Cxx17,
            confirm: Box::new(ask_on_stdin),
        }
    }

    pub fn policy(mut self, policy: RecompilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Language standard the driver is rebuilt with.
    pub fn standard(mut self, standard: LanguageStandard) -> Self {
        self.standard = standard;
        self
    }

    /// Replace the question asked under [`RecompilePolicy::Ask`].
    pub fn confirm(mut self, confirm: impl Fn(&BootstrapState) -> bool + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Decide whether the driver has to be rebuilt.
    pub fn assess(&self, state: &BootstrapState) -> Result<Freshness> {
        if state.flags.no_rebuild || self.policy == RecompilePolicy::Never {
            return Ok(Freshness::Fresh(FreshReason::RebuildDisabled));
        }

        let Some(source) = Stamp::of(&state.driving_source) else {
            return Ok(Freshness::Fresh(FreshReason::SourceMissing));
        };
        let binary = Stamp::of(&state.executable).unwrap_or(Stamp::Origin);
        if binary >= source {
            return Ok(Freshness::Fresh(FreshReason::UpToDate));
        }

        if self.policy == RecompilePolicy::Ask && !(self.confirm)(state) {
            return Ok(Freshness::Fresh(FreshReason::Declined));
        }
        Ok(Freshness::Stale)
    }

    /// The compile-and-link command that rebuilds the driver in place.
    pub fn rebuild_command(&self, state: &BootstrapState) -> CommandValue {
        let tc = self.ctx.toolchain();
        let link = self
            .ctx
            .default_link()
            .add(tc, ArgumentToken::ExecutableFile(state.executable.clone()));

        let mut cmd = self
            .ctx
            .default_compile()
            .add(tc, ArgumentToken::SourceFile(state.driving_source.clone()))
            .add(tc, CompilerFlag::Std(self.standard));
        if let Some(dir) = state.executable.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd = cmd.add(tc, ArgumentToken::IncludeDirectory(dir.to_path_buf()));
        }
        cmd.add(tc, ArgumentToken::link_merge(link))
    }

    /// Rebuild the driver if it is stale.
    ///
    /// On a failed rebuild the previous binary is moved back into place
    /// before [`BuildError::BootstrapFailure`] is returned.
    pub fn run(&self, state: &BootstrapState) -> Result<Phase> {
        if let Freshness::Fresh(reason) = self.assess(state)? {
            tracing::debug!("driver is fresh: {:?}", reason);
            return Ok(Phase::Fresh(reason));
        }

        let shell = &self.ctx.shell;
        shell.status(
            Status::Rebuilding,
            format!(
                "{} from {}",
                state.executable.display(),
                state.driving_source.display()
            ),
        );

        let backup = if state.executable.exists() {
            Some(rotate_backup(&state.executable)?)
        } else {
            None
        };

        let cmd = self.rebuild_command(state);
        let failure = match Executor::new(self.ctx).force(true).run(&cmd) {
            Ok(outcome) if outcome.is_success() => None,
            Ok(outcome) => Some(format!("compiler exited with status {}", outcome.code())),
            Err(e) => Some(format!("{:#}", e)),
        };

        if let Some(reason) = failure {
            if let Some(backup) = &backup {
                restore_backup(backup, &state.executable);
            }
            return Err(BuildError::BootstrapFailure {
                executable: state.executable.clone(),
                driving_source: state.driving_source.clone(),
                reason,
            }
            .into());
        }

        shell.status(Status::Relaunching, state.executable.display());
        Ok(Phase::Relaunch(Relaunch::new(
            state.executable.clone(),
            state.relaunch_args(),
        )))
    }

    /// Run the protocol; on the stale path this never returns.
    pub fn start(&self, state: BootstrapState) -> Result<BootstrapState> {
        match self.run(&state)? {
            Phase::Fresh(_) => Ok(state),
            Phase::Relaunch(relaunch) => match relaunch.exec()? {},
        }
    }
}

fn restore_backup(backup: &Path, executable: &Path) {
    if executable.exists() {
        if let Err(e) = std::fs::remove_file(executable) {
            tracing::warn!("failed to remove partial {}: {}", executable.display(), e);
            return;
        }
    }
    match std::fs::rename(backup, executable) {
        Ok(()) => tracing::debug!("restored {}", executable.display()),
        Err(e) => tracing::warn!(
            "failed to restore {} from {}: {}",
            executable.display(),
            backup.display(),
            e
        ),
    }
}

/// Ask `[Y/n]` on stdin; an empty answer means yes.
fn ask_on_stdin(state: &BootstrapState) -> bool {
    eprint!(
        "{} changed since {} was built. Rebuild? [Y/n] ",
        state.driving_source.display(),
        state.executable.display()
    );
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}
