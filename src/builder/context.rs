//! Build context - toolchain, flags, and default command templates.
//!
//! Everything a build action needs is threaded through a [`BuildContext`]
//! instead of process-wide state, so several contexts (different toolchains,
//! different flags) can coexist, e.g. in tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::builder::bootstrap::DriverFlags;
use crate::builder::command::{ActionKind, CommandValue};
use crate::builder::token::{ArgumentToken, CompilerFlag, LinkerFlag};
use crate::builder::toolchain::{detect_toolchain, Toolchain};
use crate::util::config::Config;
use crate::util::shell::Shell;

/// Build context containing the toolchain and invocation settings.
#[derive(Clone)]
pub struct BuildContext {
    /// Toolchain implementation
    pub toolchain: Arc<dyn Toolchain>,

    /// Recognized command-line switches
    pub flags: DriverFlags,

    /// Console output
    pub shell: Arc<Shell>,

    /// Directory commands run in by default
    pub working_dir: PathBuf,

    /// Directory for per-invocation scratch files
    pub scratch_dir: PathBuf,

    /// Extra arguments for every compile command
    pub compiler_args: Vec<String>,

    /// Extra arguments for every link command
    pub linker_args: Vec<String>,

    /// Parallel compile jobs (None = one per CPU)
    pub jobs: Option<usize>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("toolchain", &self.toolchain.name())
            .field("flags", &self.flags)
            .field("verbosity", &self.shell.verbosity())
            .field("working_dir", &self.working_dir)
            .field("scratch_dir", &self.scratch_dir)
            .field("compiler_args", &self.compiler_args)
            .field("linker_args", &self.linker_args)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl BuildContext {
    /// Create a context around `toolchain` with default settings.
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        BuildContext {
            toolchain,
            flags: DriverFlags::default(),
            shell: Arc::new(Shell::default()),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            scratch_dir: std::env::temp_dir(),
            compiler_args: Vec::new(),
            linker_args: Vec::new(),
            jobs: None,
        }
    }

    /// Create a context from the loaded configuration and command-line flags.
    pub fn from_config(config: &Config, flags: DriverFlags) -> Result<Self> {
        let toolchain = detect_toolchain(&config.toolchain)?;
        let shell = Shell::from_flags(flags.silent, flags.verbose, config.log.summary);

        Ok(BuildContext::new(toolchain)
            .with_shell(Arc::new(shell))
            .with_flags(flags)
            .with_compiler_args(config.build.compiler_args.clone())
            .with_linker_args(config.build.linker_args.clone())
            .with_jobs(config.build.jobs))
    }

    pub fn with_flags(mut self, flags: DriverFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_shell(mut self, shell: Arc<Shell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_compiler_args(mut self, args: Vec<String>) -> Self {
        self.compiler_args = args;
        self
    }

    pub fn with_linker_args(mut self, args: Vec<String>) -> Self {
        self.linker_args = args;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Get the toolchain.
    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Check if up-to-date checks are disabled (`--clean`).
    pub fn is_clean(&self) -> bool {
        self.flags.clean
    }

    /// Check if debug information was requested (`--debug`).
    pub fn is_debug(&self) -> bool {
        self.flags.debug
    }

    /// Number of parallel compile jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    /// An empty command of `kind` in the context's working directory.
    pub fn command(&self, kind: ActionKind) -> CommandValue {
        self.toolchain.command(kind, &self.working_dir)
    }

    /// Compile template: configured extra arguments, plus debug info under `--debug`.
    pub fn default_compile(&self) -> CommandValue {
        let tc = self.toolchain();
        let mut cmd = self.with_extra_args(self.command(ActionKind::Compile), &self.compiler_args);
        if self.is_debug() {
            cmd = cmd.add(tc, CompilerFlag::Debug);
        }
        cmd
    }

    /// Link template: configured extra arguments, plus debug info under `--debug`.
    pub fn default_link(&self) -> CommandValue {
        let tc = self.toolchain();
        let mut cmd = self.with_extra_args(self.command(ActionKind::Link), &self.linker_args);
        if self.is_debug() {
            cmd = cmd.add(tc, LinkerFlag::Debug);
        }
        cmd
    }

    /// Archive template.
    pub fn default_archive(&self) -> CommandValue {
        self.command(ActionKind::Archive)
    }

    fn with_extra_args(&self, cmd: CommandValue, args: &[String]) -> CommandValue {
        args.iter().fold(cmd, |cmd, arg| {
            cmd.add(self.toolchain(), ArgumentToken::CustomFlag(arg.clone()))
        })
    }

    /// Resolve `path` against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}
