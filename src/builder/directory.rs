//! Directory-level fan-out.
//!
//! [`DirectoryCompiler`] turns every translation unit under a source tree
//! into one compile command and runs them all; [`DirectoryLinker`] folds the
//! resulting objects into an executable or a static library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::builder::command::CommandValue;
use crate::builder::context::BuildContext;
use crate::builder::executor::{Executor, Outcome};
use crate::builder::token::ArgumentToken;
use crate::util::fs::{ensure_dir, files_with_extension, find_files};
use crate::util::shell::Status;

/// One attempted compile.
#[derive(Debug)]
pub struct CompileAttempt {
    pub source: PathBuf,
    pub object: PathBuf,
    pub result: Result<Outcome>,
}

impl CompileAttempt {
    /// Check if the compile failed to spawn or exited non-zero.
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(outcome) => !outcome.is_success(),
            Err(_) => true,
        }
    }
}

/// Every compile attempted by [`DirectoryCompiler::compile`], in discovery order.
#[derive(Debug, Default)]
pub struct CompileReport {
    pub attempts: Vec<CompileAttempt>,
}

impl CompileReport {
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Attempts that failed.
    pub fn failures(&self) -> impl Iterator<Item = &CompileAttempt> {
        self.attempts.iter().filter(|a| a.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Exit code of the first failure in discovery order (1 if it never ran).
    pub fn first_failure_code(&self) -> Option<i32> {
        self.failures().next().map(|a| match &a.result {
            Ok(outcome) => outcome.code(),
            Err(_) => 1,
        })
    }

    /// Object files of every attempt.
    pub fn objects(&self) -> impl Iterator<Item = &Path> {
        self.attempts.iter().map(|a| a.object.as_path())
    }
}

/// Compiles every source file under a directory tree.
pub struct DirectoryCompiler<'a> {
    ctx: &'a BuildContext,
    template: CommandValue,
    concurrent: bool,
}

impl<'a> DirectoryCompiler<'a> {
    /// Create a compiler using the context's default compile template.
    pub fn new(ctx: &'a BuildContext) -> Self {
        DirectoryCompiler {
            ctx,
            template: ctx.default_compile(),
            concurrent: true,
        }
    }

    /// Use `template` as the base of every per-file command.
    pub fn template(mut self, template: CommandValue) -> Self {
        self.template = template;
        self
    }

    /// Run compiles on a worker pool instead of one after another.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Source files under `src_root` this toolchain compiles, in file-name order.
    pub fn sources(&self, src_root: &Path) -> Result<Vec<PathBuf>> {
        let tc = self.ctx.toolchain();
        find_files(src_root, |p| tc.is_source(p))
    }

    /// The compile command for one source file.
    pub fn command_for(&self, source: &Path, obj_root: &Path) -> (CommandValue, PathBuf) {
        let tc = self.ctx.toolchain();
        let object = tc.object_path(obj_root, source);
        let cmd = self
            .template
            .clone()
            .add(tc, ArgumentToken::SourceFile(source.to_path_buf()))
            .add(tc, ArgumentToken::ObjectFile(object.clone()));
        (cmd, object)
    }

    /// Compile every source under `src_root` into `obj_root`.
    ///
    /// Returns only after every file has been attempted; a failing compile
    /// does not stop its siblings.
    pub fn compile(&self, src_root: &Path, obj_root: &Path) -> Result<CompileReport> {
        let sources = self.sources(src_root)?;
        ensure_dir(obj_root)?;
        tracing::debug!(
            "compiling {} file(s) from {} ({})",
            sources.len(),
            src_root.display(),
            if self.concurrent { "concurrent" } else { "sequential" }
        );

        let attempts = if self.concurrent {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.ctx.jobs())
                .build()
                .context("failed to start compile workers")?;
            pool.install(|| {
                sources
                    .par_iter()
                    .map(|source| self.attempt(source, obj_root))
                    .collect()
            })
        } else {
            sources
                .iter()
                .map(|source| self.attempt(source, obj_root))
                .collect()
        };

        Ok(CompileReport { attempts })
    }

    fn attempt(&self, source: &Path, obj_root: &Path) -> CompileAttempt {
        let (cmd, object) = self.command_for(source, obj_root);
        let result = Executor::new(self.ctx).run(&cmd);
        if let Err(e) = &result {
            self.ctx.shell.error(format!("{}: {:#}", source.display(), e));
        }
        CompileAttempt {
            source: source.to_path_buf(),
            object,
            result,
        }
    }
}

/// Links or archives every object file in a directory.
pub struct DirectoryLinker<'a> {
    ctx: &'a BuildContext,
    template: Option<CommandValue>,
}

impl<'a> DirectoryLinker<'a> {
    /// Create a linker using the context's default link or archive template.
    pub fn new(ctx: &'a BuildContext) -> Self {
        DirectoryLinker {
            ctx,
            template: None,
        }
    }

    /// Use `template` as the base command.
    pub fn template(mut self, template: CommandValue) -> Self {
        self.template = Some(template);
        self
    }

    /// Object files directly inside `obj_root`, sorted.
    pub fn objects(&self, obj_root: &Path) -> Result<Vec<PathBuf>> {
        files_with_extension(obj_root, self.ctx.toolchain().object_extension())
    }

    /// The link command for `obj_root` producing `exe`.
    pub fn link_command(&self, obj_root: &Path, exe: &Path) -> Result<CommandValue> {
        let template = self
            .template
            .clone()
            .unwrap_or_else(|| self.ctx.default_link());
        let tc = self.ctx.toolchain();
        let cmd = self
            .objects(obj_root)?
            .into_iter()
            .fold(template, |cmd, obj| cmd.add(tc, ArgumentToken::ObjectFile(obj)));
        Ok(cmd.add(tc, ArgumentToken::ExecutableFile(exe.to_path_buf())))
    }

    /// The archive command for `obj_root` producing the static library `lib`.
    pub fn archive_command(&self, obj_root: &Path, lib: &Path) -> Result<CommandValue> {
        let template = self
            .template
            .clone()
            .unwrap_or_else(|| self.ctx.default_archive());
        let tc = self.ctx.toolchain();
        let cmd = self
            .objects(obj_root)?
            .into_iter()
            .fold(template, |cmd, obj| cmd.add(tc, ArgumentToken::ObjectFile(obj)));
        Ok(cmd.add(tc, ArgumentToken::StaticLibraryFile(lib.to_path_buf())))
    }

    /// Link every object in `obj_root` into `exe`.
    pub fn link(&self, obj_root: &Path, exe: &Path) -> Result<Outcome> {
        let cmd = self.link_command(obj_root, exe)?;
        prepare_output_dir(exe)?;
        Executor::new(self.ctx).status(Status::Linking).run(&cmd)
    }

    /// Archive every object in `obj_root` into the static library `lib`.
    pub fn archive(&self, obj_root: &Path, lib: &Path) -> Result<Outcome> {
        let cmd = self.archive_command(obj_root, lib)?;
        prepare_output_dir(lib)?;
        Executor::new(self.ctx).status(Status::Archiving).run(&cmd)
    }
}

fn prepare_output_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
