//! `keel driver` command
//!
//! Builds driver programs: each source is compiled and linked in one
//! invocation into an executable next to it.

use anyhow::{Context, Result};

use crate::cli::DriverBuildArgs;
use keel::builder::executor::Executor;
use keel::builder::token::{ArgumentToken, CompilerFlag};
use keel::builder::toolchain::default_executable;
use keel::builder::BuildContext;
use keel::util::config::Config;

pub fn execute(ctx: &BuildContext, config: &Config, args: DriverBuildArgs) -> Result<i32> {
    let tc = ctx.toolchain();
    let standard = args.std.unwrap_or_else(|| config.driver.standard());
    let keel_exe = std::env::current_exe().context("failed to locate the keel executable")?;
    let include = keel_exe.parent().map(|dir| dir.to_path_buf());

    let mut status = 0;
    for file in &args.files {
        let source = ctx.resolve(file);
        let exe = default_executable(&source, tc.exe_extension());

        let link = ctx
            .default_link()
            .add(tc, ArgumentToken::ExecutableFile(exe));
        let mut cmd = ctx
            .default_compile()
            .add(tc, ArgumentToken::SourceFile(source))
            .add(tc, CompilerFlag::Std(standard));
        if let Some(dir) = &include {
            cmd = cmd.add(tc, ArgumentToken::IncludeDirectory(dir.clone()));
        }
        let cmd = cmd.add(tc, ArgumentToken::link_merge(link));

        let outcome = Executor::new(ctx).run(&cmd)?;
        if status == 0 && !outcome.is_success() {
            status = outcome.code();
        }
    }

    Ok(status)
}
