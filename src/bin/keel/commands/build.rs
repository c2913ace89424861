//! `keel build` command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::cli::BuildArgs;
use keel::builder::directory::{DirectoryCompiler, DirectoryLinker};
use keel::builder::toolchain::{default_executable, Toolchain};
use keel::builder::BuildContext;
use keel::util::fs::remove_dir_all_if_exists;

pub fn execute(ctx: &BuildContext, args: BuildArgs) -> Result<i32> {
    let ctx = ctx.clone().with_jobs(args.jobs.or(ctx.jobs));
    let src = ctx.resolve(&args.src);
    let obj = ctx.resolve(&args.obj);
    let out = ctx.resolve(&output_path(&args, ctx.toolchain()));

    if !src.is_dir() {
        bail!("source directory `{}` does not exist", src.display());
    }

    if ctx.is_clean() {
        remove_dir_all_if_exists(&obj)?;
    }

    let started = Instant::now();

    let report = DirectoryCompiler::new(&ctx)
        .concurrent(!args.sequential)
        .compile(&src, &obj)?;
    if report.is_empty() {
        ctx.shell
            .warn(format!("no C/C++ sources found in {}", src.display()));
    }

    if let Some(code) = report.first_failure_code() {
        let failed = report.failures().count();
        ctx.shell.error(format!(
            "{} of {} file(s) failed to compile, not linking",
            failed,
            report.len()
        ));
        ctx.shell.print_summary(started.elapsed());
        return Ok(code);
    }

    let linker = DirectoryLinker::new(&ctx);
    if linker.objects(&obj)?.is_empty() {
        bail!("no object files in `{}`", obj.display());
    }

    let outcome = if args.lib {
        linker.archive(&obj, &out)?
    } else {
        linker.link(&obj, &out)?
    };

    ctx.shell.print_summary(started.elapsed());
    Ok(outcome.code())
}

/// `--out`, or `bin/main` (`bin/libmain.a` with `--lib`) with host extensions.
fn output_path(args: &BuildArgs, tc: &dyn Toolchain) -> PathBuf {
    match &args.out {
        Some(out) => out.clone(),
        None if args.lib => {
            PathBuf::from("bin").join(format!("libmain.{}", tc.static_lib_extension()))
        }
        None => default_executable(&PathBuf::from("bin").join("main"), tc.exe_extension()),
    }
}
