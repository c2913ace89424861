//! `keel run` command
//!
//! Runs a driver program built from a source file next to it. A driver
//! older than its source is rebuilt first; the driver is then started with
//! `--no-rebuild`, keel's switches and the given arguments.

use anyhow::{bail, Result};

use crate::cli::RunArgs;
use keel::builder::bootstrap::{Bootstrap, BootstrapState, Phase, Relaunch};
use keel::builder::toolchain::default_executable;
use keel::builder::BuildContext;
use keel::util::config::Config;

pub fn execute(ctx: &BuildContext, config: &Config, args: RunArgs) -> Result<i32> {
    let Some(source) = args.source.as_ref().or(config.driver.source.as_ref()) else {
        bail!("no driver source given and `driver.source` is not configured");
    };
    let source = ctx.resolve(source);
    let executable = default_executable(&source, ctx.toolchain().exe_extension());

    let state = BootstrapState {
        flags: ctx.flags.clone(),
        passthrough: args.args,
        ..BootstrapState::new(&executable, &source)
    };

    let phase = Bootstrap::new(ctx)
        .policy(config.driver.recompile())
        .standard(config.driver.standard())
        .run(&state)?;

    let relaunch = match phase {
        Phase::Relaunch(relaunch) => relaunch,
        Phase::Fresh(reason) => {
            if !executable.exists() {
                bail!(
                    "driver `{}` has not been built ({:?})",
                    executable.display(),
                    reason
                );
            }
            Relaunch::new(&executable, state.relaunch_args())
        }
    };
    tracing::debug!("starting {}", relaunch.program().display());
    match relaunch.exec()? {}
}
