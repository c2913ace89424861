//! Command implementations

use std::path::Path;

use anyhow::Result;

use keel::builder::command::CommandValue;
use keel::builder::executor::Executor;
use keel::builder::BuildContext;

pub mod build;
pub mod clean;
pub mod completions;
pub mod driver;
pub mod run;
pub mod toolchain;

/// Run the configured init script, returning its exit code.
pub fn run_init_script(ctx: &BuildContext, script: &Path) -> Result<i32> {
    let cmd = CommandValue::plain(&ctx.working_dir).append_path(ctx.resolve(script), false);
    let outcome = Executor::new(ctx).plain_errors(true).force(true).run(&cmd)?;
    Ok(outcome.code())
}
