//! `keel clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use keel::builder::BuildContext;
use keel::util::fs::{remove_dir_all_if_exists, remove_file_if_exists};
use keel::util::shell::Status;

pub fn execute(ctx: &BuildContext, args: CleanArgs) -> Result<i32> {
    let obj = ctx.resolve(&args.obj);
    if obj.exists() {
        remove_dir_all_if_exists(&obj)?;
        ctx.shell.status(Status::Removed, obj.display());
    }

    if let Some(out) = &args.out {
        let out = ctx.resolve(out);
        if out.exists() {
            remove_file_if_exists(&out)?;
            ctx.shell.status(Status::Removed, out.display());
        }
    }

    Ok(0)
}
