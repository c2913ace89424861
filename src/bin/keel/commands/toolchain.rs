//! `keel toolchain` command

use anyhow::Result;

use keel::builder::command::ActionKind;
use keel::builder::BuildContext;

pub fn execute(ctx: &BuildContext) -> Result<i32> {
    let tc = ctx.toolchain();

    println!("Toolchain: {}", tc.name());
    println!("Platform:  {}", tc.platform());
    println!();

    for kind in [ActionKind::Compile, ActionKind::Link, ActionKind::Archive] {
        println!("  {:<8} {}", kind.as_str(), ctx.command(kind).text());
    }
    println!();

    println!("Extensions:");
    println!("  source   {}", tc.source_extensions().join(", "));
    println!("  object   .{}", tc.object_extension());
    println!("  static   .{}", tc.static_lib_extension());
    println!("  shared   .{}", tc.shared_lib_extension());
    if tc.exe_extension().is_empty() {
        println!("  exe      (none)");
    } else {
        println!("  exe      .{}", tc.exe_extension());
    }

    Ok(0)
}
