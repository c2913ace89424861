//! keel - a self-hosting C/C++ build driver
//!
//! Build programs are ordinary C/C++-style command pipelines described with
//! typed tokens instead of hand-written flag strings. This crate provides the
//! command algebra, toolchain backends, the incremental executor, directory
//! compile/link orchestration, and the self-rebuild bootstrap used by driver
//! binaries.

pub mod builder;
pub mod util;

pub use builder::{
    ArgumentToken, Bootstrap, BootstrapState, BuildContext, BuildError, CommandValue,
    DirectoryCompiler, DirectoryLinker, Executor, Outcome, Toolchain,
};
pub use util::config::Config;
