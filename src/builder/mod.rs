//! C/C++ build actions.
//!
//! Commands are built from semantic [`ArgumentToken`]s, translated by a
//! [`Toolchain`] and run by the [`Executor`] when their declared inputs are
//! newer than their outputs.

pub mod bootstrap;
pub mod command;
pub mod context;
pub mod directory;
pub mod error;
pub mod executor;
pub mod token;
pub mod toolchain;

pub use bootstrap::{
    Bootstrap, BootstrapState, DriverArgs, DriverFlags, FreshReason, Freshness, Phase,
    RecompilePolicy, Relaunch,
};
pub use command::{ActionKind, CommandValue, Fragment, Role, Stamp};
pub use context::BuildContext;
pub use directory::{CompileReport, DirectoryCompiler, DirectoryLinker};
pub use error::BuildError;
pub use executor::{Executor, Outcome};
pub use token::{ArgumentToken, CompilerFlag, LanguageStandard, LinkerFlag};
pub use toolchain::{
    detect_toolchain, CustomToolchain, GccToolchain, MsvcToolchain, Toolchain, ToolchainPlatform,
};
