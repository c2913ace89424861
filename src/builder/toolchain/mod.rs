//! Toolchain abstraction for C/C++ compilers.
//!
//! A [`Toolchain`] maps abstract [`ArgumentToken`]s onto the argument syntax
//! of one compiler family (GCC, Clang, MSVC, or a user override). The
//! toolchain is chosen once at startup and shared read-only afterwards.
//!
//! Toolchain detection priority:
//! 1. Explicit backend in the config file (`.keel/config.toml` or `~/.keel/config.toml`)
//! 2. Configured compiler path
//! 3. Environment variables (CXX, CC)
//! 4. Auto-detection (searching PATH for common compilers)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::command::{ActionKind, CommandValue, Fragment, Role};
use super::error::BuildError;
use super::token::{ArgumentToken, CompilerFlag};

mod custom;
mod detect;
mod gcc;
mod msvc;

pub use custom::CustomToolchain;
pub use detect::{detect_compiler_family, detect_toolchain};
pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// File extensions treated as C/C++ translation units.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];

/// The platform/family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainPlatform {
    /// Get the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }

    /// Check if this family uses GCC-style (`-I`, `-o`) arguments.
    pub fn is_gcc_like(&self) -> bool {
        !matches!(self, ToolchainPlatform::Msvc)
    }
}

impl fmt::Display for ToolchainPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcc" | "gnu" => Ok(ToolchainPlatform::Gcc),
            "clang" | "llvm" => Ok(ToolchainPlatform::Clang),
            "apple-clang" | "appleclang" => Ok(ToolchainPlatform::AppleClang),
            "msvc" | "cl" => Ok(ToolchainPlatform::Msvc),
            _ => Err(format!(
                "unknown toolchain '{}'; expected 'gcc', 'clang', 'apple-clang', or 'msvc'",
                s
            )),
        }
    }
}

/// Static or dynamic library, for extension normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    Static,
    Dynamic,
}

/// Trait for toolchain implementations.
///
/// Implementors provide the per-family tables (`preamble`, `translate`,
/// extensions); the provided methods build commands on top of them.
pub trait Toolchain: Send + Sync + fmt::Debug {
    /// Get the toolchain platform.
    fn platform(&self) -> ToolchainPlatform;

    /// Name used in diagnostics.
    fn name(&self) -> String {
        self.platform().as_str().to_string()
    }

    /// Fragments every command of `kind` starts with (program and fixed switches).
    fn preamble(&self, kind: ActionKind) -> Vec<Fragment>;

    /// Spell one token for a command of `kind`.
    ///
    /// Returns [`BuildError::UnsupportedFeature`] when the family has no
    /// mapping; implementations must never silently drop a token.
    fn translate(&self, kind: ActionKind, token: &ArgumentToken)
        -> Result<Vec<Fragment>, BuildError>;

    /// Marker placed between compile and link arguments in a merged command.
    fn link_separator(&self) -> Option<&str> {
        None
    }

    /// Get the object file extension.
    fn object_extension(&self) -> &str;

    /// Get the static library extension.
    fn static_lib_extension(&self) -> &str;

    /// Get the shared library extension.
    fn shared_lib_extension(&self) -> &str;

    /// Get the executable extension.
    fn exe_extension(&self) -> &str;

    /// Extensions of files this toolchain compiles.
    fn source_extensions(&self) -> &[&str] {
        SOURCE_EXTENSIONS
    }

    /// Start a new command of `kind` running in `dir`.
    fn command(&self, kind: ActionKind, dir: &Path) -> CommandValue {
        CommandValue::new(kind, dir).extend(self.preamble(kind))
    }

    /// Apply one token to a command, returning the extended command.
    fn apply(&self, cmd: &CommandValue, token: &ArgumentToken) -> Result<CommandValue, BuildError> {
        match (cmd.kind(), token) {
            (ActionKind::Compile, ArgumentToken::LinkMerge(link)) => Ok(self.merge_link(cmd, link)),
            (ActionKind::Compile, ArgumentToken::CompilerFlag(CompilerFlag::KeepLinker)) => {
                Ok(cmd.clone().without(Role::CompileOnly))
            }
            (ActionKind::Compile, ArgumentToken::CompilerFlag(CompilerFlag::NoObjectOutput)) => {
                Ok(cmd.clone().without(Role::ObjectOutput).reset_outputs())
            }
            (kind, token) => {
                let fragments = self.translate(kind, token)?;
                Ok(cmd.clone().extend(fragments))
            }
        }
    }

    /// Fold a link command into a compile command so one invocation does both.
    ///
    /// The compile-only switch and the object output are dropped, the link
    /// arguments (minus the link program) are appended after the family's
    /// separator, and an executable name is inferred from the first source
    /// when the link command does not name one.
    fn merge_link(&self, compile: &CommandValue, link: &CommandValue) -> CommandValue {
        let inferred = match link.executable_output() {
            Some(_) => None,
            None => compile
                .first_source()
                .map(|source| default_executable(source, self.exe_extension())),
        };

        let mut merged = compile
            .clone()
            .without(Role::CompileOnly)
            .without(Role::ObjectOutput)
            .reset_outputs();

        if let Some(separator) = self.link_separator() {
            merged = merged.push(Fragment::text(Role::Separator, separator));
        }

        let carried = link
            .fragments()
            .iter()
            .filter(|f| !matches!(f.role, Role::Program | Role::Preamble))
            .cloned();
        merged = merged.extend(carried).absorb_staleness(link);

        if let Some(exe) = inferred {
            match self.translate(ActionKind::Link, &ArgumentToken::ExecutableFile(exe)) {
                Ok(fragments) => merged = merged.extend(fragments),
                Err(e) => tracing::warn!("{}", e),
            }
        }

        merged
    }

    /// Check if `path` is a translation unit for this toolchain.
    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.source_extensions()
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Object file for `source` inside `obj_root` (`<stem>.<obj ext>`).
    fn object_path(&self, obj_root: &Path, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        obj_root.join(format!("{}.{}", stem, self.object_extension()))
    }

    /// Rewrite a library path to the host extension for its kind.
    fn normalize_library(&self, path: &Path, kind: LibraryKind) -> PathBuf {
        let ext = match kind {
            LibraryKind::Static => self.static_lib_extension(),
            LibraryKind::Dynamic => self.shared_lib_extension(),
        };
        path.with_extension(ext)
    }
}

/// Default executable name for a source file: same stem, executable extension.
pub fn default_executable(source: &Path, exe_extension: &str) -> PathBuf {
    source.with_extension(exe_extension)
}

/// Body of a macro definition: `NAME` or `NAME=value`.
pub(crate) fn macro_body(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if v.chars().any(char::is_whitespace) => format!("{}=\"{}\"", name, v),
        Some(v) => format!("{}={}", name, v),
        None => name.to_string(),
    }
}

/// Directory containing `path`, if it has a non-empty one.
pub(crate) fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}
