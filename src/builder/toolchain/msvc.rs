//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::builder::command::{ActionKind, Fragment, Role};
use crate::builder::error::BuildError;
use crate::builder::token::{ArgumentToken, CompilerFlag, LinkerFlag};

use super::{macro_body, parent_dir, LibraryKind, Toolchain, ToolchainPlatform};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
}

impl MsvcToolchain {
    /// Create a new MSVC toolchain.
    pub fn new(cl: PathBuf, lib: PathBuf, link: PathBuf) -> Self {
        MsvcToolchain { cl, lib, link }
    }

    fn compiler_flag(&self, flag: CompilerFlag) -> Option<String> {
        let text = match flag {
            CompilerFlag::OptimizeSpeed => "/O2".to_string(),
            CompilerFlag::OptimizeSpace => "/O1".to_string(),
            CompilerFlag::Debug => "/Zi".to_string(),
            CompilerFlag::Std(std) => format!("/std:{}", std.as_msvc_flag_value()?),
            CompilerFlag::PositionIndependentCode
            | CompilerFlag::KeepLinker
            | CompilerFlag::NoObjectOutput => return None,
        };
        Some(text)
    }

    // Both static and dynamic libraries link through a `.lib`; for a DLL
    // that is its import library.
    fn library(&self, path: &Path) -> Vec<Fragment> {
        let lib = self.normalize_library(path, LibraryKind::Static);
        let mut fragments = Vec::new();
        if let Some(dir) = parent_dir(&lib) {
            fragments.push(Fragment::arg("/LIBPATH:"));
            fragments.push(Fragment::path(Role::Argument, dir).joined());
        }
        fragments.push(Fragment::path(Role::Argument, lib.clone()).input());
        fragments
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn preamble(&self, kind: ActionKind) -> Vec<Fragment> {
        let program = |p: &PathBuf| Fragment::text(Role::Program, p.display().to_string());
        match kind {
            ActionKind::Compile => vec![
                program(&self.cl),
                Fragment::text(Role::Preamble, "/nologo"),
                Fragment::text(Role::CompileOnly, "/c"),
                Fragment::text(Role::Preamble, "/EHsc"),
            ],
            ActionKind::Link => vec![program(&self.link), Fragment::text(Role::Preamble, "/nologo")],
            ActionKind::Archive => vec![program(&self.lib), Fragment::text(Role::Preamble, "/nologo")],
            ActionKind::Plain => Vec::new(),
        }
    }

    fn translate(
        &self,
        kind: ActionKind,
        token: &ArgumentToken,
    ) -> Result<Vec<Fragment>, BuildError> {
        use ActionKind::*;
        use ArgumentToken as T;

        let fragments = match (kind, token) {
            (_, T::CustomFlag(text)) => vec![Fragment::arg(text.clone())],

            (Compile, T::SourceFile(p)) => vec![Fragment::path(Role::Source, p.clone()).input()],
            (Compile, T::ObjectFile(p)) => vec![
                Fragment::text(Role::ObjectOutput, "/Fo"),
                Fragment::path(Role::ObjectOutput, p.clone()).joined().output(),
            ],
            (Compile, T::IncludeDirectory(p)) => vec![
                Fragment::arg("/I"),
                Fragment::path(Role::Argument, p.clone()).joined(),
            ],
            (Compile, T::MacroDefinition { name, value }) => {
                vec![Fragment::arg(format!("/D{}", macro_body(name, value.as_deref())))]
            }
            (Compile, T::PrecompiledHeader { header, artifact }) => vec![
                Fragment::arg("/Yu"),
                Fragment::path(Role::Argument, header.clone()).joined().input(),
                Fragment::arg("/Fp"),
                Fragment::path(Role::Argument, artifact.clone()).joined().input(),
            ],
            (Compile, T::CompilerFlag(flag)) => match self.compiler_flag(*flag) {
                Some(text) => vec![Fragment::arg(text)],
                None => return Err(BuildError::unsupported(self.name(), kind, token.describe())),
            },

            (Link | Archive, T::ObjectFile(p)) => {
                vec![Fragment::path(Role::Argument, p.clone()).input()]
            }

            (Link, T::StaticLibraryFile(p) | T::DynamicLibraryFile(p)) => self.library(p),
            (Link, T::ExecutableFile(p)) => vec![
                Fragment::text(Role::ExecutableOutput, "/OUT:"),
                Fragment::path(Role::ExecutableOutput, p.clone()).joined().output(),
            ],
            (Link, T::LinkerFlag(LinkerFlag::OutputDynamicLibrary)) => vec![Fragment::arg("/DLL")],
            (Link, T::LinkerFlag(LinkerFlag::Debug)) => vec![Fragment::arg("/DEBUG")],

            (Archive, T::StaticLibraryFile(p)) => {
                let lib = self.normalize_library(p, LibraryKind::Static);
                vec![
                    Fragment::text(Role::ArchiveOutput, "/OUT:"),
                    Fragment::path(Role::ArchiveOutput, lib).joined().output(),
                ]
            }

            _ => return Err(BuildError::unsupported(self.name(), kind, token.describe())),
        };
        Ok(fragments)
    }

    fn link_separator(&self) -> Option<&str> {
        Some("/link")
    }

    fn object_extension(&self) -> &str {
        "obj"
    }

    fn static_lib_extension(&self) -> &str {
        "lib"
    }

    fn shared_lib_extension(&self) -> &str {
        "dll"
    }

    fn exe_extension(&self) -> &str {
        "exe"
    }
}
