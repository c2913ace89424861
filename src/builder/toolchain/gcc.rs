//! GCC/Clang toolchain implementation.

use std::path::PathBuf;

use crate::builder::command::{ActionKind, Fragment, Role};
use crate::builder::error::BuildError;
use crate::builder::token::{ArgumentToken, CompilerFlag, LinkerFlag};

use super::{macro_body, parent_dir, LibraryKind, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C++ compiler driver
    pub compiler: PathBuf,
    /// Path to the archiver
    pub archiver: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(compiler: PathBuf, archiver: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain {
            compiler,
            archiver,
            family,
        }
    }

    fn program(&self, kind: ActionKind) -> Option<Fragment> {
        let program = match kind {
            ActionKind::Compile | ActionKind::Link => &self.compiler,
            ActionKind::Archive => &self.archiver,
            ActionKind::Plain => return None,
        };
        Some(Fragment::text(Role::Program, program.display().to_string()))
    }

    fn compiler_flag(&self, flag: CompilerFlag) -> Option<String> {
        let text = match flag {
            CompilerFlag::OptimizeSpeed => "-O2".to_string(),
            CompilerFlag::OptimizeSpace => "-Os".to_string(),
            CompilerFlag::Debug => "-g".to_string(),
            CompilerFlag::PositionIndependentCode => "-fPIC".to_string(),
            CompilerFlag::Std(std) => format!("-std={}", std.as_flag_value()),
            CompilerFlag::KeepLinker | CompilerFlag::NoObjectOutput => return None,
        };
        Some(text)
    }

    fn library(&self, path: &std::path::Path, kind: LibraryKind) -> Vec<Fragment> {
        let lib = self.normalize_library(path, kind);
        let mut fragments = Vec::new();
        if let Some(dir) = parent_dir(&lib) {
            fragments.push(Fragment::arg("-L"));
            fragments.push(Fragment::path(Role::Argument, dir).joined());
        }
        fragments.push(Fragment::path(Role::Argument, lib.clone()).input());
        fragments
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn preamble(&self, kind: ActionKind) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = self.program(kind).into_iter().collect();
        match kind {
            ActionKind::Compile => fragments.push(Fragment::text(Role::CompileOnly, "-c")),
            ActionKind::Archive => fragments.push(Fragment::text(Role::Preamble, "rcs")),
            ActionKind::Link | ActionKind::Plain => {}
        }
        fragments
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
                Fragment::text(Role::ObjectOutput, "-o"),
                Fragment::path(Role::ObjectOutput, p.clone()).output(),
            ],
            (Compile, T::IncludeDirectory(p)) => vec![
                Fragment::arg("-I"),
                Fragment::path(Role::Argument, p.clone()).joined(),
            ],
            (Compile, T::MacroDefinition { name, value }) => {
                vec![Fragment::arg(format!("-D{}", macro_body(name, value.as_deref())))]
            }
            (Compile, T::PrecompiledHeader { header, artifact }) => match self.family {
                ToolchainPlatform::Gcc => vec![
                    Fragment::arg("-include"),
                    Fragment::path(Role::Argument, header.clone()).input(),
                ],
                _ => vec![
                    Fragment::arg("-include-pch"),
                    Fragment::path(Role::Argument, artifact.clone()).input(),
                ],
            },
            (Compile, T::CompilerFlag(flag)) => match self.compiler_flag(*flag) {
                Some(text) => vec![Fragment::arg(text)],
                None => return Err(BuildError::unsupported(self.name(), kind, token.describe())),
            },

            (Link | Archive, T::ObjectFile(p)) => {
                vec![Fragment::path(Role::Argument, p.clone()).input()]
            }

            (Link, T::StaticLibraryFile(p)) => self.library(p, LibraryKind::Static),
            (Link, T::DynamicLibraryFile(p)) => self.library(p, LibraryKind::Dynamic),
            (Link, T::ExecutableFile(p)) => vec![
                Fragment::text(Role::ExecutableOutput, "-o"),
                Fragment::path(Role::ExecutableOutput, p.clone()).output(),
            ],
            (Link, T::LinkerFlag(LinkerFlag::OutputDynamicLibrary)) => vec![Fragment::arg("-shared")],
            (Link, T::LinkerFlag(LinkerFlag::Debug)) => vec![Fragment::arg("-g")],

            (Archive, T::StaticLibraryFile(p)) => {
                let lib = self.normalize_library(p, LibraryKind::Static);
                vec![Fragment::path(Role::ArchiveOutput, lib).output()]
            }

            _ => return Err(BuildError::unsupported(self.name(), kind, token.describe())),
        };
        Ok(fragments)
    }

    fn object_extension(&self) -> &str {
        "o"
    }

    fn static_lib_extension(&self) -> &str {
        "a"
    }

    fn shared_lib_extension(&self) -> &str {
        if cfg!(windows) {
            "dll"
        } else if cfg!(target_os = "macos") || self.family == ToolchainPlatform::AppleClang {
            "dylib"
        } else {
            "so"
        }
    }

    fn exe_extension(&self) -> &str {
        std::env::consts::EXE_EXTENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::token::LanguageStandard;
    use std::path::Path;

    fn toolchain(family: ToolchainPlatform) -> GccToolchain {
        GccToolchain::new(PathBuf::from("g++"), PathBuf::from("ar"), family)
    }

    #[test]
    fn test_compile_command() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        let cmd = tc
            .command(ActionKind::Compile, Path::new("."))
            .add(&tc, ArgumentToken::SourceFile(PathBuf::from("src/main.cpp")))
            .add(&tc, ArgumentToken::ObjectFile(PathBuf::from("obj/main.o")))
            .add(&tc, ArgumentToken::IncludeDirectory(PathBuf::from("include")))
            .add(&tc, ArgumentToken::define("VERSION", "1"))
            .add(
                &tc,
                ArgumentToken::MacroDefinition {
                    name: "DEBUG".to_string(),
                    value: None,
                },
            )
            .add(&tc, CompilerFlag::OptimizeSpeed)
            .add(&tc, CompilerFlag::PositionIndependentCode)
            .add(&tc, CompilerFlag::Std(LanguageStandard::Cxx17));

        assert_eq!(
            cmd.text(),
            "g++ -c \"src/main.cpp\" -o \"obj/main.o\" -I\"include\" -DVERSION=1 -DDEBUG -O2 -fPIC -std=c++17"
        );
    }

    #[test]
    fn test_precompiled_header_by_family() {
        let token = ArgumentToken::PrecompiledHeader {
            header: PathBuf::from("pch.h"),
            artifact: PathBuf::from("pch.h.pch"),
        };

        let gcc = toolchain(ToolchainPlatform::Gcc);
        let cmd = gcc.command(ActionKind::Compile, Path::new(".")).add(&gcc, token.clone());
        assert_eq!(cmd.text(), "g++ -c -include \"pch.h\"");

        let clang = toolchain(ToolchainPlatform::Clang);
        let cmd = clang.command(ActionKind::Compile, Path::new(".")).add(&clang, token);
        assert_eq!(cmd.text(), "g++ -c -include-pch \"pch.h.pch\"");
    }

    #[test]
    fn test_link_command() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        let cmd = tc
            .command(ActionKind::Link, Path::new("."))
            .add(&tc, ArgumentToken::ObjectFile(PathBuf::from("obj/a.o")))
            .add(&tc, ArgumentToken::StaticLibraryFile(PathBuf::from("deps/libz.lib")))
            .add(&tc, LinkerFlag::OutputDynamicLibrary)
            .add(&tc, LinkerFlag::Debug)
            .add(&tc, ArgumentToken::ExecutableFile(PathBuf::from("bin/app")));

        assert_eq!(
            cmd.text(),
            "g++ \"obj/a.o\" -L\"deps\" \"deps/libz.a\" -shared -g -o \"bin/app\""
        );
        assert_eq!(cmd.executable_output(), Some(Path::new("bin/app")));
    }

    #[test]
    fn test_library_without_directory() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        let cmd = tc
            .command(ActionKind::Link, Path::new("."))
            .add(&tc, ArgumentToken::StaticLibraryFile(PathBuf::from("libm.a")));
        assert_eq!(cmd.text(), "g++ \"libm.a\"");
    }

    #[test]
    fn test_archive_command_puts_library_first() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        let cmd = tc
            .command(ActionKind::Archive, Path::new("."))
            .add(&tc, ArgumentToken::ObjectFile(PathBuf::from("a.o")))
            .add(&tc, ArgumentToken::ObjectFile(PathBuf::from("b.o")))
            .add(&tc, ArgumentToken::StaticLibraryFile(PathBuf::from("libfoo")));
        assert_eq!(cmd.text(), "ar rcs \"libfoo.a\" \"a.o\" \"b.o\"");
    }

    #[test]
    fn test_unsupported_tokens() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        let link = tc.command(ActionKind::Link, Path::new("."));
        assert!(link.try_add(&tc, CompilerFlag::OptimizeSpeed).unwrap_err().is_unsupported());
        assert!(link
            .try_add(&tc, ArgumentToken::IncludeDirectory(PathBuf::from("inc")))
            .unwrap_err()
            .is_unsupported());

        let archive = tc.command(ActionKind::Archive, Path::new("."));
        assert!(archive
            .try_add(&tc, ArgumentToken::ExecutableFile(PathBuf::from("x")))
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn test_custom_flag_anywhere() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        for kind in [ActionKind::Compile, ActionKind::Link, ActionKind::Archive] {
            let cmd = tc
                .command(kind, Path::new("."))
                .try_add(&tc, ArgumentToken::CustomFlag("-Wall".to_string()))
                .unwrap();
            assert!(cmd.text().ends_with(" -Wall"));
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_shared_library_extension_on_windows() {
        for family in [ToolchainPlatform::Gcc, ToolchainPlatform::Clang] {
            let tc = toolchain(family);
            assert_eq!(tc.shared_lib_extension(), "dll");
            assert_eq!(
                tc.normalize_library(Path::new("lib/z.so"), LibraryKind::Dynamic),
                PathBuf::from("lib/z.dll")
            );
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_shared_library_extension_on_linux() {
        let tc = toolchain(ToolchainPlatform::Gcc);
        assert_eq!(tc.shared_lib_extension(), "so");
        assert_eq!(
            tc.normalize_library(Path::new("lib/z.dll"), LibraryKind::Dynamic),
            PathBuf::from("lib/z.so")
        );
        assert_eq!(toolchain(ToolchainPlatform::AppleClang).shared_lib_extension(), "dylib");
    }
}
