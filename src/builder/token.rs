//! Semantic build arguments.
//!
//! An [`ArgumentToken`] says *what* an argument means (a source file, an
//! include directory, "optimize for speed") without saying how any
//! particular compiler spells it. Toolchains translate tokens into
//! fragments when they are added to a [`CommandValue`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::command::CommandValue;

/// Language standard selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LanguageStandard {
    #[serde(rename = "c99")]
    C99,
    #[serde(rename = "c11")]
    C11,
    #[serde(rename = "c17")]
    C17,
    #[serde(rename = "c++11", alias = "cpp11")]
    Cxx11,
    #[serde(rename = "c++14", alias = "cpp14")]
    Cxx14,
    #[serde(rename = "c++17", alias = "cpp17")]
    Cxx17,
    #[serde(rename = "c++20", alias = "cpp20")]
    Cxx20,
    #[serde(rename = "c++23", alias = "cpp23")]
    Cxx23,
}

impl LanguageStandard {
    /// Get the standard as a GCC-style flag value (e.g., "c++17").
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            LanguageStandard::C99 => "c99",
            LanguageStandard::C11 => "c11",
            LanguageStandard::C17 => "c17",
            LanguageStandard::Cxx11 => "c++11",
            LanguageStandard::Cxx14 => "c++14",
            LanguageStandard::Cxx17 => "c++17",
            LanguageStandard::Cxx20 => "c++20",
            LanguageStandard::Cxx23 => "c++23",
        }
    }

    /// Get the MSVC `/std:` value, if MSVC has one for this standard.
    pub fn as_msvc_flag_value(&self) -> Option<&'static str> {
        match self {
            LanguageStandard::C99 | LanguageStandard::Cxx11 => None,
            LanguageStandard::C11 => Some("c11"),
            LanguageStandard::C17 => Some("c17"),
            LanguageStandard::Cxx14 => Some("c++14"),
            LanguageStandard::Cxx17 => Some("c++17"),
            LanguageStandard::Cxx20 => Some("c++20"),
            LanguageStandard::Cxx23 => Some("c++latest"),
        }
    }
}

impl std::str::FromStr for LanguageStandard {
    type Err = LanguageStandardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "c99" => Ok(LanguageStandard::C99),
            "c11" => Ok(LanguageStandard::C11),
            "c17" => Ok(LanguageStandard::C17),
            "c++11" | "cpp11" => Ok(LanguageStandard::Cxx11),
            "c++14" | "cpp14" => Ok(LanguageStandard::Cxx14),
            "c++17" | "cpp17" => Ok(LanguageStandard::Cxx17),
            "c++20" | "cpp20" => Ok(LanguageStandard::Cxx20),
            "c++23" | "cpp23" => Ok(LanguageStandard::Cxx23),
            _ => Err(LanguageStandardParseError(s.to_string())),
        }
    }
}

impl fmt::Display for LanguageStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag_value())
    }
}

/// Error returned when parsing an invalid language standard string.
#[derive(Debug, Clone)]
pub struct LanguageStandardParseError(pub String);

impl fmt::Display for LanguageStandardParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid language standard '{}', valid values: c99, c11, c17, c++11, c++14, c++17, c++20, c++23",
            self.0
        )
    }
}

impl std::error::Error for LanguageStandardParseError {}

/// Abstract compiler flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerFlag {
    OptimizeSpeed,
    OptimizeSpace,
    Debug,
    PositionIndependentCode,
    /// Select a language standard.
    Std(LanguageStandard),
    /// Drop the "compile only" switch so the invocation also links.
    KeepLinker,
    /// Drop the object-file output argument.
    NoObjectOutput,
}

impl CompilerFlag {
    /// Kebab-case name used by configuration flag tables.
    pub fn key(&self) -> String {
        match self {
            CompilerFlag::OptimizeSpeed => "optimize-speed".to_string(),
            CompilerFlag::OptimizeSpace => "optimize-space".to_string(),
            CompilerFlag::Debug => "debug".to_string(),
            CompilerFlag::PositionIndependentCode => "position-independent-code".to_string(),
            CompilerFlag::Std(std) => format!("std={}", std.as_flag_value()),
            CompilerFlag::KeepLinker => "keep-linker".to_string(),
            CompilerFlag::NoObjectOutput => "no-object-output".to_string(),
        }
    }
}

/// Abstract linker flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkerFlag {
    OutputDynamicLibrary,
    Debug,
}

impl LinkerFlag {
    /// Kebab-case name used by configuration flag tables.
    pub fn key(&self) -> &'static str {
        match self {
            LinkerFlag::OutputDynamicLibrary => "output-dynamic-library",
            LinkerFlag::Debug => "debug",
        }
    }
}

/// One semantic argument of a build action.
#[derive(Debug, Clone)]
pub enum ArgumentToken {
    SourceFile(PathBuf),
    ObjectFile(PathBuf),
    IncludeDirectory(PathBuf),
    MacroDefinition {
        name: String,
        value: Option<String>,
    },
    /// A static library; the extension is normalized to `.a`/`.lib`.
    StaticLibraryFile(PathBuf),
    /// A dynamic library; the extension is normalized to `.so`/`.dylib`/`.dll`.
    DynamicLibraryFile(PathBuf),
    ExecutableFile(PathBuf),
    PrecompiledHeader {
        header: PathBuf,
        artifact: PathBuf,
    },
    CompilerFlag(CompilerFlag),
    LinkerFlag(LinkerFlag),
    /// Raw text passed through untranslated.
    CustomFlag(String),
    /// Fold a fully formed link command into a compile command.
    LinkMerge(Box<CommandValue>),
}

impl ArgumentToken {
    /// Short description used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ArgumentToken::SourceFile(_) => "source file".to_string(),
            ArgumentToken::ObjectFile(_) => "object file".to_string(),
            ArgumentToken::IncludeDirectory(_) => "include directory".to_string(),
            ArgumentToken::MacroDefinition { .. } => "macro definition".to_string(),
            ArgumentToken::StaticLibraryFile(_) => "static library".to_string(),
            ArgumentToken::DynamicLibraryFile(_) => "dynamic library".to_string(),
            ArgumentToken::ExecutableFile(_) => "executable output".to_string(),
            ArgumentToken::PrecompiledHeader { .. } => "precompiled header".to_string(),
            ArgumentToken::CompilerFlag(flag) => format!("compiler flag `{}`", flag.key()),
            ArgumentToken::LinkerFlag(flag) => format!("linker flag `{}`", flag.key()),
            ArgumentToken::CustomFlag(_) => "custom flag".to_string(),
            ArgumentToken::LinkMerge(_) => "link merge".to_string(),
        }
    }

    /// Convenience constructor for a macro with a value.
    pub fn define(name: impl Into<String>, value: impl Into<String>) -> Self {
        ArgumentToken::MacroDefinition {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Convenience constructor for a link merge.
    pub fn link_merge(link: CommandValue) -> Self {
        ArgumentToken::LinkMerge(Box::new(link))
    }
}

impl From<CompilerFlag> for ArgumentToken {
    fn from(flag: CompilerFlag) -> Self {
        ArgumentToken::CompilerFlag(flag)
    }
}

impl From<LinkerFlag> for ArgumentToken {
    fn from(flag: LinkerFlag) -> Self {
        ArgumentToken::LinkerFlag(flag)
    }
}
