//! Toolchain detection functions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use which::which;

use crate::builder::command::ActionKind;
use crate::util::config::ToolchainSettings;
use crate::util::process::ProcessBuilder;

use super::{CustomToolchain, GccToolchain, MsvcToolchain, Toolchain, ToolchainPlatform};

/// Detect the toolchain to use for this process.
///
/// Tries the following, in order:
/// 1. An explicit `toolchain.backend` in the configuration
/// 2. A configured `toolchain.compiler`
/// 3. Environment variables (CXX, CC)
/// 4. PATH probing: `cl` on Windows, then `c++`, `g++`, `clang++`
///
/// The result is wrapped in a [`CustomToolchain`] when the configuration
/// carries program or flag overrides.
pub fn detect_toolchain(settings: &ToolchainSettings) -> Result<Arc<dyn Toolchain>> {
    let base = detect_base(settings)?;
    tracing::debug!("selected toolchain: {}", base.name());

    if !settings.has_overrides() {
        return Ok(base);
    }

    let mut custom = CustomToolchain::new(base);
    let programs = [
        (ActionKind::Compile, &settings.compile_program),
        (ActionKind::Link, &settings.link_program),
        (ActionKind::Archive, &settings.archive_program),
    ];
    for (kind, program) in programs {
        if let Some(program) = program {
            custom = custom.with_program(kind, program.clone());
        }
    }
    for (key, text) in &settings.compiler_flags {
        custom = custom.with_compiler_flag(key.clone(), text.clone());
    }
    for (key, text) in &settings.linker_flags {
        custom = custom.with_linker_flag(key.clone(), text.clone());
    }
    Ok(Arc::new(custom))
}

fn detect_base(settings: &ToolchainSettings) -> Result<Arc<dyn Toolchain>> {
    if let Some(platform) = settings.platform()? {
        let compiler = settings
            .compiler
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_compiler(platform)));
        return Ok(build(compiler, platform, settings.archiver.clone()));
    }

    if let Some(compiler) = &settings.compiler {
        let family = detect_compiler_family(compiler)?;
        tracing::debug!("using compiler from config: {}", compiler.display());
        return Ok(build(compiler.clone(), family, settings.archiver.clone()));
    }

    if let Some(compiler) = std::env::var_os("CXX").or_else(|| std::env::var_os("CC")) {
        let compiler = PathBuf::from(compiler);
        let family = detect_compiler_family(&compiler)?;
        return Ok(build(compiler, family, settings.archiver.clone()));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(cl) = which("cl") {
            return Ok(build(cl, ToolchainPlatform::Msvc, settings.archiver.clone()));
        }
    }

    if let Ok(compiler) = which("c++")
        .or_else(|_| which("g++"))
        .or_else(|_| which("clang++"))
    {
        let family = detect_compiler_family(&compiler)?;
        return Ok(build(compiler, family, settings.archiver.clone()));
    }

    bail!(
        "no C++ compiler found\n\
         \n\
         keel requires a C++ compiler (g++, clang++, or cl).\n\
         Set the CXX environment variable, set `toolchain.compiler` in .keel/config.toml,\n\
         or install a compiler."
    )
}

fn default_compiler(platform: ToolchainPlatform) -> &'static str {
    match platform {
        ToolchainPlatform::Gcc => "g++",
        ToolchainPlatform::Clang | ToolchainPlatform::AppleClang => "clang++",
        ToolchainPlatform::Msvc => "cl",
    }
}

fn build(
    compiler: PathBuf,
    platform: ToolchainPlatform,
    archiver: Option<PathBuf>,
) -> Arc<dyn Toolchain> {
    match platform {
        ToolchainPlatform::Msvc => {
            let lib = archiver.unwrap_or_else(|| which("lib").unwrap_or_else(|_| PathBuf::from("lib")));
            let link = which("link").unwrap_or_else(|_| PathBuf::from("link"));
            Arc::new(MsvcToolchain::new(compiler, lib, link))
        }
        family => {
            let ar = archiver.unwrap_or_else(find_archiver);
            Arc::new(GccToolchain::new(compiler, ar, family))
        }
    }
}

/// Find a GCC-style archiver: `AR`, then `ar`, then `llvm-ar`, else the bare name `ar`.
fn find_archiver() -> PathBuf {
    std::env::var_os("AR")
        .map(PathBuf::from)
        .or_else(|| which("ar").ok())
        .or_else(|| which("llvm-ar").ok())
        .unwrap_or_else(|| PathBuf::from("ar"))
}

/// Detect whether the compiler is GCC, Clang, Apple Clang, or MSVC.
pub fn detect_compiler_family(compiler: &Path) -> Result<ToolchainPlatform> {
    // Check binary name first
    let name = compiler
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name == "cl" || name == "clang-cl" {
        return Ok(ToolchainPlatform::Msvc);
    } else if name.contains("clang") {
        return detect_clang_variant(compiler);
    } else if name.contains("gcc") || name.contains("g++") {
        return Ok(ToolchainPlatform::Gcc);
    }

    // Try to detect from --version output
    if let Some(stdout) = version_text(compiler) {
        if stdout.contains("clang") {
            return detect_clang_variant(compiler);
        } else if stdout.contains("gcc") || stdout.contains("free software foundation") {
            return Ok(ToolchainPlatform::Gcc);
        }
    }

    // Default to GCC
    Ok(ToolchainPlatform::Gcc)
}

/// Detect if Clang is Apple Clang or regular Clang.
fn detect_clang_variant(compiler: &Path) -> Result<ToolchainPlatform> {
    match version_text(compiler) {
        Some(stdout) if stdout.contains("apple") => Ok(ToolchainPlatform::AppleClang),
        _ => Ok(ToolchainPlatform::Clang),
    }
}

/// Lowercased `--version` output of `compiler`, if it runs.
fn version_text(compiler: &Path) -> Option<String> {
    let output = ProcessBuilder::new(compiler).arg("--version").exec().ok()?;
    Some(String::from_utf8_lossy(&output.stdout).to_lowercase())
}
