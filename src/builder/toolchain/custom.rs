//! User-overridden toolchain.
//!
//! Wraps a detected backend and replaces the program of each action kind
//! and selected flag spellings with text from the configuration file.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::command::{ActionKind, Fragment, Role};
use crate::builder::error::BuildError;
use crate::builder::token::ArgumentToken;

use super::{Toolchain, ToolchainPlatform};

/// A toolchain with configured program and flag overrides.
#[derive(Debug, Clone)]
pub struct CustomToolchain {
    base: Arc<dyn Toolchain>,
    compile_program: Option<String>,
    link_program: Option<String>,
    archive_program: Option<String>,
    compiler_flags: BTreeMap<String, String>,
    linker_flags: BTreeMap<String, String>,
}

impl CustomToolchain {
    /// Wrap `base` with no overrides.
    pub fn new(base: Arc<dyn Toolchain>) -> Self {
        CustomToolchain {
            base,
            compile_program: None,
            link_program: None,
            archive_program: None,
            compiler_flags: BTreeMap::new(),
            linker_flags: BTreeMap::new(),
        }
    }

    /// Replace the program text used for `kind`.
    pub fn with_program(mut self, kind: ActionKind, program: impl Into<String>) -> Self {
        let program = Some(program.into());
        match kind {
            ActionKind::Compile => self.compile_program = program,
            ActionKind::Link => self.link_program = program,
            ActionKind::Archive => self.archive_program = program,
            ActionKind::Plain => {}
        }
        self
    }

    /// Override the spelling of a compiler flag, keyed by its kebab-case name.
    ///
    /// An empty spelling suppresses the flag.
    pub fn with_compiler_flag(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.compiler_flags.insert(key.into(), text.into());
        self
    }

    /// Override the spelling of a linker flag, keyed by its kebab-case name.
    pub fn with_linker_flag(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.linker_flags.insert(key.into(), text.into());
        self
    }

    /// The wrapped toolchain.
    pub fn base(&self) -> &Arc<dyn Toolchain> {
        &self.base
    }

    /// Check if any override is configured.
    pub fn has_overrides(&self) -> bool {
        self.compile_program.is_some()
            || self.link_program.is_some()
            || self.archive_program.is_some()
            || !self.compiler_flags.is_empty()
            || !self.linker_flags.is_empty()
    }

    fn program(&self, kind: ActionKind) -> Option<&str> {
        match kind {
            ActionKind::Compile => self.compile_program.as_deref(),
            ActionKind::Link => self.link_program.as_deref(),
            ActionKind::Archive => self.archive_program.as_deref(),
            ActionKind::Plain => None,
        }
    }

    fn flag_override(&self, kind: ActionKind, token: &ArgumentToken) -> Option<&str> {
        match (kind, token) {
            (ActionKind::Compile, ArgumentToken::CompilerFlag(flag)) => {
                self.compiler_flags.get(&flag.key()).map(String::as_str)
            }
            (ActionKind::Link, ArgumentToken::LinkerFlag(flag)) => {
                self.linker_flags.get(flag.key()).map(String::as_str)
            }
            _ => None,
        }
    }
}

impl Toolchain for CustomToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.base.platform()
    }

    fn name(&self) -> String {
        format!("custom({})", self.base.name())
    }

    fn preamble(&self, kind: ActionKind) -> Vec<Fragment> {
        let mut fragments = self.base.preamble(kind);
        if let Some(program) = self.program(kind) {
            match fragments.iter_mut().find(|f| f.role == Role::Program) {
                Some(existing) => *existing = Fragment::text(Role::Program, program),
                None => fragments.insert(0, Fragment::text(Role::Program, program)),
            }
        }
        fragments
    }

    fn translate(
        &self,
        kind: ActionKind,
        token: &ArgumentToken,
    ) -> Result<Vec<Fragment>, BuildError> {
        match self.flag_override(kind, token) {
            Some("") => Ok(Vec::new()),
            Some(text) => Ok(vec![Fragment::arg(text)]),
            None => self.base.translate(kind, token),
        }
    }

    fn link_separator(&self) -> Option<&str> {
        self.base.link_separator()
    }

    fn object_extension(&self) -> &str {
        self.base.object_extension()
    }

    fn static_lib_extension(&self) -> &str {
        self.base.static_lib_extension()
    }

    fn shared_lib_extension(&self) -> &str {
        self.base.shared_lib_extension()
    }

    fn exe_extension(&self) -> &str {
        self.base.exe_extension()
    }
}
