//! Build error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use super::command::ActionKind;

/// Conditions raised while composing or executing build actions.
///
/// Missing inputs and outputs are never returned as errors; they are logged
/// and recovered by forcing the action to run. The remaining variants are
/// surfaced to the caller.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("declared input `{}` does not exist", .path.display())]
    MissingInput { path: PathBuf },

    #[error("declared output `{}` does not exist", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("{toolchain} has no mapping for {feature} in a {action} command")]
    UnsupportedFeature {
        toolchain: String,
        action: ActionKind,
        feature: String,
    },

    #[error("`{command}` exited with status {code}")]
    ChildProcessFailure { command: String, code: i32 },

    #[error("failed to rebuild `{}` from `{}`: {reason}", .executable.display(), .driving_source.display())]
    BootstrapFailure {
        executable: PathBuf,
        driving_source: PathBuf,
        reason: String,
    },
}

impl BuildError {
    /// Create an unsupported-feature error.
    pub fn unsupported(
        toolchain: impl Into<String>,
        action: ActionKind,
        feature: impl Into<String>,
    ) -> Self {
        BuildError::UnsupportedFeature {
            toolchain: toolchain.into(),
            action,
            feature: feature.into(),
        }
    }

    /// Check if this is an unsupported-feature error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, BuildError::UnsupportedFeature { .. })
    }
}
