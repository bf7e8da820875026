use std::path::PathBuf;

/// Failures a scenario can end with.
///
/// Everything is propagated through `anyhow::Error`; callers that need to tell
/// a skip from a defect use `downcast_ref::<HarnessError>()`.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("embedding environment unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("popen failed with exit code {exit_code}: {command}")]
    Subprocess { command: String, exit_code: i32 },

    #[error("binding {binding:?}: generator output has no `FILENAME: <path>` line")]
    MissingArtifactMarker { binding: String },

    #[error("binding {binding:?}: produced library {} does not end in {expected:?}", path.display())]
    ArtifactSuffix {
        binding: String,
        path: PathBuf,
        expected: String,
    },

    #[error("{step} failed with exit code {exit_code}: {command}\n{stderr}")]
    Toolchain {
        step: &'static str,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{scenario:?} failed with exit code {exit_code}")]
    Execution { scenario: String, exit_code: i32 },

    #[error(
        "transcript mismatch at {first_difference}\n--- expected ---\n{expected}\n--- actual ---\n{actual}"
    )]
    TranscriptMismatch {
        expected: String,
        actual: String,
        first_difference: String,
    },

    #[error("invalid scenario name {name:?}: must be a single non-empty path component")]
    InvalidScenarioName { name: String },

    #[error("scenario working directory already claimed: {name}")]
    DirectoryClaimed { name: String },
}

impl HarnessError {
    /// Stable short tag used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Unavailable { .. } => "unavailable",
            HarnessError::Subprocess { .. }
            | HarnessError::MissingArtifactMarker { .. }
            | HarnessError::ArtifactSuffix { .. } => "generation",
            HarnessError::Toolchain { .. } => "build",
            HarnessError::Execution { .. } => "execution",
            HarnessError::TranscriptMismatch { .. } => "mismatch",
            HarnessError::InvalidScenarioName { .. } | HarnessError::DirectoryClaimed { .. } => {
                "locator"
            }
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, HarnessError::Unavailable { .. })
    }
}

/// Classify an arbitrary failure. Errors that did not originate here are
/// reported as `internal`.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<HarnessError>()
        .map(HarnessError::kind)
        .unwrap_or("internal")
}
