use thiserror::Error;

/// Main error type for the Reel-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run cancelled by caller")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Bad input media. Recoverable by repairing or skipping the clip.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Video file not found: {path}")]
    MissingFile { path: String },

    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Failed to decode frame at {timestamp:.2}s from {path}: {reason}")]
    DecodeFailed {
        path: String,
        timestamp: f64,
        reason: String,
    },

    #[error("Clip {path} is not repairable: {reason}")]
    NotRepairable { path: String, reason: String },

    #[error("Repair of {path} failed: {reason}")]
    RepairFailed { path: String, reason: String },
}

/// Selection could not produce a plan.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Insufficient content: {available} usable clips, {required} required")]
    InsufficientContent { available: usize, required: usize },

    #[error("Invalid selection parameters: {details}")]
    InvalidParameters { details: String },
}

/// Encode-stage and timeline failures.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Insufficient content after dropping clips: {available} usable, {required} required")]
    InsufficientContent {
        available: usize,
        required: usize,
        attempted: Vec<String>,
    },

    #[error("Encoding failed after retry ({} clips attempted): {reason}", .attempted.len())]
    EncodeFailed {
        reason: String,
        attempted: Vec<String>,
    },

    #[error("Segment render failed for clip {clip_id}: {reason}")]
    SegmentFailed { clip_id: String, reason: String },

    #[error("Invalid transition: {details}")]
    InvalidTransition { details: String },

    #[error("Asset not found: {path}")]
    MissingAsset { path: String },

    #[error("FFmpeg command failed: {reason}")]
    CommandFailed { reason: String },
}

/// Disk, temp-file and external tool faults. Always fatal.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to create run workspace under {root}: {reason}")]
    Workspace { root: String, reason: String },

    #[error("Required tool not found in PATH: {tool}")]
    ToolNotFound { tool: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether the pipeline can continue by dropping the offending clip and re-planning
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(ValidationError::MissingFile { .. }) => false,
            Self::Validation(_) => true,
            Self::Assembly(AssemblyError::SegmentFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::MissingFile { path }) => {
                format!("Could not find video file '{}'. Please check the path.", path)
            }
            Self::Selection(SelectionError::InsufficientContent { available, required }) => {
                format!(
                    "Only {} usable clips were found but at least {} are needed. Add more clips or lower min_clips.",
                    available, required
                )
            }
            Self::Assembly(AssemblyError::EncodeFailed { attempted, .. }) => {
                format!(
                    "Encoding failed twice with {} clips. Run `diagnose` on the clips: {}",
                    attempted.len(),
                    attempted.join(", ")
                )
            }
            Self::Resource(ResourceError::ToolNotFound { tool }) => {
                format!("'{}' was not found. Please install FFmpeg and make sure it is on PATH.", tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let corrupt: CompositorError = ValidationError::ProbeFailed {
            path: "a.mp4".to_string(),
            reason: "moov atom not found".to_string(),
        }
        .into();
        assert!(corrupt.is_recoverable());

        let missing: CompositorError = ValidationError::MissingFile {
            path: "a.mp4".to_string(),
        }
        .into();
        assert!(!missing.is_recoverable());

        let starved: CompositorError = SelectionError::InsufficientContent {
            available: 1,
            required: 3,
        }
        .into();
        assert!(!starved.is_recoverable());
    }

    #[test]
    fn test_encode_failure_message_lists_clips() {
        let err: CompositorError = AssemblyError::EncodeFailed {
            reason: "exit status 1".to_string(),
            attempted: vec!["clip_a".to_string(), "clip_b".to_string()],
        }
        .into();

        assert!(err.to_string().contains("2 clips attempted"));
        assert!(err.user_message().contains("clip_a, clip_b"));
    }
}
