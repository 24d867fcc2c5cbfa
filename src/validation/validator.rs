use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Result, ValidationError},
    video::{ClipValidity, MediaBackend, ProbeInfo, SourceClip},
};

/// Why a clip failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// ffprobe could not read it or found no video stream
    Unreadable,
    /// Frame rate missing or `0/0`
    ZeroFps,
    /// Duration missing or non-positive
    ZeroDuration,
    /// Probe succeeded but frames do not decode
    CorruptStream,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unreadable => "unreadable",
            Self::ZeroFps => "zero_fps",
            Self::ZeroDuration => "zero_duration",
            Self::CorruptStream => "corrupt_stream",
        };
        f.write_str(name)
    }
}

/// Outcome of inspecting one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub path: PathBuf,

    pub ok: bool,

    pub reason: Option<FailureReason>,

    /// Whether a re-encode is worth attempting
    pub repairable: bool,

    /// What went wrong, in the tool's words
    pub detail: Option<String>,

    pub probe: Option<ProbeInfo>,

    /// Non-fatal findings (rotation, unreadable tail)
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn passed(path: &Path, probe: ProbeInfo, warnings: Vec<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            ok: true,
            reason: None,
            repairable: false,
            detail: None,
            probe: Some(probe),
            warnings,
        }
    }

    fn failed(
        path: &Path,
        reason: FailureReason,
        repairable: bool,
        detail: impl Into<String>,
        probe: Option<ProbeInfo>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            ok: false,
            reason: Some(reason),
            repairable,
            detail: Some(detail.into()),
            probe,
            warnings: Vec::new(),
        }
    }

    /// Copy probe facts and the verdict onto the clip
    pub fn apply_to(&self, clip: &mut SourceClip) {
        if let Some(probe) = &self.probe {
            clip.apply_probe(probe);
        }
        clip.validity = if self.ok {
            ClipValidity::Valid
        } else {
            ClipValidity::Invalid
        };
    }
}

/// Inspect a file: probe, then decode the first and middle frames.
///
/// Bad media is classified, never raised. Only a missing path is an error.
pub async fn validate_path<B>(backend: &B, path: &Path) -> Result<ValidationReport>
where
    B: MediaBackend + ?Sized,
{
    if !path.exists() {
        return Err(ValidationError::MissingFile {
            path: path.display().to_string(),
        }
        .into());
    }

    let probe = match backend.probe(path).await {
        Ok(probe) => probe,
        Err(e) => {
            debug!("Probe failed for {}: {}", path.display(), e);
            return Ok(ValidationReport::failed(
                path,
                FailureReason::Unreadable,
                false,
                e.to_string(),
                None,
            ));
        }
    };

    if probe.fps.is_none() {
        return Ok(ValidationReport::failed(
            path,
            FailureReason::ZeroFps,
            true,
            "stream reports no usable frame rate",
            Some(probe),
        ));
    }

    let Some(duration) = probe.duration else {
        let first_frame = backend.decode_frame(path, 0.0).await;
        return Ok(ValidationReport::failed(
            path,
            FailureReason::ZeroDuration,
            first_frame.is_ok(),
            "stream reports no duration",
            Some(probe),
        ));
    };

    for at in [0.0, duration / 2.0] {
        match backend.decode_frame(path, at).await {
            Ok(frame) => debug!("{}: {}x{} frame at {:.2}s", path.display(), frame.width(), frame.height(), at),
            Err(e) => {
                return Ok(ValidationReport::failed(
                    path,
                    FailureReason::CorruptStream,
                    duration > 0.0,
                    e.to_string(),
                    Some(probe),
                ))
            }
        }
    }

    let mut warnings = Vec::new();

    let tail = (duration - 0.1).max(0.0);
    if let Err(e) = backend.decode_frame(path, tail).await {
        warnings.push(format!("last frames do not decode: {}", e));
    }

    if let Some(rotation) = probe.rotation {
        warnings.push(format!("rotation metadata of {} degrees", rotation));
    }

    for warning in &warnings {
        warn!("{}: {}", path.display(), warning);
    }

    Ok(ValidationReport::passed(path, probe, warnings))
}

/// Validate a clip and record the verdict on it
pub async fn validate<B>(backend: &B, clip: &mut SourceClip) -> Result<ValidationReport>
where
    B: MediaBackend + ?Sized,
{
    let report = validate_path(backend, &clip.path).await?;
    report.apply_to(clip);
    Ok(report)
}
