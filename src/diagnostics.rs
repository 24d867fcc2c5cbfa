//! # Diagnostics
//!
//! Standalone inspection and repair of clip files, outside any run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::Result,
    validation::{repair_file, repaired_path, validate_path, FailureReason, ValidationReport},
    video::MediaBackend,
};

/// Counts over a batch of reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub total: usize,
    pub passed: usize,
    pub repairable: usize,
    pub failed: usize,
    pub zero_fps: usize,
    pub with_warnings: usize,
}

impl DiagnosticSummary {
    pub fn from_reports(reports: &[ValidationReport]) -> Self {
        let mut summary = Self {
            total: reports.len(),
            ..Self::default()
        };

        for report in reports {
            if report.ok {
                summary.passed += 1;
            } else if report.repairable {
                summary.repairable += 1;
            } else {
                summary.failed += 1;
            }
            if report.reason == Some(FailureReason::ZeroFps) {
                summary.zero_fps += 1;
            }
            if !report.warnings.is_empty() {
                summary.with_warnings += 1;
            }
        }

        summary
    }
}

/// Inspect one file and log what was found
pub async fn diagnose<B>(backend: &B, path: &Path) -> Result<ValidationReport>
where
    B: MediaBackend + ?Sized,
{
    let report = validate_path(backend, path).await?;

    if report.ok {
        let probe = report.probe.as_ref();
        info!(
            "✅ {}: {:.2}s @ {:.2} fps, {}x{}",
            path.display(),
            probe.and_then(|p| p.duration).unwrap_or_default(),
            probe.and_then(|p| p.fps).unwrap_or_default(),
            probe.map(|p| p.width).unwrap_or_default(),
            probe.map(|p| p.height).unwrap_or_default()
        );
    } else {
        warn!(
            "❌ {}: {} (repairable: {}) {}",
            path.display(),
            report.reason.map(|r| r.to_string()).unwrap_or_default(),
            report.repairable,
            report.detail.as_deref().unwrap_or("")
        );
    }

    for warning in &report.warnings {
        warn!("   ⚠️  {}", warning);
    }

    Ok(report)
}

/// Inspect every file in order, stopping only on a missing path
pub async fn diagnose_all<B, P>(backend: &B, paths: &[P]) -> Result<Vec<ValidationReport>>
where
    B: MediaBackend + ?Sized,
    P: AsRef<Path>,
{
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        reports.push(diagnose(backend, path.as_ref()).await?);
    }

    let summary = DiagnosticSummary::from_reports(&reports);
    info!(
        "🔍 {} clips: {} ok, {} repairable, {} unusable",
        summary.total, summary.passed, summary.repairable, summary.failed
    );
    Ok(reports)
}

/// Re-encode `path` to `output`, or to `<stem>_repaired.<ext>` beside it
pub async fn repair_path<B>(backend: &B, path: &Path, output: Option<&Path>) -> Result<PathBuf>
where
    B: MediaBackend + ?Sized,
{
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repaired_path(path, None));

    let repaired = repair_file(backend, path, &output).await?;
    info!("   ✅ Repaired clip written to {}", repaired.display());
    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompositorError, ValidationError};
    use crate::video::backend::testing::{probe_info, FakeBackend, FakeMedia};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_zero_fps_is_flagged_not_raised() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.mp4");
        let zero = dir.path().join("zero.mp4");
        std::fs::write(&good, b"x").unwrap();
        std::fs::write(&zero, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(&good, FakeMedia::good(12.0));
        backend.add(
            &zero,
            FakeMedia {
                probe: Some(probe_info(Some(12.0), None)),
                decodes: true,
                render_fails: false,
            },
        );

        let reports = diagnose_all(&backend, &[&good, &zero]).await.unwrap();
        assert!(reports[0].ok);
        assert_eq!(reports[1].reason, Some(FailureReason::ZeroFps));

        let summary = DiagnosticSummary::from_reports(&reports);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.zero_fps, 1);
        assert_eq!(summary.repairable, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let backend = FakeBackend::new();
        let result = diagnose(&backend, Path::new("/nope/missing.mp4")).await;
        assert!(matches!(
            result,
            Err(CompositorError::Validation(ValidationError::MissingFile { .. }))
        ));
    }

    #[tokio::test]
    async fn test_repair_defaults_next_to_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("broken.mov");
        std::fs::write(&source, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(
            &source,
            FakeMedia {
                probe: Some(probe_info(Some(8.0), None)),
                decodes: true,
                render_fails: false,
            },
        );

        let repaired = repair_path(&backend, &source, None).await.unwrap();
        assert_eq!(repaired, dir.path().join("broken_repaired.mov"));
        assert!(repaired.exists());
    }
}
