//! # Validation
//!
//! Read-only inspection of candidate clips and the re-encode repair path.

pub mod repair;
pub mod validator;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    error::{Result, ValidationError},
    video::{MediaBackend, SourceClip},
};

pub use repair::{repair, repair_file, repaired_clip_path, repaired_path, FALLBACK_FPS};
pub use validator::{validate, validate_path, FailureReason, ValidationReport};

/// Validate a clip and, when allowed and feasible, repair it into `repair_dir`.
///
/// Returns the clip ready for planning. Clips that stay unusable come back as
/// `NotRepairable` or `RepairFailed`, both of which the caller may skip.
pub async fn prepare_clip<B>(
    backend: &B,
    clip: &SourceClip,
    auto_repair: bool,
    repair_dir: Option<&Path>,
) -> Result<SourceClip>
where
    B: MediaBackend + ?Sized,
{
    let mut checked = clip.clone();
    let report = validate(backend, &mut checked).await?;

    if report.ok {
        debug!(
            "✓ {} ({:.2}s @ {:.2} fps)",
            checked.id,
            checked.usable_duration(),
            checked.fps.unwrap_or_default()
        );
        return Ok(checked);
    }

    let reason = report
        .reason
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    warn!(
        "✗ {} failed validation: {} ({})",
        checked.id,
        reason,
        report.detail.as_deref().unwrap_or("")
    );

    if !(auto_repair && report.repairable) {
        return Err(ValidationError::NotRepairable {
            path: checked.path.display().to_string(),
            reason,
        }
        .into());
    }

    let fixed = repair(backend, &checked, repair_dir).await?;
    info!("   Repaired {} -> {}", checked.id, fixed.path.display());
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::video::backend::testing::{probe_info, FakeBackend, FakeMedia};
    use crate::video::ClipValidity;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prepare_repairs_into_workspace() {
        let source_dir = tempdir().unwrap();
        let work_dir = tempdir().unwrap();
        let path = source_dir.path().join("nofps.mp4");
        std::fs::write(&path, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(
            &path,
            FakeMedia {
                probe: Some(probe_info(Some(7.0), None)),
                decodes: true,
                render_fails: false,
            },
        );

        let clip = SourceClip::new(&path, 1);
        let ready = prepare_clip(&backend, &clip, true, Some(work_dir.path())).await.unwrap();
        assert_eq!(ready.validity, ClipValidity::Repaired);
        assert!(ready.path.starts_with(work_dir.path()));
    }

    #[tokio::test]
    async fn test_prepare_without_repair_skips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nofps.mp4");
        std::fs::write(&path, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(
            &path,
            FakeMedia {
                probe: Some(probe_info(Some(7.0), None)),
                decodes: true,
                render_fails: false,
            },
        );

        let result = prepare_clip(&backend, &SourceClip::new(&path, 1), false, None).await;
        match result {
            Err(err @ CompositorError::Validation(ValidationError::NotRepairable { .. })) => {
                assert!(err.is_recoverable());
            }
            other => panic!("expected NotRepairable, got {:?}", other),
        }
    }
}
