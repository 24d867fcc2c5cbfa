use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    composition::workspace::sanitize,
    error::{Result, ValidationError},
    validation::validator::validate_path,
    video::{ClipValidity, MediaBackend, SourceClip},
};

/// Frame rate used when the source reports none
pub const FALLBACK_FPS: f64 = 30.0;

/// `<stem>_repaired.<ext>`, next to the source unless a directory is given
pub fn repaired_path(source: &Path, directory: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("clip");

    let file_name = repaired_name(stem, source);
    match directory.or_else(|| source.parent()) {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Where a pool clip's repaired copy goes.
///
/// Inside a shared directory the name comes from the clip id, which is unique
/// within a pool even when two sources share a file stem.
pub fn repaired_clip_path(clip: &SourceClip, directory: Option<&Path>) -> PathBuf {
    match directory {
        Some(dir) => dir.join(repaired_name(&sanitize(&clip.id), &clip.path)),
        None => repaired_path(&clip.path, None),
    }
}

fn repaired_name(stem: &str, source: &Path) -> String {
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    format!("{}_repaired.{}", stem, extension)
}

/// Re-encode a file at an explicit frame rate and confirm the result validates.
///
/// Returns the path of the repaired copy.
pub async fn repair_file<B>(backend: &B, source: &Path, output: &Path) -> Result<PathBuf>
where
    B: MediaBackend + ?Sized,
{
    let repair_failed = |reason: String| ValidationError::RepairFailed {
        path: source.display().to_string(),
        reason,
    };

    let fps = backend
        .probe(source)
        .await
        .ok()
        .and_then(|probe| probe.r_frame_rate)
        .unwrap_or(FALLBACK_FPS);

    info!("🔧 Repairing {} at {} fps", source.display(), fps);

    backend
        .reencode(source, output, fps)
        .await
        .map_err(|e| repair_failed(e.to_string()))?;

    let report = validate_path(backend, output)
        .await
        .map_err(|e| repair_failed(e.to_string()))?;

    if !report.ok {
        let reason = format!(
            "re-encoded file still fails validation ({})",
            report.reason.map(|r| r.to_string()).unwrap_or_default()
        );
        warn!("{}: {}", source.display(), reason);
        return Err(repair_failed(reason).into());
    }

    Ok(output.to_path_buf())
}

/// Repair a clip, returning an updated copy in the `repaired` state
pub async fn repair<B>(backend: &B, clip: &SourceClip, directory: Option<&Path>) -> Result<SourceClip>
where
    B: MediaBackend + ?Sized,
{
    let output = repaired_clip_path(clip, directory);
    let repaired = repair_file(backend, &clip.path, &output).await?;

    let probe = backend.probe(&repaired).await?;

    let mut fixed = clip.clone();
    fixed.path = repaired;
    fixed.apply_probe(&probe);
    fixed.validity = ClipValidity::Repaired;
    Ok(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::video::backend::testing::{probe_info, FakeBackend, FakeMedia};
    use tempfile::tempdir;

    #[test]
    fn test_repaired_path() {
        assert_eq!(
            repaired_path(Path::new("/clips/dance.mov"), None),
            PathBuf::from("/clips/dance_repaired.mov")
        );
        assert_eq!(
            repaired_path(Path::new("/clips/dance.mov"), Some(Path::new("/tmp/run"))),
            PathBuf::from("/tmp/run/dance_repaired.mov")
        );
    }

    #[test]
    fn test_repaired_clip_path_uses_unique_id() {
        let run = Path::new("/tmp/run/repaired");
        let first = SourceClip::new("/clips/a/clip.mp4", 1);
        let mut second = SourceClip::new("/clips/b/clip.mp4", 2);
        second.id = "clip_2".to_string();

        assert_eq!(repaired_clip_path(&first, Some(run)), run.join("clip_repaired.mp4"));
        assert_eq!(repaired_clip_path(&second, Some(run)), run.join("clip_2_repaired.mp4"));
        assert_eq!(
            repaired_clip_path(&second, None),
            PathBuf::from("/clips/b/clip_repaired.mp4")
        );
    }

    #[tokio::test]
    async fn test_same_stem_clips_repair_to_separate_files() {
        let dir = tempdir().unwrap();
        let repairs = dir.path().join("repaired");
        std::fs::create_dir_all(&repairs).unwrap();

        let backend = FakeBackend::new();
        let mut clips = Vec::new();
        for (folder, duration) in [("a", 10.0), ("b", 20.0)] {
            let path = dir.path().join(folder).join("clip.mp4");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"x").unwrap();
            backend.add(
                &path,
                FakeMedia {
                    probe: Some(probe_info(Some(duration), None)),
                    decodes: true,
                    render_fails: false,
                },
            );
            clips.push(SourceClip::new(&path, clips.len() as u32 + 1));
        }
        let pool = crate::video::ClipPool::from_clips(clips);

        let mut fixed = Vec::new();
        for clip in pool.iter() {
            fixed.push(repair(&backend, clip, Some(repairs.as_path())).await.unwrap());
        }

        assert_ne!(fixed[0].path, fixed[1].path);
        assert_eq!(fixed[0].duration, Some(10.0));
        assert_eq!(fixed[1].duration, Some(20.0));
    }

    #[tokio::test]
    async fn test_repair_zero_fps_clip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nofps.mp4");
        std::fs::write(&path, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(
            &path,
            FakeMedia {
                probe: Some(probe_info(Some(11.0), None)),
                decodes: true,
                render_fails: false,
            },
        );

        let clip = SourceClip::new(&path, 1).with_author("skater");
        let fixed = repair(&backend, &clip, None).await.unwrap();

        assert_eq!(fixed.validity, ClipValidity::Repaired);
        assert_eq!(fixed.path, dir.path().join("nofps_repaired.mp4"));
        assert_eq!(fixed.fps, Some(FALLBACK_FPS));
        assert_eq!(fixed.id, clip.id);
        assert_eq!(fixed.author.as_deref(), Some("skater"));
        assert!(fixed.is_usable());
    }

    #[tokio::test]
    async fn test_repair_reports_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp4");
        std::fs::write(&path, b"x").unwrap();

        let backend = FakeBackend::new();
        backend.add(&path, FakeMedia::unreadable());

        // the fake re-encode succeeds but the output directory does not exist
        let output = dir.path().join("missing").join("broken_repaired.mp4");
        let result = repair_file(&backend, &path, &output).await;
        assert!(matches!(
            result,
            Err(CompositorError::Validation(ValidationError::RepairFailed { .. }))
        ));
    }
}
