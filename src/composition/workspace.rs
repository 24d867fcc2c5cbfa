use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{ResourceError, Result};

/// Scratch directory for one run, removed when dropped
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh `run_*` directory under `root`, creating `root` if needed
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let workspace_error = |e: std::io::Error| ResourceError::Workspace {
            root: root.display().to_string(),
            reason: e.to_string(),
        };

        std::fs::create_dir_all(root).map_err(workspace_error)?;
        let dir = tempfile::Builder::new()
            .prefix("run_")
            .tempdir_in(root)
            .map_err(workspace_error)?;

        debug!("Run workspace: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Intermediate for the `index`-th planned segment
    pub fn segment_path(&self, index: usize, clip_id: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("seg_{:03}_{}.mp4", index, sanitize(clip_id)))
    }

    /// Intermediate for a card or an intro/outro asset
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.mp4", sanitize(name)))
    }

    /// Directory for repaired copies of source clips
    pub fn repairs_dir(&self) -> Result<PathBuf> {
        let dir = self.dir.path().join("repaired");
        std::fs::create_dir_all(&dir).map_err(|e| ResourceError::WriteFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(dir)
    }
}

/// Keep alphanumerics, `-` and `_`; everything else becomes `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
