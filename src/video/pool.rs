use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CompositorError, Result, ValidationError};
use crate::video::types::{ClipValidity, SourceClip};

/// One entry of a collector manifest
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, alias = "desc")]
    title: Option<String>,
}

/// The ordered pool of candidate clips for one run
#[derive(Debug, Clone, Default)]
pub struct ClipPool {
    clips: Vec<SourceClip>,
}

impl ClipPool {
    pub fn new() -> Self {
        Self { clips: Vec::new() }
    }

    /// Build a pool from explicit paths, keeping the given order
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| SourceClip::new(p, i as u32 + 1))
            .collect()
    }

    /// Discover supported video files in a directory
    ///
    /// Files named like `01_intro.mp4` are ordered by their number; the rest
    /// follow by file name.
    pub fn from_directory<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref();

        if !directory.is_dir() {
            return Err(ValidationError::MissingFile {
                path: directory.display().to_string(),
            }
            .into());
        }

        let mut numbered = Vec::new();
        let mut named = Vec::new();

        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();

            if !path.is_file() || is_hidden_file(&path) || !is_supported(&path) {
                continue;
            }

            match SourceClip::from_numbered_path(&path) {
                Some(clip) => numbered.push(clip),
                None => named.push(path),
            }
        }

        numbered.sort_by(|a, b| {
            a.sequence_number
                .cmp(&b.sequence_number)
                .then_with(|| a.path.cmp(&b.path))
        });
        named.sort();

        let offset = numbered.iter().map(|c| c.sequence_number).max().unwrap_or(0);
        let clips: Vec<SourceClip> = numbered
            .into_iter()
            .chain(
                named
                    .into_iter()
                    .enumerate()
                    .map(|(i, p)| SourceClip::new(p, offset + i as u32 + 1)),
            )
            .collect();

        info!("Discovered {} clips in {}", clips.len(), directory.display());
        Ok(Self { clips })
    }

    /// Load a collector manifest: `[{"path": ..., "id": ..., "author": ..., "title": ...}]`
    ///
    /// Relative paths resolve against the manifest's directory.
    pub fn from_manifest<P: AsRef<Path>>(manifest: P) -> Result<Self> {
        let manifest = manifest.as_ref();
        let content = std::fs::read_to_string(manifest).map_err(|_| ValidationError::MissingFile {
            path: manifest.display().to_string(),
        })?;

        let entries: Vec<ManifestEntry> = serde_json::from_str(&content)?;
        let base = manifest.parent().unwrap_or_else(|| Path::new("."));

        let clips = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let path = if entry.path.is_relative() {
                    base.join(&entry.path)
                } else {
                    entry.path
                };
                let mut clip = SourceClip::new(path, i as u32 + 1);
                if let Some(id) = entry.id {
                    clip.id = id;
                }
                clip.author = entry.author;
                clip.title = entry.title;
                clip
            })
            .collect::<Vec<_>>();

        debug!("Loaded {} manifest entries from {}", clips.len(), manifest.display());
        Ok(Self::from_clips(clips))
    }

    /// Wrap existing clips, de-duplicating ids so attribution stays unambiguous
    pub fn from_clips(clips: Vec<SourceClip>) -> Self {
        let mut pool = Self::new();
        for clip in clips {
            pool.push(clip);
        }
        pool
    }

    pub fn push(&mut self, mut clip: SourceClip) {
        if self.get(&clip.id).is_some() {
            let base = clip.id.clone();
            let mut n = 2;
            while self.get(&format!("{}_{}", base, n)).is_some() {
                n += 1;
            }
            warn!("Duplicate clip id '{}', renaming to '{}_{}'", base, base, n);
            clip.id = format!("{}_{}", base, n);
        }
        self.clips.push(clip);
    }

    pub fn clips(&self) -> &[SourceClip] {
        &self.clips
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceClip> {
        self.clips.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SourceClip> {
        self.clips.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SourceClip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Number of clips that may enter a plan
    pub fn usable_count(&self) -> usize {
        self.clips.iter().filter(|c| c.is_usable()).count()
    }

    /// Exclude a clip from any further planning
    pub fn mark_invalid(&mut self, id: &str) -> Result<()> {
        let clip = self
            .clips
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CompositorError::generic(format!("unknown clip id '{}'", id)))?;
        clip.validity = ClipValidity::Invalid;
        Ok(())
    }

    /// Swap in an updated clip (e.g. a repaired copy), matched by id
    pub fn replace(&mut self, clip: SourceClip) {
        if let Some(slot) = self.clips.iter_mut().find(|c| c.id == clip.id) {
            *slot = clip;
        }
    }
}

impl FromIterator<SourceClip> for ClipPool {
    fn from_iter<I: IntoIterator<Item = SourceClip>>(iter: I) -> Self {
        Self::from_clips(iter.into_iter().collect())
    }
}

pub fn is_supported<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().and_then(|ext| ext.to_str()),
        Some(ext) if matches!(
            ext.to_lowercase().as_str(),
            "mp4" | "avi" | "mov" | "mkv" | "webm" | "m4v" | "flv"
        )
    )
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
