use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    composition::workspace::sanitize,
    error::{ResourceError, Result},
    transitions::TransitionKind,
    video::types::format_handle,
};

/// Which pipeline produced the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Compilation,
    Shorts,
}

/// A clip that made it into the output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludedClip {
    pub id: String,
    pub author: Option<String>,
    pub title: Option<String>,
    /// Offset into the source clip
    pub source_start: f64,
    pub length: f64,
    /// Where the clip starts on the output timeline
    pub timeline_start: f64,
}

/// A join between two consecutive clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Clip the transition leads out of
    pub after: String,
    /// `None` for a hard cut
    pub kind: Option<TransitionKind>,
    pub duration: f64,
}

/// A clip left out of the output, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedClip {
    pub id: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Everything known about a finished run. Written next to the output as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    pub mode: RunMode,

    pub output_path: PathBuf,

    /// Σ segment lengths − Σ overlaps, including cards and intro/outro
    pub total_duration: f64,

    /// Duration of the encoded file as probed afterwards
    pub encoded_duration: Option<f64>,

    /// Target duration or Shorts cap
    pub budget: f64,

    /// Seconds short of what the budget allowed, when beyond tolerance
    pub shortfall: Option<f64>,

    pub clips: Vec<IncludedClip>,

    pub transitions: Vec<TransitionRecord>,

    /// Replays the same random transition choices
    pub transition_seed: u64,

    pub dropped: Vec<DroppedClip>,

    pub created_at: DateTime<Utc>,
}

impl CompilationResult {
    /// `<output>.json`
    pub fn metadata_path(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Write the record next to the output
    pub fn write_json(&self) -> Result<PathBuf> {
        write_record(self, &self.output_path)
    }

    /// Credits in output order, one line per attributed clip
    pub fn attribution_lines(&self) -> Vec<String> {
        self.clips
            .iter()
            .filter_map(|clip| {
                let handle = format_handle(clip.author.as_deref()?)?;
                Some(match &clip.title {
                    Some(title) => format!("{} ({})", handle, title),
                    None => handle,
                })
            })
            .collect()
    }

    pub fn clip_ids(&self) -> Vec<&str> {
        self.clips.iter().map(|c| c.id.as_str()).collect()
    }
}

/// A single-source Short: a cut of a finished video or of one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandedShort {
    /// Pool clip the Short came from; `None` for a cut of a finished video
    pub clip_id: Option<String>,

    pub source: PathBuf,

    pub output_path: PathBuf,

    pub author: Option<String>,

    pub title: Option<String>,

    /// Seconds taken from the start of the source
    pub length: f64,

    pub source_duration: f64,

    /// Text burned onto the Short, top to bottom
    pub overlays: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl BrandedShort {
    /// Whether the source was longer than the Short
    pub fn was_trimmed(&self) -> bool {
        self.source_duration > self.length
    }

    /// Write the record next to the output
    pub fn write_json(&self) -> Result<PathBuf> {
        write_record(self, &self.output_path)
    }
}

/// Outcome of cutting one Short per clip
#[derive(Debug, Clone, Default)]
pub struct ClipShorts {
    pub shorts: Vec<BrandedShort>,
    pub dropped: Vec<DroppedClip>,
}

fn write_record<T: Serialize>(record: &T, output: &Path) -> Result<PathBuf> {
    let path = CompilationResult::metadata_path(output);
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(&path, json).map_err(|e| ResourceError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

/// `multi_short_<title>_<unix>.mp4`, or `multi_clip_short_<unix>.mp4` without a title
pub fn default_shorts_name(title: Option<&str>, now: DateTime<Utc>) -> String {
    let timestamp = now.timestamp();
    match title.map(safe_title).filter(|t| !t.is_empty()) {
        Some(title) => format!("multi_short_{}_{}.mp4", title, timestamp),
        None => format!("multi_clip_short_{}.mp4", timestamp),
    }
}

/// `short_<title>_<unix>.mp4`, or `compilation_short_<unix>.mp4` without a title
pub fn default_recut_name(title: Option<&str>, now: DateTime<Utc>) -> String {
    let timestamp = now.timestamp();
    match title.map(safe_title).filter(|t| !t.is_empty()) {
        Some(title) => format!("short_{}_{}.mp4", title, timestamp),
        None => format!("compilation_short_{}.mp4", timestamp),
    }
}

/// `short_<clip id>.mp4`; pool ids are unique, so names never collide
pub fn clip_short_name(clip_id: &str) -> String {
    format!("short_{}.mp4", sanitize(clip_id))
}

/// `compilation_<YYYYmmdd_HHMMSS>.mp4`
pub fn default_compilation_name(now: DateTime<Utc>) -> String {
    format!("compilation_{}.mp4", now.format("%Y%m%d_%H%M%S"))
}

fn safe_title(title: &str) -> String {
    let kept: String = title
        .split(' ')
        .map(sanitize)
        .collect::<Vec<_>>()
        .join(" ");
    kept.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample(output: PathBuf) -> CompilationResult {
        CompilationResult {
            mode: RunMode::Shorts,
            output_path: output,
            total_duration: 55.0,
            encoded_duration: None,
            budget: 59.0,
            shortfall: None,
            clips: vec![
                IncludedClip {
                    id: "a".to_string(),
                    author: Some("dancer".to_string()),
                    title: Some("spin".to_string()),
                    source_start: 2.0,
                    length: 9.5,
                    timeline_start: 0.0,
                },
                IncludedClip {
                    id: "b".to_string(),
                    author: None,
                    title: None,
                    source_start: 0.0,
                    length: 9.5,
                    timeline_start: 9.0,
                },
            ],
            transitions: vec![TransitionRecord {
                after: "a".to_string(),
                kind: Some(TransitionKind::Fade),
                duration: 0.5,
            }],
            transition_seed: 99,
            dropped: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_metadata_written_next_to_output() {
        let dir = tempdir().unwrap();
        let result = sample(dir.path().join("short.mp4"));

        let path = result.write_json().unwrap();
        assert_eq!(path, dir.path().join("short.mp4.json"));

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["mode"], "shorts");
        assert_eq!(json["transitions"][0]["kind"], "fade");
        assert_eq!(json["transition_seed"], 99);
    }

    #[test]
    fn test_attribution_lines() {
        let result = sample(PathBuf::from("x.mp4"));
        assert_eq!(result.attribution_lines(), vec!["@dancer (spin)".to_string()]);
    }

    #[test]
    fn test_default_names() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            default_shorts_name(Some("Best Fails: Part 2!"), now),
            format!("multi_short_Best_Fails__Part_2__{}.mp4", now.timestamp())
        );
        assert_eq!(
            default_shorts_name(None, now),
            format!("multi_clip_short_{}.mp4", now.timestamp())
        );
        assert_eq!(default_compilation_name(now), "compilation_20240301_120000.mp4");
        assert_eq!(
            default_recut_name(Some("Top 10 (week 3)"), now),
            format!("short_Top_10__week_3__{}.mp4", now.timestamp())
        );
        assert_eq!(
            default_recut_name(Some("   "), now),
            format!("compilation_short_{}.mp4", now.timestamp())
        );
        assert_eq!(clip_short_name("skate trick_2"), "short_skate_trick_2.mp4");
    }

    #[test]
    fn test_branded_short_record() {
        let dir = tempdir().unwrap();
        let short = BrandedShort {
            clip_id: Some("dance".to_string()),
            source: PathBuf::from("clips/dance.mp4"),
            output_path: dir.path().join("short_dance.mp4"),
            author: Some("dancer".to_string()),
            title: None,
            length: 59.0,
            source_duration: 75.0,
            overlays: vec!["@dancer".to_string()],
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        assert!(short.was_trimmed());

        let path = short.write_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["clip_id"], "dance");
        assert_eq!(json["length"], 59.0);
    }
}
