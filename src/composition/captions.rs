use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Result, ValidationError},
    video::filters::{TextOverlay, TextPlacement},
};

/// A timed caption burned into the final timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionCue {
    pub text: String,

    /// Seconds from the start of the output
    pub start: f64,

    pub end: f64,
}

impl CaptionCue {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Load cues from a JSON array of `{ "text", "start", "end" }`
pub fn load_cues<P: AsRef<Path>>(path: P) -> Result<Vec<CaptionCue>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|_| ValidationError::MissingFile {
        path: path.display().to_string(),
    })?;

    let cues: Vec<CaptionCue> = serde_json::from_str(&content)?;
    debug!("Loaded {} caption cues from {}", cues.len(), path.display());
    Ok(cues)
}

/// Turn cues into timed overlays, clipped to the timeline
pub fn caption_overlays(
    cues: &[CaptionCue],
    total_duration: f64,
    height: u32,
    font_ratio: f64,
) -> Vec<TextOverlay> {
    cues.iter()
        .filter_map(|cue| {
            let start = cue.start.max(0.0);
            let end = cue.end.min(total_duration);

            if cue.text.trim().is_empty() || end <= start {
                warn!(
                    "Skipping caption '{}' ({:.2}-{:.2}s) outside the {:.2}s timeline",
                    cue.text, cue.start, cue.end, total_duration
                );
                return None;
            }

            Some(
                TextOverlay::new(cue.text.trim(), height, font_ratio, TextPlacement::Bottom)
                    .between(start, end)
                    .unboxed(),
            )
        })
        .collect()
}
