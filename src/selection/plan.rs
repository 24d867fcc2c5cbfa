use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::video::SourceClip;

/// Maximum intro skipped by the lead-in policy
const LEAD_IN_MAX: f64 = 2.0;

/// Share of the clip skipped by the lead-in policy
const LEAD_IN_RATIO: f64 = 0.2;

/// Lead-in windows keep clear of the final second when they can
const TAIL_GUARD: f64 = 1.0;

/// Where inside a source clip its window is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrimOffset {
    /// From the very first frame
    Start,
    /// Centered in the clip
    Midpoint,
    /// Skip a short intro: `min(2 s, 20 % of duration)`
    #[default]
    LeadIn,
}

impl TrimOffset {
    /// Start of a `length` window in a clip of `duration`, always fitting inside it
    pub fn start_for(&self, duration: f64, length: f64) -> f64 {
        let slack = (duration - length).max(0.0);

        let start = match self {
            Self::Start => 0.0,
            Self::Midpoint => slack / 2.0,
            Self::LeadIn => {
                let lead = LEAD_IN_MAX.min(LEAD_IN_RATIO * duration);
                lead.min((slack - TAIL_GUARD).max(0.0))
            }
        };

        start.clamp(0.0, slack)
    }
}

impl FromStr for TrimOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "start" => Ok(Self::Start),
            "midpoint" | "middle" => Ok(Self::Midpoint),
            "lead-in" | "leadin" => Ok(Self::LeadIn),
            other => Err(format!("unknown trim offset '{}'", other)),
        }
    }
}

impl fmt::Display for TrimOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Midpoint => f.write_str("midpoint"),
            Self::LeadIn => f.write_str("lead-in"),
        }
    }
}

/// A window cut from one source clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSegment {
    pub clip_id: String,

    pub path: PathBuf,

    /// Offset into the source, seconds
    pub start: f64,

    /// Window length, seconds
    pub length: f64,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub has_audio: bool,
}

impl PlannedSegment {
    pub fn from_clip(clip: &SourceClip, start: f64, length: f64) -> Self {
        Self {
            clip_id: clip.id.clone(),
            path: clip.path.clone(),
            start,
            length,
            author: clip.author.clone(),
            title: clip.title.clone(),
            has_audio: clip.has_audio,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

/// Ordered segments plus the budget they were planned against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionPlan {
    pub segments: Vec<PlannedSegment>,

    /// Overlap reserved for each adjacent pair
    pub transition_overlap: f64,

    /// Budget available to the segments and their joins
    pub budget: f64,
}

impl SelectionPlan {
    pub fn new(segments: Vec<PlannedSegment>, transition_overlap: f64, budget: f64) -> Self {
        Self {
            segments,
            transition_overlap,
            budget,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clip_ids(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.clip_id.clone()).collect()
    }

    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Overlap reserved across all joins
    pub fn total_overlap(&self) -> f64 {
        self.segments.len().saturating_sub(1) as f64 * self.transition_overlap
    }

    /// What the budget check counts: Σ lengths + Σ transitions
    pub fn budgeted(&self) -> f64 {
        self.total_length() + self.total_overlap()
    }

    /// Expected output length once transitions overlap: Σ lengths − Σ overlaps
    pub fn planned_duration(&self) -> f64 {
        self.total_length() - self.total_overlap()
    }
}
