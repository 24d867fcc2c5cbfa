use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::TransitionConfig,
    error::{AssemblyError, Result},
    transitions::{TransitionKind, TransitionPolicy, TransitionSpec},
};

/// Snap a duration onto the output frame grid (N = round(d * fps) frames).
pub fn snap_to_frames(duration: f64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return duration;
    }
    (duration * fps).round() / fps
}

/// Largest whole number of frames that fits in `duration`.
pub fn snap_down_to_frames(duration: f64, fps: f64) -> f64 {
    if fps <= 0.0 {
        return duration;
    }
    ((duration * fps + 1e-9).floor() / fps).max(0.0)
}

/// One rendered, normalized segment as the timeline sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    /// Clip id, or a synthetic label for cards and intro/outro
    pub label: String,

    /// Length in seconds
    pub length: f64,
}

impl TimelineSegment {
    pub fn new(label: impl Into<String>, length: f64) -> Self {
        Self {
            label: label.into(),
            length,
        }
    }
}

/// Result of joining two segments
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedSegment {
    /// `None` for a hard cut
    pub transition: Option<TransitionSpec>,

    /// Where the transition starts, measured from the start of the first segment
    pub offset: f64,

    /// Seconds of A and B that play simultaneously
    pub overlap: f64,

    /// Combined length: a + b - overlap
    pub duration: f64,
}

/// Join two segments with an optional transition.
///
/// Rejects transitions that are not strictly shorter than both segments.
pub fn apply(
    a: &TimelineSegment,
    b: &TimelineSegment,
    transition: Option<&TransitionSpec>,
) -> Result<StitchedSegment> {
    let overlap = transition.map(|t| t.duration).unwrap_or(0.0);

    if let Some(spec) = transition {
        if !(spec.duration > 0.0) || spec.duration >= a.length || spec.duration >= b.length {
            return Err(AssemblyError::InvalidTransition {
                details: format!(
                    "{} of {:.3}s between '{}' ({:.3}s) and '{}' ({:.3}s)",
                    spec.kind, spec.duration, a.label, a.length, b.label, b.length
                ),
            }
            .into());
        }
    }

    Ok(StitchedSegment {
        transition: transition.copied(),
        offset: a.length - overlap,
        overlap,
        duration: a.length + b.length - overlap,
    })
}

/// Chooses transitions for each adjacent pair of a run
#[derive(Debug, Clone)]
pub struct TransitionPlanner {
    policy: TransitionPolicy,
    duration: f64,
    seed: u64,
}

impl TransitionPlanner {
    pub fn new(policy: TransitionPolicy, duration: f64, seed: u64) -> Self {
        Self {
            policy,
            duration,
            seed,
        }
    }

    /// Build from configuration; without a configured seed one is drawn
    /// from the clock and reported back through [`seed`](Self::seed).
    pub fn from_config(config: &TransitionConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64);
        Self::new(config.transition_type, config.duration, seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Overlap budgeted per join at the given frame rate
    pub fn overlap(&self, fps: f64) -> f64 {
        match self.policy {
            TransitionPolicy::None => 0.0,
            _ => snap_to_frames(self.duration, fps),
        }
    }

    /// Pick a transition for each of `joins` adjacent pairs.
    ///
    /// The same seed always yields the same sequence.
    pub fn plan(&self, joins: usize, fps: f64) -> Vec<Option<TransitionSpec>> {
        let duration = snap_to_frames(self.duration, fps);
        let mut rng = SmallRng::seed_from_u64(self.seed);

        (0..joins)
            .map(|_| match self.policy {
                TransitionPolicy::None => None,
                TransitionPolicy::Fixed(kind) => Some(TransitionSpec::new(kind, duration)),
                TransitionPolicy::Random => TransitionKind::ALL
                    .choose(&mut rng)
                    .map(|kind| TransitionSpec::new(*kind, duration)),
            })
            .collect()
    }
}

/// A sequence of segments joined by transitions or hard cuts
#[derive(Debug, Clone, Default)]
pub struct StitchedTimeline {
    segments: Vec<TimelineSegment>,
    joins: Vec<StitchedSegment>,
    /// Start time of each segment on the output timeline
    starts: Vec<f64>,
    total: f64,
}

impl StitchedTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment, joined to the previous one by `transition`.
    ///
    /// The first segment's transition is ignored.
    pub fn push(&mut self, segment: TimelineSegment, transition: Option<TransitionSpec>) -> Result<()> {
        let Some(previous) = self.segments.last() else {
            self.total = segment.length;
            self.starts.push(0.0);
            self.segments.push(segment);
            return Ok(());
        };

        let stitched = apply(previous, &segment, transition.as_ref())?;
        let start = self.total - stitched.overlap;

        debug!(
            "Join '{}' -> '{}': {} at {:.3}s",
            previous.label,
            segment.label,
            transition.map(|t| t.kind.to_string()).unwrap_or_else(|| "cut".to_string()),
            start
        );

        self.total = start + segment.length;
        self.starts.push(start);
        self.joins.push(stitched);
        self.segments.push(segment);
        Ok(())
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn joins(&self) -> &[StitchedSegment] {
        &self.joins
    }

    /// Start of each segment on the output timeline
    pub fn starts(&self) -> &[f64] {
        &self.starts
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Σ segment lengths − Σ overlaps
    pub fn total_duration(&self) -> f64 {
        self.total
    }

    pub fn transitions(&self) -> Vec<Option<TransitionSpec>> {
        self.joins.iter().map(|j| j.transition).collect()
    }

    /// Build the ffmpeg filter graph that stitches inputs `0..len()`.
    ///
    /// Every input must carry one video and one audio stream at the same
    /// geometry and frame rate. Output pads are `[vout]` and `[aout]`.
    pub fn filter_graph(&self, fps: f64, video_tail: &[String]) -> String {
        let rate = crate::video::command::format_rate(fps);
        let mut parts = Vec::new();

        for i in 0..self.segments.len() {
            parts.push(format!("[{i}:v]settb=AVTB,fps={rate},setpts=PTS-STARTPTS[v{i}]"));
            parts.push(format!(
                "[{i}:a]aresample=44100,aformat=sample_fmts=fltp:channel_layouts=stereo,asetpts=PTS-STARTPTS[a{i}]"
            ));
        }

        let mut video = "v0".to_string();
        let mut audio = "a0".to_string();
        let mut elapsed = self.segments.first().map(|s| s.length).unwrap_or(0.0);

        for (index, join) in self.joins.iter().enumerate() {
            let next = index + 1;
            let video_out = format!("vx{next}");
            let audio_out = format!("ax{next}");

            match join.transition {
                Some(spec) => {
                    let offset = (elapsed - spec.duration).max(0.0);
                    parts.push(format!(
                        "[{video}][v{next}]xfade={}:duration={:.3}:offset={:.3}[{video_out}]",
                        spec.kind.xfade_args(),
                        spec.duration,
                        offset
                    ));
                    parts.push(format!(
                        "[{audio}][a{next}]acrossfade=d={:.3}[{audio_out}]",
                        spec.duration
                    ));
                    elapsed = offset + self.segments[next].length;
                }
                None => {
                    parts.push(format!(
                        "[{video}][{audio}][v{next}][a{next}]concat=n=2:v=1:a=1[{video_out}][{audio_out}]"
                    ));
                    elapsed += self.segments[next].length;
                }
            }

            video = video_out;
            audio = audio_out;
        }

        let tail = if video_tail.is_empty() {
            "null".to_string()
        } else {
            video_tail.join(",")
        };
        parts.push(format!("[{video}]{tail},format=yuv420p[vout]"));
        parts.push(format!("[{audio}]anull[aout]"));

        parts.join(";")
    }
}
