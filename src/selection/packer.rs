use tracing::{debug, info};

use crate::{
    config::{ShortsConfig, SHORTS_MAX_SECONDS},
    error::{Result, SelectionError},
    selection::{
        selector::{eligible_clips, even_split},
        PlannedSegment, SelectionPlan, TrimOffset,
    },
    transitions::snap_down_to_frames,
    video::ClipPool,
};

/// Knobs for packing a Short
#[derive(Debug, Clone)]
pub struct PackParams {
    /// Ceiling for the whole Short; anything above 60 s is clamped
    pub hard_cap: f64,

    /// Seconds already spoken for by title card, intro and outro
    pub reserved: f64,

    pub min_segment: f64,

    pub max_segment: Option<f64>,

    pub max_clips: usize,

    pub min_clips: usize,

    pub transition_overlap: f64,

    pub trim_offset: TrimOffset,

    /// Output frame rate; packed lengths are whole frames at this rate
    pub fps: f64,
}

impl PackParams {
    pub fn from_config(config: &ShortsConfig, transition_overlap: f64, reserved: f64, fps: f64) -> Self {
        Self {
            hard_cap: config.hard_cap_seconds,
            reserved,
            min_segment: config.min_segment_length,
            max_segment: config.max_segment_length,
            max_clips: config.max_clips,
            min_clips: config.min_clips,
            transition_overlap,
            trim_offset: config.trim_offset,
            fps,
        }
    }

    /// Budget left for clip segments and their joins
    pub fn budget(&self) -> f64 {
        (self.hard_cap.min(SHORTS_MAX_SECONDS) - self.reserved).max(0.0)
    }
}

/// Pack as many distinct clips as fit under the cap.
///
/// Starts from an even split across every usable clip and drops the latest
/// clips until the split reaches `min_segment`. Time a short clip cannot use
/// is handed to the clips that still have headroom.
pub fn pack(pool: &ClipPool, params: &PackParams) -> Result<SelectionPlan> {
    if !(params.min_segment > 0.0) || !(params.hard_cap > 0.0) {
        return Err(SelectionError::InvalidParameters {
            details: format!("cap {:.2}s, min segment {:.2}s", params.hard_cap, params.min_segment),
        }
        .into());
    }

    let budget = params.budget();
    let mut clips = eligible_clips(pool, params.min_segment);
    clips.truncate(params.max_clips);

    while !clips.is_empty() && even_split(budget, clips.len(), params.transition_overlap) < params.min_segment {
        if let Some(dropped) = clips.pop() {
            debug!("Dropping {} to keep segments above {:.1}s", dropped.id, params.min_segment);
        }
    }

    if clips.len() < params.min_clips.max(1) {
        return Err(SelectionError::InsufficientContent {
            available: clips.len(),
            required: params.min_clips.max(1),
        }
        .into());
    }

    let capacities: Vec<f64> = clips
        .iter()
        .map(|clip| {
            let duration = clip.usable_duration();
            params.max_segment.map_or(duration, |max| duration.min(max))
        })
        .collect();

    let available = budget - (clips.len() - 1) as f64 * params.transition_overlap;
    let lengths = water_fill(&capacities, available);

    let segments = clips
        .iter()
        .zip(lengths)
        .map(|(clip, length)| {
            let length = snap_down_to_frames(length, params.fps);
            let start = params.trim_offset.start_for(clip.usable_duration(), length);
            PlannedSegment::from_clip(clip, start, length)
        })
        .collect();

    let plan = SelectionPlan::new(segments, params.transition_overlap, budget);
    info!(
        "   Packed {} clips into {:.1}s (cap {:.1}s, {:.1}s reserved)",
        plan.len(),
        plan.budgeted(),
        params.hard_cap.min(SHORTS_MAX_SECONDS),
        params.reserved
    );

    Ok(plan)
}

/// Share `total` across slots without exceeding any slot's capacity.
///
/// Slots below the common level get their full capacity; the rest share
/// what remains evenly.
fn water_fill(capacities: &[f64], total: f64) -> Vec<f64> {
    let mut order: Vec<usize> = (0..capacities.len()).collect();
    order.sort_by(|a, b| capacities[*a].total_cmp(&capacities[*b]));

    let mut lengths = vec![0.0; capacities.len()];
    let mut remaining = total.max(0.0);
    let mut open = capacities.len();

    for index in order {
        let level = remaining / open as f64;
        let length = capacities[index].min(level);
        lengths[index] = length;
        remaining -= length;
        open -= 1;
    }

    lengths
}
