use tracing::{debug, info};

use crate::{
    config::CompilationConfig,
    error::{Result, SelectionError},
    selection::{PlannedSegment, SelectionPlan, TrimOffset},
    transitions::snap_down_to_frames,
    video::{ClipPool, SourceClip},
};

/// Knobs for one selection pass
#[derive(Debug, Clone)]
pub struct SelectionParams {
    /// Budget for segments plus their joins, seconds
    pub target_duration: f64,

    pub min_segment: f64,

    pub max_segment: Option<f64>,

    pub max_clips: usize,

    pub min_clips: usize,

    /// Overlap budgeted per adjacent pair
    pub transition_overlap: f64,

    pub trim_offset: TrimOffset,

    /// Output frame rate; segment lengths are whole frames at this rate
    pub fps: f64,
}

impl SelectionParams {
    pub fn from_config(config: &CompilationConfig, transition_overlap: f64, fps: f64) -> Self {
        Self {
            target_duration: config.target_duration,
            min_segment: config.min_segment_length,
            max_segment: config.max_segment_length,
            max_clips: config.max_clips,
            min_clips: config.min_clips,
            transition_overlap,
            trim_offset: config.trim_offset,
            fps,
        }
    }

    fn check(&self) -> Result<()> {
        if !(self.min_segment > 0.0) || !(self.target_duration > 0.0) || self.transition_overlap < 0.0 {
            return Err(SelectionError::InvalidParameters {
                details: format!(
                    "target {:.2}s, min segment {:.2}s, overlap {:.2}s",
                    self.target_duration, self.min_segment, self.transition_overlap
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Usable clips long enough to hold a minimum segment, in pool order
pub(crate) fn eligible_clips<'a>(pool: &'a ClipPool, min_segment: f64) -> Vec<&'a SourceClip> {
    pool.iter()
        .filter(|clip| clip.is_usable())
        .filter(|clip| {
            let long_enough = clip.usable_duration() >= min_segment;
            if !long_enough {
                debug!(
                    "Skipping {}: {:.2}s is shorter than the {:.2}s minimum",
                    clip.id,
                    clip.usable_duration(),
                    min_segment
                );
            }
            long_enough
        })
        .collect()
}

/// Even share of `budget` across `count` segments after reserving the joins
pub(crate) fn even_split(budget: f64, count: usize, overlap: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (budget - (count - 1) as f64 * overlap) / count as f64
}

/// Choose an ordered subset of the pool and a window in each clip.
///
/// Earlier clips win when the budget is tight. Every planned segment is at
/// least `min_segment` long and the segments plus their joins fit in
/// `target_duration`.
pub fn select(pool: &ClipPool, params: &SelectionParams) -> Result<SelectionPlan> {
    params.check()?;

    let eligible = eligible_clips(pool, params.min_segment);
    let mut count = eligible.len().min(params.max_clips);

    // Fewer clips when the budget can't give each one a minimum segment
    while count > 1 && even_split(params.target_duration, count, params.transition_overlap) < params.min_segment {
        count -= 1;
    }

    let mut segments = Vec::with_capacity(count);
    let mut remaining = params.target_duration;

    for clip in eligible.iter().take(count) {
        let left = count - segments.len();
        let join = if segments.is_empty() { 0.0 } else { params.transition_overlap };

        let mut allotment = (remaining - join - (left - 1) as f64 * params.transition_overlap) / left as f64;
        if let Some(max) = params.max_segment {
            allotment = allotment.min(max);
        }

        let length = snap_down_to_frames(allotment.min(clip.usable_duration()), params.fps);
        if length < params.min_segment {
            debug!("Budget exhausted at {} ({:.2}s left)", clip.id, remaining);
            break;
        }

        let start = params.trim_offset.start_for(clip.usable_duration(), length);
        debug!("Selected {}: {:.2}s from {:.2}s", clip.id, length, start);

        segments.push(PlannedSegment::from_clip(clip, start, length));
        remaining -= join + length;
    }

    if segments.len() < params.min_clips {
        return Err(SelectionError::InsufficientContent {
            available: segments.len(),
            required: params.min_clips,
        }
        .into());
    }

    let plan = SelectionPlan::new(segments, params.transition_overlap, params.target_duration);
    info!(
        "   Selected {} of {} usable clips ({:.1}s of {:.1}s budget)",
        plan.len(),
        pool.usable_count(),
        plan.budgeted(),
        plan.budget
    );

    Ok(plan)
}
