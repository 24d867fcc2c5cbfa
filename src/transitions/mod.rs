//! # Transitions
//!
//! The fixed transition set, seeded per-run selection, and the filter graph
//! that stitches rendered segments together.

pub mod engine;
pub mod kind;

pub use engine::{apply, snap_down_to_frames, snap_to_frames, StitchedSegment, StitchedTimeline, TimelineSegment, TransitionPlanner};
pub use kind::{TransitionKind, TransitionPolicy, TransitionSpec};
