//! # Composition Engine
//!
//! The composition engine coordinates validation, segment selection, transitions
//! and the final encode to turn a pool of clips into one finished video.

pub mod branding;
pub mod captions;
pub mod engine;
pub mod result;
pub mod workspace;

// Re-exports for convenience
pub use branding::branding_overlays;
pub use captions::{caption_overlays, load_cues, CaptionCue};
pub use engine::{measure_shortfall, AssemblyOptions, CompositionEngine};
pub use result::{
    clip_short_name, default_compilation_name, default_recut_name, default_shorts_name, BrandedShort, ClipShorts,
    CompilationResult, DroppedClip, IncludedClip, RunMode, TransitionRecord,
};
pub use workspace::RunWorkspace;
