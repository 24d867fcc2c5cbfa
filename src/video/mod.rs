//! # Video Module
//!
//! Clip discovery, ffprobe parsing, and the ffmpeg-backed media backend.

pub mod backend;
pub mod command;
pub mod filters;
pub mod pool;
pub mod probe;
pub mod types;

pub use backend::{CardJob, FfmpegBackend, MediaBackend, SegmentJob, TimelineJob};
pub use pool::ClipPool;
pub use probe::ProbeInfo;
pub use types::{ClipValidity, FitPolicy, Frame, OutputParams, SourceClip};
