//! # Reel-Compositor
//!
//! Assemble compilations and multi-clip Shorts from pools of short social-media clips.
//!
//! This library validates heterogeneous source clips, picks and trims segments to fit a
//! duration budget, joins them with transitions and encodes one vertical output video
//! together with a JSON record of what went into it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reel_compositor::{
//!     composition::{AssemblyOptions, CompositionEngine},
//!     config::Config,
//!     video::{ClipPool, FfmpegBackend},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = CompositionEngine::new(Config::default(), FfmpegBackend::new()?)?;
//! let pool = ClipPool::from_directory("clips/")?;
//!
//! let result = engine
//!     .shorts(pool, "short.mp4", &AssemblyOptions::default())
//!     .await?;
//! println!("{} clips, {:.1}s", result.clips.len(), result.total_duration);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`video`] - Clip pools, probing and the ffmpeg-backed media backend
//! - [`validation`] - Clip validation and re-encode repair
//! - [`selection`] - Segment selection for compilations and Shorts packing
//! - [`transitions`] - Transition planning and timeline stitching
//! - [`composition`] - Main composition engine
//! - [`diagnostics`] - Standalone diagnose and repair entry points
//! - [`config`] - Configuration management
//!
//! ## Custom Backends
//!
//! Everything that touches media goes through the [`MediaBackend`](video::MediaBackend)
//! trait, so the pipeline can run against any tool that can probe, render and encode.

pub mod composition;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod selection;
pub mod transitions;
pub mod validation;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{AssemblyOptions, CompilationResult, CompositionEngine},
    config::Config,
    error::{CompositorError, Result},
    video::{ClipPool, FfmpegBackend, MediaBackend},
};
