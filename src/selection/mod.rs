//! # Clip Selection
//!
//! Budgeted selection for long-form compilations and the capped packer for
//! multi-clip Shorts. Both produce a [`SelectionPlan`].

pub mod packer;
pub mod plan;
pub mod selector;

pub use packer::{pack, PackParams};
pub use plan::{PlannedSegment, SelectionPlan, TrimOffset};
pub use selector::{select, SelectionParams};
