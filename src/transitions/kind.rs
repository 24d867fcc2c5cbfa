use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of transitions between two adjacent segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    /// A fades out while B fades in
    Fade,
    /// Pixel-level cross-blend of A into B
    Crossfade,
    /// B pushes A out to the left
    SlideLeft,
    /// B pushes A out to the right
    SlideRight,
    /// A scales up from the center while dissolving into B
    ZoomIn,
    /// A shrinks toward the center, revealing B
    ZoomOut,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 6] = [
        Self::Fade,
        Self::Crossfade,
        Self::SlideLeft,
        Self::SlideRight,
        Self::ZoomIn,
        Self::ZoomOut,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Crossfade => "crossfade",
            Self::SlideLeft => "slide-left",
            Self::SlideRight => "slide-right",
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
        }
    }

    /// Arguments for ffmpeg's `xfade` filter (without duration/offset)
    pub fn xfade_args(&self) -> String {
        match self {
            Self::Fade => "transition=fade".to_string(),
            Self::Crossfade => "transition=dissolve".to_string(),
            Self::SlideLeft => "transition=slideleft".to_string(),
            Self::SlideRight => "transition=slideright".to_string(),
            Self::ZoomIn => "transition=zoomin".to_string(),
            Self::ZoomOut => format!("transition=custom:expr='{}'", zoom_out_expr()),
        }
    }
}

/// xfade runs P from 1 down to 0; A is scaled by P around the center.
fn zoom_out_expr() -> String {
    let sample = |plane: u8| {
        format!(
            "a{}((X-W/2)/max(P\\,0.001)+W/2\\,(Y-H/2)/max(P\\,0.001)+H/2)",
            plane
        )
    };

    format!(
        "if(lte(abs(X-W/2)\\,W*P/2)*lte(abs(Y-H/2)\\,H*P/2)\\,if(eq(PLANE\\,0)\\,{}\\,if(eq(PLANE\\,1)\\,{}\\,if(eq(PLANE\\,2)\\,{}\\,{})))\\,B)",
        sample(0),
        sample(1),
        sample(2),
        sample(3)
    )
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "fade" => Ok(Self::Fade),
            "crossfade" | "dissolve" => Ok(Self::Crossfade),
            "slide-left" | "slideleft" => Ok(Self::SlideLeft),
            "slide-right" | "slideright" => Ok(Self::SlideRight),
            "zoom-in" | "zoomin" => Ok(Self::ZoomIn),
            "zoom-out" | "zoomout" => Ok(Self::ZoomOut),
            other => Err(format!("unknown transition '{}'", other)),
        }
    }
}

/// How transitions are chosen for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransitionPolicy {
    /// Uniform pick per adjacent pair from a seeded generator
    Random,
    /// Hard cuts, no overlap
    None,
    /// The same kind for every pair
    Fixed(TransitionKind),
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "none" | "cut" => Ok(Self::None),
            other => other.parse().map(Self::Fixed),
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::None => f.write_str("none"),
            Self::Fixed(kind) => write!(f, "{}", kind),
        }
    }
}

impl TryFrom<String> for TransitionPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransitionPolicy> for String {
    fn from(policy: TransitionPolicy) -> Self {
        policy.to_string()
    }
}

/// A concrete transition between two segments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,

    /// Overlap in seconds, already snapped to the frame grid
    pub duration: f64,
}

impl TransitionSpec {
    pub fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }
}
