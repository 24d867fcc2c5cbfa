use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    selection::TrimOffset,
    transitions::TransitionPolicy,
    video::OutputParams,
};

/// Hard ceiling for a Shorts upload, in seconds
pub const SHORTS_MAX_SECONDS: f64 = 60.0;

/// Main configuration for the Reel-Compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Long-form compilation settings
    pub compilation: CompilationConfig,

    /// Multi-clip Shorts settings
    pub shorts: ShortsConfig,

    /// Transition selection between adjacent segments
    pub transitions: TransitionConfig,

    /// Output geometry and encoding
    pub output: OutputParams,

    /// Intro/outro, title card and overlay settings
    pub assets: AssetConfig,

    /// Workspace and failure-handling settings
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.compilation.validate()?;
        self.shorts.validate()?;
        self.transitions.validate()?;
        self.validate_output()?;
        self.assets.validate()?;
        self.runtime.validate()?;

        let shortest = self
            .compilation
            .min_segment_length
            .min(self.shorts.min_segment_length);
        if self.transitions.uses_overlap() && self.transitions.duration >= shortest {
            return Err(invalid(
                "transitions.duration",
                format!("{} (must be shorter than the minimum segment {})", self.transitions.duration, shortest),
            ));
        }

        Ok(())
    }

    fn validate_output(&self) -> Result<()> {
        let output = &self.output;

        if output.width == 0 || output.height == 0 || output.width % 2 != 0 || output.height % 2 != 0 {
            return Err(invalid(
                "output.resolution",
                format!("{}x{}", output.width, output.height),
            ));
        }

        if !(output.fps.is_finite() && output.fps > 0.0) {
            return Err(invalid("output.fps", output.fps.to_string()));
        }

        if output.quality > 100 {
            return Err(invalid("output.quality", output.quality.to_string()));
        }

        if output.codec.trim().is_empty() {
            return Err(ConfigError::MissingKey { key: "output.codec".to_string() }.into());
        }

        Ok(())
    }
}

/// Long-form compilation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilationConfig {
    /// Duration budget for the whole output (seconds)
    pub target_duration: f64,

    /// No planned segment is shorter than this (seconds)
    pub min_segment_length: f64,

    /// Optional ceiling on a single segment (seconds)
    pub max_segment_length: Option<f64>,

    pub max_clips: usize,

    /// Fewer usable clips than this fails the run
    pub min_clips: usize,

    /// Where inside a source clip the window is taken from
    pub trim_offset: TrimOffset,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            target_duration: 300.0,
            min_segment_length: 3.0,
            max_segment_length: None,
            max_clips: 200,
            min_clips: 3,
            trim_offset: TrimOffset::LeadIn,
        }
    }
}

impl CompilationConfig {
    fn validate(&self) -> Result<()> {
        if !(self.target_duration.is_finite() && self.target_duration > 0.0) {
            return Err(invalid("compilation.target_duration", self.target_duration.to_string()));
        }

        validate_segment_range(
            "compilation",
            self.min_segment_length,
            self.max_segment_length,
        )?;

        if self.max_clips == 0 || self.min_clips > self.max_clips {
            return Err(invalid(
                "compilation.clip_count_range",
                format!("{}-{}", self.min_clips, self.max_clips),
            ));
        }

        Ok(())
    }
}

/// Multi-clip Shorts configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortsConfig {
    /// Duration ceiling, never above 60 s
    pub hard_cap_seconds: f64,

    pub min_segment_length: f64,

    pub max_segment_length: Option<f64>,

    pub max_clips: usize,

    pub min_clips: usize,

    pub trim_offset: TrimOffset,

    /// Burn creator credit and the call-to-action onto standalone Shorts
    pub branding: bool,

    /// Credited on Shorts cut from a finished compilation
    pub channel_name: String,

    /// Banner text near the bottom of standalone Shorts
    pub call_to_action: Option<String>,
}

impl Default for ShortsConfig {
    fn default() -> Self {
        Self {
            // one second of headroom under the platform limit
            hard_cap_seconds: 59.0,
            min_segment_length: 3.0,
            max_segment_length: None,
            max_clips: 8,
            min_clips: 1,
            trim_offset: TrimOffset::LeadIn,
            branding: true,
            channel_name: "Weekly Top Clips".to_string(),
            call_to_action: Some("WATCH FULL VIDEO ON YOUTUBE".to_string()),
        }
    }
}

impl ShortsConfig {
    /// Cap actually applied: clamped to the 60 s platform limit
    pub fn effective_cap(&self) -> f64 {
        self.hard_cap_seconds.min(SHORTS_MAX_SECONDS)
    }

    fn validate(&self) -> Result<()> {
        if !(self.hard_cap_seconds > 0.0 && self.hard_cap_seconds <= SHORTS_MAX_SECONDS) {
            return Err(invalid("shorts.hard_cap_seconds", self.hard_cap_seconds.to_string()));
        }

        validate_segment_range("shorts", self.min_segment_length, self.max_segment_length)?;

        if self.max_clips == 0 || self.min_clips > self.max_clips {
            return Err(invalid(
                "shorts.clip_count_range",
                format!("{}-{}", self.min_clips, self.max_clips),
            ));
        }

        Ok(())
    }
}

/// Transition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// `random`, `none`, or a fixed kind such as `crossfade`
    pub transition_type: TransitionPolicy,

    /// Overlap between adjacent segments (seconds)
    pub duration: f64,

    /// Seed for the random policy; a fresh one is drawn per run when unset
    pub seed: Option<u64>,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            transition_type: TransitionPolicy::Random,
            duration: 0.5,
            seed: None,
        }
    }
}

impl TransitionConfig {
    /// Whether joins between clips overlap at all
    pub fn uses_overlap(&self) -> bool {
        !matches!(self.transition_type, TransitionPolicy::None)
    }

    fn validate(&self) -> Result<()> {
        if self.uses_overlap() && !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(invalid("transitions.duration", self.duration.to_string()));
        }
        Ok(())
    }
}

/// Intro/outro assets, title card and text overlays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub use_intro: bool,

    pub intro_path: Option<PathBuf>,

    pub use_outro: bool,

    pub outro_path: Option<PathBuf>,

    /// Prepend a title card and burn `@author` onto each segment
    pub include_titles: bool,

    /// Upper bound for the title card (seconds)
    pub title_card_max: f64,

    /// Title card share of the budget
    pub title_card_ratio: f64,

    /// Attribution font size as a fraction of output height
    pub attribution_font_ratio: f64,

    /// Caption font size as a fraction of output height
    pub caption_font_ratio: f64,

    /// Font for drawtext; ffmpeg's default font when unset
    pub font_file: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            use_intro: false,
            intro_path: None,
            use_outro: false,
            outro_path: None,
            include_titles: true,
            title_card_max: 2.0,
            title_card_ratio: 0.1,
            attribution_font_ratio: 0.035,
            caption_font_ratio: 0.045,
            font_file: None,
        }
    }
}

impl AssetConfig {
    /// Title card length for a given budget
    pub fn title_card_duration(&self, budget: f64) -> f64 {
        if !self.include_titles {
            return 0.0;
        }
        self.title_card_max.min(self.title_card_ratio * budget).max(0.0)
    }

    /// Intro asset, if enabled
    pub fn intro(&self) -> Option<&Path> {
        self.use_intro.then_some(self.intro_path.as_deref()).flatten()
    }

    /// Outro asset, if enabled
    pub fn outro(&self) -> Option<&Path> {
        self.use_outro.then_some(self.outro_path.as_deref()).flatten()
    }

    fn validate(&self) -> Result<()> {
        if self.use_intro && self.intro_path.is_none() {
            return Err(ConfigError::MissingKey { key: "assets.intro_path".to_string() }.into());
        }

        if self.use_outro && self.outro_path.is_none() {
            return Err(ConfigError::MissingKey { key: "assets.outro_path".to_string() }.into());
        }

        for (key, ratio) in [
            ("assets.title_card_ratio", self.title_card_ratio),
            ("assets.attribution_font_ratio", self.attribution_font_ratio),
            ("assets.caption_font_ratio", self.caption_font_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(invalid(key, ratio.to_string()));
            }
        }

        if self.title_card_max < 0.0 {
            return Err(invalid("assets.title_card_max", self.title_card_max.to_string()));
        }

        Ok(())
    }
}

/// Runtime and failure-handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root under which each run creates its scratch directory
    pub temp_dir: PathBuf,

    /// Try to repair clips that fail validation but look repairable
    pub auto_repair: bool,

    /// Undershoot (seconds) tolerated before a shortfall is reported
    pub shortfall_tolerance: f64,

    /// Threads handed to the encoder
    pub encode_threads: usize,

    /// How many times a run may drop a clip and re-plan
    pub max_replans: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("data/temp"),
            auto_repair: true,
            shortfall_tolerance: 1.0,
            encode_threads: num_cpus::get(),
            max_replans: 5,
        }
    }
}

impl RuntimeConfig {
    fn validate(&self) -> Result<()> {
        if self.encode_threads == 0 {
            return Err(invalid("runtime.encode_threads", self.encode_threads.to_string()));
        }

        if !(self.shortfall_tolerance >= 0.0) {
            return Err(invalid("runtime.shortfall_tolerance", self.shortfall_tolerance.to_string()));
        }

        Ok(())
    }
}

fn validate_segment_range(section: &str, min: f64, max: Option<f64>) -> Result<()> {
    if !(min.is_finite() && min > 0.0) {
        return Err(invalid(&format!("{}.min_segment_length", section), min.to_string()));
    }

    if let Some(max) = max {
        if max < min {
            return Err(invalid(
                &format!("{}.segment_length_range", section),
                format!("{}-{}", min, max),
            ));
        }
    }

    Ok(())
}

fn invalid(key: &str, value: impl Into<String>) -> crate::error::CompositorError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
    .into()
}
