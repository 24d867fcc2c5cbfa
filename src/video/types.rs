use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::video::probe::ProbeInfo;

/// A single decoded video frame
///
/// Only used to confirm that a stream actually decodes; the heavy lifting
/// happens inside ffmpeg filter graphs.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    #[cfg(test)]
    pub(crate) fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = image::ImageBuffer::from_fn(width, height, |_, _| image::Rgb(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// A frame with zero area is what a broken decoder hands back
    pub fn is_empty(&self) -> bool {
        self.buffer.width() == 0 || self.buffer.height() == 0
    }
}

/// Where a clip stands after validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipValidity {
    Unchecked,
    Valid,
    Invalid,
    Repaired,
}

/// A candidate source video considered for inclusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClip {
    /// Stable identifier, used for attribution and in results
    pub id: String,

    /// Path to the video file
    pub path: PathBuf,

    /// Ordering key (from filenames like "01_intro.mp4", otherwise pool position)
    pub sequence_number: u32,

    /// Original creator handle, if known
    #[serde(default)]
    pub author: Option<String>,

    /// Original description or title, if known
    #[serde(default)]
    pub title: Option<String>,

    /// Duration in seconds (if known)
    #[serde(default)]
    pub duration: Option<f64>,

    /// Frame rate (if known)
    #[serde(default)]
    pub fps: Option<f64>,

    /// Resolution (width, height)
    #[serde(default)]
    pub resolution: Option<(u32, u32)>,

    #[serde(default)]
    pub has_audio: bool,

    /// Rotation metadata in degrees
    #[serde(default)]
    pub rotation: Option<i32>,

    pub validity: ClipValidity,
}

impl SourceClip {
    /// Create a new, unchecked clip whose id is the file stem
    pub fn new<P: Into<PathBuf>>(path: P, sequence_number: u32) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("clip")
            .to_string();

        Self {
            id,
            path,
            sequence_number,
            author: None,
            title: None,
            duration: None,
            fps: None,
            resolution: None,
            has_audio: false,
            rotation: None,
            validity: ClipValidity::Unchecked,
        }
    }

    /// Parse sequence number from a filename like "01_intro.mp4"
    pub fn from_numbered_path<P: Into<PathBuf>>(path: P) -> Option<Self> {
        let path = path.into();
        let filename = path.file_stem()?.to_str()?;

        let (number, _name) = filename.split_once('_')?;
        let sequence_number = number.parse().ok()?;

        Some(Self::new(path, sequence_number))
    }

    pub fn with_author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Valid or repaired clips may enter a plan
    pub fn is_usable(&self) -> bool {
        matches!(self.validity, ClipValidity::Valid | ClipValidity::Repaired)
    }

    /// Known duration, zero when the clip was never probed
    pub fn usable_duration(&self) -> f64 {
        self.duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0)
    }

    /// Copy probed stream facts onto the clip
    pub fn apply_probe(&mut self, probe: &ProbeInfo) {
        self.duration = probe.duration;
        self.fps = probe.fps;
        self.resolution = Some((probe.width, probe.height));
        self.has_audio = probe.has_audio;
        self.rotation = probe.rotation;
    }

    /// Attribution handle as shown on screen
    pub fn handle(&self) -> Option<String> {
        format_handle(self.author.as_deref()?)
    }
}

/// `@author`, leaving existing `@`/`#` prefixes alone; `None` when blank
pub fn format_handle(author: &str) -> Option<String> {
    let author = author.trim();
    if author.is_empty() {
        return None;
    }
    if author.starts_with('@') || author.starts_with('#') {
        Some(author.to_string())
    } else {
        Some(format!("@{}", author))
    }
}

/// How a source frame is forced into the output geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Scale to cover and crop the overflow from the center
    Crop,
    /// Scale to fit and pad with black bars
    Letterbox,
}

impl FromStr for FitPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crop" => Ok(Self::Crop),
            "letterbox" | "pad" => Ok(Self::Letterbox),
            other => Err(format!("unknown fit policy '{}'", other)),
        }
    }
}

impl fmt::Display for FitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crop => write!(f, "crop"),
            Self::Letterbox => write!(f, "letterbox"),
        }
    }
}

/// Output encoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    pub width: u32,

    pub height: u32,

    /// Target frame rate for output
    pub fps: f64,

    /// Video codec to use for output
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// x264 preset
    pub preset: String,

    pub fit: FitPolicy,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30.0,
            codec: "libx264".to_string(),
            quality: 75,
            preset: "medium".to_string(),
            fit: FitPolicy::Crop,
        }
    }
}

impl OutputParams {
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn crf(&self) -> u8 {
        (51 - ((self.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_path_parsing() {
        let clip = SourceClip::from_numbered_path("clips/07_skate_trick.mp4").unwrap();
        assert_eq!(clip.sequence_number, 7);
        assert_eq!(clip.id, "07_skate_trick");
        assert_eq!(clip.validity, ClipValidity::Unchecked);

        assert!(SourceClip::from_numbered_path("clips/skate.mp4").is_none());
        assert!(SourceClip::from_numbered_path("clips/ab_skate.mp4").is_none());
    }

    #[test]
    fn test_handle_formatting() {
        let clip = SourceClip::new("a.mp4", 1).with_author("dancer99");
        assert_eq!(clip.handle().as_deref(), Some("@dancer99"));

        let tagged = SourceClip::new("a.mp4", 1).with_author("@already");
        assert_eq!(tagged.handle().as_deref(), Some("@already"));

        let blank = SourceClip::new("a.mp4", 1).with_author("  ");
        assert_eq!(blank.handle(), None);
    }

    #[test]
    fn test_usable_states() {
        let mut clip = SourceClip::new("a.mp4", 1);
        assert!(!clip.is_usable());
        clip.validity = ClipValidity::Repaired;
        assert!(clip.is_usable());
        clip.validity = ClipValidity::Invalid;
        assert!(!clip.is_usable());
    }

    #[test]
    fn test_quality_to_crf() {
        let mut params = OutputParams::default();
        params.quality = 100;
        assert_eq!(params.crf(), 0);
        params.quality = 0;
        assert_eq!(params.crf(), 51);
    }

    #[test]
    fn test_fit_policy_parsing() {
        assert_eq!("crop".parse::<FitPolicy>().unwrap(), FitPolicy::Crop);
        assert_eq!("Letterbox".parse::<FitPolicy>().unwrap(), FitPolicy::Letterbox);
        assert!("stretch".parse::<FitPolicy>().is_err());
    }

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::new_filled(4, 2, [10, 20, 30]);
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert!(!frame.is_empty());
    }
}
