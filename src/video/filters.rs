//! Filter-chain fragments shared by segment, card and timeline renders.

use std::path::Path;

use crate::video::{command::format_rate, FitPolicy, OutputParams};

/// Scale/crop (or pad) to the output geometry, then fix rate and pixel format.
pub fn normalize_chain(params: &OutputParams) -> String {
    let (w, h) = params.resolution();
    let fit = match params.fit {
        FitPolicy::Crop => format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}"
        ),
        FitPolicy::Letterbox => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black"
        ),
    };

    format!("{fit},setsar=1,fps={},format=yuv420p", format_rate(params.fps))
}

/// Silent stereo track for sources without audio
pub fn silent_audio_source(duration: f64) -> String {
    format!("anullsrc=channel_layout=stereo:sample_rate=44100:d={:.3}", duration)
}

/// Escape text for a single-quoted drawtext `text` value.
///
/// Apostrophes cannot appear inside the quotes and become typographic ones.
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\\\\\"),
            '\'' => escaped.push('\u{2019}'),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\\\%"),
            '\n' | '\r' => escaped.push(' '),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Where a text overlay sits vertically
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextPlacement {
    Top,
    Center,
    /// Lower third, clear of platform UI
    Bottom,
    /// Call-to-action strip near the bottom edge
    Banner,
}

impl TextPlacement {
    fn y_expr(&self) -> &'static str {
        match self {
            Self::Top => "h*0.05",
            Self::Center => "(h-text_h)/2",
            Self::Bottom => "h*0.78-text_h",
            Self::Banner => "h*0.85-text_h/2",
        }
    }
}

/// A burned-in drawtext overlay
#[derive(Debug, Clone)]
pub struct TextOverlay {
    pub text: String,
    pub font_size: u32,
    pub placement: TextPlacement,
    /// Shown only between these timestamps when set
    pub window: Option<(f64, f64)>,
    pub boxed: bool,
}

impl TextOverlay {
    /// Font size as a fraction of the output height
    pub fn new(text: impl Into<String>, height: u32, font_ratio: f64, placement: TextPlacement) -> Self {
        Self {
            text: text.into(),
            font_size: ((height as f64 * font_ratio).round() as u32).max(8),
            placement,
            window: None,
            boxed: true,
        }
    }

    pub fn between(mut self, start: f64, end: f64) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn unboxed(mut self) -> Self {
        self.boxed = false;
        self
    }

    pub fn to_filter(&self, font_file: Option<&Path>) -> String {
        let mut filter = String::from("drawtext=");

        if let Some(font) = font_file {
            filter.push_str(&format!(
                "fontfile='{}':",
                font.to_string_lossy().replace('\\', "/").replace(':', "\\:")
            ));
        }

        filter.push_str(&format!(
            "text='{}':fontsize={}:fontcolor=white:x=(w-text_w)/2:y={}",
            escape_drawtext(&self.text),
            self.font_size,
            self.placement.y_expr()
        ));

        if self.boxed {
            filter.push_str(":box=1:boxcolor=black@0.5:boxborderw=12");
        } else {
            filter.push_str(":borderw=2:bordercolor=black");
        }

        if let Some((start, end)) = self.window {
            filter.push_str(&format!(":enable='between(t,{:.3},{:.3})'", start, end));
        }

        filter
    }
}
