//! ffprobe output parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stream facts reported by ffprobe for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Container (or stream) duration, `None` when absent or unparsable
    pub duration: Option<f64>,

    /// Effective frame rate, `None` when ffprobe reports `0/0` or nothing
    pub fps: Option<f64>,

    /// Raw `r_frame_rate`, kept separately because repair re-encodes at it
    pub r_frame_rate: Option<f64>,

    pub width: u32,

    pub height: u32,

    pub codec: Option<String>,

    pub pix_fmt: Option<String>,

    pub has_audio: bool,

    /// Rotation in degrees from stream tags or display matrix side data
    pub rotation: Option<i32>,

    /// File size in bytes
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<i32>,
}

/// Parse ffprobe `-print_format json -show_format -show_streams` output.
///
/// Returns `Err` with a human readable reason when there is no video stream.
pub fn parse_ffprobe_json(bytes: &[u8]) -> std::result::Result<ProbeInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream found".to_string())?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_positive);
    let duration = format_duration.or_else(|| video.duration.as_deref().and_then(parse_positive));

    let r_frame_rate = video.r_frame_rate.as_deref().and_then(parse_frame_rate);
    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or(r_frame_rate);

    let rotation = video
        .tags
        .get("rotate")
        .and_then(|r| r.trim().parse::<i32>().ok())
        .or_else(|| video.side_data_list.iter().find_map(|s| s.rotation))
        .filter(|r| *r != 0);

    let size = probe
        .format
        .as_ref()
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(ProbeInfo {
        duration,
        fps,
        r_frame_rate,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        codec: video.codec_name.clone(),
        pix_fmt: video.pix_fmt.clone(),
        has_audio,
        rotation,
        size,
    })
}

/// Parse a rate like "30000/1001" or "25". Non-positive rates yield `None`.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let rate = rate.trim();
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };

    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_positive(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_parsing() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("0/1"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_full_probe() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 720, "height": 1280,
                 "pix_fmt": "yuv420p", "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001",
                 "tags": {"rotate": "90"}},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "14.250000", "size": "2048000"}
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, Some(14.25));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.r_frame_rate, Some(30.0));
        assert_eq!((info.width, info.height), (720, 1280));
        assert!(info.has_audio);
        assert_eq!(info.rotation, Some(90));
        assert_eq!(info.size, 2_048_000);
    }

    #[test]
    fn test_zero_fps_and_missing_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "r_frame_rate": "0/0", "avg_frame_rate": "0/0"}],
            "format": {}
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.fps, None);
        assert_eq!(info.duration, None);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_stream_duration_fallback() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "avg_frame_rate": "24/1", "duration": "8.0",
                         "side_data_list": [{"rotation": -90}]}]
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, Some(8.0));
        assert_eq!(info.rotation, Some(-90));
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_ffprobe_json(json).is_err());
        assert!(parse_ffprobe_json(b"not json").is_err());
    }
}
