//! The seam between the pipeline and the external transcoder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    error::{AssemblyError, Result, ValidationError},
    video::{
        command::{check_tools, run_tool, FfmpegCommand},
        filters::{normalize_chain, silent_audio_source, TextOverlay},
        probe::{parse_ffprobe_json, ProbeInfo},
        Frame, OutputParams,
    },
};

/// CRF used for intermediates; the final encode applies the configured quality
const INTERMEDIATE_CRF: u8 = 18;

/// Render one trimmed source window, normalized to the output geometry
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub source: PathBuf,
    pub start: f64,
    pub length: f64,
    /// Without audio a silent track is synthesized
    pub has_audio: bool,
    /// Drawn in order on top of the normalized frame
    pub overlays: Vec<TextOverlay>,
    pub output: PathBuf,
    pub params: OutputParams,
    pub font_file: Option<PathBuf>,
}

/// Render a black card, optionally with centered text
#[derive(Debug, Clone)]
pub struct CardJob {
    pub duration: f64,
    pub text: Option<TextOverlay>,
    pub output: PathBuf,
    pub params: OutputParams,
    pub font_file: Option<PathBuf>,
}

/// Stitch normalized intermediates with a prepared filter graph
#[derive(Debug, Clone)]
pub struct TimelineJob {
    pub inputs: Vec<PathBuf>,
    /// Must expose `[vout]` and `[aout]`
    pub filter_graph: String,
    pub output: PathBuf,
    pub params: OutputParams,
    pub threads: usize,
}

/// Everything the pipeline needs from a transcoder.
///
/// Calls are blocking external work and are awaited one at a time.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Stream facts for a file, or `ProbeFailed`
    async fn probe(&self, path: &Path) -> Result<ProbeInfo>;

    /// Decode the frame nearest to `at` seconds, or `DecodeFailed`
    async fn decode_frame(&self, path: &Path, at: f64) -> Result<Frame>;

    /// Re-encode with an explicit frame rate
    async fn reencode(&self, input: &Path, output: &Path, fps: f64) -> Result<()>;

    async fn render_segment(&self, job: &SegmentJob) -> Result<()>;

    async fn render_card(&self, job: &CardJob) -> Result<()>;

    async fn render_timeline(&self, job: &TimelineJob) -> Result<()>;
}

/// `MediaBackend` backed by the ffmpeg and ffprobe executables
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    /// Fails with `ToolNotFound` when ffmpeg or ffprobe is missing from PATH
    pub fn new() -> Result<Self> {
        check_tools()?;
        Ok(Self)
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ];

        let output = run_tool("ffprobe", args).await?;
        let failed = |reason: String| ValidationError::ProbeFailed {
            path: path.display().to_string(),
            reason,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(failed(if stderr.is_empty() {
                format!("ffprobe exited with {:?}", output.status.code())
            } else {
                stderr
            })
            .into());
        }

        let mut info = parse_ffprobe_json(&output.stdout).map_err(failed)?;
        if info.size == 0 {
            info.size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        }

        debug!(
            "Probed {}: {:?}s @ {:?} fps, {}x{}",
            path.display(),
            info.duration,
            info.fps,
            info.width,
            info.height
        );
        Ok(info)
    }

    async fn decode_frame(&self, path: &Path, at: f64) -> Result<Frame> {
        let decode_failed = |reason: String| ValidationError::DecodeFailed {
            path: path.display().to_string(),
            timestamp: at,
            reason,
        };

        let still = tempfile::Builder::new()
            .prefix("probe_frame_")
            .suffix(".png")
            .tempfile()?;

        FfmpegCommand::new(still.path())
            .seeked_input(path, at)
            .single_frame()
            .run()
            .await
            .map_err(|e| decode_failed(e.to_string()))?;

        let image = image::open(still.path()).map_err(|e| decode_failed(e.to_string()))?;
        let frame = Frame::new(image.to_rgb8());

        if frame.is_empty() {
            return Err(decode_failed("decoder returned an empty frame".to_string()).into());
        }

        Ok(frame)
    }

    async fn reencode(&self, input: &Path, output: &Path, fps: f64) -> Result<()> {
        FfmpegCommand::new(output)
            .input(input)
            .video_codec("libx264")
            .preset("medium")
            .frame_rate(fps)
            .output_args(["-pix_fmt", "yuv420p"])
            .audio_codec("aac")
            .audio_bitrate("128k")
            .run()
            .await
    }

    async fn render_segment(&self, job: &SegmentJob) -> Result<()> {
        let chain = job.overlays.iter().fold(normalize_chain(&job.params), |chain, overlay| {
            format!("{},{}", chain, overlay.to_filter(job.font_file.as_deref()))
        });

        let mut cmd = FfmpegCommand::new(&job.output).trimmed_input(&job.source, job.start, job.length);
        let audio = if job.has_audio {
            "0:a:0"
        } else {
            cmd = cmd.lavfi_input(silent_audio_source(job.length));
            "1:a:0"
        };

        cmd.filter_complex(format!("[0:v]{}[v]", chain))
            .map("[v]")
            .map(audio)
            .video_codec("libx264")
            .crf(INTERMEDIATE_CRF)
            .preset("veryfast")
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_args(["-ar", "44100", "-ac", "2", "-t"])
            .output_arg(format!("{:.3}", job.length))
            .run()
            .await
    }

    async fn render_card(&self, job: &CardJob) -> Result<()> {
        let (w, h) = job.params.resolution();
        let rate = crate::video::command::format_rate(job.params.fps);

        let mut chain = "format=yuv420p".to_string();
        if let Some(text) = &job.text {
            chain = format!("{},{}", text.to_filter(job.font_file.as_deref()), chain);
        }

        FfmpegCommand::new(&job.output)
            .lavfi_input(format!("color=c=black:s={}x{}:r={}:d={:.3}", w, h, rate, job.duration))
            .lavfi_input(silent_audio_source(job.duration))
            .video_filter(chain)
            .map("0:v")
            .map("1:a")
            .video_codec("libx264")
            .crf(INTERMEDIATE_CRF)
            .preset("veryfast")
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_arg("-t")
            .output_arg(format!("{:.3}", job.duration))
            .run()
            .await
    }

    async fn render_timeline(&self, job: &TimelineJob) -> Result<()> {
        if job.inputs.is_empty() {
            return Err(AssemblyError::CommandFailed {
                reason: "timeline has no inputs".to_string(),
            }
            .into());
        }

        let cmd = job
            .inputs
            .iter()
            .fold(FfmpegCommand::new(&job.output), |cmd, input| cmd.input(input));

        cmd.filter_complex(job.filter_graph.clone())
            .map("[vout]")
            .map("[aout]")
            .video_codec(job.params.codec.clone())
            .crf(job.params.crf())
            .preset(job.params.preset.clone())
            .threads(job.threads)
            .audio_codec("aac")
            .audio_bitrate("128k")
            .output_args(["-movflags", "+faststart"])
            .run()
            .await
    }
}
