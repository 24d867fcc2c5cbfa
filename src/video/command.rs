//! FFmpeg command builder and blocking runner.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tokio::task;
use tracing::debug;

use crate::error::{AssemblyError, ResourceError, Result};

/// One `-i` input with the arguments that must precede it
#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_args: Vec<String>,
    output: PathBuf,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Add a file input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path.as_ref().to_string_lossy())
    }

    /// Add a trimmed file input (`-ss start -t length` before `-i`).
    pub fn trimmed_input(self, path: impl AsRef<Path>, start: f64, length: f64) -> Self {
        self.input_with(
            [
                "-ss".to_string(),
                format!("{:.3}", start),
                "-t".to_string(),
                format!("{:.3}", length),
            ],
            path.as_ref().to_string_lossy(),
        )
    }

    /// Add an input that starts decoding at `at` seconds.
    pub fn seeked_input(self, path: impl AsRef<Path>, at: f64) -> Self {
        self.input_with(["-ss".to_string(), format!("{:.3}", at)], path.as_ref().to_string_lossy())
    }

    /// Add a lavfi source such as `color=c=black:s=1080x1920:d=2`.
    pub fn lavfi_input(self, graph: impl Into<String>) -> Self {
        self.input_with(["-f", "lavfi"], graph.into())
    }

    fn input_with<I, S>(mut self, args: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    /// Add output arguments (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn frame_rate(self, fps: f64) -> Self {
        self.output_arg("-r").output_arg(format_rate(fps))
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn threads(self, threads: usize) -> Self {
        self.output_arg("-threads").output_arg(threads.to_string())
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-v".to_string(),
            "error".to_string(),
        ];

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// Run to completion on the blocking pool.
    pub async fn run(&self) -> Result<()> {
        let args = self.build_args();
        debug!("Running: ffmpeg {}", args.join(" "));

        let output = run_tool("ffmpeg", args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssemblyError::CommandFailed {
                reason: format!(
                    "exit {:?}: {}",
                    output.status.code(),
                    stderr.trim().chars().take(800).collect::<String>()
                ),
            }
            .into());
        }

        Ok(())
    }
}

/// Spawn an external tool on the blocking pool and collect its output.
pub async fn run_tool(tool: &str, args: Vec<String>) -> Result<Output> {
    let program = which::which(tool).map_err(|_| ResourceError::ToolNotFound {
        tool: tool.to_string(),
    })?;

    let tool_name = tool.to_string();
    let output = task::spawn_blocking(move || {
        Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
    })
    .await
    .map_err(|e| AssemblyError::CommandFailed {
        reason: format!("failed to join {} task: {}", tool_name, e),
    })??;

    Ok(output)
}

/// Whether both ffmpeg and ffprobe are on PATH.
pub fn check_tools() -> Result<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        which::which(tool).map_err(|_| ResourceError::ToolNotFound {
            tool: tool.to_string(),
        })?;
    }
    Ok(())
}

/// Frame rates print without float noise ("30", "29.97").
pub fn format_rate(fps: f64) -> String {
    let rounded = (fps * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("out.mp4")
            .trimmed_input("in.mp4", 2.0, 7.5)
            .lavfi_input("anullsrc=r=44100:cl=stereo")
            .video_codec("libx264")
            .crf(18)
            .frame_rate(30.0);

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let first_input = args.iter().position(|a| a == "in.mp4").unwrap();
        assert!(ss < first_input);
        assert_eq!(args[ss + 1], "2.000");
        assert!(args.contains(&"7.500".to_string()));
        assert!(args.contains(&"lavfi".to_string()));
        assert!(args.contains(&"30".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_rate_formatting() {
        assert_eq!(format_rate(30.0), "30");
        assert_eq!(format_rate(29.97002997), "29.97");
        assert_eq!(format_rate(23.976), "23.976");
    }
}
