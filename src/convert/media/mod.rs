// ffmpeg-backed audio/video transcoding
//
// - params: decides stream copy vs. encode, codecs, quality and filters
// - MediaConverter: turns the plan into one ffmpeg invocation

pub mod params;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

pub use params::{synthesize, TranscodePlan, AUDIO_FORMATS, VIDEO_FORMATS};

use crate::config::{Config, MediaConfig};
use crate::error::Result;
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{split_input, ConversionOutput, ConversionRequest, ConverterTrait};

const INPUTS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "3gp",
    "mp3", "wav", "aac", "ogg", "flac", "m4a",
];

const OUTPUTS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "3gp", "gif",
    "mp3", "wav", "aac", "ogg", "flac", "m4a",
];

pub struct MediaConverter {
    ffmpeg: String,
    config: MediaConfig,
    runner: Arc<dyn CommandRunner>,
}

impl MediaConverter {
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            config: config.media.clone(),
            runner,
        }
    }

    /// Build the ffmpeg command for `plan`
    pub fn build_command(&self, input: &Path, output: &Path, plan: &TranscodePlan) -> ToolCommand {
        let cmd = ToolCommand::new(&self.ffmpeg, format!("Transcode to {}", output.display()))
            .overwrite()
            .input(input);
        plan.apply(cmd).output(output)
    }
}

#[async_trait]
impl ConverterTrait for MediaConverter {
    fn name(&self) -> &'static str {
        "media"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &'static [&'static str] {
        OUTPUTS
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        let ext = self.check_request(request)?;
        let plan = synthesize(&ext, &request.output_format, &request.options, &self.config)?;
        info!("Media plan for {} -> {}: {:?}", ext, request.output_format, plan);

        let output = request.default_output_path();

        // ffmpeg cannot write over its own input; same-format requests go
        // through a sibling file that replaces the input afterwards.
        if output == request.input_path {
            let (dir, stem) = split_input(&request.input_path)?;
            let staging = dir.join(format!("{}.transcoding.{}", stem, request.output_format));
            execute(self.runner.as_ref(), &self.build_command(&request.input_path, &staging, &plan)).await?;
            fs::rename(&staging, &output).await?;
        } else {
            execute(self.runner.as_ref(), &self.build_command(&request.input_path, &output, &plan)).await?;
        }

        info!("Media conversion completed: {}", output.display());
        Ok(ConversionOutput::Single(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConversionOptions;
    use crate::error::FluxifyError;
    use crate::tool::{MockCommandRunner, ToolOutput};
    use std::sync::Mutex;

    fn converter(runner: MockCommandRunner) -> MediaConverter {
        MediaConverter::new(&Config::default(), Arc::new(runner))
    }

    /// Runner that records commands and writes bytes to the last argument
    fn recording_runner(seen: Arc<Mutex<Vec<ToolCommand>>>) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |cmd| {
            seen.lock().unwrap().push(cmd.clone());
            if let Some(out) = cmd.args.last() {
                std::fs::write(out, b"media").unwrap();
            }
            Ok(ToolOutput::success())
        });
        runner
    }

    #[tokio::test]
    async fn test_same_format_uses_stream_copy_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"original").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = converter(recording_runner(seen.clone()));
        let output = converter
            .convert(&ConversionRequest::new(&input, "mp4"))
            .await
            .unwrap();

        assert_eq!(output, ConversionOutput::Single(input.clone()));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].arg_value("-c"), Some("copy"));
        assert!(!seen[0].has_arg("-crf"));
        assert!(!seen[0].has_arg("-preset"));
        assert_eq!(std::fs::read(&input).unwrap(), b"media");
        assert!(!dir.path().join("clip.transcoding.mp4").exists());
    }

    #[tokio::test]
    async fn test_transcode_command_shape() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mov");
        std::fs::write(&input, b"original").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let converter = converter(recording_runner(seen.clone()));
        let request = ConversionRequest::new(&input, "mp4").with_options(ConversionOptions {
            high_quality: true,
            ..Default::default()
        });
        converter.convert(&request).await.unwrap();

        let seen = seen.lock().unwrap();
        let cmd = &seen[0];
        assert_eq!(cmd.program, "ffmpeg");
        assert_eq!(&cmd.args[..3], &["-y".to_string(), "-i".to_string(), input.display().to_string()]);
        assert_eq!(cmd.arg_value("-preset"), Some("slow"));
        assert_eq!(cmd.arg_value("-crf"), Some("18"));
        assert_eq!(cmd.args.last().unwrap(), &dir.path().join("clip.mp4").display().to_string());
    }

    #[tokio::test]
    async fn test_audio_to_video_never_invokes_tool() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let err = converter(runner)
            .convert(&ConversionRequest::new("/tmp/clip.mp3", "mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FluxifyError::CannotConvertAudioToVideo { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_code() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(ToolOutput::failure(1, "Invalid data found when processing input")));

        let err = converter(runner)
            .convert(&ConversionRequest::new("/tmp/broken.avi", "mp4"))
            .await
            .unwrap_err();
        match err {
            FluxifyError::ToolInvocationFailure { code, stderr, .. } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("Invalid data"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
