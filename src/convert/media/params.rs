//! Codec, quality and filter selection for ffmpeg transcodes.
//!
//! Decision table, evaluated in order:
//!
//! | output | condition                                        | plan                    |
//! |--------|--------------------------------------------------|-------------------------|
//! | video  | video input, same extension, no force            | stream copy (`-c copy`) |
//! | video  | otherwise                                        | x264-style encode       |
//! | audio  | audio input, same extension, no force            | `-vn -c:a copy`         |
//! | audio  | otherwise                                        | `-vn` + codec by target |
//! | gif    | always                                           | filter chain, `-an`     |
//!
//! Audio sources can never produce video or gif targets.

use crate::config::MediaConfig;
use crate::convert::ConversionOptions;
use crate::error::{FluxifyError, Result};
use crate::tool::ToolCommand;

pub const VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "3gp"];
pub const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "aac", "ogg", "flac", "m4a"];
pub const GIF_FORMAT: &str = "gif";

const DEFAULT_VIDEO_CODEC: &str = "libx264";
const DEFAULT_AUDIO_CODEC: &str = "aac";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Gif,
}

pub fn media_kind(ext: &str) -> Option<MediaKind> {
    if VIDEO_FORMATS.contains(&ext) {
        Some(MediaKind::Video)
    } else if AUDIO_FORMATS.contains(&ext) {
        Some(MediaKind::Audio)
    } else if ext == GIF_FORMAT {
        Some(MediaKind::Gif)
    } else {
        None
    }
}

/// Encoder used for an audio-only target
pub fn audio_codec_for(ext: &str) -> &'static str {
    match ext {
        "mp3" => "libmp3lame",
        "aac" | "m4a" => "aac",
        "ogg" => "libvorbis",
        "flac" => "flac",
        "wav" => "pcm_s16le",
        _ => "copy",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodePlan {
    /// Remux every stream without re-encoding
    StreamCopy,
    EncodeVideo {
        video_codec: String,
        preset: String,
        crf: u8,
        audio_codec: String,
        audio_bitrate: Option<String>,
    },
    /// Drop video, keep the audio bitstream
    CopyAudio,
    EncodeAudio {
        audio_codec: String,
        audio_bitrate: Option<String>,
    },
    Gif {
        filters: String,
    },
}

impl TranscodePlan {
    pub fn is_stream_copy(&self) -> bool {
        matches!(self, Self::StreamCopy | Self::CopyAudio)
    }

    /// Append this plan's arguments to an ffmpeg command
    pub fn apply(&self, cmd: ToolCommand) -> ToolCommand {
        match self {
            Self::StreamCopy => cmd.copy_streams(),
            Self::EncodeVideo {
                video_codec,
                preset,
                crf,
                audio_codec,
                audio_bitrate,
            } => {
                let cmd = cmd
                    .video_codec(video_codec.as_str())
                    .arg("-preset")
                    .arg(preset.as_str())
                    .arg("-crf")
                    .arg(crf.to_string())
                    .audio_codec(audio_codec.as_str());
                match audio_bitrate {
                    Some(bitrate) => cmd.audio_bitrate(bitrate.as_str()),
                    None => cmd,
                }
            }
            Self::CopyAudio => cmd.no_video().copy_audio(),
            Self::EncodeAudio {
                audio_codec,
                audio_bitrate,
            } => {
                let cmd = cmd.no_video().audio_codec(audio_codec.as_str());
                match audio_bitrate {
                    Some(bitrate) => cmd.audio_bitrate(bitrate.as_str()),
                    None => cmd,
                }
            }
            Self::Gif { filters } => cmd.video_filter(filters.as_str()).no_audio(),
        }
    }
}

/// Bitrate is applied whenever one is given or high quality is requested
fn audio_bitrate(options: &ConversionOptions, config: &MediaConfig) -> Option<String> {
    match (&options.audio_bitrate, options.high_quality) {
        (Some(bitrate), _) => Some(bitrate.clone()),
        (None, true) => Some(config.audio_bitrate.clone()),
        (None, false) => None,
    }
}

/// Pick the transcode plan for `input_ext` -> `output_format`
pub fn synthesize(
    input_ext: &str,
    output_format: &str,
    options: &ConversionOptions,
    config: &MediaConfig,
) -> Result<TranscodePlan> {
    let input_kind = match media_kind(input_ext) {
        Some(MediaKind::Gif) | None => {
            return Err(FluxifyError::UnsupportedFormat(format!("media input .{}", input_ext)));
        }
        Some(kind) => kind,
    };
    let output_kind = media_kind(output_format)
        .ok_or_else(|| FluxifyError::UnsupportedFormat(format!("media output .{}", output_format)))?;

    if input_kind == MediaKind::Audio && output_kind != MediaKind::Audio {
        return Err(FluxifyError::CannotConvertAudioToVideo {
            input: input_ext.to_string(),
            output: output_format.to_string(),
        });
    }

    let same_format = input_ext == output_format && !options.force_transcode;

    let plan = match output_kind {
        MediaKind::Video if same_format => TranscodePlan::StreamCopy,
        MediaKind::Video => TranscodePlan::EncodeVideo {
            video_codec: options
                .video_codec
                .clone()
                .unwrap_or_else(|| DEFAULT_VIDEO_CODEC.to_string()),
            preset: options
                .preset
                .clone()
                .unwrap_or_else(|| (if options.high_quality { "slow" } else { "medium" }).to_string()),
            crf: options
                .crf
                .unwrap_or(if options.high_quality { 18 } else { 23 }),
            audio_codec: options
                .audio_codec
                .clone()
                .unwrap_or_else(|| DEFAULT_AUDIO_CODEC.to_string()),
            audio_bitrate: audio_bitrate(options, config),
        },
        MediaKind::Audio if same_format => TranscodePlan::CopyAudio,
        MediaKind::Audio => TranscodePlan::EncodeAudio {
            audio_codec: options
                .audio_codec
                .clone()
                .unwrap_or_else(|| audio_codec_for(output_format).to_string()),
            audio_bitrate: audio_bitrate(options, config),
        },
        MediaKind::Gif => TranscodePlan::Gif {
            filters: options
                .filters
                .clone()
                .unwrap_or_else(|| config.gif_filters.clone()),
        },
    };

    Ok(plan)
}
