use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::convert::ConversionOptions;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file; output is written next to the input
    Convert {
        /// Input file
        input: PathBuf,

        /// Target format (extension without the dot)
        format: String,

        #[command(flatten)]
        transcode: TranscodeArgs,
    },

    /// Print the capability map as JSON
    Formats {
        /// Only show formats reachable from this input extension
        #[arg(short, long)]
        ext: Option<String>,
    },

    /// Check which external tools can be started
    Check,

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "fluxify.toml")]
        path: PathBuf,
    },
}

/// Media options; ignored by converters that have no use for them
#[derive(clap::Args, Debug, Default)]
pub struct TranscodeArgs {
    /// Favor slower, higher quality encoder settings
    #[arg(long)]
    pub high_quality: bool,

    /// Re-encode even when input and output formats match
    #[arg(long)]
    pub force_transcode: bool,

    #[arg(long)]
    pub video_codec: Option<String>,

    #[arg(long)]
    pub audio_codec: Option<String>,

    /// Audio bitrate, e.g. 192k
    #[arg(long)]
    pub audio_bitrate: Option<String>,

    /// Encoder preset, e.g. slow or medium
    #[arg(long)]
    pub preset: Option<String>,

    /// Constant rate factor (0-51, lower is better)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=51))]
    pub crf: Option<u8>,

    /// Video filter chain, e.g. fps=10,scale=480:-1
    #[arg(long)]
    pub filters: Option<String>,
}

impl From<TranscodeArgs> for ConversionOptions {
    fn from(args: TranscodeArgs) -> Self {
        Self {
            high_quality: args.high_quality,
            force_transcode: args.force_transcode,
            video_codec: args.video_codec,
            audio_codec: args.audio_codec,
            audio_bitrate: args.audio_bitrate,
            preset: args.preset,
            crf: args.crf,
            filters: args.filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_with_transcode_flags() {
        let args = Args::try_parse_from([
            "fluxify", "-v", "convert", "clip.mov", "mp4", "--high-quality", "--crf", "20",
        ])
        .unwrap();
        assert!(args.verbose);

        match args.command {
            Commands::Convert { input, format, transcode } => {
                assert_eq!(input, PathBuf::from("clip.mov"));
                assert_eq!(format, "mp4");
                let options = ConversionOptions::from(transcode);
                assert!(options.high_quality);
                assert!(!options.force_transcode);
                assert_eq!(options.crf, Some(20));
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_crf_out_of_range() {
        assert!(Args::try_parse_from(["fluxify", "convert", "a.mp4", "mkv", "--crf", "80"]).is_err());
    }

    #[test]
    fn test_init_config_default_path() {
        let args = Args::try_parse_from(["fluxify", "init-config"]).unwrap();
        assert!(matches!(args.command, Commands::InitConfig { path } if path == PathBuf::from("fluxify.toml")));
    }
}
