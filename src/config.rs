use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::error::{Result, FluxifyError};

fn default_interpreters() -> Vec<String> {
    vec!["python3".to_string(), "python".to_string(), "py".to_string()]
}

fn default_image_magick() -> String {
    if cfg!(windows) { "magick".to_string() } else { "convert".to_string() }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Kill external tools that run longer than this many seconds.
    /// Unset means a tool may run indefinitely.
    pub tool_timeout_secs: Option<u64>,
    pub tools: ToolsConfig,
    pub media: MediaConfig,
    pub pdf: PdfConfig,
    pub image: ImageConfig,
    pub tabular: TabularConfig,
    pub registry: RegistryConfig,
}

/// Binary names (or absolute paths) of the external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub soffice: String,
    pub pdftoppm: String,
    pub pdftotext: String,
    pub pdftohtml: String,
    pub tesseract: String,
    pub pandoc: String,
    /// ImageMagick entry point; `magick` is invoked with a `convert` subcommand
    pub image_magick: String,
    pub pdflatex: String,
    /// Interpreter used for the pdf2docx reconstruction step
    pub python: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Filter chain applied when producing GIFs
    pub gif_filters: String,
    /// Audio bitrate used when high quality is requested without an override
    pub audio_bitrate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Rasterization resolution for page images and OCR
    pub dpi: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub quality: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    /// Replaces the built-in table helper; run as `<interpreter> <script> <in> <out>`
    pub helper_script: Option<PathBuf>,
    /// Interpreter aliases tried in order until one starts
    #[serde(default = "default_interpreters")]
    pub interpreters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Per-converter priority overrides keyed by converter name
    pub priorities: HashMap<String, i32>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            soffice: "soffice".to_string(),
            pdftoppm: "pdftoppm".to_string(),
            pdftotext: "pdftotext".to_string(),
            pdftohtml: "pdftohtml".to_string(),
            tesseract: "tesseract".to_string(),
            pandoc: "pandoc".to_string(),
            image_magick: default_image_magick(),
            pdflatex: "pdflatex".to_string(),
            python: "python".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            gif_filters: "fps=15,scale=320:-1".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            helper_script: None,
            interpreters: default_interpreters(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FluxifyError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FluxifyError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FluxifyError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FluxifyError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<std::time::Duration> {
        self.tool_timeout_secs.map(std::time::Duration::from_secs)
    }
}
