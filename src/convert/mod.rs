// Conversion strategies
//
// Each converter wraps one family of external tools behind `ConverterTrait`:
// - office: LibreOffice headless conversion
// - pdf_extract: PDF -> docx/txt/html/md through fallback chains
// - media: ffmpeg transcoding with synthesized codec/quality parameters
// - pdf_raster: PDF pages -> images via pdftoppm
// - archive: single-entry zip built in-process
// - image: ImageMagick conversion
// - latex: pdflatex, optionally followed by pandoc
// - text: plain text -> markup/documents via pandoc
// - tabular: table formats through an external helper or in-process fallback
//
// To add a converter, implement `ConverterTrait`, add a variant to
// `ConverterImplementation` and wire it into `ConverterFactory`.

pub mod archive;
pub mod image;
pub mod latex;
pub mod media;
pub mod office;
pub mod pdf_extract;
pub mod pdf_raster;
pub mod tabular;
pub mod text;

use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{FluxifyError, Result};
use crate::tool::CommandRunner;

/// Caller-supplied knobs. Converters ignore the keys they have no use for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConversionOptions {
    /// Favor slower, higher quality transcode settings
    pub high_quality: bool,
    /// Re-encode even when input and output formats match
    pub force_transcode: bool,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub preset: Option<String>,
    /// Constant rate factor, lower is higher quality. Accepts `20` or `"20"`
    #[serde(deserialize_with = "number_or_text")]
    pub crf: Option<u8>,
    pub filters: Option<String>,
}

fn number_or_text<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u8),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => match text.trim() {
            "" => Ok(None),
            trimmed => trimmed
                .parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid crf {:?}", trimmed))),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    pub output_format: String,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new<P: Into<PathBuf>, S: AsRef<str>>(input_path: P, output_format: S) -> Self {
        Self {
            input_path: input_path.into(),
            output_format: output_format.as_ref().trim().to_lowercase(),
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// Lower-cased extension of the input path, empty when there is none
    pub fn input_extension(&self) -> String {
        extension_of(&self.input_path)
    }

    /// `<dir>/<stem>.<output_format>` next to the input
    pub fn default_output_path(&self) -> PathBuf {
        output_path_for(&self.input_path, &self.output_format)
    }
}

/// Paths produced by one conversion, all in the requested format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutput {
    Single(PathBuf),
    /// Several files, e.g. one image per PDF page
    Multiple(Vec<PathBuf>),
}

impl ConversionOutput {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Single(path) => vec![path.as_path()],
            Self::Multiple(paths) => paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            Self::Single(path) => vec![path],
            Self::Multiple(paths) => paths,
        }
    }
}

/// Main trait for conversion strategies
#[async_trait]
pub trait ConverterTrait: Send + Sync {
    /// Stable identifier, used for priority overrides and logging
    fn name(&self) -> &'static str;

    /// Lower-cased input extensions this converter accepts
    fn input_extensions(&self) -> &'static [&'static str];

    /// Output formats this converter can produce; never empty
    fn output_formats(&self) -> &'static [&'static str];

    fn supports(&self, ext: &str, format: &str) -> bool {
        self.input_extensions().contains(&ext) && self.output_formats().contains(&format)
    }

    /// Validate a request against the declared sets, returning the input extension
    fn check_request(&self, request: &ConversionRequest) -> Result<String> {
        let ext = request.input_extension();
        if !self.input_extensions().contains(&ext.as_str()) {
            return Err(FluxifyError::UnsupportedFormat(format!(
                "{} does not accept .{} input",
                self.name(),
                ext
            )));
        }
        if !self.output_formats().contains(&request.output_format.as_str()) {
            return Err(FluxifyError::UnsupportedFormat(format!(
                "{} cannot produce .{}",
                self.name(),
                request.output_format
            )));
        }
        Ok(ext)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput>;
}

/// Built-in converter kinds, in default registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterImplementation {
    Office,
    PdfExtract,
    Media,
    PdfRaster,
    Archive,
    Image,
    Latex,
    Text,
    Tabular,
}

impl ConverterImplementation {
    pub const ALL: [ConverterImplementation; 9] = [
        Self::Office,
        Self::PdfExtract,
        Self::Media,
        Self::PdfRaster,
        Self::Archive,
        Self::Image,
        Self::Latex,
        Self::Text,
        Self::Tabular,
    ];
}

/// Factory for creating converter instances
pub struct ConverterFactory;

impl ConverterFactory {
    pub fn create_converter(
        implementation: ConverterImplementation,
        config: &Config,
        runner: Arc<dyn CommandRunner>,
    ) -> Box<dyn ConverterTrait> {
        match implementation {
            ConverterImplementation::Office => {
                Box::new(office::OfficeConverter::new(config.tools.clone(), runner))
            }
            ConverterImplementation::PdfExtract => {
                Box::new(pdf_extract::PdfExtractConverter::new(config, runner))
            }
            ConverterImplementation::Media => {
                Box::new(media::MediaConverter::new(config, runner))
            }
            ConverterImplementation::PdfRaster => {
                Box::new(pdf_raster::PdfRasterConverter::new(config, runner))
            }
            ConverterImplementation::Archive => Box::new(archive::ArchiveConverter::new()),
            ConverterImplementation::Image => {
                Box::new(image::ImageConverter::new(config, runner))
            }
            ConverterImplementation::Latex => {
                Box::new(latex::LatexConverter::new(config.tools.clone(), runner))
            }
            ConverterImplementation::Text => {
                Box::new(text::TextConverter::new(config.tools.clone(), runner))
            }
            ConverterImplementation::Tabular => {
                Box::new(tabular::TabularConverter::new(config.tabular.clone(), runner))
            }
        }
    }

    /// Every built-in converter, in default registration order
    pub fn create_all(config: &Config, runner: Arc<dyn CommandRunner>) -> Vec<Box<dyn ConverterTrait>> {
        ConverterImplementation::ALL
            .iter()
            .map(|implementation| Self::create_converter(*implementation, config, runner.clone()))
            .collect()
    }
}

/// Lower-cased extension of `path`, empty when there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Directory and file stem of `path`
pub fn split_input(path: &Path) -> Result<(PathBuf, String)> {
    let stem = path
        .file_stem()
        .ok_or_else(|| FluxifyError::UnsupportedFormat(format!("Invalid input filename: {}", path.display())))?
        .to_string_lossy()
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, stem))
}

/// Same directory, same base name, extension replaced by `format`
pub fn output_path_for(input: &Path, format: &str) -> PathBuf {
    input.with_extension(format)
}
