use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{FluxifyError, Result};
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::image::magick_command;
use super::{output_path_for, split_input, ConversionOutput, ConversionRequest, ConverterTrait};

/// PDF pages rendered to images with pdftoppm; gif targets are assembled
/// into a single animation by ImageMagick.
pub struct PdfRasterConverter {
    pdftoppm: String,
    image_magick: String,
    dpi: u32,
    runner: Arc<dyn CommandRunner>,
}

impl PdfRasterConverter {
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            pdftoppm: config.tools.pdftoppm.clone(),
            image_magick: config.tools.image_magick.clone(),
            dpi: config.pdf.dpi,
            runner,
        }
    }

    /// Render every page of `input` to `<prefix>-<n>.<png|jpg>`
    pub async fn rasterize(&self, input: &Path, prefix: &Path, jpeg: bool) -> Result<Vec<PathBuf>> {
        let command = ToolCommand::new(&self.pdftoppm, "Rasterize PDF pages")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(if jpeg { "-jpeg" } else { "-png" })
            .path(input)
            .path(prefix);
        execute(self.runner.as_ref(), &command).await?;

        let pages = collect_pages(prefix, if jpeg { "jpg" } else { "png" }).await?;
        if pages.is_empty() {
            return Err(FluxifyError::EmptyOutputFailure {
                path: prefix.to_path_buf(),
            });
        }
        debug!("pdftoppm produced {} pages", pages.len());
        Ok(pages)
    }
}

/// Files named `<prefix>-<n>.<ext>` sorted by page number.
///
/// pdftoppm zero-pads page numbers for longer documents, so the number is
/// parsed rather than tried one by one.
pub async fn collect_pages(prefix: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let dir = match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = prefix
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lead = format!("{}-", stem);
    let tail = format!(".{}", ext);

    let mut numbered = Vec::new();
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        let page = name
            .strip_prefix(&lead)
            .and_then(|rest| rest.strip_suffix(&tail))
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok());
        if let Some(page) = page {
            numbered.push((page, entry.path()));
        }
    }
    numbered.sort_by_key(|(page, _)| *page);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

#[async_trait]
impl ConverterTrait for PdfRasterConverter {
    fn name(&self) -> &'static str {
        "pdf-raster"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["jpg", "png", "gif"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let (dir, stem) = split_input(&request.input_path)?;
        let prefix = dir.join(&stem);

        let jpeg = request.output_format == "jpg";
        let pages = self.rasterize(&request.input_path, &prefix, jpeg).await?;

        if request.output_format != "gif" {
            info!("Rendered {} page images", pages.len());
            return Ok(ConversionOutput::Multiple(pages));
        }

        let gif = output_path_for(&request.input_path, "gif");
        let mut command = magick_command(&self.image_magick, "Assemble animated GIF".to_string());
        for page in &pages {
            command = command.path(page);
        }
        command = command.path(&gif);
        execute(self.runner.as_ref(), &command).await?;

        for page in &pages {
            fs::remove_file(page).await?;
        }
        info!("Assembled {} pages into {}", pages.len(), gif.display());
        Ok(ConversionOutput::Single(gif))
    }
}
