use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{ConversionOutput, ConversionRequest, ConverterTrait};

/// Raster/vector image conversion through ImageMagick
pub struct ImageConverter {
    program: String,
    quality: u32,
    runner: Arc<dyn CommandRunner>,
}

impl ImageConverter {
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: config.tools.image_magick.clone(),
            quality: config.image.quality,
            runner,
        }
    }

    fn build_command(&self, input: &Path, output: &Path) -> ToolCommand {
        magick_command(&self.program, format!("ImageMagick convert to {}", output.display()))
            .path(input)
            .arg("-quality")
            .arg(self.quality.to_string())
            .arg("-resize")
            .arg("100%")
            .arg("-colorspace")
            .arg("RGB")
            .path(output)
    }
}

/// ImageMagick invocation; ImageMagick 7's `magick` binary takes `convert` as a subcommand
pub(crate) fn magick_command(program: &str, description: String) -> ToolCommand {
    let cmd = ToolCommand::new(program, description);
    match is_magick(program) {
        true => cmd.arg("convert"),
        false => cmd,
    }
}

fn is_magick(program: &str) -> bool {
    Path::new(program)
        .file_stem()
        .map(|stem| stem.eq_ignore_ascii_case("magick"))
        .unwrap_or(false)
}

#[async_trait]
impl ConverterTrait for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["jpg", "png", "gif", "bmp", "tiff", "webp", "svg", "pdf"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let output = request.default_output_path();
        execute(self.runner.as_ref(), &self.build_command(&request.input_path, &output)).await?;
        info!("Image written to {}", output.display());
        Ok(ConversionOutput::Single(output))
    }
}
