use async_trait::async_trait;
use std::sync::Arc;
use tokio::fs;

use crate::config::ToolsConfig;
use crate::error::{FluxifyError, Result};
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{ConversionOutput, ConversionRequest, ConverterTrait};

/// Plain text to documents and markup through pandoc
pub struct TextConverter {
    tools: ToolsConfig,
    runner: Arc<dyn CommandRunner>,
}

impl TextConverter {
    pub fn new(tools: ToolsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }
}

#[async_trait]
impl ConverterTrait for TextConverter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["txt"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["docx", "html", "md", "pdf"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        if !fs::try_exists(&request.input_path).await? {
            return Err(FluxifyError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Input file not found: {}", request.input_path.display()),
            )));
        }

        let output = request.default_output_path();
        let mut command = ToolCommand::new(&self.tools.pandoc, format!("pandoc txt -> {}", request.output_format))
            .path(&request.input_path);
        if request.output_format == "md" {
            command = command.arg("-t").arg("markdown");
        }
        command = command.arg("-o").path(&output);

        execute(self.runner.as_ref(), &command).await?;
        Ok(ConversionOutput::Single(output))
    }
}
