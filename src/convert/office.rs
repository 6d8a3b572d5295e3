use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{split_input, ConversionOutput, ConversionRequest, ConverterTrait};

/// Office documents through a single headless LibreOffice pass
pub struct OfficeConverter {
    tools: ToolsConfig,
    runner: Arc<dyn CommandRunner>,
}

impl OfficeConverter {
    pub fn new(tools: ToolsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }
}

#[async_trait]
impl ConverterTrait for OfficeConverter {
    fn name(&self) -> &'static str {
        "office"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["docx", "odt", "pptx", "xls", "xlsx"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["pdf", "html", "txt"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let (dir, _) = split_input(&request.input_path)?;

        let command = ToolCommand::new(&self.tools.soffice, format!("LibreOffice convert to {}", request.output_format))
            .arg("--headless")
            .arg("--convert-to")
            .arg(request.output_format.as_str())
            .path(&request.input_path)
            .arg("--outdir")
            .path(&dir);
        execute(self.runner.as_ref(), &command).await?;

        let output = request.default_output_path();
        info!("LibreOffice produced {}", output.display());
        Ok(ConversionOutput::Single(output))
    }
}
