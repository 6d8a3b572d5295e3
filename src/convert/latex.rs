use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::ToolsConfig;
use crate::error::Result;
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{output_path_for, split_input, ConversionOutput, ConversionRequest, ConverterTrait};

/// LaTeX sources compiled with pdflatex, then optionally handed to pandoc.
/// Either phase failing ends the request.
pub struct LatexConverter {
    tools: ToolsConfig,
    runner: Arc<dyn CommandRunner>,
}

impl LatexConverter {
    pub fn new(tools: ToolsConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }
}

#[async_trait]
impl ConverterTrait for LatexConverter {
    fn name(&self) -> &'static str {
        "latex"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["tex", "latex"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["pdf", "docx", "html", "txt"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let (dir, _) = split_input(&request.input_path)?;

        let compile = ToolCommand::new(&self.tools.pdflatex, "LaTeX compilation")
            .arg("-interaction=nonstopmode")
            .arg(format!("-output-directory={}", dir.display()))
            .path(&request.input_path);
        execute(self.runner.as_ref(), &compile).await?;

        let pdf = output_path_for(&request.input_path, "pdf");
        info!("Compiled {}", pdf.display());
        if request.output_format == "pdf" {
            return Ok(ConversionOutput::Single(pdf));
        }

        let output = request.default_output_path();
        let convert = ToolCommand::new(&self.tools.pandoc, format!("pandoc pdf -> {}", request.output_format))
            .path(&pdf)
            .arg("-o")
            .path(&output)
            .arg(format!("--to={}", request.output_format));
        execute(self.runner.as_ref(), &convert).await?;

        Ok(ConversionOutput::Single(output))
    }
}
