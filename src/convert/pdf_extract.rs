//! PDF text/structure extraction and PDF -> editable document conversion.
//!
//! Both directions are unreliable with any single tool, so each runs an
//! ordered [`FallbackChain`]:
//!
//! - docx: pdf2docx layout reconstruction, LibreOffice PDF import, then
//!   pdftohtml followed by pandoc.
//! - txt/html/md: pdftotext `-layout`, pdftohtml `-xml` read back as text,
//!   then OCR of rasterized pages. The first non-blank text is written
//!   directly (txt) or run through pandoc (html, md).

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::config::{Config, ToolsConfig};
use crate::error::{FluxifyError, Result};
use crate::fallback::{ChainOutcome, FallbackChain};
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::pdf_raster::collect_pages;
use super::{split_input, ConversionOutput, ConversionRequest, ConverterTrait};

/// Run as `python -c <script> <input.pdf> <output.docx>`
const PDF2DOCX_SCRIPT: &str = "import sys
from pdf2docx import Converter
cv = Converter(sys.argv[1])
cv.convert(sys.argv[2], start=0, end=None)
cv.close()
";

pub struct PdfExtractConverter {
    tools: ToolsConfig,
    dpi: u32,
    runner: Arc<dyn CommandRunner>,
}

impl PdfExtractConverter {
    pub fn new(config: &Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            tools: config.tools.clone(),
            dpi: config.pdf.dpi,
            runner,
        }
    }

    // ── PDF -> DOCX ────────────────────────────────────────────────

    pub async fn to_docx(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        let (dir, stem) = split_input(input)?;

        FallbackChain::new(format!("{} -> docx", input.display()))
            .attempt("pdf2docx", || self.reconstruct_layout(input, output))
            .attempt("libreoffice-pdf-import", || self.office_import(input, output, &dir))
            .attempt("pdftohtml+pandoc", || self.html_pipeline(input, output, &stem))
            .run_or_exhausted()
            .await
    }

    async fn reconstruct_layout(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        clear_target(output).await?;
        let command = ToolCommand::new(&self.tools.python, "pdf2docx layout reconstruction")
            .arg("-c")
            .arg(PDF2DOCX_SCRIPT)
            .path(input)
            .path(output);
        execute(self.runner.as_ref(), &command).await?;
        Ok(output.to_path_buf())
    }

    async fn office_import(&self, input: &Path, output: &Path, dir: &Path) -> Result<PathBuf> {
        clear_target(output).await?;
        let command = ToolCommand::new(&self.tools.soffice, "LibreOffice PDF import")
            .arg("--headless")
            .arg("--infilter=writer_pdf_import")
            .arg("--convert-to")
            .arg("docx:MS Word 2007 XML")
            .arg("--outdir")
            .path(dir)
            .path(input);
        execute(self.runner.as_ref(), &command).await?;
        Ok(output.to_path_buf())
    }

    async fn html_pipeline(&self, input: &Path, output: &Path, stem: &str) -> Result<PathBuf> {
        clear_target(output).await?;
        let html = execute(
            self.runner.as_ref(),
            &ToolCommand::new(&self.tools.pdftohtml, "pdftohtml to HTML")
                .args(["-s", "-i", "-noframes", "-stdout"])
                .path(input),
        )
        .await?
        .stdout;
        if html.trim().is_empty() {
            return Err(FluxifyError::EmptyOutputFailure {
                path: input.to_path_buf(),
            });
        }

        let scratch = tempfile::Builder::new().prefix("fluxify-html-").tempdir()?;
        let html_path = scratch.path().join(format!("{}.html", stem));
        fs::write(&html_path, html).await?;

        let command = ToolCommand::new(&self.tools.pandoc, "pandoc HTML -> docx")
            .path(&html_path)
            .arg("-o")
            .path(output)
            .arg("-t")
            .arg("docx");
        execute(self.runner.as_ref(), &command).await?;
        Ok(output.to_path_buf())
    }

    // ── PDF -> text ────────────────────────────────────────────────

    /// First non-blank text from the extraction chain
    pub async fn extract_text(&self, input: &Path) -> Result<String> {
        let outcome = FallbackChain::new(format!("{} text extraction", input.display()))
            .attempt("pdftotext", || self.text_with_layout(input))
            .attempt("pdftohtml-xml", || self.text_from_markup(input))
            .attempt("ocr", || self.text_from_ocr(input))
            .run()
            .await;

        match outcome {
            ChainOutcome::Succeeded { attempt, value, .. } => {
                info!("Extracted {} bytes of text with {}", value.len(), attempt);
                Ok(value)
            }
            ChainOutcome::AllFailed(failures) => Err(FluxifyError::NoExtractableText { failures }),
        }
    }

    async fn text_with_layout(&self, input: &Path) -> Result<String> {
        let command = ToolCommand::new(&self.tools.pdftotext, "pdftotext layout extraction")
            .arg("-layout")
            .path(input)
            .arg("-");
        Ok(execute(self.runner.as_ref(), &command).await?.stdout)
    }

    async fn text_from_markup(&self, input: &Path) -> Result<String> {
        let command = ToolCommand::new(&self.tools.pdftohtml, "pdftohtml structured extraction")
            .args(["-xml", "-i", "-stdout"])
            .path(input);
        let xml = execute(self.runner.as_ref(), &command).await?.stdout;
        markup_to_text(&xml)
    }

    async fn text_from_ocr(&self, input: &Path) -> Result<String> {
        let scratch = tempfile::Builder::new().prefix("fluxify-ocr-").tempdir()?;
        let prefix = scratch.path().join("page");

        let rasterize = ToolCommand::new(&self.tools.pdftoppm, "Rasterize PDF for OCR")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .path(input)
            .path(&prefix);
        execute(self.runner.as_ref(), &rasterize).await?;

        let pages = collect_pages(&prefix, "png").await?;
        if pages.is_empty() {
            return Err(FluxifyError::EmptyOutputFailure { path: prefix });
        }

        let mut text = String::new();
        for page in &pages {
            let command = ToolCommand::new(&self.tools.tesseract, "OCR page")
                .path(page)
                .arg("stdout");
            let recognized = execute(self.runner.as_ref(), &command).await?.stdout;
            debug!("OCR {}: {} bytes", page.display(), recognized.len());
            text.push_str(recognized.trim_end());
            text.push_str("\n\n");
        }
        Ok(text)
    }

    async fn write_text(&self, text: &str, output: &Path, format: &str, stem: &str) -> Result<()> {
        if format == "txt" {
            fs::write(output, text).await?;
            return Ok(());
        }

        let scratch = tempfile::Builder::new().prefix("fluxify-text-").tempdir()?;
        let txt_path = scratch.path().join(format!("{}.txt", stem));
        fs::write(&txt_path, text).await?;

        let writer = if format == "md" { "markdown" } else { "html" };
        let command = ToolCommand::new(&self.tools.pandoc, format!("pandoc text -> {}", writer))
            .path(&txt_path)
            .arg("-t")
            .arg(writer)
            .arg("-o")
            .path(output);
        execute(self.runner.as_ref(), &command).await?;
        Ok(())
    }
}

/// Remove whatever an earlier attempt left at `path`
async fn clear_target(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Text content of `<text>` elements from `pdftohtml -xml`, one per line,
/// with a blank line between pages.
pub fn markup_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"text" => in_text += 1,
            Event::End(e) if e.name().as_ref() == b"text" => {
                in_text = in_text.saturating_sub(1);
                if in_text == 0 {
                    let line = current.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                    current.clear();
                }
            }
            Event::End(e) if e.name().as_ref() == b"page" => {
                if lines.last().is_some_and(|l| !l.is_empty()) {
                    lines.push(String::new());
                }
            }
            Event::Text(t) if in_text > 0 => match t.unescape() {
                Ok(text) => current.push_str(&text),
                Err(_) => current.push_str(&String::from_utf8_lossy(&t)),
            },
            Event::Eof => break,
            _ => {}
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    Ok(lines.join("\n"))
}

#[async_trait]
impl ConverterTrait for PdfExtractConverter {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["docx", "txt", "html", "md"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let output = request.default_output_path();

        if request.output_format == "docx" {
            let docx = self.to_docx(&request.input_path, &output).await?;
            return Ok(ConversionOutput::Single(docx));
        }

        let (_, stem) = split_input(&request.input_path)?;
        let text = self.extract_text(&request.input_path).await?;
        self.write_text(&text, &output, &request.output_format, &stem).await?;
        Ok(ConversionOutput::Single(output))
    }
}
