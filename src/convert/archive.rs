use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{FluxifyError, Result};
use super::{ConversionOutput, ConversionRequest, ConverterTrait};

/// Packs the input into a single-entry zip archive, in-process
#[derive(Debug, Default)]
pub struct ArchiveConverter;

impl ArchiveConverter {
    pub fn new() -> Self {
        Self
    }
}

/// Write `input` as the only entry of a deflate-compressed zip at `output`
pub fn write_single_entry_zip(input: &Path, output: &Path) -> Result<u64> {
    let entry_name = input
        .file_name()
        .ok_or_else(|| FluxifyError::UnsupportedFormat(format!("Invalid input filename: {}", input.display())))?
        .to_string_lossy()
        .to_string();

    let mut source = BufReader::new(File::open(input)?);
    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    zip.start_file(entry_name, options)?;
    let written = io::copy(&mut source, &mut zip)?;
    zip.finish()?;
    Ok(written)
}

#[async_trait]
impl ConverterTrait for ArchiveConverter {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        &[
            "pdf", "docx", "xlsx", "xls", "csv", "json", "xml", "txt", "html",
            "jpg", "jpeg", "png", "gif", "webp", "svg", "tiff",
            "mp4", "avi", "mov", "wmv", "flv", "mkv",
            "mp3", "wav", "ogg", "flac",
        ]
    }

    fn output_formats(&self) -> &'static [&'static str] {
        &["zip"]
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        self.check_request(request)?;
        let input: PathBuf = request.input_path.clone();
        let output = request.default_output_path();

        let target = output.clone();
        let written = tokio::task::spawn_blocking(move || write_single_entry_zip(&input, &target))
            .await
            .map_err(|e| FluxifyError::Io(io::Error::other(e)))??;

        info!("{} created ({} bytes archived)", output.display(), written);
        Ok(ConversionOutput::Single(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[tokio::test]
    async fn test_single_entry_named_after_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("1700-input.csv");
        std::fs::write(&input, "a,b\n1,2\n").unwrap();

        let output = ArchiveConverter::new()
            .convert(&ConversionRequest::new(&input, "zip"))
            .await
            .unwrap();
        let zip_path = dir.path().join("1700-input.zip");
        assert_eq!(output, ConversionOutput::Single(zip_path.clone()));

        let mut archive = ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "1700-input.csv");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArchiveConverter::new()
            .convert(&ConversionRequest::new(dir.path().join("gone.pdf"), "zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, FluxifyError::Io(_)));
    }
}
