use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// One failed step of a fallback chain, kept for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub attempt: String,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attempt, self.reason)
    }
}

fn join_failures(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "<signal>".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum FluxifyError {
    #[error("No converter for {ext} -> {format}")]
    NoRouteFound { ext: String, format: String },

    #[error("Tool '{tool}' could not be started: {reason}")]
    ToolNotAvailable { tool: String, reason: String },

    #[error("Tool '{tool}' exited with code {}: {stderr}", describe_code(.code))]
    ToolInvocationFailure {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Tool '{tool}' timed out after {secs}s")]
    ToolTimedOut { tool: String, secs: u64 },

    #[error("Conversion produced no output or an empty file: {}", .path.display())]
    EmptyOutputFailure { path: PathBuf },

    #[error("All fallbacks exhausted for {chain}: {}", join_failures(.failures))]
    AllFallbacksExhausted {
        chain: String,
        failures: Vec<AttemptFailure>,
    },

    #[error("No text could be extracted from PDF: {}", join_failures(.failures))]
    NoExtractableText { failures: Vec<AttemptFailure> },

    #[error("Cannot convert audio (.{input}) to video (.{output})")]
    CannotConvertAudioToVideo { input: String, output: String },

    #[error("Conversion unsupported without the table helper: {input} -> {output}")]
    ConversionUnsupportedWithoutHelper { input: String, output: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FluxifyError {
    /// Failure reasons recorded by a fallback chain, if this error carries any.
    pub fn attempt_failures(&self) -> Option<&[AttemptFailure]> {
        match self {
            Self::AllFallbacksExhausted { failures, .. } | Self::NoExtractableText { failures } => {
                Some(failures)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FluxifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_attempts_in_order() {
        let err = FluxifyError::AllFallbacksExhausted {
            chain: "pdf -> docx".to_string(),
            failures: vec![
                AttemptFailure { attempt: "pdf2docx".into(), reason: "exit 1".into() },
                AttemptFailure { attempt: "libreoffice".into(), reason: "empty".into() },
            ],
        };
        assert_eq!(
            err.to_string(),
            "All fallbacks exhausted for pdf -> docx: pdf2docx: exit 1; libreoffice: empty"
        );
        assert_eq!(err.attempt_failures().map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_invocation_failure_without_code() {
        let err = FluxifyError::ToolInvocationFailure {
            tool: "ffmpeg".into(),
            code: None,
            stderr: "killed".into(),
        };
        assert!(err.to_string().contains("<signal>"));
    }
}
