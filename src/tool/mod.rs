// External tool invocation
//
// Every converter talks to the outside world through the `CommandRunner` port:
// - command: `ToolCommand` builder (generic args plus ffmpeg helpers)
// - runner: the port itself and the process-backed `SystemRunner`

pub mod command;
pub mod runner;

use serde::Serialize;
use tracing::info;

pub use command::ToolCommand;
pub use runner::{CommandRunner, SystemRunner, ToolOutput};
#[cfg(test)]
pub use runner::MockCommandRunner;

use crate::config::ToolsConfig;
use crate::error::{FluxifyError, Result};

/// Run a command and treat a non-zero exit as an error
pub async fn execute(runner: &dyn CommandRunner, command: &ToolCommand) -> Result<ToolOutput> {
    runner.run(command).await?.into_result(command)
}

/// Availability of one configured tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: &'static str,
    pub program: String,
    pub available: bool,
    pub detail: String,
}

/// Probe every configured tool with its version flag.
///
/// A tool counts as available when it can be started; some tools (poppler)
/// exit non-zero on `-v`.
pub async fn check_availability(runner: &dyn CommandRunner, tools: &ToolsConfig) -> Vec<ToolStatus> {
    let checks: [(&'static str, &str, &str); 10] = [
        ("ffmpeg", &tools.ffmpeg, "-version"),
        ("soffice", &tools.soffice, "--version"),
        ("pdftoppm", &tools.pdftoppm, "-v"),
        ("pdftotext", &tools.pdftotext, "-v"),
        ("pdftohtml", &tools.pdftohtml, "-v"),
        ("tesseract", &tools.tesseract, "--version"),
        ("pandoc", &tools.pandoc, "--version"),
        ("imagemagick", &tools.image_magick, "-version"),
        ("pdflatex", &tools.pdflatex, "--version"),
        ("python", &tools.python, "--version"),
    ];

    let mut statuses = Vec::with_capacity(checks.len());
    for (name, program, flag) in checks {
        let command = ToolCommand::new(program, format!("{} version check", name)).arg(flag);
        let status = match runner.run(&command).await {
            Ok(output) => {
                let text = if output.stdout.trim().is_empty() { output.stderr } else { output.stdout };
                ToolStatus {
                    name,
                    program: program.to_string(),
                    available: true,
                    detail: text.lines().next().unwrap_or("").trim().to_string(),
                }
            }
            Err(FluxifyError::ToolNotAvailable { reason, .. }) => ToolStatus {
                name,
                program: program.to_string(),
                available: false,
                detail: reason,
            },
            Err(e) => ToolStatus {
                name,
                program: program.to_string(),
                available: false,
                detail: e.to_string(),
            },
        };
        info!("{}: {}", name, if status.available { "available" } else { "missing" });
        statuses.push(status);
    }
    statuses
}
