// Tabular conversion
//
// - table: in-memory records plus csv/json/workbook readers and writers
// - workbook: xlsx and XML Spreadsheet 2003 writers, XML Spreadsheet reader
//
// The helper (embedded pandas script, or a configured replacement) handles
// every format pair; the in-process path only covers csv, xls, xlsx and json
// on both sides.

pub mod table;
pub mod workbook;

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TabularConfig;
use crate::error::{FluxifyError, Result};
use crate::fallback::non_empty_file;
use crate::tool::{execute, CommandRunner, ToolCommand};
use super::{ConversionOutput, ConversionRequest, ConverterTrait};
pub use table::Table;

const TABLE_FORMATS: &[&str] = &["csv", "xlsx", "xls", "json", "xml", "xlsb", "ods"];

/// Run as `<interpreter> -c <script> <input> <output>`; needs pandas, plus
/// xmltodict for xml and LibreOffice for xlsb/ods fallbacks.
pub const TABLE_HELPER_SCRIPT: &str = r#"import json, os, subprocess, sys
import pandas as pd


def ext_of(path):
    return os.path.splitext(path)[1][1:].lower()


def soffice(src, fmt):
    out_dir = os.path.dirname(os.path.abspath(src))
    subprocess.run(['soffice', '--headless', '--convert-to', fmt, '--outdir', out_dir, src], check=True)
    return os.path.splitext(src)[0] + '.' + fmt


def read(path, ext):
    if ext == 'csv':
        return pd.read_csv(path)
    if ext in ('xls', 'xlsx'):
        return pd.read_excel(path)
    if ext == 'json':
        return pd.read_json(path)
    if ext == 'xml':
        import xmltodict
        with open(path, 'rb') as f:
            return pd.json_normalize(xmltodict.parse(f))
    if ext in ('xlsb', 'ods'):
        try:
            return pd.read_excel(path, engine='pyxlsb' if ext == 'xlsb' else None)
        except Exception:
            return pd.read_csv(soffice(path, 'csv'))
    raise ValueError('unsupported input format: ' + ext)


def write(df, path, ext):
    if ext == 'csv':
        df.to_csv(path, index=False)
    elif ext in ('xls', 'xlsx'):
        df.to_excel(path, index=False)
    elif ext == 'json':
        df.to_json(path, orient='records', indent=2)
    elif ext == 'xml':
        import xmltodict
        rows = json.loads(df.to_json(orient='records'))
        with open(path, 'w') as f:
            f.write(xmltodict.unparse({'root': {'row': rows}}, pretty=True))
    elif ext in ('xlsb', 'ods'):
        staged = os.path.splitext(path)[0] + '.xlsx'
        df.to_excel(staged, index=False)
        soffice(staged, ext)
    else:
        raise ValueError('unsupported output format: ' + ext)


src, dst = sys.argv[1], sys.argv[2]
try:
    write(read(src, ext_of(src)), dst, ext_of(dst))
except Exception as e:
    print('Conversion error: %s' % e, file=sys.stderr)
    sys.exit(2)
if not (os.path.exists(dst) and os.path.getsize(dst) > 0):
    print('Failed to create output file: ' + dst, file=sys.stderr)
    sys.exit(3)
"#;

/// Formats the in-process fallback can read and write
pub const IN_PROCESS_FORMATS: &[&str] = &["csv", "xls", "xlsx", "json"];

pub struct TabularConverter {
    config: TabularConfig,
    runner: Arc<dyn CommandRunner>,
}

impl TabularConverter {
    pub fn new(config: TabularConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Helper invocation for one interpreter alias
    fn helper_command(&self, interpreter: &str, input: &Path, output: &Path) -> ToolCommand {
        let command = ToolCommand::new(interpreter, "Table conversion helper");
        let command = match &self.config.helper_script {
            Some(script) => command.path(script),
            None => command.arg("-c").arg(TABLE_HELPER_SCRIPT),
        };
        command.path(input).path(output)
    }

    /// Run the helper under each interpreter alias until one starts.
    ///
    /// Only a missing interpreter moves on to the next alias; a helper that
    /// ran and failed ends the helper stage.
    async fn run_helper(&self, input: &Path, output: &Path) -> Result<()> {
        let mut last_error = None;

        for interpreter in &self.config.interpreters {
            let command = self.helper_command(interpreter, input, output);

            match execute(self.runner.as_ref(), &command).await {
                Ok(_) if non_empty_file(output) => {
                    info!("Table helper succeeded ({})", interpreter);
                    return Ok(());
                }
                Ok(_) => {
                    return Err(FluxifyError::EmptyOutputFailure {
                        path: output.to_path_buf(),
                    })
                }
                Err(e @ FluxifyError::ToolNotAvailable { .. }) => {
                    debug!("{}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FluxifyError::ToolNotAvailable {
            tool: "table helper".to_string(),
            reason: "no interpreter configured".to_string(),
        }))
    }
}

/// Read `input` fully into a table and serialize it as `format`
pub fn convert_in_process(input: &Path, input_ext: &str, output: &Path, format: &str) -> Result<usize> {
    let table = Table::read(input, input_ext)?;
    match format {
        "json" => table.write_json(output)?,
        "csv" => table.write_csv(output)?,
        "xlsx" => workbook::write_xlsx(&table, output)?,
        "xls" => workbook::write_xml_spreadsheet(&table, output)?,
        other => {
            return Err(FluxifyError::UnsupportedFormat(format!(
                "cannot write .{} tables in-process",
                other
            )))
        }
    }
    Ok(table.len())
}

#[async_trait]
impl ConverterTrait for TabularConverter {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn input_extensions(&self) -> &'static [&'static str] {
        TABLE_FORMATS
    }

    fn output_formats(&self) -> &'static [&'static str] {
        TABLE_FORMATS
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        let ext = self.check_request(request)?;
        let format = request.output_format.clone();
        let output = request.default_output_path();

        match self.run_helper(&request.input_path, &output).await {
            Ok(()) => return Ok(ConversionOutput::Single(output)),
            Err(e) => warn!("Table helper failed, trying in-process conversion: {}", e),
        }

        if !IN_PROCESS_FORMATS.contains(&ext.as_str()) || !IN_PROCESS_FORMATS.contains(&format.as_str()) {
            return Err(FluxifyError::ConversionUnsupportedWithoutHelper {
                input: ext,
                output: format,
            });
        }

        let input: PathBuf = request.input_path.clone();
        let target = output.clone();
        let rows = tokio::task::spawn_blocking(move || convert_in_process(&input, &ext, &target, &format))
            .await
            .map_err(|e| FluxifyError::Io(io::Error::other(e)))??;

        info!("Wrote {} rows to {}", rows, output.display());
        Ok(ConversionOutput::Single(output))
    }
}
