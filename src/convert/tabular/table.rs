//! Row-oriented in-memory table used by the in-process fallback.
//!
//! A table is a list of records (column name -> value) plus the column order
//! as first encountered while reading.

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::workbook;
use crate::error::{FluxifyError, Result};

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    /// Build a table from records, collecting columns in first-seen order
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in &records {
            for key in record.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read `path` according to its lower-cased extension
    pub fn read(path: &Path, ext: &str) -> Result<Self> {
        match ext {
            "csv" => Self::read_csv(path),
            "json" => Self::read_json(path),
            "xls" if is_xml_document(path)? => workbook::read_xml_spreadsheet(path),
            "xls" | "xlsx" => Self::read_workbook(path),
            other => Err(FluxifyError::UnsupportedFormat(format!(
                "cannot read .{} tables in-process",
                other
            ))),
        }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let columns = unique_headers(reader.headers()?.iter().map(str::to_string));

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let record = columns
                .iter()
                .enumerate()
                .map(|(i, column)| (column.clone(), infer_value(row.get(i).unwrap_or(""))))
                .collect();
            records.push(record);
        }
        Ok(Self { columns, records })
    }

    /// Accepts an array of objects, or a single object as one record
    pub fn read_json(path: &Path) -> Result<Self> {
        let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let records = match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(FluxifyError::Spreadsheet(format!(
                        "expected an object per row, found {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
            Value::Object(record) => vec![record],
            other => {
                return Err(FluxifyError::Spreadsheet(format!(
                    "expected an array of objects, found {}",
                    other
                )))
            }
        };
        Ok(Self::from_records(records))
    }

    /// First worksheet, first row as header, blank cells as ""
    pub fn read_workbook(path: &Path) -> Result<Self> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| FluxifyError::Spreadsheet(e.to_string()))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| FluxifyError::Spreadsheet(format!("{} has no worksheets", path.display())))?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| FluxifyError::Spreadsheet(e.to_string()))?;

        Ok(Self::from_grid(
            range.rows().map(|row| row.iter().map(data_value).collect()),
        ))
    }

    /// First row names the columns; blank rows are skipped and short rows
    /// are padded with ""
    pub fn from_grid<I: IntoIterator<Item = Vec<Value>>>(grid: I) -> Self {
        let mut rows = grid.into_iter();
        let Some(header) = rows.next() else {
            return Self::default();
        };
        let columns = unique_headers(header.iter().map(value_text));

        let mut records = Vec::new();
        for row in rows {
            if row.iter().all(is_blank) {
                continue;
            }
            let mut cells = row.into_iter();
            let record = columns
                .iter()
                .map(|column| (column.clone(), cells.next().unwrap_or_else(blank)))
                .collect();
            records.push(record);
        }
        Self { columns, records }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        if !self.columns.is_empty() {
            writer.write_record(&self.columns)?;
            for row in self.rows() {
                writer.write_record(row.iter().map(|value| value_text(value)))?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Records as rows aligned to `columns`; absent keys become `Null`
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        self.records.iter().map(move |record| {
            self.columns
                .iter()
                .map(|column| record.get(column).unwrap_or(&Value::Null))
                .collect()
        })
    }
}

fn blank() -> Value {
    Value::String(String::new())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// True when the file starts with an XML declaration or root element,
/// as XML Spreadsheet 2003 documents saved with an `.xls` name do
fn is_xml_document(path: &Path) -> Result<bool> {
    let mut head = [0u8; 64];
    let read = File::open(path)?.read(&mut head)?;
    let text = String::from_utf8_lossy(&head[..read]);
    Ok(text.trim_start_matches('\u{feff}').trim_start().starts_with('<'))
}

/// Header names made unique by suffixing repeats (`name`, `name_1`, ...)
fn unique_headers<I: IntoIterator<Item = String>>(headers: I) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (index, header) in headers.into_iter().enumerate() {
        let base = match header.trim() {
            "" => format!("column_{}", index + 1),
            name => name.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

/// Numbers stay numbers when they print back exactly as written
pub(super) fn infer_value(cell: &str) -> Value {
    if let Ok(int) = cell.parse::<i64>() {
        if int.to_string() == cell {
            return Value::Number(int.into());
        }
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        if number.to_string() == cell {
            return Value::Number(number);
        }
    }
    Value::String(cell.to_string())
}

fn data_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            Value::Number((*f as i64).into())
        }
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or_else(blank),
        Data::Bool(b) => Value::Bool(*b),
        Data::Empty => blank(),
        other => Value::String(cell_text(other)),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{dt}"),
        Data::DateTimeIso(dt) => dt.clone(),
        Data::DurationIso(d) => d.clone(),
        Data::Error(e) => format!("#{e:?}"),
        Data::Empty => String::new(),
    }
}

/// Plain cell text for a record value; nested values are kept as JSON
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
