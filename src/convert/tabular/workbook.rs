//! Spreadsheet writers for the in-process fallback.
//!
//! `.xlsx` is a minimal SpreadsheetML package (one worksheet, inline strings)
//! and `.xls` is written as XML Spreadsheet 2003, which Excel and LibreOffice
//! open directly. [`read_xml_spreadsheet`] reads that format back, since
//! calamine only understands binary `.xls`.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::table::{infer_value, value_text, Table};
use crate::error::Result;

const SHEET_NAME: &str = "Sheet1";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        SHEET_NAME
    )
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn xlsx_cell(reference: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n),
        Value::Bool(b) => format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, reference, u8::from(*b)),
        other => format!(
            r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            reference,
            escape(value_text(other).as_str())
        ),
    }
}

fn sheet_xml(table: &Table) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header = table.columns.iter().map(|c| Value::String(c.clone())).collect::<Vec<_>>();
    let header_row = header.iter().collect::<Vec<_>>();
    let rows = std::iter::once(header_row).chain(table.rows());

    for (r, row) in rows.enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.into_iter().enumerate() {
            xml.push_str(&xlsx_cell(&format!("{}{}", column_name(c), r + 1), value));
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

pub fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(table)),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

fn xml2003_cell(value: &Value) -> String {
    match value {
        Value::Null => "<Cell/>".to_string(),
        Value::Number(n) => format!(r#"<Cell><Data ss:Type="Number">{}</Data></Cell>"#, n),
        Value::Bool(b) => format!(r#"<Cell><Data ss:Type="Boolean">{}</Data></Cell>"#, u8::from(*b)),
        other => format!(
            r#"<Cell><Data ss:Type="String">{}</Data></Cell>"#,
            escape(value_text(other).as_str())
        ),
    }
}

pub fn write_xml_spreadsheet(table: &Table, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<?mso-application progid="Excel.Sheet"?>"#)?;
    writeln!(
        out,
        r#"<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet" xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">"#
    )?;
    writeln!(out, r#"<Worksheet ss:Name="{}"><Table>"#, SHEET_NAME)?;

    write!(out, "<Row>")?;
    for column in &table.columns {
        write!(out, r#"<Cell><Data ss:Type="String">{}</Data></Cell>"#, escape(column.as_str()))?;
    }
    writeln!(out, "</Row>")?;

    for row in table.rows() {
        write!(out, "<Row>")?;
        for value in row {
            out.write_all(xml2003_cell(value).as_bytes())?;
        }
        writeln!(out, "</Row>")?;
    }

    writeln!(out, "</Table></Worksheet>")?;
    writeln!(out, "</Workbook>")?;
    out.flush()?;
    Ok(())
}

/// `ss:Index` of a `<Cell>`, 1-based, when the writer skipped columns
fn cell_index(cell: &BytesStart) -> Result<Option<usize>> {
    for attr in cell.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"Index" {
            return Ok(attr.unescape_value()?.trim().parse().ok());
        }
    }
    Ok(None)
}

fn data_type(data: &BytesStart) -> Result<String> {
    for attr in data.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"Type" {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Ok("String".to_string())
}

fn typed_value(kind: &str, text: String) -> Value {
    match kind {
        "Number" => infer_value(text.trim()),
        "Boolean" => Value::Bool(matches!(text.trim(), "1" | "true" | "TRUE")),
        _ => Value::String(text),
    }
}

fn pad_to(row: &mut Vec<Value>, index: Option<usize>) {
    if let Some(index) = index {
        while row.len() + 1 < index {
            row.push(Value::String(String::new()));
        }
    }
}

/// First `<Worksheet>` of an XML Spreadsheet 2003 document
pub fn read_xml_spreadsheet(path: &Path) -> Result<Table> {
    let xml = fs::read_to_string(path)?;
    let mut reader = Reader::from_str(&xml);

    let mut grid: Vec<Vec<Value>> = Vec::new();
    let mut row: Vec<Value> = Vec::new();
    let mut cell: Option<Value> = None;
    let mut data: Option<(String, String)> = None;
    let mut sheets = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Worksheet" => sheets += 1,
                b"Row" if sheets == 1 => row.clear(),
                b"Cell" if sheets == 1 => {
                    pad_to(&mut row, cell_index(&e)?);
                    cell = None;
                }
                b"Data" if sheets == 1 => data = Some((data_type(&e)?, String::new())),
                _ => {}
            },
            Event::Empty(e) if sheets == 1 => match e.local_name().as_ref() {
                b"Row" => grid.push(Vec::new()),
                b"Cell" => {
                    pad_to(&mut row, cell_index(&e)?);
                    row.push(Value::String(String::new()));
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some((_, text)) = data.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"Data" => {
                    if let Some((kind, text)) = data.take() {
                        cell = Some(typed_value(&kind, text));
                    }
                }
                b"Cell" if sheets == 1 => {
                    row.push(cell.take().unwrap_or_else(|| Value::String(String::new())));
                }
                b"Row" if sheets == 1 => grid.push(std::mem::take(&mut row)),
                b"Worksheet" if sheets == 1 => break,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Table::from_grid(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_records(vec![
            json!({"name": "Ada & co", "age": 36, "member": true}).as_object().unwrap().clone(),
            json!({"name": "<Alan>", "age": 41.5}).as_object().unwrap().clone(),
        ])
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_xlsx_reads_back_through_calamine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        write_xlsx(&sample(), &path).unwrap();

        let table = Table::read_workbook(&path).unwrap();
        assert_eq!(table.columns, vec!["name", "age", "member"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0]["name"], json!("Ada & co"));
        assert_eq!(table.records[0]["age"], json!(36));
        assert_eq!(table.records[0]["member"], json!(true));
        assert_eq!(table.records[1]["name"], json!("<Alan>"));
        assert_eq!(table.records[1]["age"], json!(41.5));
        assert_eq!(table.records[1]["member"], json!(""));
    }

    #[test]
    fn test_xml_spreadsheet_escapes_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xls");
        write_xml_spreadsheet(&sample(), &path).unwrap();

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains(r#"<Worksheet ss:Name="Sheet1">"#));
        assert!(xml.contains("Ada &amp; co"));
        assert!(xml.contains("&lt;Alan&gt;"));
        assert!(xml.contains(r#"<Data ss:Type="Number">41.5</Data>"#));
        assert!(xml.contains("<Cell/>"));
    }

    #[test]
    fn test_xml_spreadsheet_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xls");
        write_xml_spreadsheet(&sample(), &path).unwrap();

        let table = read_xml_spreadsheet(&path).unwrap();
        assert_eq!(table.columns, vec!["name", "age", "member"]);
        assert_eq!(table.records[0]["name"], json!("Ada & co"));
        assert_eq!(table.records[0]["age"], json!(36));
        assert_eq!(table.records[0]["member"], json!(true));
        assert_eq!(table.records[1]["name"], json!("<Alan>"));
        assert_eq!(table.records[1]["age"], json!(41.5));
        assert_eq!(table.records[1]["member"], json!(""));

        // Same file through the extension-based entry point
        assert_eq!(Table::read(&path, "xls").unwrap(), table);
    }

    #[test]
    fn test_xml_spreadsheet_honors_cell_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.xls");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet" xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
<Worksheet ss:Name="Data"><Table>
<Row><Cell><Data ss:Type="String">a</Data></Cell><Cell><Data ss:Type="String">b</Data></Cell><Cell><Data ss:Type="String">c</Data></Cell></Row>
<Row><Cell><Data ss:Type="Number">1</Data></Cell><Cell ss:Index="3"><Data ss:Type="String">x</Data></Cell></Row>
<Row/>
</Table></Worksheet>
<Worksheet ss:Name="Ignored"><Table><Row><Cell><Data ss:Type="String">z</Data></Cell></Row></Table></Worksheet>
</Workbook>
"#,
        )
        .unwrap();

        let table = read_xml_spreadsheet(&path).unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0]["a"], json!(1));
        assert_eq!(table.records[0]["b"], json!(""));
        assert_eq!(table.records[0]["c"], json!("x"));
    }
}
