mod common;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use fluxify::tool::{ToolCommand, ToolOutput};
use fluxify::{ConversionOptions, ConversionOutput, FluxifyError};

use common::{registry, ScriptedRunner};

/// No Python on this machine: every interpreter alias fails to start
fn without_python(cmd: &ToolCommand) -> Result<ToolOutput, FluxifyError> {
    assert!(["python3", "python", "py"].contains(&cmd.program.as_str()), "unexpected {}", cmd.program);
    Err(FluxifyError::ToolNotAvailable {
        tool: cmd.program.clone(),
        reason: "No such file or directory".to_string(),
    })
}

const PEOPLE: &str = "name,age,city\nAda,36,London\n\"Hopper, Grace\",85,New York\nLinus,,Helsinki\n";

#[tokio::test]
async fn csv_json_csv_round_trip_preserves_rows() {
    let temp = TempDir::new().unwrap();
    let csv = temp.child("people.csv");
    csv.write_str(PEOPLE).unwrap();

    let runner = ScriptedRunner::new(without_python);
    let registry = registry(&runner);

    let json = registry
        .convert(csv.path(), "json", ConversionOptions::default())
        .await
        .unwrap();
    assert_eq!(json, ConversionOutput::Single(temp.child("people.json").path().to_path_buf()));

    std::fs::remove_file(csv.path()).unwrap();
    registry
        .convert(temp.child("people.json").path(), "csv", ConversionOptions::default())
        .await
        .unwrap();

    let mut reader = csv::Reader::from_path(csv.path()).unwrap();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["Hopper, Grace", "85", "New York"]);
    assert_eq!(rows[2], vec!["Linus", "", "Helsinki"]);
}

#[tokio::test]
async fn csv_to_xlsx_and_back() {
    let temp = TempDir::new().unwrap();
    let csv = temp.child("people.csv");
    csv.write_str(PEOPLE).unwrap();

    let runner = ScriptedRunner::new(without_python);
    let registry = registry(&runner);

    registry.convert(csv.path(), "xlsx", ConversionOptions::default()).await.unwrap();
    assert!(temp.child("people.xlsx").path().is_file());

    std::fs::remove_file(csv.path()).unwrap();
    registry
        .convert(temp.child("people.xlsx").path(), "csv", ConversionOptions::default())
        .await
        .unwrap();

    let text = std::fs::read_to_string(csv.path()).unwrap();
    assert_eq!(text.lines().next(), Some("name,age,city"));
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("\"Hopper, Grace\",85,New York"));
}

#[tokio::test]
async fn unsupported_pair_without_helper() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("people.csv");
    input.write_str(PEOPLE).unwrap();

    let runner = ScriptedRunner::new(without_python);
    let err = registry(&runner)
        .convert(input.path(), "ods", ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FluxifyError::ConversionUnsupportedWithoutHelper { .. }));
    assert_eq!(runner.programs(), vec!["python3", "python", "py"]);
}

#[tokio::test]
async fn default_config_converts_csv_to_xml_through_builtin_helper() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("people.csv");
    input.write_str(PEOPLE).unwrap();

    let runner = ScriptedRunner::new(|cmd| {
        assert_eq!(cmd.args[0], "-c");
        assert!(cmd.args[1].contains("pandas"));
        std::fs::write(&cmd.args[3], "<data><row><name>Ada</name></row></data>").unwrap();
        Ok(ToolOutput::success())
    });
    let output = registry(&runner)
        .convert(input.path(), "xml", ConversionOptions::default())
        .await
        .unwrap();

    assert_eq!(output, ConversionOutput::Single(temp.child("people.xml").path().to_path_buf()));
    assert_eq!(runner.programs(), vec!["python3"]);
    assert!(runner.calls()[0].args[2].ends_with("people.csv"));
}
