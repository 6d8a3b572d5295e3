mod common;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use fluxify::tool::ToolOutput;
use fluxify::{ConversionOptions, ConversionOutput, FluxifyError};

use common::{registry, write_last_arg, ScriptedRunner};

#[tokio::test]
async fn pdf_to_docx_falls_back_to_second_attempt() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("report.pdf");
    input.write_binary(b"%PDF-1.7").unwrap();

    let runner = ScriptedRunner::new(|cmd| match cmd.program.as_str() {
        "python" => Ok(ToolOutput::failure(1, "Traceback: conversion failed")),
        "soffice" => {
            let outdir = cmd.arg_value("--outdir").unwrap();
            std::fs::write(format!("{outdir}/report.docx"), b"PK\x03\x04").unwrap();
            Ok(ToolOutput::success())
        }
        other => panic!("unexpected tool {other}"),
    });

    let output = registry(&runner)
        .convert(input.path(), "docx", ConversionOptions::default())
        .await
        .unwrap();

    let docx = temp.child("report.docx");
    assert!(docx.path().is_file());
    assert_eq!(output, ConversionOutput::Single(docx.path().to_path_buf()));
    assert_eq!(runner.programs(), vec!["python", "soffice"]);
}

#[tokio::test]
async fn pdf_to_docx_short_circuits_on_first_attempt() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("report.pdf");
    input.write_binary(b"%PDF-1.7").unwrap();

    let runner = ScriptedRunner::new(|cmd| {
        write_last_arg(cmd);
        Ok(ToolOutput::success())
    });

    registry(&runner)
        .convert(input.path(), "docx", ConversionOptions::default())
        .await
        .unwrap();
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn pdf_to_docx_exhaustion_lists_attempts_in_order() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("report.pdf");
    input.write_binary(b"%PDF-1.7").unwrap();

    // Every tool "succeeds" without producing anything
    let runner = ScriptedRunner::new(|cmd| match cmd.program.as_str() {
        "pdftohtml" => Ok(ToolOutput::with_stdout("<html><body>page</body></html>")),
        _ => Ok(ToolOutput::success()),
    });

    let err = registry(&runner)
        .convert(input.path(), "docx", ConversionOptions::default())
        .await
        .unwrap_err();

    let attempts: Vec<_> = err
        .attempt_failures()
        .unwrap()
        .iter()
        .map(|f| f.attempt.clone())
        .collect();
    assert_eq!(attempts, vec!["pdf2docx", "libreoffice-pdf-import", "pdftohtml+pandoc"]);
    assert!(matches!(err, FluxifyError::AllFallbacksExhausted { .. }));
    assert_eq!(runner.programs(), vec!["python", "soffice", "pdftohtml", "pandoc"]);
}

#[tokio::test]
async fn same_format_video_is_stream_copied() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("clip.mp4");
    input.write_binary(b"original").unwrap();

    let runner = ScriptedRunner::new(|cmd| {
        write_last_arg(cmd);
        Ok(ToolOutput::success())
    });

    registry(&runner)
        .convert(input.path(), "mp4", ConversionOptions::default())
        .await
        .unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].arg_value("-c"), Some("copy"));
    assert!(!calls[0].has_arg("-crf"));
    assert!(!calls[0].has_arg("-preset"));
}

#[tokio::test]
async fn forced_transcode_re_encodes_same_format() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("clip.mp4");
    input.write_binary(b"original").unwrap();

    let runner = ScriptedRunner::new(|cmd| {
        write_last_arg(cmd);
        Ok(ToolOutput::success())
    });

    let options = ConversionOptions {
        force_transcode: true,
        high_quality: true,
        ..ConversionOptions::default()
    };
    registry(&runner).convert(input.path(), "mp4", options).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0].arg_value("-c:v"), Some("libx264"));
    assert_eq!(calls[0].arg_value("-preset"), Some("slow"));
    assert_eq!(calls[0].arg_value("-crf"), Some("18"));
    assert_ne!(calls[0].arg_value("-c"), Some("copy"));
}

#[tokio::test]
async fn audio_to_video_is_rejected_before_any_tool_runs() {
    let runner = ScriptedRunner::new(|cmd| panic!("no tool expected, got {}", cmd.program));

    let err = registry(&runner)
        .convert("/media/clip.mp3", "mp4", ConversionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FluxifyError::CannotConvertAudioToVideo { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn xlsb_to_pdf_has_no_route() {
    let runner = ScriptedRunner::new(|cmd| panic!("no tool expected, got {}", cmd.program));

    let err = registry(&runner)
        .convert("/data/data.xlsb", "pdf", ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FluxifyError::NoRouteFound { .. }));
    assert_eq!(err.to_string(), "No converter for xlsb -> pdf");
}

#[tokio::test]
async fn tool_failure_surfaces_exit_code() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("letter.docx");
    input.write_binary(b"PK").unwrap();

    let runner = ScriptedRunner::new(|_| Ok(ToolOutput::failure(77, "source file could not be loaded")));

    let err = registry(&runner)
        .convert(input.path(), "pdf", ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FluxifyError::ToolInvocationFailure { code: Some(77), .. }));
}

#[tokio::test]
async fn pdf_pages_rasterize_to_multiple_images() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("deck.pdf");
    input.write_binary(b"%PDF-1.7").unwrap();

    let runner = ScriptedRunner::new(|cmd| {
        let prefix = cmd.args.last().unwrap();
        for page in ["01", "02", "10"] {
            std::fs::write(format!("{prefix}-{page}.png"), b"png").unwrap();
        }
        Ok(ToolOutput::success())
    });

    let output = registry(&runner)
        .convert(input.path(), "png", ConversionOptions::default())
        .await
        .unwrap();

    let names: Vec<_> = output
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["deck-01.png", "deck-02.png", "deck-10.png"]);
}
