use std::str::FromStr;

use resxsync::{FileBackend, FormatType, ImportSummary};
use serde_json::json;

use crate::error::CommandError;
use crate::validation::{parse_cultures, validate_output_path};
use crate::workspace::Workspace;

/// Pick the sheet format: explicit `--format`, else `csv`.
fn sheet_backend(format: Option<&str>) -> Result<FileBackend, String> {
    let format = match format {
        Some(name) => FormatType::from_str(name).map_err(|e| e.to_string())?,
        None => FormatType::Csv,
    };
    FileBackend::new(format).map_err(|e| format!("Unsupported sheet format: {}", e))
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub output: String,
    pub cultures: Vec<String>,
    pub format: Option<String>,
}

/// Export the resources of all projects to a directory of sheets.
pub async fn run_export_command(workspace: &Workspace, opts: ExportOptions) -> Result<(), CommandError> {
    let backend = sheet_backend(opts.format.as_deref())?;
    let cultures = workspace.cultures_or_existing(parse_cultures(&opts.cultures)?)?;

    let root = workspace.progress.root();
    root.report_status("Exporting", 0.0);
    let summary = workspace
        .engine
        .export(
            &backend,
            &opts.output,
            &workspace.projects,
            &cultures,
            root,
            &workspace.cancel,
        )
        .await;
    workspace.progress.clear();
    let summary = summary?;

    println!(
        "✅ Exported {} row(s) from {} resource(s) in {} project(s) to {}",
        summary.rows, summary.tables, summary.groups, opts.output
    );
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub input: String,
    pub format: Option<String>,
    pub report_json: Option<String>,
}

fn write_report(path: &str, input: &str, summary: &ImportSummary) -> Result<(), String> {
    let payload = json!({
        "input": input,
        "summary": {
            "written": summary.written.len(),
            "unmatched": summary.plan.unmatched.len(),
        },
        "writes": summary.plan.writes,
        "unmatched": summary.plan.unmatched,
    });

    let text = serde_json::to_string_pretty(&payload)
        .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
    std::fs::write(path, text).map_err(|e| format!("Failed to write report JSON '{}': {}", path, e))
}

/// Import a directory of sheets back into the resource files.
///
/// The whole sheet set is validated before anything is written.
pub async fn run_import_command(workspace: &Workspace, opts: ImportOptions) -> Result<(), CommandError> {
    let backend = sheet_backend(opts.format.as_deref())?;
    if let Some(report_path) = &opts.report_json {
        validate_output_path(report_path)?;
    }

    let root = workspace.progress.root();
    root.report_status("Importing", 0.0);
    let summary = workspace
        .engine
        .import(&backend, &opts.input, &workspace.projects, root, &workspace.cancel)
        .await;
    workspace.progress.clear();
    let summary = summary?;

    for unmatched in &summary.plan.unmatched {
        println!("⚠️  Skipped {}: no matching project or resource", unmatched);
    }
    println!("Files written: {}", summary.written.len());

    if let Some(report_path) = &opts.report_json {
        write_report(report_path, &opts.input, &summary)?;
        println!("Report JSON written: {}", report_path);
    }
    println!("✅ Import complete: {}", opts.input);
    Ok(())
}
