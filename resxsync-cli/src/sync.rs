use std::collections::BTreeSet;
use std::mem;

use resxsync::{CultureTag, ReconcileOptions, ReconcileReport};
use serde_json::json;

use crate::error::CommandError;
use crate::validation::{parse_cultures, validate_output_path};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub cultures: Vec<String>,
    pub remove_unselected: bool,
    pub embed: Option<bool>,
    pub content_type: Option<bool>,
    pub generator: Option<bool>,
    pub report_json: Option<String>,
}

fn write_report(
    path: &str,
    cultures: &BTreeSet<CultureTag>,
    options: &ReconcileOptions,
    report: &ReconcileReport,
    messages: Vec<String>,
) -> Result<(), String> {
    let payload = json!({
        "cultures": cultures,
        "options": options,
        "summary": {
            "projects": report.projects,
            "groups_processed": report.groups_processed,
            "files_added": report.files_added.len(),
            "files_removed": report.files_removed.len(),
            "files_updated": report.files_updated.len(),
            "files_relinked": report.files_relinked.len(),
            "orphaned_groups": report.orphaned_groups.len(),
        },
        "report": report,
        "messages": messages,
    });

    let text = serde_json::to_string_pretty(&payload)
        .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
    std::fs::write(path, text).map_err(|e| format!("Failed to write report JSON '{}': {}", path, e))
}

/// Reconcile every resource group with the selected cultures.
///
/// Runs on a blocking worker so Ctrl-C stays responsive.
pub async fn run_sync_command(workspace: &mut Workspace, opts: SyncOptions) -> Result<(), CommandError> {
    if let Some(report_path) = &opts.report_json {
        validate_output_path(report_path)?;
    }
    let cultures = workspace.cultures_or_existing(parse_cultures(&opts.cultures)?)?;
    let options = ReconcileOptions {
        remove_unselected: opts.remove_unselected,
        embed_subfiles: opts.embed,
        default_content_type: opts.content_type,
        default_generator_tool: opts.generator,
    };

    let engine = workspace.engine.clone();
    let cancel = workspace.cancel.clone();
    let progress = workspace.progress.root().progress().clone();
    let mut projects = mem::take(&mut workspace.projects);
    let selected = cultures.clone();
    workspace.progress.root().report_status("Reconciling", 0.0);

    let (projects, result) = tokio::task::spawn_blocking(move || {
        let result = engine.reconcile(&selected, &mut projects, &options, &progress, &cancel);
        (projects, result)
    })
    .await
    .map_err(|e| format!("Reconcile worker failed: {}", e))?;
    workspace.projects = projects;
    workspace.progress.clear();

    let report = result?;
    println!(
        "Reconciled {} resource group(s) in {} project(s)",
        report.groups_processed, report.projects
    );
    println!("Added: {}", report.files_added.len());
    println!("Removed: {}", report.files_removed.len());
    println!("Updated: {}", report.files_updated.len());
    println!("Relinked: {}", report.files_relinked.len());
    if !report.orphaned_groups.is_empty() {
        println!(
            "Deleted groups without neutral file: {}",
            report.orphaned_groups.join(", ")
        );
    }

    if let Some(report_path) = &opts.report_json {
        write_report(
            report_path,
            &cultures,
            &options,
            &report,
            workspace.messages.messages(),
        )?;
        println!("Report JSON written: {}", report_path);
    }

    if report.has_changes() {
        println!("✅ Sync complete");
    } else {
        println!("✅ Already in sync");
    }
    Ok(())
}
