use std::collections::BTreeSet;

use resxsync::{CultureTag, SolutionResources};
use serde_json::json;

use crate::error::CommandError;
use crate::workspace::Workspace;

/// Print the projects, resource groups and cultures found under the roots.
pub fn run_scan_command(workspace: &Workspace, json_output: bool) -> Result<(), CommandError> {
    let root = workspace.progress.root();
    root.report_status("Scanning", 0.0);
    let solution = workspace.engine.scan(
        &workspace.projects,
        Some(&BTreeSet::new()),
        root,
        &workspace.cancel,
    )?;
    workspace.progress.clear();

    if json_output {
        let body = scan_json(&solution, &workspace.engine.config().neutral_label);
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| format!("Failed to serialize scan JSON: {}", e))?;
        println!("{}", text);
    } else {
        print_scan(&solution, &workspace.engine.config().neutral_label);
    }
    Ok(())
}

fn culture_names(cultures: impl Iterator<Item = CultureTag>, neutral_label: &str) -> Vec<String> {
    cultures.map(|c| c.display_name(neutral_label)).collect()
}

pub fn scan_json(solution: &SolutionResources, neutral_label: &str) -> serde_json::Value {
    let projects: Vec<serde_json::Value> = solution
        .projects
        .iter()
        .map(|project| {
            let groups: Vec<serde_json::Value> = project
                .groups
                .values()
                .map(|group| {
                    json!({
                        "name": group.logical_name,
                        "cultures": culture_names(group.cultures().cloned(), neutral_label),
                        "keys": group.neutral().map(|n| n.nodes().len()).ok(),
                    })
                })
                .collect();
            json!({
                "name": project.project_name,
                "id": project.project_id,
                "directory": project.project_directory,
                "resources": groups,
            })
        })
        .collect();

    json!({
        "summary": {
            "projects": solution.projects.len(),
            "files": solution.file_count(),
            "cultures": culture_names(solution.cultures().into_iter(), neutral_label),
        },
        "projects": projects,
    })
}

fn print_scan(solution: &SolutionResources, neutral_label: &str) {
    for project in &solution.projects {
        println!(
            "{} ({})",
            project.project_name,
            project.project_directory.display()
        );
        for group in project.groups.values() {
            let cultures = culture_names(group.cultures().cloned(), neutral_label).join(", ");
            match group.neutral() {
                Ok(neutral) => println!(
                    "  {} [{}] {} key(s)",
                    group.logical_name,
                    cultures,
                    neutral.nodes().len()
                ),
                Err(_) => println!(
                    "  {} [{}] ⚠️  no neutral file",
                    group.logical_name, cultures
                ),
            }
        }
    }
    println!(
        "{} project(s), {} resource file(s), cultures: {}",
        solution.projects.len(),
        solution.file_count(),
        culture_names(solution.cultures().into_iter(), neutral_label).join(", ")
    );
}
