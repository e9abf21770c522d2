use std::collections::HashSet;
use std::path::PathBuf;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use resxsync::{FsProject, ProjectHost, Solution};
use tracing::debug;

use crate::validation::validate_root;

/// Build one case-insensitive GlobSet from project name patterns.
fn project_filter(patterns: &[String]) -> Result<Option<GlobSet>, String> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .case_insensitive(true)
            .build()
            .map_err(|e| format!("Invalid project pattern '{}': {}", pat, e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| format!("Failed to build project filter: {}", e))
}

/// Discover the projects under every root, keeping those whose name matches one of `patterns`
/// (all of them when there is no pattern).
///
/// Roots are walked in parallel. A project reachable from two roots is kept once, in the
/// position of the first root that found it.
pub fn discover_projects(roots: &[String], patterns: &[String]) -> Result<Vec<FsProject>, String> {
    let roots: Vec<String> = if roots.is_empty() {
        vec![".".to_string()]
    } else {
        roots.to_vec()
    };
    for root in &roots {
        validate_root(root)?;
    }
    let filter = project_filter(patterns)?;

    let solutions: Vec<Solution> = roots
        .par_iter()
        .map(|root| {
            Solution::discover(root)
                .map_err(|e| format!("Failed to discover projects under '{}': {}", root, e))
        })
        .collect::<Result<_, _>>()?;

    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut projects = Vec::new();
    for project in solutions.into_iter().flat_map(|s| s.projects) {
        if !seen.insert(project.directory().to_path_buf()) {
            continue;
        }
        if filter.as_ref().is_some_and(|set| !set.is_match(project.name())) {
            debug!(project = project.name(), "skipped by project filter");
            continue;
        }
        projects.push(project);
    }

    if projects.is_empty() {
        return Err("No projects found".to_string());
    }
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manifest(dir: &std::path::Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("resxproj.toml"), format!("name = \"{}\"\n", name)).unwrap();
    }

    #[test]
    fn test_discover_and_filter() {
        let temp_dir = TempDir::new().unwrap();
        manifest(&temp_dir.path().join("Web"), "Web");
        manifest(&temp_dir.path().join("Admin"), "Admin.Web");
        manifest(&temp_dir.path().join("Core"), "Core");
        let root = temp_dir.path().to_str().unwrap().to_string();

        let all = discover_projects(&[root.clone()], &[]).unwrap();
        assert_eq!(all.len(), 3);

        let web = discover_projects(&[root.clone(), root], &["*web".to_string()]).unwrap();
        let mut names: Vec<&str> = web.iter().map(|p| p.name()).collect();
        names.sort();
        assert_eq!(names, vec!["Admin.Web", "Web"]);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        manifest(&temp_dir.path().join("Web"), "Web");
        let root = temp_dir.path().to_str().unwrap().to_string();

        assert!(discover_projects(&[root], &["Api".to_string()]).is_err());
    }
}
