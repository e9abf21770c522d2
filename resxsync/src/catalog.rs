//! Discovery of resource files and their grouping by logical name.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Component, Path},
};

use tracing::{debug, warn};

use crate::{
    cancel::CancellationToken,
    config::SyncConfig,
    culture::{CultureTag, split_culture},
    error::Error,
    host::ProjectHost,
    progress::Progress,
    traits::ResourceStore,
    types::{LogicalResourceGroup, ProjectResources, ResourceFile, SolutionResources},
};

/// Progress share of item enumeration; content reading gets the rest.
const ENUMERATION_WEIGHT: f64 = 0.7;
const READ_WEIGHT: f64 = 0.3;

/// Builds [`SolutionResources`] from project hosts.
pub struct ResourceCatalog<'a> {
    store: &'a dyn ResourceStore,
    config: &'a SyncConfig,
}

impl<'a> ResourceCatalog<'a> {
    pub fn new(store: &'a dyn ResourceStore, config: &'a SyncConfig) -> Self {
        ResourceCatalog { store, config }
    }

    /// Scans `projects` for resource files.
    ///
    /// Content is read for neutral files and for the cultures in `culture_filter` (every file when
    /// there is no filter). Other files are listed with deferred content.
    pub fn scan<H: ProjectHost>(
        &self,
        projects: &[H],
        culture_filter: Option<&BTreeSet<CultureTag>>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<SolutionResources, Error> {
        let phases = progress.create_children(&[ENUMERATION_WEIGHT, READ_WEIGHT]);
        let project_progress = phases[0].create_even_children(projects.len());

        let mut solution = SolutionResources::default();
        for (project, progress) in projects.iter().zip(project_progress) {
            cancel.check()?;
            solution.projects.push(self.enumerate(project)?);
            progress.report(100.0);
        }
        phases[0].report(100.0);

        let wanted = |culture: &CultureTag| {
            culture.is_neutral() || culture_filter.is_none_or(|filter| filter.contains(culture))
        };
        let total = solution
            .projects
            .iter()
            .flat_map(|p| p.groups.values())
            .flat_map(|g| g.files.values())
            .filter(|f| wanted(&f.culture))
            .count();

        let mut done = 0;
        for project in &mut solution.projects {
            for group in project.groups.values_mut() {
                for file in group.files.values_mut() {
                    if !wanted(&file.culture) {
                        continue;
                    }
                    cancel.check()?;
                    file.content = Some(self.store.read(&file.path)?);
                    done += 1;
                    phases[1].report_fraction(done, total);
                }
            }
        }
        phases[1].report(100.0);

        debug!(
            projects = solution.projects.len(),
            files = solution.file_count(),
            loaded = total,
            "scanned resources"
        );
        Ok(solution)
    }

    fn enumerate<H: ProjectHost>(&self, project: &H) -> Result<ProjectResources, Error> {
        let mut groups: BTreeMap<String, LogicalResourceGroup> = BTreeMap::new();

        for item in project.all_items()? {
            let Some((logical_name, culture)) = self.identify(project.directory(), &item.path)
            else {
                continue;
            };
            let file = ResourceFile::deferred(
                logical_name.clone(),
                item.path,
                culture.clone(),
                item.parent,
            );
            let group = groups
                .entry(logical_name.clone())
                .or_insert_with(|| LogicalResourceGroup::new(logical_name));
            if let Some(previous) = group.files.insert(culture, file) {
                warn!(
                    path = %previous.path.display(),
                    "duplicate resource file replaced by a later one"
                );
            }
        }

        Ok(ProjectResources {
            project_id: project.id().to_string(),
            project_name: project.name().to_string(),
            project_directory: project.directory().to_path_buf(),
            groups,
        })
    }

    /// Maps a resource file path to its logical name and culture, or `None` for other files.
    pub fn identify(&self, project_directory: &Path, path: &Path) -> Option<(String, CultureTag)> {
        let file_name = path.file_name()?.to_str()?;
        let extension = &self.config.resource_extension;
        let stem_len = file_name.len().checked_sub(extension.len() + 1)?;
        if stem_len == 0
            || !file_name.is_char_boundary(stem_len)
            || !file_name[stem_len..].starts_with('.')
            || !file_name[stem_len + 1..].eq_ignore_ascii_case(extension)
        {
            return None;
        }

        let (base, culture) = split_culture(&file_name[..stem_len], &self.config.non_culture_extensions);

        let relative_dir = path
            .parent()
            .map(|parent| parent.strip_prefix(project_directory).unwrap_or(parent))
            .map(slash_path)
            .unwrap_or_default();
        let logical_name = if relative_dir.is_empty() {
            base.to_string()
        } else {
            format!("{relative_dir}/{base}")
        };
        Some((logical_name, culture))
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
