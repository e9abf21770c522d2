//! The reconciliation engine: keeps culture files in line with their neutral file, and moves
//! resources to and from tabular backends.

use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    backend::TabularBackend,
    cancel::CancellationToken,
    catalog::ResourceCatalog,
    config::{EmptyNeutralPolicy, SyncConfig},
    convert::{self, MergePlan},
    culture::{self, CultureTag},
    error::Error,
    host::{GENERATOR_METADATA, ITEM_TYPE_METADATA, ProjectHost},
    logger::Logger,
    progress::Progress,
    tabular::TabularModel,
    traits::ResourceStore,
    types::{LogicalResourceGroup, ResourceFile, ResourceNode, SolutionResources},
};

/// Switches of a reconcile run. `None` leaves the corresponding setting alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOptions {
    /// Delete culture files whose culture is not selected.
    pub remove_unselected: bool,
    /// Nest culture files under their neutral file (`true`) or un-nest them (`false`).
    pub embed_subfiles: Option<bool>,
    /// Set (`true`) or clear (`false`) the default `ItemType` of resource files.
    pub default_content_type: Option<bool>,
    /// Set (`true`) or blank (`false`) the default `Generator` of neutral files.
    pub default_generator_tool: Option<bool>,
}

/// What a reconcile run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub projects: usize,
    pub groups_processed: usize,
    pub orphaned_groups: Vec<String>,
    pub files_added: Vec<PathBuf>,
    pub files_removed: Vec<PathBuf>,
    pub files_updated: Vec<PathBuf>,
    pub files_relinked: Vec<PathBuf>,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !(self.orphaned_groups.is_empty()
            && self.files_added.is_empty()
            && self.files_removed.is_empty()
            && self.files_updated.is_empty()
            && self.files_relinked.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub groups: usize,
    pub tables: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub plan: MergePlan,
    pub written: Vec<PathBuf>,
}

pub struct ReconciliationEngine {
    store: Arc<dyn ResourceStore>,
    logger: Arc<dyn Logger>,
    config: SyncConfig,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn ResourceStore>, logger: Arc<dyn Logger>, config: SyncConfig) -> Self {
        ReconciliationEngine {
            store,
            logger,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Scans `projects`; see [`ResourceCatalog::scan`].
    pub fn scan<H: ProjectHost>(
        &self,
        projects: &[H],
        culture_filter: Option<&BTreeSet<CultureTag>>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<SolutionResources, Error> {
        ResourceCatalog::new(self.store.as_ref(), &self.config).scan(
            projects,
            culture_filter,
            progress,
            cancel,
        )
    }

    /// Brings every resource group of `projects` in line with the selected `cultures`.
    ///
    /// Groups are processed one at a time and each project is saved once its groups are done.
    /// When `cancel` fires, the current project is saved and [`Error::Cancelled`] is returned;
    /// groups processed so far keep their changes.
    pub fn reconcile<H: ProjectHost>(
        &self,
        cultures: &BTreeSet<CultureTag>,
        projects: &mut [H],
        options: &ReconcileOptions,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, Error> {
        let selected: BTreeSet<CultureTag> =
            cultures.iter().filter(|c| !c.is_neutral()).cloned().collect();

        let phases = progress.create_children(&[1.0, 3.0]);
        let solution = self.scan(projects, Some(&selected), &phases[0], cancel)?;

        let total: usize = solution.projects.iter().map(|p| p.groups.len()).sum();
        let mut done = 0;
        let mut report = ReconcileReport {
            projects: solution.projects.len(),
            ..ReconcileReport::default()
        };

        for (host, resources) in projects.iter_mut().zip(solution.projects) {
            for group in resources.groups.into_values() {
                if cancel.is_cancelled() {
                    host.save()?;
                    info!(project = %resources.project_name, "reconcile cancelled");
                    return Err(Error::Cancelled);
                }
                self.reconcile_group(host, group, &selected, options, &mut report)?;
                report.groups_processed += 1;
                done += 1;
                phases[1].report_fraction(done, total);
            }
            host.save()?;
            debug!(project = %resources.project_name, "project saved");
        }
        phases[1].report(100.0);

        Ok(report)
    }

    fn reconcile_group<H: ProjectHost>(
        &self,
        host: &mut H,
        mut group: LogicalResourceGroup,
        selected: &BTreeSet<CultureTag>,
        options: &ReconcileOptions,
        report: &mut ReconcileReport,
    ) -> Result<(), Error> {
        let neutral = group
            .get(&CultureTag::Neutral)
            .map(|file| (file.path.clone(), file.nodes().to_vec()));
        let Some((neutral_path, neutral_nodes)) = neutral else {
            return self.delete_orphaned(host, group, report);
        };

        let unselected: Vec<CultureTag> = group
            .files
            .keys()
            .filter(|c| !c.is_neutral() && !selected.contains(c))
            .cloned()
            .collect();
        // Unselected files that stay on disk still follow the item policies, but keep their keys.
        let mut kept = Vec::new();
        for culture in unselected {
            let Some(file) = group.files.remove(&culture) else {
                continue;
            };
            if options.remove_unselected {
                host.delete_item(&file.path)?;
                self.logger.log(&format!("Removed {}", file.path.display()));
                report.files_removed.push(file.path);
            } else {
                kept.push(file);
            }
        }

        let missing: Vec<CultureTag> = selected
            .iter()
            .filter(|c| !group.files.contains_key(c))
            .cloned()
            .collect();
        for culture in missing {
            let path = self.culture_file_path(&neutral_path, &culture)?;
            let content = if path.exists() {
                self.store.read(&path)?
            } else {
                self.store.write(&path, &[])?;
                Vec::new()
            };
            host.add_item(None, &path)?;
            self.logger.log(&format!("Added {}", path.display()));
            report.files_added.push(path.clone());

            let mut file =
                ResourceFile::deferred(group.logical_name.clone(), path, culture.clone(), None);
            file.content = Some(content);
            group.files.insert(culture, file);
        }

        if let Some(embed) = options.embed_subfiles {
            let cultures = group.files.values_mut().filter(|f| !f.culture.is_neutral());
            for file in cultures.chain(kept.iter_mut()) {
                let nested = file.parent.as_deref() == Some(neutral_path.as_path());
                let target = if embed { Some(neutral_path.as_path()) } else { None };
                if nested == embed {
                    continue;
                }
                host.remove_item(&file.path)?;
                host.add_item(target, &file.path)?;
                file.parent = target.map(Path::to_path_buf);
                debug!(path = %file.path.display(), embed, "relinked culture file");
                report.files_relinked.push(file.path.clone());
            }
        }

        if let Some(use_default) = options.default_generator_tool {
            let value = if use_default {
                self.config.metadata.generator_tool.as_str()
            } else {
                ""
            };
            host.set_metadata(&neutral_path, GENERATOR_METADATA, Some(value))?;
        }

        if let Some(use_default) = options.default_content_type {
            let value = use_default.then_some(self.config.metadata.content_type.as_str());
            for file in group.files.values().chain(kept.iter()) {
                host.set_metadata(&file.path, ITEM_TYPE_METADATA, value)?;
            }
        }

        self.converge(&mut group, &neutral_nodes, report)
    }

    /// A group without a neutral file cannot be kept in line; all of its files go.
    fn delete_orphaned<H: ProjectHost>(
        &self,
        host: &mut H,
        group: LogicalResourceGroup,
        report: &mut ReconcileReport,
    ) -> Result<(), Error> {
        let err = Error::MissingNeutralCulture {
            resource: group.logical_name.clone(),
        };
        self.logger.log(&format!(
            "{err} in project `{}`; deleting {} culture file(s)",
            host.name(),
            group.files.len()
        ));
        for file in group.files.into_values() {
            host.delete_item(&file.path)?;
            report.files_removed.push(file.path);
        }
        report.orphaned_groups.push(group.logical_name);
        Ok(())
    }

    /// Rewrites culture files whose key set differs from the neutral one.
    fn converge(
        &self,
        group: &mut LogicalResourceGroup,
        neutral_nodes: &[ResourceNode],
        report: &mut ReconcileReport,
    ) -> Result<(), Error> {
        let quiet = if neutral_nodes.is_empty() {
            match self.config.empty_neutral {
                EmptyNeutralPolicy::Skip => return Ok(()),
                EmptyNeutralPolicy::Quiet => true,
                EmptyNeutralPolicy::Converge => false,
            }
        } else {
            false
        };

        let neutral_keys: HashSet<&str> = neutral_nodes.iter().map(ResourceNode::key).collect();

        for file in group.files.values_mut().filter(|f| !f.culture.is_neutral()) {
            if file.content.is_none() {
                file.content = Some(self.store.read(&file.path)?);
            }
            let file_keys: HashSet<&str> = file.nodes().iter().map(ResourceNode::key).collect();
            if file_keys == neutral_keys {
                continue;
            }

            let mut nodes: Vec<ResourceNode> = file
                .nodes()
                .iter()
                .filter(|node| neutral_keys.contains(node.key()))
                .cloned()
                .collect();
            let dropped = file.nodes().len() - nodes.len();
            let appended: Vec<ResourceNode> = neutral_nodes
                .iter()
                .filter(|node| !file_keys.contains(node.key()))
                .cloned()
                .collect();
            let added = appended.len();
            nodes.extend(appended);

            self.store.write(&file.path, &nodes)?;
            if !quiet {
                self.logger.log(&format!(
                    "Updated {}: {added} key(s) added, {dropped} removed",
                    file.path.display()
                ));
            }
            report.files_updated.push(file.path.clone());
            file.content = Some(nodes);
        }
        Ok(())
    }

    /// `{neutral base}.{culture}.{ext}` next to the neutral file.
    fn culture_file_path(&self, neutral_path: &Path, culture: &CultureTag) -> Result<PathBuf, Error> {
        let tag = culture
            .tag()
            .ok_or_else(|| Error::InvalidResource("the neutral culture has no file suffix".to_string()))?;
        let extension = &self.config.resource_extension;
        let file_name = neutral_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidResource(format!("invalid resource path {}", neutral_path.display()))
            })?;
        let base = file_name
            .len()
            .checked_sub(extension.len() + 1)
            .filter(|&end| file_name.is_char_boundary(end))
            .map(|end| &file_name[..end])
            .unwrap_or(file_name);
        Ok(neutral_path.with_file_name(format!("{base}.{tag}.{extension}")))
    }

    /// Column order for the cultures of a solution; see [`culture::culture_order`].
    pub fn culture_order<'a, I>(&self, cultures: I) -> Vec<CultureTag>
    where
        I: IntoIterator<Item = &'a CultureTag>,
    {
        culture::culture_order(cultures, &self.config.neutral_label)
    }

    pub fn to_tabular(&self, solution: &SolutionResources, culture_order: &[CultureTag]) -> TabularModel {
        convert::to_tabular(solution, culture_order, &self.config.neutral_label)
    }

    pub fn from_tabular(
        &self,
        solution: &SolutionResources,
        model: &TabularModel,
    ) -> Result<MergePlan, Error> {
        convert::from_tabular(solution, model, &self.config.neutral_label)
    }

    /// Writes every file of `plan`. Returns the written paths.
    pub fn apply_merge_plan(
        &self,
        plan: &MergePlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, Error> {
        let mut written = Vec::with_capacity(plan.writes.len());
        for write in &plan.writes {
            cancel.check()?;
            self.store.write(&write.path, &write.nodes)?;
            self.logger.log(&format!(
                "Imported {} ({})",
                write.path.display(),
                write.culture.display_name(&self.config.neutral_label)
            ));
            written.push(write.path.clone());
        }
        Ok(written)
    }

    /// Scans `projects` and exports the selected `cultures` to `target`.
    pub async fn export<H, B>(
        &self,
        backend: &B,
        target: &str,
        projects: &[H],
        cultures: &BTreeSet<CultureTag>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<ExportSummary, Error>
    where
        H: ProjectHost + Sync,
        B: TabularBackend + ?Sized,
    {
        let phases = progress.create_children(&[1.0, 3.0]);
        let solution = self.scan(projects, Some(cultures), &phases[0], cancel)?;
        let order = self.culture_order(cultures.iter());
        let model = self.to_tabular(&solution, &order);
        if model.is_empty() {
            return Err(Error::invalid_table("there are no resources to export"));
        }

        let summary = ExportSummary {
            groups: model.groups.len(),
            tables: model.groups.iter().map(|g| g.tables.len()).sum(),
            rows: model.row_count(),
        };
        backend
            .export(target, Arc::new(model), &phases[1], cancel)
            .await?;
        self.logger.log(&format!(
            "Exported {} row(s) of {} resource(s) to {target}",
            summary.rows, summary.tables
        ));
        Ok(summary)
    }

    /// Imports `source` and writes the changed values into the files of `projects`.
    ///
    /// Nothing is written when validation fails.
    pub async fn import<H, B>(
        &self,
        backend: &B,
        source: &str,
        projects: &[H],
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary, Error>
    where
        H: ProjectHost + Sync,
        B: TabularBackend + ?Sized,
    {
        let phases = progress.create_children(&[3.0, 1.0, 1.0]);
        let model = backend.import(source, &phases[0], cancel).await?;

        let cultures = convert::model_cultures(&model, &self.config.neutral_label)?;
        let solution = self.scan(projects, Some(&cultures), &phases[1], cancel)?;
        let plan = self.from_tabular(&solution, &model)?;

        let written = self.apply_merge_plan(&plan, cancel)?;
        phases[2].report(100.0);
        if written.is_empty() {
            self.logger.log(&format!("{source} has no changes to import"));
        }
        Ok(ImportSummary { plan, written })
    }
}
