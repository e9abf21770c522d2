//! Directory-based projects.
//!
//! A project is a directory. When it contains a `resxproj.toml` manifest, the manifest names the
//! project and lists its items as a tree, each with optional metadata:
//!
//! ```toml
//! name = "Web"
//!
//! [[item]]
//! include = "Resources/Strings.resx"
//! metadata = { Generator = "PublicResXFileCodeGenerator" }
//!
//! [[item.children]]
//! include = "Resources/Strings.fr.resx"
//! ```
//!
//! Without a manifest the items are discovered by walking the directory (honouring
//! `.gitignore`), skipping nested project directories. Such implicit projects keep nesting and
//! metadata in memory only; [`ProjectHost::save`] has nothing to persist for them.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::Error,
    host::{ProjectHost, ProjectItem},
};

pub const MANIFEST_FILE_NAME: &str = "resxproj.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, rename = "item", skip_serializing_if = "Vec::is_empty")]
    items: Vec<ItemNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ItemNode {
    include: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<ItemNode>,
}

impl ItemNode {
    fn new(include: String) -> Self {
        ItemNode {
            include,
            metadata: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// A project rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsProject {
    id: String,
    name: String,
    directory: PathBuf,
    manifest: Option<PathBuf>,
    items: Vec<ItemNode>,
    dirty: bool,
}

impl FsProject {
    /// Opens the project at `directory`, from its manifest when there is one.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, Error> {
        let directory = directory.as_ref().to_path_buf();
        let manifest_path = directory.join(MANIFEST_FILE_NAME);
        if manifest_path.is_file() {
            Self::from_manifest(directory, manifest_path)
        } else {
            Self::from_directory(directory)
        }
    }

    fn from_manifest(directory: PathBuf, manifest_path: PathBuf) -> Result<Self, Error> {
        let text = fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", manifest_path.display())))?;
        if manifest.name.trim().is_empty() {
            return Err(Error::Config(format!(
                "{}: project name must not be empty",
                manifest_path.display()
            )));
        }
        Ok(FsProject {
            id: manifest
                .id
                .clone()
                .unwrap_or_else(|| directory.display().to_string()),
            name: manifest.name,
            directory,
            manifest: Some(manifest_path),
            items: manifest.items,
            dirty: false,
        })
    }

    fn from_directory(directory: PathBuf) -> Result<Self, Error> {
        if !directory.is_dir() {
            return Err(Error::host(format!(
                "project directory {} does not exist",
                directory.display()
            )));
        }

        let mut items = Vec::new();
        let walker = WalkBuilder::new(&directory)
            .git_ignore(true)
            .git_exclude(true)
            .parents(true)
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_some_and(|t| t.is_dir())
                    && entry.path().join(MANIFEST_FILE_NAME).is_file())
            })
            .build();

        for dent in walker {
            let dent = match dent {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !dent.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            items.push(ItemNode::new(relative_include(&directory, dent.path())?));
        }
        items.sort_by(|a, b| a.include.cmp(&b.include));

        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());

        Ok(FsProject {
            id: directory.display().to_string(),
            name,
            directory,
            manifest: None,
            items,
            dirty: false,
        })
    }

    /// Path of the manifest backing this project, if any.
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn include_of(&self, path: &Path) -> Result<String, Error> {
        relative_include(&self.directory, path)
    }
}

impl ProjectHost for FsProject {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn directory(&self) -> &Path {
        &self.directory
    }

    fn all_items(&self) -> Result<Vec<ProjectItem>, Error> {
        let mut out = Vec::new();
        flatten(&self.directory, &self.items, None, &mut out);
        Ok(out)
    }

    fn add_item(&mut self, parent: Option<&Path>, path: &Path) -> Result<(), Error> {
        let include = self.include_of(path)?;
        if find(&self.items, &include).is_some() {
            debug!(item = %include, "item already registered");
            return Ok(());
        }

        let node = ItemNode::new(include);
        match parent {
            None => self.items.push(node),
            Some(parent) => {
                let parent_include = self.include_of(parent)?;
                let parent_node = find_mut(&mut self.items, &parent_include).ok_or_else(|| {
                    Error::host(format!(
                        "parent item `{parent_include}` is not part of project `{}`",
                        self.name
                    ))
                })?;
                parent_node.children.push(node);
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn delete_item(&mut self, path: &Path) -> Result<(), Error> {
        let include = self.include_of(path)?;
        match remove(&mut self.items, &include) {
            Some(node) => {
                self.dirty = true;
                delete_files(&self.directory, &node)
            }
            None => delete_file(path),
        }
    }

    fn remove_item(&mut self, path: &Path) -> Result<(), Error> {
        let include = self.include_of(path)?;
        match remove(&mut self.items, &include) {
            Some(mut node) => {
                // Nested items stay registered at the top level.
                let children = std::mem::take(&mut node.children);
                self.items.extend(children);
                self.dirty = true;
                Ok(())
            }
            None => Err(Error::host(format!(
                "item `{include}` is not part of project `{}`",
                self.name
            ))),
        }
    }

    fn set_metadata(&mut self, path: &Path, key: &str, value: Option<&str>) -> Result<(), Error> {
        let include = self.include_of(path)?;
        let node = find_mut(&mut self.items, &include).ok_or_else(|| {
            Error::host(format!(
                "item `{include}` is not part of project `{}`",
                self.name
            ))
        })?;
        let changed = match value {
            Some(value) => {
                let previous = node.metadata.insert(key.to_string(), value.to_string());
                previous.as_deref() != Some(value)
            }
            None => node.metadata.remove(key).is_some(),
        };
        self.dirty |= changed;
        Ok(())
    }

    fn save(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }
        match &self.manifest {
            Some(manifest_path) => {
                let default_id = self.directory.display().to_string();
                let manifest = Manifest {
                    name: self.name.clone(),
                    id: (self.id != default_id).then(|| self.id.clone()),
                    items: self.items.clone(),
                };
                let text = toml::to_string_pretty(&manifest)
                    .map_err(|e| Error::Config(e.to_string()))?;
                fs::write(manifest_path, text)?;
                debug!(project = %self.name, path = %manifest_path.display(), "saved manifest");
            }
            None => {
                debug!(project = %self.name, "implicit project, nothing to persist");
            }
        }
        self.dirty = false;
        Ok(())
    }
}

fn relative_include(directory: &Path, path: &Path) -> Result<String, Error> {
    let relative = path.strip_prefix(directory).map_err(|_| {
        Error::host(format!(
            "{} is outside of project directory {}",
            path.display(),
            directory.display()
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn flatten(directory: &Path, nodes: &[ItemNode], parent: Option<&Path>, out: &mut Vec<ProjectItem>) {
    for node in nodes {
        let path = directory.join(&node.include);
        out.push(ProjectItem {
            path: path.clone(),
            parent: parent.map(Path::to_path_buf),
            metadata: node.metadata.clone(),
        });
        flatten(directory, &node.children, Some(&path), out);
    }
}

fn find<'a>(nodes: &'a [ItemNode], include: &str) -> Option<&'a ItemNode> {
    for node in nodes {
        if node.include == include {
            return Some(node);
        }
        if let Some(found) = find(&node.children, include) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(nodes: &'a mut [ItemNode], include: &str) -> Option<&'a mut ItemNode> {
    for node in nodes.iter_mut() {
        if node.include == include {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, include) {
            return Some(found);
        }
    }
    None
}

fn remove(nodes: &mut Vec<ItemNode>, include: &str) -> Option<ItemNode> {
    if let Some(index) = nodes.iter().position(|n| n.include == include) {
        return Some(nodes.remove(index));
    }
    nodes
        .iter_mut()
        .find_map(|node| remove(&mut node.children, include))
}

fn delete_files(directory: &Path, node: &ItemNode) -> Result<(), Error> {
    for child in &node.children {
        delete_files(directory, child)?;
    }
    delete_file(&directory.join(&node.include))
}

fn delete_file(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// All projects found under one root directory.
#[derive(Debug)]
pub struct Solution {
    pub root: PathBuf,
    pub projects: Vec<FsProject>,
}

impl Solution {
    /// Finds every manifest under `root`, nested projects included. When there is none, `root`
    /// itself is opened as a single implicit project.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        let mut directories = Vec::new();

        let walker = WalkBuilder::new(&root)
            .git_ignore(true)
            .git_exclude(true)
            .parents(true)
            .build();
        for dent in walker {
            let dent = match dent {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if dent.file_name() == MANIFEST_FILE_NAME
                && dent.file_type().is_some_and(|t| t.is_file())
            {
                if let Some(dir) = dent.path().parent() {
                    directories.push(dir.to_path_buf());
                }
            }
        }
        directories.sort();

        let projects = if directories.is_empty() {
            vec![FsProject::open(&root)?]
        } else {
            directories
                .iter()
                .map(FsProject::open)
                .collect::<Result<Vec<_>, _>>()?
        };
        debug!(root = %root.display(), projects = projects.len(), "discovered projects");
        Ok(Solution { root, projects })
    }
}
