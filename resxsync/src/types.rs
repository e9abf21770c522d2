//! Core data model: resource entries, resource files, and their grouping per project.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::{culture::CultureTag, error::Error};

/// A string resource. Identity is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ResourceEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ResourceEntry {
            key: key.into(),
            value: value.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Comment text, empty when there is none.
    pub fn comment_text(&self) -> &str {
        self.comment.as_deref().unwrap_or("")
    }
}

/// A non-string `<data>` node (typed payload, file reference, binary blob).
///
/// Kept as raw XML and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueEntry {
    pub key: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceNode {
    Text(ResourceEntry),
    Opaque(OpaqueEntry),
}

impl ResourceNode {
    pub fn key(&self) -> &str {
        match self {
            ResourceNode::Text(entry) => &entry.key,
            ResourceNode::Opaque(entry) => &entry.key,
        }
    }

    pub fn as_text(&self) -> Option<&ResourceEntry> {
        match self {
            ResourceNode::Text(entry) => Some(entry),
            ResourceNode::Opaque(_) => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut ResourceEntry> {
        match self {
            ResourceNode::Text(entry) => Some(entry),
            ResourceNode::Opaque(_) => None,
        }
    }
}

impl From<ResourceEntry> for ResourceNode {
    fn from(entry: ResourceEntry) -> Self {
        ResourceNode::Text(entry)
    }
}

/// One physical resource file belonging to a logical group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceFile {
    pub logical_name: String,
    pub path: PathBuf,
    pub culture: CultureTag,
    /// Host item this file is nested under, if any.
    pub parent: Option<PathBuf>,
    /// `None` when the file was discovered but its content was not read.
    #[serde(skip)]
    pub content: Option<Vec<ResourceNode>>,
}

impl ResourceFile {
    pub fn deferred(
        logical_name: impl Into<String>,
        path: impl Into<PathBuf>,
        culture: CultureTag,
        parent: Option<PathBuf>,
    ) -> Self {
        ResourceFile {
            logical_name: logical_name.into(),
            path: path.into(),
            culture,
            parent,
            content: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    /// Loaded nodes, or an empty slice for deferred files.
    pub fn nodes(&self) -> &[ResourceNode] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// Keys of every node, string and opaque alike.
    pub fn key_set(&self) -> BTreeSet<&str> {
        self.nodes().iter().map(ResourceNode::key).collect()
    }

    pub fn string_entries(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.nodes().iter().filter_map(ResourceNode::as_text)
    }

    pub fn find_entry(&self, key: &str) -> Option<&ResourceEntry> {
        self.string_entries().find(|entry| entry.key == key)
    }
}

/// All culture variants of one logical resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalResourceGroup {
    pub logical_name: String,
    pub files: BTreeMap<CultureTag, ResourceFile>,
}

impl LogicalResourceGroup {
    pub fn new(logical_name: impl Into<String>) -> Self {
        LogicalResourceGroup {
            logical_name: logical_name.into(),
            files: BTreeMap::new(),
        }
    }

    /// The neutral file, the source of truth for keys and ordering.
    pub fn neutral(&self) -> Result<&ResourceFile, Error> {
        self.files
            .get(&CultureTag::Neutral)
            .ok_or_else(|| Error::MissingNeutralCulture {
                resource: self.logical_name.clone(),
            })
    }

    pub fn get(&self, culture: &CultureTag) -> Option<&ResourceFile> {
        self.files.get(culture)
    }

    pub fn cultures(&self) -> impl Iterator<Item = &CultureTag> {
        self.files.keys()
    }
}

/// Resources of one project, rebuilt on every run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectResources {
    pub project_id: String,
    pub project_name: String,
    pub project_directory: PathBuf,
    pub groups: BTreeMap<String, LogicalResourceGroup>,
}

impl ProjectResources {
    pub fn file_count(&self) -> usize {
        self.groups.values().map(|g| g.files.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolutionResources {
    pub projects: Vec<ProjectResources>,
}

impl SolutionResources {
    /// Every culture seen in any group.
    pub fn cultures(&self) -> BTreeSet<CultureTag> {
        self.projects
            .iter()
            .flat_map(|p| p.groups.values())
            .flat_map(|g| g.cultures().cloned())
            .collect()
    }

    pub fn find_project(&self, name: &str) -> Option<&ProjectResources> {
        self.projects.iter().find(|p| p.project_name == name)
    }

    pub fn file_count(&self) -> usize {
        self.projects.iter().map(ProjectResources::file_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(culture: CultureTag, nodes: Vec<ResourceNode>) -> ResourceFile {
        let mut file = ResourceFile::deferred("Strings", "Strings.resx", culture, None);
        file.content = Some(nodes);
        file
    }

    #[test]
    fn test_key_set_includes_opaque_nodes() {
        let f = file(
            CultureTag::Neutral,
            vec![
                ResourceEntry::new("B", "b").into(),
                ResourceNode::Opaque(OpaqueEntry {
                    key: "Icon".to_string(),
                    raw: "<data name=\"Icon\" type=\"System.Drawing.Icon\" />".to_string(),
                }),
                ResourceEntry::new("A", "a").into(),
            ],
        );
        let keys: Vec<&str> = f.key_set().into_iter().collect();
        assert_eq!(keys, vec!["A", "B", "Icon"]);
        assert_eq!(f.string_entries().count(), 2);
        assert_eq!(f.find_entry("A").unwrap().value, "a");
        assert!(f.find_entry("Icon").is_none());
    }

    #[test]
    fn test_deferred_file_has_no_nodes() {
        let f = ResourceFile::deferred("Strings", "Strings.de.resx", CultureTag::Neutral, None);
        assert!(!f.is_loaded());
        assert!(f.nodes().is_empty());
    }

    #[test]
    fn test_group_without_neutral_is_an_error() {
        let mut group = LogicalResourceGroup::new("Resources/Strings");
        let fr = CultureTag::parse_known("fr").unwrap();
        group.files.insert(fr.clone(), file(fr, Vec::new()));
        match group.neutral() {
            Err(Error::MissingNeutralCulture { resource }) => {
                assert_eq!(resource, "Resources/Strings")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_comment_text_defaults_to_empty() {
        let entry = ResourceEntry::new("A", "a");
        assert_eq!(entry.comment_text(), "");
        assert_eq!(entry.with_comment("note").comment_text(), "note");
    }
}
