//! Project containers that own resource files.
//!
//! The engine never touches project structure directly. It goes through [`ProjectHost`], which
//! knows which files belong to a project, how they are nested, and what metadata they carry.

pub mod fs;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::error::Error;

pub use fs::{FsProject, MANIFEST_FILE_NAME, Solution};

/// Metadata key naming the code generator attached to a neutral resource file.
pub const GENERATOR_METADATA: &str = "Generator";
/// Metadata key naming the build action of a file.
pub const ITEM_TYPE_METADATA: &str = "ItemType";

/// One file registered with a project, flattened out of the item tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectItem {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Item this one is nested under.
    pub parent: Option<PathBuf>,
    pub metadata: BTreeMap<String, String>,
}

/// A project that contains resource files.
///
/// Paths passed in and out are absolute. Implementations keep structural changes in memory
/// until [`ProjectHost::save`]; file creation and deletion happen immediately.
pub trait ProjectHost: Send {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn directory(&self) -> &Path;

    /// Every item of the project, depth first, nested items included.
    fn all_items(&self) -> Result<Vec<ProjectItem>, Error>;

    /// Registers an existing file, nested under `parent` when given.
    fn add_item(&mut self, parent: Option<&Path>, path: &Path) -> Result<(), Error>;

    /// Unregisters the item and deletes it (and its nested items) from disk.
    fn delete_item(&mut self, path: &Path) -> Result<(), Error>;

    /// Unregisters the item, leaving the file on disk.
    fn remove_item(&mut self, path: &Path) -> Result<(), Error>;

    /// Sets (`Some`) or clears (`None`) one metadata value of an item.
    fn set_metadata(&mut self, path: &Path, key: &str, value: Option<&str>) -> Result<(), Error>;

    /// Persists pending structural and metadata changes.
    fn save(&mut self) -> Result<(), Error>;
}

impl<T: ProjectHost + ?Sized> ProjectHost for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn directory(&self) -> &Path {
        (**self).directory()
    }

    fn all_items(&self) -> Result<Vec<ProjectItem>, Error> {
        (**self).all_items()
    }

    fn add_item(&mut self, parent: Option<&Path>, path: &Path) -> Result<(), Error> {
        (**self).add_item(parent, path)
    }

    fn delete_item(&mut self, path: &Path) -> Result<(), Error> {
        (**self).delete_item(path)
    }

    fn remove_item(&mut self, path: &Path) -> Result<(), Error> {
        (**self).remove_item(path)
    }

    fn set_metadata(&mut self, path: &Path, key: &str, value: Option<&str>) -> Result<(), Error> {
        (**self).set_metadata(path, key, value)
    }

    fn save(&mut self) -> Result<(), Error> {
        (**self).save()
    }
}
