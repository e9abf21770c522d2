//! Destinations a [`TabularModel`] can be exported to and imported from.

pub mod cloud;
pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{cancel::CancellationToken, error::Error, progress::Progress, tabular::TabularModel};

pub use cloud::{CellRange, CellUpdate, CloudSheetBackend, DocumentInfo, SheetService, WorksheetInfo};
pub use file::FileBackend;
pub use memory::MemorySheetService;

/// What a backend can do beyond plain export and import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendCapabilities {
    /// Highlighted cells are shown as such.
    pub highlighting: bool,
    /// Targets live on a remote service.
    pub remote: bool,
    /// Existing documents can be listed.
    pub list_documents: bool,
}

/// A store of sheets.
///
/// Targets and sources are backend specific: a directory for [`FileBackend`], a document id for
/// [`CloudSheetBackend`].
#[async_trait]
pub trait TabularBackend: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Writes one sheet per group of `model`, replacing sheets with the same title.
    async fn export(
        &self,
        target: &str,
        model: Arc<TabularModel>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;

    /// Reads every sheet of `source` back into a model.
    async fn import(
        &self,
        source: &str,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<TabularModel, Error>;
}
