use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use resxsync::{
    CancellationToken, CombinedLogger, CultureTag, FsProject, MemoryLogger, Progress,
    ReconciliationEngine, SyncConfig, formats::ResxStore,
};

use crate::discovery::discover_projects;
use crate::error::CommandError;
use crate::status::ProgressLine;

/// Options shared by every command that works on projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    pub roots: Vec<String>,
    pub projects: Vec<String>,
    pub config: Option<String>,
}

/// Everything a command needs: configuration, projects, engine and terminal output.
pub struct Workspace {
    pub engine: Arc<ReconciliationEngine>,
    pub projects: Vec<FsProject>,
    pub progress: ProgressLine,
    pub messages: MemoryLogger,
    pub cancel: CancellationToken,
}

impl Workspace {
    pub fn open(options: &ProjectOptions, cancel: CancellationToken) -> Result<Self, CommandError> {
        let config = load_config(options)?;
        let projects = discover_projects(&options.roots, &options.projects)?;

        let progress = ProgressLine::for_terminal();
        let messages = MemoryLogger::new();
        let logger = CombinedLogger::default()
            .with(Arc::new(progress.logger()))
            .with(Arc::new(messages.clone()));
        let engine = ReconciliationEngine::new(Arc::new(ResxStore), Arc::new(logger), config);

        Ok(Workspace {
            engine: Arc::new(engine),
            projects,
            progress,
            messages,
            cancel,
        })
    }

    /// The requested cultures, or every culture already present in the projects.
    pub fn cultures_or_existing(
        &self,
        requested: BTreeSet<CultureTag>,
    ) -> Result<BTreeSet<CultureTag>, CommandError> {
        if !requested.is_empty() {
            return Ok(requested);
        }
        let solution = self.engine.scan(
            &self.projects,
            Some(&BTreeSet::new()),
            &Progress::detached(),
            &self.cancel,
        )?;
        Ok(solution
            .cultures()
            .into_iter()
            .filter(|c| !c.is_neutral())
            .collect())
    }
}

fn load_config(options: &ProjectOptions) -> Result<SyncConfig, CommandError> {
    let loaded = match &options.config {
        Some(path) => SyncConfig::from_toml_file(path),
        None => {
            let root = options.roots.first().map(String::as_str).unwrap_or(".");
            SyncConfig::load_or_default(Path::new(root))
        }
    };
    loaded.map_err(|e| CommandError::Failed(format!("Failed to load configuration: {}", e)))
}
