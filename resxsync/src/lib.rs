#![forbid(unsafe_code)]
//! Keeps .NET `.resx` resource files of many projects in sync across cultures.
//!
//! Every logical resource (`Strings.resx`, `Strings.fr.resx`, `Strings.de.resx`, ...) has one
//! neutral file and any number of culture files. The [`ReconciliationEngine`] makes the culture
//! files follow the neutral one, and round-trips all of them through sheets so translators can
//! work in a spreadsheet.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::{collections::BTreeSet, sync::Arc};
//! use resxsync::{
//!     CancellationToken, CultureTag, FsProject, Progress, ReconcileOptions,
//!     ReconciliationEngine, SyncConfig, TracingLogger, formats::ResxStore,
//! };
//!
//! let engine = ReconciliationEngine::new(
//!     Arc::new(ResxStore),
//!     Arc::new(TracingLogger),
//!     SyncConfig::default(),
//! );
//! let mut projects = vec![FsProject::open("src/Web")?];
//! let cultures: BTreeSet<CultureTag> = ["fr".parse()?, "de".parse()?].into();
//!
//! let report = engine.reconcile(
//!     &cultures,
//!     &mut projects,
//!     &ReconcileOptions::default(),
//!     &Progress::detached(),
//!     &CancellationToken::new(),
//! )?;
//! println!("{} file(s) added", report.files_added.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Sheets
//!
//! [`ReconciliationEngine::export`] and [`ReconciliationEngine::import`] move resources through
//! any [`TabularBackend`]: a directory of CSV or TSV files ([`FileBackend`]) or a remote
//! spreadsheet service ([`CloudSheetBackend`]). Imports are validated as a whole before any
//! file is written.

pub mod backend;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod culture;
pub mod engine;
pub mod error;
pub mod formats;
pub mod host;
pub mod logger;
pub mod progress;
pub mod tabular;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    backend::{BackendCapabilities, CellUpdate, CloudSheetBackend, FileBackend, MemorySheetService, SheetService, TabularBackend},
    cancel::CancellationToken,
    catalog::ResourceCatalog,
    config::{EmptyNeutralPolicy, SyncConfig},
    convert::MergePlan,
    culture::CultureTag,
    engine::{ExportSummary, ImportSummary, ReconcileOptions, ReconcileReport, ReconciliationEngine},
    error::{Error, ErrorCode},
    formats::FormatType,
    host::{FsProject, ProjectHost, Solution},
    logger::{CombinedLogger, Logger, MemoryLogger, TracingLogger},
    progress::{Progress, StatusProgress},
    tabular::TabularModel,
    traits::{Parser, ResourceStore},
    types::{LogicalResourceGroup, ResourceEntry, ResourceFile, ResourceNode, SolutionResources},
};
