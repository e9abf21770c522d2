//! Sheets as delimited files in a directory, one file per group.
//!
//! The group title becomes the file name. Characters that cannot appear in a file name are
//! replaced with `_`, so a group whose title needed replacing comes back under the replaced
//! title. Export refuses titles that end up with the same file name.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::{
    backend::{BackendCapabilities, TabularBackend},
    cancel::CancellationToken,
    error::Error,
    formats::{CsvSheet, FormatType, TsvSheet},
    progress::Progress,
    tabular::{TabularModel, grid_to_group, group_to_grid},
    traits::Parser,
};

lazy_static! {
    static ref UNSAFE_FILE_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
}

/// File name stem for a group title.
pub fn sheet_file_stem(title: &str) -> String {
    let stem = UNSAFE_FILE_CHARS.replace_all(title.trim(), "_");
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        stem.into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBackend {
    format: FormatType,
}

impl FileBackend {
    /// A backend writing `csv` or `tsv` sheets.
    pub fn new(format: FormatType) -> Result<Self, Error> {
        match format {
            FormatType::Csv | FormatType::Tsv => Ok(FileBackend { format }),
            other => Err(Error::UnknownFormat(format!("{other} (expected csv or tsv)"))),
        }
    }

    pub fn format(&self) -> FormatType {
        self.format
    }

    fn sheet_path(&self, directory: &Path, title: &str) -> PathBuf {
        directory.join(format!("{}.{}", sheet_file_stem(title), self.format.extension()))
    }

    fn write_sheet(&self, path: &Path, rows: Vec<Vec<String>>) -> Result<(), Error> {
        match self.format {
            FormatType::Tsv => TsvSheet { rows }.write_to(path),
            _ => CsvSheet { rows }.write_to(path),
        }
    }

    fn read_sheet(&self, path: &Path) -> Result<Vec<Vec<String>>, Error> {
        Ok(match self.format {
            FormatType::Tsv => TsvSheet::read_from(path)?.rows,
            _ => CsvSheet::read_from(path)?.rows,
        })
    }

    /// Sheet paths of every group, refusing titles that map to the same file.
    ///
    /// Stems are compared ignoring case, as on case-insensitive file systems.
    fn sheet_paths(&self, directory: &Path, model: &TabularModel) -> Result<Vec<PathBuf>, Error> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        let mut paths = Vec::with_capacity(model.groups.len());
        for group in &model.groups {
            let stem = sheet_file_stem(&group.title);
            if let Some(other) = seen.insert(stem.to_lowercase(), &group.title) {
                return Err(Error::invalid_table(format!(
                    "groups `{other}` and `{}` would both be written to `{stem}.{}`",
                    group.title,
                    self.format.extension()
                )));
            }
            paths.push(self.sheet_path(directory, &group.title));
        }
        Ok(paths)
    }

    /// Sheet files of `directory`, sorted by name.
    fn sheet_files(&self, directory: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && FormatType::from_path(&path) == Some(self.format) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl TabularBackend for FileBackend {
    fn name(&self) -> &str {
        match self.format {
            FormatType::Tsv => "tsv",
            _ => "csv",
        }
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    async fn export(
        &self,
        target: &str,
        model: Arc<TabularModel>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let directory = Path::new(target);
        let paths = self.sheet_paths(directory, &model)?;
        let created = directory.to_path_buf();
        blocking(move || fs::create_dir_all(created).map_err(Error::Io)).await?;

        let total = model.groups.len();
        for (done, (group, path)) in model.groups.iter().zip(paths).enumerate() {
            cancel.check()?;
            let backend = *self;
            let rows = group_to_grid(group);
            let written = blocking(move || backend.write_sheet(&path, rows).map(|_| path)).await?;
            debug!(path = %written.display(), tables = group.tables.len(), "wrote sheet");
            progress.report_fraction(done + 1, total);
        }
        progress.report(100.0);
        Ok(())
    }

    async fn import(
        &self,
        source: &str,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<TabularModel, Error> {
        let directory = Path::new(source);
        if !directory.is_dir() {
            return Err(Error::invalid_table(format!("{source} is not a sheet directory")));
        }

        let backend = *self;
        let listed = directory.to_path_buf();
        let files = blocking(move || backend.sheet_files(&listed)).await?;
        let mut model = TabularModel::default();
        for (done, path) in files.iter().enumerate() {
            cancel.check()?;
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let sheet = path.clone();
            let grid = blocking(move || backend.read_sheet(&sheet)).await?;
            model.groups.push(grid_to_group(title, &grid)?);
            progress.report_fraction(done + 1, files.len());
        }
        progress.report(100.0);
        Ok(model)
    }
}

/// Runs sheet file I/O on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Io(io::Error::other(e.to_string())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Group, Row, Table};
    use tempfile::tempdir;

    fn model() -> TabularModel {
        TabularModel {
            groups: vec![Group {
                title: "Web".to_string(),
                tables: vec![Table {
                    title: "Resources/Strings".to_string(),
                    header: vec![
                        "ResourceKey".to_string(),
                        "Default".to_string(),
                        "fr".to_string(),
                        "Comment".to_string(),
                    ],
                    rows: vec![Row::from_texts(["Greeting", "Hello, world", "Bonjour", ""])],
                }],
            }],
        }
    }

    #[test]
    fn test_resx_is_not_a_sheet_format() {
        assert!(FileBackend::new(FormatType::Resx).is_err());
        assert!(FileBackend::new(FormatType::Tsv).is_ok());
    }

    #[test]
    fn test_sheet_file_stem() {
        assert_eq!(sheet_file_stem("Web"), "Web");
        assert_eq!(sheet_file_stem("Web/Admin: v2"), "Web_Admin_ v2");
        assert_eq!(sheet_file_stem(".."), "_");
    }

    #[tokio::test]
    async fn test_export_then_import() {
        for format in [FormatType::Csv, FormatType::Tsv] {
            let dir = tempdir().unwrap();
            let target = dir.path().join("sheets");
            let target = target.to_str().unwrap();
            let backend = FileBackend::new(format).unwrap();
            let progress = Progress::detached();

            backend
                .export(target, Arc::new(model()), &progress, &CancellationToken::new())
                .await
                .unwrap();
            assert!((progress.value() - 100.0).abs() < 1e-9);
            assert!(dir.path().join(format!("sheets/Web.{}", format.extension())).is_file());

            let back = backend
                .import(target, &Progress::detached(), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(back, model());
        }
    }

    #[tokio::test]
    async fn test_import_ignores_other_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let backend = FileBackend::new(FormatType::Csv).unwrap();

        let model = backend
            .import(dir.path().to_str().unwrap(), &Progress::detached(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(model.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_export_writes_nothing() {
        let dir = tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let backend = FileBackend::new(FormatType::Csv).unwrap();

        let result = backend
            .export(dir.path().to_str().unwrap(), Arc::new(model()), &Progress::detached(), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!dir.path().join("Web.csv").exists());
    }

    #[tokio::test]
    async fn test_titles_sharing_a_file_name_are_rejected() {
        let dir = tempdir().unwrap();
        let mut model = model();
        let mut twin = model.groups[0].clone();
        model.groups[0].title = "Web/Admin".to_string();
        twin.title = "web_admin".to_string();
        model.groups.push(twin);
        let backend = FileBackend::new(FormatType::Csv).unwrap();

        let result = backend
            .export(dir.path().to_str().unwrap(), Arc::new(model), &Progress::detached(), &CancellationToken::new())
            .await;
        match result {
            Err(Error::InvalidTable(message)) => {
                assert!(message.contains("`Web/Admin`"));
                assert!(message.contains("web_admin.csv"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!dir.path().join("Web_Admin.csv").exists());
    }
}
