//! Sheets on a remote spreadsheet service.
//!
//! The service itself sits behind [`SheetService`]; [`CloudSheetBackend`] adds what every remote
//! round-trip needs on top of it:
//!
//! * at most `cloud.concurrency` requests in flight, shared by all operations of the backend;
//! * cell writes in batches of `cloud.write_batch_size` cells and reads in batches of about
//!   `cloud.read_batch_size` cells;
//! * a timeout per request, and retries with exponential backoff for transient failures;
//! * cancellation checked before each request, so batches already sent finish and no new ones
//!   start.
//!
//! Export replaces worksheets without a window in which a group has no sheet: worksheets with
//! the same title as a group are renamed out of the way, the new ones created, and only then are
//! the renamed ones deleted.
//!
//! Sheet applications read the literal cell text `true` as a boolean. Such values are written as
//! `="true"` formulas and read back as plain text.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendCapabilities, TabularBackend},
    cancel::CancellationToken,
    config::CloudConfig,
    error::Error,
    progress::Progress,
    tabular::{TabularModel, batch_ranges, grid_to_group, group_layout},
};

const BOOLEAN_LITERALS: [&str; 4] = ["true", "false", "True", "False"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorksheetInfo {
    pub id: String,
    pub title: String,
    pub rows: usize,
    pub columns: usize,
}

/// One cell write. Rows and columns are zero based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: usize,
    pub value: String,
    pub highlighted: bool,
}

/// Whole rows `first_row..first_row + rows`, `columns` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub first_row: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Raw operations of a spreadsheet service.
///
/// Failures worth retrying are reported as [`Error::transient`].
#[async_trait]
pub trait SheetService: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, Error>;

    async fn list_worksheets(&self, document: &str) -> Result<Vec<WorksheetInfo>, Error>;

    async fn rename_worksheet(&self, document: &str, worksheet: &str, title: &str)
    -> Result<(), Error>;

    async fn create_worksheet(
        &self,
        document: &str,
        title: &str,
        rows: usize,
        columns: usize,
    ) -> Result<WorksheetInfo, Error>;

    async fn delete_worksheet(&self, document: &str, worksheet: &str) -> Result<(), Error>;

    async fn update_cells(
        &self,
        document: &str,
        worksheet: &str,
        cells: &[CellUpdate],
    ) -> Result<(), Error>;

    /// Cell texts of `range`, one vector per row. Trailing empty rows and cells may be omitted.
    async fn read_cells(
        &self,
        document: &str,
        worksheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<String>>, Error>;
}

/// Protects boolean-looking text from being turned into a boolean.
pub fn escape_cell(value: &str) -> String {
    if BOOLEAN_LITERALS.contains(&value) {
        format!("=\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Reverses [`escape_cell`]. Other formulas are left alone.
pub fn unescape_cell(value: &str) -> String {
    value
        .strip_prefix("=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|inner| BOOLEAN_LITERALS.contains(inner))
        .unwrap_or(value)
        .to_string()
}

/// Request plumbing shared by every call: the concurrency bound, timeout and retries.
struct Requests<S> {
    service: Arc<S>,
    permits: Arc<Semaphore>,
    max_retries: u32,
    initial_backoff: Duration,
    timeout: Duration,
}

impl<S> Clone for Requests<S> {
    fn clone(&self) -> Self {
        Requests {
            service: self.service.clone(),
            permits: self.permits.clone(),
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            timeout: self.timeout,
        }
    }
}

impl<S: SheetService> Requests<S> {
    async fn call<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        request: F,
    ) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| Error::service("request limiter closed"))?;
                cancel.check()?;
                match tokio::time::timeout(self.timeout, request()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout {
                        operation: operation.to_string(),
                    }),
                }
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "retrying after transient failure");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                other => return other,
            }
        }
    }
}

/// A [`TabularBackend`] over a [`SheetService`]. Targets and sources are document ids.
pub struct CloudSheetBackend<S> {
    requests: Requests<S>,
    write_batch_size: usize,
    read_batch_size: usize,
}

impl<S: SheetService + 'static> CloudSheetBackend<S> {
    pub fn new(service: Arc<S>, config: &CloudConfig) -> Self {
        CloudSheetBackend {
            requests: Requests {
                service,
                permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
                max_retries: config.max_retries,
                initial_backoff: Duration::from_millis(config.initial_backoff_ms),
                timeout: Duration::from_secs(config.request_timeout_secs),
            },
            write_batch_size: config.write_batch_size,
            read_batch_size: config.read_batch_size,
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.requests.timeout = timeout;
        self
    }

    pub fn service(&self) -> &Arc<S> {
        &self.requests.service
    }

    /// Documents the service account can see.
    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>, Error> {
        let service = &self.requests.service;
        self.requests
            .call("list documents", &CancellationToken::new(), || service.list_documents())
            .await
    }

    /// Renames the worksheets that would clash with `titles`; returns their ids.
    async fn move_aside(
        &self,
        document: &str,
        titles: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, Error> {
        let service = &self.requests.service;
        let existing = self
            .requests
            .call("list worksheets", cancel, || service.list_worksheets(document))
            .await?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let clashing = existing
            .iter()
            .filter(|ws| titles.iter().any(|t| t.eq_ignore_ascii_case(&ws.title)));

        let mut renamed = Vec::new();
        for (index, worksheet) in clashing.enumerate() {
            let temporary = format!("~{stamp:x}-{index}");
            self.requests
                .call("rename worksheet", cancel, || {
                    service.rename_worksheet(document, &worksheet.id, &temporary)
                })
                .await?;
            debug!(worksheet = %worksheet.title, temporary = %temporary, "moved worksheet aside");
            renamed.push(worksheet.id.clone());
        }
        Ok(renamed)
    }

    async fn push_cells(
        &self,
        document: &str,
        jobs: Vec<(String, Vec<CellUpdate>)>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let mut batches = Vec::new();
        for (worksheet, cells) in jobs {
            for range in batch_ranges(cells.len(), self.write_batch_size) {
                batches.push((worksheet.clone(), cells[range].to_vec()));
            }
        }

        let total = batches.len();
        let mut tasks = JoinSet::new();
        for (worksheet, batch) in batches {
            let requests = self.requests.clone();
            let document = document.to_string();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let service = &requests.service;
                requests
                    .call("update cells", &cancel, || {
                        service.update_cells(&document, &worksheet, &batch)
                    })
                    .await
            });
        }

        let mut done = 0;
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .map_err(|e| Error::service(format!("cell batch task failed: {e}")))
                .and_then(|r| r);
            match result {
                Ok(()) => {
                    done += 1;
                    progress.report_fraction(done, total);
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read_worksheet(
        &self,
        document: &str,
        worksheet: &WorksheetInfo,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<String>>, Error> {
        let columns = worksheet.columns.max(1);
        let rows_per_batch = (self.read_batch_size / columns).max(1);

        let mut tasks = JoinSet::new();
        for (index, range) in batch_ranges(worksheet.rows, rows_per_batch).into_iter().enumerate() {
            let requests = self.requests.clone();
            let document = document.to_string();
            let worksheet_id = worksheet.id.clone();
            let cancel = cancel.clone();
            let cells = CellRange {
                first_row: range.start,
                rows: range.len(),
                columns,
            };
            tasks.spawn(async move {
                let service = &requests.service;
                let rows = requests
                    .call("read cells", &cancel, || {
                        service.read_cells(&document, &worksheet_id, cells)
                    })
                    .await?;
                Ok::<_, Error>((index, cells.rows, rows))
            });
        }

        let mut parts = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let part = joined.map_err(|e| Error::service(format!("cell read task failed: {e}")))??;
            parts.push(part);
        }
        parts.sort_by_key(|(index, _, _)| *index);

        let mut grid = Vec::with_capacity(worksheet.rows);
        for (_, expected, mut rows) in parts {
            rows.resize(expected, Vec::new());
            grid.extend(rows.into_iter().map(|row| {
                row.iter().map(|value| unescape_cell(value)).collect::<Vec<_>>()
            }));
        }
        Ok(grid)
    }
}

#[async_trait]
impl<S: SheetService + 'static> TabularBackend for CloudSheetBackend<S> {
    fn name(&self) -> &str {
        "cloud"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            highlighting: true,
            remote: true,
            list_documents: true,
        }
    }

    async fn export(
        &self,
        target: &str,
        model: Arc<TabularModel>,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let phases = progress.create_children(&[1.0, 4.0]);
        let service = &self.requests.service;

        let titles: Vec<&str> = model.groups.iter().map(|g| g.title.as_str()).collect();
        let renamed = self.move_aside(target, &titles, cancel).await?;

        let mut jobs = Vec::with_capacity(model.groups.len());
        for group in &model.groups {
            let layout = group_layout(group);
            let rows = layout.len().max(1);
            let columns = layout.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let worksheet = self
                .requests
                .call("create worksheet", cancel, || {
                    service.create_worksheet(target, &group.title, rows, columns)
                })
                .await?;

            let cells: Vec<CellUpdate> = layout
                .iter()
                .enumerate()
                .flat_map(|(row, cells)| {
                    cells.iter().enumerate().filter(|(_, c)| !c.text.is_empty()).map(
                        move |(column, cell)| CellUpdate {
                            row,
                            column,
                            value: escape_cell(&cell.text),
                            highlighted: cell.highlighted,
                        },
                    )
                })
                .collect();
            jobs.push((worksheet.id, cells));
        }

        for worksheet in &renamed {
            self.requests
                .call("delete worksheet", cancel, || service.delete_worksheet(target, worksheet))
                .await?;
        }
        phases[0].report(100.0);

        self.push_cells(target, jobs, &phases[1], cancel).await?;
        phases[1].report(100.0);

        info!(document = target, sheets = model.groups.len(), "exported to sheet service");
        Ok(())
    }

    async fn import(
        &self,
        source: &str,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<TabularModel, Error> {
        let service = &self.requests.service;
        let worksheets = self
            .requests
            .call("list worksheets", cancel, || service.list_worksheets(source))
            .await?;

        let mut model = TabularModel::default();
        for (done, worksheet) in worksheets.iter().enumerate() {
            let grid = self.read_worksheet(source, worksheet, cancel).await?;
            let group = grid_to_group(worksheet.title.clone(), &grid)?;
            if group.tables.is_empty() {
                debug!(worksheet = %worksheet.title, "skipping empty worksheet");
            } else {
                model.groups.push(group);
            }
            progress.report_fraction(done + 1, worksheets.len());
        }
        progress.report(100.0);
        Ok(model)
    }
}
