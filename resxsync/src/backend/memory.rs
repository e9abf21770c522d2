//! A [`SheetService`] that keeps documents in memory.
//!
//! Behaves like a strict remote service: titles are unique per document (ignoring ASCII case),
//! writes outside a worksheet fail, and unknown documents or worksheets are errors. It can also
//! be told to fail or to answer slowly.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    backend::cloud::{CellRange, CellUpdate, DocumentInfo, SheetService, WorksheetInfo},
    error::Error,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCell {
    pub value: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone)]
struct Worksheet {
    id: String,
    title: String,
    rows: usize,
    columns: usize,
    cells: BTreeMap<(usize, usize), MemoryCell>,
}

impl Worksheet {
    fn info(&self) -> WorksheetInfo {
        WorksheetInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            rows: self.rows,
            columns: self.columns,
        }
    }
}

#[derive(Debug, Clone)]
struct Document {
    title: String,
    worksheets: Vec<Worksheet>,
}

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<String, Document>,
    next_id: usize,
    failures: usize,
    latency: Duration,
    update_batches: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct MemorySheetService {
    state: Mutex<State>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Counts a request as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySheetService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_document(&self, id: &str, title: &str) {
        self.state().documents.insert(
            id.to_string(),
            Document {
                title: title.to_string(),
                worksheets: Vec::new(),
            },
        );
    }

    /// Adds a worksheet holding `grid`. Does nothing for an unknown document.
    pub fn add_worksheet(&self, document: &str, title: &str, grid: Vec<Vec<String>>) {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("ws{}", state.next_id);
        let Some(doc) = state.documents.get_mut(document) else {
            return;
        };
        let mut cells = BTreeMap::new();
        for (r, row) in grid.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                cells.insert(
                    (r, c),
                    MemoryCell {
                        value: value.clone(),
                        highlighted: false,
                    },
                );
            }
        }
        doc.worksheets.push(Worksheet {
            id,
            title: title.to_string(),
            rows: grid.len(),
            columns: grid.iter().map(Vec::len).max().unwrap_or(0),
            cells,
        });
    }

    pub fn worksheet_titles(&self, document: &str) -> Vec<String> {
        self.state()
            .documents
            .get(document)
            .map(|doc| doc.worksheets.iter().map(|ws| ws.title.clone()).collect())
            .unwrap_or_default()
    }

    pub fn cell(&self, document: &str, worksheet: &str, row: usize, column: usize) -> Option<MemoryCell> {
        let state = self.state();
        let ws = state
            .documents
            .get(document)?
            .worksheets
            .iter()
            .find(|ws| ws.title == worksheet)?;
        ws.cells.get(&(row, column)).cloned()
    }

    /// Cell texts of a worksheet, without trailing empty cells.
    pub fn grid(&self, document: &str, worksheet: &str) -> Vec<Vec<String>> {
        let state = self.state();
        let Some(ws) = state
            .documents
            .get(document)
            .and_then(|doc| doc.worksheets.iter().find(|ws| ws.title == worksheet))
        else {
            return Vec::new();
        };
        (0..ws.rows).map(|r| row_texts(ws, r, ws.columns)).collect()
    }

    /// Makes the next `count` requests fail with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.state().failures = count;
    }

    /// Delays every request by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Sizes of the cell batches written so far, in arrival order.
    pub fn update_batches(&self) -> Vec<usize> {
        self.state().update_batches.clone()
    }

    /// Highest number of requests seen in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin(&self) -> Result<InFlight<'_>, Error> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(Error::transient("service unavailable"));
        }
        Ok(guard)
    }

    fn with_document<T>(
        &self,
        document: &str,
        f: impl FnOnce(&mut Document, &mut usize) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut state = self.state();
        let State {
            documents, next_id, ..
        } = &mut *state;
        let doc = documents
            .get_mut(document)
            .ok_or_else(|| Error::service(format!("document `{document}` not found")))?;
        f(doc, next_id)
    }
}

fn row_texts(ws: &Worksheet, row: usize, columns: usize) -> Vec<String> {
    let mut texts: Vec<String> = (0..columns)
        .map(|c| {
            ws.cells
                .get(&(row, c))
                .map(|cell| cell.value.clone())
                .unwrap_or_default()
        })
        .collect();
    while texts.last().is_some_and(String::is_empty) {
        texts.pop();
    }
    texts
}

fn find_worksheet<'a>(doc: &'a mut Document, id: &str) -> Result<&'a mut Worksheet, Error> {
    doc.worksheets
        .iter_mut()
        .find(|ws| ws.id == id)
        .ok_or_else(|| Error::service(format!("worksheet `{id}` not found")))
}

fn ensure_unique_title(doc: &Document, title: &str) -> Result<(), Error> {
    if doc.worksheets.iter().any(|ws| ws.title.eq_ignore_ascii_case(title)) {
        return Err(Error::service(format!("a worksheet named `{title}` already exists")));
    }
    Ok(())
}

#[async_trait]
impl SheetService for MemorySheetService {
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>, Error> {
        let _guard = self.begin().await?;
        Ok(self
            .state()
            .documents
            .iter()
            .map(|(id, doc)| DocumentInfo {
                id: id.clone(),
                title: doc.title.clone(),
                url: None,
            })
            .collect())
    }

    async fn list_worksheets(&self, document: &str) -> Result<Vec<WorksheetInfo>, Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, _| {
            Ok(doc.worksheets.iter().map(Worksheet::info).collect())
        })
    }

    async fn rename_worksheet(
        &self,
        document: &str,
        worksheet: &str,
        title: &str,
    ) -> Result<(), Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, _| {
            ensure_unique_title(doc, title)?;
            find_worksheet(doc, worksheet)?.title = title.to_string();
            Ok(())
        })
    }

    async fn create_worksheet(
        &self,
        document: &str,
        title: &str,
        rows: usize,
        columns: usize,
    ) -> Result<WorksheetInfo, Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, next_id| {
            ensure_unique_title(doc, title)?;
            *next_id += 1;
            let ws = Worksheet {
                id: format!("ws{next_id}"),
                title: title.to_string(),
                rows,
                columns,
                cells: BTreeMap::new(),
            };
            let info = ws.info();
            doc.worksheets.push(ws);
            Ok(info)
        })
    }

    async fn delete_worksheet(&self, document: &str, worksheet: &str) -> Result<(), Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, _| {
            let before = doc.worksheets.len();
            doc.worksheets.retain(|ws| ws.id != worksheet);
            if doc.worksheets.len() == before {
                return Err(Error::service(format!("worksheet `{worksheet}` not found")));
            }
            Ok(())
        })
    }

    async fn update_cells(
        &self,
        document: &str,
        worksheet: &str,
        cells: &[CellUpdate],
    ) -> Result<(), Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, _| {
            let ws = find_worksheet(doc, worksheet)?;
            for cell in cells {
                if cell.row >= ws.rows || cell.column >= ws.columns {
                    return Err(Error::service(format!(
                        "cell R{}C{} is outside of worksheet `{}`",
                        cell.row + 1,
                        cell.column + 1,
                        ws.title
                    )));
                }
            }
            for cell in cells {
                ws.cells.insert(
                    (cell.row, cell.column),
                    MemoryCell {
                        value: cell.value.clone(),
                        highlighted: cell.highlighted,
                    },
                );
            }
            Ok(())
        })?;
        self.state().update_batches.push(cells.len());
        Ok(())
    }

    async fn read_cells(
        &self,
        document: &str,
        worksheet: &str,
        range: CellRange,
    ) -> Result<Vec<Vec<String>>, Error> {
        let _guard = self.begin().await?;
        self.with_document(document, |doc, _| {
            let ws = find_worksheet(doc, worksheet)?;
            let end = (range.first_row + range.rows).min(ws.rows);
            Ok((range.first_row..end)
                .map(|r| row_texts(ws, r, range.columns))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_titles_are_unique_ignoring_case() {
        let service = MemorySheetService::new();
        service.add_document("doc", "Translations");
        service.create_worksheet("doc", "Web", 2, 2).await.unwrap();

        let err = service.create_worksheet("doc", "WEB", 2, 2).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_writes_outside_the_worksheet_fail() {
        let service = MemorySheetService::new();
        service.add_document("doc", "Translations");
        let ws = service.create_worksheet("doc", "Web", 1, 1).await.unwrap();

        let cell = CellUpdate {
            row: 1,
            column: 0,
            value: "x".to_string(),
            highlighted: false,
        };
        assert!(service.update_cells("doc", &ws.id, &[cell]).await.is_err());
        assert!(service.update_batches().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient() {
        let service = MemorySheetService::new();
        service.fail_next(1);

        assert!(service.list_documents().await.unwrap_err().is_transient());
        assert!(service.list_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_cells_trims_trailing_blanks() {
        let service = MemorySheetService::new();
        service.add_document("doc", "Translations");
        service.add_worksheet(
            "doc",
            "Web",
            vec![
                vec!["a".to_string(), String::new()],
                vec![String::new(), "b".to_string()],
            ],
        );
        let ws = service.list_worksheets("doc").await.unwrap().remove(0);

        let rows = service
            .read_cells(
                "doc",
                &ws.id,
                CellRange {
                    first_row: 0,
                    rows: 5,
                    columns: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![vec!["a".to_string()], vec![String::new(), "b".to_string()]]);
    }
}
