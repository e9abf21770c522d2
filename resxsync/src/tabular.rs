//! The tabular model shared by all backends, and its sheet layout.
//!
//! A [`TabularModel`] has one [`Group`] per project and one [`Table`] per logical resource.
//! Backends lay each group out as one sheet:
//!
//! ```text
//! Resources/Strings          <- table title
//!                            <- separator
//! ResourceKey | Default | fr | Comment
//! Greeting    | Hello   | Bonjour |
//!                            <- separator
//! Resources/Errors
//! ...
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Header of the first column.
pub const KEY_COLUMN_TITLE: &str = "ResourceKey";
/// Header of the last column.
pub const COMMENT_COLUMN_TITLE: &str = "Comment";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    /// Suggests the value was copied from another culture and still needs translating.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub highlighted: bool,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            highlighted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row {
            cells: texts.into_iter().map(Cell::new).collect(),
        }
    }

    /// Cell text at `index`, empty when the row is shorter.
    pub fn text(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.text.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub title: String,
    pub tables: Vec<Table>,
}

impl Group {
    /// Number of cells a sheet for this group holds, separators excluded.
    pub fn cell_count(&self) -> usize {
        self.tables
            .iter()
            .map(|t| 1 + t.header.len() + t.rows.iter().map(|r| r.cells.len()).sum::<usize>())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularModel {
    pub groups: Vec<Group>,
}

impl TabularModel {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.tables.iter())
            .map(|t| t.rows.len())
            .sum()
    }

    pub fn find_group(&self, title: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.title == title)
    }
}

/// Lays a group out as sheet rows of cells. Separator rows are empty.
pub fn group_layout(group: &Group) -> Vec<Vec<Cell>> {
    let mut layout = Vec::new();
    for table in &group.tables {
        layout.push(vec![Cell::new(table.title.clone())]);
        layout.push(Vec::new());
        layout.push(table.header.iter().cloned().map(Cell::new).collect());
        for row in &table.rows {
            layout.push(row.cells.clone());
        }
        layout.push(Vec::new());
    }
    layout
}

/// Text-only form of [`group_layout`].
pub fn group_to_grid(group: &Group) -> Vec<Vec<String>> {
    group_layout(group)
        .into_iter()
        .map(|row| row.into_iter().map(|cell| cell.text).collect())
        .collect()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Reads a group back from sheet rows laid out by [`group_to_grid`].
///
/// Data rows shorter than the header are padded with empty cells; cells beyond the header are
/// ignored. Highlighting is not stored in sheets and comes back unset.
pub fn grid_to_group(title: impl Into<String>, grid: &[Vec<String>]) -> Result<Group, Error> {
    let title = title.into();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < grid.len() {
        if is_blank(&grid[i]) {
            i += 1;
            continue;
        }

        let table_title = grid[i][0].trim().to_string();
        i += 1;
        while i < grid.len() && is_blank(&grid[i]) {
            i += 1;
        }

        let header: Vec<String> = match grid.get(i) {
            Some(row) => row.iter().map(|c| c.trim().to_string()).collect(),
            None => {
                return Err(Error::invalid_table(format!(
                    "table `{table_title}` in `{title}` has no header row"
                )));
            }
        };
        if header.len() < 2 {
            return Err(Error::invalid_table(format!(
                "header of table `{table_title}` in `{title}` needs a key and a comment column"
            )));
        }
        i += 1;

        let mut rows = Vec::new();
        while i < grid.len() && !is_blank(&grid[i]) {
            let cells = (0..header.len())
                .map(|col| Cell::new(grid[i].get(col).cloned().unwrap_or_default()))
                .collect();
            rows.push(Row { cells });
            i += 1;
        }

        tables.push(Table {
            title: table_title,
            header,
            rows,
        });
    }

    Ok(Group { title, tables })
}

/// Splits `total` items into consecutive batches of at most `size`.
///
/// A `size` of zero means no batching.
pub fn batch_ranges(total: usize, size: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    if size == 0 {
        return vec![0..total];
    }
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> Group {
        Group {
            title: "Web".to_string(),
            tables: vec![
                Table {
                    title: "Resources/Strings".to_string(),
                    header: vec![
                        KEY_COLUMN_TITLE.to_string(),
                        "Default".to_string(),
                        "fr".to_string(),
                        COMMENT_COLUMN_TITLE.to_string(),
                    ],
                    rows: vec![
                        Row::from_texts(["A", "Hello", "Bonjour", ""]),
                        Row::from_texts(["B", "Bye", "", "farewell"]),
                    ],
                },
                Table {
                    title: "Views/Index.cshtml".to_string(),
                    header: vec![
                        KEY_COLUMN_TITLE.to_string(),
                        "Default".to_string(),
                        COMMENT_COLUMN_TITLE.to_string(),
                    ],
                    rows: vec![Row::from_texts(["Title", "Home", ""])],
                },
            ],
        }
    }

    #[test]
    fn test_batch_ranges() {
        let sizes: Vec<usize> = batch_ranges(2500, 1000).iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(batch_ranges(1000, 1000), vec![0..1000]);
        assert!(batch_ranges(0, 1000).is_empty());
        assert_eq!(batch_ranges(7, 0), vec![0..7]);
    }

    #[test]
    fn test_grid_layout() {
        let grid = group_to_grid(&sample_group());
        assert_eq!(grid[0], vec!["Resources/Strings"]);
        assert!(grid[1].is_empty());
        assert_eq!(grid[2][0], KEY_COLUMN_TITLE);
        assert_eq!(grid[3], vec!["A", "Hello", "Bonjour", ""]);
        assert!(grid[5].is_empty());
        assert_eq!(grid[6], vec!["Views/Index.cshtml"]);
        assert_eq!(grid.len(), 11);
    }

    #[test]
    fn test_grid_reads_back() {
        let group = sample_group();
        let back = grid_to_group("Web", &group_to_grid(&group)).unwrap();
        assert_eq!(back, group);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let grid = vec![
            vec!["Strings".to_string()],
            vec!["".to_string()],
            vec!["ResourceKey".into(), "Default".into(), "fr".into(), "Comment".into()],
            vec!["A".into(), "Hello".into()],
        ];
        let group = grid_to_group("Web", &grid).unwrap();
        let row = &group.tables[0].rows[0];
        assert_eq!(row.cells.len(), 4);
        assert_eq!(row.text(2), "");
    }

    #[test]
    fn test_missing_header_is_invalid() {
        let grid = vec![vec!["Strings".to_string()], vec![]];
        assert!(matches!(
            grid_to_group("Web", &grid),
            Err(Error::InvalidTable(_))
        ));

        let grid = vec![vec!["Strings".to_string()], vec![], vec!["ResourceKey".to_string()]];
        assert!(matches!(
            grid_to_group("Web", &grid),
            Err(Error::InvalidTable(_))
        ));
    }

    #[test]
    fn test_cell_count() {
        assert_eq!(sample_group().cell_count(), (1 + 4 + 8) + (1 + 3 + 3));
    }
}
