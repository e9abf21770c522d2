//! Conversion between scanned resources and the [`TabularModel`].
//!
//! Both directions are pure: nothing here reads or writes files. Importing produces a
//! [`MergePlan`] that is applied separately, so a failed validation never leaves half-written
//! resources behind.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::PathBuf,
};

use serde::Serialize;
use tracing::warn;

use crate::{
    culture::CultureTag,
    error::Error,
    tabular::{COMMENT_COLUMN_TITLE, Cell, Group, KEY_COLUMN_TITLE, Row, TabularModel, Table},
    types::{LogicalResourceGroup, ResourceNode, SolutionResources},
};

/// Puts the neutral culture first and drops duplicates, keeping the order of the rest.
fn normalize_order(culture_order: &[CultureTag]) -> Vec<CultureTag> {
    let mut order = vec![CultureTag::Neutral];
    for culture in culture_order {
        if !order.contains(culture) {
            order.push(culture.clone());
        }
    }
    order
}

/// Builds the tabular model of `solution` with one value column per culture of `culture_order`.
///
/// The neutral culture always comes first. Rows follow the neutral file's string keys in sorted
/// order; missing files or keys render as empty cells. Tables without rows and groups without
/// tables are left out.
pub fn to_tabular(
    solution: &SolutionResources,
    culture_order: &[CultureTag],
    neutral_label: &str,
) -> TabularModel {
    let order = normalize_order(culture_order);

    let mut header = Vec::with_capacity(order.len() + 2);
    header.push(KEY_COLUMN_TITLE.to_string());
    header.extend(order.iter().map(|c| c.display_name(neutral_label)));
    header.push(COMMENT_COLUMN_TITLE.to_string());

    let mut groups = Vec::new();
    for project in &solution.projects {
        let tables: Vec<Table> = project
            .groups
            .values()
            .filter_map(|group| group_table(group, &order, &header))
            .collect();
        if !tables.is_empty() {
            groups.push(Group {
                title: project.project_name.clone(),
                tables,
            });
        }
    }
    TabularModel { groups }
}

fn group_table(group: &LogicalResourceGroup, order: &[CultureTag], header: &[String]) -> Option<Table> {
    let neutral = group.neutral().ok()?;

    let entries: BTreeMap<&str, _> = neutral
        .string_entries()
        .map(|entry| (entry.key.as_str(), entry))
        .collect();
    if entries.is_empty() {
        return None;
    }

    let rows = entries
        .iter()
        .map(|(key, neutral_entry)| {
            let values: Vec<String> = order
                .iter()
                .map(|culture| {
                    group
                        .get(culture)
                        .and_then(|file| file.find_entry(key))
                        .map(|entry| entry.value.clone())
                        .unwrap_or_default()
                })
                .collect();

            let mut cells = Vec::with_capacity(values.len() + 2);
            cells.push(Cell::new(*key));
            cells.extend(highlight(&values));
            cells.push(Cell::new(neutral_entry.comment_text()));
            Row { cells }
        })
        .collect();

    Some(Table {
        title: group.logical_name.clone(),
        header: header.to_vec(),
        rows,
    })
}

/// Marks culture values (every value after the neutral one) that repeat another value of the
/// same row, the neutral one included. The neutral value and empty values are never marked.
pub fn highlight(values: &[String]) -> Vec<Cell> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.as_str()).or_default() += 1;
    }

    values
        .iter()
        .enumerate()
        .map(|(index, value)| Cell {
            text: value.clone(),
            highlighted: index != 0
                && !value.is_empty()
                && counts.get(value.as_str()).copied().unwrap_or(0) > 1,
        })
        .collect()
}

/// One resource file rewrite computed by [`from_tabular`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedWrite {
    pub project: String,
    pub resource: String,
    pub culture: CultureTag,
    pub path: PathBuf,
    #[serde(skip)]
    pub nodes: Vec<ResourceNode>,
}

/// Every write an import will perform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergePlan {
    pub writes: Vec<PlannedWrite>,
    /// Sheet groups or tables that matched no project or resource.
    pub unmatched: Vec<String>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Culture columns of a table header plus the position of the comment column.
struct ResolvedHeader {
    cultures: Vec<(usize, CultureTag)>,
    comment: Option<usize>,
}

fn resolve_header(table: &Table, neutral_label: &str) -> Result<ResolvedHeader, Error> {
    let columns = table.header.len();
    if columns < 2 {
        return Err(Error::invalid_table(format!(
            "header of table `{}` has no culture column",
            table.title
        )));
    }

    let comment = table
        .header
        .last()
        .filter(|title| title.trim().eq_ignore_ascii_case(COMMENT_COLUMN_TITLE))
        .map(|_| columns - 1);
    let end = comment.unwrap_or(columns);

    let mut cultures = Vec::with_capacity(end.saturating_sub(1));
    for (index, title) in table.header.iter().enumerate().take(end).skip(1) {
        let culture = CultureTag::from_display_name(title, neutral_label).map_err(|_| {
            Error::invalid_table(format!(
                "column `{title}` of table `{}` is not a culture",
                table.title
            ))
        })?;
        cultures.push((index, culture));
    }
    Ok(ResolvedHeader { cultures, comment })
}

/// Every culture named by a table header of `model`.
pub fn model_cultures(model: &TabularModel, neutral_label: &str) -> Result<BTreeSet<CultureTag>, Error> {
    let mut cultures = BTreeSet::new();
    for table in model.groups.iter().flat_map(|g| g.tables.iter()) {
        let header = resolve_header(table, neutral_label)?;
        cultures.extend(header.cultures.into_iter().map(|(_, culture)| culture));
    }
    Ok(cultures)
}

/// Computes the writes that bring the files of `solution` in line with `model`.
///
/// Groups are matched to projects by name and tables to resources by logical name. Each loaded
/// file of a culture present in the table is validated first: every string key of the file
/// must have a row, otherwise the whole import fails with [`Error::MissingResource`] before
/// anything is planned. A file is rewritten only when one of its values differs from the table;
/// the comment column updates the neutral file. Opaque nodes and node order are kept.
pub fn from_tabular(
    solution: &SolutionResources,
    model: &TabularModel,
    neutral_label: &str,
) -> Result<MergePlan, Error> {
    let mut plan = MergePlan::default();
    let mut matched = Vec::new();

    for group in &model.groups {
        let Some(project) = solution.find_project(&group.title) else {
            warn!(group = %group.title, "no project matches sheet group");
            plan.unmatched.push(group.title.clone());
            continue;
        };
        for table in &group.tables {
            let Some(resource) = project.groups.get(&table.title) else {
                warn!(project = %project.project_name, table = %table.title, "no resource matches table");
                plan.unmatched.push(format!("{}/{}", group.title, table.title));
                continue;
            };
            let header = resolve_header(table, neutral_label)?;
            let rows: BTreeMap<&str, &Row> = table
                .rows
                .iter()
                .map(|row| (row.text(0), row))
                .collect();
            matched.push((project, resource, header, rows));
        }
    }

    for (project, resource, header, rows) in &matched {
        for (_, culture) in &header.cultures {
            let Some(file) = resource.get(culture).filter(|f| f.is_loaded()) else {
                continue;
            };
            let missing: Vec<String> = file
                .string_entries()
                .filter(|entry| !rows.contains_key(entry.key.as_str()))
                .map(|entry| entry.key.clone())
                .collect();
            if !missing.is_empty() {
                return Err(Error::MissingResource {
                    project: project.project_name.clone(),
                    resource: resource.logical_name.clone(),
                    culture: culture.display_name(neutral_label),
                    keys: missing,
                });
            }
        }
    }

    for (project, resource, header, rows) in matched {
        for (column, culture) in &header.cultures {
            let Some(file) = resource.get(culture).filter(|f| f.is_loaded()) else {
                continue;
            };

            let mut nodes = file.nodes().to_vec();
            let mut changed = false;
            for node in nodes.iter_mut() {
                let Some(entry) = node.as_text_mut() else {
                    continue;
                };
                let Some(row) = rows.get(entry.key.as_str()) else {
                    continue;
                };

                let value = row.text(*column);
                if entry.value != value {
                    entry.value = value.to_string();
                    changed = true;
                }
                if let Some(comment_column) = header.comment {
                    let comment = row.text(comment_column);
                    if entry.comment_text() != comment {
                        entry.comment = (!comment.is_empty()).then(|| comment.to_string());
                        changed = true;
                    }
                }
            }

            if changed {
                plan.writes.push(PlannedWrite {
                    project: project.project_name.clone(),
                    resource: resource.logical_name.clone(),
                    culture: culture.clone(),
                    path: file.path.clone(),
                    nodes,
                });
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        culture::DEFAULT_NEUTRAL_LABEL,
        types::{OpaqueEntry, ProjectResources, ResourceEntry, ResourceFile},
    };

    fn fr() -> CultureTag {
        CultureTag::parse_known("fr").unwrap()
    }

    fn de() -> CultureTag {
        CultureTag::parse_known("de").unwrap()
    }

    fn loaded(culture: CultureTag, entries: &[(&str, &str)]) -> ResourceFile {
        let suffix = culture.tag().map(|t| format!(".{t}")).unwrap_or_default();
        let mut file = ResourceFile::deferred(
            "Strings",
            format!("/p/Strings{suffix}.resx"),
            culture,
            None,
        );
        file.content = Some(
            entries
                .iter()
                .map(|(k, v)| ResourceEntry::new(*k, *v).into())
                .collect(),
        );
        file
    }

    fn solution(files: Vec<ResourceFile>) -> SolutionResources {
        let mut group = LogicalResourceGroup::new("Strings");
        for file in files {
            group.files.insert(file.culture.clone(), file);
        }
        SolutionResources {
            projects: vec![ProjectResources {
                project_id: "p".to_string(),
                project_name: "Web".to_string(),
                project_directory: PathBuf::from("/p"),
                groups: BTreeMap::from([("Strings".to_string(), group)]),
            }],
        }
    }

    #[test]
    fn test_header_and_rows() {
        let solution = solution(vec![
            loaded(CultureTag::Neutral, &[("B", "Bye"), ("A", "Hello")]),
            loaded(fr(), &[("A", "Bonjour")]),
        ]);
        let model = to_tabular(&solution, &[fr(), de()], DEFAULT_NEUTRAL_LABEL);

        let table = &model.groups[0].tables[0];
        assert_eq!(model.groups[0].title, "Web");
        assert_eq!(table.header, vec!["ResourceKey", "Default", "fr", "de", "Comment"]);
        assert_eq!(table.rows[0].text(0), "A");
        assert_eq!(table.rows[0].text(2), "Bonjour");
        assert_eq!(table.rows[1].text(0), "B");
        assert_eq!(table.rows[1].text(2), "");
        assert_eq!(table.rows[1].text(3), "");
    }

    #[test]
    fn test_neutral_column_comes_first() {
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a")])]);
        let model = to_tabular(
            &solution,
            &[de(), CultureTag::Neutral, fr()],
            DEFAULT_NEUTRAL_LABEL,
        );
        assert_eq!(model.groups[0].tables[0].header[1], "Default");
    }

    #[test]
    fn test_empty_tables_are_omitted() {
        let mut neutral = loaded(CultureTag::Neutral, &[]);
        neutral.content = Some(vec![ResourceNode::Opaque(OpaqueEntry {
            key: "Icon".to_string(),
            raw: "<data name=\"Icon\" type=\"x\" />".to_string(),
        })]);
        let model = to_tabular(&solution(vec![neutral]), &[fr()], DEFAULT_NEUTRAL_LABEL);
        assert!(model.is_empty());
    }

    #[test]
    fn test_highlight_repeated_culture_values() {
        let values: Vec<String> = ["Greetings", "Hello", "Hello", "Bonjour"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let flags: Vec<bool> = highlight(&values).iter().map(|c| c.highlighted).collect();
        assert_eq!(flags, vec![false, true, true, false]);
    }

    #[test]
    fn test_highlight_untranslated_copies_of_neutral() {
        let values: Vec<String> = ["Hello", "Hello", "Bonjour"].iter().map(|s| s.to_string()).collect();
        let flags: Vec<bool> = highlight(&values).iter().map(|c| c.highlighted).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_highlight_skips_empty_values() {
        let values: Vec<String> = ["", "", "", "Hallo"].iter().map(|s| s.to_string()).collect();
        let flags: Vec<bool> = highlight(&values).iter().map(|c| c.highlighted).collect();
        assert_eq!(flags, vec![false, false, false, false]);
    }

    #[test]
    fn test_round_trip_without_changes_plans_nothing() {
        let solution = solution(vec![
            loaded(CultureTag::Neutral, &[("A", "a"), ("B", "b")]),
            loaded(fr(), &[("A", "a"), ("B", "b")]),
        ]);
        let model = to_tabular(&solution, &[fr()], DEFAULT_NEUTRAL_LABEL);
        let plan = from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL).unwrap();
        assert!(plan.is_empty());
        assert!(plan.unmatched.is_empty());
    }

    #[test]
    fn test_missing_key_fails_with_every_key() {
        let solution = solution(vec![
            loaded(CultureTag::Neutral, &[("A", "a"), ("B", "b"), ("C", "c"), ("D", "d")]),
        ]);
        let mut model = to_tabular(&solution, &[], DEFAULT_NEUTRAL_LABEL);
        model.groups[0].tables[0].rows.truncate(2);

        match from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL) {
            Err(Error::MissingResource {
                project,
                resource,
                culture,
                keys,
            }) => {
                assert_eq!(project, "Web");
                assert_eq!(resource, "Strings");
                assert_eq!(culture, "Default");
                assert_eq!(keys, vec!["C", "D"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_changed_values_plan_a_write_that_keeps_opaque_nodes() {
        let mut french = loaded(fr(), &[("A", "a"), ("B", "b")]);
        if let Some(nodes) = french.content.as_mut() {
            nodes.insert(
                1,
                ResourceNode::Opaque(OpaqueEntry {
                    key: "Icon".to_string(),
                    raw: "<data name=\"Icon\" type=\"x\" />".to_string(),
                }),
            );
        }
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a"), ("B", "b")]), french]);

        let mut model = to_tabular(&solution, &[fr()], DEFAULT_NEUTRAL_LABEL);
        model.groups[0].tables[0].rows[1].cells[2].text = "Bé".to_string();

        let plan = from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL).unwrap();
        assert_eq!(plan.writes.len(), 1);
        let write = &plan.writes[0];
        assert_eq!(write.culture, fr());
        assert_eq!(write.nodes.len(), 3);
        assert_eq!(write.nodes[1].key(), "Icon");
        assert_eq!(write.nodes[2].as_text().unwrap().value, "Bé");
    }

    #[test]
    fn test_comment_column_updates_every_culture() {
        let solution = solution(vec![
            loaded(CultureTag::Neutral, &[("A", "a")]),
            loaded(fr(), &[("A", "a")]),
        ]);
        let mut model = to_tabular(&solution, &[fr()], DEFAULT_NEUTRAL_LABEL);
        model.groups[0].tables[0].rows[0].cells[3].text = "note".to_string();

        let plan = from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL).unwrap();
        let cultures: Vec<&CultureTag> = plan.writes.iter().map(|w| &w.culture).collect();
        assert_eq!(cultures, vec![&CultureTag::Neutral, &fr()]);
        for write in &plan.writes {
            let entry = write.nodes[0].as_text().unwrap();
            assert_eq!(entry.comment.as_deref(), Some("note"));
            assert_eq!(entry.value, "a");
        }
    }

    #[test]
    fn test_culture_comment_out_of_line_with_table_is_rewritten() {
        let mut french = loaded(fr(), &[("A", "a")]);
        if let Some(ResourceNode::Text(entry)) = french.content.as_mut().and_then(|n| n.first_mut()) {
            entry.comment = Some("stale".to_string());
        }
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a")]), french]);
        let model = to_tabular(&solution, &[fr()], DEFAULT_NEUTRAL_LABEL);

        let plan = from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL).unwrap();
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].culture, fr());
        assert_eq!(plan.writes[0].nodes[0].as_text().unwrap().comment, None);
    }

    #[test]
    fn test_culture_cell_holding_neutral_text_is_highlighted() {
        let solution = solution(vec![
            loaded(CultureTag::Neutral, &[("A", "Hello")]),
            loaded(fr(), &[("A", "Hello")]),
            loaded(de(), &[("A", "Hallo")]),
        ]);
        let model = to_tabular(&solution, &[fr(), de()], DEFAULT_NEUTRAL_LABEL);
        let flags: Vec<bool> = model.groups[0].tables[0].rows[0]
            .cells
            .iter()
            .map(|c| c.highlighted)
            .collect();
        // key, Default, fr, de, comment
        assert_eq!(flags, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_model_cultures() {
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a")])]);
        let model = to_tabular(&solution, &[fr(), de()], DEFAULT_NEUTRAL_LABEL);
        let cultures = model_cultures(&model, DEFAULT_NEUTRAL_LABEL).unwrap();
        assert_eq!(
            cultures.into_iter().collect::<Vec<_>>(),
            vec![CultureTag::Neutral, de(), fr()]
        );
    }

    #[test]
    fn test_unknown_culture_column_is_invalid() {
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a")])]);
        let mut model = to_tabular(&solution, &[], DEFAULT_NEUTRAL_LABEL);
        model.groups[0].tables[0].header[1] = "Translation".to_string();
        assert!(matches!(
            from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL),
            Err(Error::InvalidTable(_))
        ));
    }

    #[test]
    fn test_unmatched_groups_are_reported() {
        let solution = solution(vec![loaded(CultureTag::Neutral, &[("A", "a")])]);
        let mut model = to_tabular(&solution, &[], DEFAULT_NEUTRAL_LABEL);
        model.groups[0].title = "Api".to_string();
        let plan = from_tabular(&solution, &model, DEFAULT_NEUTRAL_LABEL).unwrap();
        assert_eq!(plan.unmatched, vec!["Api"]);
    }
}
