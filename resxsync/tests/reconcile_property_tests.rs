use proptest::prelude::*;
use resxsync::formats::ResxStore;
use resxsync::types::OpaqueEntry;
use resxsync::{
    CancellationToken, CultureTag, FsProject, MemoryLogger, Progress, ReconcileOptions,
    ReconciliationEngine, ResourceEntry, ResourceNode, ResourceStore, SyncConfig,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

fn key_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Z][A-Za-z0-9_]{0,12}").expect("valid key regex")
}

fn value_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 <>&'\"_\\-\\.,!\\?]{0,24}").expect("valid value regex")
}

fn entries_strategy(min: usize) -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), min..8)
}

fn text_nodes(values: &BTreeMap<String, String>) -> Vec<ResourceNode> {
    values
        .iter()
        .map(|(key, value)| ResourceEntry::new(key.clone(), value.clone()).into())
        .collect()
}

fn opaque(key: &str) -> ResourceNode {
    ResourceNode::Opaque(OpaqueEntry {
        key: key.to_string(),
        raw: format!(
            "<data name=\"{key}\" type=\"System.Resources.ResXFileRef, System.Windows.Forms\"><value>{key}.png;System.Byte[]</value></data>"
        ),
    })
}

fn keys(path: &Path) -> BTreeSet<String> {
    ResxStore
        .read(path)
        .expect("readable resx")
        .iter()
        .map(|n| n.key().to_string())
        .collect()
}

fn engine() -> ReconciliationEngine {
    ReconciliationEngine::new(
        Arc::new(ResxStore),
        Arc::new(MemoryLogger::new()),
        SyncConfig::default(),
    )
}

fn culture(tag: &str) -> CultureTag {
    CultureTag::parse_known(tag).expect("known culture")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn reconcile_converges_culture_keys_to_neutral(
        neutral in entries_strategy(0),
        french in entries_strategy(0),
    ) {
        let tmp = tempfile::tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let dir = tmp.path();
        let mut neutral_nodes = text_nodes(&neutral);
        neutral_nodes.push(opaque("logo_icon"));
        ResxStore.write(&dir.join("Strings.resx"), &neutral_nodes)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        ResxStore.write(&dir.join("Strings.fr.resx"), &text_nodes(&french))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let mut projects = vec![FsProject::open(dir).map_err(|e| TestCaseError::fail(e.to_string()))?];
        let cultures: BTreeSet<CultureTag> = [culture("fr"), culture("de")].into();
        engine()
            .reconcile(&cultures, &mut projects, &ReconcileOptions::default(), &Progress::detached(), &CancellationToken::new())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let expected = keys(&dir.join("Strings.resx"));
        prop_assert_eq!(&keys(&dir.join("Strings.fr.resx")), &expected);
        prop_assert_eq!(&keys(&dir.join("Strings.de.resx")), &expected);

        let fr = ResxStore.read(&dir.join("Strings.fr.resx")).map_err(|e| TestCaseError::fail(e.to_string()))?;
        for node in &fr {
            match node {
                ResourceNode::Text(entry) => {
                    let want = french.get(&entry.key).or_else(|| neutral.get(&entry.key));
                    prop_assert_eq!(Some(&entry.value), want);
                }
                ResourceNode::Opaque(entry) => prop_assert_eq!(&entry.key, "logo_icon"),
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn resx_store_preserves_text_and_comments(values in entries_strategy(1)) {
        let tmp = tempfile::tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let path = tmp.path().join("Strings.resx");
        let nodes: Vec<ResourceNode> = values
            .iter()
            .map(|(key, value)| ResourceEntry::new(key.clone(), value.clone()).with_comment(format!("{key} & co")).into())
            .collect();

        ResxStore.write(&path, &nodes).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let back = ResxStore.read(&path).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(back, nodes);
    }
}

#[test]
fn test_groups_without_neutral_leave_nothing_behind() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    std::fs::write(
        dir.join("resxproj.toml"),
        "name = \"Web\"\n\n[[item]]\ninclude = \"Errors.fr.resx\"\n\n[[item.children]]\ninclude = \"Errors.de.resx\"\n",
    )
    .unwrap();
    ResxStore
        .write(&dir.join("Errors.fr.resx"), &text_nodes(&[("A".to_string(), "a".to_string())].into()))
        .unwrap();
    ResxStore.write(&dir.join("Errors.de.resx"), &[]).unwrap();

    let mut projects = vec![FsProject::open(dir).unwrap()];
    let report = engine()
        .reconcile(
            &[culture("fr")].into(),
            &mut projects,
            &ReconcileOptions::default(),
            &Progress::detached(),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.orphaned_groups, vec!["Errors"]);
    assert!(!dir.join("Errors.fr.resx").exists());
    assert!(!dir.join("Errors.de.resx").exists());
    let reopened = FsProject::open(dir).unwrap();
    assert!(resxsync::ProjectHost::all_items(&reopened).unwrap().is_empty());
}

#[test]
fn test_reconcile_reports_full_progress() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["Web", "Api"] {
        let project = tmp.path().join(name);
        std::fs::create_dir_all(&project).unwrap();
        ResxStore
            .write(&project.join("Strings.resx"), &text_nodes(&[("A".to_string(), "a".to_string())].into()))
            .unwrap();
    }
    let mut projects = resxsync::Solution::discover(tmp.path()).unwrap().projects;
    let values = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = values.clone();
    let root = resxsync::StatusProgress::new(move |_, value| sink.lock().unwrap().push(value));

    engine()
        .reconcile(
            &[culture("fr")].into(),
            &mut projects,
            &ReconcileOptions::default(),
            &root,
            &CancellationToken::new(),
        )
        .unwrap();

    assert!((root.value() - 100.0).abs() < 1e-6);
    assert!(!values.lock().unwrap().is_empty());
}
