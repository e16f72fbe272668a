//! Behavior-driven tests for the file driver
//!
//! These tests verify HOW a data file and its structure file on disk are
//! opened by URI, exposed as one flow and memoized until they change.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sdmx_core::{
    Connection, DataDetail, FileDriver, FlowRef, Frequency, Key, SdmxErrorKind, SdmxManager,
    SdmxSource, TtlCache, VerboseCache,
};

const EXR_STRUCTURE: &str = include_str!("fixtures/ecb_exr_structure21.xml");
const EXR_COMPACT: &str = include_str!("fixtures/ecb_exr_compact21.xml");

struct Workspace {
    _dir: tempfile::TempDir,
    data: PathBuf,
    structure: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let data = dir.path().join("exr.xml");
        let structure = dir.path().join("exr_structure.xml");
        fs::write(&data, EXR_COMPACT).expect("write data");
        fs::write(&structure, EXR_STRUCTURE).expect("write structure");
        Self {
            _dir: dir,
            data,
            structure,
        }
    }

    fn uri(&self) -> String {
        format!(
            "sdmx:file:?data={}&structure={}",
            self.data.display(),
            self.structure.display()
        )
    }
}

/// Compact message without its annual series.
fn monthly_only() -> String {
    let start = EXR_COMPACT.find(r#"<Series FREQ="A""#).expect("annual series");
    let end = EXR_COMPACT[start..].find("</Series>").expect("series end") + start + "</Series>".len();
    format!("{}{}", &EXR_COMPACT[..start], &EXR_COMPACT[end..])
}

type HitLog = Arc<Mutex<Vec<bool>>>;

fn manager_with_hit_log() -> (SdmxManager, HitLog) {
    let log: HitLog = Arc::default();
    let sink = Arc::clone(&log);
    let cache = VerboseCache::new(TtlCache::new()).with_listener(move |key, hit| {
        if key.starts_with("sdmx:file:") {
            sink.lock().expect("hit log").push(hit);
        }
    });
    let manager = SdmxManager::builder()
        .with_driver(Arc::new(FileDriver::new()))
        .with_cache(Arc::new(cache))
        .build()
        .expect("manager builds");
    (manager, log)
}

fn exr_flow() -> FlowRef {
    FlowRef::parse("ECB,exr,1.0").expect("valid ref")
}

// =============================================================================
// File Driver: Opening
// =============================================================================

#[test]
fn when_file_uri_is_opened_data_file_becomes_one_flow() {
    // Given: A data file and its structure on disk
    let workspace = Workspace::new();
    let (manager, _) = manager_with_hit_log();

    // When: The file URI is opened
    let connection = manager.get_connection_by_uri(&workspace.uri()).expect("connected");

    // Then: One flow named after the data file uses the structure
    let flows = connection.flows().expect("flows");
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].flow_ref(), &exr_flow());
    assert_eq!(flows[0].structure_ref().to_string(), "ECB,ECB_EXR1,1.0");

    let series = connection
        .series(&exr_flow(), &Key::parse("A.").expect("valid key"), DataDetail::Full)
        .expect("data");
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].frequency(), Frequency::Annual);
}

#[test]
fn when_file_source_is_configured_it_opens_by_name() {
    // Given: A named source pointing at the files
    let workspace = Workspace::new();
    let source = SdmxSource::builder()
        .name("LOCAL_EXR")
        .driver("file")
        .endpoint(workspace.data.display().to_string())
        .property("structure", workspace.structure.display().to_string())
        .build()
        .expect("valid source");
    let manager = SdmxManager::builder()
        .with_driver(Arc::new(FileDriver::new()))
        .with_source(source)
        .build()
        .expect("manager builds");

    // When: The source is opened by name
    let connection = manager.get_connection("LOCAL_EXR").expect("connected");

    // Then: The structure is reachable through the flow
    let structure = connection.structure(&exr_flow()).expect("structure");
    assert_eq!(structure.dimension_ids(), vec!["FREQ", "CURRENCY"]);
}

#[test]
fn when_data_file_is_missing_error_is_io() {
    // Given: A URI naming a file that does not exist
    let workspace = Workspace::new();
    let missing = workspace.data.with_file_name("missing.xml");
    let uri = format!(
        "sdmx:file:?data={}&structure={}",
        missing.display(),
        workspace.structure.display()
    );
    let (manager, _) = manager_with_hit_log();

    // When: The URI is opened
    let err = manager.get_connection_by_uri(&uri).err().expect("missing file");

    // Then: An I/O error is reported
    assert_eq!(err.kind(), SdmxErrorKind::Io);
}

// =============================================================================
// File Driver: Caching
// =============================================================================

#[test]
fn when_files_are_unchanged_second_open_hits_cache() {
    // Given: A manager with an observed cache
    let workspace = Workspace::new();
    let (manager, log) = manager_with_hit_log();

    // When: The same files are opened twice
    manager.get_connection_by_uri(&workspace.uri()).expect("first");
    manager.get_connection_by_uri(&workspace.uri()).expect("second");

    // Then: The first read missed and the second hit
    assert_eq!(*log.lock().expect("hit log"), vec![false, true]);
}

#[test]
fn when_data_file_changes_cached_repository_is_not_reused() {
    // Given: Files already loaded once
    let workspace = Workspace::new();
    let (manager, log) = manager_with_hit_log();
    manager.get_connection_by_uri(&workspace.uri()).expect("first");

    // When: The data file is rewritten with fewer series and reopened
    fs::write(&workspace.data, monthly_only()).expect("rewrite data");
    let connection = manager.get_connection_by_uri(&workspace.uri()).expect("second");

    // Then: The cache missed and the new content is served
    assert_eq!(*log.lock().expect("hit log"), vec![false, false]);
    let series = connection
        .series(&exr_flow(), &Key::ALL, DataDetail::SeriesKeysOnly)
        .expect("data");
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].key().to_string(), "M.USD");
}
