//! Config and JSON store error-message and on-disk layout tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;

use xref_core::{
    config,
    store::{self, JsonStore},
    types::{Gene, GeneKind, Species, SubjectId},
    ConfigError, GeneRepository, StoreError,
};

// ---------------------------------------------------------------------------
// 1. Config load errors
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".xrefsync/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[rstest]
#[case("species: [unicorn]\n")]
#[case("import:\n  namespace_key: not-a-number\n  source_pipeline: X\n")]
fn load_wrong_shape_returns_parse_error(#[case] yaml: &str) {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".xrefsync/config.yaml").write_str(yaml).expect("write");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn load_invalid_config_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".xrefsync/config.yaml")
        .write_str("import:\n  source_pipeline: \"  \"\n  namespace_key: 150\n")
        .expect("write");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Config init
// ---------------------------------------------------------------------------

#[test]
fn init_config_writes_file_and_is_idempotent() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::config_path_at(home.path());

    let first = config::init_config(&path, false).expect("init");
    home.child(".xrefsync/config.yaml")
        .assert(predicate::str::contains("source_pipeline: RatGTEx"));

    // A hand edit survives a second non-forced init.
    let edited = fs::read_to_string(&path).unwrap().replace("RatGTEx", "GTExPortal");
    fs::write(&path, edited).unwrap();
    let second = config::init_config(&path, false).expect("init again");
    assert_eq!(second.import.source_pipeline.0, "GTExPortal");
    assert_eq!(first.storage.data_dir, second.storage.data_dir);

    let forced = config::init_config(&path, true).expect("force");
    assert_eq!(forced.import.source_pipeline.0, "RatGTEx");
}

#[cfg(unix)]
#[test]
fn saved_config_is_private() {
    use std::os::unix::fs::PermissionsExt;
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::config_path_at(home.path());
    config::init_config(&path, false).expect("init");
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

// ---------------------------------------------------------------------------
// 3. JSON store
// ---------------------------------------------------------------------------

#[test]
fn corrupt_store_returns_parse_error_with_path() {
    let data = assert_fs::TempDir::new().expect("tempdir");
    data.child(store::STORE_FILE).write_str("{ not json").expect("write");
    let err = JsonStore::open(data.path()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains(store::STORE_FILE));
}

#[test]
fn hand_written_store_is_readable() {
    let data = assert_fs::TempDir::new().expect("tempdir");
    data.child(store::STORE_FILE)
        .write_str(
            r#"{
  "next_key": 1,
  "genes": [
    { "subject_id": 2004, "symbol": "A2m", "species": "rat" },
    { "subject_id": 2005, "symbol": "A2m-s1", "species": "rat", "kind": "splice" }
  ]
}"#,
        )
        .expect("write");

    let store = JsonStore::open(data.path()).expect("open");
    let genes = store.gene_table().active_genes(Species::Rat).expect("genes");
    assert_eq!(
        genes,
        vec![Gene {
            subject_id: SubjectId(2004),
            symbol: "A2m".into(),
            species: Species::Rat,
            kind: GeneKind::Gene,
            active: true,
        }]
    );
    assert!(store.memory().records().is_empty());
}
