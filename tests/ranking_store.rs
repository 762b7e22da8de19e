// Ranked record store over every blob backend

use chrono::NaiveDate;
use tempfile::TempDir;
use tenure_metrics::{
    AuxiliaryField, BlobStore, FsBlobStore, GrowthFormula, MemoryBlobStore, RankingSchema,
    RankingStore, RecordDraft, SqliteBlobStore, StoreError, StoreOptions,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn create_test_draft(name: &str, start_value: f64, end_value: f64) -> RecordDraft {
    RecordDraft::complete(name, date(1993, 1, 20), date(2001, 1, 20), start_value, end_value)
        .with_auxiliary("Unemployment", 4.123456)
        .with_auxiliary("Population", 262.7)
        .with_auxiliary("Inequality", 0.41)
}

/// Insert, remove, then check a second session sees exactly the same list
fn exercise_backend<S: BlobStore + Clone>(backend: S) {
    let mut store = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();
    assert!(store.is_empty());

    store.insert(&create_test_draft("Clinton", 6.9, 10.6), &GrowthFormula::Ratio).unwrap();
    store.insert(&create_test_draft("Smith", 100.0, 110.0), &GrowthFormula::Ratio).unwrap();
    store.insert(&create_test_draft("Smith", 100.0, 130.0), &GrowthFormula::Ratio).unwrap();

    assert!(matches!(store.remove("Smith", None), Err(StoreError::Ambiguous { .. })));
    store.remove("Smith", Some(0.3)).unwrap();

    let fresh = RankingStore::open(backend, StoreOptions::default()).unwrap();
    assert_eq!(fresh.records(), store.records());
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh.records()[0].name, "Smith");
    assert_eq!(fresh.records()[1].derived_growth, 0.5362);
    assert_eq!(fresh.records()[1].auxiliary_value("Unemployment"), Some(4.1235));
    assert_eq!(fresh.revision(), store.revision());
}

#[test]
fn test_memory_backend() {
    exercise_backend(MemoryBlobStore::new());
}

#[test]
fn test_fs_backend() {
    let dir = TempDir::new().unwrap();
    exercise_backend(FsBlobStore::new(dir.path()).unwrap());

    let body = std::fs::read_to_string(dir.path().join("head_of_state_data.csv")).unwrap();
    assert!(body.starts_with("Name,Start Date,End Date,GDP Start,GDP End,GDP Growth"));
}

#[test]
fn test_sqlite_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rankings.db");

    {
        let mut store = RankingStore::open(SqliteBlobStore::open(&path).unwrap(), StoreOptions::default()).unwrap();
        store.insert(&create_test_draft("Clinton", 6.9, 10.6), &GrowthFormula::Ratio).unwrap();
    }

    let store = RankingStore::open(SqliteBlobStore::open(&path).unwrap(), StoreOptions::default()).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].start_value, 6.9);
}

#[test]
fn test_sessions_are_last_write_wins() {
    let backend = MemoryBlobStore::new();
    let mut alice = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();
    let mut bob = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();

    alice.insert(&create_test_draft("From Alice", 1.0, 2.0), &GrowthFormula::Ratio).unwrap();
    assert_ne!(bob.revision(), bob.durable_revision().unwrap());

    // Bob never reloaded, so his write drops Alice's record
    bob.insert(&create_test_draft("From Bob", 1.0, 3.0), &GrowthFormula::Ratio).unwrap();

    let fresh = RankingStore::open(backend, StoreOptions::default()).unwrap();
    let names: Vec<&str> = fresh.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["From Bob"]);

    // Alice's cache still holds her record until she reloads
    assert_eq!(alice.len(), 1);
    alice.reload().unwrap();
    assert_eq!(alice.records()[0].name, "From Bob");
}

#[test]
fn test_added_auxiliary_field_loads_absent() {
    let backend = MemoryBlobStore::new();
    let old = StoreOptions {
        schema: RankingSchema {
            auxiliary: vec![AuxiliaryField::new("Unemployment", Some(0.0), Some(100.0))],
            ..RankingSchema::default()
        },
        ..StoreOptions::default()
    };

    let mut store = RankingStore::open(backend.clone(), old).unwrap();
    let draft = RecordDraft::complete("Early", date(1980, 1, 1), date(1984, 1, 1), 2.0, 3.0)
        .with_auxiliary("Unemployment", 7.0);
    store.insert(&draft, &GrowthFormula::Difference).unwrap();

    let upgraded = RankingStore::open(backend, StoreOptions::default()).unwrap();
    let record = &upgraded.records()[0];

    assert_eq!(record.auxiliary_value("Unemployment"), Some(7.0));
    assert_eq!(record.auxiliary_value("Population"), None);
    assert_eq!(record.auxiliary.len(), 3);
}

#[test]
fn test_custom_key_is_separate_list() {
    let backend = MemoryBlobStore::new();
    let mut default_list = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();
    default_list.insert(&create_test_draft("Default", 1.0, 2.0), &GrowthFormula::Ratio).unwrap();

    let other = StoreOptions {
        key: "other.csv".to_string(),
        ..StoreOptions::default()
    };
    let other_list = RankingStore::open(backend, other).unwrap();
    assert!(other_list.is_empty());
}

#[test]
fn test_narrower_schema_keeps_other_columns() {
    let backend = MemoryBlobStore::new();
    let mut full = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();
    let draft = create_test_draft("Full", 6.9, 10.6).with_auxiliary("Population", 10.0);
    full.insert(&draft, &GrowthFormula::Ratio).unwrap();

    let narrow = StoreOptions {
        schema: RankingSchema {
            auxiliary: vec![AuxiliaryField::new("Unemployment", Some(0.0), Some(100.0))],
            ..RankingSchema::default()
        },
        ..StoreOptions::default()
    };
    let mut narrow = RankingStore::open(backend.clone(), narrow).unwrap();
    let draft = RecordDraft::complete("Narrow", date(2001, 1, 20), date(2009, 1, 20), 10.6, 14.7)
        .with_auxiliary("Unemployment", 5.0);
    narrow.insert(&draft, &GrowthFormula::Ratio).unwrap();

    let fresh = RankingStore::open(backend, StoreOptions::default()).unwrap();
    let full_record = fresh.records().iter().find(|r| r.name == "Full").unwrap();
    let narrow_record = fresh.records().iter().find(|r| r.name == "Narrow").unwrap();

    assert_eq!(fresh.len(), 2);
    assert_eq!(full_record.auxiliary_value("Population"), Some(10.0));
    assert_eq!(narrow_record.auxiliary_value("Population"), None);
    assert_eq!(narrow_record.auxiliary_value("Unemployment"), Some(5.0));
}
