// Ranking store handle: a loaded snapshot plus write-through persistence
//
// The handle owns the in-memory collection for one session. Every successful
// mutation re-serializes the whole collection under one key. A failed write
// rolls the mutation back, so the cache never diverges from durable storage.
// Two handles over the same key are last-write-wins; nothing detects that.

use super::codec;
use super::{round_to, AuxiliaryValue, GrowthFormula, RankedRecord, RankingSchema, RecordDraft};
use super::{DEFAULT_DECIMALS, DEFAULT_STORE_KEY};
use crate::error::{StoreError, StoreResult};
use crate::schema::{FieldError, Problem, SchemaValidator, ValidationErrors};
use crate::storage::BlobStore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Logical key of the ranking list in the blob store
    pub key: String,
    pub schema: RankingSchema,
    /// Decimals kept for every numeric field
    pub decimals: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            key: DEFAULT_STORE_KEY.to_string(),
            schema: RankingSchema::default(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

pub struct RankingStore<S: BlobStore> {
    backend: S,
    options: StoreOptions,
    records: Vec<RankedRecord>,
    revision: String,
}

impl<S: BlobStore> RankingStore<S> {
    /// Open a session: read the whole list once
    pub fn open(backend: S, options: StoreOptions) -> StoreResult<Self> {
        let mut store = RankingStore {
            backend,
            options,
            records: Vec::new(),
            revision: digest(&[]),
        };
        store.reload()?;
        Ok(store)
    }

    /// Replace the snapshot with whatever is durable now
    pub fn reload(&mut self) -> StoreResult<()> {
        let body = self.backend.read(&self.options.key)?.unwrap_or_default();
        self.records = codec::decode(&body, &self.options.schema, self.options.decimals)?;
        self.revision = digest(&body);

        debug!(
            backend = self.backend.backend(),
            key = %self.options.key,
            records = self.records.len(),
            "rankings loaded"
        );
        Ok(())
    }

    /// Write the full snapshot to durable storage
    pub fn flush(&mut self) -> StoreResult<()> {
        let body = codec::encode(&self.records, &self.options.schema)?;
        self.backend.write(&self.options.key, &body)?;
        self.revision = digest(&body);

        info!(
            backend = self.backend.backend(),
            key = %self.options.key,
            records = self.records.len(),
            "rankings persisted"
        );
        Ok(())
    }

    /// Records in most-recent-first order
    pub fn records(&self) -> &[RankedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn schema(&self) -> &RankingSchema {
        &self.options.schema
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Records by derived growth, highest first; ties keep list order
    pub fn ranked(&self) -> Vec<&RankedRecord> {
        let mut ranked: Vec<&RankedRecord> = self.records.iter().collect();
        ranked.sort_by(|a, b| b.derived_growth.total_cmp(&a.derived_growth));
        ranked
    }

    /// SHA-256 of the blob last loaded or flushed by this session
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// SHA-256 of the blob durable right now; differs from `revision()`
    /// when another session wrote in between
    pub fn durable_revision(&self) -> StoreResult<String> {
        let body = self.backend.read(&self.options.key)?.unwrap_or_default();
        Ok(digest(&body))
    }

    /// Validate, derive growth, reject duplicates, prepend, persist
    pub fn insert(&mut self, draft: &RecordDraft, formula: &GrowthFormula) -> StoreResult<RankedRecord> {
        let schema = &self.options.schema;
        let decimals = self.options.decimals;

        let valid = SchemaValidator::new(schema).validate(draft).map_err(|errors| {
            warn!(errors = %errors, "rejected invalid ranking record");
            StoreError::Validation(errors)
        })?;

        let growth = formula.apply(valid.start_value, valid.end_value).ok_or_else(|| {
            let errors = ValidationErrors(vec![FieldError::new(
                &schema.growth_label,
                Problem::Undefined,
                format!(
                    "cannot be derived from {} and {}",
                    valid.start_value, valid.end_value
                ),
            )]);
            warn!(name = %valid.name, errors = %errors, "rejected invalid ranking record");
            StoreError::Validation(errors)
        })?;

        let record = RankedRecord {
            name: valid.name,
            start_date: valid.start_date,
            end_date: valid.end_date,
            start_value: round_to(valid.start_value, decimals),
            end_value: round_to(valid.end_value, decimals),
            derived_growth: round_to(growth, decimals),
            auxiliary: valid
                .auxiliary
                .into_iter()
                .map(|(name, value)| AuxiliaryValue {
                    name,
                    value: Some(round_to(value, decimals)),
                })
                .collect(),
            extra: Vec::new(),
        };

        if self
            .records
            .iter()
            .any(|r| r.same_entry(&record.name, record.derived_growth))
        {
            warn!(name = %record.name, growth = record.derived_growth, "rejected duplicate ranking record");
            return Err(StoreError::Duplicate {
                name: record.name,
                growth: record.derived_growth,
            });
        }

        self.records.insert(0, record.clone());
        if let Err(e) = self.flush() {
            self.records.remove(0);
            warn!(error = %e, "insert rolled back");
            return Err(e);
        }

        Ok(record)
    }

    /// Remove by name; a growth value picks one when the name is shared
    pub fn remove(&mut self, name: &str, growth: Option<f64>) -> StoreResult<RankedRecord> {
        // Names are stored trimmed
        let name = name.trim();
        let by_name: Vec<usize> = (0..self.records.len())
            .filter(|&i| self.records[i].name == name)
            .collect();

        if by_name.is_empty() {
            warn!(name = %name, "remove: no such record");
            return Err(StoreError::NotFound { name: name.to_string() });
        }

        let candidates: Vec<usize> = match growth {
            None => by_name,
            Some(g) => {
                let g = round_to(g, self.options.decimals);
                by_name
                    .into_iter()
                    .filter(|&i| self.records[i].derived_growth == g)
                    .collect()
            }
        };

        let index = match candidates.as_slice() {
            [] => {
                warn!(name = %name, ?growth, "remove: growth matches no record of that name");
                return Err(StoreError::NotFound { name: name.to_string() });
            }
            [only] => *only,
            many => {
                warn!(name = %name, matches = many.len(), "remove: ambiguous name");
                return Err(StoreError::Ambiguous {
                    name: name.to_string(),
                    candidates: many.iter().map(|&i| self.records[i].derived_growth).collect(),
                });
            }
        };

        let removed = self.records.remove(index);
        if let Err(e) = self.flush() {
            self.records.insert(index, removed);
            warn!(error = %e, "remove rolled back");
            return Err(e);
        }

        Ok(removed)
    }
}

fn digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryBlobStore, StorageResult};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_draft(name: &str, start_value: f64, end_value: f64) -> RecordDraft {
        RecordDraft::complete(name, date(2000, 1, 1), date(2004, 1, 1), start_value, end_value)
            .with_auxiliary("Unemployment", 5.0)
            .with_auxiliary("Population", 10.0)
            .with_auxiliary("Inequality", 0.4)
    }

    fn create_test_store() -> RankingStore<MemoryBlobStore> {
        RankingStore::open(MemoryBlobStore::new(), StoreOptions::default()).unwrap()
    }

    /// Reads succeed, writes fail once armed
    struct FailingStore {
        inner: MemoryBlobStore,
        fail_writes: bool,
    }

    impl BlobStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }

        fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.read(key)
        }

        fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()> {
            if self.fail_writes {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write(key, body)
        }
    }

    #[test]
    fn test_missing_key_opens_empty() {
        let store = create_test_store();
        assert!(store.is_empty());
        assert_eq!(store.revision(), store.durable_revision().unwrap());
    }

    #[test]
    fn test_insert_derives_growth_and_prepends() {
        let mut store = create_test_store();

        store.insert(&create_test_draft("First", 100.0, 110.0), &GrowthFormula::Ratio).unwrap();
        let second = store.insert(&create_test_draft("Second", 100.0, 150.0), &GrowthFormula::Ratio).unwrap();

        assert_eq!(second.derived_growth, 0.5);
        assert_eq!(store.records()[0].name, "Second");
        assert_eq!(store.records()[1].name, "First");
        assert_eq!(store.records()[1].derived_growth, 0.1);
    }

    #[test]
    fn test_insert_rejects_inverted_dates() {
        let mut store = create_test_store();
        let mut draft = create_test_draft("Backwards", 1.0, 2.0);
        draft.start_date = Some(date(2010, 1, 1));

        let err = store.insert(&draft, &GrowthFormula::Ratio).unwrap_err();

        assert!(matches!(err, StoreError::Validation(ref e) if e.is_date_order()));
        assert!(store.is_empty());
        assert_eq!(store.backend().read(DEFAULT_STORE_KEY).unwrap(), None);
    }

    #[test]
    fn test_ratio_over_zero_is_validation_error() {
        let mut store = create_test_store();

        let err = store.insert(&create_test_draft("Zero", 0.0, 5.0), &GrowthFormula::Ratio).unwrap_err();

        match err {
            StoreError::Validation(errors) => assert!(errors.has(Problem::Undefined)),
            other => panic!("expected Validation, got {:?}", other),
        }

        // The same values are fine under a difference formula
        let record = store.insert(&create_test_draft("Zero", 0.0, 5.0), &GrowthFormula::Difference).unwrap();
        assert_eq!(record.derived_growth, 5.0);
    }

    #[test]
    fn test_duplicate_insert_leaves_size_unchanged() {
        let mut store = create_test_store();
        store.insert(&create_test_draft("Smith", 100.0, 120.0), &GrowthFormula::Ratio).unwrap();
        let revision = store.revision().to_string();

        let err = store.insert(&create_test_draft("Smith", 50.0, 60.0), &GrowthFormula::Ratio).unwrap_err();

        assert!(matches!(err, StoreError::Duplicate { ref name, growth } if name == "Smith" && growth == 0.2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_duplicate_detected_after_rounding() {
        let mut store = create_test_store();
        store.insert(&create_test_draft("Round", 3.0, 4.0), &GrowthFormula::Ratio).unwrap();

        // 1/3 and 1.00003/3 agree to four decimals
        let err = store
            .insert(&create_test_draft("Round", 3.0, 4.00003), &GrowthFormula::Ratio)
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_remove_ambiguous_then_disambiguated() {
        let mut store = create_test_store();
        store.insert(&create_test_draft("Smith", 100.0, 110.0), &GrowthFormula::Ratio).unwrap();
        store.insert(&create_test_draft("Smith", 100.0, 125.0), &GrowthFormula::Ratio).unwrap();
        store.insert(&create_test_draft("Jones", 100.0, 90.0), &GrowthFormula::Ratio).unwrap();

        let err = store.remove("Smith", None).unwrap_err();
        match err {
            StoreError::Ambiguous { candidates, .. } => assert_eq!(candidates, vec![0.25, 0.1]),
            other => panic!("expected Ambiguous, got {:?}", other),
        }
        assert_eq!(store.len(), 3);

        let removed = store.remove("Smith", Some(0.1)).unwrap();
        assert_eq!(removed.derived_growth, 0.1);
        assert_eq!(store.len(), 2);

        // Now unique: no disambiguator needed
        store.remove("Smith", None).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_not_found() {
        let mut store = create_test_store();
        store.insert(&create_test_draft("Smith", 100.0, 110.0), &GrowthFormula::Ratio).unwrap();

        assert!(matches!(store.remove("Nobody", None), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.remove("Smith", Some(0.9)), Err(StoreError::NotFound { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_trims_name() {
        let mut store = create_test_store();
        store.insert(&create_test_draft(" Smith ", 100.0, 110.0), &GrowthFormula::Ratio).unwrap();
        assert_eq!(store.records()[0].name, "Smith");

        let removed = store.remove(" Smith ", None).unwrap();
        assert_eq!(removed.name, "Smith");
        assert!(store.is_empty());
    }

    #[test]
    fn test_fresh_load_equals_cache() {
        let backend = MemoryBlobStore::new();
        let mut store = RankingStore::open(backend.clone(), StoreOptions::default()).unwrap();
        store.insert(&create_test_draft("Precise", 3.0, 7.0), &GrowthFormula::Ratio).unwrap();

        let fresh = RankingStore::open(backend, StoreOptions::default()).unwrap();

        assert_eq!(fresh.records(), store.records());
        assert_eq!(fresh.records()[0].derived_growth, 1.3333);
        assert_eq!(fresh.revision(), store.revision());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut store = RankingStore::open(
            FailingStore { inner: MemoryBlobStore::new(), fail_writes: false },
            StoreOptions::default(),
        )
        .unwrap();
        store.insert(&create_test_draft("Kept", 1.0, 2.0), &GrowthFormula::Ratio).unwrap();
        store.backend.fail_writes = true;

        let err = store.insert(&create_test_draft("Lost", 1.0, 3.0), &GrowthFormula::Ratio).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        assert_eq!(store.len(), 1);

        let err = store.remove("Kept", None).unwrap_err();
        assert!(!err.is_user_error());
        assert_eq!(store.records()[0].name, "Kept");
        assert_eq!(store.revision(), store.durable_revision().unwrap());
    }

    #[test]
    fn test_ranked_by_growth_descending() {
        let mut store = create_test_store();
        store.insert(&create_test_draft("Low", 100.0, 90.0), &GrowthFormula::Ratio).unwrap();
        store.insert(&create_test_draft("High", 100.0, 200.0), &GrowthFormula::Ratio).unwrap();
        store.insert(&create_test_draft("Mid", 100.0, 120.0), &GrowthFormula::Ratio).unwrap();

        let names: Vec<&str> = store.ranked().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
    }

    #[test]
    fn test_display_record_drops_raw_values() {
        let mut store = create_test_store();
        let record = store.insert(&create_test_draft("Shown", 3.0, 4.0), &GrowthFormula::Ratio).unwrap();

        let shown = record.display_record();
        assert_eq!(shown.growth, 0.33);
        assert_eq!(shown.auxiliary[2].value, Some(0.4));
    }
}
