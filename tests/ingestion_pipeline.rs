use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nested_csv_loader::db::{MemoryUserStore, UserStore};
use nested_csv_loader::ingestion::{Age, IngestionCoordinator, IngestionPhase, ProjectedTuple};
use nested_csv_loader::report::AgeReport;
use nested_csv_loader::{LoaderError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HEADER: &str = "name.firstName,name.lastName,age,address.city,address.zip,team";

fn csv_with_rows(count: usize) -> String {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for i in 0..count {
        csv.push_str(&format!("First{i},Last{i},{},City{i},{:05},blue\n", i % 90, i));
    }
    csv
}

/// Inserts slowly, earliest batches slowest, and records how many rows were stored when
/// the report was requested.
struct SlowStore {
    inner: MemoryUserStore,
    calls: AtomicUsize,
    rows_at_report: AtomicUsize,
}

impl SlowStore {
    fn new() -> Self {
        Self {
            inner: MemoryUserStore::new(),
            calls: AtomicUsize::new(0),
            rows_at_report: AtomicUsize::new(usize::MAX),
        }
    }
}

#[async_trait]
impl UserStore for SlowStore {
    async fn insert_batch(&self, rows: &[ProjectedTuple]) -> Result<u64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = 60u64.saturating_sub(call as u64 * 20);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.inner.insert_batch(rows).await
    }

    async fn age_distribution(&self) -> Result<AgeReport> {
        let stored = self.inner.len().await;
        self.rows_at_report.store(stored, Ordering::SeqCst);
        self.inner.age_distribution().await
    }

    async fn clear(&self) -> Result<u64> {
        self.inner.clear().await
    }

    async fn now(&self) -> Result<DateTime<Utc>> {
        self.inner.now().await
    }
}

/// Fails any insert of exactly `reject_len` rows.
struct FlakyStore {
    inner: MemoryUserStore,
    reject_len: usize,
    reported: AtomicBool,
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn insert_batch(&self, rows: &[ProjectedTuple]) -> Result<u64> {
        if rows.len() == self.reject_len {
            return Err(LoaderError::Database("connection reset".to_string()));
        }
        self.inner.insert_batch(rows).await
    }

    async fn age_distribution(&self) -> Result<AgeReport> {
        self.reported.store(true, Ordering::SeqCst);
        self.inner.age_distribution().await
    }

    async fn clear(&self) -> Result<u64> {
        self.inner.clear().await
    }

    async fn now(&self) -> Result<DateTime<Utc>> {
        self.inner.now().await
    }
}

#[tokio::test]
async fn test_2500_rows_in_three_batches_before_report() {
    let store = Arc::new(SlowStore::new());
    let mut coordinator = IngestionCoordinator::new(store.clone(), 1000);

    let csv = csv_with_rows(2500);
    let summary = coordinator.run(csv.as_bytes()).await.unwrap();

    assert_eq!(summary.rows_processed, 2500);
    assert_eq!(summary.batches_submitted, 3);
    assert_eq!(summary.rows_inserted, 2500);

    let mut sizes = store.inner.batch_sizes().await;
    sizes.sort_unstable();
    assert_eq!(sizes, vec![500, 1000, 1000]);

    // The report only ran once every batch had landed.
    assert_eq!(store.rows_at_report.load(Ordering::SeqCst), 2500);
    let report = summary.report.unwrap();
    let total: f64 = report.rows.iter().map(|r| r.percentage).sum();
    assert!((total - 100.0).abs() < 0.05);
}

#[tokio::test]
async fn test_mismatched_rows_do_not_shift_grouping() {
    let csv = "\
name.firstName,name.lastName,age
A,One,10
broken,row
B,Two,20
C,Three,30,extra
D,Four,40
E,Five,50
";
    let store = Arc::new(MemoryUserStore::new());
    let mut coordinator = IngestionCoordinator::new(store.clone(), 2);

    let summary = coordinator.run(csv.as_bytes()).await.unwrap();

    assert_eq!(summary.rows_processed, 6);
    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(summary.tuples_submitted, 4);
    assert_eq!(summary.batches_submitted, 2);
    assert_eq!(store.batch_sizes().await, vec![2, 2]);

    let mut names: Vec<String> = store.rows().await.into_iter().map(|r| r.full_name).collect();
    names.sort();
    assert_eq!(names, vec!["A One", "B Two", "D Four", "E Five"]);
}

#[tokio::test]
async fn test_every_tuple_inserted_exactly_once() {
    let store = Arc::new(MemoryUserStore::new());
    let mut coordinator = IngestionCoordinator::new(store.clone(), 7);

    let csv = csv_with_rows(100);
    let summary = coordinator.run(csv.as_bytes()).await.unwrap();
    assert_eq!(summary.tuples_submitted, 100);

    let rows = store.rows().await;
    assert_eq!(rows.len(), 100);

    let mut names: Vec<String> = rows.iter().map(|r| r.full_name.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 100);

    let sample = rows.iter().find(|r| r.full_name == "First3 Last3").unwrap();
    assert_eq!(sample.age, Age::Value(3));
    assert_eq!(sample.address.as_deref(), Some(r#"{"city":"City3","zip":"00003"}"#));
    assert_eq!(sample.additional_info.as_deref(), Some(r#"{"team":"blue"}"#));
}

#[tokio::test]
async fn test_failed_batch_surfaces_join_error_and_skips_report() {
    let store = Arc::new(FlakyStore {
        inner: MemoryUserStore::new(),
        reject_len: 5,
        reported: AtomicBool::new(false),
    });
    let mut coordinator = IngestionCoordinator::new(store.clone(), 10);

    let csv = csv_with_rows(35);
    let result = coordinator.run(csv.as_bytes()).await;

    match result {
        Err(LoaderError::BatchJoin { failed, total, .. }) => {
            assert_eq!(failed, 1);
            assert_eq!(total, 4);
        }
        other => panic!("expected join failure, got {:?}", other.map(|s| s.batches_submitted)),
    }
    assert_eq!(coordinator.phase(), IngestionPhase::Done);
    assert!(!store.reported.load(Ordering::SeqCst));
    // The other batches still landed.
    assert_eq!(store.inner.len().await, 30);
}

#[tokio::test]
async fn test_run_file_with_crlf_lines() {
    let path = std::env::temp_dir().join(format!("{}-people.csv", uuid::Uuid::new_v4()));
    tokio::fs::write(
        &path,
        "name.firstName,name.lastName,age,address.city\r\nAnn,Lee,34,Boston\r\nBo,Lin,abc,\r\n",
    )
    .await
    .unwrap();

    let store = Arc::new(MemoryUserStore::new());
    let mut coordinator = IngestionCoordinator::new(store.clone(), 1000);
    let summary = coordinator
        .run_file(&path, None, Duration::from_millis(5))
        .await
        .unwrap();

    assert_eq!(summary.rows_processed, 2);
    let rows = store.rows().await;
    assert_eq!(
        rows[0],
        ProjectedTuple {
            full_name: "Ann Lee".to_string(),
            age: Age::Value(34),
            address: Some(r#"{"city":"Boston"}"#.to_string()),
            additional_info: None,
        }
    );
    assert_eq!(rows[1].age, Age::NotANumber);
    assert_eq!(rows[1].address.as_deref(), Some(r#"{"city":""}"#));

    tokio::fs::remove_file(&path).await.unwrap();
}
