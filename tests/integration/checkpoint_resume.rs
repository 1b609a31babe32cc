//! Integration tests for durable checkpointing and batch resumption

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wholesale_profit_analyzer::checkpoint::{CheckpointStore, JsonCheckpointStore};
use wholesale_profit_analyzer::fetch::{
    FetchRequest, FetcherSet, Source, SourceFetcher, SourcePayload, SourceResult,
};
use wholesale_profit_analyzer::identifier::ProductIdentifier;
use wholesale_profit_analyzer::scheduler::{BatchScheduler, PipelineConfig};
use wholesale_profit_analyzer::MatchedAsin;

struct StubFetcher {
    source: Source,
    result: SourceResult,
    calls: AtomicU32,
}

impl StubFetcher {
    fn new(source: Source, result: SourceResult) -> Arc<Self> {
        Arc::new(Self {
            source,
            result,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _request: &FetchRequest) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn product(jan: &str) -> ProductIdentifier {
    ProductIdentifier::new(jan, Decimal::from(1000), "https://wholesale.example/item").unwrap()
}

fn catalog_payload() -> SourceResult {
    SourceResult::Success(SourcePayload::Catalog(MatchedAsin {
        asin: "B01EXAMPLE1".to_string(),
        title: "Sample Product".to_string(),
        current_price: Decimal::from(3000),
        sales_rank: None,
    }))
}

fn success_fetchers() -> FetcherSet {
    FetcherSet::from_parts(
        StubFetcher::new(Source::Catalog, catalog_payload()),
        StubFetcher::new(Source::PriceHistory, SourceResult::NotFound),
        StubFetcher::new(Source::CompetitorPrice, SourceResult::NotFound),
    )
}

fn scheduler_in(dir: &TempDir, fetchers: FetcherSet) -> BatchScheduler {
    BatchScheduler::new(
        fetchers,
        Arc::new(JsonCheckpointStore::new(dir.path())),
        PipelineConfig::default(),
    )
}

#[tokio::test]
async fn test_rerun_reemits_rows_without_refetching() {
    let dir = TempDir::new().unwrap();
    let products = vec![product("4901234567894"), product("49123456")];

    let first = scheduler_in(&dir, success_fetchers())
        .run_batch("batch-resume", products.clone())
        .await
        .unwrap();
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first.summary.resumed, 0);

    // Second run against the same checkpoint directory must not touch any
    // source at all.
    let catalog = StubFetcher::new(Source::Catalog, SourceResult::NotFound);
    let history = StubFetcher::new(Source::PriceHistory, SourceResult::NotFound);
    let competitor = StubFetcher::new(Source::CompetitorPrice, SourceResult::NotFound);
    let second = scheduler_in(
        &dir,
        FetcherSet::from_parts(catalog.clone(), history.clone(), competitor.clone()),
    )
    .run_batch("batch-resume", products)
    .await
    .unwrap();

    assert_eq!(catalog.calls(), 0);
    assert_eq!(history.calls(), 0);
    assert_eq!(competitor.calls(), 0);

    assert_eq!(second.rows.len(), 2);
    assert_eq!(second.summary.resumed, 2);
    assert!(second.rows.iter().all(|row| row.resumed));

    // Resume is lossless: records and verdicts match the original run.
    for (orig, resumed) in first.rows.iter().zip(second.rows.iter()) {
        assert_eq!(orig.record, resumed.record);
        assert_eq!(orig.verdict, resumed.verdict);
    }
}

#[tokio::test]
async fn test_partial_resume_fetches_only_pending_products() {
    let dir = TempDir::new().unwrap();

    scheduler_in(&dir, success_fetchers())
        .run_batch("batch-partial-resume", vec![product("4901234567894")])
        .await
        .unwrap();

    // Re-run the batch extended with one new product; only the addition is
    // fetched.
    let catalog = StubFetcher::new(Source::Catalog, catalog_payload());
    let history = StubFetcher::new(Source::PriceHistory, SourceResult::NotFound);
    let competitor = StubFetcher::new(Source::CompetitorPrice, SourceResult::NotFound);
    let outcome = scheduler_in(
        &dir,
        FetcherSet::from_parts(catalog.clone(), history.clone(), competitor.clone()),
    )
    .run_batch(
        "batch-partial-resume",
        vec![product("4901234567894"), product("49123456")],
    )
    .await
    .unwrap();

    assert_eq!(catalog.calls(), 1);
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.summary.resumed, 1);
}

#[tokio::test]
async fn test_progress_persists_every_terminal_record() {
    let dir = TempDir::new().unwrap();
    let store = JsonCheckpointStore::new(dir.path());

    let outcome = scheduler_in(&dir, success_fetchers())
        .run_batch("batch-durability", vec![product("0012345678905")])
        .await
        .unwrap();

    let progress = store.load_progress("batch-durability").await.unwrap();
    assert_eq!(progress.len(), 1);

    let stored = progress
        .get(&outcome.rows[0].record.identifier.jan_code)
        .unwrap();
    assert_eq!(stored, &outcome.rows[0].record);
    assert!(stored.is_terminal());
}

#[tokio::test]
async fn test_batches_use_isolated_progress_files() {
    let dir = TempDir::new().unwrap();

    scheduler_in(&dir, success_fetchers())
        .run_batch("batch-a", vec![product("4901234567894")])
        .await
        .unwrap();

    let store = JsonCheckpointStore::new(dir.path());
    let other = store.load_progress("batch-b").await.unwrap();
    assert!(other.is_empty());
}
