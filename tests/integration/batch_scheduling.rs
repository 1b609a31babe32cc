//! Integration tests for batch fan-out scheduling and partial-failure tolerance

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wholesale_profit_analyzer::checkpoint::{
    BatchProgress, CheckpointError, CheckpointStore, JsonCheckpointStore,
};
use wholesale_profit_analyzer::fetch::{
    FetchErrorKind, FetchRequest, FetcherSet, Source, SourceFetcher, SourcePayload, SourceResult,
};
use wholesale_profit_analyzer::identifier::ProductIdentifier;
use wholesale_profit_analyzer::merge::{MergedRecord, ResolutionState, SourceOutcome};
use wholesale_profit_analyzer::profit::{Confidence, ProfitVerdict};
use wholesale_profit_analyzer::scheduler::{
    BatchScheduler, BatchStatus, PipelineConfig, SchedulerError,
};
use wholesale_profit_analyzer::{CompetitorQuote, MatchedAsin, PriceHistoryRecord, PricePoint};

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
        sales_rank: Some(1200),
    }))
}

fn history_payload() -> SourceResult {
    SourceResult::Success(SourcePayload::PriceHistory(PriceHistoryRecord {
        asin: "B01EXAMPLE1".to_string(),
        price_series: vec![PricePoint {
            timestamp: 1_700_000_000,
            price: Decimal::from(2900),
        }],
        estimated_monthly_sales: 50,
    }))
}

fn competitor_payload() -> SourceResult {
    SourceResult::Success(SourcePayload::Competitor(vec![CompetitorQuote {
        competitor_source: "yahoo_shopping".to_string(),
        competitor_price: Decimal::from(2800),
        listing_url: "https://shopping.example/listing/1".to_string(),
    }]))
}

fn scheduler_with(fetchers: FetcherSet, dir: &TempDir) -> BatchScheduler {
    BatchScheduler::new(
        fetchers,
        Arc::new(JsonCheckpointStore::new(dir.path())),
        PipelineConfig::default(),
    )
}

#[tokio::test]
async fn test_every_deduplicated_product_yields_exactly_one_row() {
    let fetchers = FetcherSet::from_parts(
        StubFetcher::new(Source::Catalog, SourceResult::NotFound),
        StubFetcher::new(Source::PriceHistory, SourceResult::NotFound),
        StubFetcher::new(Source::CompetitorPrice, SourceResult::NotFound),
    );
    let dir = TempDir::new().unwrap();
    let scheduler = scheduler_with(fetchers, &dir);

    let products = vec![
        product("4901234567894"),
        product("49123456"),
        product("4901234567894"),
    ];
    let outcome = scheduler.run_batch("batch-dedup", products).await.unwrap();

    assert_eq!(outcome.status, BatchStatus::Completed);
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.summary.total_products, 2);
    assert_eq!(outcome.summary.duplicates_dropped, 1);
    assert_eq!(outcome.summary.unmatched, 2);

    // Rows come out ordered by JAN code regardless of completion order.
    let jans: Vec<String> = outcome
        .rows
        .iter()
        .map(|row| row.record.identifier.jan_code.to_string())
        .collect();
    assert_eq!(jans, vec!["4901234567894", "49123456"]);
}

#[tokio::test]
async fn test_full_success_yields_high_confidence_analysis() {
    let catalog = StubFetcher::new(Source::Catalog, catalog_payload());
    let history = StubFetcher::new(Source::PriceHistory, history_payload());
    let competitor = StubFetcher::new(Source::CompetitorPrice, competitor_payload());
    let fetchers = FetcherSet::from_parts(catalog.clone(), history.clone(), competitor.clone());

    let dir = TempDir::new().unwrap();
    let scheduler = scheduler_with(fetchers, &dir);
    let outcome = scheduler
        .run_batch("batch-success", vec![product("4901234567894")])
        .await
        .unwrap();

    assert_eq!(catalog.calls(), 1);
    assert_eq!(history.calls(), 1);
    assert_eq!(competitor.calls(), 1);

    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.partial, 0);

    let row = &outcome.rows[0];
    assert_eq!(row.record.resolution(), Some(ResolutionState::Complete));
    match &row.verdict {
        ProfitVerdict::Analyzed(report) => {
            assert_eq!(report.asin, "B01EXAMPLE1");
            // Priced by the cheapest competitor quote, not the listing price.
            assert_eq!(report.sell_price, Decimal::from(2800));
            assert_eq!(report.expected_monthly_sales, 50);
            assert_eq!(report.confidence, Confidence::High);
        }
        ProfitVerdict::Unmatched { .. } => panic!("expected an analyzed verdict"),
    }
}

#[tokio::test]
async fn test_failed_dependent_source_degrades_instead_of_failing() {
    let fetchers = FetcherSet::from_parts(
        StubFetcher::new(Source::Catalog, catalog_payload()),
        StubFetcher::new(
            Source::PriceHistory,
            SourceResult::Error(FetchErrorKind::RetriesExhausted),
        ),
        StubFetcher::new(Source::CompetitorPrice, competitor_payload()),
    );

    let dir = TempDir::new().unwrap();
    let scheduler = scheduler_with(fetchers, &dir);
    let outcome = scheduler
        .run_batch("batch-partial", vec![product("4901234567894")])
        .await
        .unwrap();

    assert_eq!(outcome.status, BatchStatus::Completed);
    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.partial, 1);

    let row = &outcome.rows[0];
    assert_eq!(row.record.resolution(), Some(ResolutionState::Partial));
    assert_eq!(
        row.record.outcome(Source::PriceHistory),
        Some(SourceOutcome::Failed(FetchErrorKind::RetriesExhausted))
    );
    match &row.verdict {
        ProfitVerdict::Analyzed(report) => {
            // Missing sales data floors expected sales at one unit.
            assert_eq!(report.expected_monthly_sales, 1);
            assert_eq!(report.confidence, Confidence::Low);
        }
        ProfitVerdict::Unmatched { .. } => panic!("expected an analyzed verdict"),
    }
}

struct FailingStore;

#[async_trait]
impl CheckpointStore for FailingStore {
    async fn load_progress(&self, batch_id: &str) -> Result<BatchProgress, CheckpointError> {
        Ok(BatchProgress::new(batch_id))
    }

    async fn save_progress(
        &self,
        _batch_id: &str,
        _record: &MergedRecord,
    ) -> Result<(), CheckpointError> {
        Err(CheckpointError::Io("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_checkpoint_store_failure_fails_the_batch() {
    let fetchers = FetcherSet::from_parts(
        StubFetcher::new(Source::Catalog, SourceResult::NotFound),
        StubFetcher::new(Source::PriceHistory, SourceResult::NotFound),
        StubFetcher::new(Source::CompetitorPrice, SourceResult::NotFound),
    );
    let scheduler = BatchScheduler::new(fetchers, Arc::new(FailingStore), PipelineConfig::default());

    let err = scheduler
        .run_batch("batch-store-down", vec![product("4901234567894")])
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::Checkpoint(_)));
}
