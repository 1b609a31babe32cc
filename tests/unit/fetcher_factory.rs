//! Unit tests for fetcher set construction

use async_trait::async_trait;
use std::sync::Arc;
use wholesale_profit_analyzer::fetch::{
    FetchRequest, FetcherSet, Source, SourceFetcher, SourceResult,
};
use wholesale_profit_analyzer::scheduler::PipelineConfig;

#[test]
fn test_from_config_wires_each_source() {
    let fetchers = FetcherSet::from_config(&PipelineConfig::default());

    assert_eq!(fetchers.catalog.source(), Source::Catalog);
    assert_eq!(fetchers.price_history.source(), Source::PriceHistory);
    assert_eq!(fetchers.competitor.source(), Source::CompetitorPrice);
}

struct NullFetcher(Source);

#[async_trait]
impl SourceFetcher for NullFetcher {
    fn source(&self) -> Source {
        self.0
    }

    async fn fetch(&self, _request: &FetchRequest) -> SourceResult {
        SourceResult::NotFound
    }
}

#[test]
fn test_from_parts_accepts_custom_fetchers() {
    let fetchers = FetcherSet::from_parts(
        Arc::new(NullFetcher(Source::Catalog)),
        Arc::new(NullFetcher(Source::PriceHistory)),
        Arc::new(NullFetcher(Source::CompetitorPrice)),
    );

    assert_eq!(fetchers.catalog.source(), Source::Catalog);
    assert_eq!(fetchers.competitor.source(), Source::CompetitorPrice);
}
