//! Batch execution engine
//!
//! Drives the per-product state machine across a bounded fan-out:
//! `Pending → CatalogFetching → {AsinMatched → ParallelFetching → Resolved,
//! AsinUnmatched → Skipped}`. Dependent fetches run concurrently under a
//! per-product deadline; branches still in flight at the deadline are
//! cancelled and recorded as timeouts. Individual product failures degrade
//! the output; only a checkpoint store fault fails the batch.

use super::batch::{Batch, BatchOutcome, BatchStatus, BatchSummary, ProductRow};
use super::config::PipelineConfig;
use super::progress::ProgressReporter;
use super::SchedulerError;
use crate::checkpoint::CheckpointStore;
use crate::fetch::{FetchErrorKind, FetchRequest, FetcherSet, Source, SourceResult};
use crate::identifier::ProductIdentifier;
use crate::merge::MergedRecord;
use crate::metrics;
use crate::profit::{
    self, FeeModel, ProfitOptions, ProfitVerdict, ReferralFeeModel, UnmatchedReason,
};
use crate::shutdown::SharedCancel;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Orchestrates one batch run: fan-out, dependency sequencing, merging,
/// profit calculation, and checkpointing.
pub struct BatchScheduler {
    fetchers: FetcherSet,
    store: Arc<dyn CheckpointStore>,
    config: PipelineConfig,
    fee_model: Arc<dyn FeeModel>,
    profit_options: ProfitOptions,
    cancel: Option<SharedCancel>,
}

impl BatchScheduler {
    /// Create a scheduler with the default referral fee model.
    pub fn new(
        fetchers: FetcherSet,
        store: Arc<dyn CheckpointStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetchers,
            store,
            config,
            fee_model: Arc::new(ReferralFeeModel::default()),
            profit_options: ProfitOptions::default(),
            cancel: None,
        }
    }

    /// Replace the fee model used for profit calculation.
    pub fn with_fee_model(mut self, fee_model: Arc<dyn FeeModel>) -> Self {
        self.fee_model = fee_model;
        self
    }

    /// Override profit calculation options.
    pub fn with_profit_options(mut self, options: ProfitOptions) -> Self {
        self.profit_options = options;
        self
    }

    /// Attach a cancellation handle. When cancellation is requested the
    /// scheduler drops in-flight product tasks; already-resolved products
    /// remain checkpointed.
    pub fn with_cancel(mut self, cancel: SharedCancel) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run one batch to completion.
    ///
    /// Every deduplicated input product appears in the outcome rows (ordered
    /// by JAN code), except products still pending when the batch is
    /// cancelled. Returns an error only when the checkpoint store fails.
    pub async fn run_batch(
        &self,
        batch_id: &str,
        products: Vec<ProductIdentifier>,
    ) -> Result<BatchOutcome, SchedulerError> {
        let batch = Batch::ingest(batch_id, products);
        info!(
            batch_id = %batch.batch_id,
            products = batch.len(),
            duplicates_dropped = batch.duplicates_dropped,
            fan_out = self.config.effective_fan_out(),
            "Starting batch run"
        );

        let batch_metrics = metrics::BatchMetrics::start(&batch.batch_id);
        let progress = self.store.load_progress(&batch.batch_id).await?;

        // Resolved products from a previous run are re-emitted from their
        // persisted records; everything else gets fetched.
        let mut rows: Vec<ProductRow> = Vec::with_capacity(batch.len());
        let mut pending: Vec<ProductIdentifier> = Vec::new();
        for product in &batch.products {
            match progress.get(&product.jan_code) {
                Some(record) if record.is_terminal() => {
                    rows.push(self.row_from_record(record.clone(), true));
                }
                _ => pending.push(product.clone()),
            }
        }
        if !rows.is_empty() {
            info!(
                batch_id = %batch.batch_id,
                resumed = rows.len(),
                remaining = pending.len(),
                "Skipping already-resolved products from checkpoint"
            );
        }

        let mut reporter = ProgressReporter::new(batch.len());
        for _ in &rows {
            reporter.record_resolved();
        }
        metrics::set_products_pending(pending.len());

        let mut in_flight = stream::iter(
            pending
                .into_iter()
                .map(|product| self.process_product(&batch.batch_id, product)),
        )
        .buffer_unordered(self.config.effective_fan_out());

        let cancel_requested = async {
            match &self.cancel {
                Some(cancel) => cancel.wait_for_cancel().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(cancel_requested);

        let mut status = BatchStatus::Completed;
        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_requested => {
                    warn!(
                        batch_id = %batch.batch_id,
                        resolved = reporter.resolved(),
                        pending = reporter.pending(),
                        "Batch cancelled; dropping in-flight products"
                    );
                    status = BatchStatus::Cancelled;
                    break;
                }
                next = in_flight.next() => match next {
                    Some(result) => {
                        let row = match result {
                            Ok(row) => row,
                            Err(e) => {
                                error!(batch_id = %batch.batch_id, error = %e, "Batch failed");
                                batch_metrics.record_finished("failed");
                                return Err(e);
                            }
                        };
                        reporter.record_resolved();
                        metrics::set_products_pending(reporter.pending());
                        metrics::record_product_resolved(matches!(
                            row.verdict,
                            ProfitVerdict::Analyzed(_)
                        ));
                        if reporter.should_emit_update() {
                            info!("{}", reporter.format_progress());
                            reporter.mark_emitted();
                        }
                        rows.push(row);
                    }
                    None => break,
                }
            }
        }
        drop(in_flight);

        rows.sort_by(|a, b| {
            a.record
                .identifier
                .jan_code
                .cmp(&b.record.identifier.jan_code)
        });

        let mut summary = BatchSummary {
            total_products: batch.len(),
            duplicates_dropped: batch.duplicates_dropped,
            ..BatchSummary::default()
        };
        for row in &rows {
            summary.absorb(row);
        }

        let status_label = match status {
            BatchStatus::Cancelled => "cancelled",
            _ => "completed",
        };
        batch_metrics.record_finished(status_label);
        info!(
            batch_id = %batch.batch_id,
            status = status_label,
            rows = rows.len(),
            matched = summary.matched,
            unmatched = summary.unmatched,
            partial = summary.partial,
            "Batch run finished"
        );

        Ok(BatchOutcome {
            batch_id: batch.batch_id,
            status,
            rows,
            summary,
        })
    }

    /// Drive one product through the state machine to a terminal record.
    async fn process_product(
        &self,
        batch_id: &str,
        product: ProductIdentifier,
    ) -> Result<ProductRow, SchedulerError> {
        let span = info_span!("product", batch_id, jan = %product.jan_code);
        async {
            let mut record = MergedRecord::new(product.clone());

            debug!("Starting catalog fetch");
            let catalog_result = self
                .fetchers
                .catalog
                .fetch(&FetchRequest::for_catalog(&product))
                .await;
            apply_result(&mut record, Source::Catalog, catalog_result);

            match record.matched_asin.as_ref().map(|m| m.asin.clone()) {
                Some(asin) => {
                    debug!(asin = %asin, "Catalog matched; fetching dependent sources");
                    let deadline = Instant::now() + self.config.per_product_timeout;
                    let request = FetchRequest::with_asin(&product, &asin);
                    let (history, competitor) = tokio::join!(
                        timeout_at(deadline, self.fetchers.price_history.fetch(&request)),
                        timeout_at(deadline, self.fetchers.competitor.fetch(&request)),
                    );
                    apply_result(
                        &mut record,
                        Source::PriceHistory,
                        flatten_deadline(Source::PriceHistory, history),
                    );
                    apply_result(
                        &mut record,
                        Source::CompetitorPrice,
                        flatten_deadline(Source::CompetitorPrice, competitor),
                    );
                }
                None => {
                    debug!("No catalog match; skipping dependent sources");
                    mark_skipped(&mut record, Source::PriceHistory);
                    mark_skipped(&mut record, Source::CompetitorPrice);
                }
            }

            self.store.save_progress(batch_id, &record).await?;
            Ok(self.row_from_record(record, false))
        }
        .instrument(span)
        .await
    }

    fn row_from_record(&self, record: MergedRecord, resumed: bool) -> ProductRow {
        let verdict =
            match profit::compute(&record, self.fee_model.as_ref(), &self.profit_options) {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!(
                        jan = %record.identifier.jan_code,
                        error = %e,
                        "Profit calculation rejected catalog data; reporting product as unmatched"
                    );
                    ProfitVerdict::Unmatched {
                        reason: UnmatchedReason::InvalidCatalogData,
                    }
                }
            };
        ProductRow {
            record,
            verdict,
            resumed,
        }
    }
}

/// Record one source's result; a rejected merge indicates a scheduler bug
/// and is logged rather than propagated.
fn apply_result(record: &mut MergedRecord, source: Source, result: SourceResult) {
    if let Err(e) = record.apply(source, result) {
        error!(source = %source, error = %e, "Merge rejected source result");
    }
}

fn mark_skipped(record: &mut MergedRecord, source: Source) {
    if let Err(e) = record.mark_skipped(source) {
        error!(source = %source, error = %e, "Merge rejected skip marker");
    }
}

/// Fold a deadline elapse into the source result taxonomy.
fn flatten_deadline(
    source: Source,
    result: Result<SourceResult, tokio::time::error::Elapsed>,
) -> SourceResult {
    match result {
        Ok(result) => result,
        Err(_) => {
            warn!(source = %source, "Per-product deadline elapsed; branch cancelled");
            SourceResult::Error(FetchErrorKind::Timeout)
        }
    }
}
