//! CSV report writer implementation
//!
//! Flat tabular export: one row per product, covering identity, verdict,
//! profit figures, and per-source outcomes so downstream spreadsheets can
//! filter on any of them. Reports for unmatched products carry empty profit
//! columns rather than being omitted.

use crate::fetch::{FetchErrorKind, Source};
use crate::merge::{ResolutionState, SourceOutcome};
use crate::profit::{Confidence, ProfitVerdict};
use crate::scheduler::ProductRow;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter, ReportWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer
const FLUSH_EVERY_ROWS: u64 = 100;

/// CSV record for one product
#[derive(Debug, Serialize)]
struct ReportRecord {
    jan_code: String,
    wholesale_price: String,
    source_listing_url: String,
    verdict: &'static str,
    unmatched_reason: &'static str,
    asin: String,
    sell_price: String,
    expected_monthly_sales: String,
    expected_revenue: String,
    expected_fee: String,
    expected_profit: String,
    expected_margin: String,
    confidence: String,
    resolution: &'static str,
    catalog_outcome: String,
    price_history_outcome: String,
    competitor_price_outcome: String,
    lowest_competitor_source: String,
    lowest_competitor_price: String,
    resumed: bool,
}

fn outcome_label(outcome: Option<SourceOutcome>) -> String {
    match outcome {
        Some(SourceOutcome::Success) => "success".to_string(),
        Some(SourceOutcome::NoData) => "no_data".to_string(),
        Some(SourceOutcome::Skipped) => "skipped".to_string(),
        Some(SourceOutcome::Failed(kind)) => match kind {
            FetchErrorKind::RateLimitTimeout => "rate_limit_timeout".to_string(),
            FetchErrorKind::RetriesExhausted => "retries_exhausted".to_string(),
            FetchErrorKind::PermanentFetchError => "permanent_fetch_error".to_string(),
            FetchErrorKind::Timeout => "timeout".to_string(),
        },
        None => "unresolved".to_string(),
    }
}

impl From<&ProductRow> for ReportRecord {
    fn from(row: &ProductRow) -> Self {
        let identifier = &row.record.identifier;
        let lowest = row.record.lowest_competitor_quote();

        let (verdict, reason, asin, sell_price, sales, revenue, fee, profit, margin, confidence) =
            match &row.verdict {
                ProfitVerdict::Analyzed(report) => (
                    "analyzed",
                    "",
                    report.asin.clone(),
                    report.sell_price.to_string(),
                    report.expected_monthly_sales.to_string(),
                    report.expected_revenue.to_string(),
                    report.expected_fee.to_string(),
                    report.expected_profit.to_string(),
                    report.expected_margin.to_string(),
                    match report.confidence {
                        Confidence::High => "high".to_string(),
                        Confidence::Low => "low".to_string(),
                    },
                ),
                ProfitVerdict::Unmatched { reason } => (
                    "unmatched",
                    reason.label(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ),
            };

        Self {
            jan_code: identifier.jan_code.to_string(),
            wholesale_price: identifier.wholesale_price.to_string(),
            source_listing_url: identifier.source_listing_url.clone(),
            verdict,
            unmatched_reason: reason,
            asin,
            sell_price,
            expected_monthly_sales: sales,
            expected_revenue: revenue,
            expected_fee: fee,
            expected_profit: profit,
            expected_margin: margin,
            confidence,
            resolution: match row.record.resolution() {
                Some(ResolutionState::Complete) => "complete",
                Some(ResolutionState::Partial) => "partial",
                None => "unresolved",
            },
            catalog_outcome: outcome_label(row.record.outcome(Source::Catalog)),
            price_history_outcome: outcome_label(row.record.outcome(Source::PriceHistory)),
            competitor_price_outcome: outcome_label(
                row.record.outcome(Source::CompetitorPrice),
            ),
            lowest_competitor_source: lowest
                .map(|q| q.competitor_source.clone())
                .unwrap_or_default(),
            lowest_competitor_price: lowest
                .map(|q| q.competitor_price.to_string())
                .unwrap_or_default(),
            resumed: row.resumed,
        }
    }
}

/// CSV writer for batch profit reports
pub struct CsvReportWriter {
    writer: Writer<BufWriter<File>>,
    rows_written: u64,
}

impl CsvReportWriter {
    /// Create a new CSV report writer with the default buffer size.
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new CSV report writer with a custom buffer size.
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV report writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        let buf_writer = BufWriter::with_capacity(buffer_size, file);
        let csv_writer = Writer::from_writer(buf_writer);

        Ok(Self {
            writer: csv_writer,
            rows_written: 0,
        })
    }

    /// Number of rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl ReportWriter for CsvReportWriter {
    fn write_row(&mut self, row: &ProductRow) -> OutputResult<()> {
        let record = ReportRecord::from(row);

        self.writer
            .serialize(&record)
            .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;

        self.rows_written += 1;

        if self.rows_written % FLUSH_EVERY_ROWS == 0 {
            self.flush()?;
            debug!("Progress: {} rows written", self.rows_written);
        }

        Ok(())
    }
}

impl OutputWriter for CsvReportWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        debug!(
            "Closing CSV report writer: {} total rows written",
            self.rows_written
        );

        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;

        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        info!(
            "CSV report writer closed successfully: {} rows written",
            self.rows_written
        );
        Ok(())
    }
}
