//! Batch structures and status tracking

use crate::identifier::ProductIdentifier;
use crate::merge::{MergedRecord, ResolutionState};
use crate::profit::ProfitVerdict;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Batch execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Batch has not started yet
    #[default]
    Pending,
    /// Batch is currently running
    Running,
    /// Every product reached a terminal state
    Completed,
    /// Checkpoint store was unreachable (infrastructure fault)
    Failed,
    /// Operator cancelled the batch; resolved products were checkpointed
    Cancelled,
}

/// A deduplicated, ordered set of products processed together.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Batch identity, used as the checkpoint key
    pub batch_id: String,
    /// Products in ingest order, unique by JAN code
    pub products: Vec<ProductIdentifier>,
    /// Duplicate identifiers dropped at ingest
    pub duplicates_dropped: usize,
}

impl Batch {
    /// Ingest a product list, dropping later duplicates by JAN code.
    ///
    /// Duplicates are a warning, not an error; the surviving entry is the
    /// first occurrence so ingest order is preserved.
    pub fn ingest(batch_id: impl Into<String>, products: Vec<ProductIdentifier>) -> Self {
        let batch_id = batch_id.into();
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(products.len());
        let mut duplicates_dropped = 0usize;

        for product in products {
            if seen.insert(product.jan_code.clone()) {
                unique.push(product);
            } else {
                duplicates_dropped += 1;
                warn!(
                    batch_id = %batch_id,
                    jan = %product.jan_code,
                    "Dropping duplicate product identifier"
                );
            }
        }

        Self {
            batch_id,
            products: unique,
            duplicates_dropped,
        }
    }

    /// Split an oversized product list into bounded sub-batches.
    ///
    /// Deduplication runs over the whole input first so a JAN repeated
    /// across chunk boundaries still yields exactly one row for the run.
    /// Sub-batch ids get a zero-padded suffix (`{id}-part-001`, ...) so each
    /// checkpoints independently. A list within the size limit keeps its id
    /// unchanged.
    pub fn split(
        batch_id: &str,
        products: Vec<ProductIdentifier>,
        max_size: usize,
    ) -> Vec<Batch> {
        let max_size = max_size.max(1);
        let deduplicated = Batch::ingest(batch_id, products);
        if deduplicated.len() <= max_size {
            return vec![deduplicated];
        }

        let duplicates_dropped = deduplicated.duplicates_dropped;
        deduplicated
            .products
            .chunks(max_size)
            .enumerate()
            .map(|(index, chunk)| Batch {
                batch_id: format!("{batch_id}-part-{:03}", index + 1),
                products: chunk.to_vec(),
                // Drops happened before chunking; attribute them to the
                // first sub-batch so run-level totals stay accurate.
                duplicates_dropped: if index == 0 { duplicates_dropped } else { 0 },
            })
            .collect()
    }

    /// Number of unique products in the batch
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the batch contains no products
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// One output row: a product's terminal merged record and its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    /// Terminal merged record (all three source attempts accounted for)
    pub record: MergedRecord,
    /// Profit verdict derived from the record
    pub verdict: ProfitVerdict,
    /// Whether the row was re-emitted from checkpoint state instead of fetched
    pub resumed: bool,
}

/// Aggregate counters for a finished batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Unique products after deduplication
    pub total_products: usize,
    /// Products with a catalog match
    pub matched: usize,
    /// Products reported unmatched
    pub unmatched: usize,
    /// Products whose record resolved with a failed or skipped source
    pub partial: usize,
    /// Rows re-emitted from checkpoint state
    pub resumed: usize,
    /// Duplicate identifiers dropped at ingest
    pub duplicates_dropped: usize,
}

impl BatchSummary {
    /// Fold one row into the counters.
    pub fn absorb(&mut self, row: &ProductRow) {
        match row.verdict {
            ProfitVerdict::Analyzed(_) => self.matched += 1,
            ProfitVerdict::Unmatched { .. } => self.unmatched += 1,
        }
        if row.record.resolution() == Some(ResolutionState::Partial) {
            self.partial += 1;
        }
        if row.resumed {
            self.resumed += 1;
        }
    }
}

/// Final result of a batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Batch identity
    pub batch_id: String,
    /// Final status
    pub status: BatchStatus,
    /// One row per product that reached a terminal state, ordered by JAN code
    pub rows: Vec<ProductRow>,
    /// Aggregate counters
    pub summary: BatchSummary,
}
