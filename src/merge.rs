//! Per-product accumulation of source results
//!
//! A [`MergedRecord`] joins the asynchronously arriving results of the three
//! source fetches for one product. Merging is commutative and idempotent per
//! source: results can arrive in any order, and a duplicate delivery for an
//! already-recorded source is rejected with [`MergeError::DuplicateResult`]
//! rather than overwriting data. The record reaches a terminal state once
//! all three attempts are accounted for — success, no-data, skipped, or
//! failure — so no source is ever silently dropped.

use crate::fetch::{FetchErrorKind, Source, SourcePayload, SourceResult};
use crate::identifier::ProductIdentifier;
use crate::{CompetitorQuote, MatchedAsin, PriceHistoryRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Merge errors (defensive; the scheduler's single-attempt-per-source
/// contract means these indicate a bug upstream)
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    /// A result arrived for a source that already has one
    #[error("duplicate result for source {0}")]
    DuplicateResult(Source),

    /// A success payload did not match the source it was recorded under
    #[error("payload mismatch for source {0}")]
    PayloadMismatch(Source),
}

/// Recorded outcome of one source attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "error")]
pub enum SourceOutcome {
    /// The source produced data (payload stored on the record)
    Success,
    /// The source responded but has no data — explicitly not an error
    NoData,
    /// The attempt was never made because the catalog match failed;
    /// recorded so unmatched products still account for all three sources
    Skipped,
    /// The attempt failed with the given kind
    Failed(FetchErrorKind),
}

/// Terminal classification of a merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Every attempted source succeeded or reported no data
    Complete,
    /// At least one source failed or was skipped
    Partial,
}

/// The per-product join of all source results.
///
/// Mutated only through [`MergedRecord::apply`] and
/// [`MergedRecord::mark_skipped`]; one instance per product per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    /// Product identity
    pub identifier: ProductIdentifier,
    /// Catalog match, if the catalog fetch succeeded
    pub matched_asin: Option<MatchedAsin>,
    /// Price history, if that fetch succeeded
    pub price_history: Option<PriceHistoryRecord>,
    /// Competitor quotes, cheapest first
    pub competitor_quotes: Vec<CompetitorQuote>,
    outcomes: BTreeMap<Source, SourceOutcome>,
}

impl MergedRecord {
    /// Create an empty record for a product.
    pub fn new(identifier: ProductIdentifier) -> Self {
        Self {
            identifier,
            matched_asin: None,
            price_history: None,
            competitor_quotes: Vec::new(),
            outcomes: BTreeMap::new(),
        }
    }

    /// Record one source's result. Rejects duplicates for an
    /// already-resolved source without modifying the record.
    pub fn apply(&mut self, source: Source, result: SourceResult) -> Result<(), MergeError> {
        if self.outcomes.contains_key(&source) {
            return Err(MergeError::DuplicateResult(source));
        }

        let outcome = match result {
            SourceResult::Success(payload) => {
                match (source, payload) {
                    (Source::Catalog, SourcePayload::Catalog(matched)) => {
                        self.matched_asin = Some(matched);
                    }
                    (Source::PriceHistory, SourcePayload::PriceHistory(record)) => {
                        self.price_history = Some(record);
                    }
                    (Source::CompetitorPrice, SourcePayload::Competitor(quotes)) => {
                        self.competitor_quotes = quotes;
                    }
                    _ => return Err(MergeError::PayloadMismatch(source)),
                }
                SourceOutcome::Success
            }
            SourceResult::NotFound => SourceOutcome::NoData,
            SourceResult::Error(kind) => SourceOutcome::Failed(kind),
        };

        self.outcomes.insert(source, outcome);
        Ok(())
    }

    /// Record that a dependent source was never attempted because the
    /// catalog fetch did not produce a match.
    pub fn mark_skipped(&mut self, source: Source) -> Result<(), MergeError> {
        if self.outcomes.contains_key(&source) {
            return Err(MergeError::DuplicateResult(source));
        }
        self.outcomes.insert(source, SourceOutcome::Skipped);
        Ok(())
    }

    /// Outcome recorded for a source, if any.
    pub fn outcome(&self, source: Source) -> Option<SourceOutcome> {
        self.outcomes.get(&source).copied()
    }

    /// All recorded outcomes, keyed by source.
    pub fn outcomes(&self) -> &BTreeMap<Source, SourceOutcome> {
        &self.outcomes
    }

    /// Whether all three source attempts are accounted for.
    pub fn is_terminal(&self) -> bool {
        Source::ALL
            .iter()
            .all(|source| self.outcomes.contains_key(source))
    }

    /// Terminal classification; `None` while attempts are outstanding.
    pub fn resolution(&self) -> Option<ResolutionState> {
        if !self.is_terminal() {
            return None;
        }
        let degraded = self.outcomes.values().any(|o| {
            matches!(o, SourceOutcome::Failed(_) | SourceOutcome::Skipped)
        });
        Some(if degraded {
            ResolutionState::Partial
        } else {
            ResolutionState::Complete
        })
    }

    /// Failure kinds recorded per source.
    pub fn source_errors(&self) -> BTreeMap<Source, FetchErrorKind> {
        self.outcomes
            .iter()
            .filter_map(|(source, outcome)| match outcome {
                SourceOutcome::Failed(kind) => Some((*source, *kind)),
                _ => None,
            })
            .collect()
    }

    /// Cheapest competitor quote, with ties broken by source name.
    pub fn lowest_competitor_quote(&self) -> Option<&CompetitorQuote> {
        self.competitor_quotes.iter().min_by(|a, b| {
            a.competitor_price
                .cmp(&b.competitor_price)
                .then_with(|| a.competitor_source.cmp(&b.competitor_source))
        })
    }
}
