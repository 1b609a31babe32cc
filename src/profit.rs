//! Profitability calculation
//!
//! Pure, deterministic, and synchronous: given a terminal [`MergedRecord`]
//! and a fee model, produce a profit verdict. All monetary math uses
//! [`Decimal`] so repeated runs over the same merged data yield identical
//! reports.

use crate::fetch::Source;
use crate::merge::{MergedRecord, ResolutionState, SourceOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Profit calculation errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfitError {
    /// Catalog data passed validation upstream but carries a non-positive
    /// price at calculation time
    #[error("matched listing has invalid current price {0}")]
    InvalidMatchedAsin(Decimal),
}

/// Confidence attached to a profit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// All three sources succeeded with data
    High,
    /// At least one input was missing, failed, or fell back to a default
    Low,
}

/// Per-unit selling fees charged by the marketplace.
///
/// Implementations must be deterministic for a given sell price.
pub trait FeeModel: Send + Sync {
    /// Fee charged per unit sold at the given price.
    fn fee_per_unit(&self, sell_price: Decimal) -> Decimal;
}

/// Percentage referral fee plus a flat per-unit fulfillment fee.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralFeeModel {
    /// Fraction of the sell price taken as referral fee
    pub referral_rate: Decimal,
    /// Flat pick/pack/ship fee per unit
    pub fulfillment_fee: Decimal,
}

impl Default for ReferralFeeModel {
    fn default() -> Self {
        Self {
            referral_rate: Decimal::new(10, 2), // 10%
            fulfillment_fee: Decimal::from(150),
        }
    }
}

impl FeeModel for ReferralFeeModel {
    fn fee_per_unit(&self, sell_price: Decimal) -> Decimal {
        sell_price * self.referral_rate + self.fulfillment_fee
    }
}

/// Fixed per-unit fee regardless of sell price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatFeeModel(pub Decimal);

impl FeeModel for FlatFeeModel {
    fn fee_per_unit(&self, _sell_price: Decimal) -> Decimal {
        self.0
    }
}

/// Knobs for the profit calculation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitOptions {
    /// Divide estimated monthly sales by (competitor count + 1) to model
    /// demand being split across sellers of the same listing
    pub damp_by_competitor_count: bool,
}

/// Verdict for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum ProfitVerdict {
    /// A catalog match existed, so a profit report was produced
    Analyzed(ProfitReport),
    /// No usable catalog match; no profit figures apply
    Unmatched {
        /// Why the product could not be analyzed
        reason: UnmatchedReason,
    },
}

/// Why a product ended up without a profit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// The catalog lookup succeeded but found no listing for the JAN
    NoCatalogMatch,
    /// The catalog fetch itself failed, so no match could be attempted
    CatalogFetchFailed,
    /// A listing was matched but its data was unusable for calculation
    InvalidCatalogData,
}

impl UnmatchedReason {
    /// Stable snake_case label for report output.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoCatalogMatch => "no_catalog_match",
            Self::CatalogFetchFailed => "catalog_fetch_failed",
            Self::InvalidCatalogData => "invalid_catalog_data",
        }
    }
}

impl std::fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected monthly profit figures for an analyzed product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitReport {
    /// Matched marketplace catalog identifier
    pub asin: String,
    /// Price the calculation assumes the product sells at
    pub sell_price: Decimal,
    /// Units expected to sell per month (floored at 1)
    pub expected_monthly_sales: u64,
    /// sell_price × expected_monthly_sales
    pub expected_revenue: Decimal,
    /// Marketplace fees over the expected sales
    pub expected_fee: Decimal,
    /// Revenue minus fees minus wholesale cost
    pub expected_profit: Decimal,
    /// expected_profit / expected_revenue, rounded to four places
    pub expected_margin: Decimal,
    /// Whether every input came from a successful source fetch
    pub confidence: Confidence,
}

/// Compute the profit verdict for a terminal merged record.
///
/// The sell price is the cheapest competitor quote when one exists,
/// otherwise the matched listing's current price. Expected monthly sales
/// come from price history, floored at 1 so a product with no sales data
/// still yields per-unit figures.
pub fn compute(
    record: &MergedRecord,
    fee_model: &dyn FeeModel,
    options: &ProfitOptions,
) -> Result<ProfitVerdict, ProfitError> {
    let matched = match &record.matched_asin {
        Some(matched) => matched,
        None => {
            let reason = match record.outcome(Source::Catalog) {
                Some(SourceOutcome::Failed(_)) => UnmatchedReason::CatalogFetchFailed,
                _ => UnmatchedReason::NoCatalogMatch,
            };
            return Ok(ProfitVerdict::Unmatched { reason });
        }
    };
    if matched.current_price <= Decimal::ZERO {
        return Err(ProfitError::InvalidMatchedAsin(matched.current_price));
    }

    let lowest_quote = record.lowest_competitor_quote();
    let sell_price = lowest_quote
        .map(|quote| quote.competitor_price)
        .unwrap_or(matched.current_price);

    let mut expected_monthly_sales = record
        .price_history
        .as_ref()
        .map(|history| history.estimated_monthly_sales)
        .unwrap_or(0)
        .max(1);
    if options.damp_by_competitor_count {
        let sellers = record.competitor_quotes.len() as u64 + 1;
        expected_monthly_sales = (expected_monthly_sales / sellers).max(1);
    }

    let sales = Decimal::from(expected_monthly_sales);
    let expected_revenue = sell_price * sales;
    let expected_fee = fee_model.fee_per_unit(sell_price) * sales;
    let wholesale_cost = record.identifier.wholesale_price * sales;
    let expected_profit = expected_revenue - expected_fee - wholesale_cost;
    let expected_margin = if expected_revenue > Decimal::ZERO {
        (expected_profit / expected_revenue).round_dp(4)
    } else {
        Decimal::ZERO
    };

    let confidence = grade_confidence(record, lowest_quote.is_some());

    Ok(ProfitVerdict::Analyzed(ProfitReport {
        asin: matched.asin.clone(),
        sell_price,
        expected_monthly_sales,
        expected_revenue,
        expected_fee,
        expected_profit,
        expected_margin,
        confidence,
    }))
}

/// High only when every source succeeded with data and the sell price came
/// from a real competitor quote.
fn grade_confidence(record: &MergedRecord, priced_by_competitor: bool) -> Confidence {
    let all_succeeded = Source::ALL
        .iter()
        .all(|source| record.outcome(*source) == Some(SourceOutcome::Success));
    if record.resolution() == Some(ResolutionState::Complete)
        && all_succeeded
        && record.price_history.is_some()
        && priced_by_competitor
    {
        Confidence::High
    } else {
        Confidence::Low
    }
}
