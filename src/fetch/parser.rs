//! Source response parsers
//!
//! Stateless parsing functions converting raw JSON responses from the
//! external APIs into typed payloads. Centralized here so the fetchers stay
//! thin and the field mapping is testable without any network access.

use crate::{CompetitorQuote, MatchedAsin, PriceHistoryRecord, PricePoint};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// A response deserialized but failed the expected field mapping.
/// Folded into a permanent fetch error by the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error: {0}")]
pub struct ParseError(pub String);

/// Stateless parser for external source responses
pub struct SourceParser;

impl SourceParser {
    /// Parse a catalog lookup response into a match, if any.
    ///
    /// Response shape: `{"items": [{"asin", "title", "price", "salesRank"}]}`.
    /// An empty `items` array means the catalog has no listing for the JAN —
    /// reported as `Ok(None)`, not an error. When several listings match,
    /// the first (best-relevance) entry wins.
    pub fn parse_catalog(body: &Value) -> Result<Option<MatchedAsin>, ParseError> {
        let items = body
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ParseError("missing items array".to_string()))?;

        let Some(item) = items.first() else {
            return Ok(None);
        };

        let asin = Self::required_str(item, "asin")?;
        let title = Self::required_str(item, "title")?;
        let current_price = Self::parse_decimal(
            item.get("price")
                .ok_or_else(|| ParseError("missing price".to_string()))?,
            "price",
        )?;
        let sales_rank = item.get("salesRank").and_then(|v| v.as_u64());

        let matched = MatchedAsin {
            asin,
            title,
            current_price,
            sales_rank,
        };
        matched.validate().map_err(ParseError)?;
        Ok(Some(matched))
    }

    /// Parse a price history response.
    ///
    /// Response shape:
    /// `{"asin", "history": [[timestamp_ms, price], ...], "monthlySold"}`.
    /// The series is expected time-ordered; a disordered series fails
    /// validation rather than being silently re-sorted.
    pub fn parse_price_history(body: &Value) -> Result<PriceHistoryRecord, ParseError> {
        let asin = Self::required_str(body, "asin")?;

        let history = body
            .get("history")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ParseError("missing history array".to_string()))?;

        let mut price_series = Vec::with_capacity(history.len());
        for entry in history {
            let pair = entry
                .as_array()
                .ok_or_else(|| ParseError("history entry is not an array".to_string()))?;
            if pair.len() != 2 {
                return Err(ParseError(format!(
                    "expected [timestamp, price] pair, got {} elements",
                    pair.len()
                )));
            }
            let timestamp = pair[0]
                .as_i64()
                .ok_or_else(|| ParseError("invalid history timestamp".to_string()))?;
            let price = Self::parse_decimal(&pair[1], "history price")?;
            price_series.push(PricePoint { timestamp, price });
        }

        let estimated_monthly_sales = body
            .get("monthlySold")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let record = PriceHistoryRecord {
            asin,
            price_series,
            estimated_monthly_sales,
        };
        record.validate().map_err(ParseError)?;
        Ok(record)
    }

    /// Parse a Yahoo Shopping item search response into competitor quotes.
    ///
    /// Response shape: `{"hits": [{"price", "url"}]}`.
    pub fn parse_yahoo_quotes(body: &Value) -> Result<Vec<CompetitorQuote>, ParseError> {
        let hits = body
            .get("hits")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ParseError("missing hits array".to_string()))?;

        let mut quotes = Vec::with_capacity(hits.len());
        for hit in hits {
            let price = Self::parse_decimal(
                hit.get("price")
                    .ok_or_else(|| ParseError("missing hit price".to_string()))?,
                "price",
            )?;
            let listing_url = hit
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let quote = CompetitorQuote {
                competitor_source: "yahoo-shopping".to_string(),
                competitor_price: price,
                listing_url,
            };
            quote.validate().map_err(ParseError)?;
            quotes.push(quote);
        }
        Ok(quotes)
    }

    /// Parse a Rakuten Ichiba item search response into competitor quotes.
    ///
    /// Response shape (formatVersion 2): `{"Items": [{"itemPrice", "itemUrl"}]}`.
    pub fn parse_rakuten_quotes(body: &Value) -> Result<Vec<CompetitorQuote>, ParseError> {
        let items = body
            .get("Items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ParseError("missing Items array".to_string()))?;

        let mut quotes = Vec::with_capacity(items.len());
        for item in items {
            let price = Self::parse_decimal(
                item.get("itemPrice")
                    .ok_or_else(|| ParseError("missing itemPrice".to_string()))?,
                "itemPrice",
            )?;
            let listing_url = item
                .get("itemUrl")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let quote = CompetitorQuote {
                competitor_source: "rakuten".to_string(),
                competitor_price: price,
                listing_url,
            };
            quote.validate().map_err(ParseError)?;
            quotes.push(quote);
        }
        Ok(quotes)
    }

    /// Parse a decimal that may arrive as a JSON string or number.
    fn parse_decimal(value: &Value, field: &str) -> Result<Decimal, ParseError> {
        match value {
            Value::String(s) => Decimal::from_str(s)
                .map_err(|e| ParseError(format!("invalid {field} '{s}': {e}"))),
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .map_err(|e| ParseError(format!("invalid {field} '{n}': {e}"))),
            other => Err(ParseError(format!(
                "invalid {field}: expected string or number, got {other}"
            ))),
        }
    }

    fn required_str(value: &Value, field: &str) -> Result<String, ParseError> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ParseError(format!("missing or invalid {field}")))
    }
}
