//! JAN code validation and product identity.
//!
//! Every product flowing through the pipeline is keyed by its JAN code
//! (Japanese Article Number, an EAN-13/EAN-8 barcode). Codes are kept as
//! strings to preserve leading zeros; the check digit is validated on
//! construction so downstream stages never see a malformed code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier errors
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Code is not 8 or 13 digits
    #[error("invalid JAN length: expected 8 or 13 digits, got {0}")]
    InvalidLength(usize),

    /// Code contains a non-digit character
    #[error("invalid JAN character '{0}': codes must be numeric")]
    InvalidCharacter(char),

    /// Check digit does not match the EAN checksum
    #[error("JAN check digit mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digit required by the EAN checksum
        expected: u32,
        /// Digit present in the input
        actual: u32,
    },

    /// Wholesale price must be positive
    #[error("wholesale price must be positive, got {0}")]
    InvalidWholesalePrice(Decimal),

    /// Source listing URL is empty
    #[error("source listing URL cannot be empty")]
    EmptyListingUrl,
}

/// A validated JAN code (EAN-13 or EAN-8).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JanCode(String);

impl JanCode {
    /// Parse and validate a JAN code.
    ///
    /// Accepts 13-digit (EAN-13) and 8-digit (EAN-8) codes and verifies the
    /// trailing check digit with the standard EAN weighting.
    pub fn parse(code: &str) -> Result<Self, IdentifierError> {
        let code = code.trim();

        if let Some(c) = code.chars().find(|c| !c.is_ascii_digit()) {
            return Err(IdentifierError::InvalidCharacter(c));
        }

        if code.len() != 13 && code.len() != 8 {
            return Err(IdentifierError::InvalidLength(code.len()));
        }

        let digits: Vec<u32> = code.chars().filter_map(|c| c.to_digit(10)).collect();
        let expected = Self::check_digit(&digits[..digits.len() - 1]);
        let actual = digits[digits.len() - 1];
        if expected != actual {
            return Err(IdentifierError::ChecksumMismatch { expected, actual });
        }

        Ok(Self(code.to_string()))
    }

    /// Compute the EAN check digit for the leading digits of a code.
    ///
    /// Weights alternate 1/3 counted from the right of the payload.
    fn check_digit(payload: &[u32]) -> u32 {
        let sum: u32 = payload
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
            .sum();
        (10 - (sum % 10)) % 10
    }

    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JanCode {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Immutable identity of a wholesale product within a batch.
///
/// Unique by JAN code within a batch; created at batch-ingest time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIdentifier {
    /// Validated JAN code
    pub jan_code: JanCode,
    /// Wholesale (purchase) price per unit
    pub wholesale_price: Decimal,
    /// URL of the wholesale listing the product was discovered on
    pub source_listing_url: String,
}

impl ProductIdentifier {
    /// Create a product identifier, validating all fields.
    pub fn new(
        jan_code: &str,
        wholesale_price: Decimal,
        source_listing_url: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let jan_code = JanCode::parse(jan_code)?;

        if wholesale_price <= Decimal::ZERO {
            return Err(IdentifierError::InvalidWholesalePrice(wholesale_price));
        }

        let source_listing_url = source_listing_url.into();
        if source_listing_url.is_empty() {
            return Err(IdentifierError::EmptyListingUrl);
        }

        Ok(Self {
            jan_code,
            wholesale_price,
            source_listing_url,
        })
    }
}

impl fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.jan_code, self.wholesale_price)
    }
}
