//! External source endpoint configuration
//!
//! Endpoint descriptors for the three external data sources. Differences
//! between sources are purely configuration; the fetchers share one HTTP
//! client shape. Base URLs can be overridden per run through
//! [`crate::scheduler::SourceTuning::base_url`] (staging endpoints, tests).

/// Endpoint descriptor for one external API.
#[derive(Debug, Clone)]
pub struct SourceEndpoint {
    /// Base URL of the API
    pub base_url: &'static str,
    /// Lookup/search path appended to the base URL
    pub search_path: &'static str,
    /// Query parameter name carrying the API credential, if the source
    /// authenticates via query string
    pub key_param: Option<&'static str>,
}

/// Marketplace catalog lookup (JAN → listing match).
///
/// Responds with an item list for a JAN query; an empty list means the
/// catalog has no match for that code.
pub const CATALOG_ENDPOINT: SourceEndpoint = SourceEndpoint {
    base_url: "https://catalog-api.example-marketplace.com",
    search_path: "/catalog/v1/items",
    key_param: Some("apiKey"),
};

/// Price history analysis service (by ASIN).
///
/// Returns the tracked price series and a monthly sales estimate derived
/// from sales-rank movement.
pub const PRICE_HISTORY_ENDPOINT: SourceEndpoint = SourceEndpoint {
    base_url: "https://api.price-history.example.com",
    search_path: "/v1/product",
    key_param: Some("key"),
};

/// Yahoo Shopping item search (competitor quotes by JAN).
pub const YAHOO_SHOPPING_ENDPOINT: SourceEndpoint = SourceEndpoint {
    base_url: "https://shopping.yahooapis.jp",
    search_path: "/ShoppingWebService/V3/itemSearch",
    key_param: Some("appid"),
};

/// Rakuten Ichiba item search (competitor quotes by JAN).
pub const RAKUTEN_ICHIBA_ENDPOINT: SourceEndpoint = SourceEndpoint {
    base_url: "https://app.rakuten.co.jp",
    search_path: "/services/api/IchibaItem/Search/20220601",
    key_param: Some("applicationId"),
};
