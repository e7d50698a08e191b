//! Marketplace search connector.
//!
//! Issues paginated queries against the marketplace search endpoint for
//! each configured phrase and extracts the ranking slots of the tracked
//! brand's product cards.
//!
//! # Configuration
//!
//! ```toml
//! [marketplace]
//! search_url = "https://search.example.com/v13/search?resultset=catalog&sort=popular"
//! brand = "Northloom"
//! phrases = ["mens pajama set", "jersey"]
//! max_pages = 3
//! timeout_secs = 10
//! ```
//!
//! # Failure policy
//!
//! A fetch cycle never fails as a whole. Any single page that times out,
//! returns a non-2xx status, or yields unparseable JSON is logged and
//! skipped; the remaining pages and phrases still run. An empty batch
//! means "no new data this cycle", not an error — callers decide how to
//! surface it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::MarketplaceConfig;
use crate::identity::IdentityMap;
use crate::models::{to_minute, Observation};

// ============ Wire format ============

/// Top-level search response. Only the product list is of interest.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    #[serde(default)]
    pub products: Vec<ProductCard>,
}

/// One product card in a search result page.
///
/// Cards without `log` carry no ranking metadata and are skipped.
#[derive(Debug, Deserialize)]
pub struct ProductCard {
    pub id: u64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub log: Option<RankLog>,
}

/// Ranking metadata attached to a card by the search engine.
#[derive(Debug, Deserialize)]
pub struct RankLog {
    pub position: i64,
    #[serde(rename = "promoPosition", default)]
    pub promo_position: Option<i64>,
}

// ============ Client ============

/// HTTP client for the marketplace search endpoint.
pub struct SearchClient {
    http: reqwest::Client,
    search_url: String,
    brand: String,
    max_pages: u32,
}

impl SearchClient {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build marketplace HTTP client")?;

        Ok(Self {
            http,
            search_url: config.search_url.clone(),
            brand: config.brand.clone(),
            max_pages: config.max_pages,
        })
    }

    /// Fetch one cycle's worth of observations across all phrases.
    ///
    /// Every observation in the returned batch carries the same
    /// minute-resolution timestamp, taken once at the start of the cycle.
    pub async fn fetch_all(&self, phrases: &[String], identity: &IdentityMap) -> Vec<Observation> {
        let stamp = to_minute(chrono::Utc::now());
        let mut batch = Vec::new();

        for phrase in phrases {
            for page in 1..=self.max_pages {
                let response = match self.fetch_page(phrase, page).await {
                    Ok(response) => response,
                    Err(err) => {
                        tracing::warn!(phrase = %phrase, page, error = %err, "search page skipped");
                        continue;
                    }
                };
                batch.extend(collect_cards(&response, &self.brand, identity, stamp, phrase));
            }
        }

        batch
    }

    async fn fetch_page(&self, phrase: &str, page: u32) -> Result<SearchResponse> {
        let page_param = page.to_string();
        let response = self
            .http
            .get(&self.search_url)
            .query(&[("query", phrase), ("page", page_param.as_str())])
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("non-success status")?;

        response.json().await.context("malformed search payload")
    }
}

/// Filter a result page down to the tracked brand's ranked cards and
/// stamp each as an [`Observation`].
pub fn collect_cards(
    response: &SearchResponse,
    brand: &str,
    identity: &IdentityMap,
    stamp: chrono::DateTime<chrono::Utc>,
    phrase: &str,
) -> Vec<Observation> {
    let Some(data) = &response.data else {
        return Vec::new();
    };

    data.products
        .iter()
        .filter_map(|card| {
            let log = card.log.as_ref()?;
            if card.brand.as_deref() != Some(brand) {
                return None;
            }
            Some(Observation {
                position: log.position,
                promo_position: log.promo_position,
                timestamp: stamp,
                phrase: phrase.to_string(),
                sku: identity.resolve(card.id),
            })
        })
        .collect()
}
