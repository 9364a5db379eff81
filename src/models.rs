use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::error::RelayError;

// ============================================================================
// Product Data Structures
// ============================================================================

/// A product candidate, scraped from a page or returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductRecord {
    /// Backend catalogues sometimes call this `name`.
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_price", skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Site name ("Amazon", "eBay", or the page host).
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductRecord {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: None,
            url: url.into(),
            image: None,
            source: source.into(),
            description: None,
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }
}

/// Prices arrive either as display strings ("$19.99") or bare numbers.
fn deserialize_price<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Text(String),
        Number(f64),
    }

    Ok(match Option::<RawPrice>::deserialize(deserializer)? {
        Some(RawPrice::Text(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(RawPrice::Number(value)) => Some(format!("{:.2}", value)),
        _ => None,
    })
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl SearchQuery {
    /// Builds a query from raw user input; blank input is rejected.
    pub fn new(raw: &str) -> Result<Self, RelayError> {
        let query = raw.trim();
        if query.is_empty() {
            return Err(RelayError::EmptyQuery);
        }
        Ok(Self {
            query: query.to_string(),
            budget: None,
            products: Vec::new(),
            site: None,
        })
    }

    pub fn with_products(mut self, products: Vec<ProductRecord>) -> Self {
        self.products = products;
        self
    }

    pub fn with_budget(mut self, budget: Option<f64>) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        let site = site.into();
        self.site = (!site.is_empty()).then_some(site);
        self
    }
}

/// Response of `POST /api/search`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub products: Vec<ProductRecord>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub recommendations: Vec<ProductRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// The message to show when the backend reports a failure.
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Search failed".to_string())
    }
}

/// `null` lists are treated like missing ones.
fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<ProductRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ProductRecord>>::deserialize(deserializer)?.unwrap_or_default())
}
