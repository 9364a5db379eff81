//! The full results page opened by "View All N Products".

use serde::Deserialize;
use utoipa::IntoParams;

use crate::models::ProductRecord;
use crate::render::{escape_html, results_product_card};

pub const EMPTY_STATE: &str = "No products found";

/// Query string of the results page.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ResultsParams {
    /// URL-encoded JSON array of products.
    pub search_results: Option<String>,
    /// URL-encoded JSON array of recommended products.
    pub recommendations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsPage {
    pub search_results: Vec<ProductRecord>,
    pub recommendations: Vec<ProductRecord>,
}

impl ResultsPage {
    pub fn from_params(params: &ResultsParams) -> Self {
        Self {
            search_results: decode_list(params.search_results.as_deref()),
            recommendations: decode_list(params.recommendations.as_deref()),
        }
    }

    /// Parses the query string of a full results URL.
    pub fn from_url(url: &str) -> Self {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        let mut params = ResultsParams::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "searchResults" => params.search_results = Some(value.into_owned()),
                "recommendations" => params.recommendations = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::from_params(&params)
    }

    pub fn title(&self) -> String {
        match self.search_results.len() {
            0 => "Product Finder".to_string(),
            1 => "1 Product Found | Product Finder".to_string(),
            n => format!("{} Products Found | Product Finder", n),
        }
    }

    pub fn render(&self) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
                "<title>{title}</title>\n<link rel=\"stylesheet\" href=\"/chat.css\">\n</head>\n<body>\n",
                "<a id=\"back-link\" href=\"#\">&larr; Back to chat</a>\n",
                "<h2>Search Results</h2>\n<div id=\"search-results\">{results}</div>\n",
                "<h2>Recommendations</h2>\n<div id=\"recommendations\">{recommendations}</div>\n",
                "</body>\n</html>\n"
            ),
            title = escape_html(&self.title()),
            results = render_section(&self.search_results),
            recommendations = render_section(&self.recommendations),
        )
    }
}

fn render_section(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return format!(r#"<div class="no-products">{}</div>"#, EMPTY_STATE);
    }
    products.iter().map(results_product_card).collect()
}

/// Absent or malformed values decode to an empty list. Values that were
/// percent-encoded twice are decoded once more before giving up.
fn decode_list(raw: Option<&str>) -> Vec<ProductRecord> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    if let Ok(list) = serde_json::from_str(raw) {
        return list;
    }
    urlencoding::decode(raw)
        .ok()
        .and_then(|decoded| serde_json::from_str(&decoded).ok())
        .unwrap_or_else(|| {
            tracing::warn!("Ignoring malformed product list in results URL");
            Vec::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::results_url;

    #[test]
    fn test_missing_params_render_empty_state() {
        let page = ResultsPage::from_url("http://127.0.0.1:5202/product_list");
        assert!(page.search_results.is_empty());
        let html = page.render();
        assert_eq!(html.matches(EMPTY_STATE).count(), 2);
        assert!(html.contains("<title>Product Finder</title>"));
    }

    #[test]
    fn test_malformed_json_is_empty() {
        let page = ResultsPage::from_params(&ResultsParams {
            search_results: Some("[{not json".to_string()),
            recommendations: Some("42".to_string()),
        });
        assert_eq!(page, ResultsPage::default());
    }

    #[test]
    fn test_sections_are_independent() {
        let products = vec![
            ProductRecord::new("Mouse", "https://a.test/1", "Amazon").with_price("$10"),
            ProductRecord::new("Pad", "https://a.test/2", "Amazon"),
        ];
        let url = results_url("http://host/product_list", &products, &[]);
        let page = ResultsPage::from_url(&url);
        assert_eq!(page.search_results, products);

        let html = page.render();
        assert_eq!(html.matches(r#"class="product-card""#).count(), 2);
        assert_eq!(html.matches(EMPTY_STATE).count(), 1);
        assert!(html.contains("<title>2 Products Found | Product Finder</title>"));
    }

    #[test]
    fn test_double_encoded_value() {
        let json = r#"[{"title":"Lamp","url":"https://a.test/l","source":"Shop"}]"#;
        let once = urlencoding::encode(json).into_owned();
        let page = ResultsPage::from_params(&ResultsParams {
            search_results: Some(once),
            recommendations: None,
        });
        assert_eq!(page.search_results.len(), 1);
        assert_eq!(page.title(), "1 Product Found | Product Finder");
    }
}
