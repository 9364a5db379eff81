//! Standalone search page: a query/budget form that talks to the backend
//! directly, without a page to scrape.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::ApiClient;
use crate::models::{ProductRecord, SearchQuery};
use crate::render::escape_html;

pub const EMPTY_QUERY: &str = "Please enter what you're looking for.";
pub const CONNECTION_ERROR: &str = "Error connecting to backend.";
const DESCRIPTION_LIMIT: usize = 60;
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// Form fields of the standalone page.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchForm {
    pub query: Option<String>,
    /// Maximum spend, as typed by the user.
    pub budget: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StandaloneResult {
    /// A message shown instead of results.
    Alert(String),
    Results {
        products: Vec<ProductRecord>,
        recommendations: Vec<ProductRecord>,
        total_price: Option<f64>,
    },
}

/// Blank or unparseable budgets are sent as absent.
pub fn parse_budget(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|b| !b.is_empty())
        .and_then(|b| b.parse::<f64>().ok())
        .filter(|b| b.is_finite())
}

pub async fn run_search(api: &ApiClient, form: &SearchForm) -> StandaloneResult {
    let query = match SearchQuery::new(form.query.as_deref().unwrap_or("")) {
        Ok(query) => query.with_budget(parse_budget(form.budget.as_deref())),
        Err(_) => return StandaloneResult::Alert(EMPTY_QUERY.to_string()),
    };

    match api.search(&query).await {
        Ok(result) if result.is_success() => StandaloneResult::Results {
            products: result.products,
            recommendations: result.recommendations,
            total_price: result.total_price,
        },
        Ok(result) => StandaloneResult::Alert(result.failure_message()),
        Err(e) => {
            tracing::error!("Standalone search failed: {}", e);
            StandaloneResult::Alert(CONNECTION_ERROR.to_string())
        }
    }
}

impl StandaloneResult {
    pub fn render(&self) -> String {
        match self {
            StandaloneResult::Alert(message) => {
                format!(r#"<div class="alert" role="alert">{}</div>"#, escape_html(message))
            }
            StandaloneResult::Results {
                products,
                recommendations,
                total_price,
            } => {
                let total = match total_price {
                    Some(total) if *total > 0.0 => {
                        format!("Total price of recommended items: Rs. {:.2}", total)
                    }
                    _ => String::new(),
                };
                format!(
                    concat!(
                        r#"<h3>Products</h3><div id="productList">{}</div>"#,
                        r#"<h3>Recommendations</h3><div id="recommendList">{}</div>"#,
                        r#"<div id="totalPrice">{}</div>"#
                    ),
                    products.iter().map(card).collect::<String>(),
                    recommendations.iter().map(card).collect::<String>(),
                    total
                )
            }
        }
    }
}

/// The whole page, with the form pre-filled from the last submission.
pub fn render_page(form: &SearchForm, result: Option<&StandaloneResult>) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
            "<title>Product Finder</title>\n<link rel=\"stylesheet\" href=\"/chat.css\">\n</head>\n<body>\n",
            "<form method=\"get\" action=\"/search\">\n",
            "<input id=\"query\" name=\"query\" placeholder=\"What are you looking for?\" value=\"{query}\">\n",
            "<input id=\"budget\" name=\"budget\" placeholder=\"Budget (optional)\" value=\"{budget}\">\n",
            "<button id=\"searchBtn\" type=\"submit\">Search</button>\n</form>\n",
            "<div id=\"results\">{results}</div>\n</body>\n</html>\n"
        ),
        query = escape_html(form.query.as_deref().unwrap_or("")),
        budget = escape_html(form.budget.as_deref().unwrap_or("")),
        results = result.map(StandaloneResult::render).unwrap_or_default(),
    )
}

fn card(product: &ProductRecord) -> String {
    let image = product.image.as_deref().unwrap_or(PLACEHOLDER_IMAGE);
    let description: String = product
        .description
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(DESCRIPTION_LIMIT)
        .collect();
    let price = product
        .price
        .as_deref()
        .map(|p| format!("<p><b>Rs. {}</b></p>", escape_html(&rupees(p))))
        .unwrap_or_default();

    format!(
        r#"<div class="product-card"><img src="{}" alt="{}"><h4>{}</h4><p>{}</p>{}</div>"#,
        escape_html(image),
        escape_html(&product.title),
        escape_html(&product.title),
        escape_html(&description),
        price
    )
}

fn rupees(price: &str) -> String {
    match price.parse::<f64>() {
        Ok(value) => format!("{:.2}", value),
        Err(_) => price.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(url: &str) -> ApiClient {
        ApiClient::new(&Config {
            backend_url: url.to_string(),
            ..Config::default()
        })
        .unwrap()
    }

    fn form(query: &str, budget: &str) -> SearchForm {
        SearchForm {
            query: Some(query.to_string()),
            budget: Some(budget.to_string()),
        }
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget(Some(" 1500 ")), Some(1500.0));
        assert_eq!(parse_budget(Some("")), None);
        assert_eq!(parse_budget(Some("cheap")), None);
        assert_eq!(parse_budget(None), None);
    }

    #[tokio::test]
    async fn test_empty_query_alert() {
        let result = run_search(&client("http://127.0.0.1:9"), &form("  ", "100")).await;
        assert_eq!(result, StandaloneResult::Alert(EMPTY_QUERY.to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_backend_alert() {
        let result = run_search(&client("http://127.0.0.1:9"), &form("lamp", "")).await;
        assert_eq!(result, StandaloneResult::Alert(CONNECTION_ERROR.to_string()));
    }

    #[tokio::test]
    async fn test_failure_status_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "error" })))
            .mount(&server)
            .await;

        let result = run_search(&client(&server.uri()), &form("lamp", "")).await;
        assert_eq!(result, StandaloneResult::Alert("Search failed".to_string()));
    }

    #[tokio::test]
    async fn test_results_with_budget_and_total() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(body_partial_json(json!({ "query": "desk lamp", "budget": 2000.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "products": [{
                    "name": "Desk Lamp",
                    "price": 1499.5,
                    "description": "An adjustable LED desk lamp with three brightness levels and a USB port"
                }],
                "recommendations": [{ "name": "Bulb", "price": 120 }],
                "total_price": 1619.5
            })))
            .mount(&server)
            .await;

        let result = run_search(&client(&server.uri()), &form("desk lamp", "2000")).await;
        let html = result.render();
        assert!(html.contains("<h4>Desk Lamp</h4>"));
        assert!(html.contains("<p><b>Rs. 1499.50</b></p>"));
        assert!(html.contains("<p>An adjustable LED desk lamp with three brightness levels and</p>"));
        assert!(html.contains("Total price of recommended items: Rs. 1619.50"));
        assert!(html.contains(PLACEHOLDER_IMAGE));
    }

    #[test]
    fn test_zero_total_hidden() {
        let result = StandaloneResult::Results {
            products: vec![],
            recommendations: vec![],
            total_price: Some(0.0),
        };
        assert!(!result.render().contains("Total price"));
    }

    #[test]
    fn test_page_keeps_form_values() {
        let html = render_page(&form("lamp <b>", "500"), None);
        assert!(html.contains(r#"value="lamp &lt;b&gt;""#));
        assert!(html.contains(r#"value="500""#));
    }
}
