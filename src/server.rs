//! HTTP server for the results view, the standalone search page and a
//! scrape endpoint, with the chat assets served as static files.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::{OpenApi, ToSchema};

use crate::api::ApiClient;
use crate::config::Config;
use crate::extract::{extract_products_from_page, is_http_url, Page};
use crate::models::ProductRecord;
use crate::results_view::{ResultsPage, ResultsParams};
use crate::standalone::{render_page, run_search, SearchForm};

#[derive(OpenApi)]
#[openapi(
    paths(product_list, standalone_search, scrape),
    components(schemas(ScrapeRequest, ScrapeResponse, ProductRecord)),
    tags(
        (name = "views", description = "Rendered result pages"),
        (name = "scraper", description = "Product extraction")
    )
)]
pub struct ApiDoc;

pub struct AppState {
    pub api: ApiClient,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScrapeRequest {
    /// Address of the page, used to resolve relative links.
    pub url: String,
    pub html: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScrapeResponse {
    pub count: usize,
    pub products: Vec<ProductRecord>,
}

/// Full results view opened by "View All N Products".
#[utoipa::path(
    get,
    path = "/product_list",
    params(ResultsParams),
    responses((status = 200, description = "Rendered results page", body = String, content_type = "text/html")),
    tag = "views"
)]
pub async fn product_list(Query(params): Query<ResultsParams>) -> Html<String> {
    Html(ResultsPage::from_params(&params).render())
}

/// Standalone search page. Without a query it shows the empty form.
#[utoipa::path(
    get,
    path = "/search",
    params(SearchForm),
    responses((status = 200, description = "Search form with results", body = String, content_type = "text/html")),
    tag = "views"
)]
pub async fn standalone_search(State(state): State<Arc<AppState>>, Query(form): Query<SearchForm>) -> Html<String> {
    if form.query.is_none() {
        return Html(render_page(&form, None));
    }
    let result = run_search(&state.api, &form).await;
    Html(render_page(&form, Some(&result)))
}

/// Extracts products from a posted page snapshot.
#[utoipa::path(
    post,
    path = "/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Products found on the page", body = ScrapeResponse),
        (status = 400, description = "Page URL is not http(s)")
    ),
    tag = "scraper"
)]
pub async fn scrape(Json(req): Json<ScrapeRequest>) -> Result<Json<ScrapeResponse>, StatusCode> {
    if !is_http_url(&req.url) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let page = Page::new(req.url, req.html);
    let products = tokio::task::spawn_blocking(move || extract_products_from_page(&page))
        .await
        .map_err(|e| {
            tracing::error!("Scrape task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(ScrapeResponse {
        count: products.len(),
        products,
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn router(state: Arc<AppState>, assets_dir: PathBuf) -> Router {
    Router::new()
        .route("/product_list", get(product_list))
        .route("/search", get(standalone_search))
        .route("/scrape", post(scrape))
        .route("/api-docs/openapi.json", get(openapi_json))
        .fallback_service(ServeDir::new(assets_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        api: ApiClient::new(config)?,
    });
    let assets_dir = config.assets_dir.clone().unwrap_or_else(|| PathBuf::from("assets"));
    let app = router(state, assets_dir);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
