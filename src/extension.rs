//! Wires the extension contexts together around one browser.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::background::BackgroundRelay;
use crate::browser::{Browser, TabId};
use crate::config::Config;
use crate::content::ContentOptions;
use crate::error::ApiError;
use crate::extract::Page;
use crate::popup::PopupController;

pub struct Extension {
    config: Config,
    browser: Arc<Browser>,
    background: Arc<BackgroundRelay>,
}

impl Extension {
    /// Installs the extension: starts the background relay in a fresh browser.
    pub async fn install(config: Config) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        let browser = Arc::new(Browser::new(ContentOptions::from_config(&config)));
        let background = BackgroundRelay::spawn(api, browser.clone(), config.ready_timeout).await;
        tracing::info!("Extension installed, backend at {}", config.backend_url);

        Ok(Self {
            config,
            browser,
            background,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn browser(&self) -> &Arc<Browser> {
        &self.browser
    }

    pub fn background(&self) -> &Arc<BackgroundRelay> {
        &self.background
    }

    /// Navigates to `page` in a new, active tab.
    pub async fn open_page(&self, page: Page) -> TabId {
        let tab = self.browser.open_tab(page).await;
        self.background.on_tab_updated(tab).await;
        tab
    }

    pub fn popup(&self) -> PopupController {
        PopupController::new(self.browser.clone(), self.config.ready_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::messages::{Request, Response};
    use crate::popup::{ClickOutcome, LABEL_OPEN};
    use crate::results_view::ResultsPage;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AMAZON_HTML: &str = r#"
        <html><body>
          <div class="s-result-item" data-component-type="s-search-result">
            <h2><a class="a-link-normal" href="/dp/B01"><span>Logitech M185 Wireless Mouse</span></a></h2>
            <span class="a-price"><span class="a-price-whole">14.</span></span>
            <img class="s-image" src="https://m.media-amazon.test/m185.jpg">
          </div>
        </body></html>
    "#;

    fn backend_products(n: usize) -> serde_json::Value {
        json!((1..=n)
            .map(|i| json!({
                "title": format!("Wireless Mouse {}", i),
                "price": format!("${}.99", 10 + i),
                "url": format!("https://www.amazon.com/dp/B0{}", i),
                "source": "Amazon"
            }))
            .collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_popup_to_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "products": backend_products(5),
                "recommendations": backend_products(1),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let extension = Extension::install(Config {
            backend_url: server.uri(),
            ..Config::default()
        })
        .await
        .unwrap();
        let tab = extension
            .open_page(Page::new("https://www.amazon.com/s?k=wireless+mouse", AMAZON_HTML))
            .await;

        let popup = extension.popup();
        assert_eq!(popup.click_open_chat().await, ClickOutcome::Closed);
        assert_eq!(popup.open().await.button_label, LABEL_OPEN);

        let content = extension.browser().content(tab).await.unwrap();
        let snapshot = content.ask("wireless mouse", Duration::from_secs(5)).await.unwrap();

        let ChatMessage::Products { preview, total, view_all_url: Some(url) } = snapshot.messages.last().unwrap() else {
            panic!("expected products with a view-all link, got {:?}", snapshot.messages.last());
        };
        assert_eq!(preview.len(), 2);
        assert_eq!(*total, 5);
        assert!(url.starts_with(&extension.config().results_page_url));

        let page = ResultsPage::from_url(url);
        assert_eq!(page.search_results.len(), 5);
        assert_eq!(page.recommendations.len(), 1);
        assert_eq!(page.title(), "5 Products Found | Product Finder");
    }

    #[tokio::test]
    async fn test_background_forwards_find_products() {
        let extension = Extension::install(Config::default()).await.unwrap();
        let tab = extension
            .open_page(Page::new("https://www.amazon.com/s?k=mouse", AMAZON_HTML))
            .await;
        extension.browser().execute_content_script(tab).await.unwrap();

        let response = extension.browser().send_to_background(Request::FindProducts).await.unwrap();
        let Response::Products { products, .. } = response else {
            panic!("expected products");
        };
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Logitech M185 Wireless Mouse");
        assert_eq!(products[0].url, "https://www.amazon.com/dp/B01");
        assert!(extension.browser().has_stylesheet(tab).await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_shows_error() {
        let extension = Extension::install(Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        })
        .await
        .unwrap();
        let tab = extension.open_page(Page::new("https://shop.test/", "<html></html>")).await;
        extension.background().on_action_clicked(tab).await.unwrap();

        let content = extension.browser().content(tab).await.unwrap();
        let snapshot = content.ask("lamp", Duration::from_secs(10)).await.unwrap();
        let last = snapshot.messages.last().unwrap().plain_text();
        assert!(last.contains("Sorry, I encountered an error"));
        assert!(last.contains("Make sure the backend server is running."));
    }
}
