//! The background relay: owns every outbound network call and routes
//! tab-directed requests to the active tab's content relay.

use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiClient;
use crate::browser::{Browser, TabId};
use crate::error::RelayError;
use crate::messages::{ApiReply, ChatInterfaceState, Request, Response};
use crate::runtime::{Envelope, Mailbox};

pub const CONTENT_UNREACHABLE: &str = "Failed to communicate with content script";

pub struct BackgroundRelay {
    api: ApiClient,
    browser: Arc<Browser>,
    ready_timeout: Duration,
    mailbox: Mailbox,
}

impl BackgroundRelay {
    /// Starts the relay and registers it with the browser as the extension's
    /// background context.
    pub async fn spawn(api: ApiClient, browser: Arc<Browser>, ready_timeout: Duration) -> Arc<Self> {
        let (mailbox, mut inbox) = Mailbox::channel();
        browser.attach_background(mailbox.clone()).await;

        let relay = Arc::new(Self {
            api,
            browser,
            ready_timeout,
            mailbox,
        });

        let worker = relay.clone();
        tokio::spawn(async move {
            tracing::info!("Background relay started");
            while let Some(envelope) = inbox.recv().await {
                let relay = worker.clone();
                tokio::spawn(async move { relay.on_message(envelope).await });
            }
        });

        relay
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn browser(&self) -> &Arc<Browser> {
        &self.browser
    }

    async fn on_message(&self, envelope: Envelope) {
        tracing::debug!("Background received {}", envelope.request.action());
        let response = self.handle(envelope.request.clone()).await;
        envelope.respond(response);
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::ApiRequest { endpoint, data } => Response::Api(self.api_request(&endpoint, &data).await),
            Request::Ping => Response::Pong,
            request => self.forward_to_active_tab(request).await,
        }
    }

    async fn api_request(&self, endpoint: &str, data: &serde_json::Value) -> ApiReply {
        match self.api.request(endpoint, data).await {
            Ok(value) => ApiReply::ok(value),
            Err(e) => {
                tracing::error!("API request failed: {}", e);
                ApiReply::err(e.to_string())
            }
        }
    }

    async fn forward_to_active_tab(&self, request: Request) -> Response {
        let Some(tab) = self.browser.active_tab().await else {
            return Response::failed(RelayError::NoActiveTab.to_string());
        };

        match self.browser.send_to_tab(tab.id, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error sending message to content script: {}", e);
                Response::failed(CONTENT_UNREACHABLE)
            }
        }
    }

    /// A tab finished loading: pre-insert the chat stylesheet on http(s) pages.
    pub async fn on_tab_updated(&self, tab: TabId) {
        match self.browser.insert_css(tab).await {
            Ok(()) => tracing::debug!("Inserted chat stylesheet into tab {}", tab),
            Err(e) => tracing::debug!("Skipping stylesheet for tab {}: {}", tab, e),
        }
    }

    /// Toolbar icon click: inject the content script and toggle the chat.
    pub async fn on_action_clicked(&self, tab: TabId) -> Result<ChatInterfaceState, RelayError> {
        tracing::debug!("Extension icon clicked on tab {}", tab);
        let content = self.browser.execute_content_script(tab).await.map_err(|e| {
            tracing::debug!("Skipping injection: {}", e);
            e
        })?;
        content.wait_ready(self.ready_timeout).await?;

        match self.browser.send_to_tab(tab, Request::ToggleChat).await? {
            Response::Toggled { state } => Ok(state),
            other => Err(RelayError::UnexpectedResponse(format!("{:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::content::ContentOptions;
    use crate::extract::Page;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn relay_for(backend_url: &str) -> Arc<BackgroundRelay> {
        let config = Config {
            backend_url: backend_url.to_string(),
            ..Config::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let browser = Arc::new(Browser::new(ContentOptions::from_config(&config)));
        BackgroundRelay::spawn(api, browser, config.ready_timeout).await
    }

    #[tokio::test]
    async fn test_api_request_success_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "products": [] })))
            .mount(&server)
            .await;

        let relay = relay_for(&server.uri()).await;
        let response = relay
            .mailbox()
            .send(Request::ApiRequest {
                endpoint: "search".to_string(),
                data: json!({ "query": "mouse" }),
            })
            .await
            .unwrap();
        let Response::Api(reply) = response else {
            panic!("expected an api reply");
        };
        assert!(reply.success);
        assert_eq!(reply.data.unwrap()["status"], "success");
    }

    #[tokio::test]
    async fn test_api_request_error_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let relay = relay_for(&server.uri()).await;
        let response = relay
            .handle(Request::ApiRequest {
                endpoint: "search".to_string(),
                data: json!({ "query": "mouse" }),
            })
            .await;
        assert_eq!(response, Response::Api(ApiReply::err("HTTP error! status: 500")));
    }

    #[tokio::test]
    async fn test_forward_without_active_tab() {
        let relay = relay_for("http://127.0.0.1:9").await;
        assert_eq!(relay.handle(Request::FindProducts).await, Response::failed("No active tab found"));
    }

    #[tokio::test]
    async fn test_forward_without_content_script() {
        let relay = relay_for("http://127.0.0.1:9").await;
        relay.browser().open_tab(Page::new("https://a.test/", "")).await;
        assert_eq!(relay.handle(Request::ToggleChat).await, Response::failed(CONTENT_UNREACHABLE));
    }

    #[tokio::test]
    async fn test_action_click_injects_and_shows() {
        let relay = relay_for("http://127.0.0.1:9").await;
        let tab = relay.browser().open_tab(Page::new("https://a.test/", "<html></html>")).await;

        let state = relay.on_action_clicked(tab).await.unwrap();
        assert_eq!(state, ChatInterfaceState { initialized: true, visible: true });

        let response = relay.handle(Request::ExtractProducts { query: None }).await;
        assert_eq!(
            response,
            Response::Products {
                products: vec![],
                query: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_action_click_skips_non_http() {
        let relay = relay_for("http://127.0.0.1:9").await;
        let tab = relay.browser().open_tab(Page::new("about:blank", "")).await;
        assert!(matches!(
            relay.on_action_clicked(tab).await,
            Err(RelayError::UnsupportedPage(_))
        ));
        relay.on_tab_updated(tab).await;
        assert!(!relay.browser().has_stylesheet(tab).await);
    }
}
