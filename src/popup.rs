//! The toolbar popup: probes the active tab, injects the content script when
//! it is missing, and toggles the chat.

use std::sync::Arc;
use std::time::Duration;

use crate::browser::{Browser, TabInfo};
use crate::error::RelayError;
use crate::extract::is_http_url;
use crate::messages::{Request, Response};

pub const LABEL_INITIALIZE: &str = "Initialize Chat";
pub const LABEL_OPEN: &str = "Open Chat";
pub const STATUS_SWITCH_TAB: &str = "Switch to a webpage to chat";
pub const STATUS_READY: &str = "Ready to chat!";
pub const STATUS_NEEDS_INIT: &str = "Click to initialize chat";
pub const STATUS_OPENING: &str = "Opening...";
pub const STATUS_LOAD_FAILED: &str = "Error: Could not load chat. Please refresh the page and try again.";
pub const STATUS_OPEN_FAILED: &str = "Failed to open chat. Please refresh the page and try again.";
pub const STATUS_GENERIC_ERROR: &str = "An error occurred. Please try again.";

/// What the popup shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupView {
    pub button_label: String,
    pub status: String,
    pub is_error: bool,
}

impl PopupView {
    fn info(label: &str, status: &str) -> Self {
        Self {
            button_label: label.to_string(),
            status: status.to_string(),
            is_error: false,
        }
    }
}

/// Result of pressing the popup button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The chat was toggled and the popup closed itself.
    Closed,
    /// The popup stays open showing an error.
    Error(String),
}

pub struct PopupController {
    browser: Arc<Browser>,
    ready_timeout: Duration,
}

impl PopupController {
    pub fn new(browser: Arc<Browser>, ready_timeout: Duration) -> Self {
        Self { browser, ready_timeout }
    }

    /// Runs when the popup opens: reports whether the chat is reachable.
    pub async fn open(&self) -> PopupView {
        let Some(tab) = self.injectable_tab().await else {
            return PopupView::info(LABEL_INITIALIZE, STATUS_SWITCH_TAB);
        };

        match self.browser.send_to_tab(tab.id, Request::Ping).await {
            Ok(Response::Pong) => {
                tracing::debug!("Content script is ready");
                PopupView::info(LABEL_OPEN, STATUS_READY)
            }
            Ok(other) => {
                tracing::debug!("Unexpected ping response: {:?}", other);
                PopupView::info(LABEL_INITIALIZE, STATUS_NEEDS_INIT)
            }
            Err(e) => {
                tracing::debug!("Content script not ready: {}", e);
                PopupView::info(LABEL_INITIALIZE, STATUS_NEEDS_INIT)
            }
        }
    }

    /// The "Open Chat" button.
    pub async fn click_open_chat(&self) -> ClickOutcome {
        tracing::debug!("{}", STATUS_OPENING);
        let Some(tab) = self.browser.active_tab().await else {
            return ClickOutcome::Error(STATUS_GENERIC_ERROR.to_string());
        };

        if !matches!(self.browser.send_to_tab(tab.id, Request::Ping).await, Ok(Response::Pong)) {
            tracing::debug!("Injecting content script and CSS into tab {}", tab.id);
            if let Err(e) = self.inject(&tab).await {
                tracing::error!("Failed to inject or toggle chat: {}", e);
                return ClickOutcome::Error(STATUS_LOAD_FAILED.to_string());
            }
        }

        match self.browser.send_to_tab(tab.id, Request::ToggleChat).await {
            Ok(Response::Toggled { state }) if state.initialized => {
                tracing::debug!("Toggle response: {:?}", state);
                ClickOutcome::Closed
            }
            Ok(Response::Toggled { .. }) => match self.await_creation(&tab).await {
                Ok(()) => ClickOutcome::Closed,
                Err(e) => {
                    tracing::error!("Chat did not finish loading: {}", e);
                    ClickOutcome::Error(STATUS_LOAD_FAILED.to_string())
                }
            },
            Ok(other) => {
                tracing::error!("Unexpected toggle response: {:?}", other);
                ClickOutcome::Error(STATUS_OPEN_FAILED.to_string())
            }
            Err(e) => {
                tracing::error!("Failed to toggle chat: {}", e);
                ClickOutcome::Error(STATUS_LOAD_FAILED.to_string())
            }
        }
    }

    async fn inject(&self, tab: &TabInfo) -> Result<(), RelayError> {
        self.browser.insert_css(tab.id).await?;
        let content = self.browser.execute_content_script(tab.id).await?;
        content.wait_ready(self.ready_timeout).await
    }

    /// The toggle started creating the chat, which shows itself once loaded.
    async fn await_creation(&self, tab: &TabInfo) -> Result<(), RelayError> {
        let content = self.browser.content(tab.id).await.ok_or(RelayError::NoReceiver)?;
        content.wait_ready(self.ready_timeout).await
    }

    async fn injectable_tab(&self) -> Option<TabInfo> {
        let tab = self.browser.active_tab().await?;
        if is_http_url(&tab.url) {
            Some(tab)
        } else {
            tracing::debug!("Cannot inject into this page type: {}", tab.url);
            None
        }
    }
}
