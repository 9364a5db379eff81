//! In-process model of the browser hosting the extension: tabs, the active
//! tab, stylesheet and content script injection, and message routing.

use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::content::{ContentHandle, ContentOptions, ContentRelay};
use crate::error::RelayError;
use crate::extract::Page;
use crate::messages::{Request, Response};
use crate::runtime::Mailbox;

pub type TabId = u32;

/// Public view of a tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

struct Tab {
    page: Page,
    stylesheet: bool,
    content: Option<ContentHandle>,
}

#[derive(Default)]
struct BrowserState {
    tabs: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: TabId,
    background: Option<Mailbox>,
}

pub struct Browser {
    state: RwLock<BrowserState>,
    options: ContentOptions,
}

impl Browser {
    pub fn new(options: ContentOptions) -> Self {
        Self {
            state: RwLock::new(BrowserState::default()),
            options,
        }
    }

    /// Opens `page` in a new tab and makes it the active one.
    pub async fn open_tab(&self, page: Page) -> TabId {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;
        tracing::debug!("Opened tab {}: {}", id, page.url);
        state.tabs.insert(
            id,
            Tab {
                page,
                stylesheet: false,
                content: None,
            },
        );
        state.active = Some(id);
        id
    }

    /// Closing a tab stops its content relay.
    pub async fn close_tab(&self, id: TabId) {
        let mut state = self.state.write().await;
        state.tabs.remove(&id);
        if state.active == Some(id) {
            state.active = state.tabs.keys().next_back().copied();
        }
    }

    pub async fn activate(&self, id: TabId) -> Result<(), RelayError> {
        let mut state = self.state.write().await;
        if !state.tabs.contains_key(&id) {
            return Err(RelayError::NoActiveTab);
        }
        state.active = Some(id);
        Ok(())
    }

    pub async fn active_tab(&self) -> Option<TabInfo> {
        let state = self.state.read().await;
        let id = state.active?;
        state.tabs.get(&id).map(|tab| TabInfo {
            id,
            url: tab.page.url.clone(),
        })
    }

    pub async fn page(&self, id: TabId) -> Option<Page> {
        self.state.read().await.tabs.get(&id).map(|tab| tab.page.clone())
    }

    pub async fn has_stylesheet(&self, id: TabId) -> bool {
        self.state
            .read()
            .await
            .tabs
            .get(&id)
            .map(|tab| tab.stylesheet)
            .unwrap_or(false)
    }

    pub async fn insert_css(&self, id: TabId) -> Result<(), RelayError> {
        let mut state = self.state.write().await;
        let tab = injectable_tab(&mut state, id)?;
        tab.stylesheet = true;
        Ok(())
    }

    /// Injects the content script. A tab whose relay is still running keeps it.
    pub async fn execute_content_script(&self, id: TabId) -> Result<ContentHandle, RelayError> {
        let mut state = self.state.write().await;
        let background = state.background.clone().ok_or(RelayError::NoReceiver)?;
        let tab = injectable_tab(&mut state, id)?;

        if let Some(content) = tab.content.as_ref().filter(|c| c.is_alive()) {
            tracing::debug!("Content script already running in tab {}", id);
            return Ok(content.clone());
        }

        let content = ContentRelay::spawn(tab.page.clone(), background, self.options.clone());
        tab.content = Some(content.clone());
        tracing::info!("Injected content script into tab {}", id);
        Ok(content)
    }

    pub async fn content(&self, id: TabId) -> Option<ContentHandle> {
        self.state.read().await.tabs.get(&id).and_then(|tab| tab.content.clone())
    }

    /// Delivers a request to a tab's content relay.
    pub async fn send_to_tab(&self, id: TabId, request: Request) -> Result<Response, RelayError> {
        let mailbox = {
            let state = self.state.read().await;
            state
                .tabs
                .get(&id)
                .and_then(|tab| tab.content.as_ref())
                .map(|content| content.mailbox().clone())
                .ok_or(RelayError::NoReceiver)?
        };
        mailbox.send(request).await
    }

    pub async fn attach_background(&self, mailbox: Mailbox) {
        self.state.write().await.background = Some(mailbox);
    }

    pub async fn send_to_background(&self, request: Request) -> Result<Response, RelayError> {
        let mailbox = self.state.read().await.background.clone().ok_or(RelayError::NoReceiver)?;
        mailbox.send(request).await
    }
}

fn injectable_tab(state: &mut BrowserState, id: TabId) -> Result<&mut Tab, RelayError> {
    let tab = state.tabs.get_mut(&id).ok_or(RelayError::NoActiveTab)?;
    if !tab.page.is_http() {
        return Err(RelayError::UnsupportedPage(tab.page.url.clone()));
    }
    Ok(tab)
}
