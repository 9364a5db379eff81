//! The content relay: one actor per page that owns the injected chat.
//!
//! The relay answers requests from the popup and background relays through
//! its [`Mailbox`] and reacts to in-page events (typing into the chat,
//! pressing close, the page removing the chat) through a second channel.
//! Asset loading and searches run as spawned tasks that report back as page
//! events, so the relay keeps answering `ping` and `toggleChat` while they
//! are in flight.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use crate::assets::{ChatAssets, ChatMarkup};
use crate::chat::{ChatMessage, ChatView};
use crate::config::Config;
use crate::error::RelayError;
use crate::extract::{extract_with_profiles, Page};
use crate::messages::{ApiReply, ChatInterfaceState, Request, Response, SearchOutcome};
use crate::models::{ProductRecord, SearchQuery, SearchResult};
use crate::profiles::ProfileRegistry;
use crate::runtime::{Envelope, Mailbox};

const EVENT_CAPACITY: usize = 32;

/// Settings shared by every content relay of a browser.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    pub assets: ChatAssets,
    pub results_page_url: String,
    pub registry: Arc<ProfileRegistry>,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ContentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            assets: ChatAssets::from_dir(config.assets_dir.clone()),
            results_page_url: config.results_page_url.clone(),
            registry: Arc::new(ProfileRegistry::default()),
        }
    }
}

/// What a host can observe of the chat on a page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatSnapshot {
    pub state: ChatInterfaceState,
    pub messages: Vec<ChatMessage>,
}

impl ChatSnapshot {
    pub fn is_searching(&self) -> bool {
        self.messages.iter().any(|m| matches!(m, ChatMessage::Typing { .. }))
    }

    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(ChatMessage::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug)]
enum PageEvent {
    UserInput(String),
    BubbleClicked,
    ClosePressed,
    /// The page removed the chat elements.
    InterfaceRemoved,
    InterfaceLoaded {
        generation: u64,
        result: Result<ChatMarkup, RelayError>,
    },
    SearchCompleted {
        generation: u64,
        typing_id: String,
        outcome: SearchOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing { pending_show: bool },
    Ready { visible: bool },
}

/// Handle to a running content relay.
#[derive(Debug, Clone)]
pub struct ContentHandle {
    mailbox: Mailbox,
    events: mpsc::Sender<PageEvent>,
    ready: watch::Receiver<bool>,
    snapshot: watch::Receiver<ChatSnapshot>,
}

impl ContentHandle {
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn is_alive(&self) -> bool {
        !self.mailbox.is_closed()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Waits for the chat interface to finish loading.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), RelayError> {
        let mut ready = self.ready.clone();
        let became_ready = async move { ready.wait_for(|r| *r).await.map(|_| ()) };
        match tokio::time::timeout(timeout, became_ready).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::NoReceiver),
            Err(_) => Err(RelayError::ReadyTimeout(timeout.as_millis() as u64)),
        }
    }

    /// Types `text` into the chat input, presses send and waits until the
    /// conversation has settled.
    pub async fn ask(&self, text: &str, timeout: Duration) -> Result<ChatSnapshot, RelayError> {
        let mut snapshots = self.snapshot.clone();
        let before = snapshots.borrow_and_update().messages.len();
        self.post(PageEvent::UserInput(text.to_string())).await?;

        let settled = async move {
            snapshots
                .wait_for(|s| s.messages.len() > before && !s.is_searching())
                .await
                .map(|snapshot| snapshot.clone())
        };
        match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(snapshot)) => Ok(snapshot),
            Ok(Err(_)) => Err(RelayError::NoReceiver),
            Err(_) => Err(RelayError::Timeout(timeout.as_millis() as u64)),
        }
    }

    pub async fn click_bubble(&self) -> Result<(), RelayError> {
        self.post(PageEvent::BubbleClicked).await
    }

    pub async fn press_close(&self) -> Result<(), RelayError> {
        self.post(PageEvent::ClosePressed).await
    }

    /// Simulates the page removing the chat elements from its DOM.
    pub async fn remove_interface(&self) -> Result<(), RelayError> {
        self.post(PageEvent::InterfaceRemoved).await
    }

    async fn post(&self, event: PageEvent) -> Result<(), RelayError> {
        self.events.send(event).await.map_err(|_| RelayError::NoReceiver)
    }
}

/// Receiving halves of a relay that has been built but not started.
struct Inboxes {
    requests: mpsc::Receiver<Envelope>,
    events: mpsc::Receiver<PageEvent>,
}

pub struct ContentRelay {
    page: Page,
    background: Mailbox,
    options: ContentOptions,
    lifecycle: Lifecycle,
    /// The conversation of the attached chat, if any.
    interface: Option<ChatView>,
    /// Bumped whenever an interface is created or torn down.
    generation: u64,
    events: mpsc::Sender<PageEvent>,
    ready: watch::Sender<bool>,
    snapshot: watch::Sender<ChatSnapshot>,
}

impl ContentRelay {
    /// Injects a content relay into `page`. Chat creation starts right away
    /// with the interface hidden.
    pub fn spawn(page: Page, background: Mailbox, options: ContentOptions) -> ContentHandle {
        let (mut relay, inboxes, handle) = Self::build(page, background, options);
        relay.begin_creation(false);
        tokio::spawn(relay.run(inboxes));
        handle
    }

    fn build(page: Page, background: Mailbox, options: ContentOptions) -> (Self, Inboxes, ContentHandle) {
        let (mailbox, requests) = Mailbox::channel();
        let (events_tx, events) = mpsc::channel(EVENT_CAPACITY);
        let (ready, ready_rx) = watch::channel(false);
        let (snapshot, snapshot_rx) = watch::channel(ChatSnapshot::default());

        let relay = Self {
            page,
            background,
            options,
            lifecycle: Lifecycle::Uninitialized,
            interface: None,
            generation: 0,
            events: events_tx.clone(),
            ready,
            snapshot,
        };
        let handle = ContentHandle {
            mailbox,
            events: events_tx,
            ready: ready_rx,
            snapshot: snapshot_rx,
        };
        (relay, Inboxes { requests, events }, handle)
    }

    async fn run(mut self, mut inboxes: Inboxes) {
        tracing::info!("Content relay started for {}", self.page.url);
        loop {
            // Page events first, so a request sees every event posted before it.
            tokio::select! {
                biased;
                Some(event) = inboxes.events.recv() => self.on_page_event(event),
                envelope = inboxes.requests.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope),
                    None => break,
                },
            }
        }
        tracing::info!("Content relay stopped for {}", self.page.url);
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let Envelope { request, reply } = envelope;
        tracing::debug!("Content relay received {}", request.action());

        let response = match request {
            Request::Ping => Response::Pong,
            Request::ToggleChat => Response::Toggled { state: self.toggle() },
            Request::FocusChat => Response::Toggled { state: self.show() },
            Request::ExtractProducts { query } => Response::Products {
                products: self.extract(),
                query: query.unwrap_or_default(),
            },
            Request::FindProducts => Response::Products {
                products: self.extract(),
                query: String::new(),
            },
            Request::ProcessUserQuery { query } => {
                let task = self.search_task();
                tokio::spawn(async move {
                    let outcome = task.run(&query).await;
                    send_reply(reply, Response::Search(outcome));
                });
                return;
            }
            Request::ApiRequest { .. } => Response::failed("apiRequest must be sent to the background relay"),
        };
        send_reply(reply, response);
    }

    fn on_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::InterfaceLoaded { generation, result } => self.finish_creation(generation, result),
            PageEvent::UserInput(text) => self.submit(&text),
            PageEvent::BubbleClicked => {
                self.show();
            }
            PageEvent::ClosePressed => {
                if let Lifecycle::Ready { visible: true } = self.lifecycle {
                    self.lifecycle = Lifecycle::Ready { visible: false };
                    self.publish();
                }
            }
            PageEvent::InterfaceRemoved => self.teardown(),
            PageEvent::SearchCompleted {
                generation,
                typing_id,
                outcome,
            } => self.finish_search(generation, &typing_id, &outcome),
        }
    }

    /// Results from an interface that has since been torn down are dropped.
    fn finish_search(&mut self, generation: u64, typing_id: &str, outcome: &SearchOutcome) {
        if generation != self.generation {
            tracing::debug!("Chat interface was recreated, dropping result for {}", typing_id);
            return;
        }
        let Some(view) = self.interface.as_mut() else {
            tracing::debug!("Chat interface is gone, dropping result for {}", typing_id);
            return;
        };
        if view.apply_result(typing_id, outcome) {
            self.publish();
        } else {
            tracing::debug!("No pending search {} in the chat", typing_id);
        }
    }

    fn state(&self) -> ChatInterfaceState {
        match self.lifecycle {
            Lifecycle::Ready { visible } => ChatInterfaceState {
                initialized: true,
                visible,
            },
            _ => ChatInterfaceState::default(),
        }
    }

    fn toggle(&mut self) -> ChatInterfaceState {
        match self.lifecycle {
            Lifecycle::Uninitialized => self.begin_creation(true),
            Lifecycle::Initializing { .. } => {
                tracing::debug!("Chat interface is still initializing, showing it once ready");
                self.lifecycle = Lifecycle::Initializing { pending_show: true };
            }
            Lifecycle::Ready { visible } => self.lifecycle = Lifecycle::Ready { visible: !visible },
        }
        self.publish();
        self.state()
    }

    fn show(&mut self) -> ChatInterfaceState {
        match self.lifecycle {
            Lifecycle::Uninitialized => self.begin_creation(true),
            Lifecycle::Initializing { .. } => self.lifecycle = Lifecycle::Initializing { pending_show: true },
            Lifecycle::Ready { .. } => self.lifecycle = Lifecycle::Ready { visible: true },
        }
        self.publish();
        self.state()
    }

    fn begin_creation(&mut self, pending_show: bool) {
        self.generation += 1;
        self.lifecycle = Lifecycle::Initializing { pending_show };
        self.interface = None;

        let generation = self.generation;
        let assets = self.options.assets.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = assets.load().await;
            if events.send(PageEvent::InterfaceLoaded { generation, result }).await.is_err() {
                tracing::debug!("Content relay stopped before the chat interface loaded");
            }
        });
    }

    fn finish_creation(&mut self, generation: u64, result: Result<ChatMarkup, RelayError>) {
        if generation != self.generation {
            tracing::debug!("Discarding chat interface from generation {}", generation);
            return;
        }
        let Lifecycle::Initializing { pending_show } = self.lifecycle else {
            return;
        };

        match result {
            Ok(markup) => {
                tracing::debug!(
                    "Attaching chat markup ({} bytes) and stylesheet ({} bytes)",
                    markup.container.len() + markup.bubble.len(),
                    markup.stylesheet.len()
                );
                self.interface = Some(ChatView::new(self.options.results_page_url.clone()));
                self.lifecycle = Lifecycle::Ready { visible: pending_show };
                self.ready.send_replace(true);
                tracing::info!("Chat interface initialized on {}", self.page.url);
            }
            Err(e) => {
                tracing::error!("Error creating chat interface: {}", e);
                self.lifecycle = Lifecycle::Uninitialized;
            }
        }
        self.publish();
    }

    fn teardown(&mut self) {
        self.generation += 1;
        self.lifecycle = Lifecycle::Uninitialized;
        self.interface = None;
        self.ready.send_replace(false);
        self.publish();
        tracing::debug!("Chat interface removed from {}", self.page.url);
    }

    fn submit(&mut self, text: &str) {
        if self.lifecycle != (Lifecycle::Ready { visible: true }) {
            tracing::debug!("Chat input is not visible, ignoring input");
            return;
        }
        let Some(view) = self.interface.as_mut() else {
            return;
        };

        if let Some(pending) = view.submit(text) {
            let task = self.search_task();
            let events = self.events.clone();
            let generation = self.generation;
            tokio::spawn(async move {
                let outcome = task.run(&pending.query.query).await;
                let event = PageEvent::SearchCompleted {
                    generation,
                    typing_id: pending.typing_id,
                    outcome,
                };
                if events.send(event).await.is_err() {
                    tracing::debug!("Content relay stopped before the search finished");
                }
            });
        }
        self.publish();
    }

    fn extract(&self) -> Vec<ProductRecord> {
        let products = extract_with_profiles(&self.page, &self.options.registry);
        tracing::debug!("Extracted {} products from {}", products.len(), self.page.url);
        products
    }

    fn search_task(&self) -> SearchTask {
        SearchTask {
            page: self.page.clone(),
            background: self.background.clone(),
            registry: self.options.registry.clone(),
        }
    }

    fn publish(&self) {
        let messages = self
            .interface
            .as_ref()
            .map(|view| view.messages().to_vec())
            .unwrap_or_default();
        self.snapshot.send_replace(ChatSnapshot {
            state: self.state(),
            messages,
        });
    }
}

fn send_reply(reply: oneshot::Sender<Response>, response: Response) {
    if reply.send(response).is_err() {
        tracing::debug!("Sender dropped before the response was delivered");
    }
}

/// Scrape, ask the background relay to search, and shape the result.
struct SearchTask {
    page: Page,
    background: Mailbox,
    registry: Arc<ProfileRegistry>,
}

impl SearchTask {
    async fn run(&self, raw_query: &str) -> SearchOutcome {
        let products = extract_with_profiles(&self.page, &self.registry);

        let query = match SearchQuery::new(raw_query) {
            Ok(query) => query.with_products(products).with_site(self.page.host()),
            Err(_) => {
                tracing::debug!("No query provided, returning scraped products only");
                return SearchOutcome {
                    products,
                    ..Default::default()
                };
            }
        };

        match self.search(&query).await {
            Ok(result) => result.into(),
            Err(e) => {
                tracing::error!("Error processing query: {}", e);
                SearchOutcome::failed(e.to_string())
            }
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult, RelayError> {
        let data = serde_json::to_value(query).map_err(|e| RelayError::UnexpectedResponse(e.to_string()))?;
        let response = self
            .background
            .send(Request::ApiRequest {
                endpoint: "search".to_string(),
                data,
            })
            .await?;

        let data = match response {
            Response::Api(ApiReply {
                success: true,
                data: Some(data),
                ..
            }) => data,
            Response::Api(reply) => {
                return Err(RelayError::Remote(
                    reply.error.unwrap_or_else(|| "API request failed".to_string()),
                ))
            }
            Response::Failed { error } => return Err(RelayError::Remote(error)),
            other => return Err(RelayError::UnexpectedResponse(format!("{:?}", other))),
        };

        let result = parse_search_result(data)?;
        if result.is_success() {
            Ok(result)
        } else {
            Err(RelayError::Remote(result.failure_message()))
        }
    }
}

fn parse_search_result(data: Value) -> Result<SearchResult, RelayError> {
    serde_json::from_value(data).map_err(|e| RelayError::UnexpectedResponse(e.to_string()))
}
