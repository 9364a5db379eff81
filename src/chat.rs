//! The in-page chat conversation and its rendering.

use serde::Serialize;
use uuid::Uuid;

use crate::messages::SearchOutcome;
use crate::models::{ProductRecord, SearchQuery};
use crate::render::{chat_product_card, escape_html, results_url, PREVIEW_COUNT};

pub const GREETING: &str = "Hi! How can I help you find products today?";
pub const NO_MATCHES: &str = "I couldn't find any products matching your search. Try different keywords.";
pub const ERROR_PREFIX: &str = "Sorry, I encountered an error while processing your request. ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatMessage {
    Text { speaker: Speaker, text: String },
    /// "Searching..." placeholder for one pending request.
    Typing { id: String },
    Products {
        /// At most [`PREVIEW_COUNT`] products.
        preview: Vec<ProductRecord>,
        total: usize,
        view_all_url: Option<String>,
    },
}

impl ChatMessage {
    fn bot(text: impl Into<String>) -> Self {
        ChatMessage::Text {
            speaker: Speaker::Bot,
            text: text.into(),
        }
    }

    /// Plain-text form, for terminals and logs.
    pub fn plain_text(&self) -> String {
        match self {
            ChatMessage::Text { speaker: Speaker::User, text } => format!("you: {}", text),
            ChatMessage::Text { speaker: Speaker::Bot, text } => format!("bot: {}", text),
            ChatMessage::Typing { .. } => "bot: Searching...".to_string(),
            ChatMessage::Products { preview, total, view_all_url } => {
                let mut lines = vec!["bot: Here are some products that match your search:".to_string()];
                for product in preview {
                    let price = product.price.as_deref().unwrap_or("N/A");
                    lines.push(format!("  - {} ({}) {}", product.title, price, product.url));
                }
                if let Some(url) = view_all_url {
                    lines.push(format!("  View All {} Products: {}", total, url));
                }
                lines.join("\n")
            }
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            ChatMessage::Text { speaker, text } => {
                let class = match speaker {
                    Speaker::User => "user",
                    Speaker::Bot => "bot",
                };
                format!(
                    r#"<div class="message {}"><div class="message-content">{}</div></div>"#,
                    class,
                    escape_html(text)
                )
            }
            ChatMessage::Typing { id } => format!(
                concat!(
                    r#"<div class="message bot"><div class="typing-indicator" id="{}">"#,
                    r#"<div class="typing-dot"></div><div class="typing-dot"></div><div class="typing-dot"></div>"#,
                    "</div></div>"
                ),
                escape_html(id)
            ),
            ChatMessage::Products { preview, total, view_all_url } => {
                let cards: String = preview.iter().map(chat_product_card).collect();
                let view_all = match view_all_url {
                    Some(url) => format!(
                        r#"<div class="view-all-container"><a class="view-all-btn" href="{}" target="_blank">View All {} Products</a></div>"#,
                        escape_html(url),
                        total
                    ),
                    None => String::new(),
                };
                format!(
                    concat!(
                        r#"<div class="message bot"><div class="message-content">"#,
                        "Here are some products that match your search:",
                        r#"<div class="products-container">{}</div>{}</div></div>"#
                    ),
                    cards, view_all
                )
            }
        }
    }
}

/// A search the view wants the content relay to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSearch {
    pub query: SearchQuery,
    pub typing_id: String,
}

/// Conversation state of one chat interface.
#[derive(Debug, Clone)]
pub struct ChatView {
    messages: Vec<ChatMessage>,
    results_page_url: String,
}

impl ChatView {
    pub fn new(results_page_url: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::bot(GREETING)],
            results_page_url: results_page_url.into(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Handles the send button. Blank input only produces a local prompt.
    pub fn submit(&mut self, input: &str) -> Option<PendingSearch> {
        let query = match SearchQuery::new(input) {
            Ok(query) => query,
            Err(e) => {
                self.messages.push(ChatMessage::bot(e.to_string()));
                return None;
            }
        };

        self.messages.push(ChatMessage::Text {
            speaker: Speaker::User,
            text: query.query.clone(),
        });
        let typing_id = format!("typing-{}", Uuid::new_v4());
        self.messages.push(ChatMessage::Typing { id: typing_id.clone() });

        Some(PendingSearch { query, typing_id })
    }

    /// Renders the outcome of the search started with `typing_id`. Returns
    /// false, leaving the conversation untouched, when that search is not
    /// pending in this view.
    pub fn apply_result(&mut self, typing_id: &str, outcome: &SearchOutcome) -> bool {
        let before = self.messages.len();
        self.messages
            .retain(|m| !matches!(m, ChatMessage::Typing { id } if id == typing_id));
        if self.messages.len() == before {
            return false;
        }

        if let Some(error) = &outcome.error {
            self.messages.push(ChatMessage::bot(format!("{}{}", ERROR_PREFIX, error)));
            return true;
        }

        if outcome.products.is_empty() {
            self.messages.push(ChatMessage::bot(NO_MATCHES));
            return true;
        }

        let total = outcome.products.len();
        let view_all_url = (total > PREVIEW_COUNT)
            .then(|| results_url(&self.results_page_url, &outcome.products, &outcome.recommendations));
        self.messages.push(ChatMessage::Products {
            preview: outcome.products.iter().take(PREVIEW_COUNT).cloned().collect(),
            total,
            view_all_url,
        });
        true
    }

    /// True while any search is still waiting for its result.
    pub fn is_searching(&self) -> bool {
        self.messages.iter().any(|m| matches!(m, ChatMessage::Typing { .. }))
    }

    /// Markup of `#chat-messages`.
    pub fn render_html(&self) -> String {
        self.messages.iter().map(ChatMessage::to_html).collect()
    }
}
