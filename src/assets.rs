//! Chat interface assets: the markup and stylesheet injected into a page.

use scraper::{Html, Selector};
use std::path::PathBuf;

use crate::error::RelayError;

const BUNDLED_HTML: &str = include_str!("../assets/chat.html");
const BUNDLED_CSS: &str = include_str!("../assets/chat.css");

/// Where chat assets are loaded from.
#[derive(Debug, Clone)]
pub enum ChatAssets {
    Bundled,
    Dir(PathBuf),
}

/// The pieces of `chat.html` the content relay attaches to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMarkup {
    pub container: String,
    pub bubble: String,
    pub stylesheet: String,
}

impl ChatAssets {
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        dir.map(ChatAssets::Dir).unwrap_or(ChatAssets::Bundled)
    }

    /// Loads the stylesheet, then the markup, and checks the markup has the
    /// elements the relay needs.
    pub async fn load(&self) -> Result<ChatMarkup, RelayError> {
        let (html, stylesheet) = match self {
            ChatAssets::Bundled => (BUNDLED_HTML.to_string(), BUNDLED_CSS.to_string()),
            ChatAssets::Dir(dir) => {
                let stylesheet = tokio::fs::read_to_string(dir.join("chat.css"))
                    .await
                    .map_err(|e| RelayError::Injection(format!("Failed to load chat.css: {}", e)))?;
                let html = tokio::fs::read_to_string(dir.join("chat.html"))
                    .await
                    .map_err(|e| RelayError::Injection(format!("Failed to load chat.html: {}", e)))?;
                (html, stylesheet)
            }
        };

        let (container, bubble) = split_markup(&html)?;
        Ok(ChatMarkup {
            container,
            bubble,
            stylesheet,
        })
    }
}

fn split_markup(html: &str) -> Result<(String, String), RelayError> {
    let document = Html::parse_document(html);
    let container = Selector::parse("#chat-container").expect("static selector");
    let bubble = Selector::parse("#chat-bubble").expect("static selector");

    match (document.select(&container).next(), document.select(&bubble).next()) {
        (Some(container), Some(bubble)) => Ok((container.html(), bubble.html())),
        _ => Err(RelayError::Injection(
            "Required chat elements not found in chat.html".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundled_assets_load() {
        let markup = ChatAssets::Bundled.load().await.unwrap();
        assert!(markup.container.contains("id=\"chat-input\""));
        assert!(markup.bubble.contains("id=\"chat-bubble\""));
        assert!(!markup.stylesheet.is_empty());
    }

    #[tokio::test]
    async fn test_missing_elements_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chat.css"), "body {}").unwrap();
        std::fs::write(dir.path().join("chat.html"), "<div id=\"chat-container\"></div>").unwrap();

        let err = ChatAssets::Dir(dir.path().to_path_buf()).load().await.unwrap_err();
        assert!(err.to_string().contains("Required chat elements not found"));
    }

    #[tokio::test]
    async fn test_missing_stylesheet_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChatAssets::Dir(dir.path().to_path_buf()).load().await.unwrap_err();
        assert!(err.to_string().contains("chat.css"));
    }
}
