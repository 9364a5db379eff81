//! Product extraction from a page's DOM.

use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

use crate::models::ProductRecord;
use crate::profiles::{ProfileRegistry, SiteProfile};

/// A loaded page: its address and an HTML snapshot of the DOM.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: Arc<str>,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<Arc<str>>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn is_http(&self) -> bool {
        is_http_url(&self.url)
    }
}

/// Only http(s) pages can host the chat.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Extracts products using the built-in profiles.
pub fn extract_products_from_page(page: &Page) -> Vec<ProductRecord> {
    extract_with_profiles(page, &ProfileRegistry::default())
}

/// Runs every profile in order and concatenates what they find.
pub fn extract_with_profiles(page: &Page, registry: &ProfileRegistry) -> Vec<ProductRecord> {
    let document = Html::parse_document(&page.html);
    let base = Url::parse(&page.url).ok();
    let host = page.host();

    let mut products = Vec::new();
    for profile in registry.iter() {
        let before = products.len();
        for element in document.select(&profile.item) {
            if let Some(record) = extract_record(element, profile, base.as_ref(), &host) {
                products.push(record);
            }
        }
        tracing::debug!("Profile {} matched {} products", profile.name, products.len() - before);
    }
    products
}

fn extract_record(
    element: ElementRef<'_>,
    profile: &SiteProfile,
    base: Option<&Url>,
    host: &str,
) -> Option<ProductRecord> {
    let title = first_text(element, &profile.title)?;
    let url = first_attr(element, &profile.link, "href").and_then(|href| resolve(base, &href))?;

    Some(ProductRecord {
        title,
        price: first_text(element, &profile.price),
        url,
        image: profile
            .image
            .as_ref()
            .and_then(|sel| first_attr(element, sel, "src"))
            .and_then(|src| resolve(base, &src)),
        source: profile.source_for(host),
        description: None,
    })
}

/// Whitespace-normalised text of the first match, if non-empty.
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = element
        .select(selector)
        .next()?
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_attr(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()?
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolves `href` against the page like the DOM's `a.href` does.
fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href).ok()?.to_string(),
        None => Url::parse(href).ok()?.to_string(),
    };
    if resolved.is_empty() {
        None
    } else {
        Some(resolved)
    }
}
