//! Selector profiles: per-site rules for finding product listings in a page.

use once_cell::sync::Lazy;
use scraper::Selector;

use crate::error::RelayError;

/// How records found by a profile are labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLabel {
    Fixed(String),
    /// Use the host name of the page being scraped.
    PageHost,
}

/// One named set of DOM query rules.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    /// Matches the listing elements; each match is one candidate product.
    pub item: Selector,
    pub title: Selector,
    pub price: Selector,
    pub link: Selector,
    pub image: Option<Selector>,
    pub source: SourceLabel,
}

impl SiteProfile {
    /// Builds a profile from CSS selector strings.
    pub fn parse(
        name: &str,
        item: &str,
        title: &str,
        price: &str,
        link: &str,
        source: SourceLabel,
    ) -> Result<Self, RelayError> {
        Ok(Self {
            name: name.to_string(),
            item: parse_selector(item)?,
            title: parse_selector(title)?,
            price: parse_selector(price)?,
            link: parse_selector(link)?,
            image: None,
            source,
        })
    }

    pub fn with_image(mut self, image: &str) -> Result<Self, RelayError> {
        self.image = Some(parse_selector(image)?);
        Ok(self)
    }

    pub fn source_for(&self, page_host: &str) -> String {
        match &self.source {
            SourceLabel::Fixed(label) => label.clone(),
            SourceLabel::PageHost => page_host.to_string(),
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector, RelayError> {
    Selector::parse(css).map_err(|_| RelayError::Selector(css.to_string()))
}

/// Ordered list of profiles. Every profile runs; order decides output order.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<SiteProfile>,
}

impl ProfileRegistry {
    pub fn empty() -> Self {
        Self { profiles: Vec::new() }
    }

    pub fn push(&mut self, profile: SiteProfile) {
        self.profiles.push(profile);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        BUILTIN_PROFILES.clone()
    }
}

/// Amazon and eBay search listings, then the generic class-name fallback.
pub static BUILTIN_PROFILES: Lazy<ProfileRegistry> = Lazy::new(|| {
    let profiles = vec![
        SiteProfile::parse(
            "amazon",
            r#".s-result-item[data-component-type="s-search-result"]"#,
            "h2, h3, .a-text-normal",
            ".a-price-whole, .a-price",
            "a.a-link-normal",
            SourceLabel::Fixed("Amazon".to_string()),
        )
        .and_then(|p| p.with_image("img.s-image")),
        SiteProfile::parse(
            "ebay",
            ".s-item",
            ".s-item__title",
            ".s-item__price",
            "a.s-item__link",
            SourceLabel::Fixed("eBay".to_string()),
        )
        .and_then(|p| p.with_image(".s-item__image img")),
        SiteProfile::parse(
            "generic",
            ".product, .item, .card, .product-item, [data-product], [data-item]",
            "h2, h3, .title, .name",
            ".price, .amount, .cost",
            "a",
            SourceLabel::PageHost,
        )
        .and_then(|p| p.with_image("img")),
    ];

    ProfileRegistry {
        profiles: profiles
            .into_iter()
            .map(|p| p.expect("built-in selector profiles are valid CSS"))
            .collect(),
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let names: Vec<_> = BUILTIN_PROFILES.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["amazon", "ebay", "generic"]);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let err = SiteProfile::parse("broken", "div[", "h2", ".price", "a", SourceLabel::PageHost).unwrap_err();
        assert!(matches!(err, RelayError::Selector(ref css) if css == "div["));
    }

    #[test]
    fn test_source_label() {
        let amazon = BUILTIN_PROFILES.iter().next().unwrap();
        assert_eq!(amazon.source_for("shop.test"), "Amazon");
        let generic = BUILTIN_PROFILES.iter().last().unwrap();
        assert_eq!(generic.source_for("shop.test"), "shop.test");
    }

    #[test]
    fn test_registry_is_open() {
        let mut registry = ProfileRegistry::default();
        let custom = SiteProfile::parse(
            "bookshop",
            "li.book",
            ".book-title",
            ".book-price",
            "a.book-link",
            SourceLabel::Fixed("Bookshop".to_string()),
        )
        .unwrap();
        registry.push(custom);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.iter().last().unwrap().name, "bookshop");
    }
}
