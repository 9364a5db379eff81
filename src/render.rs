//! HTML fragments for product cards and the link to the full results view.

use crate::models::ProductRecord;

/// Number of products shown inline in a chat message.
pub const PREVIEW_COUNT: usize = 2;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Card used inside a chat message.
pub fn chat_product_card(product: &ProductRecord) -> String {
    let title = escape_html(&product.title);
    let url = escape_html(&product.url);
    let store = if product.source.is_empty() {
        "Store".to_string()
    } else {
        escape_html(&product.source)
    };

    let mut html = String::from(r#"<div class="product-item"><div class="product-content">"#);
    html.push_str(&image_block(product));
    html.push_str(&format!(
        r#"<div class="product-details"><h3 class="product-title">{}</h3>"#,
        title
    ));
    html.push_str(&price_and_source(product));
    html.push_str(&format!(
        r#"<a href="{}" target="_blank" rel="noopener noreferrer" class="view-product-btn">View on {}</a></div></div>"#,
        url, store
    ));
    if !product.url.is_empty() {
        html.push_str(&format!(
            r#"<div class="product-url"><a href="{0}" target="_blank" rel="noopener noreferrer">{0}</a></div>"#,
            url
        ));
    }
    html.push_str("</div>");
    html
}

/// Card used on the full results page.
pub fn results_product_card(product: &ProductRecord) -> String {
    let url = escape_html(&product.url);
    format!(
        concat!(
            r#"<div class="product-card">{image}<div class="product-details">"#,
            r#"<h3 class="product-title"><a href="{url}" target="_blank" rel="noopener noreferrer">{title}</a></h3>"#,
            r#"{meta}<a href="{url}" target="_blank" rel="noopener noreferrer" class="view-product-btn">View Product</a>"#,
            "</div></div>"
        ),
        image = image_block(product),
        url = url,
        title = escape_html(&product.title),
        meta = price_and_source(product),
    )
}

fn image_block(product: &ProductRecord) -> String {
    match &product.image {
        Some(src) => format!(
            r#"<div class="product-image"><img src="{}" alt="{}"></div>"#,
            escape_html(src),
            escape_html(&product.title)
        ),
        None => String::new(),
    }
}

fn price_and_source(product: &ProductRecord) -> String {
    let mut html = String::new();
    if let Some(price) = &product.price {
        html.push_str(&format!(r#"<div class="product-price">{}</div>"#, escape_html(price)));
    }
    if !product.source.is_empty() {
        html.push_str(&format!(r#"<div class="product-source">{}</div>"#, escape_html(&product.source)));
    }
    html
}

/// Link to the full results view, carrying both lists as URL-encoded JSON.
pub fn results_url(base: &str, products: &[ProductRecord], recommendations: &[ProductRecord]) -> String {
    let encode = |list: &[ProductRecord]| {
        let json = serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string());
        urlencoding::encode(&json).into_owned()
    };
    format!(
        "{}?searchResults={}&recommendations={}",
        base,
        encode(products),
        encode(recommendations)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape_html(r#"<b>"Tom & Jerry's"</b>"#), "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_chat_card_fields() {
        let product = ProductRecord::new("Mouse <Pro>", "https://a.test/m", "Amazon").with_price("$20");
        let html = chat_product_card(&product);
        assert!(html.contains("Mouse &lt;Pro&gt;"));
        assert!(html.contains(r#"<div class="product-price">$20</div>"#));
        assert!(html.contains("View on Amazon"));
        assert!(!html.contains("product-image"));
    }

    #[test]
    fn test_chat_card_without_source() {
        let product = ProductRecord::new("Lamp", "https://a.test/l", "");
        assert!(chat_product_card(&product).contains("View on Store"));
    }

    #[test]
    fn test_results_url_encodes_json() {
        let products = vec![ProductRecord::new("A & B", "https://a.test/?x=1", "Shop")];
        let url = results_url("http://127.0.0.1:5202/product_list", &products, &[]);
        assert!(url.starts_with("http://127.0.0.1:5202/product_list?searchResults=%5B%7B"));
        assert!(url.ends_with("&recommendations=%5B%5D"));
        assert!(!url.contains(' '));
        assert!(!url["http://".len()..].contains("&B"));
    }
}
