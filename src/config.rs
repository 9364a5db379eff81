//! Runtime configuration, read from the environment (and `.env` via dotenv).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5201";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5202";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the search backend, without trailing slash.
    pub backend_url: String,
    /// Identifier sent as `_extensionId` with every API request.
    pub extension_id: String,
    pub request_timeout: Duration,
    /// Upper bound for the popup's readiness wait after injection.
    pub ready_timeout: Duration,
    /// Where "View All" links point; the results view is served here.
    pub results_page_url: String,
    pub listen_addr: String,
    /// Chat markup/stylesheet directory. `None` uses the bundled assets.
    pub assets_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            extension_id: "product-finder".to_string(),
            request_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_millis(2000),
            results_page_url: format!("http://{}/product_list", DEFAULT_LISTEN_ADDR),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            assets_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let listen_addr = env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr);

        Self {
            backend_url: env::var("BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            extension_id: env::var("EXTENSION_ID").unwrap_or(defaults.extension_id),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 30)),
            ready_timeout: Duration::from_millis(env_or("READY_TIMEOUT_MS", 2000)),
            results_page_url: env::var("RESULTS_PAGE_URL")
                .unwrap_or_else(|_| format!("http://{}/product_list", listen_addr)),
            listen_addr,
            assets_dir: env::var("CHAT_ASSETS_DIR").ok().map(PathBuf::from),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:5201");
        assert_eq!(config.ready_timeout, Duration::from_millis(2000));
        assert_eq!(config.results_page_url, "http://127.0.0.1:5202/product_list");
        assert!(config.assets_dir.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("PRODUCT_FINDER_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("PRODUCT_FINDER_TEST_NUMBER", 7u64), 7);
        env::set_var("PRODUCT_FINDER_TEST_NUMBER", " 42 ");
        assert_eq!(env_or("PRODUCT_FINDER_TEST_NUMBER", 7u64), 42);
        env::remove_var("PRODUCT_FINDER_TEST_NUMBER");
    }
}
