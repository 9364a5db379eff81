use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use product_finder::api::ApiClient;
use product_finder::config::Config;
use product_finder::extension::Extension;
use product_finder::extract::{extract_products_from_page, is_http_url, Page};
use product_finder::popup::ClickOutcome;
use product_finder::server;

/// Product finder CLI.
#[derive(Parser)]
#[command(name = "product-finder")]
#[command(about = "Find products on a page through the in-page chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the results view, the standalone search page and the chat assets
    Serve,

    /// Print the products found on a page as JSON
    Scrape {
        /// HTML file or http(s) URL
        page: String,

        /// Address of a page read from a file, used to resolve links
        #[arg(long, default_value = "http://localhost/")]
        url: String,
    },

    /// Open the chat on a page and ask it for products
    Search {
        /// HTML file or http(s) URL
        page: String,

        /// What to look for
        query: String,

        /// Address of a page read from a file, used to resolve links
        #[arg(long, default_value = "http://localhost/")]
        url: String,
    },

    /// Check that the backend answers on /test
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Serve => server::serve(&config).await?,
        Commands::Scrape { page, url } => {
            let page = load_page(&page, &url, &config).await?;
            let products = extract_products_from_page(&page);
            println!("{}", serde_json::to_string_pretty(&products)?);
        }
        Commands::Search { page, query, url } => search(config, &page, &url, &query).await?,
        Commands::Ping => {
            let api = ApiClient::new(&config)?;
            let body = api.health_check().await?;
            println!("{} is up: {}", api.base_url(), body);
        }
    }

    Ok(())
}

async fn search(config: Config, source: &str, url: &str, query: &str) -> anyhow::Result<()> {
    let page = load_page(source, url, &config).await?;
    let timeout = config.request_timeout + config.ready_timeout;
    let extension = Extension::install(config).await?;
    let tab = extension.open_page(page).await;

    let popup = extension.popup();
    let view = popup.open().await;
    tracing::info!("Popup: [{}] {}", view.button_label, view.status);
    if let ClickOutcome::Error(message) = popup.click_open_chat().await {
        bail!(message);
    }

    let content = extension
        .browser()
        .content(tab)
        .await
        .context("content script is not running")?;
    let snapshot = content.ask(query, timeout).await?;
    println!("{}", snapshot.transcript());
    Ok(())
}

/// Reads a page from an http(s) URL or from a local HTML file.
async fn load_page(source: &str, url: &str, config: &Config) -> anyhow::Result<Page> {
    if is_http_url(source) {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let response = client.get(source).send().await?.error_for_status()?;
        let final_url = response.url().to_string();
        let html = response.text().await?;
        return Ok(Page::new(final_url, html));
    }

    let path = PathBuf::from(source);
    let html = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Page::new(url, html))
}
