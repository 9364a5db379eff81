//! Product finder: an in-page chat that scrapes product listings from the
//! current page, asks a search backend for matches and renders the results.
//!
//! The extension's contexts run as separate tasks that only talk through
//! [`messages::Request`] / [`messages::Response`] pairs:
//! the [`background`] relay owns network access, one [`content`] relay per
//! tab owns the injected chat, and the [`popup`] controller starts things.

pub mod api;
pub mod assets;
pub mod background;
pub mod browser;
pub mod chat;
pub mod config;
pub mod content;
pub mod error;
pub mod extension;
pub mod extract;
pub mod messages;
pub mod models;
pub mod popup;
pub mod profiles;
pub mod render;
pub mod results_view;
pub mod runtime;
pub mod server;
pub mod standalone;
