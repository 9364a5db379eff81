//! HTTP client for the product search backend.

use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{SearchQuery, SearchResult};

/// Client for the backend's `/api/*` and `/test` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    extension_id: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            extension_id: config.extension_id.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Declared method and URL for an endpoint name.
    pub fn route(&self, endpoint: &str) -> (Method, String) {
        if endpoint == "test" {
            (Method::GET, format!("{}/test", self.base_url))
        } else {
            (Method::POST, format!("{}/api/{}", self.base_url, endpoint))
        }
    }

    /// Performs an extension API call.
    ///
    /// POST endpoints get a best-effort preflight first. A 405 answer is
    /// retried once as a GET with the payload flattened into the query string;
    /// every other non-success status fails the call.
    pub async fn request(&self, endpoint: &str, payload: &Value) -> Result<Value, ApiError> {
        let (method, url) = self.route(endpoint);

        if method == Method::GET {
            let response = self.send(self.client.get(&url), &url).await?;
            return read_json(ensure_success(response)?).await;
        }

        self.preflight(&url).await;

        let body = self.tag_payload(payload);
        let response = self.send(self.client.post(&url).json(&body), &url).await?;

        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            tracing::warn!("POST {} rejected with 405, retrying as GET", url);
            let params = flatten_params(payload);
            let retry = self.send(self.client.get(&url).query(&params), &url).await?;
            return read_json(ensure_success(retry)?).await;
        }

        read_json(ensure_success(response)?).await
    }

    /// Direct search call, used by the standalone chat page.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, ApiError> {
        let (_, url) = self.route("search");
        let response = self.send(self.client.post(&url).json(query), &url).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Decode(e.to_string()))?;

        // The backend reports search failures in the body, so a parseable
        // body wins over the HTTP status.
        match serde_json::from_str::<SearchResult>(&body) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(ApiError::Status(status.as_u16())),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }

    /// Liveness probe against `GET /test`.
    pub async fn health_check(&self) -> Result<Value, ApiError> {
        self.request("test", &Value::Null).await
    }

    async fn preflight(&self, url: &str) {
        match self
            .client
            .request(Method::OPTIONS, url)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
        {
            Ok(response) => tracing::debug!("Preflight {} -> {}", url, response.status()),
            Err(e) => tracing::info!("Preflight request failed, continuing with main request: {}", e),
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, url: &str) -> Result<Response, ApiError> {
        builder.send().await.map_err(|source| {
            tracing::error!("API request to {} failed: {}", url, source);
            ApiError::Network {
                url: self.base_url.clone(),
                source,
            }
        })
    }

    fn tag_payload(&self, payload: &Value) -> Value {
        let mut body = match payload {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        body.insert("_source".to_string(), Value::from("chrome-extension"));
        body.insert("_extensionId".to_string(), Value::from(self.extension_id.clone()));
        Value::Object(body)
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::error!("API request failed with status {}", status);
        Err(ApiError::Status(status.as_u16()))
    }
}

async fn read_json(response: Response) -> Result<Value, ApiError> {
    response.json::<Value>().await.map_err(|e| ApiError::Decode(e.to_string()))
}

/// Top-level payload fields as query parameters. Scalars are written as-is,
/// nested values as compact JSON.
pub fn flatten_params(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
