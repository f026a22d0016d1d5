use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::valuation::tools::error::{Result, ToolError};
use crate::valuation::tools::io::deep_search::parse_deep_search;
use crate::valuation::tools::model::{PropertyQuery, RawRecord, json_kind};

/// Deep-search endpoint queried when no other endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://www.zillow.com/webservice/GetDeepSearchResults.htm";

/// Per-call timeout applied when no other value is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of raw valuation responses.
pub trait ValuationClient {
    /// Retrieves the raw response for a single property.
    fn fetch(&self, query: &PropertyQuery) -> Result<RawRecord>;
}

/// Blocking HTTP client for the deep-search endpoint.
pub struct HttpValuationClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpValuationClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ToolError::InvalidInput("API key is empty".into()));
        }

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

impl ValuationClient for HttpValuationClient {
    #[instrument(level = "debug", skip_all, fields(address = %query.address))]
    fn fetch(&self, query: &PropertyQuery) -> Result<RawRecord> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("zws-id", self.api_key.as_str()),
                ("address", query.address.as_str()),
                ("citystatezip", query.zipcode.as_str()),
            ])
            .send()?;

        let status = response.status();
        debug!(status = status.as_u16(), "provider responded");
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ToolError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text()?;
        decode_body(&body)
    }
}

/// Decodes a provider reply. The deep-search service answers in XML; JSON
/// services returning the section layout directly are accepted as well.
pub fn decode_body(body: &str) -> Result<RawRecord> {
    if body.trim_start().starts_with('<') {
        parse_deep_search(body)
    } else {
        let document: Value = serde_json::from_str(body)?;
        RawRecord::from_json(document)
    }
}

/// Client that replays canned responses keyed by address.
#[derive(Debug, Clone, Default)]
pub struct FixtureClient {
    responses: BTreeMap<String, Value>,
}

impl FixtureClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads fixtures from a JSON object mapping addresses to raw responses.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&source)?;
        Self::from_json(document)
    }

    pub fn from_json(document: Value) -> Result<Self> {
        match document {
            Value::Object(map) => Ok(Self {
                responses: map.into_iter().collect(),
            }),
            other => Err(ToolError::InvalidInput(format!(
                "fixtures must be a JSON object keyed by address, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn insert(&mut self, address: impl Into<String>, response: Value) {
        self.responses.insert(address.into(), response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl ValuationClient for FixtureClient {
    fn fetch(&self, query: &PropertyQuery) -> Result<RawRecord> {
        let document = self
            .responses
            .get(&query.address)
            .cloned()
            .ok_or_else(|| ToolError::Provider {
                status: 404,
                message: format!("no fixture for address '{}'", query.address),
            })?;
        RawRecord::from_json(document)
    }
}
