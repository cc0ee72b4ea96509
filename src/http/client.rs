//! HTTP page fetcher for JSON endpoints
//!
//! Provides a `PageFetcher` over reqwest that handles:
//! - Locator and query parameter templating per work unit
//! - Page number, offset and cursor query parameters
//! - Rate-limit detection (HTTP 429) reported as an outcome
//! - Record extraction through JSON pointers

use crate::error::{Error, Result};
use crate::planner::WorkUnit;
use crate::source::{FetchOutcome, Page, PageFetcher, PageRequest};
use crate::template::{self, TemplateContext};
use crate::types::{JsonValue, PaginationKind};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest error body kept in an `HttpStatus` error
const MAX_ERROR_BODY: usize = 512;

/// Names of the query parameters that carry pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationParams {
    /// Page number parameter
    pub page: String,
    /// Page size parameter
    pub limit: String,
    /// Offset parameter
    pub offset: String,
    /// Cursor parameter
    pub cursor: String,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: "page".to_string(),
            limit: "limit".to_string(),
            offset: "offset".to_string(),
            cursor: "cursor".to_string(),
        }
    }
}

/// Configuration for the HTTP page fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Headers sent with every request (values are templates)
    pub headers: BTreeMap<String, String>,
    /// Extra query parameters (values are templates)
    pub query: BTreeMap<String, String>,
    /// Job-level template variables
    pub vars: JsonValue,
    /// How pages are addressed
    pub pagination: PaginationKind,
    /// Pagination parameter names
    pub params: PaginationParams,
    /// JSON pointer to the record array
    pub records_pointer: String,
    /// JSON pointer to the total page count
    pub total_pages_pointer: Option<String>,
    /// JSON pointer to the next cursor
    pub cursor_pointer: Option<String>,
    /// JSON pointer to a "has more pages" flag
    pub has_more_pointer: Option<String>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("harvester/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            vars: JsonValue::Null,
            pagination: PaginationKind::PageNumber,
            params: PaginationParams::default(),
            records_pointer: "/results".to_string(),
            total_pages_pointer: None,
            cursor_pointer: None,
            has_more_pointer: None,
        }
    }
}

impl HttpFetcherConfig {
    /// Create a new config builder
    pub fn builder() -> HttpFetcherConfigBuilder {
        HttpFetcherConfigBuilder::default()
    }
}

/// Builder for HTTP fetcher config
#[derive(Default)]
pub struct HttpFetcherConfigBuilder {
    config: HttpFetcherConfig,
}

impl HttpFetcherConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query.insert(key.into(), value.into());
        self
    }

    /// Set job-level template variables
    pub fn vars(mut self, vars: JsonValue) -> Self {
        self.config.vars = vars;
        self
    }

    /// Set the pagination kind
    pub fn pagination(mut self, kind: PaginationKind) -> Self {
        self.config.pagination = kind;
        self
    }

    /// Set the pagination parameter names
    pub fn params(mut self, params: PaginationParams) -> Self {
        self.config.params = params;
        self
    }

    /// Set the records pointer
    pub fn records_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.config.records_pointer = pointer.into();
        self
    }

    /// Set the total pages pointer
    pub fn total_pages_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.config.total_pages_pointer = Some(pointer.into());
        self
    }

    /// Set the next cursor pointer
    pub fn cursor_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.config.cursor_pointer = Some(pointer.into());
        self
    }

    /// Set the has-more pointer
    pub fn has_more_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.config.has_more_pointer = Some(pointer.into());
        self
    }

    /// Build the config
    pub fn build(self) -> HttpFetcherConfig {
        self.config
    }
}

/// `PageFetcher` for paginated JSON endpoints
pub struct HttpPageFetcher {
    client: Client,
    config: HttpFetcherConfig,
}

impl HttpPageFetcher {
    /// Create a fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    /// Create a fetcher with custom configuration
    pub fn with_config(config: HttpFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpFetcherConfig {
        &self.config
    }

    fn context(&self, unit: &WorkUnit) -> TemplateContext {
        TemplateContext::for_unit(unit).with_vars(self.config.vars.clone())
    }

    /// Build the URL of one page request
    pub fn build_url(&self, unit: &WorkUnit, request: &PageRequest) -> Result<Url> {
        let ctx = self.context(unit);
        let mut url = Url::parse(&template::render(&unit.origin_locator, &ctx)?)?;
        let params = &self.config.params;

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.config.query {
                pairs.append_pair(key, &template::render(value, &ctx)?);
            }

            match self.config.pagination {
                PaginationKind::PageNumber => {
                    pairs.append_pair(&params.page, &request.page.to_string());
                }
                PaginationKind::Offset => {
                    pairs.append_pair(&params.offset, &request.offset.to_string());
                }
                PaginationKind::Cursor => {
                    if let Some(cursor) = &request.cursor {
                        pairs.append_pair(&params.cursor, cursor);
                    }
                }
            }
            pairs.append_pair(&params.limit, &request.page_size.to_string());
        }

        Ok(url)
    }

    /// Extract a page from a decoded response body
    pub fn decode_page(&self, body: &JsonValue) -> Result<Page<JsonValue>> {
        let items = match body.pointer(&self.config.records_pointer) {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(items)) => items.clone(),
            Some(other) => {
                return Err(Error::decode(format!(
                    "expected an array at '{}', found {}",
                    self.config.records_pointer,
                    json_type(other)
                )))
            }
        };

        let mut page = Page::new(items);

        if let Some(total) = self
            .config
            .total_pages_pointer
            .as_deref()
            .and_then(|p| body.pointer(p))
            .and_then(as_u64)
        {
            page = page.with_total_pages(total);
        }

        if let Some(cursor) = self
            .config
            .cursor_pointer
            .as_deref()
            .and_then(|p| body.pointer(p))
            .and_then(JsonValue::as_str)
            .filter(|c| !c.is_empty())
        {
            page = page.with_next_cursor(cursor);
        }

        if let Some(has_more) = self
            .config
            .has_more_pointer
            .as_deref()
            .and_then(|p| body.pointer(p))
            .and_then(JsonValue::as_bool)
        {
            page = page.with_is_last(!has_more);
        }

        Ok(page)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    type Item = JsonValue;

    async fn fetch_page(
        &self,
        unit: &WorkUnit,
        request: &PageRequest,
    ) -> Result<FetchOutcome<JsonValue>> {
        let url = self.build_url(unit, request)?;
        let ctx = self.context(unit);

        let mut req = self.client.get(url.clone());
        for (key, value) in &self.config.headers {
            req = req.header(key.as_str(), template::render(value, &ctx)?);
        }

        let response = req.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = extract_retry_after(&response);
            debug!("429 from {url}, retry-after {retry_after:?}");
            return Ok(FetchOutcome::RateLimited { retry_after });
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(Error::http_status(status.as_u16(), body));
        }

        let text = response.text().await?;
        let body: JsonValue = serde_json::from_str(&text)
            .map_err(|e| Error::decode(format!("{url}: {e}")))?;

        debug!("Request succeeded: GET {url}");
        Ok(FetchOutcome::Page(self.decode_page(&body)?))
    }
}

impl std::fmt::Debug for HttpPageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPageFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Extract the retry-after header value (seconds form only)
fn extract_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
}

/// Read a count that may be sent as a number or a numeric string
fn as_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
