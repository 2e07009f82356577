use crate::error::{Result, ScanError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Sitescope/0.1 (https://github.com/trapdoorsec/sitescope)";

/// HTTP settings shared by the resolver, the prober and the crawler.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Timeout for HEAD existence checks.
    pub head_timeout: Duration,
    /// Timeout for full page fetches.
    pub get_timeout: Duration,
    /// Timeout for sitemap documents, which can be large.
    pub document_timeout: Duration,
    pub redirect_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            head_timeout: Duration::from_secs(5),
            get_timeout: Duration::from_secs(10),
            document_timeout: Duration::from_secs(30),
            redirect_limit: 10,
        }
    }
}

/// A cloneable HTTP fetch capability with per-kind timeouts.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.head_timeout)
            .pool_max_idle_per_host(50) // Connection pooling
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn head(&self, url: &str) -> Result<Response> {
        debug!("HEAD {}", url);
        let response = self
            .client
            .head(url)
            .timeout(self.config.head_timeout)
            .send()
            .await?;
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.config.get_timeout)
            .send()
            .await?;
        Ok(response)
    }

    /// GET a page and read its body, whatever the status.
    pub async fn get_text(&self, url: &str) -> Result<(u16, String)> {
        let response = self.get(url).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// GET a sitemap document. Non-2xx responses are errors.
    pub async fn get_document(&self, url: &str) -> Result<(Option<String>, String)> {
        debug!("GET document {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.config.document_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = content_type(&response);
        let body = response.text().await?;
        Ok((content_type, body))
    }

    /// Existence check: HEAD, falling back to GET (body discarded) when the
    /// server answers 405 Method Not Allowed.
    pub async fn probe_status(&self, url: &str) -> Result<u16> {
        let response = self.head(url).await?;
        if response.status() != StatusCode::METHOD_NOT_ALLOWED {
            return Ok(response.status().as_u16());
        }

        debug!("HEAD not allowed for {}, retrying with GET", url);
        let response = self.get(url).await?;
        Ok(response.status().as_u16())
    }
}

/// The Content-Type header of a response, if present and readable.
pub fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}
