use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{DEFAULT_CATALOG_URL, DEFAULT_DOWNLOAD_URL, DEFAULT_TOKEN_URL, load_config};
use crate::error::{http_error, token_error};
use crate::product::{Product, ProductPage};
use crate::query::Query;
use crate::util::urljoin;

const DEFAULT_PAGE_SIZE: usize = 100;
/// Largest `$top` the catalogue accepts.
const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// CDSE account user name (usually an e-mail address).
    pub username: String,
    pub password: String,
    /// OData catalogue root, typically `https://catalogue.dataspace.copernicus.eu/odata/v1`.
    pub catalog_url: String,
    /// OpenID Connect token endpoint.
    pub token_url: String,
    /// Download service root, typically `https://zipper.dataspace.copernicus.eu/odata/v1`.
    pub download_url: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

impl ClientConfig {
    /// Configuration for the public CDSE endpoints.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            verify: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) catalog_url: String,
    pub(crate) token_url: String,
    pub(crate) download_url: String,

    pub(crate) timeout: Duration,
    pub(crate) page_size: usize,
    pub(crate) progress: bool,

    pub(crate) http: HttpClient,
}

/// Tokens are renewed this long before the identity service says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A bearer token together with the instant it should no longer be used.
#[derive(Debug, Clone)]
pub(crate) struct AccessToken {
    pub(crate) value: String,
    renew_at: Option<Instant>,
}

impl AccessToken {
    /// `true` once the token is within [`TOKEN_EXPIRY_MARGIN`] of expiring.
    ///
    /// A token without a known lifetime is treated as single-use.
    pub(crate) fn needs_renewal(&self) -> bool {
        match self.renew_at {
            Some(at) => Instant::now() >= at,
            None => true,
        }
    }
}

impl Client {
    /// Creates a client from environment variables and/or `.cdserc`.
    ///
    /// This is equivalent to `Client::resolve(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None)
    }

    /// Creates a client for the given account.
    ///
    /// Endpoint overrides are still picked up from the environment or `.cdserc`.
    pub fn new(username: &str, password: &str) -> Result<Self> {
        Self::resolve(Some(username.to_string()), Some(password.to_string()))
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `username`/`password` arguments
    /// - environment variables `CDSE_USERNAME` / `CDSE_PASSWORD`
    /// - config file from `CDSE_RC` or `.cdserc`
    pub fn resolve(username: Option<String>, password: Option<String>) -> Result<Self> {
        let cfg = load_config(username, password)?;
        Self::from_config(cfg)
    }

    /// Creates a client from a fully specified configuration without consulting env or files.
    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cdseapi-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("cdseapi-rs")),
        );

        // No client-wide timeout: product downloads can take far longer than API calls.
        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(None::<Duration>);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            username: cfg.username,
            password: cfg.password,
            catalog_url: cfg.catalog_url,
            token_url: cfg.token_url,
            download_url: cfg.download_url,
            timeout: Duration::from_secs(100),
            page_size: DEFAULT_PAGE_SIZE,
            progress: true,
            http,
        })
    }

    /// Timeout for catalogue and token requests. Downloads are not bounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of products requested per catalogue page (1..=1000).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Runs a catalogue search, following pages until the query limit or the last page.
    pub fn query(&self, query: &Query) -> Result<Vec<Product>> {
        let url = urljoin(&self.catalog_url, "Products");
        let limit = query.max_results();

        // Validate before touching the network.
        query.filter_expression()?;

        let mut products: Vec<Product> = Vec::new();
        let mut skip = 0usize;
        loop {
            let top = match limit {
                Some(limit) => self.page_size.min(limit.saturating_sub(products.len())),
                None => self.page_size,
            };
            if top == 0 {
                break;
            }

            let params = query.page_params(top, skip)?;
            debug!(%url, top, skip, "querying catalogue page");
            let page: ProductPage = self.get_json(&url, &params)?;

            let received = page.value.len();
            products.extend(
                page.value
                    .into_iter()
                    .take(top)
                    .map(|p| p.into_product(&self.download_url)),
            );

            if received < top {
                break;
            }
            skip += received;
        }

        info!(
            mission = %query.mission(),
            count = products.len(),
            "catalogue query finished"
        );
        Ok(products)
    }

    /// Requests a bearer token with the resource-owner password grant.
    pub fn access_token(&self) -> Result<String> {
        Ok(self.request_token()?.value)
    }

    pub(crate) fn request_token(&self) -> Result<AccessToken> {
        let form = [
            ("client_id", "cdse-public"),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("grant_type", "password"),
        ];

        debug!(url = %self.token_url, "requesting access token");
        let resp = self
            .http
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .with_context(|| format!("could not connect to {}", self.token_url))?;

        let status = resp.status();
        let body = resp.text();
        if !status.is_success() {
            return Err(token_error(status, &body.unwrap_or_default()).into());
        }
        let text = body
            .with_context(|| format!("failed to read token response from {}", self.token_url))?;

        let token: TokenResponse = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse token response (url={})", self.token_url))?;
        let renew_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs).saturating_sub(TOKEN_EXPIRY_MARGIN)
        });
        debug!(expires_in = ?token.expires_in, "access token issued");
        Ok(AccessToken {
            value: token.access_token,
            renew_at,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(String, String)]) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .query(params)
            .timeout(self.timeout)
            .send()
            .with_context(|| format!("could not connect to {}", url))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text();
        if !status.is_success() {
            return Err(http_error(status, &final_url, &body.unwrap_or_default()).into());
        }
        let text = body.with_context(|| format!("failed to read response body from {}", url))?;

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))
    }
}
