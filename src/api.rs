use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{MonitorError, MonitorResult};
use crate::types::{EpochEarning, Profile};
use crate::{API_BASE, DEVICES_PATH, EARNINGS_PATH, PROFILE_PATH};

/// Browser user agents rotated per request; the API rejects obviously scripted clients.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
];

/// Pick one of [`USER_AGENTS`] at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Read-only upstream operations, each scoped to one credential token.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_profile(&self, token: &str) -> MonitorResult<Profile>;
    async fn get_earnings(&self, token: &str) -> MonitorResult<Vec<EpochEarning>>;
    /// Raw device objects; an empty vec means the account has no devices.
    async fn get_devices(&self, token: &str) -> MonitorResult<Vec<Value>>;
}

/// `{"result": {"data": T}}`; a missing or `null` level decodes as `T::default()`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<ResultBody<T>>,
}

#[derive(Debug, Deserialize)]
struct ResultBody<T> {
    data: Option<T>,
}

/// Paged list payload: `{"data": [...]}`. A missing or `null` list is empty.
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Option<Vec<T>>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { data: None }
    }
}

fn decode_result<T: DeserializeOwned + Default>(body: &[u8]) -> MonitorResult<T> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    Ok(envelope
        .result
        .and_then(|result| result.data)
        .unwrap_or_default())
}

fn decode_page<T: DeserializeOwned>(body: &[u8]) -> MonitorResult<Vec<T>> {
    let page: Page<T> = decode_result(body)?;
    Ok(page.data.unwrap_or_default())
}

/// Build an HTTP client with timeout, JSON headers and optional proxy.
///
/// The User-Agent is not fixed here; [`GrassClient`] sets one per request.
pub fn build_http_client(timeout: Duration, proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout);
    if let Some(proxy) = proxy {
        builder = builder
            .proxy(reqwest::Proxy::all(proxy).with_context(|| format!("invalid proxy {proxy}"))?);
    }
    builder.build().context("failed to build HTTP client")
}

/// REST client for the Grass API.
#[derive(Debug, Clone)]
pub struct GrassClient {
    http: reqwest::Client,
    base_url: String,
}

impl GrassClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, API_BASE)
    }

    /// Direct (never proxied) client for the Grass API.
    pub fn connect(timeout: Duration) -> Result<Self> {
        Ok(Self::new(build_http_client(timeout, None)?))
    }

    pub fn with_base_url(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET `path` with the token and return the raw body of a 200 response.
    pub async fn get_raw(&self, path: &str, token: &str) -> MonitorResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, token)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await?;
        let status = resp.status();
        debug!("GET {path} -> {status}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = resp.text().await.unwrap_or_default();
            return Err(MonitorError::Auth {
                status: status.as_u16(),
                message,
            });
        }
        if status != StatusCode::OK {
            let message = resp.text().await.unwrap_or_default();
            return Err(MonitorError::Remote(format!(
                "GET {path} returned {status}: {message}"
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DataSource for GrassClient {
    async fn get_profile(&self, token: &str) -> MonitorResult<Profile> {
        let body = self.get_raw(PROFILE_PATH, token).await?;
        decode_result(&body)
    }

    async fn get_earnings(&self, token: &str) -> MonitorResult<Vec<EpochEarning>> {
        let body = self.get_raw(EARNINGS_PATH, token).await?;
        let earnings: Vec<EpochEarning> = decode_page(&body)?;
        debug!("Fetched {} epoch entries", earnings.len());
        Ok(earnings)
    }

    async fn get_devices(&self, token: &str) -> MonitorResult<Vec<Value>> {
        let body = self.get_raw(DEVICES_PATH, token).await?;
        let devices: Vec<Value> = decode_page(&body)?;
        debug!("Fetched {} devices", devices.len());
        Ok(devices)
    }
}
