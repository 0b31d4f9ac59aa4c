use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::build_http_client;
use crate::config::WebhookConfig;
use crate::error::{MonitorError, MonitorResult};

/// Destination for rendered reports.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, text: &str) -> MonitorResult<()>;
}

/// Text message body accepted by WeCom-style group bot webhooks.
#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msgtype: &'static str,
    text: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    content: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            msgtype: "text",
            text: TextContent { content },
        }
    }
}

/// Posts reports to a webhook URL as a single text message.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Sink with its own client; `[webhook].proxy` applies to this client only.
    pub fn from_config(webhook: &WebhookConfig, timeout: Duration) -> Result<Self> {
        let http = build_http_client(timeout, webhook.proxy.as_deref())?;
        Ok(Self::new(http, webhook.url.clone()))
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn deliver(&self, text: &str) -> MonitorResult<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(&TextMessage::new(text))
            .send()
            .await
            .map_err(|e| MonitorError::Delivery(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            info!("Report delivered ({} bytes)", text.len());
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            warn!("Webhook rejected report: {status} {body}");
            Err(MonitorError::Delivery(format!("{status}: {body}")))
        }
    }
}
