use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable that overrides `webhook.url`.
pub const WEBHOOK_URL_VAR: &str = "GRASS_WEBHOOK_URL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub accounts: Vec<Credential>,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// One monitored account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Label used in reports and logs.
    pub name: String,
    /// Value sent verbatim in the `authorization` header.
    pub token: String,
}

// Keep tokens out of logs and panic messages.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Notification destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Optional proxy for webhook delivery only; Grass API calls always go direct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

/// When a rendered report is actually sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Send a report on every poll.
    #[default]
    Always,
    /// Send only when an epoch's `modified` marker moved.
    OnChange,
}

impl NotifyPolicy {
    pub fn should_notify(self, changed: bool) -> bool {
        match self {
            NotifyPolicy::Always => true,
            NotifyPolicy::OnChange => changed,
        }
    }
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Name shown in the report header.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Seconds to sleep between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub notify: NotifyPolicy,
    /// Hours added to UTC when stamping reports.
    #[serde(default)]
    pub time_offset_hours: i32,
    /// List every node in the report, not just the counts.
    #[serde(default)]
    pub show_detail: bool,
    /// Per-request timeout for upstream and webhook calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Sleep after a top-level cycle failure, instead of the full interval.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// Each account waits a random `min..=max` seconds before its first request
    /// of a cycle. `0`/`0` disables the stagger.
    #[serde(default = "default_jitter_min")]
    pub start_jitter_min_secs: u64,
    #[serde(default = "default_jitter_max")]
    pub start_jitter_max_secs: u64,
}

fn default_app_name() -> String {
    "Grass".to_string()
}

fn default_poll_interval() -> u64 {
    36_000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_backoff() -> u64 {
    5
}

fn default_jitter_min() -> u64 {
    10
}

fn default_jitter_max() -> u64 {
    20
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            poll_interval_secs: default_poll_interval(),
            notify: NotifyPolicy::default(),
            time_offset_hours: 0,
            show_detail: false,
            request_timeout_secs: default_request_timeout(),
            retry_backoff_secs: default_retry_backoff(),
            start_jitter_min_secs: default_jitter_min(),
            start_jitter_max_secs: default_jitter_max(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path, apply env overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        if let Ok(url) = std::env::var(WEBHOOK_URL_VAR) {
            if !url.trim().is_empty() {
                config.webhook.url = url;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the TOML file as-is, without overrides or validation.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse config from a TOML string without validating it.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Check the invariants the monitor relies on.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.accounts.is_empty(), "no [[accounts]] configured");
        for (idx, account) in self.accounts.iter().enumerate() {
            if account.name.trim().is_empty() {
                bail!("account #{} has an empty name", idx + 1);
            }
            if account.token.trim().is_empty() {
                bail!("account '{}' has an empty token", account.name);
            }
            // snapshots are cached per token
            if self.accounts[..idx].iter().any(|a| a.token == account.token) {
                bail!("account '{}' reuses another account's token", account.name);
            }
        }
        url::Url::parse(&self.webhook.url)
            .with_context(|| format!("invalid webhook url '{}'", self.webhook.url))?;
        if let Some(proxy) = &self.webhook.proxy {
            url::Url::parse(proxy).with_context(|| format!("invalid proxy url '{proxy}'"))?;
        }
        ensure!(
            self.settings.poll_interval_secs > 0,
            "settings.poll_interval_secs must be positive"
        );
        ensure!(
            (-23..=23).contains(&self.settings.time_offset_hours),
            "settings.time_offset_hours must be between -23 and 23"
        );
        ensure!(
            self.settings.request_timeout_secs > 0,
            "settings.request_timeout_secs must be positive"
        );
        ensure!(
            self.settings.start_jitter_min_secs <= self.settings.start_jitter_max_secs,
            "settings.start_jitter_min_secs must not exceed start_jitter_max_secs"
        );
        Ok(())
    }

    /// Insert or replace the account with the given name.
    pub fn upsert_account(&mut self, credential: Credential) {
        match self.accounts.iter_mut().find(|a| a.name == credential.name) {
            Some(existing) => existing.token = credential.token,
            None => self.accounts.push(credential),
        }
    }
}
