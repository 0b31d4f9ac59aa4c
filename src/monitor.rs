//! Poll orchestration: one task per credential per tick, results folded back
//! into the snapshot cache, then sleep until the next tick.
//!
//! Per credential the cycle is
//! `profile -> earnings -> devices -> diff -> (notify | skip) -> done`.
//! A failed fetch aborts only that credential's cycle and is not retried
//! until the next scheduled tick.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use rand::Rng;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::DataSource;
use crate::config::{Credential, NotifyPolicy, SettingsConfig};
use crate::engine::{aggregate_nodes, epochs_changed, extract_nodes, find_duplicate_ips, group_epochs};
use crate::error::MonitorResult;
use crate::notifier::Sink;
use crate::reporter::{ReportInput, render_report, report_timestamp};
use crate::state::SnapshotCache;
use crate::types::{CycleOutcome, CycleStatus, EpochSnapshot};

/// Settings the orchestrator needs at runtime.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub app_name: String,
    pub notify: NotifyPolicy,
    pub time_offset_hours: i32,
    pub show_detail: bool,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
    pub start_jitter_min: Duration,
    pub start_jitter_max: Duration,
}

impl From<&SettingsConfig> for MonitorSettings {
    fn from(cfg: &SettingsConfig) -> Self {
        Self {
            app_name: cfg.app_name.clone(),
            notify: cfg.notify,
            time_offset_hours: cfg.time_offset_hours,
            show_detail: cfg.show_detail,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            retry_backoff: Duration::from_secs(cfg.retry_backoff_secs),
            start_jitter_min: Duration::from_secs(cfg.start_jitter_min_secs),
            start_jitter_max: Duration::from_secs(cfg.start_jitter_max_secs),
        }
    }
}

/// Random delay in `min..=max`, at millisecond resolution.
///
/// Returns `min` when the range is empty, so `0..=0` means no delay.
pub fn start_jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Resolve once `signal` fires.
///
/// If the signal source itself fails (no handler could be installed), log it
/// and never resolve, so the caller keeps running instead of exiting.
pub async fn wait_for_shutdown<F, E>(signal: F)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    if let Err(e) = signal.await {
        warn!("Shutdown signal unavailable, running until killed: {e}");
        std::future::pending::<()>().await;
    }
}

/// Owns the collaborators and the previous-poll cache.
pub struct Monitor<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    credentials: Vec<Credential>,
    settings: Arc<MonitorSettings>,
    cache: SnapshotCache,
}

impl<S, K> Monitor<S, K>
where
    S: DataSource + 'static,
    K: Sink + 'static,
{
    pub fn new(source: S, sink: K, credentials: Vec<Credential>, settings: MonitorSettings) -> Self {
        Self {
            source: Arc::new(source),
            sink: Arc::new(sink),
            credentials,
            settings: Arc::new(settings),
            cache: SnapshotCache::new(),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Run one cycle over every credential concurrently.
    ///
    /// Outcomes are returned in credential order. Each credential's cache slot
    /// is replaced only if its fetches all succeeded. An error means a
    /// credential task died outright; completed credentials are still cached.
    pub async fn poll_once(&mut self) -> Result<Vec<CycleOutcome>> {
        let mut tasks = JoinSet::new();
        for (idx, credential) in self.credentials.iter().enumerate() {
            let previous = self.cache.get(&credential.token).cloned().unwrap_or_default();
            let source = Arc::clone(&self.source);
            let sink = Arc::clone(&self.sink);
            let settings = Arc::clone(&self.settings);
            let credential = credential.clone();
            tasks.spawn(async move {
                let delay = start_jitter(settings.start_jitter_min, settings.start_jitter_max);
                if !delay.is_zero() {
                    debug!("[{}] Starting in {}ms", credential.name, delay.as_millis());
                    tokio::time::sleep(delay).await;
                }
                let result =
                    poll_credential(&*source, &*sink, &settings, &credential, &previous).await;
                (idx, credential, result)
            });
        }

        let mut outcomes = Vec::with_capacity(self.credentials.len());
        let mut aborted = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, credential, Ok((snapshot, outcome)))) => {
                    self.cache.replace(&credential.token, snapshot);
                    outcomes.push((idx, outcome));
                }
                Ok((idx, credential, Err(e))) => {
                    if e.is_auth() {
                        warn!("[{}] Token rejected, skipping until next cycle: {e}", credential.name);
                    } else {
                        warn!("[{}] Cycle aborted: {e}", credential.name);
                    }
                    outcomes.push((
                        idx,
                        CycleOutcome {
                            credential: credential.name,
                            status: CycleStatus::FetchFailed,
                            changed: false,
                        },
                    ));
                }
                Err(e) => {
                    error!("Credential task failed: {e}");
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            bail!("{aborted} credential task(s) aborted");
        }
        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    /// Poll forever until `shutdown` resolves. The first cycle starts immediately.
    ///
    /// A successful cycle sleeps for the poll interval; a failed one only for
    /// the retry backoff.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let delay = match self.poll_once().await {
                Ok(outcomes) => {
                    let notified = outcomes
                        .iter()
                        .filter(|o| o.status == CycleStatus::Notified)
                        .count();
                    let failed = outcomes
                        .iter()
                        .filter(|o| o.status == CycleStatus::FetchFailed)
                        .count();
                    info!(
                        "Cycle complete: {} account(s), {notified} notified, {failed} failed; next poll in {}s",
                        outcomes.len(),
                        self.settings.poll_interval.as_secs()
                    );
                    self.settings.poll_interval
                }
                Err(e) => {
                    warn!(
                        "Poll cycle error: {e}; retrying in {}s",
                        self.settings.retry_backoff.as_secs()
                    );
                    self.settings.retry_backoff
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Fetch, diff and (maybe) notify for a single credential.
///
/// Returns the freshly fetched snapshot so the caller can store it whether or
/// not a report went out.
async fn poll_credential<S, K>(
    source: &S,
    sink: &K,
    settings: &MonitorSettings,
    credential: &Credential,
    previous: &EpochSnapshot,
) -> MonitorResult<(EpochSnapshot, CycleOutcome)>
where
    S: DataSource + ?Sized,
    K: Sink + ?Sized,
{
    let name = credential.name.as_str();

    let profile = source.get_profile(&credential.token).await?;
    let earnings = source.get_earnings(&credential.token).await?;
    let raw_devices = source.get_devices(&credential.token).await?;

    let current = group_epochs(&earnings);
    let nodes = extract_nodes(name, &raw_devices);
    let totals = aggregate_nodes(&nodes);

    for (ip, devices) in find_duplicate_ips(&nodes) {
        warn!("[{name}] IP {ip} shared by online devices: {}", devices.join(", "));
    }

    let changed = epochs_changed(&current, previous);
    info!(
        "[{name}] {} node(s): {} online, {} offline; {} epoch(s), changed={changed}",
        nodes.len(),
        totals.online_count,
        totals.offline_count,
        current.len(),
    );

    let status = if settings.notify.should_notify(changed) {
        let text = render_report(&ReportInput {
            app_name: &settings.app_name,
            generated_at: report_timestamp(settings.time_offset_hours),
            credential_name: name,
            username: profile.display_name(),
            nodes: &nodes,
            totals,
            current: &current,
            previous,
            changed,
            show_detail: settings.show_detail,
        });
        match sink.deliver(&text).await {
            Ok(()) => CycleStatus::Notified,
            Err(e) => {
                warn!("[{name}] {e}");
                CycleStatus::DeliveryFailed
            }
        }
    } else {
        info!("[{name}] No epoch changes, skipping notification");
        CycleStatus::Skipped
    };

    Ok((
        current,
        CycleOutcome {
            credential: credential.name.clone(),
            status,
            changed,
        },
    ))
}
