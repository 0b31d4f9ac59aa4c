use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept integer or floating point JSON numbers (and `null`) as whole seconds/points.
///
/// Upstream occasionally reports uptimes and point totals as floats; anything
/// negative or missing collapses to zero.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.floor() as u64)
        .unwrap_or(0))
}

/// Same as [`lenient_u64`] but keeps "absent" distinct from zero.
fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0).floor() as u64))
}

/// Account profile returned by `retrieveUser`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: Option<String>,
}

impl Profile {
    /// Name shown in reports; falls back when the account has no username set.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown user")
    }
}

/// One epoch entry returned by `epochEarnings`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochEarning {
    pub epoch_name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_points: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub reward_points: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub referral_points: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_uptime: u64,
    /// Opaque version marker (timestamp string, epoch millis, revision id...);
    /// compared for equality only. JSON `null` decodes as `None`.
    #[serde(default)]
    pub modified: Option<Value>,
}

/// Raw device record from `activeDevices`, every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDevice {
    pub device_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub ip_score: Option<u64>,
    pub is_connected: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub total_uptime: Option<u64>,
    pub last_connected_at: Option<String>,
    pub country_code: Option<String>,
    pub multiplier: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub total_points: Option<u64>,
}

/// Normalized device state for a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub device_id: String,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub ip_address: Option<String>,
    /// 0–100, defaults to 0.
    pub ip_score: u64,
    pub is_connected: bool,
    pub total_uptime: u64,
    pub last_connected_at: Option<String>,
    pub country_code: Option<String>,
    pub multiplier: f64,
    pub total_points: u64,
}

impl NodeRecord {
    /// A node is online only when it is connected and has a non-zero IP score.
    pub fn is_online(&self) -> bool {
        self.ip_score > 0 && self.is_connected
    }

    /// First eight characters of the device id, for log lines.
    pub fn short_id(&self) -> &str {
        match self.device_id.char_indices().nth(8) {
            Some((idx, _)) => &self.device_id[..idx],
            None => &self.device_id,
        }
    }
}

/// Aggregate node counts for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeTotals {
    pub total_uptime: u64,
    pub online_count: usize,
    pub offline_count: usize,
}

/// Per-epoch reward state for one credential.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStat {
    pub total_points: u64,
    pub reward_points: u64,
    pub referral_points: u64,
    pub total_uptime: u64,
    pub modified: Option<Value>,
}

impl EpochStat {
    /// Score shown in reports: base points plus reward points.
    pub fn combined_points(&self) -> u64 {
        self.total_points.saturating_add(self.reward_points)
    }
}

impl From<&EpochEarning> for EpochStat {
    fn from(entry: &EpochEarning) -> Self {
        Self {
            total_points: entry.total_points,
            reward_points: entry.reward_points,
            referral_points: entry.referral_points,
            total_uptime: entry.total_uptime,
            modified: entry.modified.clone(),
        }
    }
}

/// One poll's epoch stats for a credential, keyed by epoch name.
pub type EpochSnapshot = BTreeMap<String, EpochStat>;

/// What happened to one credential during a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Report sent to the sink.
    Notified,
    /// Nothing changed and the policy only notifies on change.
    Skipped,
    /// Report rendered but the sink rejected it.
    DeliveryFailed,
    /// A fetch failed; the cycle was aborted and the cache left untouched.
    FetchFailed,
}

/// Per-credential result of a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub credential: String,
    pub status: CycleStatus,
    pub changed: bool,
}
