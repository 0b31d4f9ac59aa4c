use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MonitorError, MonitorResult};
use crate::types::{EpochEarning, EpochSnapshot, EpochStat, NodeRecord, NodeTotals, RawDevice};

/// Normalize one raw device payload into a `NodeRecord`.
///
/// Optional fields fall back to their documented defaults; only a missing or
/// empty `deviceId` (or a payload that is not a device object at all) is
/// rejected.
pub fn extract_node(raw: &Value) -> MonitorResult<NodeRecord> {
    let device: RawDevice = serde_json::from_value(raw.clone())
        .map_err(|e| MonitorError::MalformedRecord(e.to_string()))?;

    let device_id = device
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MonitorError::MalformedRecord("missing deviceId".to_string()))?;

    Ok(NodeRecord {
        device_id,
        name: device.name,
        device_type: device.device_type,
        ip_address: device.ip_address,
        ip_score: device.ip_score.unwrap_or(0),
        is_connected: device.is_connected.unwrap_or(false),
        total_uptime: device.total_uptime.unwrap_or(0),
        last_connected_at: device.last_connected_at,
        country_code: device.country_code,
        multiplier: device.multiplier.unwrap_or(1.0),
        total_points: device.total_points.unwrap_or(0),
    })
}

/// Normalize a batch of raw devices, dropping (and logging) malformed entries.
pub fn extract_nodes(credential: &str, raw: &[Value]) -> Vec<NodeRecord> {
    raw.iter()
        .enumerate()
        .filter_map(|(idx, entry)| match extract_node(entry) {
            Ok(node) => {
                debug!(
                    "[{credential}] {} {}({}) {} {}x node {}...",
                    if node.is_connected { "🟢" } else { "🔴" },
                    node.ip_address.as_deref().unwrap_or("-"),
                    node.ip_score,
                    node.country_code.as_deref().unwrap_or("-"),
                    node.multiplier,
                    node.short_id(),
                );
                Some(node)
            }
            Err(e) => {
                warn!("[{credential}] Skipping device #{idx}: {e}");
                None
            }
        })
        .collect()
}

/// Sum uptime and split nodes into online/offline.
///
/// Every node lands in exactly one bucket, so the two counts always add up
/// to `nodes.len()`.
pub fn aggregate_nodes(nodes: &[NodeRecord]) -> NodeTotals {
    let online_count = nodes.iter().filter(|n| n.is_online()).count();
    NodeTotals {
        total_uptime: nodes
            .iter()
            .fold(0u64, |acc, n| acc.saturating_add(n.total_uptime)),
        online_count,
        offline_count: nodes.len() - online_count,
    }
}

/// IP addresses shared by more than one online node, with the device ids using each.
pub fn find_duplicate_ips(nodes: &[NodeRecord]) -> BTreeMap<String, Vec<String>> {
    let mut by_ip: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes.iter().filter(|n| n.is_online()) {
        if let Some(ip) = node.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
            by_ip
                .entry(ip.to_string())
                .or_default()
                .push(node.device_id.clone());
        }
    }
    by_ip.retain(|_, devices| devices.len() > 1);
    by_ip
}

/// Group epoch earnings by epoch name. Later duplicates overwrite earlier ones.
pub fn group_epochs(entries: &[EpochEarning]) -> EpochSnapshot {
    entries
        .iter()
        .map(|e| (e.epoch_name.clone(), EpochStat::from(e)))
        .collect()
}

/// True when an epoch in `current` carries a `modified` marker that differs
/// from `previous`, including epochs `previous` has never seen.
///
/// Point values are deliberately ignored: a re-stamped epoch with identical
/// totals still counts as changed.
pub fn epochs_changed(current: &EpochSnapshot, previous: &EpochSnapshot) -> bool {
    current.iter().any(|(name, stat)| match previous.get(name) {
        Some(prev) => prev.modified != stat.modified,
        None => true,
    })
}

/// Displayable increase of combined and referral points for one epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochDelta {
    pub points: Option<u64>,
    pub referral: Option<u64>,
}

/// A delta is only reported when the epoch was seen before, its `modified`
/// marker moved, and the value actually grew.
pub fn epoch_delta(current: &EpochStat, previous: Option<&EpochStat>) -> EpochDelta {
    let Some(prev) = previous else {
        return EpochDelta::default();
    };
    if prev.modified == current.modified {
        return EpochDelta::default();
    }
    let grew = |now: u64, before: u64| now.checked_sub(before).filter(|d| *d > 0);
    EpochDelta {
        points: grew(current.combined_points(), prev.combined_points()),
        referral: grew(current.referral_points, prev.referral_points),
    }
}
