//! Plain-text rendering of a per-account poll report.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::engine::epoch_delta;
use crate::types::{EpochSnapshot, NodeRecord, NodeTotals};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Everything the renderer needs for one account report.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub app_name: &'a str,
    pub generated_at: DateTime<FixedOffset>,
    pub credential_name: &'a str,
    pub username: &'a str,
    pub nodes: &'a [NodeRecord],
    pub totals: NodeTotals,
    pub current: &'a EpochSnapshot,
    pub previous: &'a EpochSnapshot,
    pub changed: bool,
    /// Include one line per node.
    pub show_detail: bool,
}

/// Current time shifted by the configured display offset.
pub fn report_timestamp(offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_hours * 3_600).unwrap_or(Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Render seconds as days/hours/minutes, omitting zero units.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / SECS_PER_DAY;
    let hours = (seconds % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| {
            if value == 1 {
                format!("{value} {unit}")
            } else {
                format!("{value} {unit}s")
            }
        })
        .collect();

    if parts.is_empty() {
        "under one minute".to_string()
    } else {
        parts.join(" ")
    }
}

/// Integer with `,` thousands separators.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn with_delta(value: u64, delta: Option<u64>) -> String {
    match delta {
        Some(d) => format!("{}(+{})", format_thousands(value), format_thousands(d)),
        None => format_thousands(value),
    }
}

fn node_line(node: &NodeRecord) -> String {
    format!(
        "  {} {} ({}) {} {}x {}...",
        if node.is_online() { "🟢" } else { "🔴" },
        node.ip_address.as_deref().unwrap_or("-"),
        node.ip_score,
        node.country_code.as_deref().unwrap_or("--"),
        node.multiplier,
        node.short_id(),
    )
}

/// Compose the notification text for one account.
pub fn render_report(input: &ReportInput<'_>) -> String {
    let mut lines = vec![
        format!(
            "🔍 [{} Account Report] {}",
            input.app_name,
            if input.changed {
                "changes detected"
            } else {
                "no changes"
            }
        ),
        format!(
            "⏰ Time: {}",
            input.generated_at.format("%Y-%m-%d %H:%M:%S")
        ),
        format!("👤 Account: {} ({})", input.credential_name, input.username),
        String::new(),
        "📊 Nodes:".to_string(),
        format!("  • Total: {}", input.nodes.len()),
        format!("  • Online: {}", input.totals.online_count),
        format!("  • Offline: {}", input.totals.offline_count),
        format!("  • Total uptime: {}", format_uptime(input.totals.total_uptime)),
    ];

    if input.show_detail && !input.nodes.is_empty() {
        lines.push(String::new());
        lines.push("🖥 Node detail:".to_string());
        lines.extend(input.nodes.iter().map(node_line));
    }

    lines.push(String::new());
    lines.push("📊 Current earnings:".to_string());
    if input.current.is_empty() {
        lines.push("  (no epoch data)".to_string());
    }
    for (epoch, stat) in input.current {
        let delta = epoch_delta(stat, input.previous.get(epoch));
        lines.push(String::new());
        lines.push(format!("{epoch}:"));
        lines.push(format!(
            "  • Points: {}",
            with_delta(stat.combined_points(), delta.points)
        ));
        lines.push(format!(
            "  • Referral: {}",
            with_delta(stat.referral_points, delta.referral)
        ));
        lines.push(format!("  • Uptime: {}", format_uptime(stat.total_uptime)));
    }

    lines.push(String::new());
    lines.push("📊 Previous earnings:".to_string());
    if input.previous.is_empty() {
        lines.push("  (no previous poll)".to_string());
    }
    for (epoch, stat) in input.previous {
        lines.push(String::new());
        lines.push(format!("{epoch}:"));
        lines.push(format!(
            "  • Points: {}",
            format_thousands(stat.combined_points())
        ));
        lines.push(format!(
            "  • Referral: {}",
            format_thousands(stat.referral_points)
        ));
        lines.push(format!("  • Uptime: {}", format_uptime(stat.total_uptime)));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{aggregate_nodes, epochs_changed, extract_node};
    use crate::types::EpochStat;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn stat(total: u64, reward: u64, referral: u64, uptime: u64, modified: &str) -> EpochStat {
        EpochStat {
            total_points: total,
            reward_points: reward,
            referral_points: referral,
            total_uptime: uptime,
            modified: Some(Value::from(modified)),
        }
    }

    fn fixed_time() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(6 * 3_600)
            .unwrap()
            .with_ymd_and_hms(2024, 11, 1, 12, 30, 0)
            .unwrap()
    }

    fn render(
        nodes: &[NodeRecord],
        current: &EpochSnapshot,
        previous: &EpochSnapshot,
        show_detail: bool,
    ) -> String {
        render_report(&ReportInput {
            app_name: "Grass",
            generated_at: fixed_time(),
            credential_name: "Token1",
            username: "alice",
            nodes,
            totals: aggregate_nodes(nodes),
            current,
            previous,
            changed: epochs_changed(current, previous),
            show_detail,
        })
    }

    // ── format_uptime ──────────────────────────────────────────────

    #[test]
    fn uptime_zero() {
        assert_eq!(format_uptime(0), "under one minute");
        assert_eq!(format_uptime(59), "under one minute");
    }

    #[test]
    fn uptime_all_units() {
        assert_eq!(format_uptime(90_061), "1 day 1 hour 1 minute");
    }

    #[test]
    fn uptime_omits_zero_units_and_pluralizes() {
        assert_eq!(format_uptime(2 * SECS_PER_DAY + 5 * 60), "2 days 5 minutes");
        assert_eq!(format_uptime(3 * SECS_PER_HOUR), "3 hours");
        assert_eq!(format_uptime(SECS_PER_DAY), "1 day");
        assert_eq!(format_uptime(119), "1 minute");
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn timestamp_uses_offset() {
        let ts = report_timestamp(6);
        assert_eq!(ts.offset().local_minus_utc(), 6 * 3_600);
    }

    // ── render_report ──────────────────────────────────────────────

    #[test]
    fn header_and_node_summary() {
        let nodes = vec![
            extract_node(&json!({ "deviceId": "a", "ipScore": 80, "isConnected": true, "totalUptime": 90061 })).unwrap(),
            extract_node(&json!({ "deviceId": "b", "totalUptime": 0 })).unwrap(),
        ];
        let text = render(&nodes, &EpochSnapshot::new(), &EpochSnapshot::new(), false);
        assert!(text.starts_with("🔍 [Grass Account Report] no changes"));
        assert!(text.contains("⏰ Time: 2024-11-01 12:30:00"));
        assert!(text.contains("👤 Account: Token1 (alice)"));
        assert!(text.contains("  • Total: 2"));
        assert!(text.contains("  • Online: 1"));
        assert!(text.contains("  • Offline: 1"));
        assert!(text.contains("  • Total uptime: 1 day 1 hour 1 minute"));
        assert!(text.contains("(no epoch data)"));
        assert!(!text.contains("Node detail"));
    }

    #[test]
    fn first_poll_shows_absolute_totals_only() {
        let mut current = EpochSnapshot::new();
        current.insert("Epoch 7".into(), stat(12_000, 500, 40, 3_600, "m1"));
        let text = render(&[], &current, &EpochSnapshot::new(), false);
        assert!(text.contains("changes detected"));
        assert!(text.contains("Epoch 7:"));
        assert!(text.contains("  • Points: 12,500\n"));
        assert!(text.contains("  • Referral: 40\n"));
        assert!(text.contains("  • Uptime: 1 hour"));
        assert!(!text.contains("(+"));
        assert!(text.contains("(no previous poll)"));
    }

    #[test]
    fn delta_shown_when_marker_moves() {
        let mut previous = EpochSnapshot::new();
        previous.insert("Epoch 7".into(), stat(12_000, 500, 40, 3_600, "m1"));
        let mut current = EpochSnapshot::new();
        current.insert("Epoch 7".into(), stat(13_000, 600, 40, 7_200, "m2"));
        let text = render(&[], &current, &previous, false);
        assert!(text.contains("  • Points: 13,600(+1,100)"));
        assert!(text.contains("  • Referral: 40\n"));
        // previous section keeps absolute values
        assert!(text.contains("📊 Previous earnings:\n\nEpoch 7:\n  • Points: 12,500"));
    }

    #[test]
    fn no_delta_when_marker_unchanged() {
        let mut previous = EpochSnapshot::new();
        previous.insert("E".into(), stat(100, 0, 1, 0, "same"));
        let mut current = EpochSnapshot::new();
        current.insert("E".into(), stat(200, 0, 5, 0, "same"));
        let text = render(&[], &current, &previous, false);
        assert!(!text.contains("(+"));
        assert!(text.contains("no changes"));
    }

    #[test]
    fn referral_delta_independent_of_points() {
        let mut previous = EpochSnapshot::new();
        previous.insert("E".into(), stat(100, 0, 1, 0, "a"));
        let mut current = EpochSnapshot::new();
        current.insert("E".into(), stat(100, 0, 1_001, 0, "b"));
        let text = render(&[], &current, &previous, false);
        assert!(text.contains("  • Points: 100\n"));
        assert!(text.contains("  • Referral: 1,001(+1,000)"));
    }

    #[test]
    fn detail_lists_nodes() {
        let nodes = vec![
            extract_node(&json!({
                "deviceId": "0123456789abcdef",
                "ipAddress": "9.9.9.9",
                "ipScore": 75,
                "isConnected": true,
                "countryCode": "US",
                "multiplier": 2.0
            }))
            .unwrap(),
        ];
        let text = render(&nodes, &EpochSnapshot::new(), &EpochSnapshot::new(), true);
        assert!(text.contains("🖥 Node detail:"));
        assert!(text.contains("  🟢 9.9.9.9 (75) US 2x 01234567..."));
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut current = EpochSnapshot::new();
        current.insert("B".into(), stat(1, 0, 0, 0, "x"));
        current.insert("A".into(), stat(2, 0, 0, 0, "y"));
        let a = render(&[], &current, &EpochSnapshot::new(), false);
        let b = render(&[], &current, &EpochSnapshot::new(), false);
        assert_eq!(a, b);
        assert!(a.find("A:").unwrap() < a.find("B:").unwrap());
    }
}
