//! Network log triage
//!
//! Classifies each line of a syslog, firewall or exported Windows text log and
//! renders a plain-text troubleshooting report.

use crate::error::Result;
use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const DEFAULT_TOP_N: usize = 10;
pub const HIGH_LATENCY_MS: f64 = 100.0;
const SAMPLE_WIDTH: usize = 120;
const TIMELINE_BAR_MAX: usize = 60;

lazy_static::lazy_static! {
    static ref TIMESTAMP_SYSLOG: Regex =
        Regex::new(r"^(?P<timestamp>\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})").expect("valid regex");
    static ref TIMESTAMP_ISO: Regex =
        Regex::new(r"(?P<timestamp>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2})").expect("valid regex");
    static ref IP_ADDRESS: Regex =
        Regex::new(r"\b(?P<ip>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").expect("valid regex");
    static ref PORT: Regex = Regex::new(
        r"(?i)(?:SPT|SRC_PORT|sport|srcport|DPT|DST_PORT|dport|dstport)[=: ]+(?P<port>\d{1,5})"
    )
    .expect("valid regex");
    static ref FIREWALL_DENY: Regex =
        Regex::new(r"(?i)(DROP|DENY|BLOCK|REJECT|REFUSED)").expect("valid regex");
    static ref FIREWALL_ALLOW: Regex = Regex::new(r"(?i)(ACCEPT|ALLOW|PERMIT)").expect("valid regex");
    static ref DNS_QUERY: Regex = Regex::new(
        r"(?i)(query|lookup|resolve[ds]?)\s+.*?(?P<domain>[a-zA-Z0-9._-]+\.[a-zA-Z]{2,})"
    )
    .expect("valid regex");
    static ref DNS_FAILURE: Regex = Regex::new(
        r"(?i)(NXDOMAIN|SERVFAIL|REFUSED|no\s+servers?\s+could\s+be\s+reached|timed?\s*out|resolution\s+failed)"
    )
    .expect("valid regex");
    static ref CONNECTION_ERROR: Regex = Regex::new(
        r"(?i)(connection\s+(refused|reset|timed?\s*out|closed|failed)|unreachable|no\s+route|link\s+down|interface\s+down)"
    )
    .expect("valid regex");
    static ref LATENCY: Regex =
        Regex::new(r"(?i)(?:time|latency|rtt|delay)[=: ]+(?P<ms>\d+\.?\d*)\s*ms").expect("valid regex");
    static ref PACKET_LOSS: Regex =
        Regex::new(r"(?i)(?P<loss>\d+\.?\d*)%?\s*(?:packet\s+)?loss").expect("valid regex");
    static ref DHCP_EVENT: Regex = Regex::new(
        r"(?i)(DHCPDISCOVER|DHCPOFFER|DHCPREQUEST|DHCPACK|DHCPNAK|DHCPRELEASE|DHCPDECLINE)"
    )
    .expect("valid regex");
}

/// Occurrence counter that breaks ties by first appearance
#[derive(Debug, Default, Clone)]
pub struct Tally {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl Tally {
    pub fn add(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.to_string(), 1);
                self.order.push(key.to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .order
            .iter()
            .map(|key| (key.as_str(), self.counts[key]))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub line_no: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredLine {
    pub line_no: usize,
    pub value: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct NetLogAnalysis {
    pub source: String,
    pub total_lines: usize,
    pub denied: Vec<LogLine>,
    pub allowed: Vec<LogLine>,
    pub connection_errors: Vec<LogLine>,
    pub dns_failures: Vec<LogLine>,
    pub dns_queries: Vec<LogLine>,
    pub high_latency: Vec<MeasuredLine>,
    pub packet_loss: Vec<MeasuredLine>,
    pub dhcp_events: Vec<LogLine>,
    pub source_ips: Tally,
    pub dest_ips: Tally,
    pub denied_ips: Tally,
    pub ports: Tally,
    /// Deny and connection-error lines per hour bucket
    pub error_timeline: BTreeMap<String, usize>,
}

/// Hour bucket: the timestamp without its `:MM:SS` tail
fn hour_bucket(line: &str) -> Option<String> {
    let captures = TIMESTAMP_ISO
        .captures(line)
        .or_else(|| TIMESTAMP_SYSLOG.captures(line))?;
    let ts = captures.name("timestamp")?.as_str();
    ts.get(..ts.len().saturating_sub(6)).map(str::to_string)
}

pub fn analyze(source: &str, content: &str) -> NetLogAnalysis {
    let mut analysis = NetLogAnalysis {
        source: source.to_string(),
        ..Default::default()
    };

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let text = raw.trim();
        analysis.total_lines += 1;
        let entry = || LogLine {
            line_no,
            text: text.to_string(),
        };

        let ips: Vec<&str> = IP_ADDRESS
            .captures_iter(raw)
            .filter_map(|c| c.name("ip").map(|m| m.as_str()))
            .collect();
        if let Some(first) = ips.first() {
            analysis.source_ips.add(first);
        }
        if let Some(second) = ips.get(1) {
            analysis.dest_ips.add(second);
        }

        for captures in PORT.captures_iter(raw) {
            if let Some(port) = captures.name("port") {
                analysis.ports.add(port.as_str());
            }
        }

        let denied = FIREWALL_DENY.is_match(raw);
        if denied {
            analysis.denied.push(entry());
            for ip in &ips {
                analysis.denied_ips.add(ip);
            }
        } else if FIREWALL_ALLOW.is_match(raw) {
            analysis.allowed.push(entry());
        }

        if DNS_FAILURE.is_match(raw) {
            analysis.dns_failures.push(entry());
        } else if DNS_QUERY.is_match(raw) {
            analysis.dns_queries.push(entry());
        }

        let connection_error = CONNECTION_ERROR.is_match(raw);
        if connection_error {
            analysis.connection_errors.push(entry());
        }

        if let Some(ms) = capture_number(&LATENCY, "ms", raw) {
            if ms > HIGH_LATENCY_MS {
                analysis.high_latency.push(MeasuredLine {
                    line_no,
                    value: ms,
                    text: text.to_string(),
                });
            }
        }

        if let Some(loss) = capture_number(&PACKET_LOSS, "loss", raw) {
            if loss > 0.0 {
                analysis.packet_loss.push(MeasuredLine {
                    line_no,
                    value: loss,
                    text: text.to_string(),
                });
            }
        }

        if DHCP_EVENT.is_match(raw) {
            analysis.dhcp_events.push(entry());
        }

        if denied || connection_error {
            if let Some(bucket) = hour_bucket(raw) {
                *analysis.error_timeline.entry(bucket).or_insert(0) += 1;
            }
        }
    }

    analysis
}

fn capture_number(pattern: &Regex, group: &str, line: &str) -> Option<f64> {
    pattern
        .captures(line)?
        .name(group)?
        .as_str()
        .parse::<f64>()
        .ok()
}

/// Read a log file (invalid UTF-8 is replaced) and analyze it
pub async fn analyze_file(path: &Path) -> Result<NetLogAnalysis> {
    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);
    tracing::debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(analyze(&path.display().to_string(), &content))
}

fn sample(text: &str) -> String {
    text.chars().take(SAMPLE_WIDTH).collect()
}

fn sorted_by_value(lines: &[MeasuredLine]) -> Vec<&MeasuredLine> {
    let mut sorted: Vec<&MeasuredLine> = lines.iter().collect();
    sorted.sort_by(|a, b| b.value.total_cmp(&a.value));
    sorted
}

pub fn render_report(analysis: &NetLogAnalysis, top_n: usize, generated_at: DateTime<Local>) -> String {
    let border = "=".repeat(72);
    let mut out: Vec<String> = vec![
        border.clone(),
        "  NETWORK LOG TROUBLESHOOTING REPORT".to_string(),
        format!("  Source: {}", analysis.source),
        format!("  Total lines parsed: {}", analysis.total_lines),
        format!("  Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        border.clone(),
    ];

    out.push("\n[SUMMARY]".to_string());
    out.push(format!("  Firewall DENY/DROP entries   : {}", analysis.denied.len()));
    out.push(format!("  Firewall ALLOW entries       : {}", analysis.allowed.len()));
    out.push(format!("  Connection errors            : {}", analysis.connection_errors.len()));
    out.push(format!("  DNS failures                 : {}", analysis.dns_failures.len()));
    out.push(format!("  DNS queries                  : {}", analysis.dns_queries.len()));
    out.push(format!("  High-latency entries (>100ms): {}", analysis.high_latency.len()));
    out.push(format!("  Packet-loss entries (>0%)    : {}", analysis.packet_loss.len()));
    out.push(format!("  DHCP events                  : {}", analysis.dhcp_events.len()));

    let tallies = [
        (&analysis.denied_ips, "IPs IN DENY/DROP ENTRIES", "hits"),
        (&analysis.source_ips, "SOURCE IPs", "occurrences"),
        (&analysis.dest_ips, "DESTINATION IPs", "occurrences"),
    ];
    for (tally, title, unit) in tallies {
        if tally.is_empty() {
            continue;
        }
        out.push(format!("\n[TOP {} {}]", top_n, title));
        for (ip, count) in tally.most_common(top_n) {
            out.push(format!("  {:<20} {} {}", ip, count, unit));
        }
    }

    if !analysis.ports.is_empty() {
        out.push(format!("\n[TOP {} TARGETED PORTS]", top_n));
        for (port, count) in analysis.ports.most_common(top_n) {
            out.push(format!("  Port {:<10} {} occurrences", port, count));
        }
    }

    if !analysis.error_timeline.is_empty() {
        out.push("\n[ERROR TIMELINE (errors per hour)]".to_string());
        for (bucket, count) in &analysis.error_timeline {
            let bar = "#".repeat((*count).min(TIMELINE_BAR_MAX));
            out.push(format!("  {}  {:>5}  {}", bucket, count, bar));
        }
    }

    let samples = [
        ("CONNECTION ERRORS", &analysis.connection_errors),
        ("DNS FAILURES", &analysis.dns_failures),
    ];
    for (title, lines) in samples {
        push_samples(&mut out, title, lines, top_n);
    }

    if !analysis.high_latency.is_empty() {
        out.push(format!("\n[HIGH LATENCY ENTRIES (first {})]", top_n));
        for line in sorted_by_value(&analysis.high_latency).into_iter().take(top_n) {
            out.push(format!(
                "  Line {} ({:.1} ms): {}",
                line.line_no,
                line.value,
                sample(&line.text)
            ));
        }
    }

    if !analysis.packet_loss.is_empty() {
        out.push(format!("\n[PACKET LOSS ENTRIES (first {})]", top_n));
        for line in sorted_by_value(&analysis.packet_loss).into_iter().take(top_n) {
            out.push(format!(
                "  Line {} ({:.1}% loss): {}",
                line.line_no,
                line.value,
                sample(&line.text)
            ));
        }
    }

    push_samples(&mut out, "DHCP EVENTS", &analysis.dhcp_events, top_n);
    push_samples(&mut out, "FIREWALL DENY/DROP SAMPLE", &analysis.denied, top_n);

    out.push(format!("\n{}", border));
    out.push("  END OF REPORT".to_string());
    out.push(format!("{}\n", border));

    out.join("\n")
}

fn push_samples(out: &mut Vec<String>, title: &str, lines: &[LogLine], top_n: usize) {
    if lines.is_empty() {
        return;
    }
    out.push(format!("\n[{} (first {})]", title, top_n));
    for line in lines.iter().take(top_n) {
        out.push(format!("  Line {}: {}", line.line_no, sample(&line.text)));
    }
}
