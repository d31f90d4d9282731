//! Heuristic sub-scores for the rule-based classifier
//!
//! Behavioral, temporal, network and statistical bonuses layered on top of
//! the signal tables. Every function here is pure: same text (and timestamp)
//! in, same score out. Each family has a documented cap so a single noisy
//! log cannot dominate the verdict.

use chrono::{DateTime, Datelike, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::signals::{MatchedSignal, SignalCategory};

/// Cap on process-chaining bonuses
pub const BEHAVIORAL_CHAIN_CAP: f64 = 18.0;
/// Cap on command-frequency bonus
pub const COMMAND_FREQUENCY_CAP: f64 = 20.0;
/// Cap on encoded-payload bonus
pub const ENCODED_PAYLOAD_CAP: f64 = 15.0;

const CHAIN_BONUS_PER_MATCH: f64 = 6.0;
const COMMAND_LINE_THRESHOLD: usize = 12;
const BASE64_TOKEN_BONUS: f64 = 5.0;

static SUSPICIOUS_CHAINS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"(?i)(winword|excel|outlook|powerpnt)[^\n]{0,80}(powershell|cmd\.exe|wscript|mshta)",
            "Office application spawning a shell",
        ),
        (
            r"(?i)(services|spoolsv|lsass)\.exe[^\n]{0,80}(cmd|powershell)\.exe",
            "System process spawning a shell",
        ),
        (
            r"(?i)powershell[^\n]{0,80}-nop\b|powershell[^\n]{0,80}-w(indowstyle)?\s+hidden",
            "Shell launched with evasion flags",
        ),
        (
            r"(?i)cmd(\.exe)?\s*/c[^\n]{0,120}&&",
            "Chained one-liner command execution",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, desc)| Regex::new(pattern).ok().map(|re| (re, desc)))
    .collect()
});

static COMMAND_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^.*(\.exe\b|^\s*(cmd|powershell|bash|sh)\b)").unwrap());
static BASE64_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9+/]{40,}={0,2}").unwrap());
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2}):(\d{2}):(\d{2})\b").unwrap());
static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\b").unwrap());
static HEX_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9a-fA-F]{32,}\b").unwrap());

/// Ports that rarely appear in benign workstation logs
const SENSITIVE_PORTS: &[u16] = &[4444, 1337, 3389, 445, 135, 5985, 23, 6667];

/// Process chaining, execution frequency and encoded payloads.
pub fn behavioral_score(text: &str) -> (f64, Vec<MatchedSignal>) {
    let mut score = 0.0;
    let mut matched = Vec::new();

    let mut chain_score = 0.0;
    for (re, description) in SUSPICIOUS_CHAINS.iter() {
        if re.is_match(text) {
            chain_score += CHAIN_BONUS_PER_MATCH;
            if chain_score <= BEHAVIORAL_CHAIN_CAP {
                matched.push(MatchedSignal::new(
                    *description,
                    CHAIN_BONUS_PER_MATCH,
                    SignalCategory::Behavioral,
                ));
            }
        }
    }
    score += chain_score.min(BEHAVIORAL_CHAIN_CAP);

    let command_lines = COMMAND_LINE.find_iter(text).count();
    if command_lines > COMMAND_LINE_THRESHOLD {
        let bonus = (((command_lines - COMMAND_LINE_THRESHOLD) as f64) * 2.0)
            .min(COMMAND_FREQUENCY_CAP);
        score += bonus;
        matched.push(MatchedSignal::new(
            format!(
                "High command-execution frequency ({} command lines)",
                command_lines
            ),
            bonus,
            SignalCategory::Behavioral,
        ));
    }

    let base64_tokens = BASE64_TOKEN.find_iter(text).count();
    if base64_tokens > 0 {
        let bonus = ((base64_tokens as f64) * BASE64_TOKEN_BONUS).min(ENCODED_PAYLOAD_CAP);
        score += bonus;
        matched.push(MatchedSignal::new(
            format!("{} long base64-like token(s) present", base64_tokens),
            bonus,
            SignalCategory::Behavioral,
        ));
    }

    (score, matched)
}

const OFF_HOURS_BONUS: f64 = 12.0;
const WEEKEND_BONUS: f64 = 8.0;
const BURST_BONUS: f64 = 10.0;
const BURST_WINDOW_SECS: i64 = 60;
const BURST_MIN_EVENTS: usize = 5;

/// Off-hours activity and timestamp bursts.
pub fn temporal_score(text: &str, occurred_at: Option<DateTime<Utc>>) -> (f64, Vec<MatchedSignal>) {
    let mut score = 0.0;
    let mut matched = Vec::new();

    if let Some(at) = occurred_at {
        let hour = at.hour();
        if !(6..22).contains(&hour) {
            score += OFF_HOURS_BONUS;
            matched.push(MatchedSignal::new(
                format!("Activity at {:02}:00 UTC, outside business hours", hour),
                OFF_HOURS_BONUS,
                SignalCategory::Temporal,
            ));
        }
        if matches!(at.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            score += WEEKEND_BONUS;
            matched.push(MatchedSignal::new(
                "Weekend activity",
                WEEKEND_BONUS,
                SignalCategory::Temporal,
            ));
        }
    }

    // Burst detection: many in-text timestamps landing inside a short window.
    let mut seconds: Vec<i64> = TIMESTAMP
        .captures_iter(text)
        .filter_map(|cap| {
            let h: i64 = cap[1].parse().ok()?;
            let m: i64 = cap[2].parse().ok()?;
            let s: i64 = cap[3].parse().ok()?;
            (h < 24 && m < 60 && s < 60).then_some(h * 3600 + m * 60 + s)
        })
        .collect();
    seconds.sort_unstable();
    if seconds.len() >= BURST_MIN_EVENTS {
        let burst = seconds
            .windows(BURST_MIN_EVENTS)
            .any(|w| w[BURST_MIN_EVENTS - 1] - w[0] <= BURST_WINDOW_SECS);
        if burst {
            score += BURST_BONUS;
            matched.push(MatchedSignal::new(
                format!("{} timestamped events in rapid succession", seconds.len()),
                BURST_BONUS,
                SignalCategory::Temporal,
            ));
        }
    }

    (score, matched)
}

const SENSITIVE_PORT_BONUS: f64 = 8.0;
const SENSITIVE_PORT_CAP: f64 = 16.0;
const PUBLIC_IP_LOW_BONUS: f64 = 8.0;
const PUBLIC_IP_HIGH_BONUS: f64 = 14.0;
const PUBLIC_IP_LOW_COUNT: usize = 3;
const PUBLIC_IP_HIGH_COUNT: usize = 6;

fn is_private_ip(octets: [u8; 4]) -> bool {
    match octets {
        [10, ..] | [127, ..] | [192, 168, ..] | [169, 254, ..] => true,
        [172, b, ..] => (16..=31).contains(&b),
        _ => false,
    }
}

/// Sensitive-port references and public-IP density.
pub fn network_score(text: &str) -> (f64, Vec<MatchedSignal>) {
    let mut score = 0.0;
    let mut matched = Vec::new();

    let lowered = text.to_lowercase();
    let mut port_score = 0.0;
    for port in SENSITIVE_PORTS {
        let needle_colon = format!(":{}", port);
        let needle_word = format!("port {}", port);
        if text.contains(&needle_colon) || lowered.contains(&needle_word) {
            if port_score < SENSITIVE_PORT_CAP {
                matched.push(MatchedSignal::new(
                    format!("Reference to sensitive port {}", port),
                    SENSITIVE_PORT_BONUS,
                    SignalCategory::Network,
                ));
            }
            port_score += SENSITIVE_PORT_BONUS;
        }
    }
    score += port_score.min(SENSITIVE_PORT_CAP);

    let mut public_ips = std::collections::BTreeSet::new();
    for cap in IPV4.captures_iter(text) {
        let octets: Option<Vec<u8>> = (1..=4).map(|i| cap[i].parse().ok()).collect();
        if let Some(o) = octets {
            if !is_private_ip([o[0], o[1], o[2], o[3]]) {
                public_ips.insert(cap[0].to_string());
            }
        }
    }
    if public_ips.len() >= PUBLIC_IP_HIGH_COUNT {
        score += PUBLIC_IP_HIGH_BONUS;
        matched.push(MatchedSignal::new(
            format!("{} distinct public IP addresses", public_ips.len()),
            PUBLIC_IP_HIGH_BONUS,
            SignalCategory::Network,
        ));
    } else if public_ips.len() >= PUBLIC_IP_LOW_COUNT {
        score += PUBLIC_IP_LOW_BONUS;
        matched.push(MatchedSignal::new(
            format!("{} distinct public IP addresses", public_ips.len()),
            PUBLIC_IP_LOW_BONUS,
            SignalCategory::Network,
        ));
    }

    (score, matched)
}

const SPECIAL_CHAR_DENSITY_THRESHOLD: f64 = 0.25;
const SPECIAL_CHAR_BONUS: f64 = 8.0;
const REPETITION_RATIO_THRESHOLD: f64 = 0.3;
const REPETITION_MIN_WORDS: usize = 30;
const REPETITION_BONUS: f64 = 6.0;
const LARGE_PAYLOAD_CHARS: usize = 10_000;
const LARGE_PAYLOAD_BONUS: f64 = 8.0;
const HEX_TOKEN_THRESHOLD: usize = 3;
const HEX_TOKEN_BONUS: f64 = 9.0;

/// Distributional oddities: packed payloads, repeated flood lines, hex spray.
pub fn statistical_score(text: &str) -> (f64, Vec<MatchedSignal>) {
    let mut score = 0.0;
    let mut matched = Vec::new();

    let total_chars = text.chars().count();
    if total_chars > 0 {
        let special = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        let density = special as f64 / total_chars as f64;
        if density > SPECIAL_CHAR_DENSITY_THRESHOLD {
            score += SPECIAL_CHAR_BONUS;
            matched.push(MatchedSignal::new(
                format!("Abnormal special-character density ({:.0}%)", density * 100.0),
                SPECIAL_CHAR_BONUS,
                SignalCategory::Statistical,
            ));
        }
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() >= REPETITION_MIN_WORDS {
        let distinct: std::collections::HashSet<&str> = words.iter().copied().collect();
        let ratio = distinct.len() as f64 / words.len() as f64;
        if ratio < REPETITION_RATIO_THRESHOLD {
            score += REPETITION_BONUS;
            matched.push(MatchedSignal::new(
                format!("High word repetition (distinct ratio {:.2})", ratio),
                REPETITION_BONUS,
                SignalCategory::Statistical,
            ));
        }
    }

    if total_chars > LARGE_PAYLOAD_CHARS {
        score += LARGE_PAYLOAD_BONUS;
        matched.push(MatchedSignal::new(
            format!("Unusually large payload ({} chars)", total_chars),
            LARGE_PAYLOAD_BONUS,
            SignalCategory::Statistical,
        ));
    }

    let hex_tokens = HEX_TOKEN.find_iter(text).count();
    if hex_tokens >= HEX_TOKEN_THRESHOLD {
        score += HEX_TOKEN_BONUS;
        matched.push(MatchedSignal::new(
            format!("{} long hexadecimal tokens", hex_tokens),
            HEX_TOKEN_BONUS,
            SignalCategory::Statistical,
        ));
    }

    (score, matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_behavioral_office_chain() {
        let (score, matched) =
            behavioral_score("WINWORD.EXE launched powershell.exe -nop -w hidden");
        assert!(score >= CHAIN_BONUS_PER_MATCH);
        assert!(matched
            .iter()
            .any(|s| s.description.contains("Office application")));
    }

    #[test]
    fn test_behavioral_base64_cap() {
        let token = "QWxhZGRpbjpvcGVuIHNlc2FtZWFiY2RlZmdoaWprbG1ub3A=";
        let text = format!("{t} {t} {t} {t} {t}", t = token);
        let (score, _) = behavioral_score(&text);
        assert!(score <= ENCODED_PAYLOAD_CAP);
    }

    #[test]
    fn test_behavioral_benign_text_scores_zero() {
        let (score, matched) = behavioral_score("Nightly job finished without incident");
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_temporal_off_hours() {
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 3, 12, 0).unwrap();
        let (score, matched) = temporal_score("no timestamps here", Some(at));
        assert_eq!(score, OFF_HOURS_BONUS);
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn test_temporal_business_hours_weekday_scores_zero() {
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 14, 0, 0).unwrap();
        let (score, _) = temporal_score("nothing", Some(at));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_temporal_burst_detection() {
        let text = "10:00:01 a\n10:00:05 b\n10:00:09 c\n10:00:15 d\n10:00:21 e\n";
        let (score, matched) = temporal_score(text, None);
        assert_eq!(score, BURST_BONUS);
        assert!(matched[0].description.contains("rapid succession"));
    }

    #[test]
    fn test_temporal_spread_timestamps_no_burst() {
        let text = "01:00:00 a\n04:00:00 b\n09:00:00 c\n14:00:00 d\n20:00:00 e\n";
        let (score, _) = temporal_score(text, None);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_network_sensitive_port() {
        let (score, matched) = network_score("connection to 192.168.1.5:4444 established");
        assert_eq!(score, SENSITIVE_PORT_BONUS);
        assert!(matched[0].description.contains("4444"));
    }

    #[test]
    fn test_network_public_ip_density() {
        let text = "203.0.113.1 198.51.100.2 192.0.2.3 traffic observed";
        let (score, _) = network_score(text);
        assert_eq!(score, PUBLIC_IP_LOW_BONUS);
    }

    #[test]
    fn test_network_private_ips_ignored() {
        let text = "10.0.0.1 192.168.0.1 172.16.0.1 127.0.0.1";
        let (score, matched) = network_score(text);
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_statistical_hex_spray() {
        let text = "deadbeefdeadbeefdeadbeefdeadbeef11 cafebabecafebabecafebabecafebabe22 0123456789abcdef0123456789abcdef33";
        let (score, matched) = statistical_score(text);
        assert!(score >= HEX_TOKEN_BONUS);
        assert!(matched
            .iter()
            .any(|s| s.description.contains("hexadecimal")));
    }

    #[test]
    fn test_statistical_plain_sentence_scores_zero() {
        let (score, matched) = statistical_score("The scheduled job finished without errors.");
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_statistical_repetition() {
        let text = "fail login fail login ".repeat(20);
        let (score, matched) = statistical_score(&text);
        assert!(score >= REPETITION_BONUS);
        assert!(matched.iter().any(|s| s.description.contains("repetition")));
    }
}
