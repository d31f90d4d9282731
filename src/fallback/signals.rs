//! Signal tables for the rule-based classifier
//!
//! Each table is an explicit ordered list of (pattern, weight, description)
//! tuples so individual rules can be unit-tested and reweighted without
//! touching the scoring pipeline. Patterns are matched case-insensitively
//! against the combined incident log text; each rule contributes at most
//! once per classification.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Which side of the verdict a signal pushes toward, or which heuristic
/// family produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalCategory {
    /// Known-hostile tooling or tradecraft
    CriticalThreat,
    /// Reconnaissance or dual-use activity
    Suspicious,
    /// Routine administrative or security-software activity
    Legitimate,
    Behavioral,
    Temporal,
    Network,
    Statistical,
    ThreatIntel,
    Context,
}

/// One matched rule, recorded for scoring and for the verdict explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedSignal {
    pub description: String,
    pub weight: f64,
    pub category: SignalCategory,
}

impl MatchedSignal {
    pub fn new(description: impl Into<String>, weight: f64, category: SignalCategory) -> Self {
        Self {
            description: description.into(),
            weight,
            category,
        }
    }
}

/// A single table entry. `pattern` is a regex source compiled once at first use.
pub struct SignalRule {
    pub pattern: &'static str,
    pub weight: f64,
    pub category: SignalCategory,
    pub description: &'static str,
}

/// Critical-threat tradecraft. Weights 25-35, scored toward true-positive.
pub const CRITICAL_RULES: &[SignalRule] = &[
    SignalRule {
        pattern: r"mimikatz|sekurlsa|invoke-mimikatz",
        weight: 35.0,
        category: SignalCategory::CriticalThreat,
        description: "Credential-dumping tool usage (Mimikatz)",
    },
    SignalRule {
        pattern: r"lsass(\.exe)?[^\n]{0,60}(dump|--dump-memory)|procdump[^\n]{0,60}lsass|comsvcs\.dll[^\n]{0,60}minidump",
        weight: 30.0,
        category: SignalCategory::CriticalThreat,
        description: "LSASS process memory access",
    },
    SignalRule {
        pattern: r"vssadmin\s+delete\s+shadows|wbadmin\s+delete\s+catalog|bcdedit\s+/set\s+\S*recoveryenabled\s+no",
        weight: 32.0,
        category: SignalCategory::CriticalThreat,
        description: "Shadow copy / recovery deletion (ransomware precursor)",
    },
    SignalRule {
        pattern: r"-enc(odedcommand)?\s+[A-Za-z0-9+/=]{16,}|frombase64string|iex\s*\(\s*new-object",
        weight: 28.0,
        category: SignalCategory::CriticalThreat,
        description: "Obfuscated shell execution",
    },
    SignalRule {
        pattern: r"certutil\S*\s+\S*(-urlcache|-decode)|regsvr32\s+\S*/i:https?|mshta\s+https?|rundll32[^\n]{0,60}javascript:",
        weight: 27.0,
        category: SignalCategory::CriticalThreat,
        description: "Living-off-the-land binary abuse",
    },
    SignalRule {
        pattern: r"reg(\.exe)?\s+save\s+hklm\\(sam|security|system)",
        weight: 29.0,
        category: SignalCategory::CriticalThreat,
        description: "Registry hive export targeting credentials",
    },
];

/// Reconnaissance and dual-use tooling. Weights 8-22, toward true-positive.
pub const SUSPICIOUS_RULES: &[SignalRule] = &[
    SignalRule {
        pattern: r"bloodhound|sharphound|adfind",
        weight: 22.0,
        category: SignalCategory::Suspicious,
        description: "Active Directory attack-path enumeration",
    },
    SignalRule {
        pattern: r"psexec|wmic\s+/node:|winrs\s+-r:",
        weight: 18.0,
        category: SignalCategory::Suspicious,
        description: "Remote execution tooling",
    },
    SignalRule {
        pattern: r"nmap|masscan",
        weight: 16.0,
        category: SignalCategory::Suspicious,
        description: "Port scanning activity",
    },
    SignalRule {
        pattern: r"net\s+(user|group|localgroup)\s|nltest\s+/dclist|dsquery",
        weight: 14.0,
        category: SignalCategory::Suspicious,
        description: "Account and domain enumeration commands",
    },
    SignalRule {
        pattern: r"schtasks\s+/create|new-scheduledtask",
        weight: 13.0,
        category: SignalCategory::Suspicious,
        description: "Scheduled task creation",
    },
    SignalRule {
        pattern: r"whoami\s+/all|systeminfo|ipconfig\s+/all|arp\s+-a",
        weight: 10.0,
        category: SignalCategory::Suspicious,
        description: "Host reconnaissance commands",
    },
    SignalRule {
        pattern: r"anydesk|teamviewer|screenconnect|atera",
        weight: 12.0,
        category: SignalCategory::Suspicious,
        description: "Remote-admin tool presence",
    },
    SignalRule {
        pattern: r"(curl|wget|invoke-webrequest)\s+\S*https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
        weight: 11.0,
        category: SignalCategory::Suspicious,
        description: "Download from a raw IP address",
    },
];

/// Routine activity that explains alerts away. Weights 5-15, toward
/// false-positive.
pub const LEGITIMATE_RULES: &[SignalRule] = &[
    SignalRule {
        pattern: r"windows\s+update|wuauclt|usoclient|software\s+update",
        weight: 12.0,
        category: SignalCategory::Legitimate,
        description: "Operating system update activity",
    },
    SignalRule {
        pattern: r"windows\s+defender|mpcmdrun|antivirus\s+scan|defender\s+scan|security\s+scan",
        weight: 14.0,
        category: SignalCategory::Legitimate,
        description: "Security software operation",
    },
    SignalRule {
        pattern: r"scheduled\s+maintenance|maintenance\s+window|patch\s+deployment",
        weight: 10.0,
        category: SignalCategory::Legitimate,
        description: "Scheduled maintenance activity",
    },
    SignalRule {
        pattern: r"backup\s+(job|completed|started)|veeam|wbadmin\s+start\s+backup",
        weight: 11.0,
        category: SignalCategory::Legitimate,
        description: "Backup software activity",
    },
    SignalRule {
        pattern: r"sccm|configuration\s+manager|intune|group\s+policy\s+(update|refresh)",
        weight: 9.0,
        category: SignalCategory::Legitimate,
        description: "Endpoint management tooling",
    },
    SignalRule {
        pattern: r"svchost(\.exe)?\s+-k\s+(netsvcs|localservice)",
        weight: 6.0,
        category: SignalCategory::Legitimate,
        description: "Standard OS service host activity",
    },
];

fn compile(rules: &'static [SignalRule]) -> Vec<(Regex, &'static SignalRule)> {
    rules
        .iter()
        .filter_map(|rule| {
            RegexBuilder::new(rule.pattern)
                .case_insensitive(true)
                .build()
                .ok()
                .map(|re| (re, rule))
        })
        .collect()
}

static CRITICAL: Lazy<Vec<(Regex, &'static SignalRule)>> = Lazy::new(|| compile(CRITICAL_RULES));
static SUSPICIOUS: Lazy<Vec<(Regex, &'static SignalRule)>> =
    Lazy::new(|| compile(SUSPICIOUS_RULES));
static LEGITIMATE: Lazy<Vec<(Regex, &'static SignalRule)>> =
    Lazy::new(|| compile(LEGITIMATE_RULES));

fn scan_table(
    compiled: &[(Regex, &'static SignalRule)],
    text: &str,
    out: &mut Vec<MatchedSignal>,
) {
    for (re, rule) in compiled {
        if re.is_match(text) {
            out.push(MatchedSignal::new(
                rule.description,
                rule.weight,
                rule.category,
            ));
        }
    }
}

/// Match every table against the incident text. Output order is table order
/// (critical, suspicious, legitimate) so scoring and explanations are
/// deterministic.
pub fn scan(text: &str) -> Vec<MatchedSignal> {
    let mut matched = Vec::new();
    scan_table(&CRITICAL, text, &mut matched);
    scan_table(&SUSPICIOUS, text, &mut matched);
    scan_table(&LEGITIMATE, text, &mut matched);
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions(text: &str) -> Vec<String> {
        scan(text).into_iter().map(|s| s.description).collect()
    }

    #[test]
    fn test_mimikatz_matches_credential_dumping() {
        let matched = scan("User ran mimikatz.exe on host");
        assert!(matched
            .iter()
            .any(|s| s.description.contains("Credential-dumping")));
        assert!(matched.iter().all(|s| s.weight >= 25.0));
    }

    #[test]
    fn test_lsass_dump_matches() {
        assert!(descriptions("lsass.exe --dump-memory invoked")
            .iter()
            .any(|d| d.contains("LSASS")));
        assert!(descriptions("procdump.exe -ma lsass output.dmp")
            .iter()
            .any(|d| d.contains("LSASS")));
    }

    #[test]
    fn test_shadow_copy_deletion_matches() {
        let matched = scan("cmd: vssadmin delete shadows /all /quiet");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].category, SignalCategory::CriticalThreat);
        assert!((matched[0].weight - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(!scan("VSSADMIN DELETE SHADOWS /ALL").is_empty());
        assert!(!scan("Windows Update completed").is_empty());
    }

    #[test]
    fn test_legitimate_rules_do_not_fire_on_hostile_text() {
        let matched = scan("mimikatz sekurlsa::logonpasswords");
        assert!(matched
            .iter()
            .all(|s| s.category != SignalCategory::Legitimate));
    }

    #[test]
    fn test_each_rule_fires_once() {
        // Two distinct mimikatz mentions still produce one signal.
        let matched = scan("mimikatz started; mimikatz finished");
        let hits = matched
            .iter()
            .filter(|s| s.description.contains("Credential-dumping"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_benign_text_matches_nothing() {
        assert!(scan("Routine status check completed without findings").is_empty());
    }

    #[test]
    fn test_weight_ranges_per_table() {
        for rule in CRITICAL_RULES {
            assert!((25.0..=35.0).contains(&rule.weight), "{}", rule.description);
        }
        for rule in SUSPICIOUS_RULES {
            assert!((8.0..=22.0).contains(&rule.weight), "{}", rule.description);
        }
        for rule in LEGITIMATE_RULES {
            assert!((5.0..=15.0).contains(&rule.weight), "{}", rule.description);
        }
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(CRITICAL.len(), CRITICAL_RULES.len());
        assert_eq!(SUSPICIOUS.len(), SUSPICIOUS_RULES.len());
        assert_eq!(LEGITIMATE.len(), LEGITIMATE_RULES.len());
    }
}
