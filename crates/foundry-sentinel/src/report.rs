//! Scan verdicts and operator-facing reports

use crate::threat::{SecurityThreat, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const RULE: &str = "======================================================================";

/// Result of a sentinel scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// True iff no threat is `CRITICAL`
    pub is_safe: bool,
    /// All threats, in scan order
    pub threats: Vec<SecurityThreat>,
}

impl ScanReport {
    /// Build a report, deriving the verdict from the threats
    #[must_use]
    pub fn new(threats: Vec<SecurityThreat>) -> Self {
        let is_safe = !threats.iter().any(SecurityThreat::is_critical);
        Self { is_safe, threats }
    }

    /// Blocking threats only
    pub fn critical(&self) -> impl Iterator<Item = &SecurityThreat> {
        self.threats.iter().filter(|t| t.is_critical())
    }

    /// Threat counts in report order (`CRITICAL, HIGH, MEDIUM, LOW`), zeros omitted
    #[must_use]
    pub fn count_by_severity(&self) -> Vec<(Severity, usize)> {
        Severity::ORDER
            .iter()
            .map(|s| (*s, self.threats.iter().filter(|t| t.severity == *s).count()))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// Human-readable report grouped by severity
    ///
    /// For operator diagnostics only; never parse this.
    #[must_use]
    pub fn render(&self) -> String {
        if self.threats.is_empty() {
            return "Code is safe - no threats detected.".to_string();
        }

        let mut out = String::new();
        let _ = writeln!(out, "\n{RULE}");
        let _ = writeln!(out, "SECURITY SENTINEL - THREAT REPORT");
        let _ = writeln!(out, "{RULE}");

        for (severity, count) in self.count_by_severity() {
            let _ = writeln!(out, "\n[{severity}] Detected: {count} threat(s)\n");
            for threat in self.threats.iter().filter(|t| t.severity == severity) {
                let _ = writeln!(out, "  Line {}: {}", threat.line_number, threat.description);
                let _ = writeln!(out, "  Category: {}", threat.category);
                let _ = writeln!(out, "  Code: {}", threat.code_snippet);
                let _ = writeln!(out);
            }
        }

        out.push_str(RULE);
        out
    }
}
