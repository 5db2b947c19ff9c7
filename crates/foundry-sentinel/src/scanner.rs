//! Line scanner
//!
//! Applies every rule of a [`RuleSet`] to every non-comment line of the input.

use crate::report::ScanReport;
use crate::rules::RuleSet;
use crate::threat::SecurityThreat;
use std::sync::Arc;

/// Comment prefixes; lines starting with these (after trimming) are skipped
const COMMENT_PREFIXES: &[&str] = &["#", "//"];

/// Security Sentinel
///
/// Stateless and cheap to clone; the compiled rule table is shared.
#[derive(Debug, Clone)]
pub struct Sentinel {
    rules: Arc<RuleSet>,
}

impl Sentinel {
    /// Sentinel with the built-in rule table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: RuleSet::shared_default(),
        }
    }

    /// Sentinel with a custom rule table
    #[inline]
    #[must_use]
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Active rule table
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Scan code for threats
    ///
    /// Every matching pattern produces one threat. Threats are ordered by
    /// rule, then line, then pattern. The report is safe iff no threat is
    /// `CRITICAL`.
    #[must_use]
    pub fn scan(&self, code: &str) -> ScanReport {
        let lines: Vec<(usize, &str)> = code
            .split('\n')
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(_, line)| !is_comment(line))
            .collect();

        let mut threats = Vec::new();
        for rule in self.rules.rules() {
            for (line_number, line) in &lines {
                for matcher in rule.matchers() {
                    if matcher.matches(line) {
                        threats.push(SecurityThreat {
                            severity: rule.severity,
                            category: rule.category,
                            description: rule.category.description().to_string(),
                            line_number: *line_number,
                            code_snippet: line.trim().to_string(),
                        });
                    }
                }
            }
        }

        let report = ScanReport::new(threats);
        tracing::debug!(
            safe = report.is_safe,
            threats = report.threats.len(),
            "sentinel scan complete"
        );
        report
    }
}

impl Default for Sentinel {
    fn default() -> Self {
        Self::new()
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}
