//! Prompt text
//!
//! All fixed instruction text lives here as constants; prompt assembly is pure.

use foundry_sentinel::SecurityThreat;
use std::fmt::Write as _;

/// System instruction for single-shot generation
pub const SINGLE_SHOT_SYSTEM: &str = "You are an expert programmer. Generate only clean, secure code \
     without explanations, in a single fenced code block.";

/// Remediation checklist appended to every feedback prompt, version 1
pub const REMEDIATION_CHECKLIST_V1: [&str; 6] = [
    "Remove all eval(), exec() and compile() calls",
    "Use parameterized SQL queries (?, placeholders)",
    "Avoid shell=True in subprocess calls",
    "Use safe_load instead of load for YAML and never unpickle untrusted data",
    "Validate all user input",
    "Never use sudo or other privileged commands",
];

/// Directive appended to every streaming agent's instructions
pub const CLOSING_DIRECTIVE: &str = "\n\nWhen you propose a change to a file, put the complete file \
     content in a single fenced code block. End your answer with a short \"Next steps\" list \
     summarizing follow-up tasks. The following tool endpoints are available to the operator: \
     /tools/git (status, diff, commit), /tools/packages (install dependencies), \
     /tools/history (list and restore file versions).";

/// Directive appended in planning mode
pub const PLANNING_DIRECTIVE: &str = "\n\nPLANNING MODE: describe the plan step by step. \
     Do not write code blocks.";

/// Retry prompt for a rejected attempt
///
/// Always built from the original request so retries never compound.
#[must_use]
pub fn build_feedback_prompt(original: &str, threats: &[SecurityThreat]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ORIGINAL REQUEST:\n{original}\n");
    let _ = writeln!(out, "THE GENERATED CODE CONTAINS SECURITY VULNERABILITIES:");
    for threat in threats.iter().filter(|t| t.is_critical()) {
        let _ = writeln!(
            out,
            "- Line {}: {} ({})",
            threat.line_number, threat.description, threat.category
        );
    }
    let _ = writeln!(out, "\nREMEDIATION INSTRUCTIONS:");
    for (idx, item) in REMEDIATION_CHECKLIST_V1.iter().enumerate() {
        let _ = writeln!(out, "{}. {item}", idx + 1);
    }
    let _ = write!(
        out,
        "\nGenerate CORRECT and SECURE code that fulfils the original request."
    );
    out
}

/// System instructions for a streaming agent
#[must_use]
pub fn agent_system_prompt(role: &str, planning: bool) -> String {
    let mut system = String::with_capacity(role.len() + CLOSING_DIRECTIVE.len());
    system.push_str(role);
    system.push_str(CLOSING_DIRECTIVE);
    if planning {
        system.push_str(PLANNING_DIRECTIVE);
    }
    system
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_sentinel::{Severity, ThreatCategory};

    fn threat(severity: Severity, category: ThreatCategory, line: usize) -> SecurityThreat {
        SecurityThreat {
            severity,
            category,
            description: category.description().to_string(),
            line_number: line,
            code_snippet: String::new(),
        }
    }

    #[test]
    fn feedback_lists_only_critical_threats() {
        let prompt = build_feedback_prompt(
            "write a calculator",
            &[
                threat(Severity::Critical, ThreatCategory::CodeExecution, 4),
                threat(Severity::Medium, ThreatCategory::NetworkRisk, 9),
            ],
        );

        assert!(prompt.starts_with("ORIGINAL REQUEST:\nwrite a calculator\n"));
        assert!(prompt.contains("- Line 4:"));
        assert!(prompt.contains("(code-execution)"));
        assert!(!prompt.contains("Line 9"));
        assert!(prompt.contains("6. Never use sudo"));
    }

    #[test]
    fn feedback_is_pure() {
        let threats = [threat(Severity::Critical, ThreatCategory::Xss, 1)];
        assert_eq!(
            build_feedback_prompt("a", &threats),
            build_feedback_prompt("a", &threats)
        );
    }

    #[test]
    fn agent_prompt_advertises_tools() {
        let system = agent_system_prompt("You review code.", false);
        assert!(system.starts_with("You review code."));
        for endpoint in ["/tools/git", "/tools/packages", "/tools/history"] {
            assert!(system.contains(endpoint));
        }
        assert!(!system.contains("PLANNING MODE"));
        assert!(agent_system_prompt("x", true).ends_with(PLANNING_DIRECTIVE));
    }
}
