//! Threat model
//!
//! Severity levels, threat categories, and the per-match [`SecurityThreat`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Threat severity
///
/// Only [`Severity::Critical`] affects the safe/unsafe verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Blocks the write
    Critical,
    /// Reserved for future rules
    High,
    /// Warning only
    Medium,
    /// Informational
    Low,
}

impl Severity {
    /// Fixed report order
    pub const ORDER: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Upper-case label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threat category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreatCategory {
    /// eval/exec/compile, dynamic import
    CodeExecution,
    /// Formatted or concatenated text passed to a query call
    SqlInjection,
    /// Unescaped DOM injection
    Xss,
    /// Shell invocation with shell interpretation enabled
    UnsafeSystemCall,
    /// sudo, setuid(0), runas administrator
    PrivilegeEscalation,
    /// Deserializing untrusted streams without a safe mode
    UnsafeDeserialization,
    /// Importing modules that enable arbitrary deserialization
    UnsafeLibraryImport,
    /// Disabled TLS verification, raw URL opening
    NetworkRisk,
    /// Unguarded destructive or raw file operations
    UncheckedFileOperation,
}

impl ThreatCategory {
    /// Kebab-case identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::CodeExecution => "code-execution",
            ThreatCategory::SqlInjection => "sql-injection",
            ThreatCategory::Xss => "xss",
            ThreatCategory::UnsafeSystemCall => "unsafe-system-call",
            ThreatCategory::PrivilegeEscalation => "privilege-escalation",
            ThreatCategory::UnsafeDeserialization => "unsafe-deserialization",
            ThreatCategory::UnsafeLibraryImport => "unsafe-library-import",
            ThreatCategory::NetworkRisk => "network-risk",
            ThreatCategory::UncheckedFileOperation => "unchecked-file-operation",
        }
    }

    /// Human description attached to every threat of this category
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ThreatCategory::CodeExecution => {
                "Unsafe dynamic code execution detected (eval/exec/compile)"
            }
            ThreatCategory::SqlInjection => {
                "Potential SQL injection - use parameterized queries"
            }
            ThreatCategory::Xss => "Potential XSS vulnerability - sanitize user input",
            ThreatCategory::UnsafeSystemCall => {
                "Dangerous system command - avoid shell=True"
            }
            ThreatCategory::PrivilegeEscalation => "Privilege escalation attempt detected",
            ThreatCategory::UnsafeDeserialization => {
                "Unsafe deserialization - use safe_load or json"
            }
            ThreatCategory::UnsafeLibraryImport => "Import of a potentially unsafe library",
            ThreatCategory::NetworkRisk => {
                "Insecure network request - check TLS verification"
            }
            ThreatCategory::UncheckedFileOperation => {
                "File operation without path validation"
            }
        }
    }
}

impl Display for ThreatCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected threat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityThreat {
    /// Severity of the matched rule
    pub severity: Severity,
    /// Category of the matched rule
    pub category: ThreatCategory,
    /// Human description
    pub description: String,
    /// 1-based line number
    pub line_number: usize,
    /// Offending line, trimmed
    pub code_snippet: String,
}

impl SecurityThreat {
    /// Is this a blocking threat?
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl Display for SecurityThreat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} ({})",
            self.line_number, self.description, self.category
        )
    }
}
