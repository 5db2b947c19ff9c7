//! Foundry Sentinel
//!
//! Static, pattern-based threat classifier for generated code. Nothing an
//! agent produces reaches disk unless the sentinel reports it safe.
//!
//! # Core Concepts
//!
//! - [`Sentinel`]: Scans code line by line against a [`RuleSet`]
//! - [`RuleSet`]: Pluggable table of category → ordered matchers
//! - [`SecurityThreat`]: One match (severity, category, line, snippet)
//! - [`ScanReport`]: Verdict plus threats; safe iff no `CRITICAL` threat
//!
//! # Example
//!
//! ```rust
//! use foundry_sentinel::{Sentinel, ThreatCategory};
//!
//! let sentinel = Sentinel::new();
//! let report = sentinel.scan("x = 1\nresult = eval(user_input)\n");
//!
//! assert!(!report.is_safe);
//! assert_eq!(report.threats[0].category, ThreatCategory::CodeExecution);
//! assert_eq!(report.threats[0].line_number, 2);
//! ```

#![warn(unreachable_pub)]

// Core modules
mod report;
mod rules;
mod scanner;
mod threat;

// Re-exports
pub use report::ScanReport;
pub use rules::{Matcher, PatternMatcher, Rule, RuleError, RuleSet};
pub use scanner::Sentinel;
pub use threat::{SecurityThreat, Severity, ThreatCategory};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
