//! Rule tables
//!
//! A [`RuleSet`] is an ordered list of [`Rule`]s, each binding a category and
//! severity to an ordered list of [`Matcher`]s. The default table is compiled
//! once and shared; custom tables can be built for other engines.

use crate::threat::{Severity, ThreatCategory};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt::Debug;
use std::sync::Arc;

/// Line matcher
///
/// Implemented by [`PatternMatcher`]; other engines (e.g. AST-backed) can plug
/// in without changing the sentinel contract.
pub trait Matcher: Debug + Send + Sync {
    /// Does this line trigger the matcher?
    fn matches(&self, line: &str) -> bool;

    /// Source description (pattern text, rule name)
    fn source(&self) -> &str;
}

/// Case-insensitive regular-expression matcher
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    regex: Regex,
}

impl PatternMatcher {
    /// Compile a pattern (case-insensitive)
    ///
    /// # Errors
    /// `RuleError::InvalidPattern` if the pattern does not compile
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }
}

impl Matcher for PatternMatcher {
    #[inline]
    fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    fn source(&self) -> &str {
        &self.pattern
    }
}

/// One category entry of a rule table
#[derive(Debug, Clone)]
pub struct Rule {
    /// Threat category reported on match
    pub category: ThreatCategory,
    /// Severity reported on match
    pub severity: Severity,
    matchers: Vec<Arc<dyn Matcher>>,
}

impl Rule {
    /// Create rule with no matchers
    #[inline]
    #[must_use]
    pub fn new(category: ThreatCategory, severity: Severity) -> Self {
        Self {
            category,
            severity,
            matchers: Vec::new(),
        }
    }

    /// Append a regex pattern
    ///
    /// # Errors
    /// `RuleError::InvalidPattern` if the pattern does not compile
    pub fn with_pattern(self, pattern: &str) -> Result<Self, RuleError> {
        let matcher = PatternMatcher::new(pattern)?;
        Ok(self.with_matcher(matcher))
    }

    /// Append a custom matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matchers.push(Arc::new(matcher));
        self
    }

    /// Matchers in evaluation order
    #[inline]
    #[must_use]
    pub fn matchers(&self) -> &[Arc<dyn Matcher>] {
        &self.matchers
    }
}

/// Ordered rule table
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Table with no rules (everything is safe)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules in evaluation order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Is the table empty?
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Shared handle to the compiled default table
    #[must_use]
    pub fn shared_default() -> Arc<RuleSet> {
        Arc::clone(&*DEFAULT_RULES)
    }

    /// Build a table from `(category, severity, patterns)` entries
    ///
    /// # Errors
    /// First pattern that fails to compile
    pub fn from_table(
        table: &[(ThreatCategory, Severity, &[&str])],
    ) -> Result<Self, RuleError> {
        let mut set = Self::empty();
        for (category, severity, patterns) in table {
            let mut rule = Rule::new(*category, *severity);
            for pattern in *patterns {
                rule = rule.with_pattern(pattern)?;
            }
            set = set.with_rule(rule);
        }
        Ok(set)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet::clone(&DEFAULT_RULES)
    }
}

/// Errors building rule tables
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Pattern failed to compile
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Offending pattern text
        pattern: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },
}

/// Blocking rules
const CRITICAL_TABLE: &[(ThreatCategory, &[&str])] = &[
    (
        ThreatCategory::CodeExecution,
        &[
            r"\beval\s*\(",
            r"\bexec\s*\(",
            r"\bcompile\s*\(",
            r"__import__\s*\(",
        ],
    ),
    (
        ThreatCategory::SqlInjection,
        &[
            r#"execute\s*\(\s*["'].*%s.*["']"#,
            r#"execute\s*\(\s*f["']"#,
            r"execute\s*\(\s*.*\+.*\)",
            r"cursor\.execute\s*\(.*\.format\(",
        ],
    ),
    (
        ThreatCategory::Xss,
        &[
            r"innerHTML\s*=",
            r"document\.write\s*\(",
            r"eval\s*\(\s*.*request",
        ],
    ),
    (
        ThreatCategory::UnsafeSystemCall,
        &[
            r"\bos\.system\s*\(",
            r"\bsubprocess\.call\s*\(.*shell\s*=\s*True",
            r"\bsubprocess\.run\s*\(.*shell\s*=\s*True",
            r"\bsubprocess\.Popen\s*\(.*shell\s*=\s*True",
        ],
    ),
    (
        ThreatCategory::PrivilegeEscalation,
        &[
            r"\bsudo\b",
            r"\bsu\s+root",
            r"os\.setuid\s*\(\s*0\s*\)",
            r"runas\s+/user:administrator",
        ],
    ),
    (
        ThreatCategory::UnsafeDeserialization,
        &[
            r"\bpickle\.loads\s*\(",
            r"\byaml\.load\s*\(",
            r"\bmarshal\.loads\s*\(",
        ],
    ),
];

/// Warning rules
const WARNING_TABLE: &[(ThreatCategory, &[&str])] = &[
    (
        ThreatCategory::UnsafeLibraryImport,
        &[
            r"import\s+pickle\b",
            r"from\s+pickle\s+import",
            r"import\s+marshal\b",
        ],
    ),
    (
        ThreatCategory::NetworkRisk,
        &[
            r"requests\.get\s*\(.*verify\s*=\s*False",
            r"urllib\.request\.urlopen\s*\(",
        ],
    ),
    (
        ThreatCategory::UncheckedFileOperation,
        &[
            r#"open\s*\(.*["']w["']"#,
            r"os\.remove\s*\(",
            r"shutil\.rmtree\s*\(",
        ],
    ),
];

static DEFAULT_RULES: Lazy<Arc<RuleSet>> = Lazy::new(|| {
    let critical = CRITICAL_TABLE
        .iter()
        .map(|(category, patterns)| (*category, Severity::Critical, *patterns));
    let warnings = WARNING_TABLE
        .iter()
        .map(|(category, patterns)| (*category, Severity::Medium, *patterns));

    let mut set = RuleSet::empty();
    for (category, severity, patterns) in critical.chain(warnings) {
        let mut rule = Rule::new(category, severity);
        for pattern in patterns {
            match PatternMatcher::new(pattern) {
                Ok(matcher) => rule = rule.with_matcher(matcher),
                // Built-in patterns are covered by tests; skip rather than panic.
                Err(e) => tracing::error!("built-in sentinel pattern rejected: {}", e),
            }
        }
        set = set.with_rule(rule);
    }
    Arc::new(set)
});
