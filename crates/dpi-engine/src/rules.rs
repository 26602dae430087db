//! Rule engine
//!
//! Rules are compiled once at registration: regex patterns into case
//! insensitive byte matchers, literal patterns into substring finders. The
//! packet path only ever takes the shared side of the rule lock.

use crate::alerts::AlertSeverity;
use crate::protocols::Protocol;
use dpi_common::{DpiError, DpiResult, FlowKey};
use memchr::memmem;
use parking_lot::RwLock;
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Pattern kind
///
/// `Snort`, `Yara` and `Behavioral` are accepted at registration but never
/// match; their evaluation is a declared extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Regular expression over packet bytes
    Regex,
    /// Byte-substring search
    Literal,
    /// Declared, inert
    Snort,
    /// Declared, inert
    Yara,
    /// Declared, inert
    Behavioral,
}

/// Rule category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Malware delivery or callback
    Malware,
    /// Exploit attempt
    Exploit,
    /// Botnet command and control
    Botnet,
    /// Credential phishing
    Phishing,
    /// Web application attack
    WebAttack,
    /// Denial of service
    Dos,
    /// Reconnaissance
    Scan,
    /// Organizational policy
    Policy,
    /// Protocol conformance
    Protocol,
    /// Free-form label
    Custom(String),
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malware => write!(f, "malware"),
            Self::Exploit => write!(f, "exploit"),
            Self::Botnet => write!(f, "botnet"),
            Self::Phishing => write!(f, "phishing"),
            Self::WebAttack => write!(f, "web-attack"),
            Self::Dos => write!(f, "dos"),
            Self::Scan => write!(f, "scan"),
            Self::Policy => write!(f, "policy"),
            Self::Protocol => write!(f, "protocol"),
            Self::Custom(s) => write!(f, "{}", s),
        }
    }
}

/// A pattern-matching directive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Pattern kind
    pub kind: RuleKind,
    /// Short name carried into alerts
    pub name: String,
    /// Longer description used as the alert message
    pub description: String,
    /// Severity stamped onto alerts
    pub severity: AlertSeverity,
    /// Pattern bytes (regex source for `Regex`)
    pub pattern: Vec<u8>,
    /// `Unknown` scopes to any protocol
    pub protocol: Protocol,
    /// `(0, 0)` scopes to any port; otherwise either flow port must fall
    /// in `start..=end`
    pub port_range: (u16, u16),
    /// Evaluate against client-to-server packets
    pub applies_to_request: bool,
    /// Evaluate against server-to-client packets
    pub applies_to_response: bool,
    /// Category label
    pub category: Category,
    /// Disabled rules are skipped, not removed
    pub enabled: bool,
}

impl Rule {
    /// New rule matching both directions, any protocol, any port
    pub fn new(kind: RuleKind, name: &str, pattern: &[u8]) -> Self {
        Self {
            kind,
            name: name.to_string(),
            description: String::new(),
            severity: AlertSeverity::Warning,
            pattern: pattern.to_vec(),
            protocol: Protocol::Unknown,
            port_range: (0, 0),
            applies_to_request: true,
            applies_to_response: true,
            category: Category::Policy,
            enabled: true,
        }
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Scope to one protocol
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Scope to a port range
    pub fn with_ports(mut self, start: u16, end: u16) -> Self {
        self.port_range = (start, end);
        self
    }

    /// Scope to one direction
    pub fn with_direction(mut self, requests: bool, responses: bool) -> Self {
        self.applies_to_request = requests;
        self.applies_to_response = responses;
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// A rule hit against one packet
#[derive(Debug, Clone)]
pub struct RuleMatch {
    /// Matched rule id
    pub rule_id: u32,
    /// Matched rule name
    pub rule_name: String,
    /// Alert message (rule description, or name when empty)
    pub message: String,
    /// Rule severity
    pub severity: AlertSeverity,
    /// Match offset within the packet payload
    pub offset: usize,
}

/// Rule with its registration-time compiled matcher
struct CompiledRule {
    id: u32,
    rule: Rule,
    regex: Option<Regex>,
    finder: Option<memmem::Finder<'static>>,
}

impl CompiledRule {
    /// First match offset in `payload`, if any
    fn find(&self, payload: &[u8]) -> Option<usize> {
        match self.rule.kind {
            RuleKind::Regex => self.regex.as_ref()?.find(payload).map(|m| m.start()),
            RuleKind::Literal => self.finder.as_ref()?.find(payload),
            // Declared kinds register fine and never match
            RuleKind::Snort | RuleKind::Yara | RuleKind::Behavioral => None,
        }
    }
}

/// Registered rules plus compiled matchers
pub struct RuleEngine {
    rules: RwLock<Vec<CompiledRule>>,
    next_id: AtomicU32,
    max_rules: usize,
}

impl RuleEngine {
    /// Create an empty engine bounded to `max_rules`
    pub fn new(max_rules: usize) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
            max_rules,
        }
    }

    /// Register a rule, compiling its pattern
    ///
    /// Returns the assigned id (≥1), or 0 when the pattern fails to compile
    /// or the table is full.
    pub fn add(&self, rule: Rule) -> u32 {
        let name = rule.name.clone();
        match self.try_add(rule) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(name = %name, error = %e, "rule rejected");
                0
            }
        }
    }

    fn try_add(&self, rule: Rule) -> DpiResult<u32> {
        if self.rules.read().len() >= self.max_rules {
            return Err(DpiError::RuleTableFull);
        }

        let mut regex = None;
        let mut finder = None;

        match rule.kind {
            RuleKind::Regex => {
                let source = std::str::from_utf8(&rule.pattern)
                    .map_err(|_| DpiError::InvalidPattern("not UTF-8".into()))?;
                let compiled = RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| DpiError::InvalidPattern(e.to_string()))?;
                regex = Some(compiled);
            }
            RuleKind::Literal => {
                if rule.pattern.is_empty() {
                    return Err(DpiError::InvalidPattern("empty literal".into()));
                }
                finder = Some(memmem::Finder::new(&rule.pattern).into_owned());
            }
            RuleKind::Snort | RuleKind::Yara | RuleKind::Behavioral => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.rules.write().push(CompiledRule {
            id,
            rule,
            regex,
            finder,
        });
        Ok(id)
    }

    /// Drop a rule and its compiled matcher
    pub fn remove(&self, rule_id: u32) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        rules.len() != before
    }

    /// Evaluate enabled, in-scope rules against one packet, in insertion
    /// order
    pub fn evaluate(
        &self,
        key: &FlowKey,
        session_protocol: Protocol,
        is_response: bool,
        payload: &[u8],
    ) -> Vec<RuleMatch> {
        let rules = self.rules.read();
        let mut matches = Vec::new();

        for compiled in rules.iter() {
            let rule = &compiled.rule;
            if !rule.enabled {
                continue;
            }
            if rule.protocol != Protocol::Unknown && rule.protocol != session_protocol {
                continue;
            }
            if !port_in_scope(rule.port_range, key) {
                continue;
            }
            let direction_ok = if is_response {
                rule.applies_to_response
            } else {
                rule.applies_to_request
            };
            if !direction_ok {
                continue;
            }

            if let Some(offset) = compiled.find(payload) {
                matches.push(RuleMatch {
                    rule_id: compiled.id,
                    rule_name: rule.name.clone(),
                    message: if rule.description.is_empty() {
                        rule.name.clone()
                    } else {
                        rule.description.clone()
                    },
                    severity: rule.severity,
                    offset,
                });
            }
        }

        matches
    }

    /// Registered rule count
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rules are registered
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Drop every rule
    pub fn clear(&self) {
        self.rules.write().clear();
    }
}

fn port_in_scope(range: (u16, u16), key: &FlowKey) -> bool {
    if range == (0, 0) {
        return true;
    }
    let (start, end) = range;
    (start..=end).contains(&key.src_port) || (start..=end).contains(&key.dst_port)
}
