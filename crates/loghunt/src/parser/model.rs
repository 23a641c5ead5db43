use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Compiler/build tool diagnostic
    BuildError,
    /// Linter finding
    LintIssue,
    /// Outcome of a single test
    TestResult,
    TypeError,
    SecurityFinding,
    /// Sanitizer / valgrind style report
    MemoryError,
    DebugInfo,
    DebugEvent,
    CrashSignal,
    /// Aggregate line ("3 passed, 1 failed")
    Summary,
    PerformanceMetric,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BuildError => "build_error",
            EventType::LintIssue => "lint_issue",
            EventType::TestResult => "test_result",
            EventType::TypeError => "type_error",
            EventType::SecurityFinding => "security_finding",
            EventType::MemoryError => "memory_error",
            EventType::DebugInfo => "debug_info",
            EventType::DebugEvent => "debug_event",
            EventType::CrashSignal => "crash_signal",
            EventType::Summary => "summary",
            EventType::PerformanceMetric => "performance_metric",
            EventType::Unknown => "unknown",
        }
    }

    /// Accepts `BUILD_ERROR` as well as `build_error`.
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        let event_type = match upper.as_str() {
            "BUILD_ERROR" => EventType::BuildError,
            "LINT_ISSUE" => EventType::LintIssue,
            "TEST_RESULT" => EventType::TestResult,
            "TYPE_ERROR" => EventType::TypeError,
            "SECURITY_FINDING" => EventType::SecurityFinding,
            "MEMORY_ERROR" => EventType::MemoryError,
            "DEBUG_INFO" => EventType::DebugInfo,
            "DEBUG_EVENT" => EventType::DebugEvent,
            "CRASH_SIGNAL" => EventType::CrashSignal,
            "SUMMARY" => EventType::Summary,
            "PERFORMANCE_METRIC" => EventType::PerformanceMetric,
            "UNKNOWN" => EventType::Unknown,
            _ => return None,
        };
        Some(event_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Pass,
    Fail,
    Error,
    Warning,
    Skip,
    Info,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pass => "PASS",
            EventStatus::Fail => "FAIL",
            EventStatus::Error => "ERROR",
            EventStatus::Warning => "WARNING",
            EventStatus::Skip => "SKIP",
            EventStatus::Info => "INFO",
        }
    }
}

/// Ordered severity scale used for threshold filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl SeverityLevel {
    /// Lenient mapping from free-text severities. Unrecognized text is `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        let level = match token.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => SeverityLevel::Debug,
            "info" | "note" | "notice" => SeverityLevel::Info,
            "warning" | "warn" => SeverityLevel::Warning,
            "error" | "err" | "fail" | "failed" => SeverityLevel::Error,
            "critical" | "crit" | "fatal" | "alert" | "emergency" => SeverityLevel::Critical,
            _ => return None,
        };
        Some(level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Debug => "debug",
            SeverityLevel::Info => "info",
            SeverityLevel::Warning => "warning",
            SeverityLevel::Error => "error",
            SeverityLevel::Critical => "critical",
        }
    }
}

/// Payload family a parser expects; drives pre-extraction in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFamily {
    Json,
    Xml,
    Text,
}

/// Parser category taxonomy
pub mod category {
    pub const BUILD_SYSTEM: &str = "build_system";
    pub const LINTING_TOOL: &str = "linting_tool";
    pub const TEST_FRAMEWORK: &str = "test_framework";
    pub const DEBUGGING_TOOL: &str = "debugging_tool";
    pub const CI_SYSTEM: &str = "ci_system";
    pub const STRUCTURED_LOG: &str = "structured_log";
    pub const WEB_ACCESS: &str = "web_access";
    pub const DISTRIBUTED_SYSTEMS: &str = "distributed_systems";
    pub const COVERAGE: &str = "coverage";
    pub const INFRASTRUCTURE_TOOL: &str = "infrastructure_tool";
    pub const TOOL_OUTPUT: &str = "tool_output";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Literal,
    Like,
    Regexp,
}

/// A command string pattern that hints at the output format of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandPattern {
    pub pattern: String,
    pub kind: PatternKind,
}

impl CommandPattern {
    pub fn literal(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), kind: PatternKind::Literal }
    }

    pub fn like(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), kind: PatternKind::Like }
    }

    pub fn regexp(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), kind: PatternKind::Regexp }
    }
}

/// Static descriptor snapshot of a registered parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParserInfo {
    pub format_name: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub priority: i32,
    pub aliases: Vec<String>,
    pub groups: Vec<String>,
    pub required_extension: String,
    pub command_patterns: Vec<CommandPattern>,
    pub content_family: ContentFamily,
    pub built_in: bool,
}

/// The normalized output record.
///
/// Absent values use sentinels: `-1` for locations and ids, empty strings
/// for text. `status`/`severity` are only `None` for unparsed regexp lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEvent {
    /// 1-based, restarts for every parse call
    pub event_id: i64,
    pub tool_name: String,
    pub event_type: EventType,
    pub category: String,
    pub status: Option<EventStatus>,
    pub severity: Option<String>,

    pub ref_file: String,
    pub ref_line: i32,
    pub ref_column: i32,

    pub message: String,
    pub error_code: String,
    pub function_name: String,
    pub test_name: String,
    pub suggestion: String,
    pub scope: String,
    pub group: String,
    pub unit: String,
    pub origin: String,
    pub principal: String,

    pub log_content: String,
    pub log_line_start: i32,
    pub log_line_end: i32,
    /// Set when events come from `parse_file`
    pub log_file: String,
    /// Opaque JSON text for format-specific extras
    pub structured_data: String,
    pub execution_time: f64,

    pub fingerprint: String,
    pub pattern_id: i64,
    pub similarity_score: f64,
}

impl Default for ValidationEvent {
    fn default() -> Self {
        Self {
            event_id: 0,
            tool_name: String::new(),
            event_type: EventType::Unknown,
            category: String::new(),
            status: Some(EventStatus::Info),
            severity: Some("info".to_string()),
            ref_file: String::new(),
            ref_line: -1,
            ref_column: -1,
            message: String::new(),
            error_code: String::new(),
            function_name: String::new(),
            test_name: String::new(),
            suggestion: String::new(),
            scope: String::new(),
            group: String::new(),
            unit: String::new(),
            origin: String::new(),
            principal: String::new(),
            log_content: String::new(),
            log_line_start: -1,
            log_line_end: -1,
            log_file: String::new(),
            structured_data: String::new(),
            execution_time: 0.0,
            fingerprint: String::new(),
            pattern_id: -1,
            similarity_score: 0.0,
        }
    }
}

impl ValidationEvent {
    /// Event anchored to a single physical line of the input.
    pub fn at_line(event_id: i64, line: &str, line_number: i32) -> Self {
        Self {
            event_id,
            log_content: line.to_string(),
            log_line_start: line_number,
            log_line_end: line_number,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: EventStatus, severity: &str) -> Self {
        self.status = Some(status);
        self.severity = Some(severity.to_string());
        self
    }

    pub fn severity_str(&self) -> &str {
        self.severity.as_deref().unwrap_or("")
    }
}

/// Failures while compiling a JSON parser definition.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid JSON in parser config: {0}")]
    InvalidJson(String),

    #[error("parser config missing required field '{0}'")]
    MissingField(&'static str),

    #[error("parser config field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("parser config '{0}' must define at least one pattern")]
    EmptyPatterns(String),

    #[error("invalid event_type '{value}' in pattern {index}")]
    InvalidEventType { index: usize, value: String },

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// Registrations the registry refuses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("'{key}' is claimed by built-in parser '{owner}'")]
    BuiltInKey { key: String, owner: String },
}

/// Failures visible to the embedding layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("'{0}' is a built-in format and cannot be replaced or unloaded")]
    BuiltInProtected(String),

    #[error("cannot load parser config from '{reference}': {reason}")]
    ConfigUnavailable { reference: String, reason: String },

    #[error("URL config references are not supported by this reader: {0}")]
    UnsupportedReference(String),

    #[error("failed to read '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("regexp: format requires a pattern after the prefix, e.g. 'regexp:(?P<severity>ERROR|WARN):\\s+(?P<message>.*)'")]
    MissingPattern,
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::BuiltInKey { key, .. } => DispatchError::BuiltInProtected(key),
        }
    }
}
