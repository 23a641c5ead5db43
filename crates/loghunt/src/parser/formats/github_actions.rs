use crate::parser::model::{category, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

const TOOL: &str = "github_actions";
const EVENT_CATEGORY: &str = "github_actions_text";
const EXIT_MARKER: &str = "Process completed with exit code ";
const RUN_PREFIX: &str = "Run ";

/// Substrings that only a GitHub Actions runner log contains
const DETECTION_MARKERS: &[&str] = &[
    "::error::",
    "::error file=",
    "::warning::",
    "::warning file=",
    "::notice::",
    "::group::",
    "::endgroup::",
    "##[group]",
    "##[endgroup]",
    "##[error]",
    "##[warning]",
];

/// Workflow command (`::error file=a.js::msg`) or runner marker (`##[error]msg`).
#[derive(Debug, PartialEq, Eq)]
enum Marker<'a> {
    Annotation { level: &'a str, props: &'a str, message: &'a str },
    GroupStart(&'a str),
    GroupEnd,
}

fn parse_marker(line: &str) -> Option<Marker<'_>> {
    let (name, props, message) = if let Some(rest) = line.strip_prefix("##[") {
        let (tag, message) = rest.split_once(']')?;
        (tag, "", message)
    } else {
        let (command, message) = line.strip_prefix("::")?.split_once("::")?;
        let (name, props) = command.split_once(' ').unwrap_or((command, ""));
        (name, props.trim(), message)
    };

    match name {
        "error" | "warning" | "notice" => Some(Marker::Annotation { level: name, props, message: message.trim() }),
        "group" => Some(Marker::GroupStart(message.trim())),
        "endgroup" => Some(Marker::GroupEnd),
        _ => None,
    }
}

/// Value of `key` in a `file=a.js,line=3,col=7` property list.
fn property<'a>(props: &'a str, key: &str) -> Option<&'a str> {
    props
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

/// Drop the runner's `2024-01-15T10:30:00.1234567Z ` prefix.
fn strip_timestamp(line: &str) -> &str {
    let bytes = line.as_bytes();
    let stamped = bytes.len() > 20
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'T';
    if !stamped {
        return line;
    }
    match line.find(' ') {
        Some(pos) if line[..pos].ends_with('Z') => &line[pos + 1..],
        _ => line,
    }
}

fn exit_code(line: &str) -> Option<&str> {
    let start = line.find(EXIT_MARKER)? + EXIT_MARKER.len();
    let digits = line[start..].trim_end_matches('.').trim();
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
}

/// Group and step the runner is currently inside.
#[derive(Debug, Default)]
struct StepContext {
    group: String,
    step: String,
}

impl StepContext {
    fn enter(&mut self, group: &str) {
        self.group = group.to_string();
        if let Some(command) = group.strip_prefix(RUN_PREFIX) {
            self.step = command.trim().to_string();
        }
    }

    fn leave(&mut self) {
        self.group.clear();
    }

    fn tag(&self, event: &mut ValidationEvent) {
        event.scope = self.group.clone();
        event.unit = self.step.clone();
    }
}

/// GitHub Actions runner logs: workflow-command annotations, `##[...]`
/// markers and non-zero step exits, each tagged with its group and step.
pub struct GithubActionsParser {
    meta: ParserMeta,
}

impl GithubActionsParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "github_actions_text",
            "GitHub Actions",
            category::CI_SYSTEM,
            "GitHub Actions workflow log output",
            priority::HIGH,
        )
        .aliases(&["github_actions", "gha"])
        .groups(&["ci"]);
        Self { meta }
    }

    fn event(&self, line: &str, line_number: i32, event_id: i64, level: &str) -> ValidationEvent {
        let (status, severity, event_type) = match level {
            "error" => (EventStatus::Fail, "error", EventType::BuildError),
            "warning" => (EventStatus::Warning, "warning", EventType::LintIssue),
            _ => (EventStatus::Info, "info", EventType::DebugInfo),
        };
        let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
        event.tool_name = TOOL.to_string();
        event.event_type = event_type;
        event.category = EVENT_CATEGORY.to_string();
        event
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;
        let mut ctx = StepContext::default();

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let text = strip_timestamp(&line.text).trim_start();

            let mut event = match parse_marker(text) {
                Some(Marker::GroupStart(name)) => {
                    ctx.enter(name);
                    continue;
                }
                Some(Marker::GroupEnd) => {
                    ctx.leave();
                    continue;
                }
                Some(Marker::Annotation { level, props, message }) => {
                    let mut event = self.event(&line.text, line.number, event_id, level);
                    event.message = message.to_string();
                    if let Some(file) = property(props, "file") {
                        event.ref_file = file.to_string();
                    }
                    if let Some(lineno) = property(props, "line") {
                        event.ref_line = safe::safe_i32(lineno, -1);
                    }
                    if let Some(col) = property(props, "col") {
                        event.ref_column = safe::safe_i32(col, -1);
                    }
                    if let Some(code) = exit_code(message) {
                        event.error_code = code.to_string();
                    }
                    event
                }
                None => {
                    if let Some(command) = text.strip_prefix(RUN_PREFIX) {
                        ctx.step = command.trim().to_string();
                        continue;
                    }
                    match exit_code(text) {
                        Some(code) if code.bytes().any(|b| b != b'0') => {
                            let mut event = self.event(&line.text, line.number, event_id, "error");
                            event.message = format!("Process exited with code {}", code);
                            event.error_code = code.to_string();
                            event
                        }
                        _ => continue,
                    }
                }
            };

            ctx.tag(&mut event);
            event_id += 1;
            events.push(event);
        }

        events
    }
}

impl Default for GithubActionsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for GithubActionsParser {
    fn can_parse(&self, content: &str) -> bool {
        if DETECTION_MARKERS.iter().any(|m| content.contains(m)) {
            return true;
        }
        let has_run_step = content.starts_with(RUN_PREFIX) || content.contains("\nRun ");
        has_run_step && content.contains("\n  with:")
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        self.scan(content, MAX_REGEX_LINE_LENGTH)
    }

    fn parse_with_context(&self, ctx: &ParseContext<'_>, content: &str) -> Vec<ValidationEvent> {
        self.scan(content, ctx.max_line_length)
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_LOG: &str = "2024-01-15T10:30:00.1234567Z ##[group]Run npm test\n\
2024-01-15T10:30:00.2234567Z npm test\n\
2024-01-15T10:30:01.0000000Z ::warning file=src/app.js,line=12,col=5::Unexpected console statement\n\
2024-01-15T10:30:02.0000000Z ##[endgroup]\n\
2024-01-15T10:30:03.0000000Z ::error::Tests failed\n\
2024-01-15T10:30:04.0000000Z ##[error]Process completed with exit code 1.\n";

    #[test]
    fn test_can_parse() {
        let parser = GithubActionsParser::new();
        assert!(parser.can_parse(RUN_LOG));
        assert!(parser.can_parse("Run actions/checkout@v4\n  with:\n    fetch-depth: 0\n"));
        assert!(!parser.can_parse("src/main.c:10:5: error: boom"));
        assert!(!parser.can_parse("Run the tests please"));
    }

    #[test]
    fn test_annotations_carry_group_and_step() {
        let events = GithubActionsParser::new().parse(RUN_LOG);
        assert_eq!(events.len(), 3);

        let warning = &events[0];
        assert_eq!(warning.status, Some(EventStatus::Warning));
        assert_eq!(warning.event_type, EventType::LintIssue);
        assert_eq!(warning.ref_file, "src/app.js");
        assert_eq!(warning.ref_line, 12);
        assert_eq!(warning.ref_column, 5);
        assert_eq!(warning.message, "Unexpected console statement");
        assert_eq!(warning.scope, "Run npm test");
        assert_eq!(warning.unit, "npm test");
        assert_eq!(warning.log_line_start, 3);

        // group closed, step remembered
        assert_eq!(events[1].status, Some(EventStatus::Fail));
        assert_eq!(events[1].message, "Tests failed");
        assert!(events[1].scope.is_empty());
        assert_eq!(events[1].unit, "npm test");

        assert_eq!(events[2].error_code, "1");
        assert_eq!(events[2].event_id, 3);
    }

    #[test]
    fn test_plain_exit_code_lines() {
        let events = GithubActionsParser::new().parse("Run make\nProcess completed with exit code 0.\nProcess completed with exit code 2.\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Process exited with code 2");
        assert_eq!(events[0].unit, "make");
        assert_eq!(events[0].log_line_start, 3);
    }

    #[test]
    fn test_parse_marker() {
        assert_eq!(parse_marker("::endgroup::"), Some(Marker::GroupEnd));
        assert_eq!(parse_marker("##[group]Build"), Some(Marker::GroupStart("Build")));
        assert_eq!(
            parse_marker("::notice title=Heads up::cache restored"),
            Some(Marker::Annotation { level: "notice", props: "title=Heads up", message: "cache restored" })
        );
        assert_eq!(parse_marker("::set-output name=x::1"), None);
        assert_eq!(parse_marker("##[debug]noise"), None);
        assert_eq!(parse_marker("plain text"), None);
    }

    #[test]
    fn test_strip_timestamp() {
        assert_eq!(strip_timestamp("2024-01-15T10:30:00.1234567Z hello"), "hello");
        assert_eq!(strip_timestamp("2024-01-15 not a runner stamp"), "2024-01-15 not a runner stamp");
        assert_eq!(strip_timestamp("short"), "short");
    }
}
