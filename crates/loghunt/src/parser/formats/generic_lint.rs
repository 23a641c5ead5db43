use crate::parser::model::{category, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{parse_lines, Parser, ParserMeta};

const DETECTION_WINDOW: usize = 50;

/// Any `file:line[:col]: severity: message` output from an unrecognized
/// linter.
pub struct GenericLintParser {
    meta: ParserMeta,
}

impl GenericLintParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "generic_lint",
            "Generic lint",
            category::LINTING_TOOL,
            "Fallback for file:line:col: severity: message linters",
            priority::LOW,
        )
        .aliases(&["lint"])
        .groups(&["lint"]);
        Self { meta }
    }
}

impl Default for GenericLintParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for GenericLintParser {
    fn can_parse(&self, content: &str) -> bool {
        content
            .lines()
            .take(DETECTION_WINDOW)
            .any(|line| safe::parse_compiler_diagnostic(line).is_some())
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        parse_lines(self, content, MAX_REGEX_LINE_LENGTH)
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_file_parsing(&self) -> bool {
        true
    }

    fn parse_line(&self, line: &str, line_number: i32, event_id: &mut i64) -> Vec<ValidationEvent> {
        let Some(diag) = safe::parse_compiler_diagnostic(line) else {
            return Vec::new();
        };

        let (status, severity, category) = match diag.severity {
            "error" => (EventStatus::Error, "error", "lint_error"),
            "warning" => (EventStatus::Warning, "warning", "lint_warning"),
            _ => (EventStatus::Info, "info", "lint_info"),
        };

        let mut event = ValidationEvent::at_line(*event_id, line, line_number).with_status(status, severity);
        event.tool_name = "lint".to_string();
        event.event_type = EventType::LintIssue;
        event.category = category.to_string();
        event.ref_file = diag.location.file.to_string();
        event.ref_line = diag.location.line;
        event.ref_column = diag.location.column;
        event.message = diag.message.to_string();

        *event_id += 1;
        vec![event]
    }
}
