use crate::parser::model::{category, CommandPattern, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

/// Status marker, event status, severity, message
const OUTCOMES: &[(&str, EventStatus, &str, &str)] = &[
    (" PASSED", EventStatus::Pass, "info", "Test passed"),
    (" FAILED", EventStatus::Fail, "error", "Test failed"),
    (" ERROR", EventStatus::Fail, "error", "Test error"),
    (" SKIPPED", EventStatus::Skip, "warning", "Test skipped"),
];

/// `pytest -v` text output: `tests/test_x.py::test_name PASSED [ 50%]`.
pub struct PytestParser {
    meta: ParserMeta,
}

impl PytestParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "pytest_text",
            "pytest",
            category::TEST_FRAMEWORK,
            "pytest verbose text output (file.py::test STATUS)",
            priority::VERY_HIGH,
        )
        .aliases(&["pytest"])
        .groups(&["python", "test"])
        .commands(vec![
            CommandPattern::literal("pytest"),
            CommandPattern::like("pytest %"),
            CommandPattern::like("python -m pytest%"),
            CommandPattern::like("python3 -m pytest%"),
        ]);
        Self { meta }
    }

    fn parse_test_line(&self, line: &str, line_number: i32, event_id: i64) -> Option<ValidationEvent> {
        let (file, rest) = line.split_once("::")?;

        let (test_name, status, severity, message) = OUTCOMES.iter().find_map(|(marker, status, severity, message)| {
            rest.find(marker).map(|pos| (&rest[..pos], *status, *severity, *message))
        })?;

        let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
        event.tool_name = "pytest".to_string();
        event.event_type = EventType::TestResult;
        event.category = "test".to_string();
        event.ref_file = file.trim().to_string();
        event.test_name = test_name.trim().to_string();
        event.message = message.to_string();
        event.structured_data = r#"{"format":"pytest_text"}"#.to_string();
        Some(event)
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            if let Some(event) = self.parse_test_line(&line.text, line.number, event_id) {
                event_id += 1;
                events.push(event);
            }
        }

        events
    }
}

impl Default for PytestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PytestParser {
    fn can_parse(&self, content: &str) -> bool {
        content.contains("::")
            && (content.contains("PASSED") || content.contains("FAILED") || content.contains("SKIPPED"))
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

    const SAMPLE: &str = "============ test session starts ============\n\
tests/test_api.py::test_login PASSED                 [ 25%]\n\
tests/test_api.py::test_logout FAILED                [ 50%]\n\
tests/test_api.py::TestUser::test_create SKIPPED (no db) [ 75%]\n\
tests/test_db.py::test_connect ERROR                 [100%]\n\
===== 1 failed, 1 passed, 1 skipped, 1 error in 0.42s =====\n";

    #[test]
    fn test_can_parse() {
        let parser = PytestParser::new();
        assert!(parser.can_parse(SAMPLE));
        assert!(!parser.can_parse("PASSED without separator"));
        assert!(!parser.can_parse("std::vector<int> v;"));
    }

    #[test]
    fn test_outcomes() {
        let events = PytestParser::new().parse(SAMPLE);
        assert_eq!(events.len(), 4);

        assert_eq!(events[0].status, Some(EventStatus::Pass));
        assert_eq!(events[0].ref_file, "tests/test_api.py");
        assert_eq!(events[0].test_name, "test_login");
        assert_eq!(events[0].log_line_start, 2);

        assert_eq!(events[1].status, Some(EventStatus::Fail));
        assert_eq!(events[1].severity_str(), "error");

        assert_eq!(events[2].status, Some(EventStatus::Skip));
        assert_eq!(events[2].test_name, "TestUser::test_create");

        assert_eq!(events[3].message, "Test error");
        assert_eq!(events[3].event_id, 4);
    }

    #[test]
    fn test_line_without_status_skipped() {
        let events = PytestParser::new().parse("tests/test_a.py::test_x\ntests/test_a.py::test_y PASSED");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, 1);
        assert_eq!(events[0].test_name, "test_y");
    }
}
