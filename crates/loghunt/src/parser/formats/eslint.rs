use serde::Deserialize;

use crate::parser::model::{category, CommandPattern, ContentFamily, EventStatus, EventType, ValidationEvent};
use crate::parser::traits::{Parser, ParserMeta};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResult {
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LintMessage {
    rule_id: Option<String>,
    severity: Option<i64>,
    message: String,
    line: Option<i64>,
    column: Option<i64>,
}

/// `eslint --format json` reports.
pub struct EslintJsonParser {
    meta: ParserMeta,
}

impl EslintJsonParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "eslint_json",
            "ESLint JSON",
            category::LINTING_TOOL,
            "ESLint JSON formatter output (array of file results)",
            120,
        )
        .aliases(&["eslint"])
        .groups(&["javascript", "lint"])
        .family(ContentFamily::Json)
        .extension(".json")
        .commands(vec![
            CommandPattern::like("eslint %--format json%"),
            CommandPattern::like("eslint %-f json%"),
            CommandPattern::like("npx eslint %--format json%"),
        ]);
        Self { meta }
    }
}

impl Default for EslintJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

fn to_i32(value: Option<i64>) -> i32 {
    value.and_then(|v| i32::try_from(v).ok()).unwrap_or(-1)
}

impl Parser for EslintJsonParser {
    fn can_parse(&self, content: &str) -> bool {
        let trimmed = content.trim_start();
        if !trimmed.starts_with('[') {
            return false;
        }
        let root: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => return false,
        };
        match root.as_array() {
            // `eslint -f json` on a clean tree prints `[]`
            Some(files) if files.is_empty() => true,
            Some(files) => files[0].get("filePath").is_some_and(|v| v.is_string())
                && files[0].get("messages").is_some_and(|v| v.is_array()),
            None => false,
        }
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        let files: Vec<serde_json::Value> = match serde_json::from_str(content.trim()) {
            Ok(files) => files,
            Err(_) => return Vec::new(),
        };

        let mut events = Vec::new();
        let mut event_id = 1;

        for file in files {
            let Ok(file) = serde_json::from_value::<FileResult>(file) else {
                continue;
            };
            for raw in file.messages {
                let Ok(msg) = serde_json::from_value::<LintMessage>(raw) else {
                    continue;
                };

                let (status, severity, category) = match msg.severity {
                    Some(2) => (EventStatus::Error, "error", "lint_error"),
                    Some(1) | None => (EventStatus::Warning, "warning", "lint_warning"),
                    Some(_) => (EventStatus::Info, "info", "lint_info"),
                };

                let mut event = ValidationEvent { event_id, ..Default::default() }.with_status(status, severity);
                event.tool_name = "eslint".to_string();
                event.event_type = EventType::LintIssue;
                event.category = category.to_string();
                event.ref_file = file.file_path.clone();
                event.ref_line = to_i32(msg.line);
                event.ref_column = to_i32(msg.column);
                event.message = msg.message;
                if let Some(rule) = msg.rule_id {
                    event.function_name = rule.clone();
                    event.error_code = rule;
                }

                event_id += 1;
                events.push(event);
            }
        }

        events
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
  {"filePath": "/src/app.js", "messages": [
    {"ruleId": "no-unused-vars", "severity": 2, "message": "'x' is defined but never used.", "line": 3, "column": 7},
    {"ruleId": "semi", "severity": 1, "message": "Missing semicolon.", "line": 9, "column": 20}
  ], "errorCount": 1, "warningCount": 1},
  {"filePath": "/src/clean.js", "messages": []},
  {"filePath": "/src/bad.js", "messages": [
    {"ruleId": null, "fatal": true, "severity": 2, "message": "Parsing error: Unexpected token"}
  ]}
]"#;

    #[test]
    fn test_can_parse() {
        let parser = EslintJsonParser::new();
        assert!(parser.can_parse(SAMPLE));
        assert!(parser.can_parse("[]"));
        assert!(!parser.can_parse(r#"[{"name": "x"}]"#));
        assert!(!parser.can_parse("{\"filePath\": \"a\", \"messages\": []}"));
        assert!(!parser.can_parse("[not json"));
    }

    #[test]
    fn test_messages_become_events() {
        let events = EslintJsonParser::new().parse(SAMPLE);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].status, Some(EventStatus::Error));
        assert_eq!(events[0].category, "lint_error");
        assert_eq!(events[0].error_code, "no-unused-vars");
        assert_eq!(events[0].ref_file, "/src/app.js");
        assert_eq!(events[0].ref_line, 3);
        assert_eq!(events[0].ref_column, 7);

        assert_eq!(events[1].severity_str(), "warning");

        assert_eq!(events[2].ref_line, -1);
        assert!(events[2].error_code.is_empty());
        assert_eq!(events[2].event_id, 3);
    }

    #[test]
    fn test_malformed_is_empty() {
        assert!(EslintJsonParser::new().parse("[{").is_empty());
        assert!(EslintJsonParser::new().parse("{}").is_empty());
    }
}
