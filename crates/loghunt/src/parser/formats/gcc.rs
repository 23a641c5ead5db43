use crate::parser::model::{category, CommandPattern, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, CompilerDiagnostic, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

/// Lines scanned by `can_parse` before giving up
const DETECTION_WINDOW: usize = 100;

const FUNCTION_MARKERS: &[&str] = &[
    ": In function '",
    ": In member function '",
    ": In constructor '",
    ": In destructor '",
];

/// Interpreted-language files whose `file:line:col: error:` output belongs
/// to a linter, not a compiler.
const INTERPRETED_EXTENSIONS: &[&str] = &["py", "pyi", "js", "ts", "rb", "php"];

/// GCC/Clang style `file:line:col: severity: message` diagnostics.
pub struct GccParser {
    meta: ParserMeta,
}

impl GccParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "gcc_text",
            "GCC/Clang diagnostics",
            category::BUILD_SYSTEM,
            "C/C++/Fortran/Ada compiler diagnostics (file:line:col: error: message)",
            priority::HIGH,
        )
        .aliases(&["gcc", "g++", "clang", "clang++", "cc", "c++", "gfortran", "gnat", "compiler_diagnostic"])
        .groups(&["c_cpp", "build"])
        .commands(vec![
            CommandPattern::literal("gcc"),
            CommandPattern::like("gcc %"),
            CommandPattern::like("gcc-%"),
            CommandPattern::literal("g++"),
            CommandPattern::like("g++ %"),
            CommandPattern::literal("clang"),
            CommandPattern::like("clang %"),
            CommandPattern::like("clang++ %"),
            CommandPattern::like("cc %"),
            CommandPattern::like("gfortran %"),
        ]);
        Self { meta }
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;
        let mut current_function = String::new();

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            if let Some(function) = function_context(&line.text) {
                current_function = function.to_string();
                continue;
            }

            let Some(diag) = safe::parse_compiler_diagnostic(&line.text) else {
                continue;
            };

            let (status, severity) = match diag.severity {
                "error" => (EventStatus::Error, "error"),
                "warning" => (EventStatus::Warning, "warning"),
                _ => (EventStatus::Info, "info"),
            };
            let (message, flag) = split_warning_flag(diag.message);

            let mut event = ValidationEvent::at_line(event_id, &line.text, line.number).with_status(status, severity);
            event.tool_name = "compiler".to_string();
            event.event_type = EventType::BuildError;
            event.category = "compilation".to_string();
            event.ref_file = diag.location.file.to_string();
            event.ref_line = diag.location.line;
            event.ref_column = diag.location.column;
            event.message = message.to_string();
            event.error_code = flag.to_string();
            event.function_name = current_function.clone();

            event_id += 1;
            events.push(event);
        }

        events
    }
}

impl Default for GccParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Files without an extension and unknown extensions (generated sources,
/// `.inc`, `.def`) count as compiled.
fn is_compiled_source(file: &str) -> bool {
    let name = file.rsplit(['/', '\\']).next().unwrap_or(file);
    match name.rsplit_once('.') {
        Some((_, ext)) => !INTERPRETED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => true,
    }
}

/// `... [readability-braces-around-statements]` is clang-tidy, not the compiler.
fn is_clang_tidy_message(message: &str) -> bool {
    let Some(body) = message.trim_end().strip_suffix(']') else {
        return false;
    };
    match body.rfind('[') {
        Some(open) => {
            let check = &body[open + 1..];
            check.contains('-') && !check.starts_with('-')
        }
        None => false,
    }
}

fn is_compiler_diagnostic(diag: &CompilerDiagnostic<'_>) -> bool {
    is_compiled_source(diag.location.file) && !is_clang_tidy_message(diag.message)
}

/// Split a trailing `[-Wflag]` off the message.
fn split_warning_flag(message: &str) -> (&str, &str) {
    let trimmed = message.trim_end();
    if let Some(body) = trimmed.strip_suffix(']') {
        if let Some(open) = body.rfind(" [-W") {
            return (body[..open].trim_end(), &body[open + 2..]);
        }
    }
    (message, "")
}

fn function_context(line: &str) -> Option<&str> {
    FUNCTION_MARKERS.iter().find_map(|marker| {
        let start = line.find(marker)? + marker.len();
        let rest = &line[start..];
        let end = rest.find('\'').unwrap_or(rest.len());
        Some(&rest[..end])
    })
}

impl Parser for GccParser {
    fn can_parse(&self, content: &str) -> bool {
        if !(content.contains(" error:") || content.contains(" warning:") || content.contains(" note:")) {
            return false;
        }
        content
            .lines()
            .take(DETECTION_WINDOW)
            .filter_map(safe::parse_compiler_diagnostic)
            .any(|diag| is_compiler_diagnostic(&diag))
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

    const SAMPLE: &str = "src/main.c: In function 'main':\n\
src/main.c:10:5: error: expected ';' before '}' token\n\
src/main.c:12:9: warning: unused variable 'x' [-Wunused-variable]\n\
src/main.c:3:1: note: declared here\n";

    #[test]
    fn test_end_to_end_single_error() {
        let parser = GccParser::new();
        let input = "src/main.c:10:5: error: expected ';' before '}' token";
        assert!(parser.can_parse(input));

        let events = parser.parse(input);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, EventType::BuildError);
        assert_eq!(event.status, Some(EventStatus::Error));
        assert_eq!(event.ref_file, "src/main.c");
        assert_eq!(event.ref_line, 10);
        assert_eq!(event.ref_column, 5);
        assert_eq!(event.message, "expected ';' before '}' token");
        assert_eq!(event.event_id, 1);
    }

    #[test]
    fn test_function_context_and_flags() {
        let events = GccParser::new().parse(SAMPLE);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].function_name, "main");
        assert_eq!(events[0].log_line_start, 2);

        assert_eq!(events[1].severity_str(), "warning");
        assert_eq!(events[1].message, "unused variable 'x'");
        assert_eq!(events[1].error_code, "-Wunused-variable");

        assert_eq!(events[2].status, Some(EventStatus::Info));
        assert_eq!(events[2].event_id, 3);
    }

    #[test]
    fn test_rejects_interpreted_sources() {
        let parser = GccParser::new();
        assert!(!parser.can_parse("app/models.py:3:1: error: undefined name 'x'"));
        assert!(!parser.can_parse("src/index.ts:4:2: warning: unused import"));
    }

    #[test]
    fn test_rejects_clang_tidy() {
        let parser = GccParser::new();
        let line = "src/a.cpp:7:3: warning: statement should be inside braces [readability-braces-around-statements]";
        assert!(!parser.can_parse(line));
    }

    #[test]
    fn test_accepts_other_compiled_languages() {
        let parser = GccParser::new();
        assert!(parser.can_parse("solver.f90:42:10: error: Symbol 'n' has no IMPLICIT type"));
        assert!(parser.can_parse("kernel.cu:8:1: error: identifier \"foo\" is undefined"));
        assert!(parser.can_parse("Makefile:3:1: error: missing separator"));
    }

    #[test]
    fn test_no_marker_no_match() {
        assert!(!GccParser::new().can_parse("all good\nbuild finished"));
        assert!(GccParser::new().parse("").is_empty());
    }
}
