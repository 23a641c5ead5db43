/// Built-in format recognizers
///
/// One module per tool family. Each parser owns a [`ParserMeta`] built at
/// construction time; `built_in_parsers()` returns them in category order,
/// which is also the tie-break order for equal priorities.

pub mod cargo_test;
pub mod eslint;
pub mod flake8;
pub mod gcc;
pub mod generic_error;
pub mod github_actions;
pub mod generic_lint;
pub mod http_log;
pub mod json;
pub mod junit;
pub mod logfmt;
pub mod make;
pub mod pytest;
pub mod regexp;
pub mod syslog;

use std::sync::Arc;

use super::model::EventStatus;
use super::traits::Parser;

pub use cargo_test::CargoTestParser;
pub use eslint::EslintJsonParser;
pub use flake8::Flake8Parser;
pub use gcc::GccParser;
pub use generic_error::GenericErrorParser;
pub use github_actions::GithubActionsParser;
pub use generic_lint::GenericLintParser;
pub use http_log::NginxAccessParser;
pub use json::JsonLinesParser;
pub use junit::JunitXmlParser;
pub use logfmt::LogfmtParser;
pub use make::MakeParser;
pub use pytest::PytestParser;
pub use regexp::RegexpParser;
pub use syslog::SyslogParser;

/// Every built-in parser, grouped by category.
pub fn built_in_parsers() -> Vec<Arc<dyn Parser>> {
    vec![
        // build_system
        Arc::new(MakeParser::new()),
        Arc::new(GccParser::new()),
        // linting_tool
        Arc::new(EslintJsonParser::new()),
        Arc::new(Flake8Parser::new()),
        Arc::new(GenericLintParser::new()),
        // test_framework
        Arc::new(PytestParser::new()),
        Arc::new(JunitXmlParser::new()),
        Arc::new(CargoTestParser::new()),
        // ci_system
        Arc::new(GithubActionsParser::new()),
        // structured_log
        Arc::new(LogfmtParser::new()),
        Arc::new(SyslogParser::new()),
        Arc::new(JsonLinesParser::new()),
        // web_access
        Arc::new(NginxAccessParser::new()),
        // tool_output
        Arc::new(GenericErrorParser::new()),
    ]
}

/// Map a free-text log level (already lowercased) to status and severity.
pub(crate) fn level_status(level: &str) -> (EventStatus, &'static str) {
    match level {
        "error" | "err" | "fatal" | "critical" | "crit" | "panic" | "dpanic" | "emergency" | "emerg"
        | "alert" => (EventStatus::Error, "error"),
        "warn" | "warning" => (EventStatus::Warning, "warning"),
        _ => (EventStatus::Info, "info"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_built_in_names_unique() {
        let parsers = built_in_parsers();
        let names: HashSet<_> = parsers.iter().map(|p| p.format_name().to_string()).collect();
        assert_eq!(names.len(), parsers.len());
    }

    #[test]
    fn test_level_status_mapping() {
        assert_eq!(level_status("fatal"), (EventStatus::Error, "error"));
        assert_eq!(level_status("warn"), (EventStatus::Warning, "warning"));
        assert_eq!(level_status("debug"), (EventStatus::Info, "info"));
        assert_eq!(level_status(""), (EventStatus::Info, "info"));
    }
}
