use crate::analysis;
use crate::conf::{ContentMode, HuntConfig};
use crate::parser::model::{SeverityLevel, ValidationEvent};

/// Lines of context kept on each side of an event in `smart` mode
const SMART_CONTEXT_LINES: i32 = 2;

/// Post-processing applied to every dispatch result.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub severity_threshold: SeverityLevel,
    pub content_mode: ContentMode,
    pub content_limit: usize,
    /// Emit non-matching lines for `regexp:` formats
    pub include_unparsed: bool,
    pub analyze_patterns: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            severity_threshold: SeverityLevel::Debug,
            content_mode: ContentMode::Full,
            content_limit: 200,
            include_unparsed: false,
            analyze_patterns: false,
        }
    }
}

impl ParseOptions {
    pub fn from_config(config: &HuntConfig) -> Self {
        Self {
            severity_threshold: SeverityLevel::from_token(&config.severity_threshold).unwrap_or(SeverityLevel::Debug),
            content_mode: config.content_mode,
            content_limit: config.content_limit,
            include_unparsed: config.include_unparsed,
            analyze_patterns: config.analyze_patterns,
        }
    }

    /// Filter by severity, shape `log_content`, then annotate patterns.
    /// `original` is the parsed text, needed by `smart` content mode.
    pub fn apply(&self, events: Vec<ValidationEvent>, original: Option<&str>) -> Vec<ValidationEvent> {
        let mut events: Vec<ValidationEvent> = events.into_iter().filter(|e| self.passes_threshold(e)).collect();

        match self.content_mode {
            ContentMode::Full => {}
            ContentMode::None => events.iter_mut().for_each(|e| e.log_content.clear()),
            ContentMode::Limit => events.iter_mut().for_each(|e| limit_content(e, self.content_limit)),
            ContentMode::Smart => {
                let lines: Vec<&str> = original.map(|text| text.lines().collect()).unwrap_or_default();
                for event in &mut events {
                    if !smart_content(event, &lines) {
                        limit_content(event, self.content_limit);
                    }
                }
            }
        }

        if self.analyze_patterns {
            analysis::annotate(&mut events);
        }
        events
    }

    /// Events without a severity always pass; unknown severities count as info.
    fn passes_threshold(&self, event: &ValidationEvent) -> bool {
        match event.severity.as_deref() {
            None => true,
            Some(severity) => {
                SeverityLevel::from_token(severity).unwrap_or(SeverityLevel::Info) >= self.severity_threshold
            }
        }
    }
}

fn limit_content(event: &mut ValidationEvent, limit: usize) {
    if let Some((cut, _)) = event.log_content.char_indices().nth(limit) {
        event.log_content.truncate(cut);
        event.log_content.push_str("...");
    }
}

/// Replace `log_content` with the event's lines plus context. `false`
/// when the event carries no usable line range.
fn smart_content(event: &mut ValidationEvent, lines: &[&str]) -> bool {
    if lines.is_empty() || event.log_line_start < 1 || event.log_line_start as usize > lines.len() {
        return false;
    }
    let end = event.log_line_end.max(event.log_line_start);
    let first = (event.log_line_start - SMART_CONTEXT_LINES).max(1) as usize;
    let last = ((end + SMART_CONTEXT_LINES) as usize).min(lines.len());
    event.log_content = lines[first - 1..last].join("\n");
    true
}
