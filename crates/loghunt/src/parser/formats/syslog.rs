use std::sync::LazyLock;

use regex::Regex;

use crate::parser::model::{category, EventType, ValidationEvent};
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{parse_lines, Parser, ParserMeta};

use super::level_status;

const DETECTION_LINES: usize = 5;

/// `Dec 12 10:15:42 ` at line start
static BSD_START_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\s+").ok());

/// Syslog severity levels (RFC 5424 §6.2.1)
const SYSLOG_SEVERITIES: [&str; 8] = [
    "emergency", "alert", "critical", "error",
    "warning", "notice", "info", "debug",
];

/// Syslog facility names (RFC 5424 §6.2.1)
const SYSLOG_FACILITIES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news",
    "uucp", "cron", "authpriv", "ftp", "ntp", "audit", "alert2", "clock",
    "local0", "local1", "local2", "local3", "local4", "local5", "local6", "local7",
];

/// Fields common to both RFC layouts.
#[derive(Debug, Default, PartialEq)]
struct SyslogRecord {
    priority: Option<u32>,
    timestamp: String,
    hostname: String,
    app_name: String,
    procid: String,
    message: String,
}

/// Split a leading `<PRI>`; `None` when absent or malformed.
fn split_priority(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix('<')?;
    let end = rest.find('>')?;
    let digits = &rest[..end];
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pri = digits.parse().ok().filter(|p| *p <= 191)?;
    Some((pri, &rest[end + 1..]))
}

fn dash_empty(s: &str) -> String {
    if s == "-" {
        String::new()
    } else {
        s.to_string()
    }
}

/// `1 TIMESTAMP HOST APP PROCID MSGID [SD] MSG` (after `<PRI>`)
fn parse_rfc5424(text: &str) -> Option<SyslogRecord> {
    let text = text.strip_prefix("1 ")?;
    let parts: Vec<&str> = text.splitn(6, ' ').collect();
    if parts.len() < 5 {
        return None;
    }

    let sd_and_msg = parts.get(5).copied().unwrap_or("");
    let message = if sd_and_msg.starts_with('[') {
        // skip structured data blocks
        match sd_and_msg.rfind(']') {
            Some(idx) => sd_and_msg[idx + 1..].trim(),
            None => sd_and_msg,
        }
    } else if let Some(rest) = sd_and_msg.strip_prefix('-') {
        rest.trim()
    } else {
        sd_and_msg.trim()
    };

    Some(SyslogRecord {
        priority: None,
        timestamp: dash_empty(parts[0]),
        hostname: dash_empty(parts[1]),
        app_name: dash_empty(parts[2]),
        procid: dash_empty(parts[3]),
        message: message.trim_start_matches('\u{feff}').to_string(),
    })
}

/// `Mon DD HH:MM:SS host app[pid]: message`
fn parse_rfc3164(text: &str) -> Option<SyslogRecord> {
    let ts_end = BSD_START_RE.as_ref()?.find(text)?.end();
    let timestamp = text[..ts_end].trim().to_string();

    let (hostname, rest) = text[ts_end..].split_once(' ')?;
    let (tag, message) = match rest.split_once(':') {
        Some((tag, message)) if !tag.contains(' ') => (tag, message.trim_start()),
        _ => ("", rest),
    };
    let (app_name, procid) = match tag.split_once('[') {
        Some((app, pid)) => (app, pid.trim_end_matches(']')),
        None => (tag, ""),
    };

    Some(SyslogRecord {
        priority: None,
        timestamp,
        hostname: hostname.to_string(),
        app_name: app_name.to_string(),
        procid: procid.to_string(),
        message: message.to_string(),
    })
}

fn parse_record(line: &str) -> Option<SyslogRecord> {
    match split_priority(line) {
        Some((pri, rest)) => {
            let mut record = parse_rfc5424(rest).or_else(|| parse_rfc3164(rest))?;
            record.priority = Some(pri);
            Some(record)
        }
        None => parse_rfc3164(line),
    }
}

fn record_event(record: SyslogRecord, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
    let severity_name = record.priority.map_or("info", |pri| SYSLOG_SEVERITIES[(pri & 0x07) as usize]);
    let (status, severity) = level_status(severity_name);

    let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
    event.tool_name = "syslog".to_string();
    event.event_type = EventType::DebugInfo;
    event.function_name = record.timestamp;
    event.category = if record.app_name.is_empty() { "syslog".to_string() } else { record.app_name.clone() };
    event.message = record.message;
    event.origin = record.hostname.clone();

    let mut data = serde_json::Map::new();
    data.insert("hostname".to_string(), record.hostname.into());
    if !record.procid.is_empty() {
        data.insert("pid".to_string(), record.procid.into());
    }
    if let Some(pri) = record.priority {
        data.insert("priority".to_string(), pri.into());
        data.insert("severity".to_string(), severity_name.into());
        if let Some(facility) = SYSLOG_FACILITIES.get((pri >> 3) as usize) {
            data.insert("facility".to_string(), (*facility).into());
        }
    }
    event.structured_data = serde_json::Value::Object(data).to_string();
    event
}

/// Syslog lines with or without `<PRI>` (RFC 5424 and BSD/RFC 3164).
pub struct SyslogParser {
    meta: ParserMeta,
}

impl SyslogParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "syslog",
            "Syslog",
            category::STRUCTURED_LOG,
            "RFC 5424 and BSD (RFC 3164) syslog lines",
            52,
        )
        .groups(&["logs"]);
        Self { meta }
    }
}

impl Default for SyslogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn looks_like_syslog(line: &str) -> bool {
    if let Some((_, rest)) = split_priority(line) {
        return rest.starts_with("1 ") || BSD_START_RE.as_ref().is_some_and(|re| safe::safe_is_match(re, rest));
    }
    BSD_START_RE.as_ref().is_some_and(|re| safe::safe_is_match(re, line))
}

impl Parser for SyslogParser {
    fn can_parse(&self, content: &str) -> bool {
        let mut checked = 0;
        let mut matching = 0;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()).take(DETECTION_LINES) {
            checked += 1;
            if looks_like_syslog(line) {
                matching += 1;
            }
        }
        matching > 0 && matching >= checked / 2
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
        let text = line.trim();
        let Some(record) = parse_record(text) else {
            return Vec::new();
        };
        let event = record_event(record, text, line_number, *event_id);
        *event_id += 1;
        vec![event]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::model::EventStatus;

    const RFC3164: &str = "<34>Oct 11 22:14:15 mymachine su: 'su root' failed for lonvick on /dev/pts/8";
    const RFC5424: &str = "<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog - ID47 [exampleSDID@32473 iut=\"3\"] BOMAn application event log entry";
    const BSD: &str = "Dec 12 10:15:42 web01 sshd[4211]: Accepted publickey for deploy";

    #[test]
    fn test_priority_split() {
        assert_eq!(split_priority("<34>x").map(|(p, _)| p), Some(34));
        assert!(split_priority("<abc>bad").is_none());
        assert!(split_priority("<999>too big").is_none());
        assert!(split_priority("no priority").is_none());
    }

    #[test]
    fn test_can_parse() {
        let parser = SyslogParser::new();
        assert!(parser.can_parse(RFC3164));
        assert!(parser.can_parse(RFC5424));
        assert!(parser.can_parse(BSD));
        assert!(!parser.can_parse("Not a syslog message"));
        assert!(!parser.can_parse("<html>"));
    }

    #[test]
    fn test_rfc3164_with_priority() {
        let events = SyslogParser::new().parse(RFC3164);
        assert_eq!(events.len(), 1);
        // pri 34: facility auth, severity critical
        assert_eq!(events[0].status, Some(EventStatus::Error));
        assert_eq!(events[0].category, "su");
        assert!(events[0].message.starts_with("'su root' failed"));
        let data: serde_json::Value = serde_json::from_str(&events[0].structured_data).unwrap();
        assert_eq!(data["facility"], "auth");
        assert_eq!(data["severity"], "critical");
    }

    #[test]
    fn test_rfc5424() {
        let events = SyslogParser::new().parse(RFC5424);
        assert_eq!(events.len(), 1);
        // pri 165: local4.notice
        assert_eq!(events[0].severity_str(), "info");
        assert_eq!(events[0].category, "evntslog");
        assert_eq!(events[0].function_name, "2003-10-11T22:14:15.003Z");
        assert_eq!(events[0].message, "BOMAn application event log entry");
        assert_eq!(events[0].origin, "mymachine.example.com");
    }

    #[test]
    fn test_bsd_without_priority() {
        let events = SyslogParser::new().parse(&format!("{}\ngarbage\n{}", BSD, BSD));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, "sshd");
        assert_eq!(events[0].message, "Accepted publickey for deploy");
        assert_eq!(events[0].function_name, "Dec 12 10:15:42");
        let data: serde_json::Value = serde_json::from_str(&events[0].structured_data).unwrap();
        assert_eq!(data["pid"], "4211");
        assert_eq!(events[1].log_line_start, 3);
    }
}
