use crate::parser::model::{category, EventStatus, EventType, ValidationEvent};
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{parse_lines, Parser, ParserMeta};

const DETECTION_LINES: usize = 5;

/// One Common/Combined Log Format line, optionally followed by
/// nginx's `$request_time`.
#[derive(Debug, Default, PartialEq)]
struct AccessRecord {
    remote_addr: String,
    user: String,
    timestamp: String,
    method: String,
    path: String,
    protocol: String,
    status: u16,
    bytes: String,
    referrer: String,
    user_agent: String,
    request_time: Option<f64>,
}

/// host ident authuser [date] "request" status bytes ["referrer" "user-agent"] [request_time]
fn parse_access_line(text: &str) -> Option<AccessRecord> {
    let open_bracket = text.find('[')?;
    let close_bracket = open_bracket + text[open_bracket..].find(']')?;

    let prefix: Vec<&str> = text[..open_bracket].split_whitespace().collect();
    if prefix.len() != 3 {
        return None;
    }

    let after_bracket = text[close_bracket + 1..].trim_start();
    let request_str = after_bracket.strip_prefix('"')?;
    let quote_end = request_str.find('"')?;
    let request_line = &request_str[..quote_end];

    let mut request = request_line.splitn(3, ' ');
    let method = request.next().filter(|m| !m.is_empty())?;
    let path = request.next()?;
    let protocol = request.next().unwrap_or_default();

    let after_request = request_str[quote_end + 1..].trim_start();
    let mut tail = after_request.splitn(3, ' ');
    let status = tail.next()?.parse().ok()?;
    let bytes = tail.next()?;
    if bytes != "-" && !bytes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let remaining = tail.next().unwrap_or_default();
    let (quoted, rest) = extract_quoted_fields(remaining);
    let (referrer, user_agent) = match quoted.as_slice() {
        [referrer, user_agent, ..] => (referrer.clone(), user_agent.clone()),
        _ => Default::default(),
    };
    let request_time = rest.split_whitespace().next().and_then(safe::try_parse_f64);

    Some(AccessRecord {
        remote_addr: prefix[0].to_string(),
        user: prefix[2].to_string(),
        timestamp: text[open_bracket + 1..close_bracket].to_string(),
        method: method.to_string(),
        path: path.to_string(),
        protocol: protocol.to_string(),
        status,
        bytes: bytes.to_string(),
        referrer,
        user_agent,
        request_time,
    })
}

/// Up to two leading quoted fields and whatever follows them.
fn extract_quoted_fields(text: &str) -> (Vec<String>, &str) {
    let mut fields = Vec::new();
    let mut rest = text.trim_start();

    while fields.len() < 2 {
        let Some(body) = rest.strip_prefix('"') else {
            break;
        };
        let mut value = String::new();
        let mut escaped = false;
        let mut consumed = None;
        for (idx, c) in body.char_indices() {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                consumed = Some(idx + 1);
                break;
            } else {
                value.push(c);
            }
        }
        let Some(consumed) = consumed else {
            break;
        };
        fields.push(value);
        rest = body[consumed..].trim_start();
    }

    (fields, rest)
}

fn status_severity(status: u16) -> (EventStatus, &'static str) {
    match status {
        500..=u16::MAX => (EventStatus::Error, "error"),
        400..=499 => (EventStatus::Warning, "warning"),
        _ => (EventStatus::Info, "info"),
    }
}

fn record_event(record: AccessRecord, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
    let (status, severity) = status_severity(record.status);

    let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
    event.tool_name = "nginx_access".to_string();
    event.event_type = EventType::DebugInfo;
    event.message = format!("{} {}", record.method, record.path);
    event.ref_file = record.path;
    event.category = record.method;
    event.error_code = record.status.to_string();
    event.origin = record.remote_addr.clone();
    if record.user != "-" {
        event.principal = record.user;
    }
    if let Some(request_time) = record.request_time {
        event.execution_time = request_time;
    }

    let non_dash = |s: String| if s == "-" { String::new() } else { s };
    event.structured_data = serde_json::json!({
        "ip_address": record.remote_addr,
        "protocol": record.protocol,
        "response_bytes": non_dash(record.bytes),
        "referrer": non_dash(record.referrer),
        "user_agent": record.user_agent,
        "timestamp": record.timestamp,
    })
    .to_string();
    event
}

/// nginx/apache access logs in Common or Combined Log Format.
pub struct NginxAccessParser {
    meta: ParserMeta,
}

impl NginxAccessParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "nginx_access",
            "nginx access log",
            category::WEB_ACCESS,
            "Common/Combined Log Format access lines",
            54,
        )
        .aliases(&["apache_access"])
        .groups(&["web", "logs"]);
        Self { meta }
    }
}

impl Default for NginxAccessParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `host ident user [date] "` prefix
fn looks_like_access_line(line: &str) -> bool {
    let Some(open_bracket) = line.find('[') else {
        return false;
    };
    let Some(close_offset) = line[open_bracket..].find(']') else {
        return false;
    };
    let prefix_ok = line[..open_bracket].split_whitespace().count() == 3;
    let date_part = &line[open_bracket + 1..open_bracket + close_offset];
    let date_ok = date_part.contains('/') || date_part.contains(':');
    prefix_ok && date_ok && line[open_bracket + close_offset + 1..].trim_start().starts_with('"')
}

impl Parser for NginxAccessParser {
    fn can_parse(&self, content: &str) -> bool {
        let mut checked = 0;
        let mut matching = 0;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()).take(DETECTION_LINES) {
            checked += 1;
            if looks_like_access_line(line) {
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
        let Some(record) = parse_access_line(text) else {
            return Vec::new();
        };
        let event = record_event(record, text, line_number, *event_id);
        *event_id += 1;
        vec![event]
    }
}
