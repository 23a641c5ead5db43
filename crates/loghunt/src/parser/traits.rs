use std::borrow::Cow;
use std::io::{self, BufRead};

use tracing::debug;

pub use super::model::{
    CommandPattern, ContentFamily, EventStatus, EventType, ParserInfo, ValidationEvent,
};
use super::ansi::strip_ansi_codes;
use super::safe::{self, MAX_REGEX_LINE_LENGTH};

/// Source of file content for config references and `parse_file`.
pub trait FileReader: Send + Sync {
    fn read_to_string(&self, path: &str) -> io::Result<String>;

    fn open_lines(&self, path: &str) -> io::Result<Box<dyn BufRead + Send>>;

    /// Whether `http(s)://` references can be fetched
    fn supports_urls(&self) -> bool {
        false
    }
}

/// Execution environment handed to context-aware parsers.
pub struct ParseContext<'a> {
    pub reader: &'a dyn FileReader,
    /// Path of the log being parsed, when known
    pub source_path: Option<&'a str>,
    pub max_line_length: usize,
    /// Remove ANSI escapes from streamed lines
    pub strip_ansi: bool,
}

impl<'a> ParseContext<'a> {
    pub fn new(reader: &'a dyn FileReader) -> Self {
        Self {
            reader,
            source_path: None,
            max_line_length: MAX_REGEX_LINE_LENGTH,
            strip_ansi: false,
        }
    }

    pub fn with_source(mut self, path: &'a str) -> Self {
        self.source_path = Some(path);
        self
    }
}

/// Static descriptor shared by all parser implementations.
#[derive(Debug, Clone)]
pub struct ParserMeta {
    pub format_name: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub priority: i32,
    pub aliases: Vec<String>,
    pub groups: Vec<String>,
    pub required_extension: String,
    pub command_patterns: Vec<CommandPattern>,
    pub family: ContentFamily,
}

impl ParserMeta {
    pub fn new(format_name: &str, name: &str, category: &str, description: &str, priority: i32) -> Self {
        Self {
            format_name: format_name.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            priority,
            aliases: Vec::new(),
            groups: Vec::new(),
            required_extension: String::new(),
            command_patterns: Vec::new(),
            family: ContentFamily::Text,
        }
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| a.to_string()));
        self
    }

    pub fn groups(mut self, groups: &[&str]) -> Self {
        self.groups.extend(groups.iter().map(|g| g.to_string()));
        self
    }

    pub fn commands(mut self, patterns: Vec<CommandPattern>) -> Self {
        self.command_patterns.extend(patterns);
        self
    }

    pub fn family(mut self, family: ContentFamily) -> Self {
        self.family = family;
        self
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.required_extension = extension.to_string();
        self
    }
}

/// Capability interface every format recognizer implements.
pub trait Parser: Send + Sync {
    /// Cheap, side-effect-free membership test
    fn can_parse(&self, content: &str) -> bool;

    /// Full extraction. Must tolerate content `can_parse` would reject.
    fn parse(&self, content: &str) -> Vec<ValidationEvent>;

    fn meta(&self) -> &ParserMeta;

    /// Extraction under the caller's limits. Line-oriented text parsers
    /// cap lines at `ctx.max_line_length`.
    fn parse_with_context(&self, ctx: &ParseContext<'_>, content: &str) -> Vec<ValidationEvent> {
        if self.supports_streaming() && self.content_family() == ContentFamily::Text {
            return parse_lines(self, content, ctx.max_line_length);
        }
        self.parse(content)
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    /// Parse one line; `event_id` is the running cursor for the whole input.
    fn parse_line(&self, _line: &str, _line_number: i32, _event_id: &mut i64) -> Vec<ValidationEvent> {
        Vec::new()
    }

    fn supports_file_parsing(&self) -> bool {
        false
    }

    /// Parse straight from a file. Streaming parsers never hold the whole file.
    fn parse_file(&self, ctx: &ParseContext<'_>, path: &str) -> io::Result<Vec<ValidationEvent>> {
        if self.supports_streaming() {
            let lines = ctx.reader.open_lines(path)?;
            return stream_lines(self, lines, ctx.max_line_length, ctx.strip_ansi);
        }
        let content = ctx.reader.read_to_string(path)?;
        Ok(self.parse_with_context(ctx, &content))
    }

    fn format_name(&self) -> &str {
        &self.meta().format_name
    }

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn category(&self) -> &str {
        &self.meta().category
    }

    fn description(&self) -> &str {
        &self.meta().description
    }

    fn priority(&self) -> i32 {
        self.meta().priority
    }

    fn aliases(&self) -> &[String] {
        &self.meta().aliases
    }

    fn groups(&self) -> &[String] {
        &self.meta().groups
    }

    fn required_extension(&self) -> &str {
        &self.meta().required_extension
    }

    fn command_patterns(&self) -> &[CommandPattern] {
        &self.meta().command_patterns
    }

    fn content_family(&self) -> ContentFamily {
        self.meta().family
    }
}

/// Drive `parse_line` over in-memory content with bounded line length.
pub fn parse_lines<P: Parser + ?Sized>(parser: &P, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
    let mut events = Vec::new();
    let mut event_id = 1;
    for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
        events.extend(parser.parse_line(&line.text, line.number, &mut event_id));
    }
    events
}

/// Upper bound on UTF-8 bytes per character, used to size the read cap.
const MAX_UTF8_WIDTH: usize = 4;

/// Read one line into `buf` (terminator excluded), keeping at most `cap`
/// bytes and discarding the rest of a longer line. Returns `None` at end
/// of input, otherwise whether the line was cut.
fn read_capped_line<R: BufRead + ?Sized>(reader: &mut R, buf: &mut Vec<u8>, cap: usize) -> io::Result<Option<bool>> {
    buf.clear();
    let mut read_any = false;
    let mut cut = false;

    loop {
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            break;
        }
        read_any = true;

        let newline = available.iter().position(|&b| b == b'\n');
        let chunk = &available[..newline.unwrap_or(available.len())];
        let room = cap.saturating_sub(buf.len());
        if chunk.len() > room {
            cut = true;
        }
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let used = newline.map_or(available.len(), |pos| pos + 1);
        reader.consume(used);
        if newline.is_some() {
            break;
        }
    }

    Ok(read_any.then_some(cut))
}

/// Drive `parse_line` over a buffered reader without materializing the
/// input. Bytes are decoded lossily and each line is read under a byte cap
/// derived from `max_line_length`.
pub fn stream_lines<P: Parser + ?Sized>(
    parser: &P,
    mut reader: Box<dyn BufRead + Send>,
    max_line_length: usize,
    strip_ansi: bool,
) -> io::Result<Vec<ValidationEvent>> {
    let cap = max_line_length.saturating_mul(MAX_UTF8_WIDTH);
    let mut events = Vec::new();
    let mut event_id = 1;
    let mut line_number = 0;
    let mut buf = Vec::new();

    while let Some(cut) = read_capped_line(reader.as_mut(), &mut buf, cap)? {
        line_number += 1;
        if cut {
            debug!(line = line_number, cap, "streamed line exceeded read cap");
        }
        let decoded = String::from_utf8_lossy(&buf);
        let raw = decoded.trim_end_matches('\r');
        let stripped = if strip_ansi { strip_ansi_codes(raw) } else { Cow::Borrowed(raw) };
        let trimmed = stripped.as_ref();
        let line = match safe::truncate_line(trimmed, max_line_length) {
            Some(truncated) => truncated,
            None => trimmed.to_string(),
        };
        events.extend(parser.parse_line(&line, line_number, &mut event_id));
    }

    Ok(events)
}

pub(crate) fn describe(parser: &dyn Parser, built_in: bool) -> ParserInfo {
    let meta = parser.meta();
    ParserInfo {
        format_name: meta.format_name.clone(),
        name: meta.name.clone(),
        category: meta.category.clone(),
        description: meta.description.clone(),
        priority: meta.priority,
        aliases: meta.aliases.clone(),
        groups: meta.groups.clone(),
        required_extension: meta.required_extension.clone(),
        command_patterns: meta.command_patterns.clone(),
        content_family: meta.family,
        built_in,
    }
}
