//! Dispatch: resolves a format specifier and runs the matching parsers.
//!
//! A specifier can be:
//! - `""` / `"unknown"`: nothing is parsed
//! - `"auto"`: priority-ordered detection
//! - `regexp:<pattern>`: ad hoc pattern parser
//! - a comma list, tried left to right until one part yields events
//! - an inline config reference (`config:<path>`, `*.json`, `http(s)://...json`)
//! - a group tag: members in priority order, first that detects *and*
//!   yields events wins
//! - a format name or alias

mod options;
mod reader;

pub use options::ParseOptions;
pub use reader::FsReader;

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::conf::HuntConfig;
use crate::parser::config_based::ConfigBasedParser;
use crate::parser::extract::extract_for_family;
use crate::parser::formats::RegexpParser;
use crate::parser::metrics::{DispatchMetrics, MetricErrorType};
use crate::parser::model::{category, CommandPattern, ContentFamily, DispatchError, ParserInfo, ValidationEvent};
use crate::parser::registry::ParserRegistry;
use crate::parser::safe::MAX_REGEX_LINE_LENGTH;
use crate::parser::strip_ansi_codes;
use crate::parser::traits::{FileReader, ParseContext, Parser};

const AUTO: &str = "auto";
const REGEXP_PREFIX: &str = "regexp:";
const CONFIG_PREFIX: &str = "config:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigRef<'a> {
    Path(&'a str),
    Url(&'a str),
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn config_reference(spec: &str) -> Option<ConfigRef<'_>> {
    let target = match spec.strip_prefix(CONFIG_PREFIX) {
        Some(target) => target.trim(),
        None if spec.ends_with(".json") => spec,
        None => return None,
    };
    Some(if is_url(target) { ConfigRef::Url(target) } else { ConfigRef::Path(target) })
}

/// Categories whose formats describe CI workflow runs
const WORKFLOW_CATEGORIES: &[&str] = &[category::CI_SYSTEM, "workflow"];

fn supports_workflow(category: &str) -> bool {
    WORKFLOW_CATEGORIES.contains(&category)
}

/// One row of [`Dispatcher::diagnose`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub format: String,
    pub priority: i32,
    pub can_parse: bool,
    pub events_produced: i64,
    /// The format auto-detection would pick
    pub is_selected: bool,
}

/// One row of the format catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatEntry {
    pub format: String,
    pub description: String,
    pub category: String,
    pub priority: i32,
    pub requires_extension: Option<String>,
    pub supports_workflow: bool,
    pub command_patterns: Vec<CommandPattern>,
    pub groups: Vec<String>,
}

impl From<ParserInfo> for FormatEntry {
    fn from(info: ParserInfo) -> Self {
        Self {
            supports_workflow: supports_workflow(&info.category),
            requires_extension: Some(info.required_extension).filter(|ext| !ext.is_empty()),
            format: info.format_name,
            description: info.description,
            category: info.category,
            priority: info.priority,
            command_patterns: info.command_patterns,
            groups: info.groups,
        }
    }
}

/// Entry point for every parse request.
///
/// Holds the registry by `Arc` so one registry can back several
/// dispatchers with different options.
pub struct Dispatcher {
    registry: Arc<ParserRegistry>,
    reader: Arc<dyn FileReader>,
    metrics: DispatchMetrics,
    options: ParseOptions,
    strip_ansi: bool,
    max_line_length: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<ParserRegistry>, reader: Arc<dyn FileReader>) -> Self {
        Self {
            registry,
            reader,
            metrics: DispatchMetrics::new(),
            options: ParseOptions::default(),
            strip_ansi: true,
            max_line_length: MAX_REGEX_LINE_LENGTH,
        }
    }

    pub fn from_config(registry: Arc<ParserRegistry>, reader: Arc<dyn FileReader>, config: &HuntConfig) -> Self {
        let mut dispatcher = Self::new(registry, reader);
        dispatcher.options = ParseOptions::from_config(config);
        dispatcher.strip_ansi = config.strip_ansi;
        dispatcher.max_line_length = config.max_line_length;
        dispatcher
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_ansi_stripping(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn prepare<'a>(&self, content: &'a str) -> Cow<'a, str> {
        if self.strip_ansi {
            strip_ansi_codes(content)
        } else {
            Cow::Borrowed(content)
        }
    }

    fn context(&self) -> ParseContext<'_> {
        let mut ctx = ParseContext::new(self.reader.as_ref());
        // lines past the regex guard would be refused outright
        ctx.max_line_length = self.max_line_length.min(MAX_REGEX_LINE_LENGTH);
        ctx.strip_ansi = self.strip_ansi;
        ctx
    }

    fn io_error(&self, path: &str, err: std::io::Error) -> DispatchError {
        self.metrics.record_error(MetricErrorType::Io);
        DispatchError::Io { path: path.to_string(), reason: err.to_string() }
    }

    // ── Content ──────────────────────────────────────────────────

    /// Parse `content` as `format`. Only config, regexp and I/O problems
    /// are errors; an unknown format yields no events.
    pub fn parse(&self, content: &str, format: &str) -> Result<Vec<ValidationEvent>, DispatchError> {
        let content = self.prepare(content);
        let events = self.dispatch(&content, format.trim())?;
        Ok(self.options.apply(events, Some(&content)))
    }

    pub fn parse_auto(&self, content: &str) -> Vec<ValidationEvent> {
        let content = self.prepare(content);
        let events = self.dispatch_auto(&content);
        self.options.apply(events, Some(&content))
    }

    /// Winning format name, or empty when nothing detects the content.
    pub fn detect_format(&self, content: &str) -> String {
        let content = self.prepare(content);
        self.detect(&content).map(|p| p.format_name().to_string()).unwrap_or_default()
    }

    /// Validate a specifier without parsing anything.
    pub fn is_valid_format(&self, format: &str) -> bool {
        let format = format.trim();
        if let Some(pattern) = format.strip_prefix(REGEXP_PREFIX) {
            return !pattern.trim().is_empty();
        }
        if format.contains(',') {
            return format.split(',').map(str::trim).any(|part| self.is_valid_single(part));
        }
        self.is_valid_single(format)
    }

    fn is_valid_single(&self, name: &str) -> bool {
        match name {
            "" | "unknown" => false,
            AUTO => true,
            _ => match config_reference(name) {
                Some(ConfigRef::Path(path)) => !path.is_empty(),
                Some(ConfigRef::Url(_)) => self.reader.supports_urls(),
                None => self.registry.has_format(name) || self.registry.is_group(name),
            },
        }
    }

    fn detect(&self, content: &str) -> Option<Arc<dyn Parser>> {
        let found = self.registry.find_parser(content);
        self.metrics.record_detection(found.is_some());
        found
    }

    fn dispatch_auto(&self, content: &str) -> Vec<ValidationEvent> {
        match self.detect(content) {
            Some(parser) => self.run(parser.as_ref(), content),
            None => Vec::new(),
        }
    }

    fn dispatch(&self, content: &str, spec: &str) -> Result<Vec<ValidationEvent>, DispatchError> {
        // a pattern may itself contain commas
        if let Some(pattern) = spec.strip_prefix(REGEXP_PREFIX) {
            return self.dispatch_regexp(content, pattern);
        }

        if spec.contains(',') {
            for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let events = self.dispatch(content, part)?;
                if !events.is_empty() {
                    debug!(format = %part, events = events.len(), "format list resolved");
                    return Ok(events);
                }
            }
            return Ok(Vec::new());
        }

        self.dispatch_single(content, spec)
    }

    fn dispatch_single(&self, content: &str, name: &str) -> Result<Vec<ValidationEvent>, DispatchError> {
        match name {
            "" | "unknown" => return Ok(Vec::new()),
            AUTO => return Ok(self.dispatch_auto(content)),
            _ => {}
        }

        if let Some(reference) = config_reference(name) {
            let parser = self.load_reference(reference)?;
            return Ok(self.run(&parser, content));
        }

        if self.registry.is_group(name) {
            return Ok(self.dispatch_group(content, name));
        }

        match self.registry.get_parser(name) {
            Some(parser) => Ok(self.run(parser.as_ref(), content)),
            None => {
                self.metrics.record_error(MetricErrorType::UnknownFormat);
                debug!(format = %name, "unknown format");
                Ok(Vec::new())
            }
        }
    }

    /// Unlike auto-detection, a member must also produce events.
    fn dispatch_group(&self, content: &str, group: &str) -> Vec<ValidationEvent> {
        for parser in self.registry.parsers_by_group(group) {
            if !parser.can_parse(content) {
                continue;
            }
            let events = self.run(parser.as_ref(), content);
            if !events.is_empty() {
                debug!(group = %group, format = %parser.format_name(), "group member selected");
                return events;
            }
        }
        Vec::new()
    }

    fn dispatch_regexp(&self, content: &str, pattern: &str) -> Result<Vec<ValidationEvent>, DispatchError> {
        if pattern.trim().is_empty() {
            return Err(DispatchError::MissingPattern);
        }
        let parser = RegexpParser::new(pattern, self.options.include_unparsed)?;
        Ok(self.run(&parser, content))
    }

    fn load_reference(&self, reference: ConfigRef<'_>) -> Result<ConfigBasedParser, DispatchError> {
        let target = match reference {
            ConfigRef::Url(url) if !self.reader.supports_urls() => {
                return Err(DispatchError::UnsupportedReference(url.to_string()));
            }
            ConfigRef::Url(target) | ConfigRef::Path(target) => target,
        };
        if target.is_empty() {
            return Err(DispatchError::ConfigUnavailable {
                reference: String::new(),
                reason: "empty config reference".to_string(),
            });
        }

        let json = self.reader.read_to_string(target).map_err(|e| {
            self.metrics.record_error(MetricErrorType::Io);
            DispatchError::ConfigUnavailable { reference: target.to_string(), reason: e.to_string() }
        })?;
        let parser = ConfigBasedParser::from_json(&json).inspect_err(|_| {
            self.metrics.record_error(MetricErrorType::Config);
        })?;

        info!(format = %parser.format_name(), reference = %target, "applying inline parser config");
        Ok(parser)
    }

    /// Extract the payload for the parser's family and run it once.
    fn run(&self, parser: &dyn Parser, content: &str) -> Vec<ValidationEvent> {
        let family = parser.content_family();
        let payload = extract_for_family(content, family);

        let started = Instant::now();
        let events = parser.parse_with_context(&self.context(), payload);
        self.metrics.record_parse(family, events.len(), started.elapsed().as_nanos() as u64);

        debug!(format = %parser.format_name(), events = events.len(), "parsed");
        events
    }

    // ── Files ────────────────────────────────────────────────────

    /// Parse a file. Text parsers that can stream read it line by line;
    /// everything else reads it whole and dispatches like `parse`.
    pub fn parse_file(&self, path: &str, format: &str) -> Result<Vec<ValidationEvent>, DispatchError> {
        let format = format.trim();

        let mut events = match self.streaming_parser(format) {
            Some(parser) => {
                debug!(format = %parser.format_name(), path = %path, "streaming file parse");
                let ctx = self.context().with_source(path);
                let started = Instant::now();
                let events = parser.parse_file(&ctx, path).map_err(|e| self.io_error(path, e))?;
                self.metrics.record_parse(ContentFamily::Text, events.len(), started.elapsed().as_nanos() as u64);
                self.options.apply(events, None)
            }
            None => {
                let raw = self.reader.read_to_string(path).map_err(|e| self.io_error(path, e))?;
                let content = self.prepare(&raw);
                let events = self.dispatch(&content, format)?;
                self.options.apply(events, Some(&content))
            }
        };

        for event in &mut events {
            event.log_file = path.to_string();
        }
        Ok(events)
    }

    fn streaming_parser(&self, format: &str) -> Option<Arc<dyn Parser>> {
        if format.contains(',') || self.registry.is_group(format) {
            return None;
        }
        self.registry
            .get_parser(format)
            .filter(|p| p.supports_file_parsing() && p.content_family() == ContentFamily::Text)
    }

    // ── Config parsers ───────────────────────────────────────────

    /// Compile and register a config parser; returns its format name.
    /// Replaces a custom parser of the same name. Neither the name nor an
    /// alias may claim a key that resolves to a built-in.
    pub fn load_parser_config(&self, json: &str) -> Result<String, DispatchError> {
        let parser = ConfigBasedParser::from_json(json).inspect_err(|e| {
            self.metrics.record_error(MetricErrorType::Config);
            warn!(error = %e, "rejected parser config");
        })?;

        let format_name = parser.format_name().to_string();
        let replacing = self.registry.get_parser(&format_name).is_some_and(|p| p.format_name() == format_name);
        let patterns = parser.pattern_count();
        self.registry.register(Arc::new(parser))?;
        if !replacing {
            self.metrics.inc_custom_parsers();
        }

        info!(format = %format_name, patterns, replaced = replacing, "parser config loaded");
        Ok(format_name)
    }

    pub fn unload_parser(&self, format_name: &str) -> bool {
        if self.registry.is_built_in(format_name) {
            warn!(format = %format_name, "refusing to unload built-in parser");
            return false;
        }
        let removed = self.registry.unregister(format_name);
        if removed {
            self.metrics.dec_custom_parsers();
            info!(format = %format_name, "parser unloaded");
        }
        removed
    }

    /// Load every `*.json` file in `dir` (sorted by name). Stops at the
    /// first invalid document.
    pub fn load_config_dir(&self, dir: &str) -> Result<Vec<String>, DispatchError> {
        let entries = std::fs::read_dir(dir).map_err(|e| self.io_error(dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.to_string_lossy();
            let json = self.reader.read_to_string(&path).map_err(|e| self.io_error(&path, e))?;
            let format_name = self.load_parser_config(&json).inspect_err(|e| {
                error!(path = %path, error = %e, "failed to load parser config");
            })?;
            loaded.push(format_name);
        }

        info!(dir = %dir, parsers = loaded.len(), "config directory loaded");
        Ok(loaded)
    }

    // ── Introspection ────────────────────────────────────────────

    /// Run every parser against `content`, highest priority first. A
    /// panicking parser is reported as unable to parse.
    pub fn diagnose(&self, content: &str) -> Vec<Diagnosis> {
        let content = self.prepare(content);
        let mut selected = false;
        let mut results = Vec::new();

        for parser in self.registry.by_priority() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if !parser.can_parse(&content) {
                    return (false, 0);
                }
                (true, self.run(parser.as_ref(), &content).len() as i64)
            }));
            let (can_parse, events_produced) = outcome.unwrap_or_else(|_| {
                self.metrics.record_error(MetricErrorType::Panic);
                warn!(format = %parser.format_name(), "parser panicked during diagnosis");
                (false, 0)
            });

            results.push(Diagnosis {
                format: parser.format_name().to_string(),
                priority: parser.priority(),
                can_parse,
                events_produced,
                is_selected: can_parse && !selected,
            });
            selected |= can_parse;
        }

        results
    }

    /// Every known format, led by the `auto` meta format.
    pub fn formats(&self) -> Vec<FormatEntry> {
        let mut entries = vec![FormatEntry {
            format: AUTO.to_string(),
            description: "Automatic format detection".to_string(),
            category: "meta".to_string(),
            priority: 0,
            requires_extension: None,
            supports_workflow: false,
            command_patterns: Vec::new(),
            groups: Vec::new(),
        }];
        entries.extend(self.registry.all_formats().into_iter().map(FormatEntry::from));
        entries
    }

    /// Format inferred from the command that produced the output.
    pub fn command_format(&self, command: &str) -> Option<String> {
        self.registry.find_parser_by_command(command).map(|p| p.format_name().to_string())
    }
}
