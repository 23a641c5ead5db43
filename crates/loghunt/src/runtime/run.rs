//! Run: execute one CLI command and write its output as JSON lines.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::cli::{BadgeArgs, Command, CommandArgs, FormatsArgs, InputArgs, LoadConfigArgs, ParseArgs};
use crate::analysis::{badge_for_counts, badge_for_status};
use crate::conf::HuntConfig;
use crate::dispatch::{Dispatcher, FsReader};
use crate::parser::config_based::ConfigBasedParser;
use crate::parser::traits::{FileReader, Parser};

type RunResult = Result<(), Box<dyn std::error::Error>>;

const STDIN: &str = "-";

/// Dispatch a parsed command. Consumes the dispatcher so per-command
/// options can be layered on top of the configured ones.
pub fn run<W: Write>(command: Command, dispatcher: Dispatcher, config: &HuntConfig, out: &mut W) -> RunResult {
    match command {
        Command::Parse(args) => parse(args, dispatcher, config, out),
        Command::Detect(args) => detect(args, &dispatcher, out),
        Command::Formats(args) => formats(args, &dispatcher, out),
        Command::Diagnose(args) => diagnose(args, &dispatcher, out),
        Command::Command(args) => command_format(args, &dispatcher, out),
        Command::LoadConfig(args) => load_config(args, out),
        Command::Badge(args) => badge(args, out),
    }
}

fn read_input(file: &str) -> io::Result<String> {
    if file == STDIN {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    FsReader.read_to_string(file)
}

fn write_lines<W: Write, T: Serialize>(out: &mut W, items: &[T]) -> RunResult {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn write_line<W: Write, T: Serialize>(out: &mut W, item: &T) -> RunResult {
    write_lines(out, std::slice::from_ref(item))
}

fn parse<W: Write>(args: ParseArgs, dispatcher: Dispatcher, config: &HuntConfig, out: &mut W) -> RunResult {
    let mut options = dispatcher.options().clone();
    if let Some(threshold) = args.threshold {
        options.severity_threshold = threshold;
    }
    if let Some(content) = args.content {
        options.content_mode = content;
    }
    options.include_unparsed |= args.include_unparsed;
    options.analyze_patterns |= args.analyze;
    let dispatcher = dispatcher.with_options(options);

    let format = args.format.as_deref().unwrap_or(&config.default_format);
    let events = if args.input.file == STDIN {
        dispatcher.parse(&read_input(STDIN)?, format)?
    } else {
        dispatcher.parse_file(&args.input.file, format)?
    };

    write_lines(out, &events)?;
    info!(format = %format, events = events.len(), "parse complete");
    debug!(metrics = ?dispatcher.metrics().snapshot(), "dispatch metrics");
    Ok(())
}

fn detect<W: Write>(args: InputArgs, dispatcher: &Dispatcher, out: &mut W) -> RunResult {
    let content = read_input(&args.file)?;
    let format = dispatcher.detect_format(&content);
    let format = if format.is_empty() { None } else { Some(format) };
    write_line(out, &json!({ "format": format }))
}

fn formats<W: Write>(args: FormatsArgs, dispatcher: &Dispatcher, out: &mut W) -> RunResult {
    let mut entries = dispatcher.formats();
    if let Some(category) = &args.category {
        entries.retain(|entry| &entry.category == category);
    }
    write_lines(out, &entries)
}

fn diagnose<W: Write>(args: InputArgs, dispatcher: &Dispatcher, out: &mut W) -> RunResult {
    let content = read_input(&args.file)?;
    write_lines(out, &dispatcher.diagnose(&content))
}

fn command_format<W: Write>(args: CommandArgs, dispatcher: &Dispatcher, out: &mut W) -> RunResult {
    let command = args.command.join(" ");
    let format = dispatcher.command_format(&command);
    write_line(out, &json!({ "command": command, "format": format }))
}

fn load_config<W: Write>(args: LoadConfigArgs, out: &mut W) -> RunResult {
    let json = FsReader.read_to_string(&args.path)?;
    let parser = ConfigBasedParser::from_json(&json)?;
    write_line(
        out,
        &json!({
            "format": parser.format_name(),
            "tool_name": parser.tool_name(),
            "category": parser.category(),
            "priority": parser.priority(),
            "patterns": parser.pattern_count(),
            "valid": true,
        }),
    )
}

fn badge<W: Write>(args: BadgeArgs, out: &mut W) -> RunResult {
    let badge = match &args.status {
        Some(status) => badge_for_status(status),
        None => badge_for_counts(args.errors, args.warnings, args.running),
    };
    writeln!(out, "{}", badge)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::build_registry;
    use crate::runtime::cli::Cli;
    use clap::Parser as _;
    use serde_json::Value;
    use std::sync::Arc;

    fn execute(argv: &[&str]) -> Result<Vec<Value>, String> {
        let cli = Cli::try_parse_from(std::iter::once("loghunt").chain(argv.iter().copied())).map_err(|e| e.to_string())?;
        let dispatcher = Dispatcher::new(Arc::new(build_registry()), Arc::new(FsReader));
        let mut out = Vec::new();
        run(cli.command, dispatcher, &HuntConfig::default(), &mut out).map_err(|e| e.to_string())?;
        let text = String::from_utf8(out).map_err(|e| e.to_string())?;
        Ok(text.lines().map(|line| serde_json::from_str(line).unwrap_or(Value::String(line.to_string()))).collect())
    }

    fn temp_log(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    // ── Parse ────────────────────────────────────────────────────

    #[test]
    fn test_parse_writes_json_lines() {
        let log = temp_log("a.c:1:2: warning: unused variable 'x'\nb.c:3:4: error: boom\n");
        let path = log.path().to_str().unwrap();

        let lines = execute(&["parse", path]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["ref_file"], "a.c");
        assert_eq!(lines[1]["status"], "ERROR");
        assert_eq!(lines[1]["log_file"], path);

        let lines = execute(&["parse", path, "--threshold", "error", "--analyze"]).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["pattern_id"], 1);
    }

    #[test]
    fn test_parse_missing_file_fails() {
        assert!(execute(&["parse", "/nonexistent/build.log"]).is_err());
    }

    // ── Introspection ────────────────────────────────────────────

    #[test]
    fn test_detect_and_diagnose() {
        let log = temp_log("src/main.c:10:5: error: expected ';'\n");
        let path = log.path().to_str().unwrap();

        let lines = execute(&["detect", path]).unwrap();
        assert_eq!(lines[0]["format"], "gcc_text");

        let lines = execute(&["diagnose", path]).unwrap();
        let selected: Vec<&Value> = lines.iter().filter(|l| l["is_selected"] == true).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0]["format"], "gcc_text");
    }

    #[test]
    fn test_detect_nothing() {
        let log = temp_log("hello there\n");
        let lines = execute(&["detect", log.path().to_str().unwrap()]).unwrap();
        assert!(lines[0]["format"].is_null());
    }

    #[test]
    fn test_formats_filter() {
        let all = execute(&["formats"]).unwrap();
        assert_eq!(all[0]["format"], "auto");

        let tests = execute(&["formats", "--category", "test_framework"]).unwrap();
        assert!(!tests.is_empty());
        assert!(tests.iter().all(|f| f["category"] == "test_framework"));
    }

    #[test]
    fn test_command_format() {
        let lines = execute(&["command", "python", "-m", "pytest", "-x"]).unwrap();
        assert_eq!(lines[0]["command"], "python -m pytest -x");
        assert_eq!(lines[0]["format"], "pytest_text");

        let lines = execute(&["command", "ls"]).unwrap();
        assert!(lines[0]["format"].is_null());
    }

    // ── Config & badge ───────────────────────────────────────────

    #[test]
    fn test_load_config_validates() {
        let good = temp_log(r#"{"name": "deploy_log", "patterns": [{"regex": "DEPLOY (?P<message>.+)"}]}"#);
        let lines = execute(&["load-config", good.path().to_str().unwrap()]).unwrap();
        assert_eq!(lines[0]["format"], "deploy_log");
        assert_eq!(lines[0]["patterns"], 1);

        let bad = temp_log(r#"{"name": "deploy_log", "patterns": []}"#);
        let err = execute(&["load-config", bad.path().to_str().unwrap()]).unwrap_err();
        assert!(err.contains("deploy_log"));
    }

    #[test]
    fn test_badge() {
        assert_eq!(execute(&["badge", "passed"]).unwrap()[0], "[ OK ]");
        assert_eq!(execute(&["badge", "--errors", "2"]).unwrap()[0], "[FAIL]");
        assert_eq!(execute(&["badge", "--warnings", "1", "--running"]).unwrap()[0], "[ .. ]");
        assert_eq!(execute(&["badge"]).unwrap()[0], "[ OK ]");
    }
}
