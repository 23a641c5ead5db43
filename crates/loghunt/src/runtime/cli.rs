//! CLI argument parsing using clap derive API.
//!
//! Purely declarative; execution lives in [`super::run`].

use clap::{Args, Parser, Subcommand};

use crate::conf::ContentMode;
use crate::parser::model::SeverityLevel;

/// loghunt: turn build, test, lint and log output into structured events.
#[derive(Parser, Debug)]
#[command(name = "loghunt", version, about, long_about = None)]
pub struct Cli {
    /// Path to the loghunt.toml configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a log and print one JSON event per line.
    Parse(ParseArgs),

    /// Print the format auto-detection picks.
    Detect(InputArgs),

    /// List every known format as JSON lines.
    Formats(FormatsArgs),

    /// Show how every parser reacts to the input.
    Diagnose(InputArgs),

    /// Guess the format from the command that produced the output.
    Command(CommandArgs),

    /// Validate a JSON parser definition without registering it.
    LoadConfig(LoadConfigArgs),

    /// Print a status badge.
    Badge(BadgeArgs),
}

/// Input file; `-` (the default) reads stdin.
#[derive(Args, Debug)]
pub struct InputArgs {
    #[arg(default_value = "-")]
    pub file: String,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Format specifier: name, alias, group, comma list, `auto`,
    /// `regexp:<pattern>` or a `.json` config path.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Drop events below this severity.
    #[arg(long, value_parser = parse_severity)]
    pub threshold: Option<SeverityLevel>,

    /// How much raw log text to keep per event (full, none, limit, smart).
    #[arg(long, value_parser = parse_content_mode)]
    pub content: Option<ContentMode>,

    /// Emit non-matching lines for `regexp:` formats.
    #[arg(long)]
    pub include_unparsed: bool,

    /// Add fingerprints and pattern ids.
    #[arg(long)]
    pub analyze: bool,
}

#[derive(Args, Debug)]
pub struct FormatsArgs {
    /// Only list formats in this category.
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LoadConfigArgs {
    /// Parser definition file.
    pub path: String,
}

#[derive(Args, Debug)]
pub struct BadgeArgs {
    /// Free-text status (pass, fail, warning, running, ...). Wins over counts.
    pub status: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub errors: i64,

    #[arg(long, default_value_t = 0)]
    pub warnings: i64,

    #[arg(long)]
    pub running: bool,
}

fn parse_severity(s: &str) -> Result<SeverityLevel, String> {
    SeverityLevel::from_token(s).ok_or_else(|| format!("unknown severity '{}'", s))
}

fn parse_content_mode(s: &str) -> Result<ContentMode, String> {
    ContentMode::from_token(s).ok_or_else(|| format!("unknown content mode '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand() {
        let cli = Cli::try_parse_from([
            "loghunt", "parse", "build.log", "--format", "gcc_text", "--threshold", "warn", "--content", "smart",
        ])
        .unwrap();
        let Command::Parse(args) = cli.command else { panic!("expected parse") };
        assert_eq!(args.input.file, "build.log");
        assert_eq!(args.format.as_deref(), Some("gcc_text"));
        assert_eq!(args.threshold, Some(SeverityLevel::Warning));
        assert_eq!(args.content, Some(ContentMode::Smart));
    }

    #[test]
    fn test_defaults_and_trailing_command() {
        let cli = Cli::try_parse_from(["loghunt", "detect"]).unwrap();
        let Command::Detect(args) = cli.command else { panic!("expected detect") };
        assert_eq!(args.file, "-");

        let cli = Cli::try_parse_from(["loghunt", "command", "cargo", "test", "--workspace"]).unwrap();
        let Command::Command(args) = cli.command else { panic!("expected command") };
        assert_eq!(args.command, vec!["cargo", "test", "--workspace"]);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["loghunt", "parse", "--threshold", "loud"]).is_err());
        assert!(Cli::try_parse_from(["loghunt", "parse", "--content", "some"]).is_err());
        assert!(Cli::try_parse_from(["loghunt", "command"]).is_err());
    }
}
