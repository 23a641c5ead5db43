//! Format recognizers and the registry that coordinates them
//!
//! Raw build/test/lint/log output goes in, normalized [`ValidationEvent`]s
//! come out.
//!
//! # Architecture
//!
//! - `traits.rs`: the `Parser` capability interface and `ParserMeta`
//! - `registry.rs`: priority-ordered detection, alias/group/command lookup
//! - `formats/`: built-in format parsers
//! - `config_based.rs`: parsers compiled from JSON definitions at runtime
//! - `command.rs` / `cache.rs`: command-pattern matching and its regex cache
//! - `extract.rs`: JSON/XML payload extraction ahead of structured parsers
//! - `safe.rs`: bounded line reading and non-throwing numeric parsing
//! - `metrics.rs`: dispatch counters
//!
//! # Safety Guarantees
//!
//! Every parser degrades malformed input to "no match" or "skip this line".
//! Lines longer than `MAX_REGEX_LINE_LENGTH` are truncated before any regex
//! sees them.

pub mod cache;
pub mod command;
pub mod config_based;
pub mod extract;
pub mod formats;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod safe;
pub mod traits;
mod ansi;

pub use ansi::strip_ansi_codes;
pub use config_based::ConfigBasedParser;
pub use model::{
    CommandPattern, ConfigError, ContentFamily, DispatchError, EventStatus, EventType, ParserInfo,
    SeverityLevel, ValidationEvent,
};
pub use registry::{build_registry, ParserRegistry};
pub use traits::{FileReader, ParseContext, Parser, ParserMeta};

/// Conventional priority bands. Specific formats outrank generic ones.
pub mod priority {
    pub const VERY_HIGH: i32 = 100;
    pub const HIGH: i32 = 80;
    pub const MEDIUM: i32 = 50;
    pub const LOW: i32 = 30;
    pub const VERY_LOW: i32 = 10;
}
