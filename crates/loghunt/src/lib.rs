// Domain-driven module structure for loghunt.

// Core engine
pub mod parser;
pub mod dispatch;

// Supporting modules
pub mod analysis;
pub mod conf;
pub mod runtime;
