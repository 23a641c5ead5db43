//! Runtime module: process lifecycle (boot, CLI definition, command execution).

pub mod boot;
pub mod cli;
pub mod run;
