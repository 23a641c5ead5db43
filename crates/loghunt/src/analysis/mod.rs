//! Analysis: post-parse annotation of events.
//!
//! - `patterns`: message normalization, fingerprints and pattern clustering
//! - `badge`: fixed-width status badges for summaries

pub mod badge;
pub mod patterns;

pub use badge::{badge_for_counts, badge_for_events, badge_for_status};
pub use patterns::{annotate, fingerprint, message_similarity, normalize_error_message, root_cause_category};
