use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use super::model::ContentFamily;

/// Failure classes counted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricErrorType {
    /// A parser panicked inside `diagnose` (caught via catch_unwind)
    Panic,
    /// Parser config rejected
    Config,
    /// File or config reference could not be read
    Io,
    /// Format name resolved to nothing
    UnknownFormat,
}

/// A wrapper that forces the wrapped data onto its own cache line(s).
///
/// Uses `#[repr(align(64))]` so that concurrent dispatch calls updating
/// different metric groups do not invalidate each other's cache lines.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Auto-detection attempts and outcomes
#[derive(Debug, Default)]
pub struct DetectionMetrics {
    pub attempts: AtomicU64,
    pub success: AtomicU64,
    /// No parser accepted the content
    pub fallback: AtomicU64,
}

/// Parses by content family (hottest path, one update per parse call)
#[derive(Debug, Default)]
pub struct FamilyMetrics {
    pub json: AtomicU64,
    pub xml: AtomicU64,
    pub text: AtomicU64,
}

/// Aggregate timing and output volume
#[derive(Debug, Default)]
pub struct TotalMetrics {
    pub time_nanos: AtomicU64,
    pub parses: AtomicU64,
    pub events: AtomicU64,
}

#[derive(Debug, Default)]
pub struct ErrorMetrics {
    pub panic: AtomicU64,
    pub config: AtomicU64,
    pub io: AtomicU64,
    pub unknown_format: AtomicU64,
}

/// Gauges (can go up or down)
#[derive(Debug, Default)]
pub struct GaugeMetrics {
    /// Config-defined parsers currently registered
    pub custom_parsers: AtomicI64,
}

/// Counters for dispatch operations.
///
/// Each group sits on its own cache line via [`CacheAligned`]. All
/// operations use `Ordering::Relaxed`; `snapshot()` reads are not
/// transactional across fields, which is fine for observability.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub detection: CacheAligned<DetectionMetrics>,
    pub families: CacheAligned<FamilyMetrics>,
    pub totals: CacheAligned<TotalMetrics>,
    pub errors: CacheAligned<ErrorMetrics>,
    pub gauges: CacheAligned<GaugeMetrics>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_detection(&self, success: bool) {
        self.detection.0.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.detection.0.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.detection.0.fallback.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one completed parser invocation.
    #[inline]
    pub fn record_parse(&self, family: ContentFamily, events: usize, time_nanos: u64) {
        self.totals.0.parses.fetch_add(1, Ordering::Relaxed);
        self.totals.0.events.fetch_add(events as u64, Ordering::Relaxed);
        self.totals.0.time_nanos.fetch_add(time_nanos, Ordering::Relaxed);

        match family {
            ContentFamily::Json => self.families.0.json.fetch_add(1, Ordering::Relaxed),
            ContentFamily::Xml => self.families.0.xml.fetch_add(1, Ordering::Relaxed),
            ContentFamily::Text => self.families.0.text.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn record_error(&self, error_type: MetricErrorType) {
        match error_type {
            MetricErrorType::Panic => self.errors.0.panic.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::Config => self.errors.0.config.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::Io => self.errors.0.io.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::UnknownFormat => self.errors.0.unknown_format.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn inc_custom_parsers(&self) {
        self.gauges.0.custom_parsers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec_custom_parsers(&self) {
        self.gauges.0.custom_parsers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let parses = self.totals.0.parses.load(Ordering::Relaxed);
        let time_ns = self.totals.0.time_nanos.load(Ordering::Relaxed);

        MetricsSnapshot {
            detection_attempts: self.detection.0.attempts.load(Ordering::Relaxed),
            detection_success: self.detection.0.success.load(Ordering::Relaxed),
            detection_fallback: self.detection.0.fallback.load(Ordering::Relaxed),

            json_parses: self.families.0.json.load(Ordering::Relaxed),
            xml_parses: self.families.0.xml.load(Ordering::Relaxed),
            text_parses: self.families.0.text.load(Ordering::Relaxed),

            total_parses: parses,
            total_events: self.totals.0.events.load(Ordering::Relaxed),
            avg_parse_time_us: if parses > 0 {
                (time_ns as f64 / parses as f64) / 1000.0
            } else {
                0.0
            },

            parser_panics: self.errors.0.panic.load(Ordering::Relaxed),
            config_errors: self.errors.0.config.load(Ordering::Relaxed),
            io_errors: self.errors.0.io.load(Ordering::Relaxed),
            unknown_formats: self.errors.0.unknown_format.load(Ordering::Relaxed),

            custom_parsers: self.gauges.0.custom_parsers.load(Ordering::Relaxed),
        }
    }
}

/// A read-only, serializable view of [`DispatchMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub detection_attempts: u64,
    pub detection_success: u64,
    pub detection_fallback: u64,

    pub json_parses: u64,
    pub xml_parses: u64,
    pub text_parses: u64,

    pub total_parses: u64,
    pub total_events: u64,
    pub avg_parse_time_us: f64,

    pub parser_panics: u64,
    pub config_errors: u64,
    pub io_errors: u64,
    pub unknown_formats: u64,

    pub custom_parsers: i64,
}
