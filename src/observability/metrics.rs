//! Metrics for the ingestion pipeline
//!
//! Recorded through the `metrics` facade. Installing an exporter is left to the
//! embedding process; without one every call here is a no-op.

use std::fmt;

/// Enum representing all metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceRequestsSuccess,
    SourceRequestsError,
    SourceRequestDuration,
    SourcePayloadBytes,
    SourceRetries,

    // Circuit metrics
    CircuitOpened,
    CircuitHalfOpened,
    CircuitClosed,
    CircuitRejected,

    // Cache metrics
    CacheHits,
    CacheMisses,
    CacheWritesSuccess,
    CacheWritesError,
    CacheReadsError,

    // Normalize metrics
    NormalizeRowsIn,
    NormalizeRecordsOut,
    NormalizeRowsDropped,
    NormalizeDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceRequestsSuccess => "vitibrasil_source_requests_success_total",
            MetricName::SourceRequestsError => "vitibrasil_source_requests_error_total",
            MetricName::SourceRequestDuration => "vitibrasil_source_request_duration_seconds",
            MetricName::SourcePayloadBytes => "vitibrasil_source_payload_bytes",
            MetricName::SourceRetries => "vitibrasil_source_retries_total",

            MetricName::CircuitOpened => "vitibrasil_circuit_opened_total",
            MetricName::CircuitHalfOpened => "vitibrasil_circuit_half_opened_total",
            MetricName::CircuitClosed => "vitibrasil_circuit_closed_total",
            MetricName::CircuitRejected => "vitibrasil_circuit_rejected_total",

            MetricName::CacheHits => "vitibrasil_cache_hits_total",
            MetricName::CacheMisses => "vitibrasil_cache_misses_total",
            MetricName::CacheWritesSuccess => "vitibrasil_cache_writes_success_total",
            MetricName::CacheWritesError => "vitibrasil_cache_writes_error_total",
            MetricName::CacheReadsError => "vitibrasil_cache_reads_error_total",

            MetricName::NormalizeRowsIn => "vitibrasil_normalize_rows_in_total",
            MetricName::NormalizeRecordsOut => "vitibrasil_normalize_records_out_total",
            MetricName::NormalizeRowsDropped => "vitibrasil_normalize_rows_dropped_total",
            MetricName::NormalizeDuration => "vitibrasil_normalize_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Source Metrics
// ============================================================================

pub mod source {
    use super::MetricName;

    pub fn request_success() {
        ::metrics::counter!(MetricName::SourceRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_error() {
        ::metrics::counter!(MetricName::SourceRequestsError.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::SourceRequestDuration.as_str()).record(secs);
    }

    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::SourcePayloadBytes.as_str()).record(bytes as f64);
    }

    pub fn retry() {
        ::metrics::counter!(MetricName::SourceRetries.as_str()).increment(1);
    }
}

// ============================================================================
// Circuit Metrics
// ============================================================================

pub mod circuit {
    use super::MetricName;

    pub fn opened(name: &str) {
        ::metrics::counter!(MetricName::CircuitOpened.as_str(), "circuit" => name.to_string())
            .increment(1);
    }

    pub fn half_opened(name: &str) {
        ::metrics::counter!(MetricName::CircuitHalfOpened.as_str(), "circuit" => name.to_string())
            .increment(1);
    }

    pub fn closed(name: &str) {
        ::metrics::counter!(MetricName::CircuitClosed.as_str(), "circuit" => name.to_string())
            .increment(1);
    }

    /// A call refused without touching the network
    pub fn rejected(name: &str) {
        ::metrics::counter!(MetricName::CircuitRejected.as_str(), "circuit" => name.to_string())
            .increment(1);
    }
}

// ============================================================================
// Cache Metrics
// ============================================================================

pub mod cache {
    use super::MetricName;

    pub fn hit() {
        ::metrics::counter!(MetricName::CacheHits.as_str()).increment(1);
    }

    pub fn miss() {
        ::metrics::counter!(MetricName::CacheMisses.as_str()).increment(1);
    }

    pub fn write_success() {
        ::metrics::counter!(MetricName::CacheWritesSuccess.as_str()).increment(1);
    }

    pub fn write_error() {
        ::metrics::counter!(MetricName::CacheWritesError.as_str()).increment(1);
    }

    pub fn read_error() {
        ::metrics::counter!(MetricName::CacheReadsError.as_str()).increment(1);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn rows_in(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsIn.as_str()).increment(count as u64);
    }

    pub fn records_out(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRecordsOut.as_str()).increment(count as u64);
    }

    pub fn rows_dropped(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsDropped.as_str()).increment(count as u64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::NormalizeDuration.as_str()).record(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        let names = [
            MetricName::SourceRequestsSuccess,
            MetricName::CircuitOpened,
            MetricName::CacheHits,
            MetricName::NormalizeDuration,
        ];
        for name in names {
            assert!(name.as_str().starts_with("vitibrasil_"));
            assert_eq!(name.to_string(), name.as_str());
        }
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        source::request_success();
        circuit::opened("production");
        cache::miss();
        normalize::records_out(3);
    }
}
