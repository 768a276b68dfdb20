//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Transcoding (per-rendition encodes, whole runs)
//! - Storage (uploads, request latency, re-authentication)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Transcode Metrics
// =============================================================================

/// Rendition encodes total by result.
pub static RENDITIONS_ENCODED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodsync_renditions_encoded_total", "Total rendition encodes"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Encode duration in seconds.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodsync_encode_duration_seconds",
            "Duration of single rendition encodes",
        )
        .buckets(vec![
            1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["mode"], // "copy", "reencode"
    )
    .unwrap()
});

/// Transcode runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodsync_runs_total", "Total transcode runs"),
        &["result"], // "published", "publish_failed"
    )
    .unwrap()
});

// =============================================================================
// Storage Metrics
// =============================================================================

/// Uploads total by result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("vodsync_uploads_total", "Total file uploads"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Bytes uploaded total.
pub static BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodsync_bytes_uploaded_total",
        "Total bytes uploaded to object storage",
    )
    .unwrap()
});

/// Storage request duration by operation.
pub static STORAGE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodsync_storage_request_duration_seconds",
            "Duration of object storage API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["operation"],
    )
    .unwrap()
});

/// Re-authentications triggered by a rejected session.
pub static REAUTHENTICATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vodsync_reauthentications_total",
        "Total storage re-authentications after a rejected token",
    )
    .unwrap()
});

/// Files per directory sync.
pub static SYNC_FILES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("vodsync_sync_files", "Number of files per directory sync")
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Transcode
        Box::new(RENDITIONS_ENCODED.clone()),
        Box::new(ENCODE_DURATION.clone()),
        Box::new(RUNS_TOTAL.clone()),
        // Storage
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(BYTES_UPLOADED.clone()),
        Box::new(STORAGE_REQUEST_DURATION.clone()),
        Box::new(REAUTHENTICATIONS.clone()),
        Box::new(SYNC_FILES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        RUNS_TOTAL.with_label_values(&["published"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.iter().all(|n| n.starts_with("vodsync_")));
        assert!(names.contains(&"vodsync_runs_total".to_string()));
    }
}
