//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Job Metrics
    pub static ref JOBS_EXECUTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("driftboard_jobs_executed_total", "Total number of jobs executed"),
        &["status"]
    ).expect("metric can be created");
    pub static ref JOB_QUEUE_DEPTH: IntGauge = IntGauge::new(
        "driftboard_job_queue_depth",
        "Current number of jobs waiting in the queue"
    ).expect("metric can be created");

    // Stream Metrics
    pub static ref STREAM_MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "driftboard_stream_messages_total",
        "Total number of messages received on the live stream"
    ).expect("metric can be created");
    pub static ref STREAM_RECONNECTS_TOTAL: IntCounter = IntCounter::new(
        "driftboard_stream_reconnects_total",
        "Total number of live stream reconnects"
    ).expect("metric can be created");

    // Reconciliation Metrics
    pub static ref POSTS_RECONCILED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("driftboard_posts_reconciled_total", "Total number of posts reconciled"),
        &["source"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("driftboard_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(JOBS_EXECUTED_TOTAL.clone()))
        .expect("JOBS_EXECUTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(JOB_QUEUE_DEPTH.clone()))
        .expect("JOB_QUEUE_DEPTH can be registered");
    REGISTRY
        .register(Box::new(STREAM_MESSAGES_TOTAL.clone()))
        .expect("STREAM_MESSAGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STREAM_RECONNECTS_TOTAL.clone()))
        .expect("STREAM_RECONNECTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_RECONCILED_TOTAL.clone()))
        .expect("POSTS_RECONCILED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
