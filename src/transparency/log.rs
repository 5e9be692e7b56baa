//! In-memory transparency log.
//!
//! Counts what the challenge recorded, what it decided locally and what it
//! sent to the verifier. Nothing is written to disk.

use crate::core::FEATURE_COLUMNS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Challenge statistics since the log was created.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of pointer inputs received
    inputs_received: AtomicU64,
    /// Number of complete drags
    attempts_completed: AtomicU64,
    /// Complete drags with too little motion to score
    insufficient_data: AtomicU64,
    /// Drags rejected by the local classifier
    local_rejections: AtomicU64,
    /// Payloads handed to the verifier
    verification_requests: AtomicU64,
    /// Verifier answered human
    verified: AtomicU64,
    /// Verifier answered anything else
    remote_rejections: AtomicU64,
    /// Verifier could not be reached or answered with an error
    transport_errors: AtomicU64,
    /// Log creation time
    started_at: DateTime<Utc>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            inputs_received: AtomicU64::new(0),
            attempts_completed: AtomicU64::new(0),
            insufficient_data: AtomicU64::new(0),
            local_rejections: AtomicU64::new(0),
            verification_requests: AtomicU64::new(0),
            verified: AtomicU64::new(0),
            remote_rejections: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record one pointer input.
    pub fn record_input(&self) {
        self.inputs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt_completed(&self) {
        self.attempts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insufficient_data(&self) {
        self.insufficient_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_rejection(&self) {
        self.local_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verification_request(&self) {
        self.verification_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verified(&self) {
        self.verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_rejection(&self) {
        self.remote_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            inputs_received: self.inputs_received.load(Ordering::Relaxed),
            attempts_completed: self.attempts_completed.load(Ordering::Relaxed),
            insufficient_data: self.insufficient_data.load(Ordering::Relaxed),
            local_rejections: self.local_rejections.load(Ordering::Relaxed),
            verification_requests: self.verification_requests.load(Ordering::Relaxed),
            verified: self.verified.load(Ordering::Relaxed),
            remote_rejections: self.remote_rejections.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Challenge Statistics:\n\
             - Pointer inputs received: {}\n\
             - Attempts completed: {}\n\
             - Not enough movement data: {}\n\
             - Rejected locally: {}\n\
             - Sent for verification: {}\n\
             - Verified human: {}\n\
             - Rejected by verifier: {}\n\
             - Verifier errors: {}\n\
             - Uptime: {} seconds\n\
             \n\
             Data sent to the verifier:\n\
             - {}\n\
             - Raw pointer traces never leave this process",
            stats.inputs_received,
            stats.attempts_completed,
            stats.insufficient_data,
            stats.local_rejections,
            stats.verification_requests,
            stats.verified,
            stats.remote_rejections,
            stats.transport_errors,
            stats.uptime_secs,
            FEATURE_COLUMNS.join("\n- ")
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.inputs_received,
            &self.attempts_completed,
            &self.insufficient_data,
            &self.local_rejections,
            &self.verification_requests,
            &self.verified,
            &self.remote_rejections,
            &self.transport_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub inputs_received: u64,
    pub attempts_completed: u64,
    pub insufficient_data: u64,
    pub local_rejections: u64,
    pub verification_requests: u64,
    pub verified: u64,
    pub remote_rejections: u64,
    pub transport_errors: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}
