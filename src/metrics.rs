//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! Consumers install a [`MetricsSink`] to receive one event per
//! authorization, without tying the library to a metrics backend
//! (Prometheus, OpenTelemetry, CloudWatch and so on).
//!
//! ## Usage
//!
//! ```ignore
//! use iam_eval_core::metrics::{EvaluationStats, MetricsSink};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct DenyCounter {
//!     denies: AtomicU64,
//! }
//!
//! impl MetricsSink for DenyCounter {
//!     fn on_evaluation(&self, stats: &EvaluationStats) {
//!         if !stats.result.is_allowed() {
//!             self.denies.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! iam_eval_core::metrics::set_sink(Arc::new(DenyCounter { denies: AtomicU64::new(0) }));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

use crate::types::EvaluationResult;

/// Snapshot of one authorization, passed to [`MetricsSink::on_evaluation`].
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStats {
    /// Wall-clock time of the whole authorization.
    pub duration: Duration,
    pub result: EvaluationResult,
    /// Principal as given in the request.
    pub principal: String,
    /// `service:ActionName` as given in the request.
    pub action: String,
}

/// Evaluation time broken down by phase, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationPhases {
    /// Service and resource control policies.
    pub control_policies_ms: f64,
    /// Identity policies, permission boundaries and endpoint policies.
    pub identity_ms: f64,
    /// The resource policy.
    pub resource_ms: f64,
    /// The service authorizer combining the analyses.
    pub combine_ms: f64,
    pub total_ms: f64,
}

impl EvaluationPhases {
    /// Time not accounted for by the measured phases.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms
            - (self.control_policies_ms + self.identity_ms + self.resource_ms + self.combine_ms)
    }
}

/// Consumer of evaluation metrics.
///
/// Called synchronously on the evaluation path from any thread, so
/// implementations must be cheap and thread-safe. Without a call to
/// [`set_sink`] a no-op sink is used.
pub trait MetricsSink: Send + Sync {
    /// Called after every authorization that produced a verdict.
    fn on_evaluation(&self, stats: &EvaluationStats);

    /// Called with per-phase timings. Defaults to doing nothing.
    fn on_evaluation_phases(&self, _stats: &EvaluationStats, _phases: &EvaluationPhases) {}
}

struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_evaluation(&self, _stats: &EvaluationStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

/// Install the global metrics sink.
///
/// The sink can be set once, before the first authorization; later calls
/// are ignored with a warning.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            "Metrics sink was already initialized. Ignoring subsequent set_sink call. Set the sink before the first evaluation."
        );
    }
}

pub(crate) fn get_sink() -> Arc<dyn MetricsSink> {
    SINK.get_or_init(|| Arc::new(NoOpSink)).clone()
}

pub(crate) fn record_evaluation(stats: &EvaluationStats, phases: &EvaluationPhases) {
    let sink = get_sink();
    sink.on_evaluation(stats);
    sink.on_evaluation_phases(stats, phases);
}
