//! Prometheus metrics for observability.
//!
//! The store's metric names live in [`names`]; crates built on the store
//! define their own next to the code that reports them. [`MetricsRecorder`]
//! installs the Prometheus exporter as the global `metrics` recorder and
//! renders the current snapshot in text exposition format.
//!
//! # Example
//!
//! ```rust,no_run
//! use convene_runtime::metrics::MetricsRecorder;
//!
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//! // ... run commands ...
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok::<(), convene_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Metric names reported by the store.
pub mod names {
    /// Actions accepted by the store.
    pub const STORE_COMMANDS: &str = "convene.store.commands.total";
    /// Actions refused because the store is shutting down.
    pub const STORE_REJECTED: &str = "convene.store.rejected.total";
    /// Time spent inside the reducer while holding the state lock.
    pub const REDUCER_DURATION: &str = "convene.store.reducer.duration_seconds";
    /// Effects started, labelled by `type`.
    pub const EFFECTS_EXECUTED: &str = "convene.store.effects.total";
    /// Effects currently running.
    pub const EFFECTS_PENDING: &str = "convene.store.effects.pending";
}

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs and renders the Prometheus recorder.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe every metric and install the Prometheus recorder globally.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the histogram buckets are rejected and
    /// [`MetricsError::Install`] if another recorder (other than a previous
    /// Prometheus one) is already installed.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was never installed by this instance.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

/// Register descriptions for the store metrics.
pub fn register_metrics() {
    describe_counter!(names::STORE_COMMANDS, "Total number of actions processed by the store");
    describe_counter!(names::STORE_REJECTED, "Actions refused during shutdown");
    describe_histogram!(names::REDUCER_DURATION, "Time taken to execute reducers");
    describe_counter!(names::EFFECTS_EXECUTED, "Total number of effects started");
    describe_gauge!(names::EFFECTS_PENDING, "Effects currently running");
}
