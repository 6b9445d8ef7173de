//! Optional observability helpers for login flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `login_broker.flow` with the
//!   `flow` (step) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `login_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.
//!
//! Poll-tick counters are always on; they are plain atomics exposed via
//! [`PollMetrics`] so hosting UIs can show progress without a metrics backend.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Login flow steps observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Capability probe against the status endpoint.
	Probe,
	/// Poll-based browser login.
	PollLogin,
	/// Credential verification.
	Verify,
	/// Account materialization.
	Materialize,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Probe => "probe",
			FlowKind::PollLogin => "poll_login",
			FlowKind::Verify => "verify",
			FlowKind::Materialize => "materialize",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"login_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("login_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Thread-safe counters for poll-loop progress.
#[derive(Debug, Default)]
pub struct PollMetrics {
	ticks: AtomicU64,
	not_ready: AtomicU64,
	completed: AtomicU64,
}
impl PollMetrics {
	/// Returns the total number of poll ticks issued.
	pub fn ticks(&self) -> u64 {
		self.ticks.load(Ordering::Relaxed)
	}

	/// Returns the number of ticks that came back "not ready yet".
	pub fn not_ready(&self) -> u64 {
		self.not_ready.load(Ordering::Relaxed)
	}

	/// Returns the number of sessions completed through polling.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_tick(&self) {
		self.ticks.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_not_ready(&self) {
		self.not_ready.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_noop_without_metrics() {
		record_flow_outcome(FlowKind::Probe, FlowOutcome::Failure);
	}

	#[test]
	fn poll_metrics_count_independently() {
		let metrics = PollMetrics::default();

		metrics.record_tick();
		metrics.record_tick();
		metrics.record_not_ready();
		metrics.record_completed();

		assert_eq!(metrics.ticks(), 2);
		assert_eq!(metrics.not_ready(), 1);
		assert_eq!(metrics.completed(), 1);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::PollLogin, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
