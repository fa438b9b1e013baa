//! Optional observability helpers for service operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `fleet_auth.op` with the `component` and
//!   `op` fields, plus a `warn` event whenever an operation fails in the storage layer.
//! - Enable `metrics` to increment the `fleet_auth_op_total` counter for every
//!   attempt/success/failure, labeled by `component` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Service components observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
	/// Token issuance, verification, and revocation.
	Token,
	/// User directory.
	User,
	/// Miner ownership registry.
	Miner,
	/// Rate-limit registry.
	RateLimit,
	/// Schema bootstrap.
	Store,
}
impl Component {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Component::Token => "token",
			Component::User => "user",
			Component::Miner => "miner",
			Component::RateLimit => "rate_limit",
			Component::Store => "store",
		}
	}
}
impl Display for Component {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a service operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span, recording attempt and outcome.
pub async fn observe<T, Fut>(component: Component, op: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OpSpan::new(component, op);

	record_op_outcome(component, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_op_outcome(component, OpOutcome::Success),
		Err(e) => {
			record_op_outcome(component, OpOutcome::Failure);
			report_failure(component, op, e);
		},
	}

	result
}
