// self
use crate::{_prelude::*, obs::Component};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span wrapping one service operation.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the component + operation name.
	pub fn new(component: Component, op: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("fleet_auth.op", component = component.as_str(), op);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (component, op);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
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

/// Logs a failed operation: storage and bootstrap failures at `warn`, caller errors at
/// `debug`.
pub fn report_failure(component: Component, op: &'static str, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		if matches!(error, Error::Storage(_) | Error::Config(_)) {
			tracing::warn!(component = component.as_str(), op, %error, "storage operation failed");
		} else {
			tracing::debug!(component = component.as_str(), op, %error, "operation rejected");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (component, op, error);
	}
}
