// self
use crate::{
	_prelude::*,
	credential::CredentialError,
	fingerprint::RequestFingerprint,
	obs::{self, OperationKind, OperationOutcome},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by the pipeline and the refresh coordinator.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates the span for one caller-issued request. Only the fingerprint digest is recorded,
	/// never the body.
	pub fn request(fingerprint: &RequestFingerprint) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"guarded_http.request",
				method = fingerprint.method().as_str(),
				url = fingerprint.url(),
				digest = %fingerprint.digest(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = fingerprint;

			Self {}
		}
	}

	/// Creates the span for one credential refresh.
	pub fn refresh() -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("guarded_http.refresh") }
		}
		#[cfg(not(feature = "tracing"))]
		{
			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
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

/// Records a request rejected as a duplicate.
pub fn record_duplicate(fingerprint: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(fingerprint, "Duplicate request rejected before dispatch.");
	#[cfg(not(feature = "tracing"))]
	let _ = fingerprint;

	obs::record_operation_outcome(OperationKind::Request, OperationOutcome::Duplicate);
}

/// Records a request suspended behind an in-flight refresh.
pub fn record_waiter_queued(fingerprint: &RequestFingerprint, queued: usize) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		method = fingerprint.method().as_str(),
		url = fingerprint.url(),
		queued,
		"Request queued behind in-flight credential refresh."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (fingerprint, queued);
}

/// Records the settlement of a refresh and how many waiters it released.
pub fn record_refresh_settled(succeeded: bool, waiters: usize) {
	#[cfg(feature = "tracing")]
	{
		if succeeded {
			tracing::info!(waiters, "Credential refresh succeeded.");
		} else {
			tracing::warn!(waiters, "Credential refresh failed; rejecting waiters.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (succeeded, waiters);

	let outcome = if succeeded { OperationOutcome::Success } else { OperationOutcome::Failure };

	obs::record_operation_outcome(OperationKind::Refresh, outcome);
	obs::record_waiters_settled(succeeded, waiters);
}

/// Records a failed clear after a failed refresh; the stale credential stays in the store.
pub fn record_clear_failed(error: &CredentialError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%error, "Failed to clear the credential after a failed refresh.");
	#[cfg(not(feature = "tracing"))]
	let _ = error;
}
