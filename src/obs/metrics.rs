// self
use crate::obs::{OperationKind, OperationOutcome};

/// Counter incremented once per request or refresh outcome.
pub const OPERATION_COUNTER: &str = "guarded_http_operation_total";
/// Counter of requests settled from a refresh queue, labeled `released` or `rejected`.
pub const REFRESH_WAITER_COUNTER: &str = "guarded_http_refresh_waiters_total";

/// Label pair recorded on [`OPERATION_COUNTER`].
pub const fn operation_labels(
	kind: OperationKind,
	outcome: OperationOutcome,
) -> [(&'static str, &'static str); 2] {
	[("operation", kind.as_str()), ("outcome", outcome.as_str())]
}

/// Label recorded on [`REFRESH_WAITER_COUNTER`] for a settled refresh.
pub const fn waiter_result(succeeded: bool) -> &'static str {
	if succeeded { "released" } else { "rejected" }
}

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_operation_outcome(kind: OperationKind, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		let [(_, operation), (_, outcome)] = operation_labels(kind, outcome);

		metrics::counter!(OPERATION_COUNTER, "operation" => operation, "outcome" => outcome)
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Adds the waiters drained by one refresh settlement (when enabled).
pub fn record_waiters_settled(succeeded: bool, waiters: usize) {
	#[cfg(feature = "metrics")]
	{
		if waiters > 0 {
			metrics::counter!(REFRESH_WAITER_COUNTER, "result" => waiter_result(succeeded))
				.increment(waiters as u64);
		}
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (succeeded, waiters);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_prelude::*;

	#[test]
	fn labels_name_the_operation_and_its_outcome() {
		let duplicate = OperationOutcome::of::<()>(&Err(Error::Duplicate { fingerprint: "k".into() }));

		assert_eq!(
			operation_labels(OperationKind::Request, duplicate),
			[("operation", "request"), ("outcome", "duplicate")]
		);
		assert_eq!(
			operation_labels(OperationKind::Refresh, OperationOutcome::Failure),
			[("operation", "refresh"), ("outcome", "failure")]
		);
		assert_eq!(waiter_result(true), "released");
		assert_eq!(waiter_result(false), "rejected");
	}

	#[test]
	fn recorders_accept_every_label_without_global_recorder() {
		record_operation_outcome(OperationKind::Refresh, OperationOutcome::Failure);
		record_waiters_settled(true, 4);
		record_waiters_settled(false, 0);
	}
}
