//! Optional observability helpers for the request pipeline and refresh coordinator.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `guarded_http.request` (with `method`, `url`, and the
//!   fingerprint `digest`) and `guarded_http.refresh`, plus debug/info/warn events for
//!   duplicate rejections, queued waiters, and refresh outcomes.
//! - Enable `metrics` to increment the `guarded_http_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`, and
//!   `guarded_http_refresh_waiters_total` by the waiters each refresh `released` or `rejected`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// One caller-issued request, including its refresh-and-retry.
	Request,
	/// One credential refresh.
	Refresh,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Request => "request",
			OperationKind::Refresh => "refresh",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to the operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Rejected locally as a duplicate.
	Duplicate,
	/// Cancelled by the caller.
	Cancelled,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Duplicate => "duplicate",
			OperationOutcome::Cancelled => "cancelled",
			OperationOutcome::Failure => "failure",
		}
	}

	/// Maps a request result onto its outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => OperationOutcome::Success,
			Err(e) => match e.kind() {
				ErrorKind::Duplicate => OperationOutcome::Duplicate,
				ErrorKind::Cancelled => OperationOutcome::Cancelled,
				_ => OperationOutcome::Failure,
			},
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_labels_follow_error_kind() {
		assert_eq!(OperationOutcome::of(&Ok::<_, Error>(())), OperationOutcome::Success);
		assert_eq!(OperationOutcome::of::<()>(&Err(Error::Cancelled)), OperationOutcome::Cancelled);
		assert_eq!(
			OperationOutcome::of::<()>(&Err(Error::Duplicate { fingerprint: "k".into() })),
			OperationOutcome::Duplicate
		);
		assert_eq!(
			OperationOutcome::of::<()>(&Err(Error::NotFound { message: None })),
			OperationOutcome::Failure
		);
	}
}
