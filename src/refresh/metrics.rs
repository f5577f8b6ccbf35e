// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh runs and the waiters they settled.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	released: AtomicU64,
	rejected: AtomicU64,
}
impl RefreshMetrics {
	/// Number of refresh calls dispatched to the credential store.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of refreshes that produced and stored a new credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Number of refreshes that failed or were interrupted.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Waiters resumed with a fresh credential.
	pub fn waiters_released(&self) -> u64 {
		self.released.load(Ordering::Relaxed)
	}

	/// Waiters rejected with a refresh failure.
	pub fn waiters_rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_settled(&self, succeeded: bool, waiters: usize) {
		let waiters = waiters as u64;

		if succeeded {
			self.success.fetch_add(1, Ordering::Relaxed);
			self.released.fetch_add(waiters, Ordering::Relaxed);
		} else {
			self.failure.fetch_add(1, Ordering::Relaxed);
			self.rejected.fetch_add(waiters, Ordering::Relaxed);
		}
	}
}
