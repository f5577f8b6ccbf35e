//! In-flight request table used to reject duplicates and to cancel pending calls.
//!
//! Admission is synchronous and happens before the request future first suspends, so two
//! identical requests issued back to back are deduplicated even if neither has been polled.
//! Every admitted request holds an [`Admission`] guard that removes its entry on drop, which
//! covers success, failure, and cancellation exit paths alike.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures::future::AbortHandle;
// self
use crate::{_prelude::*, fingerprint::RequestFingerprint, http::Method, obs};

#[derive(Debug)]
struct PendingEntry {
	id: u64,
	cancel: AbortHandle,
	// Entries admitted with `skip_duplicate_check` are tracked for cancellation only.
	exclusive: bool,
}

/// Table of requests that have been admitted but have not yet settled.
#[derive(Debug, Default)]
pub struct RequestTracker {
	entries: Mutex<HashMap<RequestFingerprint, Vec<PendingEntry>>>,
	next_id: AtomicU64,
}
impl RequestTracker {
	/// Registers a request, rejecting it when an exclusive entry with the same fingerprint is
	/// already pending and `skip_duplicate_check` is false.
	pub fn admit(
		self: &Arc<Self>,
		fingerprint: RequestFingerprint,
		cancel: AbortHandle,
		skip_duplicate_check: bool,
	) -> Result<Admission> {
		let mut entries = self.entries.lock();
		let slot = entries.entry(fingerprint.clone()).or_default();

		if !skip_duplicate_check && slot.iter().any(|entry| entry.exclusive) {
			let fingerprint = fingerprint.to_string();

			drop(entries);
			obs::record_duplicate(&fingerprint);

			return Err(Error::Duplicate { fingerprint });
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		slot.push(PendingEntry { id, cancel, exclusive: !skip_duplicate_check });

		Ok(Admission { tracker: Arc::clone(self), fingerprint, id })
	}

	/// Removes the entry identified by `fingerprint` + `id`. Idempotent.
	pub(crate) fn release(&self, fingerprint: &RequestFingerprint, id: u64) -> bool {
		let mut entries = self.entries.lock();
		let Some(slot) = entries.get_mut(fingerprint) else {
			return false;
		};
		let before = slot.len();

		slot.retain(|entry| entry.id != id);

		let removed = slot.len() != before;

		if slot.is_empty() {
			entries.remove(fingerprint);
		}

		removed
	}

	/// Cancels and removes the oldest pending entry targeting `method` + `url`.
	pub fn cancel(&self, method: Method, url: &Url) -> bool {
		let entry = {
			let mut entries = self.entries.lock();
			let oldest = entries
				.iter()
				.filter(|(key, _)| key.targets(method, url))
				.flat_map(|(key, slot)| slot.iter().enumerate().map(move |(i, e)| (e.id, key, i)))
				.min_by_key(|(id, _, _)| *id)
				.map(|(_, key, i)| (key.clone(), i));
			let Some((key, index)) = oldest else {
				return false;
			};
			let Some(slot) = entries.get_mut(&key) else {
				return false;
			};
			let entry = slot.remove(index);

			if slot.is_empty() {
				entries.remove(&key);
			}

			entry
		};

		entry.cancel.abort();

		true
	}

	/// Cancels every pending entry and clears the table. Returns the number cancelled.
	pub fn cancel_all(&self) -> usize {
		let drained = std::mem::take(&mut *self.entries.lock());
		let mut count = 0;

		for entry in drained.into_values().flatten() {
			entry.cancel.abort();

			count += 1;
		}

		count
	}

	/// Returns true when at least one request with `fingerprint` is pending.
	pub fn contains(&self, fingerprint: &RequestFingerprint) -> bool {
		self.entries.lock().contains_key(fingerprint)
	}

	/// Number of pending requests.
	pub fn len(&self) -> usize {
		self.entries.lock().values().map(Vec::len).sum()
	}

	/// Returns true if nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

/// RAII registration for one admitted request; dropping it releases the tracker entry.
#[derive(Debug)]
pub struct Admission {
	tracker: Arc<RequestTracker>,
	fingerprint: RequestFingerprint,
	id: u64,
}
impl Admission {
	/// Fingerprint this admission was registered under.
	pub fn fingerprint(&self) -> &RequestFingerprint {
		&self.fingerprint
	}

	/// Releases the entry now instead of at drop.
	pub fn release(self) {}
}
impl Drop for Admission {
	fn drop(&mut self) {
		self.tracker.release(&self.fingerprint, self.id);
	}
}
