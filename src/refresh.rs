//! Single-flight credential refresh with FIFO waiter replay.
//!
//! The first request that hits `401` while the coordinator is idle becomes the leader: it flips
//! the state to [`RefreshState::Refreshing`] under the state lock and only then dispatches
//! [`CredentialStore::refresh_credential`]. Any `401` observed while the refresh is pending
//! queues a waiter instead of starting a second refresh. When the refresh settles, the state
//! returns to idle and every waiter is resolved (or rejected) in arrival order with the same
//! outcome.
//!
//! Each stored credential carries a generation number. A request that was sent with an older
//! generation than the current one already has a newer credential available, so its `401` is
//! replayed immediately instead of triggering another refresh.
//!
//! Store writes, which may persist to disk, run outside the state lock. Writers update the store
//! before bumping the generation and readers load the generation before the store, so a reader
//! can pair a new credential with an old generation but never the reverse.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use futures::{channel::oneshot, future::AbortHandle};
use parking_lot::MutexGuard;
// self
use crate::{
	_prelude::*,
	credential::{Credential, CredentialError, CredentialStore},
	fingerprint::RequestFingerprint,
	http::Method,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

type RefreshOutcome = Result<Credential, Arc<CredentialError>>;

/// Coordinator state observed from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshState {
	/// No refresh is in flight.
	Idle,
	/// A refresh is in flight; new `401`s queue behind it.
	Refreshing,
}

struct Waiter {
	id: u64,
	fingerprint: RequestFingerprint,
	cancel: AbortHandle,
	resolve: oneshot::Sender<RefreshOutcome>,
}

#[derive(Default)]
struct CoordinatorState {
	refreshing: bool,
	generation: u64,
	next_waiter: u64,
	waiters: VecDeque<Waiter>,
}

enum Role<'a> {
	Lead(RefreshLease<'a>),
	Follow(oneshot::Receiver<RefreshOutcome>, WaiterSlot<'a>),
	Replay(Credential),
}

/// Serializes credential refreshes for one client instance.
#[derive(Default)]
pub struct RefreshCoordinator {
	state: Mutex<CoordinatorState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Current state.
	pub fn state(&self) -> RefreshState {
		if self.state.lock().refreshing { RefreshState::Refreshing } else { RefreshState::Idle }
	}

	/// Generation of the currently stored credential.
	pub fn generation(&self) -> u64 {
		self.state.lock().generation
	}

	/// Number of requests suspended behind the in-flight refresh.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Reads the stored credential together with its generation.
	pub fn current(
		&self,
		store: &dyn CredentialStore,
	) -> Result<(Option<Credential>, u64), CredentialError> {
		let generation = self.state.lock().generation;

		Ok((store.credential()?, generation))
	}

	/// Replaces the stored credential from outside a refresh, starting a new generation.
	pub fn replace(
		&self,
		store: &dyn CredentialStore,
		credential: Option<Credential>,
	) -> Result<(), CredentialError> {
		match credential {
			Some(credential) => store.set_credential(credential)?,
			None => store.clear_credential()?,
		}

		self.state.lock().generation += 1;

		Ok(())
	}

	/// Recovers a credential for a request that received `401` after being sent with
	/// `seen_generation`.
	///
	/// Resolves to the credential the request should be retried with, or fails with
	/// [`Error::RefreshFailed`] when the shared refresh fails. `cancel` is the request's own
	/// cancel handle so queued waiters stay reachable by
	/// [`cancel_waiter`](Self::cancel_waiter).
	pub async fn recover(
		&self,
		store: &dyn CredentialStore,
		seen_generation: u64,
		fingerprint: &RequestFingerprint,
		cancel: &AbortHandle,
	) -> Result<Credential> {
		let role = {
			let mut state = self.state.lock();

			if state.refreshing {
				let (resolve, outcome) = oneshot::channel();
				let id = state.next_waiter;

				state.next_waiter += 1;
				state.waiters.push_back(Waiter {
					id,
					fingerprint: fingerprint.clone(),
					cancel: cancel.clone(),
					resolve,
				});
				obs::record_waiter_queued(fingerprint, state.waiters.len());

				Role::Follow(outcome, WaiterSlot { coordinator: self, id })
			} else {
				let replay = if state.generation != seen_generation {
					store.credential()?
				} else {
					None
				};

				match replay {
					Some(credential) => Role::Replay(credential),
					None => {
						state.refreshing = true;

						Role::Lead(RefreshLease { coordinator: self, settled: false })
					},
				}
			}
		};

		match role {
			Role::Replay(credential) => Ok(credential),
			Role::Follow(outcome, _slot) => match outcome.await {
				Ok(Ok(credential)) => Ok(credential),
				Ok(Err(source)) => Err(Error::RefreshFailed { source }),
				Err(oneshot::Canceled) => Err(Error::Cancelled),
			},
			Role::Lead(lease) => self.lead(store, lease).await,
		}
	}

	/// Removes and cancels the first queued waiter targeting `method` + `url`. The waiter's
	/// resolver is dropped without being invoked.
	pub fn cancel_waiter(&self, method: Method, url: &Url) -> bool {
		let waiter = {
			let mut state = self.state.lock();
			let Some(index) =
				state.waiters.iter().position(|waiter| waiter.fingerprint.targets(method, url))
			else {
				return false;
			};

			state.waiters.remove(index)
		};

		match waiter {
			Some(waiter) => {
				waiter.cancel.abort();

				true
			},
			None => false,
		}
	}

	/// Removes and cancels every queued waiter. Returns the number cancelled.
	pub fn cancel_all_waiters(&self) -> usize {
		let waiters = std::mem::take(&mut self.state.lock().waiters);
		let count = waiters.len();

		for waiter in waiters {
			waiter.cancel.abort();
		}

		count
	}

	async fn lead(&self, store: &dyn CredentialStore, lease: RefreshLease<'_>) -> Result<Credential> {
		self.metrics.record_attempt();
		obs::record_operation_outcome(OperationKind::Refresh, OperationOutcome::Attempt);

		let result = OperationSpan::refresh().instrument(store.refresh_credential()).await;

		lease.settle(store, result).map_err(|source| Error::RefreshFailed { source })
	}

	fn settle(
		&self,
		store: &dyn CredentialStore,
		result: Result<Credential, CredentialError>,
	) -> RefreshOutcome {
		// `refreshing` stays set while the store is written, so new `401`s keep queueing.
		let outcome = match result {
			Ok(credential) =>
				store.set_credential(credential.clone()).map(|()| credential).map_err(Arc::new),
			Err(e) => {
				if let Err(clear) = store.clear_credential() {
					obs::record_clear_failed(&clear);
				}

				Err(Arc::new(e))
			},
		};
		let mut state = self.state.lock();

		if outcome.is_ok() {
			state.generation += 1;
		}

		self.release_waiters(state, &outcome);

		outcome
	}

	fn release_waiters(&self, mut state: MutexGuard<'_, CoordinatorState>, outcome: &RefreshOutcome) {
		state.refreshing = false;

		let waiters = std::mem::take(&mut state.waiters);

		drop(state);

		let count = waiters.len();

		for waiter in waiters {
			// A dropped receiver means the caller went away; nothing to deliver.
			let _ = waiter.resolve.send(outcome.clone());
		}

		self.metrics.record_settled(outcome.is_ok(), count);
		obs::record_refresh_settled(outcome.is_ok(), count);
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refreshing", &state.refreshing)
			.field("generation", &state.generation)
			.field("waiting", &state.waiters.len())
			.finish()
	}
}

/// Leadership of the in-flight refresh. Dropping it unsettled (the leader was cancelled)
/// returns the coordinator to idle and rejects every waiter.
struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	fn settle(
		mut self,
		store: &dyn CredentialStore,
		result: Result<Credential, CredentialError>,
	) -> RefreshOutcome {
		self.settled = true;

		self.coordinator.settle(store, result)
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			let state = self.coordinator.state.lock();

			self.coordinator
				.release_waiters(state, &Err(Arc::new(CredentialError::Interrupted)));
		}
	}
}

/// Queue position of one suspended request; removes the waiter on drop if it is still queued.
struct WaiterSlot<'a> {
	coordinator: &'a RefreshCoordinator,
	id: u64,
}
impl Drop for WaiterSlot<'_> {
	fn drop(&mut self) {
		self.coordinator.state.lock().waiters.retain(|waiter| waiter.id != self.id);
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use futures::future::{self, Abortable};
	// self
	use super::*;
	use crate::credential::{
		CredentialFuture, FnRefresher, MemoryCredentialStore, RefreshedCredential,
	};

	fn key(path: &str) -> RequestFingerprint {
		let url = Url::parse("http://dashboard.test")
			.and_then(|base| base.join(path))
			.expect("Fixture URL should resolve.");

		RequestFingerprint::new(Method::Get, &url, &[], None)
	}

	fn counting_store(
		calls: Arc<AtomicUsize>,
		outcome: Result<&'static str, CredentialError>,
	) -> MemoryCredentialStore {
		let store = MemoryCredentialStore::with_refresher(FnRefresher(
			move |_: Option<Credential>| {
				let calls = calls.clone();
				let outcome = outcome.clone();

				async move {
					calls.fetch_add(1, Ordering::SeqCst);
					tokio::time::sleep(std::time::Duration::from_millis(20)).await;

					outcome.map(RefreshedCredential::access)
				}
			},
		));

		store.seed_access_token("stale");

		store
	}

	#[tokio::test]
	async fn concurrent_recoveries_share_one_refresh() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = counting_store(calls.clone(), Ok("abc123"));
		let coordinator = RefreshCoordinator::default();
		let keys: Vec<_> = (0..5).map(|i| key(&format!("/api/{i}"))).collect();
		let handles: Vec<_> = keys.iter().map(|_| AbortHandle::new_pair().0).collect();
		let results = future::join_all(
			keys.iter().zip(&handles).map(|(key, cancel)| coordinator.recover(&store, 0, key, cancel)),
		)
		.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(results.iter().all(|r| matches!(r, Ok(c) if c.expose() == "abc123")));
		assert_eq!(coordinator.state(), RefreshState::Idle);
		assert_eq!(coordinator.generation(), 1);
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert_eq!(coordinator.metrics().waiters_released(), 4);
		assert_eq!(
			store.credential().expect("Read should succeed.").as_ref().map(Credential::expose),
			Some("abc123")
		);
	}

	#[tokio::test]
	async fn failed_refresh_rejects_every_waiter_and_clears_store() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = counting_store(
			calls.clone(),
			Err(CredentialError::Transport { message: "connection refused".into() }),
		);
		let coordinator = RefreshCoordinator::default();
		let keys: Vec<_> = (0..3).map(|i| key(&format!("/api/{i}"))).collect();
		let cancel = AbortHandle::new_pair().0;
		let results =
			future::join_all(keys.iter().map(|key| coordinator.recover(&store, 0, key, &cancel)))
				.await;

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(results.iter().all(|r| matches!(r, Err(Error::RefreshFailed { .. }))));
		assert!(store.credential().expect("Read should succeed.").is_none());
		assert_eq!(coordinator.metrics().waiters_rejected(), 2);
		assert_eq!(coordinator.state(), RefreshState::Idle);
	}

	/// Wraps a memory store and counts writes issued while the coordinator lock is held.
	struct AuditedStore {
		inner: MemoryCredentialStore,
		coordinator: Arc<RefreshCoordinator>,
		fail_clear: bool,
		writes_under_lock: AtomicUsize,
	}
	impl AuditedStore {
		fn new(inner: MemoryCredentialStore, fail_clear: bool) -> Self {
			Self {
				inner,
				coordinator: Default::default(),
				fail_clear,
				writes_under_lock: AtomicUsize::new(0),
			}
		}

		fn note_write(&self) {
			if self.coordinator.state.try_lock().is_none() {
				self.writes_under_lock.fetch_add(1, Ordering::SeqCst);
			}
		}
	}
	impl CredentialStore for AuditedStore {
		fn credential(&self) -> Result<Option<Credential>, CredentialError> {
			self.inner.credential()
		}

		fn set_credential(&self, credential: Credential) -> Result<(), CredentialError> {
			self.note_write();
			self.inner.set_credential(credential)
		}

		fn clear_credential(&self) -> Result<(), CredentialError> {
			self.note_write();

			if self.fail_clear {
				return Err(CredentialError::Backend { message: "disk full".into() });
			}

			self.inner.clear_credential()
		}

		fn refresh_credential(&self) -> CredentialFuture<'_, Credential> {
			self.inner.refresh_credential()
		}
	}

	#[tokio::test]
	async fn store_writes_run_outside_coordinator_lock() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = AuditedStore::new(counting_store(calls.clone(), Ok("abc123")), false);
		let coordinator = store.coordinator.clone();
		let cancel = AbortHandle::new_pair().0;

		coordinator
			.recover(&store, 0, &key("/api/getArtConn"), &cancel)
			.await
			.expect("Refresh should succeed.");
		coordinator.replace(&store, None).expect("Clearing should succeed.");
		coordinator
			.replace(&store, Some(Credential::new("manual")))
			.expect("Replacing should succeed.");

		assert_eq!(store.writes_under_lock.load(Ordering::SeqCst), 0);
		assert_eq!(coordinator.generation(), 3);
		let (current, _) = coordinator.current(&store).expect("Read should succeed.");

		assert_eq!(current.as_ref().map(Credential::expose), Some("manual"));
	}

	#[tokio::test]
	async fn failed_clear_after_failed_refresh_still_settles() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = AuditedStore::new(
			counting_store(calls.clone(), Err(CredentialError::Rejected { status: 401 })),
			true,
		);
		let coordinator = store.coordinator.clone();
		let cancel = AbortHandle::new_pair().0;
		let err = coordinator
			.recover(&store, 0, &key("/api/getOrderSolve"), &cancel)
			.await
			.expect_err("A rejected refresh is fatal.");

		assert!(matches!(
			err,
			Error::RefreshFailed { source } if *source == CredentialError::Rejected { status: 401 }
		));
		assert_eq!(coordinator.state(), RefreshState::Idle);
		assert_eq!(coordinator.metrics().failures(), 1);
		assert_eq!(coordinator.generation(), 0);
		assert_eq!(store.writes_under_lock.load(Ordering::SeqCst), 0);
		assert_eq!(
			store.credential().expect("Read should succeed.").as_ref().map(Credential::expose),
			Some("stale"),
			"The credential survives a failed clear."
		);
	}

	#[tokio::test]
	async fn stale_generation_replays_without_refresh() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = counting_store(calls.clone(), Ok("unused"));
		let coordinator = RefreshCoordinator::default();

		coordinator
			.replace(&store, Some(Credential::new("rotated")))
			.expect("Replacing the credential should succeed.");

		let credential = coordinator
			.recover(&store, 0, &key("/api/getArtConn"), &AbortHandle::new_pair().0)
			.await
			.expect("Stale 401 should replay with the current credential.");

		assert_eq!(credential.expose(), "rotated");
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn cancelled_waiter_leaves_queue_without_resolution() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = counting_store(calls.clone(), Ok("abc123"));
		let coordinator = RefreshCoordinator::default();
		let leader_key = key("/api/leader");
		let waiter_key = key("/api/waiter");
		let leader_cancel = AbortHandle::new_pair().0;
		let (waiter_cancel, registration) = AbortHandle::new_pair();
		let leader = coordinator.recover(&store, 0, &leader_key, &leader_cancel);
		let waiter = Abortable::new(
			coordinator.recover(&store, 0, &waiter_key, &waiter_cancel),
			registration,
		);
		let cancel_after_queueing = async {
			while coordinator.waiting() == 0 {
				tokio::task::yield_now().await;
			}

			let url = Url::parse("http://dashboard.test/api/waiter").expect("URL should parse.");

			assert!(coordinator.cancel_waiter(Method::Get, &url));
			assert_eq!(coordinator.waiting(), 0);
		};
		let (leader, waiter, ()) = futures::join!(leader, waiter, cancel_after_queueing);

		assert!(leader.is_ok());
		assert!(waiter.is_err(), "Cancelled waiter should resolve as aborted.");
		assert_eq!(coordinator.metrics().waiters_released(), 0);
	}

	#[tokio::test]
	async fn dropped_leader_interrupts_waiters() {
		let calls = Arc::new(AtomicUsize::new(0));
		let store = counting_store(calls.clone(), Ok("abc123"));
		let coordinator = RefreshCoordinator::default();
		let cancel = AbortHandle::new_pair().0;
		let leader_key = key("/api/leader");
		let waiter_key = key("/api/waiter");
		let mut leader = Box::pin(coordinator.recover(&store, 0, &leader_key, &cancel));

		assert!(futures::poll!(leader.as_mut()).is_pending());
		assert_eq!(coordinator.state(), RefreshState::Refreshing);

		let mut waiter = Box::pin(coordinator.recover(&store, 0, &waiter_key, &cancel));

		assert!(futures::poll!(waiter.as_mut()).is_pending());
		assert_eq!(coordinator.waiting(), 1);

		drop(leader);

		assert_eq!(coordinator.state(), RefreshState::Idle);
		assert!(matches!(
			waiter.await,
			Err(Error::RefreshFailed { source }) if *source == CredentialError::Interrupted
		));
	}
}
