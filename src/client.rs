//! Interceptor pipeline and the public request surface.
//!
//! Every call runs the same ordered stages: fingerprint and admit, attach the stored credential,
//! show the loading indicator, dispatch, then either decode the body or classify the failure.
//! A `401` hands the request to the [`RefreshCoordinator`] and retries it exactly once with the
//! recovered credential; the retry is admitted afresh because the first entry was already
//! released.
//!
//! Admission happens when `get`/`post`/... is called, not when the returned future is first
//! polled, so two identical calls issued back to back are deduplicated even before either runs.

// crates.io
use futures::future::{self, AbortHandle, Abortable, Aborted};
// self
use crate::{
	_prelude::*,
	classify,
	config::{ClientConfig, RequestConfig},
	credential::{Credential, CredentialStore},
	error::ConfigError,
	fingerprint::RequestFingerprint,
	http::{HttpTransport, InboundResponse, Method, OutboundRequest},
	notify::{LoadingGuard, Notifier, SilentNotifier},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	refresh::RefreshCoordinator,
	tracker::{Admission, RequestTracker},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Boxed future returned by every request method. Owns everything it needs, so it may be
/// spawned or awaited after the client is dropped.
pub type RequestFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Client using the bundled reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestGuardedClient = GuardedClient<ReqwestTransport>;

/// Result of one pass through the network stage.
#[derive(Debug)]
enum Attempt {
	Accepted(InboundResponse),
	Duplicate(Error),
	RetriableAuth(Error),
	Terminal(Error),
}

/// Per-call state shared by the first attempt and its retry.
struct PreparedRequest {
	method: Method,
	url: Url,
	fingerprint: RequestFingerprint,
	body: Option<Vec<u8>>,
	config: RequestConfig,
	cancel: AbortHandle,
}
impl PreparedRequest {
	fn outbound(
		&self,
		defaults: &ClientConfig,
		credential: Option<&Credential>,
		timeout: std::time::Duration,
	) -> OutboundRequest {
		let mut url = self.url.clone();

		if !self.config.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&self.config.query);
		}

		let mut headers = defaults.default_headers.clone();

		headers.extend(self.config.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

		if let Some(credential) = credential {
			headers.insert("authorization".into(), credential.bearer());
		}

		OutboundRequest { method: self.method, url, headers, body: self.body.clone(), timeout }
	}
}

/// HTTP client guarded by request deduplication and single-flight credential refresh.
///
/// Clones share the tracker, the coordinator, and the credential store, so they behave as one
/// middleware instance.
pub struct GuardedClient<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	store: Arc<dyn CredentialStore>,
	notifier: Arc<dyn Notifier>,
	config: Arc<ClientConfig>,
	timeout: std::time::Duration,
	tracker: Arc<RequestTracker>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> GuardedClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over a caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let timeout = config.transport_timeout()?;

		Ok(Self {
			transport: transport.into(),
			store,
			notifier: Arc::new(SilentNotifier),
			config: Arc::new(config),
			timeout,
			tracker: Default::default(),
			coordinator: Default::default(),
		})
	}

	/// Replaces the loading/error collaborator.
	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;

		self
	}

	/// Issues a `GET`.
	pub fn get<R>(&self, url: &str, config: RequestConfig) -> RequestFuture<R>
	where
		R: 'static + Send + DeserializeOwned,
	{
		self.request(Method::Get, url, None, config)
	}

	/// Issues a `POST` with a JSON body.
	pub fn post<B, R>(&self, url: &str, body: &B, config: RequestConfig) -> RequestFuture<R>
	where
		B: ?Sized + Serialize,
		R: 'static + Send + DeserializeOwned,
	{
		self.request_with_body(Method::Post, url, body, config)
	}

	/// Issues a `PUT` with a JSON body.
	pub fn put<B, R>(&self, url: &str, body: &B, config: RequestConfig) -> RequestFuture<R>
	where
		B: ?Sized + Serialize,
		R: 'static + Send + DeserializeOwned,
	{
		self.request_with_body(Method::Put, url, body, config)
	}

	/// Issues a `PATCH` with a JSON body.
	pub fn patch<B, R>(&self, url: &str, body: &B, config: RequestConfig) -> RequestFuture<R>
	where
		B: ?Sized + Serialize,
		R: 'static + Send + DeserializeOwned,
	{
		self.request_with_body(Method::Patch, url, body, config)
	}

	/// Issues a `DELETE`.
	pub fn delete<R>(&self, url: &str, config: RequestConfig) -> RequestFuture<R>
	where
		R: 'static + Send + DeserializeOwned,
	{
		self.request(Method::Delete, url, None, config)
	}

	/// Runs the full pipeline for one request.
	///
	/// The request is fingerprinted and admitted before this method returns. A duplicate (or an
	/// unresolvable URL) yields a future that is already complete with the error; no network
	/// call is made.
	pub fn request<R>(
		&self,
		method: Method,
		url: &str,
		body: Option<serde_json::Value>,
		config: RequestConfig,
	) -> RequestFuture<R>
	where
		R: 'static + Send + DeserializeOwned,
	{
		let (cancel, registration) = AbortHandle::new_pair();
		let (prepared, admission) = match self.admit(method, url, body, config, cancel) {
			Ok(admitted) => admitted,
			Err(e) => return self.rejected(e),
		};
		let client = self.clone();
		let span = OperationSpan::request(&prepared.fingerprint);

		obs::record_operation_outcome(OperationKind::Request, OperationOutcome::Attempt);

		Box::pin(async move {
			let run = Abortable::new(client.run::<R>(prepared, admission), registration);
			let result = match span.instrument(run).await {
				Ok(result) => result,
				Err(Aborted) => Err(Error::Cancelled),
			};

			obs::record_operation_outcome(OperationKind::Request, OperationOutcome::of(&result));

			result
		})
	}

	/// Cancels one pending request targeting `method` + `url`.
	///
	/// In-flight requests are matched first, oldest admission wins; a request suspended behind
	/// a credential refresh is cancelled only when nothing in flight matches. Returns true if a
	/// request was cancelled.
	pub fn cancel_request(&self, url: &str, method: Method) -> bool {
		let Ok(url) = self.config.resolve(url) else {
			return false;
		};

		self.tracker.cancel(method, &url) || self.coordinator.cancel_waiter(method, &url)
	}

	/// Cancels every pending and suspended request. Returns the number cancelled.
	pub fn cancel_all_requests(&self) -> usize {
		self.tracker.cancel_all() + self.coordinator.cancel_all_waiters()
	}

	/// Stores `credential` for subsequent requests.
	pub fn set_credential(&self, credential: impl Into<String>) -> Result<()> {
		Ok(self.coordinator.replace(&*self.store, Some(Credential::new(credential)))?)
	}

	/// Removes the stored credential.
	pub fn clear_credential(&self) -> Result<()> {
		Ok(self.coordinator.replace(&*self.store, None)?)
	}

	/// In-flight request table.
	pub fn tracker(&self) -> &RequestTracker {
		&self.tracker
	}

	/// Refresh coordinator shared by every clone of this client.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}

	/// Client-wide configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	fn request_with_body<B, R>(
		&self,
		method: Method,
		url: &str,
		body: &B,
		config: RequestConfig,
	) -> RequestFuture<R>
	where
		B: ?Sized + Serialize,
		R: 'static + Send + DeserializeOwned,
	{
		match serde_json::to_value(body) {
			Ok(body) => self.request(method, url, Some(body), config),
			Err(e) => self.rejected(ConfigError::from(e).into()),
		}
	}

	fn rejected<R>(&self, err: Error) -> RequestFuture<R>
	where
		R: 'static + Send,
	{
		let result = Err(err);

		obs::record_operation_outcome(OperationKind::Request, OperationOutcome::of(&result));

		Box::pin(future::ready(result))
	}

	fn admit(
		&self,
		method: Method,
		url: &str,
		body: Option<serde_json::Value>,
		config: RequestConfig,
		cancel: AbortHandle,
	) -> Result<(PreparedRequest, Admission)> {
		let url = self.config.resolve(url)?;
		let fingerprint = RequestFingerprint::new(method, &url, &config.query, body.as_ref());
		let body = body.as_ref().map(serde_json::to_vec).transpose().map_err(ConfigError::from)?;
		let admission =
			self.tracker.admit(fingerprint.clone(), cancel.clone(), config.skip_duplicate_check)?;

		Ok((PreparedRequest { method, url, fingerprint, body, config, cancel }, admission))
	}

	async fn run<R>(self, prepared: PreparedRequest, admission: Admission) -> Result<R>
	where
		R: DeserializeOwned,
	{
		let result = self.dispatch(&prepared, admission).await.and_then(decode);

		if let Err(e) = &result {
			self.surface(&prepared.config, e);
		}

		result
	}

	async fn dispatch(
		&self,
		prepared: &PreparedRequest,
		admission: Admission,
	) -> Result<InboundResponse> {
		let (credential, generation) = self.coordinator.current(&*self.store)?;

		match self.attempt(prepared, Some(admission), credential.as_ref()).await {
			Attempt::Accepted(response) => Ok(response),
			Attempt::RetriableAuth(_) => {
				let credential = self
					.coordinator
					.recover(&*self.store, generation, &prepared.fingerprint, &prepared.cancel)
					.await?;

				match self.attempt(prepared, None, Some(&credential)).await {
					Attempt::Accepted(response) => Ok(response),
					// A second `401` is final.
					Attempt::Duplicate(e) | Attempt::RetriableAuth(e) | Attempt::Terminal(e) =>
						Err(e),
				}
			},
			Attempt::Duplicate(e) | Attempt::Terminal(e) => Err(e),
		}
	}

	async fn attempt(
		&self,
		prepared: &PreparedRequest,
		admission: Option<Admission>,
		credential: Option<&Credential>,
	) -> Attempt {
		// Held until the attempt settles; dropping it releases the tracker entry.
		let _admission = match admission {
			Some(admission) => admission,
			None => match self.tracker.admit(
				prepared.fingerprint.clone(),
				prepared.cancel.clone(),
				prepared.config.skip_duplicate_check,
			) {
				Ok(admission) => admission,
				Err(e) => return Attempt::Duplicate(e),
			},
		};
		let request = prepared.outbound(&self.config, credential, self.timeout);
		let reply = {
			let _loading = LoadingGuard::show(
				&*self.notifier,
				&prepared.fingerprint,
				prepared.config.show_loading,
			);

			self.transport.execute(request).await
		};

		match classify::check_reply(reply) {
			Ok(response) => Attempt::Accepted(response),
			Err(e @ Error::AuthExpired { .. }) => Attempt::RetriableAuth(e),
			Err(e) => Attempt::Terminal(e),
		}
	}

	fn surface(&self, config: &RequestConfig, err: &Error) {
		if config.show_error_message && err.is_surfaced() {
			self.notifier.show_error(err, &err.user_message());
		}
	}
}
#[cfg(feature = "reqwest")]
impl GuardedClient<ReqwestTransport> {
	/// Creates a client backed by a freshly built reqwest client.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let client = ReqwestClient::builder().build().map_err(ConfigError::from)?;

		Self::with_transport(config, store, ReqwestTransport::with_client(client))
	}
}
impl<T> Clone for GuardedClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: Arc::clone(&self.transport),
			store: Arc::clone(&self.store),
			notifier: Arc::clone(&self.notifier),
			config: Arc::clone(&self.config),
			timeout: self.timeout,
			tracker: Arc::clone(&self.tracker),
			coordinator: Arc::clone(&self.coordinator),
		}
	}
}
impl<T> Debug for GuardedClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GuardedClient")
			.field("base_url", &self.config.base_url.as_ref().map(Url::as_str))
			.field("timeout", &self.timeout)
			.field("pending", &self.tracker.len())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

fn decode<R>(response: InboundResponse) -> Result<R>
where
	R: DeserializeOwned,
{
	// Empty bodies (e.g. `204`) decode as JSON `null` so `()` and `Option<_>` targets work.
	let body: &[u8] =
		if response.body.iter().all(u8::is_ascii_whitespace) { b"null" } else { &response.body };
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { source, status: response.status })
}
