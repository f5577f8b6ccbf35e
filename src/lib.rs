//! Guarded HTTP client middleware: in-flight request deduplication, single-flight credential
//! refresh with waiter replay, and a closed error taxonomy for every transport outcome.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod classify;
pub mod client;
pub mod config;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod notify;
pub mod obs;
pub mod refresh;
pub mod tracker;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::GuardedClient,
		config::ClientConfig,
		credential::{
			Credential, CredentialError, CredentialStore, FnRefresher, MemoryCredentialStore,
			RefreshedCredential,
		},
		error::TransportError,
		http::{HttpTransport, InboundResponse, OutboundRequest, TransportFuture},
	};

	/// Base URL used by clients built on top of [`ScriptedTransport`].
	pub const SCRIPTED_BASE_URL: &str = "http://dashboard.test";

	type ScriptedHandler =
		dyn Fn(&OutboundRequest) -> Result<InboundResponse, TransportError> + Send + Sync;

	/// In-process transport that answers every request through a closure and records each
	/// dispatched request for later assertions.
	pub struct ScriptedTransport {
		handler: Box<ScriptedHandler>,
		calls: Mutex<Vec<OutboundRequest>>,
	}
	impl ScriptedTransport {
		/// Wraps a handler invoked once per dispatched request.
		pub fn new(
			handler: impl 'static
			+ Send
			+ Sync
			+ Fn(&OutboundRequest) -> Result<InboundResponse, TransportError>,
		) -> Self {
			Self { handler: Box::new(handler), calls: Default::default() }
		}

		/// Answers `200` with `body` when the request carries `Bearer <expected>`, `401` otherwise.
		pub fn bearer_gate(expected: &str, body: serde_json::Value) -> Self {
			let expected = format!("Bearer {expected}");

			Self::new(move |request| {
				if request.header("authorization") == Some(expected.as_str()) {
					Ok(InboundResponse::json(200, &body))
				} else {
					Ok(InboundResponse::json(401, &serde_json::json!({ "message": "expired" })))
				}
			})
		}

		/// Returns every request dispatched so far.
		pub fn calls(&self) -> Vec<OutboundRequest> {
			self.calls.lock().clone()
		}

		/// Total number of dispatched requests.
		pub fn call_count(&self) -> usize {
			self.calls.lock().len()
		}

		/// Number of dispatched requests whose URL path equals `path`.
		pub fn calls_to(&self, path: &str) -> usize {
			self.calls.lock().iter().filter(|request| request.url.path() == path).count()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			let reply = (self.handler)(&request);

			self.calls.lock().push(request);

			Box::pin(async move { reply })
		}
	}

	/// Builds a memory store holding `initial` whose refresh operation is `refresh`.
	pub fn memory_store_with<F, Fut>(
		initial: Option<&str>,
		refresh: F,
	) -> Arc<MemoryCredentialStore>
	where
		F: 'static + Send + Sync + Fn() -> Fut,
		Fut: 'static + Send + Future<Output = Result<RefreshedCredential, CredentialError>>,
	{
		let store = MemoryCredentialStore::with_refresher(FnRefresher(
			move |_: Option<Credential>| refresh(),
		));

		if let Some(value) = initial {
			store.seed_access_token(value);
		}

		Arc::new(store)
	}

	/// Builds a client over `transport` rooted at [`SCRIPTED_BASE_URL`].
	pub fn scripted_client(
		transport: Arc<ScriptedTransport>,
		store: Arc<dyn CredentialStore>,
	) -> GuardedClient<ScriptedTransport> {
		let config = ClientConfig::new()
			.with_base_url(SCRIPTED_BASE_URL)
			.expect("Scripted base URL should parse.");

		GuardedClient::with_transport(config, store, transport)
			.expect("Scripted client should build with the default timeout.")
	}

	/// Builds a reqwest-backed client rooted at `base_url` (typically an `httpmock` server).
	#[cfg(feature = "reqwest")]
	pub fn reqwest_test_client(
		base_url: &str,
		store: Arc<dyn CredentialStore>,
	) -> crate::client::ReqwestGuardedClient {
		let config =
			ClientConfig::new().with_base_url(base_url).expect("Mock server URL should parse.");

		GuardedClient::new(config, store).expect("Reqwest client should build for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, ErrorKind, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
