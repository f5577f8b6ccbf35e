//! Credential store contract and built-in store implementations.
//!
//! The client never persists credentials itself; it reads, writes, clears, and refreshes them
//! exclusively through [`CredentialStore`]. Stores are injected as `Arc<dyn CredentialStore>`,
//! so tests use [`MemoryCredentialStore`] while deployments use [`FileCredentialStore`] backed by
//! a [`CredentialRefresher`] such as [`RefreshEndpoint`].

#[cfg(feature = "reqwest")] pub mod endpoint;
pub mod file;
pub mod memory;

#[cfg(feature = "reqwest")] pub use endpoint::RefreshEndpoint;
pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

// self
use crate::_prelude::*;

/// Boxed future returned by credential refresh operations.
pub type CredentialFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, CredentialError>> + 'a + Send>>;

/// Capability contract for the component that owns the bearer credential.
///
/// Reads and writes are synchronous so the client can attach a credential without suspending;
/// only [`refresh_credential`](Self::refresh_credential) performs I/O.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current credential, if one is stored.
	fn credential(&self) -> Result<Option<Credential>, CredentialError>;

	/// Stores or replaces the current credential.
	fn set_credential(&self, credential: Credential) -> Result<(), CredentialError>;

	/// Removes the current credential.
	fn clear_credential(&self) -> Result<(), CredentialError>;

	/// Obtains a fresh credential from the refresh authority.
	///
	/// Implementations must not store the returned access credential themselves; the caller
	/// decides whether to persist it. Rotated refresh secrets may be persisted here.
	fn refresh_credential(&self) -> CredentialFuture<'_, Credential>;
}

/// Exchanges a refresh secret for a new access credential.
pub trait CredentialRefresher
where
	Self: Send + Sync,
{
	/// Performs the exchange. `refresh_token` is whatever the store currently holds.
	fn refresh(
		&self,
		refresh_token: Option<Credential>,
	) -> CredentialFuture<'_, RefreshedCredential>;
}

/// Adapter turning a closure into a [`CredentialRefresher`].
pub struct FnRefresher<F>(pub F);
impl<F, Fut> CredentialRefresher for FnRefresher<F>
where
	F: Send + Sync + Fn(Option<Credential>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<RefreshedCredential, CredentialError>>,
{
	fn refresh(
		&self,
		refresh_token: Option<Credential>,
	) -> CredentialFuture<'_, RefreshedCredential> {
		Box::pin((self.0)(refresh_token))
	}
}
impl<F> Debug for FnRefresher<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnRefresher(..)")
	}
}

/// Result of a successful refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedCredential {
	/// New access credential.
	pub access_token: Credential,
	/// Rotated refresh secret, when the authority issued one.
	pub refresh_token: Option<Credential>,
}
impl RefreshedCredential {
	/// Wraps an access credential without a rotated refresh secret.
	pub fn access(access_token: impl Into<String>) -> Self {
		Self { access_token: Credential::new(access_token), refresh_token: None }
	}

	/// Attaches a rotated refresh secret.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(Credential::new(refresh_token));

		self
	}
}

/// Opaque bearer credential that redacts itself in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);
impl Credential {
	/// Wraps a new credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for Credential {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Credential").field(&"<redacted>").finish()
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Error type produced by [`CredentialStore`] and [`CredentialRefresher`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the request with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// The refresh endpoint could not be reached.
	#[error("Refresh endpoint is unreachable: {message}.")]
	Transport {
		/// Human-readable error payload.
		message: String,
	},
	/// The store has no refresh capability configured.
	#[error("No refresh operation is configured for this credential store.")]
	RefreshUnavailable,
	/// The refresh was abandoned before it settled.
	#[error("Credential refresh was interrupted before it completed.")]
	Interrupted,
}
