//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	credential::{
		Credential, CredentialError, CredentialFuture, CredentialRefresher, CredentialStore,
	},
};

/// Keeps the access credential and refresh secret in-process.
///
/// Without a refresher, [`refresh_credential`](CredentialStore::refresh_credential) fails with
/// [`CredentialError::RefreshUnavailable`].
#[derive(Default)]
pub struct MemoryCredentialStore {
	access_token: RwLock<Option<Credential>>,
	refresh_token: RwLock<Option<Credential>>,
	refresher: Option<Arc<dyn CredentialRefresher>>,
}
impl MemoryCredentialStore {
	/// Creates an empty store that refreshes through `refresher`.
	pub fn with_refresher(refresher: impl 'static + CredentialRefresher) -> Self {
		Self { refresher: Some(Arc::new(refresher)), ..Default::default() }
	}

	/// Seeds the access credential.
	pub fn seed_access_token(&self, value: impl Into<String>) {
		*self.access_token.write() = Some(Credential::new(value));
	}

	/// Seeds the refresh secret handed to the refresher.
	pub fn seed_refresh_token(&self, value: impl Into<String>) {
		*self.refresh_token.write() = Some(Credential::new(value));
	}

	/// Current refresh secret, if any.
	pub fn refresh_token(&self) -> Option<Credential> {
		self.refresh_token.read().clone()
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn credential(&self) -> Result<Option<Credential>, CredentialError> {
		Ok(self.access_token.read().clone())
	}

	fn set_credential(&self, credential: Credential) -> Result<(), CredentialError> {
		*self.access_token.write() = Some(credential);

		Ok(())
	}

	fn clear_credential(&self) -> Result<(), CredentialError> {
		self.access_token.write().take();

		Ok(())
	}

	fn refresh_credential(&self) -> CredentialFuture<'_, Credential> {
		let refresher = self.refresher.clone();
		let current = self.refresh_token();

		Box::pin(async move {
			let refresher = refresher.ok_or(CredentialError::RefreshUnavailable)?;
			let refreshed = refresher.refresh(current).await?;

			if let Some(rotated) = refreshed.refresh_token {
				*self.refresh_token.write() = Some(rotated);
			}

			Ok(refreshed.access_token)
		})
	}
}
impl Debug for MemoryCredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryCredentialStore")
			.field("access_token_set", &self.access_token.read().is_some())
			.field("refresh_token_set", &self.refresh_token.read().is_some())
			.field("refresher_set", &self.refresher.is_some())
			.finish()
	}
}
