//! File-backed [`CredentialStore`] for desktop and service deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	credential::{
		Credential, CredentialError, CredentialFuture, CredentialRefresher, CredentialStore,
	},
};

/// On-disk snapshot persisted after each mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
	/// Access credential attached to outgoing requests.
	pub access_token: Option<Credential>,
	/// Refresh secret exchanged by the refresher.
	pub refresh_token: Option<Credential>,
	/// Instant of the last mutation.
	pub updated_at: Option<OffsetDateTime>,
}

/// Persists the access credential and refresh secret to a JSON file after each mutation.
#[derive(Clone)]
pub struct FileCredentialStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialSnapshot>>,
	refresher: Arc<dyn CredentialRefresher>,
}
impl FileCredentialStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(
		path: impl Into<PathBuf>,
		refresher: impl 'static + CredentialRefresher,
	) -> Result<Self, CredentialError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)), refresher: Arc::new(refresher) })
	}

	/// Replaces the refresh secret (e.g., after an interactive sign-in).
	pub fn set_refresh_token(&self, value: impl Into<String>) -> Result<(), CredentialError> {
		let mut guard = self.inner.write();

		guard.refresh_token = Some(Credential::new(value));

		self.persist_locked(&mut guard)
	}

	/// Returns a copy of the current snapshot.
	pub fn snapshot(&self) -> CredentialSnapshot {
		self.inner.read().clone()
	}

	fn load_snapshot(path: &Path) -> Result<CredentialSnapshot, CredentialError> {
		if !path.exists() {
			return Ok(CredentialSnapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| CredentialError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(CredentialSnapshot::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| CredentialError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), CredentialError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CredentialError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, snapshot: &mut CredentialSnapshot) -> Result<(), CredentialError> {
		snapshot.updated_at = Some(OffsetDateTime::now_utc());

		let serialized =
			serde_json::to_vec_pretty(&*snapshot).map_err(|e| CredentialError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| CredentialError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CredentialError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CredentialError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| CredentialError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileCredentialStore {
	fn credential(&self) -> Result<Option<Credential>, CredentialError> {
		Ok(self.inner.read().access_token.clone())
	}

	fn set_credential(&self, credential: Credential) -> Result<(), CredentialError> {
		let mut guard = self.inner.write();

		guard.access_token = Some(credential);

		self.persist_locked(&mut guard)
	}

	fn clear_credential(&self) -> Result<(), CredentialError> {
		let mut guard = self.inner.write();

		guard.access_token = None;

		self.persist_locked(&mut guard)
	}

	fn refresh_credential(&self) -> CredentialFuture<'_, Credential> {
		Box::pin(async move {
			let current = self.inner.read().refresh_token.clone();
			let refreshed = self.refresher.refresh(current).await?;

			if let Some(rotated) = refreshed.refresh_token {
				let mut guard = self.inner.write();

				guard.refresh_token = Some(rotated);

				self.persist_locked(&mut guard)?;
			}

			Ok(refreshed.access_token)
		})
	}
}
impl Debug for FileCredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileCredentialStore").field("path", &self.path).finish()
	}
}
