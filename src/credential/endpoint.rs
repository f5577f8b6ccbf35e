//! Reqwest-backed [`CredentialRefresher`] that exchanges a refresh secret at a JSON endpoint.

// self
use crate::{
	_prelude::*,
	credential::{
		Credential, CredentialError, CredentialFuture, CredentialRefresher, RefreshedCredential,
	},
};

#[derive(Serialize)]
struct RefreshRequest<'a> {
	refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct RefreshResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// POSTs `{"refresh_token": ...}` to `url` and reads `access_token` (plus an optional rotated
/// `refresh_token`) from the JSON response.
///
/// The endpoint is called with a plain client: it never passes through the guarded pipeline, so
/// a `401` here is a refresh failure rather than another refresh trigger.
#[derive(Clone, Debug)]
pub struct RefreshEndpoint {
	client: ReqwestClient,
	url: Url,
}
impl RefreshEndpoint {
	/// Creates a refresher targeting `url` with a default reqwest client.
	pub fn new(url: Url) -> Self {
		Self::with_client(ReqwestClient::default(), url)
	}

	/// Creates a refresher that reuses an existing reqwest client.
	pub fn with_client(client: ReqwestClient, url: Url) -> Self {
		Self { client, url }
	}

	async fn exchange(
		&self,
		refresh_token: Option<Credential>,
	) -> Result<RefreshedCredential, CredentialError> {
		let payload =
			RefreshRequest { refresh_token: refresh_token.as_ref().map(Credential::expose) };
		let response = self
			.client
			.post(self.url.clone())
			.json(&payload)
			.send()
			.await
			.map_err(|e| CredentialError::Transport { message: e.to_string() })?;
		let status = response.status();

		if !status.is_success() {
			return Err(CredentialError::Rejected { status: status.as_u16() });
		}

		let bytes = response
			.bytes()
			.await
			.map_err(|e| CredentialError::Transport { message: e.to_string() })?;
		let body: RefreshResponse = serde_path_to_error::deserialize(
			&mut serde_json::Deserializer::from_slice(&bytes),
		)
		.map_err(|e| CredentialError::Serialization {
			message: format!("Refresh response is malformed at `{}`: {}", e.path(), e.inner()),
		})?;

		Ok(RefreshedCredential {
			access_token: Credential::new(body.access_token),
			refresh_token: body.refresh_token.map(Credential::new),
		})
	}
}
impl CredentialRefresher for RefreshEndpoint {
	fn refresh(
		&self,
		refresh_token: Option<Credential>,
	) -> CredentialFuture<'_, RefreshedCredential> {
		Box::pin(self.exchange(refresh_token))
	}
}
