//! Deterministic request fingerprints used for in-flight deduplication.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use url::form_urlencoded;
// self
use crate::{_prelude::*, http::Method};

/// Structural key derived from a request's method, resolved URL, query pairs, and JSON body.
///
/// Two requests with equal fingerprints are duplicates. Construction is pure: the query pairs
/// are form-encoded in the order given and the body uses `serde_json`'s canonical (key-sorted)
/// rendering, so the same inputs always yield the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint {
	method: Method,
	url: String,
	query: String,
	body: String,
}
impl RequestFingerprint {
	/// Builds the fingerprint for a request.
	pub fn new(
		method: Method,
		url: &Url,
		query: &[(String, String)],
		body: Option<&serde_json::Value>,
	) -> Self {
		let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(query).finish();
		let body = body.map(ToString::to_string).unwrap_or_default();

		Self { method, url: url.as_str().to_owned(), query, body }
	}

	/// HTTP verb component.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Resolved URL component (without the separately tracked query pairs).
	pub fn url(&self) -> &str {
		&self.url
	}

	/// Returns true when the fingerprint targets `method` + `url`, ignoring query and body.
	pub fn targets(&self, method: Method, url: &Url) -> bool {
		self.method == method && self.url == url.as_str()
	}

	/// Base64 (no padding) SHA-256 digest of the full key, safe to log even when bodies carry
	/// sensitive values.
	pub fn digest(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.to_string().as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}
}
impl Display for RequestFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}_{}_{}_{}", self.method, self.url, self.query, self.body)
	}
}
