//! Transport primitives for guarded requests.
//!
//! The module exposes [`HttpTransport`] alongside the owned [`OutboundRequest`] and
//! [`InboundResponse`] values so downstream crates can plug in custom HTTP stacks without
//! touching the interceptor pipeline. Implementations report a response for every status code
//! (including 4xx/5xx) and only return [`TransportError`] when no response arrived at all;
//! classification happens in [`classify`](crate::classify).

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<InboundResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing one request.
///
/// The trait acts as the client's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so a single transport can be shared by every clone of a
/// [`GuardedClient`](crate::client::GuardedClient), and the returned future must be `Send` so
/// request futures can hop executors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, resolving to the response regardless of its status code.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// HTTP verbs exposed by the client surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
	/// `PATCH`
	Patch,
}
impl Method {
	/// Upper-case verb string.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
			Method::Patch => "PATCH",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved request handed to a transport. Each dispatch owns its own copy.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute URL including any query parameters.
	pub url: Url,
	/// Header map with lower-case names.
	pub headers: BTreeMap<String, String>,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
	/// Transport timeout for this dispatch.
	pub timeout: std::time::Duration,
}
impl OutboundRequest {
	/// Returns the header value for `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}
}

/// Response captured by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl InboundResponse {
	/// Creates a response from raw parts.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Creates a response whose body is the JSON encoding of `value`.
	pub fn json(status: u16, value: &serde_json::Value) -> Self {
		Self::new(status, value.to_string())
	}

	/// Returns true for `2xx` statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The per-request timeout carried by [`OutboundRequest`] is applied to every call; a timeout
/// surfaces as [`TransportError::Timeout`] and is never retried.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Delete => reqwest::Method::DELETE,
				Method::Patch => reqwest::Method::PATCH,
			};
			let mut builder = client.request(method, request.url).timeout(request.timeout);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(InboundResponse { status, body })
		})
	}
}
