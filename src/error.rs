//! Client-level error types and the closed taxonomy every failure is classified into.

// self
use crate::{_prelude::*, classify, credential::CredentialError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by every request issued through the client.
#[derive(Debug, ThisError)]
pub enum Error {
	/// An identical request is already in flight; no network call was made.
	#[error("Duplicate request rejected: {fingerprint}.")]
	Duplicate {
		/// Display form of the rejected request's fingerprint.
		fingerprint: String,
	},
	/// Upstream answered `401` and the credential could not be recovered for this request.
	#[error("Credential expired or was rejected by the server.")]
	AuthExpired {
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// Upstream answered `400`.
	#[error("Request validation failed{}.", detail(.message))]
	Validation {
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// Upstream answered `403`.
	#[error("Permission denied{}.", detail(.message))]
	Permission {
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// Upstream answered `404`.
	#[error("Requested resource was not found{}.", detail(.message))]
	NotFound {
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// Upstream answered with a `5xx` status.
	#[error("Server failed with status {status}{}.", detail(.message))]
	Server {
		/// HTTP status code.
		status: u16,
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// No response was received (connect failure, reset, or timeout).
	#[error(transparent)]
	Network(#[from] TransportError),
	/// The credential refresh itself failed; every request waiting on it fails the same way.
	#[error("Credential refresh failed: {source}")]
	RefreshFailed {
		/// Refresh failure shared by every waiter.
		#[source]
		source: Arc<CredentialError>,
	},
	/// Upstream answered with a status outside the mapped set.
	#[error("Request failed with status {status}{}.", detail(.message))]
	Unknown {
		/// HTTP status code.
		status: u16,
		/// Server-supplied `message` field, if any.
		message: Option<String>,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body (status {status}) could not be decoded.")]
	Decode {
		/// Structured decoding failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// The request was cancelled before it settled.
	#[error("Request was cancelled.")]
	Cancelled,

	/// Credential store failure outside of a refresh.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns the taxonomy member this error belongs to.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Duplicate { .. } => ErrorKind::Duplicate,
			Self::AuthExpired { .. } => ErrorKind::AuthExpired,
			Self::Validation { .. } => ErrorKind::Validation,
			Self::Permission { .. } => ErrorKind::Permission,
			Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Server { .. } => ErrorKind::Server,
			Self::Network(_) => ErrorKind::Network,
			Self::RefreshFailed { .. } => ErrorKind::RefreshFailed,
			Self::Cancelled => ErrorKind::Cancelled,
			Self::Unknown { .. } | Self::Decode { .. } | Self::Credential(_) | Self::Config(_) =>
				ErrorKind::Unknown,
		}
	}

	/// HTTP status carried by the error, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthExpired { .. } => Some(401),
			Self::Validation { .. } => Some(400),
			Self::Permission { .. } => Some(403),
			Self::NotFound { .. } => Some(404),
			Self::Server { status, .. }
			| Self::Unknown { status, .. }
			| Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Server-supplied message, when the response body carried one.
	pub fn server_message(&self) -> Option<&str> {
		match self {
			Self::AuthExpired { message }
			| Self::Validation { message }
			| Self::Permission { message }
			| Self::NotFound { message }
			| Self::Server { message, .. }
			| Self::Unknown { message, .. } => message.as_deref(),
			_ => None,
		}
	}

	/// Text shown to the user when this error is surfaced.
	pub fn user_message(&self) -> String {
		classify::user_message(self)
	}

	/// Whether the error is eligible for a user-visible message.
	///
	/// Duplicates and cancellations are local signals and never surface.
	pub fn is_surfaced(&self) -> bool {
		!matches!(self.kind(), ErrorKind::Duplicate | ErrorKind::Cancelled)
	}
}

/// Closed taxonomy of request outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Identical request already in flight.
	Duplicate,
	/// HTTP `401`.
	AuthExpired,
	/// HTTP `400`.
	Validation,
	/// HTTP `403`.
	Permission,
	/// HTTP `404`.
	NotFound,
	/// HTTP `5xx`.
	Server,
	/// No response received or timed out.
	Network,
	/// Credential refresh failed.
	RefreshFailed,
	/// Request cancelled by the caller.
	Cancelled,
	/// Anything else.
	Unknown,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Duplicate => "duplicate",
			Self::AuthExpired => "auth_expired",
			Self::Validation => "validation",
			Self::Permission => "permission",
			Self::NotFound => "not_found",
			Self::Server => "server",
			Self::Network => "network",
			Self::RefreshFailed => "refresh_failed",
			Self::Cancelled => "cancelled",
			Self::Unknown => "unknown",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while building clients or requests.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A request URL could not be resolved.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	InvalidBody(#[from] serde_json::Error),
	/// Transport timeout must be positive.
	#[error("Transport timeout must be positive.")]
	NonPositiveTimeout,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures where no HTTP response was received.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred before a response was received.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded its transport timeout.
	#[error("Request timed out before a response was received.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred before a response was received.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

fn detail(message: &Option<String>) -> String {
	message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}
