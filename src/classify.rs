//! Pure mapping from transport and HTTP outcomes onto the [`ErrorKind`] taxonomy.
//!
//! Nothing here retries or performs I/O. Retry policy for `401` lives in
//! [`RefreshCoordinator`](crate::refresh::RefreshCoordinator); every other classification is
//! terminal.

// self
use crate::{_prelude::*, error::TransportError, http::InboundResponse};

/// Observed outcome of a single transport call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
	/// A response with the given status was received.
	Status(u16),
	/// The transport gave up before any response arrived (including timeouts).
	NoResponse,
}

/// Maps an outcome onto its taxonomy member. Successful statuses have no error kind.
pub fn classify(outcome: Outcome) -> Option<ErrorKind> {
	match outcome {
		Outcome::Status(200..=299) => None,
		Outcome::Status(400) => Some(ErrorKind::Validation),
		Outcome::Status(401) => Some(ErrorKind::AuthExpired),
		Outcome::Status(403) => Some(ErrorKind::Permission),
		Outcome::Status(404) => Some(ErrorKind::NotFound),
		Outcome::Status(500..=599) => Some(ErrorKind::Server),
		Outcome::Status(_) => Some(ErrorKind::Unknown),
		Outcome::NoResponse => Some(ErrorKind::Network),
	}
}

/// Classifies a transport reply, passing successful responses through untouched.
pub fn check_reply(reply: Result<InboundResponse, TransportError>) -> Result<InboundResponse> {
	let outcome = match &reply {
		Ok(response) => Outcome::Status(response.status),
		Err(_) => Outcome::NoResponse,
	};
	let Some(kind) = classify(outcome) else {
		return reply.map_err(Error::Network);
	};

	Err(match reply {
		Ok(response) => error_of_kind(kind, &response),
		Err(source) => Error::Network(source),
	})
}

/// Builds the error for a non-success response, or `None` when the status is a success.
pub fn error_for_response(response: &InboundResponse) -> Option<Error> {
	classify(Outcome::Status(response.status)).map(|kind| error_of_kind(kind, response))
}

fn error_of_kind(kind: ErrorKind, response: &InboundResponse) -> Error {
	let message = server_message(&response.body);
	let status = response.status;

	match kind {
		ErrorKind::Validation => Error::Validation { message },
		ErrorKind::AuthExpired => Error::AuthExpired { message },
		ErrorKind::Permission => Error::Permission { message },
		ErrorKind::NotFound => Error::NotFound { message },
		ErrorKind::Server => Error::Server { status, message },
		_ => Error::Unknown { status, message },
	}
}

/// Extracts the `message` string field from a JSON error body, if present.
pub fn server_message(body: &[u8]) -> Option<String> {
	#[derive(Deserialize)]
	struct ErrorBody {
		message: Option<String>,
	}

	serde_json::from_slice::<ErrorBody>(body)
		.ok()
		.and_then(|b| b.message)
		.filter(|m| !m.trim().is_empty())
}

/// Text shown to the user for a surfaced error.
///
/// Validation and unmapped statuses prefer the server's own `message`; every other kind uses a
/// fixed sentence so backend internals never leak into the UI.
pub fn user_message(err: &Error) -> String {
	match err {
		Error::Validation { message } =>
			message.clone().unwrap_or_else(|| "Invalid request parameters".into()),
		Error::AuthExpired { .. } | Error::RefreshFailed { .. } =>
			"Unauthorized, please sign in again".into(),
		Error::Permission { .. } => "Permission denied".into(),
		Error::NotFound { .. } => "Requested resource does not exist".into(),
		Error::Server { status: 500, .. } => "Internal server error".into(),
		Error::Server { status, message } | Error::Unknown { status, message } =>
			message.clone().unwrap_or_else(|| format!("Request failed ({status})")),
		Error::Network(_) => "Network connection failed, please check your network settings".into(),
		Error::Duplicate { .. } => "Duplicate request was blocked".into(),
		Error::Cancelled => "Request was cancelled".into(),
		Error::Decode { .. } | Error::Credential(_) | Error::Config(_) =>
			"Unknown request error".into(),
	}
}
