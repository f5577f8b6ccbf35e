//! Client-wide and per-call configuration.

// self
use crate::{_prelude::*, error::ConfigError};

/// Settings shared by every request issued through one client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Base URL joined with relative request paths.
	pub base_url: Option<Url>,
	/// Transport timeout applied to each dispatch.
	pub timeout: Duration,
	/// Headers attached to every request (lower-case names).
	pub default_headers: BTreeMap<String, String>,
}
impl ClientConfig {
	/// Default transport timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

	/// Creates a config with no base URL, a 10 second timeout, and a JSON content type.
	pub fn new() -> Self {
		Self {
			base_url: None,
			timeout: Self::DEFAULT_TIMEOUT,
			default_headers: BTreeMap::from([(
				"content-type".to_owned(),
				"application/json".to_owned(),
			)]),
		}
	}

	/// Sets the base URL. An empty string clears it.
	pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
		if base_url.is_empty() {
			self.base_url = None;

			return Ok(self);
		}

		// A trailing slash keeps the last path segment when joining relative paths.
		let normalized =
			if base_url.ends_with('/') { base_url.to_owned() } else { format!("{base_url}/") };
		let url = Url::parse(&normalized)
			.map_err(|source| ConfigError::InvalidUrl { url: base_url.to_owned(), source })?;

		self.base_url = Some(url);

		Ok(self)
	}

	/// Overrides the transport timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Adds or replaces a default header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.default_headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Resolves `url` against the base URL. Absolute URLs are used as-is.
	pub fn resolve(&self, url: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidUrl { url: url.to_owned(), source };

		match Url::parse(url) {
			Ok(absolute) => Ok(absolute),
			Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
				Some(base) => base.join(url.trim_start_matches('/')).map_err(invalid),
				None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
			},
			Err(e) => Err(invalid(e)),
		}
	}

	pub(crate) fn transport_timeout(&self) -> Result<std::time::Duration, ConfigError> {
		if !self.timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout);
		}

		std::time::Duration::try_from(self.timeout).map_err(|_| ConfigError::NonPositiveTimeout)
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self::new()
	}
}

/// Per-call options recognized by the interceptor pipeline.
///
/// Every dispatch works on its own copy, so headers attached by the pipeline never leak into
/// other requests sharing the same value.
#[derive(Clone, Debug)]
pub struct RequestConfig {
	/// Disables duplicate detection for this call.
	pub skip_duplicate_check: bool,
	/// Toggles the loading-indicator side effect.
	pub show_loading: bool,
	/// Toggles the user-visible error message on failure.
	pub show_error_message: bool,
	/// Query pairs appended to the URL and folded into the fingerprint.
	pub query: Vec<(String, String)>,
	/// Extra headers for this call (lower-case names).
	pub headers: BTreeMap<String, String>,
}
impl RequestConfig {
	/// Disables duplicate detection.
	pub fn skip_duplicate_check(mut self) -> Self {
		self.skip_duplicate_check = true;

		self
	}

	/// Overrides the duplicate-check flag.
	pub fn with_skip_duplicate_check(mut self, skip: bool) -> Self {
		self.skip_duplicate_check = skip;

		self
	}

	/// Overrides the loading-indicator flag.
	pub fn with_show_loading(mut self, show: bool) -> Self {
		self.show_loading = show;

		self
	}

	/// Overrides the error-message flag.
	pub fn with_show_error_message(mut self, show: bool) -> Self {
		self.show_error_message = show;

		self
	}

	/// Suppresses both the loading indicator and error messages.
	pub fn quiet(self) -> Self {
		self.with_show_loading(false).with_show_error_message(false)
	}

	/// Appends a query pair.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Adds or replaces a header for this call.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}
}
impl Default for RequestConfig {
	fn default() -> Self {
		Self {
			skip_duplicate_check: false,
			show_loading: true,
			show_error_message: true,
			query: Vec::new(),
			headers: BTreeMap::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_options() {
		let client = ClientConfig::default();
		let request = RequestConfig::default();

		assert_eq!(client.timeout, Duration::seconds(10));
		assert_eq!(
			client.default_headers.get("content-type").map(String::as_str),
			Some("application/json")
		);
		assert!(!request.skip_duplicate_check);
		assert!(request.show_loading);
		assert!(request.show_error_message);
	}

	#[test]
	fn relative_paths_join_base_including_its_path() {
		let config = ClientConfig::new()
			.with_base_url("https://metrics.example.com/gateway")
			.expect("Base URL should parse.");

		assert_eq!(
			config.resolve("/api/getArtConn").expect("Path should resolve.").as_str(),
			"https://metrics.example.com/gateway/api/getArtConn"
		);
		assert_eq!(
			config.resolve("https://other.example.com/x").expect("Absolute URL should pass.").as_str(),
			"https://other.example.com/x"
		);
	}

	#[test]
	fn relative_path_without_base_is_rejected() {
		let err = ClientConfig::new().resolve("/api/getArtConn").expect_err("No base is set.");

		assert!(matches!(err, ConfigError::InvalidUrl { .. }));
	}

	#[test]
	fn non_positive_timeout_is_rejected() {
		let config = ClientConfig::new().with_timeout(Duration::ZERO);

		assert!(matches!(config.transport_timeout(), Err(ConfigError::NonPositiveTimeout)));
		assert_eq!(
			ClientConfig::new().transport_timeout().expect("Default timeout is valid."),
			std::time::Duration::from_secs(10)
		);
	}

	#[test]
	fn quiet_disables_both_side_effects() {
		let config = RequestConfig::default().quiet().skip_duplicate_check();

		assert!(!config.show_loading && !config.show_error_message && config.skip_duplicate_check);
	}
}
