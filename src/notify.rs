//! User-facing side effects (loading indicator, error messages) emitted by the pipeline.
//!
//! The pipeline only calls into a [`Notifier`]; rendering belongs to the embedding UI.

// self
use crate::{_prelude::*, fingerprint::RequestFingerprint};

/// Collaborator receiving loading and error signals for each request.
///
/// All methods default to no-ops so implementors override only what they render.
pub trait Notifier
where
	Self: 'static + Send + Sync,
{
	/// A request entered the network stage with `show_loading` enabled.
	fn show_loading(&self, request: &RequestFingerprint) {
		let _ = request;
	}

	/// The request shown by [`show_loading`](Self::show_loading) left the network stage.
	fn hide_loading(&self, request: &RequestFingerprint) {
		let _ = request;
	}

	/// A classified failure should be shown to the user.
	fn show_error(&self, error: &Error, message: &str) {
		let _ = (error, message);
	}
}

/// Notifier that renders nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNotifier;
impl Notifier for SilentNotifier {}

/// Notifier that forwards every signal to `tracing` events.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;
#[cfg(feature = "tracing")]
impl Notifier for TracingNotifier {
	fn show_loading(&self, request: &RequestFingerprint) {
		tracing::debug!(method = %request.method(), url = request.url(), "Request in progress.");
	}

	fn hide_loading(&self, request: &RequestFingerprint) {
		tracing::debug!(method = %request.method(), url = request.url(), "Request settled.");
	}

	fn show_error(&self, error: &Error, message: &str) {
		tracing::warn!(kind = %error.kind(), status = ?error.status(), "{message}");
	}
}

/// Shows the loading indicator on creation and hides it on drop, so every exit path (including
/// cancellation) clears it.
pub(crate) struct LoadingGuard<'a> {
	notifier: &'a dyn Notifier,
	request: &'a RequestFingerprint,
	shown: bool,
}
impl<'a> LoadingGuard<'a> {
	pub(crate) fn show(
		notifier: &'a dyn Notifier,
		request: &'a RequestFingerprint,
		enabled: bool,
	) -> Self {
		if enabled {
			notifier.show_loading(request);
		}

		Self { notifier, request, shown: enabled }
	}
}
impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		if self.shown {
			self.notifier.hide_loading(self.request);
		}
	}
}
