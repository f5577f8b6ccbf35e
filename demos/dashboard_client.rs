//! Demonstrates the guarded client against a mock dashboard backend.
//!
//! 1. Seed a [`MemoryCredentialStore`] with an expired access token and a refresh token, backed
//!    by a [`RefreshEndpoint`].
//! 2. Fire the same indicator request twice in one tick; the second is rejected as a duplicate
//!    while the first recovers from `401` through a single refresh.
//! 3. Load every indicator with the refreshed credential.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use url::Url;
// self
use guarded_http::{
	client::GuardedClient,
	config::{ClientConfig, RequestConfig},
	credential::{MemoryCredentialStore, RefreshEndpoint},
	envelope::ApiEnvelope,
	error::Error,
	fingerprint::RequestFingerprint,
	notify::Notifier,
};

const INDICATORS: [&str; 3] = ["/api/getArtConn", "/api/getOrderSolve", "/api/getMoveOrder"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndicatorPoint {
	p_day_id: String,
	prev_day: f64,
}

struct ConsoleNotifier;
impl Notifier for ConsoleNotifier {
	fn show_loading(&self, request: &RequestFingerprint) {
		println!("loading  {} {}", request.method(), request.url());
	}

	fn show_error(&self, error: &Error, message: &str) {
		println!("error    {message} ({})", error.kind());
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	for path in INDICATORS {
		server
			.mock_async(|when, then| {
				when.method(GET).path(path).header("authorization", "Bearer expired");
				then.status(401)
					.header("content-type", "application/json")
					.body("{\"message\":\"token expired\"}");
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path(path).header("authorization", "Bearer demo-access");
				then.status(200).header("content-type", "application/json").body(
					"{\"code\":200,\"data\":[{\"pDayId\":\"20250301\",\"prevDay\":97.5}]}",
				);
			})
			.await;
	}

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.body("{\"access_token\":\"demo-access\"}");
		})
		.await;
	let store = MemoryCredentialStore::with_refresher(RefreshEndpoint::new(Url::parse(
		&server.url("/auth/refresh"),
	)?));

	store.seed_access_token("expired");
	store.seed_refresh_token("demo-refresh");

	let config = ClientConfig::new().with_base_url(&server.base_url())?;
	let client =
		GuardedClient::new(config, Arc::new(store))?.with_notifier(Arc::new(ConsoleNotifier));
	let first =
		client.get::<ApiEnvelope<Vec<IndicatorPoint>>>(INDICATORS[0], RequestConfig::default());
	let second =
		client.get::<ApiEnvelope<Vec<IndicatorPoint>>>(INDICATORS[0], RequestConfig::default());
	let (first, second) = futures::join!(first, second);

	println!("first:  {:?}", first.map(ApiEnvelope::into_data));
	println!("second: {:?}", second.map_err(|e| e.kind()));

	let results = futures::future::join_all(INDICATORS.iter().map(|path| {
		client.get::<ApiEnvelope<Vec<IndicatorPoint>>>(path, RequestConfig::default().quiet())
	}))
	.await;

	for (path, result) in INDICATORS.iter().zip(results) {
		let points = result?.into_data();

		println!(
			"{path}: {} point(s), first day {:?}",
			points.len(),
			points.first().map(|p| (&p.p_day_id, p.prev_day))
		);
	}

	refresh_mock.assert_calls_async(1).await;

	println!("All indicators loaded with a single credential refresh.");

	Ok(())
}
