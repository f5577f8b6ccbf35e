#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::{env, path::PathBuf, process};
// crates.io
use httpmock::prelude::*;
// self
use guarded_http::{
	_preludet::*,
	client::GuardedClient,
	config::{ClientConfig, RequestConfig},
	credential::{
		Credential, CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore,
		RefreshEndpoint,
	},
	envelope::ApiEnvelope,
	error::TransportError,
};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ArtConn {
	p_day_id: String,
	prev_day: f64,
}

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"guarded_http_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

fn remove(path: &PathBuf) {
	if let Err(e) = std::fs::remove_file(path) {
		panic!("Failed to remove temporary credential snapshot {}: {e}", path.display())
	}
}

fn refresh_endpoint(server: &MockServer) -> RefreshEndpoint {
	RefreshEndpoint::new(
		Url::parse(&server.url("/auth/refresh")).expect("Mock refresh endpoint should parse."),
	)
}

fn file_store(server: &MockServer, path: &PathBuf) -> Arc<FileCredentialStore> {
	let store = FileCredentialStore::open(path, refresh_endpoint(server))
		.expect("File store should open.");

	store.set_credential(Credential::new("expired")).expect("Seeding the credential should work.");
	store.set_refresh_token("r-1").expect("Seeding the refresh token should work.");

	Arc::new(store)
}

async fn expired_gate(server: &MockServer, path: &str) {
	server
		.mock_async(|when, then| {
			when.method(GET).path(path).header("authorization", "Bearer expired");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"message":"token expired"}"#);
		})
		.await;
}

#[tokio::test]
async fn expired_credential_refreshes_through_endpoint_and_persists() {
	let server = MockServer::start_async().await;
	let path = temp_path("refresh");
	let store = file_store(&server, &path);

	expired_gate(&server, "/api/getArtConn").await;

	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/getArtConn").header("authorization", "Bearer abc123");
			then.status(200).header("content-type", "application/json").body(
				r#"{"code":200,"message":"ok","data":[{"pDayId":"20250301","prevDay":97.5}]}"#,
			);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.json_body(serde_json::json!({ "refresh_token": "r-1" }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"abc123","refresh_token":"r-2"}"#);
		})
		.await;
	let client = reqwest_test_client(&server.base_url(), store.clone());
	let envelope: ApiEnvelope<Vec<ArtConn>> = client
		.get("/api/getArtConn", RequestConfig::default())
		.await
		.expect("Request should succeed after refreshing through the endpoint.");

	assert_eq!(envelope.message.as_deref(), Some("ok"));
	assert_eq!(
		envelope.into_data(),
		vec![ArtConn { p_day_id: "20250301".into(), prev_day: 97.5 }]
	);

	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;

	let reopened = FileCredentialStore::open(&path, refresh_endpoint(&server))
		.expect("Persisted store should reopen.")
		.snapshot();

	assert_eq!(reopened.access_token.as_ref().map(Credential::expose), Some("abc123"));
	assert_eq!(reopened.refresh_token.as_ref().map(Credential::expose), Some("r-2"));
	assert!(reopened.updated_at.is_some());

	remove(&path);
}

#[tokio::test]
async fn five_endpoints_trigger_one_refresh_over_http() {
	let server = MockServer::start_async().await;
	let path = temp_path("single_flight");
	let store = file_store(&server, &path);
	let endpoints = ["/api/a", "/api/b", "/api/c", "/api/d", "/api/e"];
	let mut accepted = Vec::new();

	for endpoint in endpoints {
		expired_gate(&server, endpoint).await;
		accepted.push(
			server
				.mock_async(|when, then| {
					when.method(GET).path(endpoint).header("authorization", "Bearer abc123");
					then.status(200)
						.header("content-type", "application/json")
						.body(r#"{"code":200,"data":[]}"#);
				})
				.await,
		);
	}

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(150))
				.body(r#"{"access_token":"abc123"}"#);
		})
		.await;
	let client = reqwest_test_client(&server.base_url(), store);
	let results = futures::future::join_all(
		endpoints.iter().map(|e| client.get::<ApiEnvelope<Vec<u32>>>(e, Default::default())),
	)
	.await;

	assert!(results.iter().all(Result::is_ok), "Every endpoint should complete: {results:?}.");

	refresh.assert_calls_async(1).await;

	for mock in accepted {
		mock.assert_calls_async(1).await;
	}

	remove(&path);
}

#[tokio::test]
async fn rejected_refresh_clears_credential_and_fails_request() {
	let server = MockServer::start_async().await;
	let path = temp_path("rejected");
	let store = file_store(&server, &path);

	expired_gate(&server, "/api/getOrderSolve").await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401);
		})
		.await;
	let client = reqwest_test_client(&server.base_url(), store.clone());
	let err = client
		.post::<_, serde_json::Value>(
			"/api/getOrderSolve",
			&serde_json::json!({ "dayId": "20250301" }),
			RequestConfig::default(),
		)
		.await
		.expect_err("A rejected refresh is fatal.");

	match err {
		Error::RefreshFailed { source } =>
			assert_eq!(*source, CredentialError::Rejected { status: 401 }),
		other => panic!("Unexpected error: {other:?}."),
	}

	refresh.assert_calls_async(1).await;

	assert!(store.credential().expect("File store reads should succeed.").is_none());

	remove(&path);
}

#[tokio::test]
async fn slow_response_times_out_as_network_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/getBandOrder");
			then.status(200).delay(std::time::Duration::from_secs(2)).body("{}");
		})
		.await;
	let store = Arc::new(MemoryCredentialStore::default());
	let config = ClientConfig::new()
		.with_base_url(&server.base_url())
		.expect("Mock server URL should parse.")
		.with_timeout(Duration::milliseconds(200));
	let client = GuardedClient::new(config, store).expect("Reqwest client should build.");
	let err = client
		.get::<serde_json::Value>("/api/getBandOrder", RequestConfig::default())
		.await
		.expect_err("The response arrives after the timeout.");

	assert!(matches!(err, Error::Network(TransportError::Timeout { .. })), "{err:?}");
	assert_eq!(err.kind(), ErrorKind::Network);
	assert!(client.tracker().is_empty());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn status_codes_map_onto_taxonomy() {
	let server = MockServer::start_async().await;
	let table = [
		("/api/400", 400, ErrorKind::Validation),
		("/api/403", 403, ErrorKind::Permission),
		("/api/404", 404, ErrorKind::NotFound),
		("/api/502", 502, ErrorKind::Server),
		("/api/409", 409, ErrorKind::Unknown),
	];

	for (path, status, _) in table {
		server
			.mock_async(|when, then| {
				when.method(GET).path(path);
				then.status(status);
			})
			.await;
	}

	let client =
		reqwest_test_client(&server.base_url(), Arc::new(MemoryCredentialStore::default()));

	for (path, status, kind) in table {
		let err = client
			.get::<serde_json::Value>(path, RequestConfig::default().quiet())
			.await
			.expect_err("Non-2xx statuses are failures.");

		assert_eq!(err.kind(), kind, "{path}");
		assert_eq!(err.status(), Some(status));
	}
}
