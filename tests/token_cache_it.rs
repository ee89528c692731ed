// crates.io
use httpmock::prelude::*;
use time::macros::datetime;
// self
use sparty::{
	_preludet::*,
	auth::{Credential, TokenCache},
	error::RefreshError,
};

const TOKEN_BODY: &str = "{\"access_token\":\"secret\",\"expires_in\":3600}";

async fn mock_token_endpoint<'a>(
	server: &'a MockServer,
	body: &'static str,
) -> httpmock::Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

fn seeded(server: &MockServer, expires_at: OffsetDateTime) -> TokenCache {
	let credential =
		Credential::new("stale", expires_at).expect("Seed credential should build successfully.");

	build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.")
		.with_credential(credential)
}

#[tokio::test]
async fn first_lookup_refreshes_and_later_lookups_reuse() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, TOKEN_BODY).await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let first = cache.ensure(t0).await.expect("Initial refresh should succeed.");

	assert_eq!(first.bearer().expose(), "secret");
	assert_eq!(first.expires_at, datetime!(2000-01-01 01:00:00 UTC));

	let second =
		cache.ensure(t0 + Duration::seconds(10)).await.expect("Cached credential should be reused.");

	assert_eq!(second, first);

	mock.assert_calls_async(1).await;

	assert_eq!(cache.metrics().lookups(), 2);
	assert_eq!(cache.metrics().exchanges(), 1);
}

#[tokio::test]
async fn refresh_sends_basic_auth_and_grant_form() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/token")
				.header("authorization", "Basic Zm9vOmJhcg==")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", TEST_REFRESH_TOKEN);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");

	cache.ensure_now().await.expect("Refresh with form-encoded grant should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn expired_credential_is_refreshed() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, TOKEN_BODY).await;
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let cache = seeded(&server, t0 - Duration::seconds(1));
	let credential = cache.ensure(t0).await.expect("Expired credential should be replaced.");

	assert_eq!(credential.bearer().expose(), "secret");
	assert_eq!(credential.expires_at, t0 + Duration::hours(1));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn credential_inside_threshold_is_refreshed() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, TOKEN_BODY).await;
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let cache = seeded(&server, t0 + Duration::seconds(4));
	let credential =
		cache.ensure(t0).await.expect("Credential inside the safety margin should be replaced.");

	assert_eq!(credential.bearer().expose(), "secret");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn credential_exactly_at_threshold_is_reused() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, TOKEN_BODY).await;
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let cache = seeded(&server, t0 + TokenCache::DEFAULT_THRESHOLD);
	let credential = cache.ensure(t0).await.expect("Credential at the margin should be reused.");

	assert_eq!(credential.bearer().expose(), "stale");

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn malformed_json_fails_refresh_and_keeps_slot() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, "{\"access_token\":").await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let err = cache.ensure_now().await.expect_err("Malformed token response should be rejected.");

	assert!(matches!(err.refresh_error(), Some(RefreshError::Parse { status: 200, .. })));
	assert!(cache.current().is_none());
	assert_eq!(cache.metrics().failures(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_positive_lifetime_is_rejected() {
	let server = MockServer::start_async().await;
	let _mock =
		mock_token_endpoint(&server, "{\"access_token\":\"secret\",\"expires_in\":0}").await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let err = cache.ensure_now().await.expect_err("Zero lifetime should be rejected.");

	assert!(matches!(err.refresh_error(), Some(RefreshError::NonPositiveExpiresIn)));
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(400).body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let err = cache.ensure_now().await.expect_err("Error status should fail the refresh.");

	match err.refresh_error() {
		Some(RefreshError::Status { status, body }) => {
			assert_eq!(*status, 400);
			assert!(body.contains("invalid_grant"));
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn concurrent_lookups_share_one_refresh() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, TOKEN_BODY).await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let (first, second, third) = tokio::join!(cache.ensure(t0), cache.ensure(t0), cache.ensure(t0));
	let first = first.expect("First concurrent lookup should succeed.");

	assert_eq!(second.expect("Second concurrent lookup should succeed."), first);
	assert_eq!(third.expect("Third concurrent lookup should succeed."), first);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_lookups_share_one_failure() {
	let server = MockServer::start_async().await;
	let mock = mock_token_endpoint(&server, "not json").await;
	let cache = build_test_token_cache(&server.base_url())
		.expect("Test token cache should build.");
	let t0 = datetime!(2000-01-01 00:00:00 UTC);
	let (first, second, third) = tokio::join!(cache.ensure(t0), cache.ensure(t0), cache.ensure(t0));

	for result in [first, second, third] {
		let err = result.expect_err("Every overlapping lookup should observe the failure.");

		assert!(matches!(err.refresh_error(), Some(RefreshError::Parse { .. })));
	}

	mock.assert_calls_async(1).await;

	assert_eq!(cache.metrics().exchanges(), 1);
	assert_eq!(cache.metrics().failures(), 1);

	// A lookup that starts after the failure settled tries again.
	cache.ensure(t0).await.expect_err("Endpoint still answers with malformed JSON.");

	mock.assert_calls_async(2).await;
}
