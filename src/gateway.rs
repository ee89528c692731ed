//! Authenticated calls against the delivery API.
//!
//! [`ApiGateway::deliver`] makes exactly one request per item. The bearer credential is
//! obtained from the shared [`TokenCache`] right before the call, which refreshes it first
//! when it is missing or about to expire; there is no retry after the call. The only
//! accepted answer is [`DeliveryTarget::accepted_status`]; everything else is returned to
//! the caller with its status and body.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use reqwest::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::TokenCache,
	error::{ConfigError, TransportError},
	http::{self, ReqwestHttpClient},
	obs::{self, Outcome, Stage, StageField, StageSpan},
	queue::WorkItem,
};

/// Where and how items are delivered.
#[derive(Clone, Debug)]
pub struct DeliveryTarget {
	/// Base URL of the delivery API.
	pub base: Url,
	/// Absolute path of the delivery endpoint.
	pub path: String,
	/// Query parameter that carries the item.
	pub query_param: String,
	/// Status code the endpoint answers with when it accepted the item.
	pub accepted_status: StatusCode,
}
impl DeliveryTarget {
	/// Default delivery path: append to the playback queue.
	pub const DEFAULT_PATH: &'static str = "/v1/me/player/add-to-queue";
	/// Default query parameter carrying the item.
	pub const DEFAULT_QUERY_PARAM: &'static str = "uri";

	/// Creates a target rooted at `base` with the default path, parameter, and `204 No Content`
	/// as the accepted status.
	pub fn new(base: Url) -> Self {
		Self {
			base,
			path: Self::DEFAULT_PATH.into(),
			query_param: Self::DEFAULT_QUERY_PARAM.into(),
			accepted_status: StatusCode::NO_CONTENT,
		}
	}

	/// Overrides the endpoint path.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Overrides the query parameter that carries the item.
	pub fn with_query_param(mut self, name: impl Into<String>) -> Self {
		self.query_param = name.into();

		self
	}

	/// Overrides the accepted status.
	pub fn with_accepted_status(mut self, status: StatusCode) -> Self {
		self.accepted_status = status;

		self
	}

	/// Builds the request URL for `item`, percent-encoding it into the query string.
	pub fn url_for(&self, item: &str) -> Result<Url, ConfigError> {
		let mut url = self.base.join(&self.path).map_err(|source| ConfigError::InvalidEndpoint {
			endpoint: format!("{}{}", self.base, self.path),
			source,
		})?;

		url.query_pairs_mut().append_pair(&self.query_param, item);

		Ok(url)
	}
}

/// Thread-safe counters of delivery outcomes.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
	delivered: AtomicU64,
	rejected: AtomicU64,
	unreachable: AtomicU64,
	unauthenticated: AtomicU64,
}
impl DeliveryMetrics {
	/// Items accepted by the delivery endpoint.
	pub fn delivered(&self) -> u64 {
		self.delivered.load(Ordering::Relaxed)
	}

	/// Items answered with a non-accepted status.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Items whose delivery call failed at the network level.
	pub fn unreachable(&self) -> u64 {
		self.unreachable.load(Ordering::Relaxed)
	}

	/// Items dropped because no credential could be obtained.
	pub fn unauthenticated(&self) -> u64 {
		self.unauthenticated.load(Ordering::Relaxed)
	}

	fn record(&self, result: &Result<()>) {
		let counter = match result {
			Ok(()) => &self.delivered,
			Err(Error::DeliveryRejected { .. }) => &self.rejected,
			Err(Error::CredentialRefreshFailed(_)) => &self.unauthenticated,
			Err(_) => &self.unreachable,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

/// Issues authenticated delivery calls.
#[derive(Debug)]
pub struct ApiGateway {
	http_client: ReqwestHttpClient,
	tokens: Arc<TokenCache>,
	target: DeliveryTarget,
	metrics: DeliveryMetrics,
}
impl ApiGateway {
	/// Creates a gateway that authenticates through `tokens`.
	pub fn new(
		http_client: ReqwestHttpClient,
		tokens: Arc<TokenCache>,
		target: DeliveryTarget,
	) -> Self {
		Self { http_client, tokens, target, metrics: Default::default() }
	}

	/// Delivery endpoint description.
	pub fn target(&self) -> &DeliveryTarget {
		&self.target
	}

	/// Credential cache used for every call.
	pub fn tokens(&self) -> &Arc<TokenCache> {
		&self.tokens
	}

	/// Counters of delivery outcomes recorded by [`relay`](Self::relay).
	pub fn metrics(&self) -> &DeliveryMetrics {
		&self.metrics
	}

	/// Delivers one item.
	///
	/// # Errors
	///
	/// - [`Error::CredentialRefreshFailed`] when no credential could be obtained; the delivery
	///   endpoint is not contacted.
	/// - [`Error::DeliveryRejected`] when the endpoint answers with any status other than the
	///   accepted one.
	/// - [`Error::DeliveryUnreachable`] on timeouts and connection failures.
	pub async fn deliver(&self, item: &str) -> Result<()> {
		let span = StageSpan::new(Stage::Deliver, "deliver").with_field(StageField::Item, item);

		obs::record_stage_outcome(Stage::Deliver, Outcome::Attempt);

		let result = span.instrument(self.send(item)).await;

		obs::record_stage_outcome(Stage::Deliver, Outcome::of(&result));

		result
	}

	/// Delivers `item` and reports the outcome through logs and [`DeliveryMetrics`] instead of
	/// returning it, so a consumer loop can move on to the next item.
	pub async fn relay(&self, item: WorkItem) {
		let result = self.deliver(item.as_str()).await;

		self.metrics.record(&result);

		match &result {
			#[cfg(feature = "tracing")]
			Ok(()) => tracing::info!(item = %item, "Enqueued item for playback."),
			#[cfg(feature = "tracing")]
			Err(e) => tracing::error!(item = %item, error = %e, "Failed to deliver item."),
			#[cfg(not(feature = "tracing"))]
			_ => (),
		}
	}

	async fn send(&self, item: &str) -> Result<()> {
		let credential = self.tokens.ensure_now().await?;
		let url = self.target.url_for(item)?;
		let response = self
			.http_client
			.post(url)
			.header(AUTHORIZATION, credential.authorization_header())
			.send()
			.await
			.map_err(|e| Error::DeliveryUnreachable { source: TransportError::from(e) })?;
		let snapshot = http::read_response(response)
			.await
			.map_err(|source| Error::DeliveryUnreachable { source })?;

		if snapshot.status == self.target.accepted_status {
			Ok(())
		} else {
			Err(Error::DeliveryRejected {
				status: snapshot.status.as_u16(),
				body: snapshot.body_text(),
			})
		}
	}
}
