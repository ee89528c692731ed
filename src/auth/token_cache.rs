//! Bearer credential cache with single-flight refreshes.
//!
//! [`TokenCache::ensure`] hands out the cached [`Credential`] while it stays valid for at
//! least the safety threshold, and otherwise performs one refresh exchange against the
//! authorization endpoint. The exchange is a form-encoded `POST` authenticated with HTTP
//! Basic credentials built from the client pair; the JSON answer must carry
//! `access_token` and a relative `expires_in` (seconds).
//!
//! The credential slot is replaced as a whole, so readers observe either the previous or
//! the new credential. Refreshes are serialized behind an async guard. A caller that waited
//! on the guard while an exchange completed takes that exchange's outcome: the new
//! credential if it is fresh enough, or the same failure, instead of issuing its own.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::{Credential, Grant, Secret},
	error::{RefreshError, TransportError},
	http::{self, ReqwestHttpClient},
	obs::{self, Outcome, Stage, StageField, StageSpan},
};

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	expires_in: i64,
}

/// Caches one bearer credential and refreshes it on demand.
pub struct TokenCache {
	http_client: ReqwestHttpClient,
	endpoint: Url,
	basic_auth: Secret,
	grant: Grant,
	threshold: Duration,
	slot: RwLock<Option<Credential>>,
	refresh_guard: AsyncMutex<()>,
	last_exchange: Mutex<ExchangeRecord>,
	metrics: RefreshMetrics,
}
impl TokenCache {
	/// Margin before expiry at which a credential is refreshed proactively.
	pub const DEFAULT_THRESHOLD: Duration = Duration::seconds(5);

	/// Creates an empty cache that refreshes against `endpoint`.
	pub fn new(
		http_client: ReqwestHttpClient,
		endpoint: Url,
		client_id: &str,
		client_secret: &str,
		grant: Grant,
	) -> Self {
		let basic_auth = Secret::new(format!(
			"Basic {}",
			STANDARD.encode(format!("{client_id}:{client_secret}"))
		));

		Self {
			http_client,
			endpoint,
			basic_auth,
			grant,
			threshold: Self::DEFAULT_THRESHOLD,
			slot: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			last_exchange: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Overrides the safety threshold (defaults to 5 seconds). Negative values are clamped
	/// to zero.
	pub fn with_threshold(mut self, threshold: Duration) -> Self {
		self.threshold = if threshold.is_negative() { Duration::ZERO } else { threshold };

		self
	}

	/// Seeds the cache with an already issued credential.
	pub fn with_credential(self, credential: Credential) -> Self {
		*self.slot.write() = Some(credential);

		self
	}

	/// Authorization endpoint used for refreshes.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Counters describing cache activity.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns the cached credential, fresh or not.
	pub fn current(&self) -> Option<Credential> {
		self.slot.read().clone()
	}

	/// Drops the cached credential so the next [`ensure`](Self::ensure) refreshes.
	pub fn invalidate(&self) {
		self.slot.write().take();
	}

	/// Returns a credential valid for at least the safety threshold past `now`, refreshing it
	/// first when the cached one is missing or about to expire.
	pub async fn ensure(&self, now: OffsetDateTime) -> Result<Credential> {
		self.metrics.record_lookup();

		if let Some(credential) = self.fresh_at(now) {
			return Ok(credential);
		}

		let seen = self.last_exchange.lock().generation;
		let _singleflight = self.refresh_guard.lock().await;

		// Another caller may have refreshed while we waited on the guard.
		if let Some(credential) = self.fresh_at(now) {
			return Ok(credential);
		}
		{
			let last = self.last_exchange.lock();

			// An exchange finished while we waited and failed; share its outcome.
			if let Some(failure) = last.failure.as_ref().filter(|_| last.generation != seen) {
				return Err(Error::CredentialRefreshFailed(failure.clone()));
			}
		}

		let span = StageSpan::new(Stage::Refresh, "ensure")
			.with_field(StageField::Grant, self.grant.as_str());

		obs::record_stage_outcome(Stage::Refresh, Outcome::Attempt);

		let result = span.instrument(self.exchange(now)).await;

		obs::record_stage_outcome(Stage::Refresh, Outcome::of(&result));

		let mut last = self.last_exchange.lock();

		last.generation += 1;

		match result {
			Ok(credential) => {
				last.failure = None;
				*self.slot.write() = Some(credential.clone());

				Ok(credential)
			},
			Err(e) => {
				self.metrics.record_failure();

				let failure = Arc::new(e);

				last.failure = Some(failure.clone());

				Err(Error::CredentialRefreshFailed(failure))
			},
		}
	}

	/// [`ensure`](Self::ensure) evaluated at the current UTC instant.
	pub async fn ensure_now(&self) -> Result<Credential> {
		self.ensure(OffsetDateTime::now_utc()).await
	}

	fn fresh_at(&self, now: OffsetDateTime) -> Option<Credential> {
		self.slot
			.read()
			.as_ref()
			.filter(|credential| credential.is_fresh_at(now, self.threshold))
			.cloned()
	}

	async fn exchange(&self, now: OffsetDateTime) -> Result<Credential, RefreshError> {
		self.metrics.record_exchange();

		let response = self
			.http_client
			.post(self.endpoint.clone())
			.header(AUTHORIZATION, self.basic_auth.expose())
			.form(&self.grant.form_params())
			.send()
			.await
			.map_err(TransportError::from)?;
		let snapshot = http::read_response(response).await?;
		let status = snapshot.status.as_u16();

		if !snapshot.status.is_success() {
			return Err(RefreshError::Status { status, body: snapshot.body_text() });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&snapshot.body);
		let payload: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| RefreshError::Parse { source, status })?;

		Credential::issued(payload.access_token, now, Duration::seconds(payload.expires_in))
	}
}
/// Generation counter of completed exchanges plus the failure of the latest one.
#[derive(Debug, Default)]
struct ExchangeRecord {
	generation: u64,
	failure: Option<Arc<RefreshError>>,
}

impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("endpoint", &self.endpoint.as_str())
			.field("grant", &self.grant.as_str())
			.field("threshold", &self.threshold)
			.field("cached", &self.slot.read().is_some())
			.finish()
	}
}
