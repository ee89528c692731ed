//! Process configuration loaded from environment variables.
//!
//! | Variable | Required | Default |
//! | --- | --- | --- |
//! | `SPARTY_AUTH_TOKEN` | yes | |
//! | `SPOTIFY_CLIENT_ID` | yes | |
//! | `SPOTIFY_CLIENT_SECRET` | yes | |
//! | `SPOTIFY_REFRESH_TOKEN` | no | client-credentials grant |
//! | `PORT` | no | `8080` |
//! | `SPOTIFY_API_BASE_URL` | no | `https://api.spotify.com` |
//! | `SPOTIFY_AUTH_BASE_URL` | no | `https://accounts.spotify.com` |
//! | `SPARTY_QUEUE_CAPACITY` | no | `10` |
//! | `SPARTY_SHUTDOWN_POLICY` | no | `abandon` |
//! | `SPARTY_HTTP_TIMEOUT_SECS` | no | `5` |
//! | `SPARTY_DRAIN_TIMEOUT_SECS` | no | `30` |

// std
use std::{
	net::{Ipv4Addr, SocketAddr},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	auth::{Grant, Secret, TokenCache},
	error::ConfigError,
	gateway::{ApiGateway, DeliveryTarget},
	http::{self, ReqwestHttpClient},
	queue::{MemoryQueue, ShutdownPolicy},
};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com";
const DEFAULT_AUTH_BASE_URL: &str = "https://accounts.spotify.com";
const TOKEN_PATH: &str = "/api/token";

/// Fully validated runtime settings.
#[derive(Clone, Debug)]
pub struct Config {
	/// Token intake callers must present as `Authorization: Token <value>`.
	pub auth_token: Secret,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Grant used for credential refreshes.
	pub grant: Grant,
	/// Address the intake server binds to.
	pub listen_addr: SocketAddr,
	/// Base URL of the delivery API.
	pub api_base: Url,
	/// Base URL of the authorization server.
	pub auth_base: Url,
	/// Work queue buffer size.
	pub queue_capacity: usize,
	/// What happens to buffered items on shutdown.
	pub shutdown_policy: ShutdownPolicy,
	/// Timeout applied to every outbound call.
	pub http_timeout: StdDuration,
	/// Upper bound on draining buffered items at shutdown under [`ShutdownPolicy::Drain`].
	pub drain_timeout: StdDuration,
}
impl Config {
	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads the configuration through `lookup`, which returns the raw value of a variable.
	///
	/// Empty values are treated as missing.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let vars = Vars(lookup);
		let grant = match vars.optional("SPOTIFY_REFRESH_TOKEN") {
			Some(token) => Grant::refresh_token(token),
			None => Grant::ClientCredentials,
		};
		let port = vars.parsed("PORT", DEFAULT_PORT)?;

		Ok(Self {
			auth_token: vars.required("SPARTY_AUTH_TOKEN")?.into(),
			client_id: vars.required("SPOTIFY_CLIENT_ID")?,
			client_secret: vars.required("SPOTIFY_CLIENT_SECRET")?.into(),
			grant,
			listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
			api_base: vars.url("SPOTIFY_API_BASE_URL", DEFAULT_API_BASE_URL)?,
			auth_base: vars.url("SPOTIFY_AUTH_BASE_URL", DEFAULT_AUTH_BASE_URL)?,
			queue_capacity: vars.parsed("SPARTY_QUEUE_CAPACITY", MemoryQueue::DEFAULT_CAPACITY)?,
			shutdown_policy: vars.parsed("SPARTY_SHUTDOWN_POLICY", ShutdownPolicy::default())?,
			http_timeout: StdDuration::from_secs(
				vars.parsed("SPARTY_HTTP_TIMEOUT_SECS", http::DEFAULT_TIMEOUT.as_secs())?,
			),
			drain_timeout: StdDuration::from_secs(vars.parsed(
				"SPARTY_DRAIN_TIMEOUT_SECS",
				MemoryQueue::DEFAULT_DRAIN_TIMEOUT.as_secs(),
			)?),
		})
	}

	/// Authorization endpoint derived from [`Config::auth_base`].
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		self.auth_base.join(TOKEN_PATH).map_err(|source| ConfigError::InvalidEndpoint {
			endpoint: format!("{}{TOKEN_PATH}", self.auth_base),
			source,
		})
	}

	/// Builds the HTTP client shared by the outbound calls.
	pub fn build_http_client(&self) -> Result<ReqwestHttpClient, ConfigError> {
		ReqwestHttpClient::with_timeout(self.http_timeout)
	}

	/// Builds the credential cache and the gateway that depends on it.
	pub fn build_gateway(&self) -> Result<ApiGateway, ConfigError> {
		let http_client = self.build_http_client()?;
		let tokens = TokenCache::new(
			http_client.clone(),
			self.token_endpoint()?,
			&self.client_id,
			self.client_secret.expose(),
			self.grant.clone(),
		);
		let target = DeliveryTarget::new(self.api_base.clone());

		Ok(ApiGateway::new(http_client, Arc::new(tokens), target))
	}

	/// Builds the work queue.
	pub fn build_queue(&self) -> MemoryQueue {
		MemoryQueue::with_capacity(self.queue_capacity).with_policy(self.shutdown_policy)
	}
}

struct Vars<F>(F);
impl<F> Vars<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn optional(&self, name: &'static str) -> Option<String> {
		(self.0)(name).filter(|value| !value.trim().is_empty())
	}

	fn required(&self, name: &'static str) -> Result<String, ConfigError> {
		self.optional(name).ok_or(ConfigError::MissingVar { name })
	}

	fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
	where
		T: FromStr,
		T::Err: Display,
	{
		match self.optional(name) {
			Some(raw) => raw
				.trim()
				.parse()
				.map_err(|e: T::Err| ConfigError::InvalidVar { name, reason: e.to_string() }),
			None => Ok(default),
		}
	}

	fn url(&self, name: &'static str, default: &str) -> Result<Url, ConfigError> {
		let raw = self.optional(name).unwrap_or_else(|| default.to_owned());

		Url::parse(&raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint: raw, source })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |name| map.get(name).cloned()
	}

	const REQUIRED: [(&str, &str); 3] = [
		("SPARTY_AUTH_TOKEN", "intake-secret"),
		("SPOTIFY_CLIENT_ID", "foo"),
		("SPOTIFY_CLIENT_SECRET", "bar"),
	];

	#[test]
	fn defaults_apply_when_optional_vars_are_absent() {
		let config = Config::from_lookup(lookup(&REQUIRED)).expect("Required vars should suffice.");

		assert_eq!(config.auth_token.expose(), "intake-secret");
		assert_eq!(config.grant, Grant::ClientCredentials);
		assert_eq!(config.listen_addr.port(), 8080);
		assert_eq!(config.api_base.as_str(), "https://api.spotify.com/");
		assert_eq!(
			config.token_endpoint().expect("Token endpoint should derive.").as_str(),
			"https://accounts.spotify.com/api/token"
		);
		assert_eq!(config.queue_capacity, 10);
		assert_eq!(config.shutdown_policy, ShutdownPolicy::Abandon);
		assert_eq!(config.http_timeout, StdDuration::from_secs(5));
		assert_eq!(config.drain_timeout, StdDuration::from_secs(30));
	}

	#[test]
	fn overrides_are_parsed() {
		let mut pairs = REQUIRED.to_vec();

		pairs.extend([
			("SPOTIFY_REFRESH_TOKEN", "baz"),
			("PORT", "9090"),
			("SPARTY_QUEUE_CAPACITY", "3"),
			("SPARTY_SHUTDOWN_POLICY", "drain"),
			("SPARTY_DRAIN_TIMEOUT_SECS", "7"),
			("SPOTIFY_AUTH_BASE_URL", "http://127.0.0.1:4000"),
		]);

		let config = Config::from_lookup(lookup(&pairs)).expect("Overrides should parse.");

		assert_eq!(config.grant, Grant::refresh_token("baz"));
		assert_eq!(config.listen_addr.port(), 9090);
		assert_eq!(config.build_queue().capacity(), 3);
		assert_eq!(config.build_queue().policy(), ShutdownPolicy::Drain);
		assert_eq!(config.drain_timeout, StdDuration::from_secs(7));
		assert_eq!(
			config.token_endpoint().expect("Token endpoint should derive.").as_str(),
			"http://127.0.0.1:4000/api/token"
		);
	}

	#[test]
	fn missing_and_invalid_vars_are_reported() {
		let err = Config::from_lookup(lookup(&REQUIRED[..2]))
			.expect_err("Missing client secret should be rejected.");

		assert!(matches!(err, ConfigError::MissingVar { name: "SPOTIFY_CLIENT_SECRET" }));

		let mut pairs = REQUIRED.to_vec();

		pairs.push(("PORT", "not-a-port"));

		let err = Config::from_lookup(lookup(&pairs)).expect_err("Bad port should be rejected.");

		assert!(matches!(err, ConfigError::InvalidVar { name: "PORT", .. }));
	}

	#[test]
	fn blank_values_count_as_missing() {
		let mut pairs = REQUIRED.to_vec();

		pairs[0] = ("SPARTY_AUTH_TOKEN", "  ");

		let err = Config::from_lookup(lookup(&pairs)).expect_err("Blank token should be rejected.");

		assert!(matches!(err, ConfigError::MissingVar { name: "SPARTY_AUTH_TOKEN" }));
	}
}
