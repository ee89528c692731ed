//! Ordered track relay: accept track references fast, deliver them one at a time to a
//! bearer-authenticated playback API.
//!
//! The crate is split along the delivery path:
//!
//! - [`queue`] buffers accepted [`queue::WorkItem`]s in a bounded FIFO and drives a single
//!   consumer loop.
//! - [`gateway`] turns each item into one authenticated call against the delivery endpoint.
//! - [`auth`] caches the short-lived bearer credential and refreshes it before it expires.
//! - [`server`] (feature `server`) is the HTTP intake that feeds the queue.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod queue;
#[cfg(feature = "server")] pub mod server;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixture builders shared by unit and integration tests.

	pub use crate::_prelude::*;

	// std
	use std::time::Duration as StdDuration;
	// self
	use crate::{
		auth::{Grant, TokenCache},
		error::ConfigError,
		gateway::{ApiGateway, DeliveryTarget},
		http::ReqwestHttpClient,
	};

	/// Client identifier used by test fixtures.
	pub const TEST_CLIENT_ID: &str = "foo";
	/// Client secret used by test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "bar";
	/// Refresh token used by test fixtures.
	pub const TEST_REFRESH_TOKEN: &str = "baz";

	const TEST_TIMEOUT: StdDuration = StdDuration::from_secs(5);

	/// Builds a token cache that refreshes against `{auth_base}/api/token` with the fixture
	/// client pair and refresh token.
	pub fn build_test_token_cache(auth_base: &str) -> Result<TokenCache, ConfigError> {
		let endpoint = parse_endpoint(auth_base)?;
		let endpoint = endpoint.join("/api/token").map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: format!("{auth_base}/api/token"), source }
		})?;

		Ok(TokenCache::new(
			ReqwestHttpClient::with_timeout(TEST_TIMEOUT)?,
			endpoint,
			TEST_CLIENT_ID,
			TEST_CLIENT_SECRET,
			Grant::refresh_token(TEST_REFRESH_TOKEN),
		))
	}

	/// Builds a gateway whose token cache and delivery target point at the provided mock
	/// servers.
	pub fn build_test_gateway(
		auth_base: &str,
		api_base: &str,
	) -> Result<(ApiGateway, Arc<TokenCache>), ConfigError> {
		let tokens = Arc::new(build_test_token_cache(auth_base)?);
		let target = DeliveryTarget::new(parse_endpoint(api_base)?);
		let http_client = ReqwestHttpClient::with_timeout(TEST_TIMEOUT)?;

		Ok((ApiGateway::new(http_client, tokens.clone(), target), tokens))
	}

	fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
		Url::parse(raw)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: raw.to_owned(), source })
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, StatusCode};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use httpmock as _;
#[cfg(feature = "server")] use {color_eyre as _, dotenvy as _, tracing_subscriber as _};
