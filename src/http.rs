//! Transport primitives shared by the credential exchange and the delivery call.
//!
//! Both outbound calls go through [`ReqwestHttpClient`], a thin wrapper that pins the
//! request timeout and disables redirect following, and both read their responses with
//! [`read_response`] so status and body are captured once, in one place, for error mapping.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use reqwest::{Response, redirect::Policy};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Timeout applied to every outbound call unless configured otherwise.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Neither the authorization endpoint nor the delivery endpoint is expected to redirect, so
/// clients built here never follow redirects; a 3xx surfaces as an unexpected status instead.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests are abandoned after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).redirect(Policy::none()).build()?;

		Ok(Self(client))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Status and body of a completed HTTP exchange.
#[derive(Clone, Debug)]
pub struct ResponseSnapshot {
	/// HTTP status code.
	pub status: StatusCode,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ResponseSnapshot {
	/// Returns the body as text, replacing invalid UTF-8 sequences.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).trim().to_owned()
	}
}

/// Drains `response` into a [`ResponseSnapshot`].
pub async fn read_response(response: Response) -> Result<ResponseSnapshot, TransportError> {
	let status = response.status();
	let body = response.bytes().await?.to_vec();

	Ok(ResponseSnapshot { status, body })
}
