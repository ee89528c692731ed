//! Relay-level error types shared across the credential cache, gateway, and queue.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The bearer credential could not be obtained; the delivery was not attempted.
	///
	/// Callers that overlapped with the failed exchange share the same source.
	#[error("Cannot authenticate: credential refresh failed.")]
	CredentialRefreshFailed(#[source] Arc<RefreshError>),
	/// Delivery endpoint answered with something other than the accepted status.
	#[error("Delivery endpoint rejected the item with status {status}: {body}")]
	DeliveryRejected {
		/// HTTP status code returned by the delivery endpoint.
		status: u16,
		/// Response body, kept for diagnostics.
		body: String,
	},
	/// Delivery endpoint could not be reached (timeout, refused connection, DNS).
	#[error("Delivery endpoint is unreachable.")]
	DeliveryUnreachable {
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},

	/// Submission attempted after the queue was closed.
	#[error("Work queue is closed.")]
	QueueClosed,
	/// Consumer loop observed its cancellation signal.
	#[error("Work queue consumer was cancelled.")]
	QueueCancelled,
	/// Consumer loop started while another consumer already owns the read end.
	#[error("Work queue already has a consumer.")]
	QueueConsumerTaken,
}
impl Error {
	/// Returns the refresh failure behind [`Error::CredentialRefreshFailed`].
	pub fn refresh_error(&self) -> Option<&RefreshError> {
		match self {
			Self::CredentialRefreshFailed(e) => Some(e.as_ref()),
			_ => None,
		}
	}

	/// Returns `true` for the errors that end a consumer loop.
	pub fn is_queue_lifecycle(&self) -> bool {
		matches!(self, Self::QueueClosed | Self::QueueCancelled | Self::QueueConsumerTaken)
	}
}

impl From<RefreshError> for Error {
	fn from(e: RefreshError) -> Self {
		Self::CredentialRefreshFailed(Arc::new(e))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured endpoint is not a valid absolute URL.
	#[error("Endpoint `{endpoint}` is not a valid URL.")]
	InvalidEndpoint {
		/// Offending endpoint value.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Required environment variable is missing or empty.
	#[error("Missing required environment variable: {name}.")]
	MissingVar {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable is present but cannot be parsed.
	#[error("Invalid value for environment variable {name}: {reason}.")]
	InvalidVar {
		/// Variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Reasons a credential refresh exchange failed.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Request to the authorization endpoint never produced a response.
	#[error("Network error occurred while calling the authorization endpoint.")]
	Transport(#[from] TransportError),
	/// Authorization endpoint answered with a non-success status.
	#[error("Authorization endpoint returned status {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, kept for diagnostics.
		body: String,
	},
	/// Authorization endpoint responded with a body that is not a token response.
	#[error("Authorization endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Token response carried an empty access token.
	#[error("Authorization endpoint returned an empty access token.")]
	EmptyAccessToken,
	/// Token response carried a zero or negative lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token response carried a lifetime that overflows the expiry computation.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Request did not complete before the client timeout.
	#[error("Request timed out.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` when the request was abandoned because of the client timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { source: Box::new(e) } } else { Self::network(e) }
	}
}
