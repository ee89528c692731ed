//! HTTP intake that validates track links and hands them to a [`WorkSink`].
//!
//! Routes:
//! - `POST /enqueue?url=<track link>` requires `Authorization: Token <auth token>` and answers
//!   `204 No Content` once the item is queued. That only means the item was accepted for
//!   delivery, not that it will play.
//! - `GET /healthz` answers `204 No Content` while the sink accepts items and
//!   `503 Service Unavailable` afterwards.
//!
//! Methods other than `POST` on `/enqueue` answer `405 Method Not Allowed` before the token is
//! looked at. Authenticated intake requests are logged; rejected tokens are logged with the
//! caller's user agent and address.

pub mod track;

pub use track::normalize_track_reference;

// std
use std::{io, net::SocketAddr};
// crates.io
use axum::{
	Router,
	extract::{ConnectInfo, Query, Request, State},
	http::header::{AUTHORIZATION, USER_AGENT},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use tokio::net::TcpListener;
// self
use crate::{_prelude::*, auth::Secret, queue::WorkSink};

/// Shared state passed to the intake handlers.
pub struct IntakeState {
	/// Destination of accepted items.
	pub sink: Arc<dyn WorkSink>,
	/// Token callers must present.
	pub auth_token: Secret,
}
impl IntakeState {
	/// Creates the shared state wrapped in an `Arc`.
	pub fn new(sink: Arc<dyn WorkSink>, auth_token: Secret) -> Arc<Self> {
		Arc::new(Self { sink, auth_token })
	}

	fn is_authorized(&self, header: Option<&str>) -> bool {
		header
			.and_then(|value| value.strip_prefix("Token "))
			.is_some_and(|token| token == self.auth_token.expose())
	}
}
impl Debug for IntakeState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IntakeState")
			.field("accepting", &self.sink.is_accepting())
			.field("auth_token", &self.auth_token)
			.finish()
	}
}

/// Rejections produced by the intake handlers.
#[derive(Debug)]
pub enum IntakeError {
	/// Missing or incorrect `Authorization` header.
	Unauthorized,
	/// The `url` query parameter is absent.
	MissingUrl,
	/// The `url` query parameter is not a track link.
	InvalidUrl(String),
	/// The sink refused the item.
	Submit(Error),
}
impl IntakeError {
	fn status(&self) -> StatusCode {
		match self {
			Self::Unauthorized => StatusCode::UNAUTHORIZED,
			Self::MissingUrl | Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
			Self::Submit(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
impl IntoResponse for IntakeError {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = match self {
			Self::MissingUrl => "Missing required parameter: url\n".to_owned(),
			Self::InvalidUrl(url) => format!("Invalid value for parameter: url ({url})\n"),
			Self::Unauthorized | Self::Submit(_) =>
				format!("{}\n", status.canonical_reason().unwrap_or_default()),
		};

		(status, body).into_response()
	}
}

#[derive(Debug, Deserialize)]
struct EnqueueParams {
	url: Option<String>,
}

/// Builds the intake router.
pub fn make_router(state: Arc<IntakeState>) -> Router {
	// Layers on the POST handler only, so other methods fall through to the 405 answer
	// without a token check. Only authenticated requests reach the access log.
	let enqueue_route = post(enqueue)
		.route_layer(middleware::from_fn(log_request))
		.route_layer(middleware::from_fn_with_state(state.clone(), require_token));

	Router::new()
		.route("/enqueue", enqueue_route)
		.route("/healthz", get(healthz))
		.with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves, then waits for open requests.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> io::Result<()>
where
	F: 'static + Send + Future<Output = ()>,
{
	axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown)
		.await
}

async fn enqueue(
	State(state): State<Arc<IntakeState>>,
	Query(params): Query<EnqueueParams>,
) -> Result<StatusCode, IntakeError> {
	let url = params.url.filter(|url| !url.is_empty()).ok_or(IntakeError::MissingUrl)?;
	let item = normalize_track_reference(&url).ok_or(IntakeError::InvalidUrl(url))?;

	state.sink.submit(item).await.map_err(|e| {
		tracing::error!(error = %e, "Failed to submit item.");

		IntakeError::Submit(e)
	})?;

	Ok(StatusCode::NO_CONTENT)
}

async fn healthz(State(state): State<Arc<IntakeState>>) -> StatusCode {
	if state.sink.is_accepting() { StatusCode::NO_CONTENT } else { StatusCode::SERVICE_UNAVAILABLE }
}

async fn require_token(State(state): State<Arc<IntakeState>>, req: Request, next: Next) -> Response {
	let header = req.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok());

	if state.is_authorized(header) {
		return next.run(req).await;
	}

	tracing::info!(
		user_agent = user_agent(&req),
		remote_addr = %remote_addr(&req),
		"Rejected intake request with a missing or incorrect token."
	);

	IntakeError::Unauthorized.into_response()
}

async fn log_request(req: Request, next: Next) -> Response {
	tracing::info!(
		method = %req.method(),
		uri = %req.uri(),
		user_agent = user_agent(&req),
		remote_addr = %remote_addr(&req),
		"Accepted intake request."
	);

	next.run(req).await
}

fn user_agent(req: &Request) -> &str {
	req.headers().get(USER_AGENT).and_then(|value| value.to_str().ok()).unwrap_or_default()
}

fn remote_addr(req: &Request) -> String {
	req.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(addr)| addr.to_string())
		.unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct NullSink;
	impl WorkSink for NullSink {
		fn submit(&self, _item: crate::queue::WorkItem) -> crate::queue::SubmitFuture<'_> {
			Box::pin(async { Ok(()) })
		}
	}

	#[test]
	fn token_must_match_exactly() {
		let state = IntakeState::new(Arc::new(NullSink), Secret::new("secret"));

		assert!(state.is_authorized(Some("Token secret")));
		assert!(!state.is_authorized(Some("Token bad")));
		assert!(!state.is_authorized(Some("Bearer secret")));
		assert!(!state.is_authorized(Some("Token secret ")));
		assert!(!state.is_authorized(None));
	}

	#[test]
	fn rejections_map_to_statuses() {
		assert_eq!(IntakeError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(IntakeError::MissingUrl.status(), StatusCode::BAD_REQUEST);
		assert_eq!(IntakeError::InvalidUrl("x".into()).status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			IntakeError::Submit(Error::QueueClosed).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}
}
