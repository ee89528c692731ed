//! Normalization of shared track links into track URIs.

// self
use crate::{_prelude::*, queue::WorkItem};

const URI_PREFIX: &str = "spotify:track:";

/// Turns a shared track link into a `spotify:track:<id>` URI.
///
/// Accepts the app's sharing format, e.g.
/// `https://open.spotify.com/track/1301WleyT98MSxVHPZCA6M?si=FY7aEiPCT0u3-CuNApJTRg`, including
/// localized paths such as `/intl-de/track/<id>`, and URIs that are already normalized.
pub fn normalize_track_reference(raw: &str) -> Option<WorkItem> {
	if let Some(id) = raw.strip_prefix(URI_PREFIX) {
		return is_track_id(id).then(|| WorkItem::new(raw));
	}

	let url = Url::parse(raw).ok()?;

	if url.scheme() != "https" || !url.host_str()?.starts_with("open.spotify.") {
		return None;
	}
	if !url.query().is_some_and(|query| query.starts_with("si=")) {
		return None;
	}

	let mut segments = url.path_segments()?.rev();
	let id = segments.next()?;

	if segments.next()? != "track" || !is_track_id(id) {
		return None;
	}

	Some(WorkItem::new(format!("{URI_PREFIX}{id}")))
}

fn is_track_id(id: &str) -> bool {
	!id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}
