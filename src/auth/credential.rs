//! Bearer credential issued by the authorization endpoint.

// self
use crate::{_prelude::*, auth::Secret, error::RefreshError};

/// Short-lived bearer credential plus the absolute instant it stops being valid.
///
/// A credential always carries a non-empty bearer value; [`Credential::new`] rejects
/// anything else so an absent credential is modeled as `Option<Credential>` by its owner.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	bearer: Secret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Builds a credential, rejecting empty bearer values.
	pub fn new(
		bearer: impl Into<Secret>,
		expires_at: OffsetDateTime,
	) -> Result<Self, RefreshError> {
		let bearer = bearer.into();

		if bearer.is_empty() {
			return Err(RefreshError::EmptyAccessToken);
		}

		Ok(Self { bearer, expires_at })
	}

	/// Builds a credential that expires `expires_in` after `issued_at`.
	pub fn issued(
		bearer: impl Into<Secret>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, RefreshError> {
		if !expires_in.is_positive() {
			return Err(RefreshError::NonPositiveExpiresIn);
		}

		let expires_at =
			issued_at.checked_add(expires_in).ok_or(RefreshError::ExpiresInOutOfRange)?;

		Self::new(bearer, expires_at)
	}

	/// Bearer value; callers must avoid logging it.
	pub fn bearer(&self) -> &Secret {
		&self.bearer
	}

	/// Returns `true` if the credential stays valid for at least `threshold` past `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, threshold: Duration) -> bool {
		match now.checked_add(threshold) {
			Some(deadline) => self.expires_at >= deadline,
			None => false,
		}
	}

	/// Value for the `Authorization` header of an authenticated request.
	pub fn authorization_header(&self) -> String {
		format!("Bearer {}", self.bearer.expose())
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("bearer", &self.bearer)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn freshness_honors_threshold() {
		let now = datetime!(2000-01-01 00:00:00 UTC);
		let threshold = Duration::seconds(5);
		let fresh = Credential::new("secret", now + Duration::seconds(10))
			.expect("Non-empty bearer should build.");
		let edge = Credential::new("secret", now + Duration::seconds(5))
			.expect("Non-empty bearer should build.");
		let stale = Credential::new("secret", now + Duration::seconds(4))
			.expect("Non-empty bearer should build.");

		assert!(fresh.is_fresh_at(now, threshold));
		assert!(edge.is_fresh_at(now, threshold));
		assert!(!stale.is_fresh_at(now, threshold));
	}

	#[test]
	fn issued_rejects_bad_inputs() {
		let now = datetime!(2000-01-01 00:00:00 UTC);

		assert!(matches!(
			Credential::issued("", now, Duration::hours(1)),
			Err(RefreshError::EmptyAccessToken)
		));
		assert!(matches!(
			Credential::issued("secret", now, Duration::ZERO),
			Err(RefreshError::NonPositiveExpiresIn)
		));

		let credential = Credential::issued("secret", now, Duration::seconds(3600))
			.expect("Valid token response should build a credential.");

		assert_eq!(credential.expires_at, datetime!(2000-01-01 01:00:00 UTC));
		assert_eq!(credential.authorization_header(), "Bearer secret");
		let debug = format!("{credential:?}");

		assert!(debug.contains("<redacted>"));
		assert!(!debug.contains("secret"));
	}
}
