//! Grant selection for the credential refresh exchange.

// self
use crate::{_prelude::*, auth::Secret};

/// OAuth 2.0 grant used to mint bearer credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Grant {
	/// `grant_type=client_credentials`; the client pair alone identifies the caller.
	ClientCredentials,
	/// `grant_type=refresh_token`; acts on behalf of the user who issued the refresh token.
	RefreshToken(Secret),
}
impl Grant {
	/// Convenience constructor for the refresh-token grant.
	pub fn refresh_token(token: impl Into<Secret>) -> Self {
		Self::RefreshToken(token.into())
	}

	/// Returns the `grant_type` form value.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::RefreshToken(_) => "refresh_token",
		}
	}

	/// Builds the form-encoded body parameters for the token request.
	pub fn form_params(&self) -> Vec<(&'static str, &str)> {
		let mut params = vec![("grant_type", self.as_str())];

		if let Self::RefreshToken(token) = self {
			params.push(("refresh_token", token.expose()));
		}

		params
	}
}
impl Display for Grant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
