//! Access and refresh token models.

pub mod record;
pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, SessionId, SubjectId, TokenSecret},
};

/// Token kinds managed per scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Short-lived bearer token.
	Access,
	/// Long-lived token used to mint new access tokens.
	Refresh,
}
impl TokenKind {
	/// Returns a stable label suitable for logs and storage keys.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access",
			TokenKind::Refresh => "refresh",
		}
	}

	/// Returns the RFC 7009 `token_type_hint` for this kind.
	pub const fn type_hint(self) -> &'static str {
		match self {
			TokenKind::Access => "access_token",
			TokenKind::Refresh => "refresh_token",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Access token handed to callers.
///
/// Renewal supersedes the value with a new instance; existing instances never change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	/// Bearer value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
	/// Scopes granted with this token.
	pub granted_scopes: ScopeSet,
}
impl AccessToken {
	/// Creates an access token.
	pub fn new(
		value: impl Into<String>,
		expires_at: OffsetDateTime,
		granted_scopes: ScopeSet,
	) -> Self {
		Self { value: TokenSecret::new(value), expires_at, granted_scopes }
	}
}

/// Refresh token bound to one subject and session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshToken {
	/// Refresh value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Subject the token was issued to.
	pub subject: SubjectId,
	/// Session the token belongs to.
	pub session: SessionId,
	/// Instant the token was obtained.
	pub issued_at: OffsetDateTime,
}
