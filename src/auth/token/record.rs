//! Stored token records and their builder.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken, ScopeSet, SessionId, SubjectId, TokenKind, TokenSecret},
};

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no token value was provided.
	#[error("Token value is required.")]
	MissingValue,
	/// Issued when an access token record has no expiry (absolute or relative).
	#[error("Access token records need expires_at or expires_in.")]
	MissingExpiry,
}

/// Persisted form of an access or refresh token.
///
/// Records carry subject and session so stores can remove them by filter; the storage key
/// itself never contains either.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Token kind.
	pub kind: TokenKind,
	/// Owning subject.
	pub subject: SubjectId,
	/// Owning session.
	pub session: SessionId,
	/// Token value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Scopes granted alongside the token.
	pub granted_scopes: ScopeSet,
	/// Instant the record was created.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Expiry instant; refresh tokens have none.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Returns a builder for a record of `kind` owned by `subject` and `session`.
	pub fn builder(kind: TokenKind, subject: SubjectId, session: SessionId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(kind, subject, session)
	}

	/// Converts an access record into an [`AccessToken`].
	pub fn to_access_token(&self) -> Option<AccessToken> {
		match (self.kind, self.expires_at) {
			(TokenKind::Access, Some(expires_at)) => Some(AccessToken {
				value: self.value.clone(),
				expires_at,
				granted_scopes: self.granted_scopes.clone(),
			}),
			_ => None,
		}
	}

	/// Converts a refresh record into a [`RefreshToken`].
	pub fn to_refresh_token(&self) -> Option<RefreshToken> {
		match self.kind {
			TokenKind::Refresh => Some(RefreshToken {
				value: self.value.clone(),
				subject: self.subject.clone(),
				session: self.session.clone(),
				issued_at: self.issued_at,
			}),
			TokenKind::Access => None,
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("kind", &self.kind)
			.field("subject", &self.subject)
			.field("session", &self.session)
			.field("value", &"<redacted>")
			.field("granted_scopes", &self.granted_scopes)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	kind: TokenKind,
	subject: SubjectId,
	session: SessionId,
	value: Option<TokenSecret>,
	granted_scopes: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(kind: TokenKind, subject: SubjectId, session: SessionId) -> Self {
		Self {
			kind,
			subject,
			session,
			value: None,
			granted_scopes: ScopeSet::default(),
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the token value.
	pub fn value(mut self, token: impl Into<String>) -> Self {
		self.value = Some(TokenSecret::new(token));

		self
	}

	/// Sets the granted scopes.
	pub fn granted_scopes(mut self, scopes: ScopeSet) -> Self {
		self.granted_scopes = scopes;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let value = self.value.ok_or(TokenRecordBuilderError::MissingValue)?;

		if value.expose().is_empty() {
			return Err(TokenRecordBuilderError::MissingValue);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(issued_at + delta),
			(None, None) => None,
		};

		if self.kind == TokenKind::Access && expires_at.is_none() {
			return Err(TokenRecordBuilderError::MissingExpiry);
		}

		Ok(TokenRecord {
			kind: self.kind,
			subject: self.subject,
			session: self.session,
			value,
			granted_scopes: self.granted_scopes,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn owner() -> (SubjectId, SessionId) {
		(
			SubjectId::new("CHARACTER:EVE:2112").expect("Subject fixture should be valid."),
			SessionId::new("session-1").expect("Session fixture should be valid."),
		)
	}

	#[test]
	fn access_records_require_expiry() {
		let (subject, session) = owner();
		let err = TokenRecord::builder(TokenKind::Access, subject.clone(), session.clone())
			.value("access")
			.build()
			.expect_err("Access records without expiry should be rejected.");

		assert_eq!(err, TokenRecordBuilderError::MissingExpiry);

		let record = TokenRecord::builder(TokenKind::Access, subject, session)
			.value("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(20))
			.build()
			.expect("Access record with relative expiry should build.");
		let token = record.to_access_token().expect("Access record should convert.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:20 UTC));
		assert!(record.to_refresh_token().is_none());
	}

	#[test]
	fn refresh_records_convert_and_redact() {
		let (subject, session) = owner();
		let record = TokenRecord::builder(TokenKind::Refresh, subject.clone(), session)
			.value("refresh-secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.build()
			.expect("Refresh record should build without expiry.");
		let token = record.to_refresh_token().expect("Refresh record should convert.");

		assert_eq!(token.subject, subject);
		assert!(token.value.matches("refresh-secret"));
		assert!(!format!("{record:?}").contains("refresh-secret"));
	}

	#[test]
	fn records_round_trip_through_json() {
		let (subject, session) = owner();
		let record = TokenRecord::builder(TokenKind::Access, subject, session)
			.value("access")
			.granted_scopes(ScopeSet::new(["publicData"]).expect("Scope fixture should be valid."))
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(macros::datetime!(2025-01-01 00:20 UTC))
			.build()
			.expect("Access record should build.");
		let json = serde_json::to_string(&record).expect("Record should serialize.");

		assert!(json.contains("\"expires_at\":\"2025-01-01T00:20:00Z\""));

		let back: TokenRecord = serde_json::from_str(&json).expect("Record should deserialize.");

		assert_eq!(back, record);
	}
}
