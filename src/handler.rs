//! Token handlers: per-scheme access and refresh token lifecycle.
//!
//! Handlers are bound to one authenticated [`HandlerContext`] shared through a [`SchemeSession`].
//! The access handler serves stored tokens while they are fresh and renews them through the
//! refresh handler of the same scheme otherwise; every lifecycle failure is a typed
//! [`TokenFailure`] value rather than an error.

pub mod access;
pub mod events;
pub mod refresh;
pub mod storage;

pub use access::AccessTokenHandler;
pub use events::*;
pub use refresh::RefreshTokenHandler;
pub use storage::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use async_lock::MutexGuard as AsyncMutexGuard;
// self
use crate::{
	_prelude::*,
	auth::{
		AccessToken, Clock, DEFAULT_SUBJECT_PREFIX, ExpiryPolicy, RefreshToken, SchemeName,
		ScopeSet, SessionId, SubjectId, SystemClock, TokenKind, TokenSecret,
	},
	exchange::RemoteTokenExchange,
	identity::Identity,
	obs::{debug_event, warn_event},
	session::{AuthTicket, PropertyBag, SchemeAuthenticator, SessionCommitter, SessionError},
	store::StoreError,
	validate::{AcceptAll, AccessTokenValidator},
};

/// Default authentication type of identities issued by the SSO provider.
pub const DEFAULT_AUTHENTICATION_TYPE: &str = "sso";

/// Outcome of [`AccessTokenHandler::request_token`] and [`AccessTokenHandler::renew`].
pub type AccessTokenResult = Result<AccessToken, TokenFailure>;
/// Outcome of [`RefreshTokenHandler::request_token`].
pub type RefreshTokenResult = Result<RefreshToken, TokenFailure>;
/// Outcome of a remote revocation.
pub type RevocationResult = Result<RevocationOutcome, TokenFailure>;

/// Why a token lifecycle operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFailureReason {
	/// Handler has no authenticated context.
	NotAuthenticated,
	/// No refresh token is stored for the session.
	MissingRefreshToken,
	/// Token endpoint response lacked `access_token`.
	MissingAccessTokenInResponse,
	/// Token endpoint response lacked `refresh_token`.
	MissingRefreshTokenInResponse,
	/// Token endpoint response lacked `expires_in`.
	MissingExpiryInResponse,
	/// Token endpoint answered with an OAuth error or an unreadable body.
	OAuthResponseFailed,
	/// Renewed access token was rejected by the validator.
	AccessTokenValidationFailed,
	/// Transport failed before a response arrived.
	TransportFailed,
	/// Token storage failed.
	StorageFailed,
}
impl TokenFailureReason {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NotAuthenticated => "not_authenticated",
			Self::MissingRefreshToken => "missing_refresh_token",
			Self::MissingAccessTokenInResponse => "missing_access_token_in_response",
			Self::MissingRefreshTokenInResponse => "missing_refresh_token_in_response",
			Self::MissingExpiryInResponse => "missing_expiry_in_response",
			Self::OAuthResponseFailed => "oauth_response_failed",
			Self::AccessTokenValidationFailed => "access_token_validation_failed",
			Self::TransportFailed => "transport_failed",
			Self::StorageFailed => "storage_failed",
		}
	}
}
impl Display for TokenFailureReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Typed token lifecycle failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct TokenFailure {
	/// Failure category.
	pub reason: TokenFailureReason,
	/// Human-readable description; never contains token values.
	pub message: String,
}
impl TokenFailure {
	/// Creates a failure.
	pub fn new(reason: TokenFailureReason, message: impl Into<String>) -> Self {
		Self { reason, message: message.into() }
	}

	/// Failure returned by handlers without an authenticated context.
	pub fn not_authenticated() -> Self {
		Self::new(
			TokenFailureReason::NotAuthenticated,
			"Token handler has no authenticated SSO context.",
		)
	}

	pub(crate) fn storage(error: StoreError) -> Self {
		Self::new(TokenFailureReason::StorageFailed, error.to_string())
	}
}

/// What a successful revocation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevocationOutcome {
	/// Provider accepted the revocation.
	Revoked,
	/// No token of the requested kind was stored; nothing was sent.
	Absent,
}

/// Tokens obtained by a sign-in, persisted through [`AccessTokenHandler::store_tokens`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessTokenStoreRequest {
	/// Subject the tokens were issued to.
	pub subject: SubjectId,
	/// Access token value.
	pub access_token: TokenSecret,
	/// Refresh token value.
	pub refresh_token: TokenSecret,
	/// Scopes granted with the access token.
	pub granted_scopes: ScopeSet,
	/// Instant the tokens were obtained.
	pub issued_at: OffsetDateTime,
	/// Access token expiry.
	pub expires_at: OffsetDateTime,
}

/// Authenticated state a scheme's handlers operate on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerContext {
	/// Scheme the context was authenticated with.
	pub scheme: SchemeName,
	/// Normalized subject.
	pub subject: SubjectId,
	/// Local session.
	pub session: SessionId,
	/// Authenticated identity.
	pub identity: Identity,
	/// Session properties, including embedded tokens or storage keys.
	pub properties: PropertyBag,
}

/// Rules deciding whether a ticket yields a [`HandlerContext`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketPolicy {
	/// Authentication type SSO identities carry.
	pub authentication_type: String,
	/// Provider prefix stripped from subjects.
	pub subject_prefix: String,
}
impl TicketPolicy {
	/// Derives a context when the ticket's identity is authenticated with the SSO type, has a
	/// valid subject, and its properties carry a session id.
	pub fn context(&self, scheme: &SchemeName, ticket: AuthTicket) -> Option<HandlerContext> {
		let AuthTicket { identity, properties } = ticket;

		if !identity.is_authenticated_as(&self.authentication_type) {
			return None;
		}

		let subject = identity.subject(&self.subject_prefix)?.ok()?;
		let session = properties.session_id()?;

		Some(HandlerContext { scheme: scheme.clone(), subject, session, identity, properties })
	}

	/// Normalized subject of `identity`, if it has a valid one.
	pub fn subject_of(&self, identity: &Identity) -> Option<SubjectId> {
		identity.subject(&self.subject_prefix)?.ok()
	}
}
impl Default for TicketPolicy {
	fn default() -> Self {
		Self {
			authentication_type: DEFAULT_AUTHENTICATION_TYPE.into(),
			subject_prefix: DEFAULT_SUBJECT_PREFIX.into(),
		}
	}
}

/// Context shared by the access and refresh handlers of one scheme within one request.
///
/// Readers take a snapshot; writers hold the lock only for the storage write itself, so the
/// access handler never holds it while calling into the refresh handler.
#[derive(Debug)]
pub struct SchemeSession {
	scheme: SchemeName,
	policy: TicketPolicy,
	context: AsyncMutex<Option<HandlerContext>>,
	dirty: AtomicBool,
}
impl SchemeSession {
	/// Creates an uninitialized session for `scheme`.
	pub fn new(scheme: SchemeName, policy: TicketPolicy) -> Self {
		Self { scheme, policy, context: AsyncMutex::new(None), dirty: AtomicBool::new(false) }
	}

	/// Scheme this session belongs to.
	pub fn scheme(&self) -> &SchemeName {
		&self.scheme
	}

	/// Replaces the context with one derived from `ticket`; returns whether it is authenticated.
	pub async fn attach(&self, ticket: Option<AuthTicket>) -> bool {
		let context = ticket.and_then(|ticket| self.policy.context(&self.scheme, ticket));
		let authenticated = context.is_some();

		*self.context.lock().await = context;

		authenticated
	}

	/// Copy of the current context.
	pub async fn snapshot(&self) -> Option<HandlerContext> {
		self.context.lock().await.clone()
	}

	/// Returns `true` when the embedded tokens changed and must be re-committed.
	pub fn is_dirty(&self) -> bool {
		self.dirty.load(Ordering::Acquire)
	}

	/// Re-commits the context if embedded tokens changed during the request.
	///
	/// The scheme is authenticated again first; the commit is skipped unless the request is
	/// still signed in as the same subject. Returns whether a commit ran.
	pub async fn finish_response(
		&self,
		authenticator: &dyn SchemeAuthenticator,
		committer: &dyn SessionCommitter,
	) -> Result<bool, SessionError> {
		if !self.dirty.swap(false, Ordering::AcqRel) {
			return Ok(false);
		}

		let Some(context) = self.snapshot().await else {
			return Ok(false);
		};
		let current = authenticator.authenticate(&self.scheme).await?;
		let same_subject = current
			.and_then(|ticket| self.policy.subject_of(&ticket.identity))
			.is_some_and(|subject| subject == context.subject);

		if !same_subject {
			debug_event!(scheme = %self.scheme, "Skipping re-commit; the subject changed.");

			return Ok(false);
		}

		committer.commit(&self.scheme, context.identity, context.properties).await?;

		Ok(true)
	}

	pub(crate) async fn lock(&self) -> AsyncMutexGuard<'_, Option<HandlerContext>> {
		self.context.lock().await
	}

	pub(crate) fn mark_dirty(&self) {
		self.dirty.store(true, Ordering::Release);
	}
}

/// Collaborators every handler needs.
#[derive(Clone)]
pub struct HandlerServices {
	/// Refresh and revocation client.
	pub exchange: Arc<dyn RemoteTokenExchange>,
	/// Validator applied to renewed access tokens.
	pub validator: Arc<dyn AccessTokenValidator>,
	/// Renewal observer.
	pub events: Arc<dyn RenewalEvents>,
	/// Proactive renewal policy.
	pub policy: ExpiryPolicy,
	/// Clock used for expiry decisions.
	pub clock: Arc<dyn Clock>,
	/// Scopes requested on renewal; `None` keeps the granted ones.
	pub scopes: Option<ScopeSet>,
}
impl HandlerServices {
	/// Uses `exchange` with accept-all validation, no events, the default policy, and the wall
	/// clock.
	pub fn new(exchange: Arc<dyn RemoteTokenExchange>) -> Self {
		Self {
			exchange,
			validator: Arc::new(AcceptAll),
			events: Arc::new(NoopEvents),
			policy: ExpiryPolicy::default(),
			clock: Arc::new(SystemClock),
			scopes: None,
		}
	}

	/// Overrides the access token validator.
	pub fn with_validator(mut self, validator: Arc<dyn AccessTokenValidator>) -> Self {
		self.validator = validator;

		self
	}

	/// Overrides the renewal observer.
	pub fn with_events(mut self, events: Arc<dyn RenewalEvents>) -> Self {
		self.events = events;

		self
	}

	/// Overrides the expiry policy.
	pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Requests `scopes` on renewal.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}
}
impl Debug for HandlerServices {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HandlerServices")
			.field("policy", &self.policy)
			.field("scopes", &self.scopes)
			.finish_non_exhaustive()
	}
}

async fn revoke_stored(
	services: &HandlerServices,
	scheme: &SchemeName,
	kind: TokenKind,
	value: Option<TokenSecret>,
) -> RevocationResult {
	let Some(value) = value else {
		debug_event!(scheme = %scheme, kind = %kind, "No stored token to revoke.");

		return Ok(RevocationOutcome::Absent);
	};

	match services.exchange.revoke(kind, value.expose()).await {
		Ok(()) => Ok(RevocationOutcome::Revoked),
		Err(e) => {
			warn_event!(scheme = %scheme, kind = %kind, error = %e, "Token revocation failed.");

			Err(TokenFailure::new(e.reason(), e.to_string()))
		},
	}
}

async fn discard_stored(
	session: &SchemeSession,
	storage: &dyn TokenStorage,
) -> Result<usize, TokenFailure> {
	let mut guard = session.lock().await;
	let Some(context) = guard.as_mut() else {
		return Err(TokenFailure::not_authenticated());
	};
	let removed = storage.discard(context).await.map_err(TokenFailure::storage)?;

	drop(guard);

	if storage.requires_recommit() && removed > 0 {
		session.mark_dirty();
	}

	Ok(removed)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::claims::{Claim, types};

	fn scheme() -> SchemeName {
		SchemeName::new("sso.cookie").expect("Scheme fixture should be valid.")
	}

	fn ticket(authentication_type: &str, with_session: bool) -> AuthTicket {
		let identity = Identity::new(authentication_type)
			.with_claims([Claim::new(types::SUBJECT, "CHARACTER:EVE:2112")]);
		let mut properties = PropertyBag::default();

		if with_session {
			properties.set_session_id(&SessionId::new("session-1").expect("Fixture is valid."));
		}

		AuthTicket::new(identity, properties)
	}

	#[test]
	fn context_requires_sso_identity_subject_and_session() {
		let policy = TicketPolicy::default();
		let context = policy
			.context(&scheme(), ticket(DEFAULT_AUTHENTICATION_TYPE, true))
			.expect("SSO ticket with a session should yield a context.");

		assert_eq!(context.subject.as_ref(), "2112");
		assert!(policy.context(&scheme(), ticket("cookie", true)).is_none());
		assert!(policy.context(&scheme(), ticket(DEFAULT_AUTHENTICATION_TYPE, false)).is_none());
		assert!(policy.context(&scheme(), AuthTicket::default()).is_none());
	}

	#[tokio::test]
	async fn attach_reports_authentication() {
		let session = SchemeSession::new(scheme(), TicketPolicy::default());

		assert!(!session.attach(None).await);
		assert!(session.attach(Some(ticket(DEFAULT_AUTHENTICATION_TYPE, true))).await);
		assert!(session.snapshot().await.is_some());
		assert!(!session.is_dirty());
	}

	#[test]
	fn failure_displays_message_only() {
		let failure =
			TokenFailure::new(TokenFailureReason::MissingRefreshToken, "No refresh token.");

		assert_eq!(failure.to_string(), "No refresh token.");
		assert_eq!(failure.reason.as_str(), "missing_refresh_token");
	}
}
