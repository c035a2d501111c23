//! Host session collaborators: property bags, authentication tickets, and the deferred commit.
//!
//! The crate never serializes cookies or touches the host's request pipeline. It authenticates
//! schemes through a [`SchemeAuthenticator`], writes sessions through a [`SessionCommitter`], and
//! carries per-session state in a [`PropertyBag`].

pub mod memory;

pub use memory::MemorySessions;

// self
use crate::{
	_prelude::*,
	auth::{SchemeName, SessionId, TokenKind, TokenSecret},
	identity::Identity,
	store::StorageKey,
};

/// Boxed future returned by session collaborators.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Failures raised by host session collaborators.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// Session backend failed.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Host does not know the scheme.
	#[error("Authentication scheme `{scheme}` is not registered with the host.")]
	UnknownScheme {
		/// Scheme name.
		scheme: String,
	},
}

/// Authenticates a host scheme for the current request.
pub trait SchemeAuthenticator
where
	Self: Send + Sync,
{
	/// Returns the scheme's ticket, or `None` when the request is not authenticated with it.
	fn authenticate<'a>(&'a self, scheme: &'a SchemeName) -> SessionFuture<'a, Option<AuthTicket>>;
}

/// Writes and clears host sessions.
pub trait SessionCommitter
where
	Self: Send + Sync,
{
	/// Signs `identity` into `scheme` with `properties`.
	fn commit<'a>(
		&'a self,
		scheme: &'a SchemeName,
		identity: Identity,
		properties: PropertyBag,
	) -> SessionFuture<'a, ()>;

	/// Signs the current principal out of `scheme`.
	fn sign_out<'a>(&'a self, scheme: &'a SchemeName) -> SessionFuture<'a, ()>;
}

/// Generates identifiers for new local sessions.
pub trait SessionIdGenerator
where
	Self: Send + Sync,
{
	/// Returns a fresh session id.
	fn generate(&self) -> SessionId;
}

/// [`SessionIdGenerator`] producing random alphanumeric ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSessionIds;
impl SessionIdGenerator for RandomSessionIds {
	fn generate(&self) -> SessionId {
		SessionId::generate()
	}
}

/// Result of authenticating a scheme.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthTicket {
	/// Authenticated identity.
	pub identity: Identity,
	/// Session properties carried alongside.
	pub properties: PropertyBag,
}
impl AuthTicket {
	/// Creates a ticket.
	pub fn new(identity: Identity, properties: PropertyBag) -> Self {
		Self { identity, properties }
	}
}

/// Per-session string items and named tokens committed with an identity.
///
/// Empty values read as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBag {
	items: BTreeMap<String, String>,
	tokens: BTreeMap<String, TokenSecret>,
}
impl PropertyBag {
	/// Item holding the session id.
	pub const SESSION_ID: &str = ".sso.session";
	/// Item holding the access token storage key.
	pub const ACCESS_TOKEN_KEY: &str = ".sso.token.access";
	/// Item holding the refresh token storage key.
	pub const REFRESH_TOKEN_KEY: &str = ".sso.token.refresh";
	/// Item holding the post sign-in return URL.
	pub const RETURN_URL: &str = "returnUrl";

	/// Token entry holding the access token.
	pub const ACCESS_TOKEN: &str = "access_token";
	/// Token entry holding the refresh token.
	pub const REFRESH_TOKEN: &str = "refresh_token";
	/// Token entry holding the access token expiry in RFC 3339.
	pub const EXPIRES_AT: &str = "expires_at";
	/// Token entry holding the granted scopes, space-delimited.
	pub const GRANTED_SCOPES: &str = "granted_scopes";

	/// Reads item `key`.
	pub fn item(&self, key: &str) -> Option<&str> {
		self.items.get(key).map(String::as_str).filter(|value| !value.is_empty())
	}

	/// Writes item `key`.
	pub fn set_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.items.insert(key.into(), value.into());
	}

	/// Removes item `key`, returning whether it existed.
	pub fn remove_item(&mut self, key: &str) -> bool {
		self.items.remove(key).is_some()
	}

	/// Reads token entry `name`.
	pub fn token(&self, name: &str) -> Option<&str> {
		self.tokens.get(name).map(TokenSecret::expose).filter(|value| !value.is_empty())
	}

	/// Writes token entry `name`.
	pub fn set_token(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.tokens.insert(name.into(), TokenSecret::new(value));
	}

	/// Removes token entry `name`, returning whether it existed.
	pub fn remove_token(&mut self, name: &str) -> bool {
		self.tokens.remove(name).is_some()
	}

	/// Returns `true` when no token entries are held.
	pub fn has_tokens(&self) -> bool {
		!self.tokens.is_empty()
	}

	/// Session id item, if present and valid.
	pub fn session_id(&self) -> Option<SessionId> {
		self.item(Self::SESSION_ID).and_then(|raw| SessionId::new(raw).ok())
	}

	/// Writes the session id item.
	pub fn set_session_id(&mut self, session: &SessionId) {
		self.set_item(Self::SESSION_ID, session.as_ref());
	}

	/// Storage key item referencing the stored token of `kind`.
	pub fn storage_key(&self, kind: TokenKind) -> Option<StorageKey> {
		self.item(Self::storage_key_item(kind)).and_then(StorageKey::from_raw)
	}

	/// Writes the storage key item of `kind`.
	pub fn set_storage_key(&mut self, kind: TokenKind, key: &StorageKey) {
		self.set_item(Self::storage_key_item(kind), key.as_str());
	}

	/// Removes the storage key item of `kind`.
	pub fn remove_storage_key(&mut self, kind: TokenKind) -> bool {
		self.remove_item(Self::storage_key_item(kind))
	}

	/// Return URL item.
	pub fn return_url(&self) -> Option<&str> {
		self.item(Self::RETURN_URL)
	}

	/// Writes the return URL item.
	pub fn set_return_url(&mut self, url: impl Into<String>) {
		self.set_item(Self::RETURN_URL, url);
	}

	const fn storage_key_item(kind: TokenKind) -> &'static str {
		match kind {
			TokenKind::Access => Self::ACCESS_TOKEN_KEY,
			TokenKind::Refresh => Self::REFRESH_TOKEN_KEY,
		}
	}
}

/// Session write waiting for the response-start point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommit {
	/// Scheme to sign into.
	pub scheme: SchemeName,
	/// Identity to commit.
	pub identity: Identity,
	/// Properties committed with the identity.
	pub properties: PropertyBag,
}

/// Single-slot holder for the session write of one request.
///
/// Scheduling again replaces the pending write; [`DeferredCommit::execute`] runs it at most once.
#[derive(Debug, Default)]
pub struct DeferredCommit(Mutex<Option<PendingCommit>>);
impl DeferredCommit {
	/// Schedules `commit`, replacing any pending one.
	pub fn schedule(&self, commit: PendingCommit) {
		*self.0.lock() = Some(commit);
	}

	/// Returns `true` while a write is pending.
	pub fn is_scheduled(&self) -> bool {
		self.0.lock().is_some()
	}

	/// Drops the pending write without running it.
	pub fn cancel(&self) -> Option<PendingCommit> {
		self.0.lock().take()
	}

	/// Runs the pending write through `committer`, returning whether one ran.
	pub async fn execute(&self, committer: &dyn SessionCommitter) -> Result<bool, SessionError> {
		let Some(pending) = self.0.lock().take() else {
			return Ok(false);
		};

		committer.commit(&pending.scheme, pending.identity, pending.properties).await?;

		Ok(true)
	}
}
