//! Token store contract, opaque storage keys, and the in-memory store.

pub mod memory;

pub use memory::MemoryStore;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{SessionId, SubjectId, TokenKind, TokenRecord},
};

const KEY_SALT_LEN: usize = 16;

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value persistence for token records.
///
/// Keys are generated by the crate through [`StorageKey::generate`]; implementations must
/// treat them as opaque and apply last-write-wins when two requests of one session race.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the record stored under `key`.
	fn get<'a>(&'a self, key: &'a StorageKey) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Persists a new record and returns the key it was stored under.
	fn store(&self, record: TokenRecord) -> StoreFuture<'_, StorageKey>;

	/// Replaces the record stored under `key`.
	fn update<'a>(&'a self, key: &'a StorageKey, record: TokenRecord) -> StoreFuture<'a, ()>;

	/// Removes the record stored under `key`, returning whether one existed.
	fn remove<'a>(&'a self, key: &'a StorageKey) -> StoreFuture<'a, bool>;

	/// Removes every record matching `filter`, returning how many were removed.
	fn remove_by_filter<'a>(&'a self, filter: &'a RecordFilter) -> StoreFuture<'a, usize>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// No record exists under the key being updated.
	#[error("No token record is stored under the requested key.")]
	NotFound,
	/// A removal filter named neither a subject nor a session.
	#[error("Record filter must name a subject or a session.")]
	EmptyFilter,
}

/// Opaque key a token record is stored under.
///
/// Keys are salted digests, so neither the subject nor the session can be recovered from them
/// and two sign-ins of one subject never share a key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);
impl StorageKey {
	/// Derives a fresh key for a record of `kind` owned by `subject` and `session`.
	pub fn generate(kind: TokenKind, subject: &SubjectId, session: &SessionId) -> Self {
		let mut salt = [0_u8; KEY_SALT_LEN];

		rand::rng().fill_bytes(&mut salt);

		let mut hasher = Sha256::new();

		hasher.update(subject.as_bytes());
		hasher.update(b":");
		hasher.update(session.as_bytes());
		hasher.update(b":");
		hasher.update(kind.as_str().as_bytes());
		hasher.update(b":");
		hasher.update(salt);

		Self(URL_SAFE_NO_PAD.encode(hasher.finalize()))
	}

	/// Restores a key previously obtained from [`StorageKey::as_str`].
	pub fn from_raw(raw: impl Into<String>) -> Option<Self> {
		let raw = raw.into();

		if raw.is_empty() { None } else { Some(Self(raw)) }
	}

	/// Returns the key's string form.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for StorageKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "StorageKey({})", self.0)
	}
}
impl Display for StorageKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Selects records for bulk removal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordFilter {
	/// Restricts removal to one subject.
	pub subject: Option<SubjectId>,
	/// Restricts removal to one session.
	pub session: Option<SessionId>,
}
impl RecordFilter {
	/// Matches every record of `subject`.
	pub fn subject(subject: SubjectId) -> Self {
		Self { subject: Some(subject), session: None }
	}

	/// Matches every record of `session`.
	pub fn session(session: SessionId) -> Self {
		Self { subject: None, session: Some(session) }
	}

	/// Narrows the filter to `session`.
	pub fn with_session(mut self, session: SessionId) -> Self {
		self.session = Some(session);

		self
	}

	/// Rejects filters that would match every record.
	pub fn validate(&self) -> Result<(), StoreError> {
		if self.subject.is_none() && self.session.is_none() {
			return Err(StoreError::EmptyFilter);
		}

		Ok(())
	}

	/// Returns `true` when `record` satisfies every constraint of the filter.
	pub fn matches(&self, record: &TokenRecord) -> bool {
		self.subject.as_ref().is_none_or(|subject| *subject == record.subject)
			&& self.session.as_ref().is_none_or(|session| *session == record.session)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn owner() -> (SubjectId, SessionId) {
		(
			SubjectId::new("CHARACTER:EVE:90000001").expect("Subject fixture should be valid."),
			SessionId::new("session-abc").expect("Session fixture should be valid."),
		)
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("database unreachable"));

		let source =
			StdError::source(&err).expect("Crate error should expose the store error as source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn storage_keys_are_salted_and_opaque() {
		let (subject, session) = owner();
		let first = StorageKey::generate(TokenKind::Access, &subject, &session);
		let second = StorageKey::generate(TokenKind::Access, &subject, &session);

		assert_ne!(first, second);
		assert!(!first.as_str().contains(subject.as_ref()));
		assert!(!first.as_str().contains(session.as_ref()));
		assert_eq!(first.as_str().len(), 43);
	}

	#[test]
	fn empty_filter_is_rejected() {
		assert_eq!(RecordFilter::default().validate(), Err(StoreError::EmptyFilter));

		let (subject, session) = owner();

		assert!(RecordFilter::subject(subject).with_session(session).validate().is_ok());
	}
}
