// crates.io
use time::{Duration, macros};
// self
use oauth2_identity::{
	auth::{ScopeSet, SessionId, SubjectId, TokenKind, TokenRecord},
	store::{MemoryStore, RecordFilter, StorageKey, StoreError, TokenStore},
};

fn owner(subject: &str, session: &str) -> (SubjectId, SessionId) {
	(
		SubjectId::new(subject).expect("Subject fixture should be valid."),
		SessionId::new(session).expect("Session fixture should be valid."),
	)
}

fn record(kind: TokenKind, subject: &str, session: &str, value: &str) -> TokenRecord {
	let (subject, session) = owner(subject, session);
	let issued = macros::datetime!(2025-01-01 12:00 UTC);
	let builder = TokenRecord::builder(kind, subject, session)
		.value(value)
		.granted_scopes(ScopeSet::new(["publicData"]).expect("Scope fixture should be valid."))
		.issued_at(issued);
	let builder = match kind {
		TokenKind::Access => builder.expires_in(Duration::minutes(20)),
		TokenKind::Refresh => builder,
	};

	builder.build().expect("Token record fixture should build successfully.")
}

#[tokio::test]
async fn store_get_update_remove_round_trip() {
	let store = MemoryStore::default();
	let key = store
		.store(record(TokenKind::Access, "2112", "session-1", "access-1"))
		.await
		.expect("Store should accept the record.");
	let fetched = store
		.get(&key)
		.await
		.expect("Lookup should succeed.")
		.expect("Stored record should be present.");

	assert!(fetched.value.matches("access-1"));
	assert_eq!(fetched.expires_at, Some(macros::datetime!(2025-01-01 12:20 UTC)));

	store
		.update(&key, record(TokenKind::Access, "2112", "session-1", "access-2"))
		.await
		.expect("Update of an existing key should succeed.");

	let updated = store.get(&key).await.expect("Lookup should succeed.");

	assert!(updated.is_some_and(|record| record.value.matches("access-2")));
	assert!(store.remove(&key).await.expect("Removal should succeed."));
	assert!(!store.remove(&key).await.expect("Second removal should succeed."));
	assert!(store.get(&key).await.expect("Lookup should succeed.").is_none());
}

#[tokio::test]
async fn update_of_unknown_key_is_not_found() {
	let store = MemoryStore::default();
	let key = StorageKey::from_raw("missing").expect("Key is non-empty.");
	let err = store
		.update(&key, record(TokenKind::Refresh, "2112", "session-1", "refresh-1"))
		.await
		.expect_err("Unknown keys cannot be updated.");

	assert_eq!(err, StoreError::NotFound);
	assert!(store.is_empty(), "A failed update must not insert.");
}

#[tokio::test]
async fn keys_are_opaque_and_unique_per_store() {
	let store = MemoryStore::default();
	let first = store
		.store(record(TokenKind::Refresh, "2112", "session-1", "refresh-1"))
		.await
		.expect("Store should accept the record.");
	let second = store
		.store(record(TokenKind::Refresh, "2112", "session-1", "refresh-1"))
		.await
		.expect("Store should accept the record.");

	assert_ne!(first, second);
	assert!(!first.as_str().contains("2112"));
	assert!(!first.as_str().contains("session-1"));
	assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn remove_by_filter_targets_subject_and_session() {
	let store = MemoryStore::default();

	for (kind, subject, session) in [
		(TokenKind::Access, "2112", "session-1"),
		(TokenKind::Refresh, "2112", "session-1"),
		(TokenKind::Refresh, "2112", "session-2"),
		(TokenKind::Refresh, "9001", "session-3"),
	] {
		store
			.store(record(kind, subject, session, "value"))
			.await
			.expect("Store should accept the record.");
	}

	let (subject, session) = owner("2112", "session-1");
	let err = store
		.remove_by_filter(&RecordFilter::default())
		.await
		.expect_err("Empty filters are rejected.");

	assert_eq!(err, StoreError::EmptyFilter);
	assert_eq!(store.len(), 4);

	let removed = store
		.remove_by_filter(&RecordFilter::subject(subject.clone()).with_session(session))
		.await
		.expect("Filtered removal should succeed.");

	assert_eq!(removed, 2);

	let removed = store
		.remove_by_filter(&RecordFilter::subject(subject))
		.await
		.expect("Filtered removal should succeed.");

	assert_eq!(removed, 1);
	assert_eq!(store.records().len(), 1);
	assert_eq!(store.records()[0].subject.as_ref(), "9001");
}
