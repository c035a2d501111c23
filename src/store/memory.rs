//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	store::{RecordFilter, StorageKey, StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<StorageKey, TokenRecord>>>;

/// Storage backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of records currently held.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the store holds no records.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Snapshot of every record, for inspection in tests.
	pub fn records(&self) -> Vec<TokenRecord> {
		self.0.read().values().cloned().collect()
	}

	fn store_now(map: &StoreMap, record: TokenRecord) -> StorageKey {
		let key = StorageKey::generate(record.kind, &record.subject, &record.session);

		map.write().insert(key.clone(), record);

		key
	}

	fn update_now(map: &StoreMap, key: &StorageKey, record: TokenRecord) -> Result<(), StoreError> {
		match map.write().get_mut(key) {
			Some(slot) => {
				*slot = record;

				Ok(())
			},
			None => Err(StoreError::NotFound),
		}
	}

	fn remove_by_filter_now(map: &StoreMap, filter: &RecordFilter) -> Result<usize, StoreError> {
		filter.validate()?;

		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, record| !filter.matches(record));

		Ok(before - guard.len())
	}
}
impl TokenStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a StorageKey) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.0.read().get(key).cloned()) })
	}

	fn store(&self, record: TokenRecord) -> StoreFuture<'_, StorageKey> {
		Box::pin(async move { Ok(Self::store_now(&self.0, record)) })
	}

	fn update<'a>(&'a self, key: &'a StorageKey, record: TokenRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move { Self::update_now(&self.0, key, record) })
	}

	fn remove<'a>(&'a self, key: &'a StorageKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.0.write().remove(key).is_some()) })
	}

	fn remove_by_filter<'a>(&'a self, filter: &'a RecordFilter) -> StoreFuture<'a, usize> {
		Box::pin(async move { Self::remove_by_filter_now(&self.0, filter) })
	}
}
