//! Where a scheme's tokens live: embedded in the session or in an external [`TokenStore`].

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{
		AccessToken, Clock, RefreshToken, ScopeSet, SystemClock, TokenKind, TokenRecord,
		TokenRecordBuilder, TokenRecordBuilderError, TokenSecret,
	},
	handler::{AccessTokenStoreRequest, HandlerContext},
	session::PropertyBag,
	store::{RecordFilter, StoreError, TokenStore},
};

const ISSUED_AT: &str = "issued_at";
const EMBEDDED_TOKENS: [&str; 5] = [
	PropertyBag::ACCESS_TOKEN,
	PropertyBag::REFRESH_TOKEN,
	PropertyBag::EXPIRES_AT,
	PropertyBag::GRANTED_SCOPES,
	ISSUED_AT,
];

/// Boxed future returned by [`TokenStorage`] operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage strategy configured per scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
	/// Tokens live in the session property bag.
	#[default]
	Embedded,
	/// Tokens live in a [`TokenStore`]; the property bag carries their keys.
	External,
}
impl StorageStrategy {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Embedded => "embedded",
			Self::External => "external",
		}
	}
}
impl Display for StorageStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reads and writes the tokens of one [`HandlerContext`].
pub trait TokenStorage
where
	Self: Send + Sync,
{
	/// Strategy implemented.
	fn strategy(&self) -> StorageStrategy;

	/// Loads the access token, if stored.
	fn load_access<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<AccessToken>>;

	/// Loads the refresh token, if stored.
	fn load_refresh<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<RefreshToken>>;

	/// Persists the tokens of a sign-in.
	fn persist<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		request: &'a AccessTokenStoreRequest,
	) -> StorageFuture<'a, ()>;

	/// Replaces the access token.
	fn replace_access<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a AccessToken,
	) -> StorageFuture<'a, ()>;

	/// Replaces the refresh token.
	fn replace_refresh<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a RefreshToken,
	) -> StorageFuture<'a, ()>;

	/// Removes every stored token of the context, returning how many were removed.
	fn discard<'a>(&'a self, context: &'a mut HandlerContext) -> StorageFuture<'a, usize>;

	/// Returns `true` when writes only touch the property bag and need a session re-commit.
	fn requires_recommit(&self) -> bool {
		self.strategy() == StorageStrategy::Embedded
	}
}

/// Keeps tokens in the session property bag.
#[derive(Clone)]
pub struct EmbeddedStorage {
	clock: Arc<dyn Clock>,
}
impl EmbeddedStorage {
	/// Uses `clock` to date refresh tokens stored without an issue instant.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self { clock }
	}

	fn read_access(properties: &PropertyBag) -> Result<Option<AccessToken>, StoreError> {
		let Some(value) = properties.token(PropertyBag::ACCESS_TOKEN) else {
			return Ok(None);
		};
		let expires_at = parse_instant(properties.token(PropertyBag::EXPIRES_AT))?
			.ok_or_else(|| serialization("Embedded access token has no expiry"))?;
		let granted_scopes = properties
			.token(PropertyBag::GRANTED_SCOPES)
			.map(|raw| ScopeSet::lenient(raw.split_whitespace()))
			.unwrap_or_default();

		Ok(Some(AccessToken::new(value, expires_at, granted_scopes)))
	}

	fn read_refresh(&self, context: &HandlerContext) -> Result<Option<RefreshToken>, StoreError> {
		let Some(value) = context.properties.token(PropertyBag::REFRESH_TOKEN) else {
			return Ok(None);
		};
		let issued_at = parse_instant(context.properties.token(ISSUED_AT))?
			.unwrap_or_else(|| self.clock.now());

		Ok(Some(RefreshToken {
			value: TokenSecret::new(value),
			subject: context.subject.clone(),
			session: context.session.clone(),
			issued_at,
		}))
	}

	fn write_access(properties: &mut PropertyBag, token: &AccessToken) -> Result<(), StoreError> {
		properties.set_token(PropertyBag::ACCESS_TOKEN, token.value.expose());
		properties.set_token(PropertyBag::EXPIRES_AT, format_instant(token.expires_at)?);

		if token.granted_scopes.is_empty() {
			properties.remove_token(PropertyBag::GRANTED_SCOPES);
		} else {
			properties.set_token(PropertyBag::GRANTED_SCOPES, token.granted_scopes.normalized());
		}

		Ok(())
	}

	fn write_refresh(properties: &mut PropertyBag, token: &RefreshToken) -> Result<(), StoreError> {
		properties.set_token(PropertyBag::REFRESH_TOKEN, token.value.expose());
		properties.set_token(ISSUED_AT, format_instant(token.issued_at)?);

		Ok(())
	}
}
impl Default for EmbeddedStorage {
	fn default() -> Self {
		Self::new(Arc::new(SystemClock))
	}
}
impl Debug for EmbeddedStorage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EmbeddedStorage").finish_non_exhaustive()
	}
}
impl TokenStorage for EmbeddedStorage {
	fn strategy(&self) -> StorageStrategy {
		StorageStrategy::Embedded
	}

	fn load_access<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<AccessToken>> {
		Box::pin(async move { Self::read_access(&context.properties) })
	}

	fn load_refresh<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<RefreshToken>> {
		Box::pin(async move { self.read_refresh(context) })
	}

	fn persist<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		request: &'a AccessTokenStoreRequest,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let access = AccessToken {
				value: request.access_token.clone(),
				expires_at: request.expires_at,
				granted_scopes: request.granted_scopes.clone(),
			};
			let refresh = RefreshToken {
				value: request.refresh_token.clone(),
				subject: context.subject.clone(),
				session: context.session.clone(),
				issued_at: request.issued_at,
			};

			Self::write_access(&mut context.properties, &access)?;
			Self::write_refresh(&mut context.properties, &refresh)
		})
	}

	fn replace_access<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a AccessToken,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move { Self::write_access(&mut context.properties, token) })
	}

	fn replace_refresh<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a RefreshToken,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move { Self::write_refresh(&mut context.properties, token) })
	}

	fn discard<'a>(&'a self, context: &'a mut HandlerContext) -> StorageFuture<'a, usize> {
		Box::pin(async move {
			let removed = EMBEDDED_TOKENS
				.iter()
				.filter(|name| context.properties.remove_token(name))
				.count();

			Ok(removed)
		})
	}
}

/// Keeps tokens in a [`TokenStore`]; the property bag only references them by key.
#[derive(Clone)]
pub struct ExternalStorage {
	store: Arc<dyn TokenStore>,
}
impl ExternalStorage {
	/// Uses `store` for token records.
	pub fn new(store: Arc<dyn TokenStore>) -> Self {
		Self { store }
	}

	async fn load(
		&self,
		context: &HandlerContext,
		kind: TokenKind,
	) -> Result<Option<TokenRecord>, StoreError> {
		let Some(key) = context.properties.storage_key(kind) else {
			return Ok(None);
		};
		let record = self.store.get(&key).await?.filter(|record| {
			record.kind == kind
				&& record.subject == context.subject
				&& record.session == context.session
		});

		Ok(record)
	}

	async fn upsert(
		&self,
		context: &mut HandlerContext,
		record: TokenRecord,
	) -> Result<(), StoreError> {
		let kind = record.kind;

		if let Some(key) = context.properties.storage_key(kind) {
			match self.store.update(&key, record.clone()).await {
				Err(StoreError::NotFound) => {},
				other => return other,
			}
		}

		let key = self.store.store(record).await?;

		context.properties.set_storage_key(kind, &key);

		Ok(())
	}

	async fn insert(
		&self,
		context: &mut HandlerContext,
		record: TokenRecord,
	) -> Result<(), StoreError> {
		let kind = record.kind;
		let key = self.store.store(record).await?;

		context.properties.set_storage_key(kind, &key);

		Ok(())
	}

	/// Removes the referenced records and every other record of the context's subject and
	/// session.
	async fn clear(&self, context: &mut HandlerContext) -> Result<usize, StoreError> {
		let mut removed = 0;

		for kind in [TokenKind::Access, TokenKind::Refresh] {
			if let Some(key) = context.properties.storage_key(kind) {
				removed += usize::from(self.store.remove(&key).await?);
			}

			context.properties.remove_storage_key(kind);
		}

		let filter =
			RecordFilter::subject(context.subject.clone()).with_session(context.session.clone());

		removed += self.store.remove_by_filter(&filter).await?;

		Ok(removed)
	}
}
impl Debug for ExternalStorage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExternalStorage").finish_non_exhaustive()
	}
}
impl TokenStorage for ExternalStorage {
	fn strategy(&self) -> StorageStrategy {
		StorageStrategy::External
	}

	fn load_access<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<AccessToken>> {
		Box::pin(async move {
			let record = self.load(context, TokenKind::Access).await?;

			Ok(record.as_ref().and_then(TokenRecord::to_access_token))
		})
	}

	fn load_refresh<'a>(
		&'a self,
		context: &'a HandlerContext,
	) -> StorageFuture<'a, Option<RefreshToken>> {
		Box::pin(async move {
			let record = self.load(context, TokenKind::Refresh).await?;

			Ok(record.as_ref().and_then(TokenRecord::to_refresh_token))
		})
	}

	fn persist<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		request: &'a AccessTokenStoreRequest,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let access = access_record(context, &AccessToken {
				value: request.access_token.clone(),
				expires_at: request.expires_at,
				granted_scopes: request.granted_scopes.clone(),
			})
			.issued_at(request.issued_at)
			.build()
			.map_err(build_error)?;
			let refresh = TokenRecord::builder(
				TokenKind::Refresh,
				context.subject.clone(),
				context.session.clone(),
			)
			.value(request.refresh_token.expose())
			.issued_at(request.issued_at)
			.build()
			.map_err(build_error)?;

			// A re-sign-in into the same session supersedes its earlier records.
			self.clear(context).await?;
			self.insert(context, refresh).await?;
			self.insert(context, access).await
		})
	}

	fn replace_access<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a AccessToken,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let record = access_record(context, token).build().map_err(build_error)?;

			self.upsert(context, record).await
		})
	}

	fn replace_refresh<'a>(
		&'a self,
		context: &'a mut HandlerContext,
		token: &'a RefreshToken,
	) -> StorageFuture<'a, ()> {
		Box::pin(async move {
			let record = TokenRecord::builder(
				TokenKind::Refresh,
				context.subject.clone(),
				context.session.clone(),
			)
			.value(token.value.expose())
			.issued_at(token.issued_at)
			.build()
			.map_err(build_error)?;

			self.upsert(context, record).await
		})
	}

	fn discard<'a>(&'a self, context: &'a mut HandlerContext) -> StorageFuture<'a, usize> {
		Box::pin(async move { self.clear(context).await })
	}
}

fn access_record(context: &HandlerContext, token: &AccessToken) -> TokenRecordBuilder {
	TokenRecord::builder(TokenKind::Access, context.subject.clone(), context.session.clone())
		.value(token.value.expose())
		.granted_scopes(token.granted_scopes.clone())
		.expires_at(token.expires_at)
}

fn build_error(e: TokenRecordBuilderError) -> StoreError {
	StoreError::Serialization { message: e.to_string() }
}

fn serialization(message: &str) -> StoreError {
	StoreError::Serialization { message: message.into() }
}

fn parse_instant(raw: Option<&str>) -> Result<Option<OffsetDateTime>, StoreError> {
	raw.map(|raw| OffsetDateTime::parse(raw, &Rfc3339))
		.transpose()
		.map_err(|e| StoreError::Serialization { message: e.to_string() })
}

fn format_instant(instant: OffsetDateTime) -> Result<String, StoreError> {
	instant.format(&Rfc3339).map_err(|e| StoreError::Serialization { message: e.to_string() })
}
