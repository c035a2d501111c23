//! Handler registration and the per-request handler cache.
//!
//! [`HandlerRegistry`] validates [`TokenHandlerConfiguration`]s once at setup. A
//! [`TokenHandlerProvider`] is created per request: the first lookup of a scheme authenticates it
//! and caches the scheme's handlers, later lookups reuse them.

// self
use crate::{
	_prelude::*,
	auth::{SchemeName, TokenKind},
	error::ConfigError,
	handler::{
		AccessTokenHandler, EmbeddedStorage, ExternalStorage, HandlerServices, RefreshTokenHandler,
		SchemeSession, StorageStrategy, TicketPolicy, TokenStorage,
	},
	obs::warn_event,
	session::{SchemeAuthenticator, SessionCommitter},
	store::TokenStore,
};

/// Declares a handler for one scheme and token kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHandlerConfiguration {
	/// Host scheme the handler serves.
	pub scheme: SchemeName,
	/// Token kind handled.
	pub kind: TokenKind,
	/// Where tokens live.
	#[serde(default)]
	pub storage: StorageStrategy,
}
impl TokenHandlerConfiguration {
	/// Creates a configuration.
	pub fn new(scheme: SchemeName, kind: TokenKind, storage: StorageStrategy) -> Self {
		Self { scheme, kind, storage }
	}
}

/// Validated set of handler configurations, unique per scheme and kind.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
	entries: HashMap<(SchemeName, TokenKind), TokenHandlerConfiguration>,
}
impl HandlerRegistry {
	/// Builds the registry, rejecting duplicates, orphan access handlers, and schemes whose
	/// handlers disagree on the storage strategy.
	pub fn new<I>(configurations: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = TokenHandlerConfiguration>,
	{
		let mut entries = HashMap::new();

		for configuration in configurations {
			let key = (configuration.scheme.clone(), configuration.kind);

			if entries.contains_key(&key) {
				return Err(ConfigError::DuplicateHandler {
					scheme: configuration.scheme.to_string(),
					kind: configuration.kind,
				});
			}

			entries.insert(key, configuration);
		}

		for ((scheme, kind), configuration) in &entries {
			if *kind != TokenKind::Access {
				continue;
			}

			let Some(refresh) = entries.get(&(scheme.clone(), TokenKind::Refresh)) else {
				return Err(ConfigError::MissingRefreshHandler { scheme: scheme.to_string() });
			};

			if refresh.storage != configuration.storage {
				return Err(ConfigError::MixedStorageStrategies { scheme: scheme.to_string() });
			}
		}

		Ok(Self { entries })
	}

	/// Configuration registered for `scheme` and `kind`.
	pub fn get(&self, scheme: &SchemeName, kind: TokenKind) -> Option<&TokenHandlerConfiguration> {
		self.entries.get(&(scheme.clone(), kind))
	}

	/// Number of registered configurations.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn require(
		&self,
		scheme: &SchemeName,
		kind: TokenKind,
	) -> Result<&TokenHandlerConfiguration, ConfigError> {
		self.get(scheme, kind).ok_or_else(|| ConfigError::HandlerNotRegistered {
			scheme: scheme.to_string(),
			kind,
		})
	}
}

/// Builds handlers from configurations.
pub trait HandlerFactory
where
	Self: Send + Sync,
{
	/// Policy deciding which tickets authenticate a handler.
	fn ticket_policy(&self) -> &TicketPolicy;

	/// Builds the refresh handler of `configuration` over `session`.
	fn refresh_handler(
		&self,
		configuration: &TokenHandlerConfiguration,
		session: Arc<SchemeSession>,
	) -> Result<RefreshTokenHandler, ConfigError>;

	/// Builds the access handler of `configuration`, renewing through `refresh`.
	fn access_handler(
		&self,
		_configuration: &TokenHandlerConfiguration,
		refresh: RefreshTokenHandler,
	) -> Result<AccessTokenHandler, ConfigError> {
		Ok(AccessTokenHandler::new(refresh))
	}
}

/// Factory wiring the shared [`HandlerServices`] and, for external storage, a [`TokenStore`].
#[derive(Clone)]
pub struct DefaultHandlerFactory {
	services: Arc<HandlerServices>,
	store: Option<Arc<dyn TokenStore>>,
	policy: TicketPolicy,
}
impl DefaultHandlerFactory {
	/// Creates a factory for embedded storage only.
	pub fn new(services: HandlerServices) -> Self {
		Self { services: Arc::new(services), store: None, policy: TicketPolicy::default() }
	}

	/// Enables external storage through `store`.
	pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the ticket policy.
	pub fn with_policy(mut self, policy: TicketPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Services shared by every handler built.
	pub fn services(&self) -> &Arc<HandlerServices> {
		&self.services
	}
}
impl Debug for DefaultHandlerFactory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DefaultHandlerFactory")
			.field("services", &self.services)
			.field("has_store", &self.store.is_some())
			.field("policy", &self.policy)
			.finish()
	}
}
impl HandlerFactory for DefaultHandlerFactory {
	fn ticket_policy(&self) -> &TicketPolicy {
		&self.policy
	}

	fn refresh_handler(
		&self,
		configuration: &TokenHandlerConfiguration,
		session: Arc<SchemeSession>,
	) -> Result<RefreshTokenHandler, ConfigError> {
		let storage: Arc<dyn TokenStorage> = match configuration.storage {
			StorageStrategy::Embedded =>
				Arc::new(EmbeddedStorage::new(self.services.clock.clone())),
			StorageStrategy::External => {
				let store = self.store.clone().ok_or_else(|| ConfigError::MissingTokenStore {
					scheme: configuration.scheme.to_string(),
				})?;

				Arc::new(ExternalStorage::new(store))
			},
		};

		Ok(RefreshTokenHandler::new(session, storage, self.services.clone()))
	}
}

/// Whether a lookup authenticates the scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandlerInit {
	/// Authenticate the scheme once per request and cache the handler.
	#[default]
	Initialize,
	/// Return a fresh, unauthenticated, uncached handler; callers attach a ticket themselves.
	Deferred,
}

#[derive(Debug)]
struct SchemeEntry {
	session: Arc<SchemeSession>,
	refresh: RefreshTokenHandler,
	access: Option<AccessTokenHandler>,
}

/// Request-scoped handler cache.
pub struct TokenHandlerProvider {
	registry: Arc<HandlerRegistry>,
	factory: Arc<dyn HandlerFactory>,
	authenticator: Arc<dyn SchemeAuthenticator>,
	cache: AsyncMutex<HashMap<SchemeName, SchemeEntry>>,
}
impl TokenHandlerProvider {
	/// Creates an empty cache for one request.
	pub fn new(
		registry: Arc<HandlerRegistry>,
		factory: Arc<dyn HandlerFactory>,
		authenticator: Arc<dyn SchemeAuthenticator>,
	) -> Self {
		Self { registry, factory, authenticator, cache: AsyncMutex::new(HashMap::new()) }
	}

	/// Authenticator used for scheme lookups.
	pub fn authenticator(&self) -> &Arc<dyn SchemeAuthenticator> {
		&self.authenticator
	}

	/// Registry the provider resolves configurations from.
	pub fn registry(&self) -> &HandlerRegistry {
		&self.registry
	}

	/// Returns the access token handler of `scheme`.
	pub async fn access_handler(
		&self,
		scheme: &SchemeName,
		init: HandlerInit,
	) -> Result<AccessTokenHandler> {
		let configuration = self.registry.require(scheme, TokenKind::Access)?;

		if init == HandlerInit::Deferred {
			let refresh = self.deferred_refresh(scheme)?;

			return Ok(self.factory.access_handler(configuration, refresh)?);
		}

		let mut cache = self.cache.lock().await;
		let entry = self.entry(&mut cache, scheme).await?;

		if let Some(access) = &entry.access {
			return Ok(access.clone());
		}

		let access = self.factory.access_handler(configuration, entry.refresh.clone())?;

		entry.access = Some(access.clone());

		Ok(access)
	}

	/// Returns the refresh token handler of `scheme`.
	pub async fn refresh_handler(
		&self,
		scheme: &SchemeName,
		init: HandlerInit,
	) -> Result<RefreshTokenHandler> {
		if init == HandlerInit::Deferred {
			return self.deferred_refresh(scheme);
		}

		let mut cache = self.cache.lock().await;
		let entry = self.entry(&mut cache, scheme).await?;

		Ok(entry.refresh.clone())
	}

	/// Re-commits every cached scheme whose embedded tokens changed, returning how many were
	/// committed.
	pub async fn finish_response(&self, committer: &dyn SessionCommitter) -> Result<usize> {
		let sessions = self
			.cache
			.lock()
			.await
			.values()
			.map(|entry| entry.session.clone())
			.collect::<Vec<_>>();
		let mut committed = 0;

		for session in sessions {
			if session.finish_response(self.authenticator.as_ref(), committer).await? {
				committed += 1;
			}
		}

		Ok(committed)
	}

	fn deferred_refresh(&self, scheme: &SchemeName) -> Result<RefreshTokenHandler> {
		let configuration = self.registry.require(scheme, TokenKind::Refresh)?;
		let session =
			Arc::new(SchemeSession::new(scheme.clone(), self.factory.ticket_policy().clone()));

		Ok(self.factory.refresh_handler(configuration, session)?)
	}

	async fn entry<'a>(
		&self,
		cache: &'a mut HashMap<SchemeName, SchemeEntry>,
		scheme: &SchemeName,
	) -> Result<&'a mut SchemeEntry> {
		if !cache.contains_key(scheme) {
			let configuration = self.registry.require(scheme, TokenKind::Refresh)?;
			let session =
				Arc::new(SchemeSession::new(scheme.clone(), self.factory.ticket_policy().clone()));
			let refresh = self.factory.refresh_handler(configuration, session.clone())?;
			let ticket = self.authenticator.authenticate(scheme).await?;

			if !session.attach(ticket).await {
				warn_event!(scheme = %scheme, "Scheme is not authenticated with an SSO identity.");
			}

			cache.insert(scheme.clone(), SchemeEntry { session, refresh, access: None });
		}

		cache.get_mut(scheme).ok_or_else(|| {
			Error::from(ConfigError::HandlerNotRegistered {
				scheme: scheme.to_string(),
				kind: TokenKind::Refresh,
			})
		})
	}
}
impl Debug for TokenHandlerProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenHandlerProvider")
			.field("registry", &self.registry)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn scheme(name: &str) -> SchemeName {
		SchemeName::new(name).expect("Scheme fixture should be valid.")
	}

	fn configuration(name: &str, kind: TokenKind) -> TokenHandlerConfiguration {
		TokenHandlerConfiguration::new(scheme(name), kind, StorageStrategy::Embedded)
	}

	#[test]
	fn registry_rejects_duplicates() {
		let err = HandlerRegistry::new([
			configuration("sso.cookie", TokenKind::Refresh),
			configuration("sso.cookie", TokenKind::Refresh),
		])
		.expect_err("Duplicate registration should be rejected.");

		assert!(matches!(err, ConfigError::DuplicateHandler { kind: TokenKind::Refresh, .. }));
	}

	#[test]
	fn registry_requires_refresh_handler_with_matching_storage() {
		let err = HandlerRegistry::new([configuration("sso.cookie", TokenKind::Access)])
			.expect_err("Access without refresh should be rejected.");

		assert!(matches!(err, ConfigError::MissingRefreshHandler { .. }));

		let err = HandlerRegistry::new([
			configuration("sso.cookie", TokenKind::Access),
			TokenHandlerConfiguration::new(
				scheme("sso.cookie"),
				TokenKind::Refresh,
				StorageStrategy::External,
			),
		])
		.expect_err("Mixed strategies should be rejected.");

		assert!(matches!(err, ConfigError::MixedStorageStrategies { .. }));

		let registry = HandlerRegistry::new([
			configuration("sso.cookie", TokenKind::Access),
			configuration("sso.cookie", TokenKind::Refresh),
			configuration("sso.api", TokenKind::Refresh),
		])
		.expect("Valid configurations should register.");

		assert_eq!(registry.len(), 3);
		assert!(registry.get(&scheme("sso.api"), TokenKind::Access).is_none());
	}
}
