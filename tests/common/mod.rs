//! Fixtures shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use time::{OffsetDateTime, macros};
// self
use oauth2_identity::{
	auth::{FixedClock, SchemeName, ScopeSet, SessionId, TokenKind, TokenSecret},
	claims::{Claim, types},
	error::TransportError,
	exchange::{ExchangeError, ExchangeFuture, RemoteTokenExchange, TokenExchangeResponse},
	handler::{DEFAULT_AUTHENTICATION_TYPE, HandlerServices, StorageStrategy},
	identity::Identity,
	provider::{
		DefaultHandlerFactory, HandlerRegistry, TokenHandlerConfiguration, TokenHandlerProvider,
	},
	session::{AuthTicket, MemorySessions, PropertyBag},
	store::TokenStore,
};

pub const LOCAL: &str = "sso.cookie";
pub const EXTERNAL: &str = "sso.external";
pub const NOW: OffsetDateTime = macros::datetime!(2025-01-01 12:00 UTC);

type Script = Vec<Result<TokenExchangeResponse, ExchangeError>>;

/// Exchange answering renewals from a script and recording every call.
#[derive(Default)]
pub struct ScriptedExchange {
	script: Mutex<Script>,
	renewals: Mutex<Vec<String>>,
	revocations: Mutex<Vec<(TokenKind, String)>>,
}
impl ScriptedExchange {
	pub fn new(script: Script) -> Arc<Self> {
		Arc::new(Self { script: Mutex::new(script), ..Default::default() })
	}

	/// Refresh tokens submitted for renewal, in call order.
	pub fn renewals(&self) -> Vec<String> {
		self.renewals.lock().clone()
	}

	/// Tokens submitted for revocation, in call order.
	pub fn revocations(&self) -> Vec<(TokenKind, String)> {
		self.revocations.lock().clone()
	}
}
impl RemoteTokenExchange for ScriptedExchange {
	fn renew<'a>(
		&'a self,
		refresh_token: &'a str,
		_scopes: Option<&'a ScopeSet>,
	) -> ExchangeFuture<'a, TokenExchangeResponse> {
		Box::pin(async move {
			self.renewals.lock().push(refresh_token.to_owned());

			let mut script = self.script.lock();

			if script.is_empty() {
				return Err(TransportError::Timeout.into());
			}

			script.remove(0)
		})
	}

	fn revoke<'a>(&'a self, kind: TokenKind, token: &'a str) -> ExchangeFuture<'a, ()> {
		Box::pin(async move {
			self.revocations.lock().push((kind, token.to_owned()));

			Ok(())
		})
	}
}

pub fn scheme(name: &str) -> SchemeName {
	SchemeName::new(name).expect("Scheme fixture should be valid.")
}

pub fn session_id(raw: &str) -> SessionId {
	SessionId::new(raw).expect("Session fixture should be valid.")
}

pub fn clock() -> Arc<FixedClock> {
	Arc::new(FixedClock::new(NOW))
}

pub fn scopes(values: &[&str]) -> ScopeSet {
	ScopeSet::new(values.iter().copied()).expect("Scope fixture should be valid.")
}

pub fn response(access: &str, refresh: &str, expires_in: u64) -> TokenExchangeResponse {
	TokenExchangeResponse {
		access_token: Some(TokenSecret::new(access)),
		refresh_token: Some(TokenSecret::new(refresh)),
		expires_in: Some(expires_in),
		token_type: Some("Bearer".into()),
		scope: None,
	}
}

/// Compact JWT around `payload` with a placeholder signature.
pub fn jwt(payload: serde_json::Value) -> String {
	let payload = URL_SAFE_NO_PAD.encode(payload.to_string());

	format!("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{payload}.c2ln")
}

/// SSO identity of the provider-prefixed `subject`.
pub fn sso_identity(subject: &str) -> Identity {
	Identity::new(DEFAULT_AUTHENTICATION_TYPE).with_claims([
		Claim::new(types::SUBJECT, format!("CHARACTER:EVE:{subject}")),
		Claim::new(types::NAME, "Pilot"),
	])
}

/// Local ticket of `subject` carrying embedded tokens.
pub fn embedded_ticket(
	subject: &str,
	access: &str,
	refresh: &str,
	expires_at: &str,
) -> AuthTicket {
	let mut properties = PropertyBag::default();

	properties.set_session_id(&session_id("session-1"));
	properties.set_token(PropertyBag::ACCESS_TOKEN, access);
	properties.set_token(PropertyBag::REFRESH_TOKEN, refresh);
	properties.set_token(PropertyBag::EXPIRES_AT, expires_at);
	properties.set_token(PropertyBag::GRANTED_SCOPES, "publicData");

	AuthTicket::new(sso_identity(subject), properties)
}

/// Registry holding both handlers of the local scheme.
pub fn registry(storage: StorageStrategy) -> Arc<HandlerRegistry> {
	let configurations = [TokenKind::Access, TokenKind::Refresh]
		.map(|kind| TokenHandlerConfiguration::new(scheme(LOCAL), kind, storage));

	Arc::new(HandlerRegistry::new(configurations).expect("Registry fixture should build."))
}

pub fn services(exchange: Arc<ScriptedExchange>, clock: Arc<FixedClock>) -> HandlerServices {
	HandlerServices::new(exchange).with_clock(clock)
}

/// Request-scoped provider over `sessions`, optionally backed by an external `store`.
pub fn provider(
	sessions: &MemorySessions,
	services: HandlerServices,
	store: Option<Arc<dyn TokenStore>>,
) -> Arc<TokenHandlerProvider> {
	let storage =
		if store.is_some() { StorageStrategy::External } else { StorageStrategy::Embedded };
	let mut factory = DefaultHandlerFactory::new(services);

	if let Some(store) = store {
		factory = factory.with_store(store);
	}

	Arc::new(TokenHandlerProvider::new(
		registry(storage),
		Arc::new(factory),
		Arc::new(sessions.clone()),
	))
}
