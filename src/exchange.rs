//! Remote token exchange contract: refresh and revocation calls against the SSO provider.

pub mod client;

pub use client::*;

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenKind, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	handler::TokenFailureReason,
};

/// Boxed future returned by [`RemoteTokenExchange`] operations.
pub type ExchangeFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, ExchangeError>> + 'a + Send>>;

/// Client performing refresh and revocation calls.
///
/// Implementations never retry; timeouts and cancellation are theirs to enforce and must surface
/// as [`ExchangeError::Transport`].
pub trait RemoteTokenExchange
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new token set, optionally narrowing `scopes`.
	fn renew<'a>(
		&'a self,
		refresh_token: &'a str,
		scopes: Option<&'a ScopeSet>,
	) -> ExchangeFuture<'a, TokenExchangeResponse>;

	/// Revokes `token` at the provider, hinting its `kind`.
	fn revoke<'a>(&'a self, kind: TokenKind, token: &'a str) -> ExchangeFuture<'a, ()>;
}

/// Successful token endpoint response.
///
/// Every field is optional on the wire; the access-token handler decides which absences are
/// failures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenExchangeResponse {
	/// New access token.
	pub access_token: Option<TokenSecret>,
	/// Refresh token returned alongside, possibly rotated.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token in seconds.
	pub expires_in: Option<u64>,
	/// Token type, usually `Bearer`.
	pub token_type: Option<String>,
	/// Scopes reported by the provider.
	pub scope: Option<ScopeSet>,
}

/// Failures reported by a [`RemoteTokenExchange`].
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Provider answered with an OAuth error body.
	#[error("SSO provider returned `{error}`{}.", detail_suffix(description))]
	Provider {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, if supplied.
		description: Option<String>,
		/// HTTP status code.
		status: Option<u16>,
	},
	/// Provider response could not be interpreted.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failed before a response arrived.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Request could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl ExchangeError {
	/// Lifecycle reason reported when a renewal fails with this error.
	pub fn reason(&self) -> TokenFailureReason {
		match self {
			Self::Provider { .. } | Self::Transient(_) => TokenFailureReason::OAuthResponseFailed,
			Self::Transport(_) | Self::Config(_) => TokenFailureReason::TransportFailed,
		}
	}
}

fn detail_suffix(description: &Option<String>) -> String {
	description.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}
