//! Crate-level error types shared by handlers, stores, and the sign-in orchestrator.

// self
use crate::{_prelude::*, auth::TokenKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Token lifecycle failures are not represented here; they travel as
/// [`TokenFailure`](crate::handler::TokenFailure) values so callers can branch on the reason.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Host session primitive failed.
	#[error(transparent)]
	Session(#[from] crate::session::SessionError),
	/// Claims pipeline aborted.
	#[error(transparent)]
	Claims(#[from] crate::claims::ClaimsError),
}

/// Structural configuration failures; these surface at setup rather than per request.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// OAuth client rejected its endpoint configuration.
	#[error(transparent)]
	OAuthClient(#[from] oauth2::ConfigurationError),
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint uses plain HTTP against a non-loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Offending URL.
		url: String,
	},
	/// Revocation was requested but no revocation endpoint is configured.
	#[error("No revocation endpoint is configured.")]
	MissingRevocationEndpoint,
	/// Two configurations target the same scheme and token kind.
	#[error("Scheme `{scheme}` already registers a handler for {kind} tokens.")]
	DuplicateHandler {
		/// Scheme name.
		scheme: String,
		/// Token kind.
		kind: TokenKind,
	},
	/// No configuration exists for the requested scheme and token kind.
	#[error("No {kind} token handler is registered for scheme `{scheme}`.")]
	HandlerNotRegistered {
		/// Scheme name.
		scheme: String,
		/// Token kind.
		kind: TokenKind,
	},
	/// An access handler was registered without the refresh handler it renews through.
	#[error("Scheme `{scheme}` registers an access token handler without a refresh token handler.")]
	MissingRefreshHandler {
		/// Scheme name.
		scheme: String,
	},
	/// Access and refresh handlers of one scheme disagree on where tokens live.
	#[error("Token handlers of scheme `{scheme}` use different storage strategies.")]
	MixedStorageStrategies {
		/// Scheme name.
		scheme: String,
	},
	/// External storage was configured without a token store.
	#[error("Scheme `{scheme}` uses external storage but no token store is configured.")]
	MissingTokenStore {
		/// Scheme name.
		scheme: String,
	},
	/// Identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary upstream failures.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("SSO endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with JSON that could not be parsed.
	#[error("SSO endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the SSO endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request timed out.
	#[error("Request to the SSO endpoint timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the SSO endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
