//! HTTP implementation of [`RemoteTokenExchange`] against the SSO token and revocation endpoints.

// crates.io
use oauth2::{
	ClientId, ClientSecret, EndpointMaybeSet, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, RevocationUrl, Scope, StandardErrorResponse,
	StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicTokenResponse},
};
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenKind, TokenSecret},
	error::{ConfigError, TransientError},
	exchange::{ExchangeError, ExchangeFuture, RemoteTokenExchange, TokenExchangeResponse},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

type SsoClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointMaybeSet, EndpointSet>;

/// Validated SSO endpoints.
///
/// The token endpoint must use HTTPS unless it points at a loopback host, so local test servers
/// keep working. The revocation endpoint always requires HTTPS (RFC 7009 §2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoEndpoints {
	/// Token endpoint used for refresh grants.
	pub token: Url,
	/// Revocation endpoint (RFC 7009).
	pub revocation: Option<Url>,
}
impl SsoEndpoints {
	/// Validates the token endpoint.
	pub fn new(token: Url) -> Result<Self, ConfigError> {
		Ok(Self { token: ensure_secure("token", token)?, revocation: None })
	}

	/// Parses and validates both endpoints from strings.
	pub fn parse(token: &str, revocation: Option<&str>) -> Result<Self, ConfigError> {
		let token = Url::parse(token)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let endpoints = Self::new(token)?;

		match revocation {
			Some(raw) => endpoints.with_revocation(
				Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
					endpoint: "revocation",
					source,
				})?,
			),
			None => Ok(endpoints),
		}
	}

	/// Adds a validated revocation endpoint.
	pub fn with_revocation(mut self, revocation: Url) -> Result<Self, ConfigError> {
		self.revocation = Some(ensure_https("revocation", revocation)?);

		Ok(self)
	}

	/// Re-runs endpoint validation, e.g. after deserializing from configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		ensure_secure("token", self.token.clone())?;

		if let Some(revocation) = &self.revocation {
			ensure_https("revocation", revocation.clone())?;
		}

		Ok(())
	}
}

/// Confidential client credentials, sent with HTTP Basic authentication.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates credentials from an id and secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}
}

/// [`RemoteTokenExchange`] driving the `oauth2` client over a [`TokenHttpClient`].
pub struct HttpTokenExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoints: SsoEndpoints,
	oauth_client: SsoClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> HttpTokenExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an exchange client for `endpoints` using the provided transport.
	pub fn new(
		endpoints: SsoEndpoints,
		credentials: ClientCredentials,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let oauth_client = BasicClient::new(ClientId::new(credentials.client_id))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_token_uri(TokenUrl::from_url(endpoints.token.clone()))
			.set_revocation_url_option(endpoints.revocation.clone().map(RevocationUrl::from_url));

		Self {
			endpoints,
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	/// Configured endpoints.
	pub fn endpoints(&self) -> &SsoEndpoints {
		&self.endpoints
	}

	async fn exchange_refresh_token(
		&self,
		refresh_token: &str,
		scopes: Option<&ScopeSet>,
	) -> Result<BasicTokenResponse, ExchangeError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

		if let Some(scopes) = scopes {
			for scope in scopes.iter() {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}
		}

		request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))
	}

	async fn revoke_token(&self, kind: TokenKind, token: &str) -> Result<(), ExchangeError> {
		if self.endpoints.revocation.is_none() {
			return Err(ConfigError::MissingRevocationEndpoint.into());
		}

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let token = match kind {
			TokenKind::Access =>
				StandardRevocableToken::AccessToken(oauth2::AccessToken::new(token.to_owned())),
			TokenKind::Refresh =>
				StandardRevocableToken::RefreshToken(RefreshToken::new(token.to_owned())),
		};

		self.oauth_client
			.revoke_token(token)
			.map_err(ConfigError::from)?
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))
	}
}
#[cfg(feature = "reqwest")]
impl HttpTokenExchange<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an exchange client backed by the default reqwest transport.
	pub fn reqwest(endpoints: SsoEndpoints, credentials: ClientCredentials) -> Self {
		Self::new(
			endpoints,
			credentials,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> RemoteTokenExchange for HttpTokenExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn renew<'a>(
		&'a self,
		refresh_token: &'a str,
		scopes: Option<&'a ScopeSet>,
	) -> ExchangeFuture<'a, TokenExchangeResponse> {
		let span = FlowSpan::new(FlowKind::Renewal, "exchange_renew");

		Box::pin(span.instrument(async move {
			let response = self.exchange_refresh_token(refresh_token, scopes).await?;

			Ok(map_token_response(&response))
		}))
	}

	fn revoke<'a>(&'a self, kind: TokenKind, token: &'a str) -> ExchangeFuture<'a, ()> {
		let span = FlowSpan::new(FlowKind::Revocation, "exchange_revoke");

		Box::pin(span.instrument(async move {
			obs::record_flow_outcome(FlowKind::Revocation, FlowOutcome::Attempt);

			let result = self.revoke_token(kind, token).await;
			let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

			obs::record_flow_outcome(FlowKind::Revocation, outcome);

			result
		}))
	}
}

fn map_token_response(response: &BasicTokenResponse) -> TokenExchangeResponse {
	fn present(value: &str) -> Option<&str> {
		Some(value).filter(|v| !v.trim().is_empty())
	}

	TokenExchangeResponse {
		access_token: present(response.access_token().secret()).map(TokenSecret::new),
		refresh_token: response
			.refresh_token()
			.and_then(|token| present(token.secret()))
			.map(TokenSecret::new),
		expires_in: response.expires_in().map(|lifetime| lifetime.as_secs()),
		token_type: present(response.token_type().as_ref()).map(str::to_owned),
		scope: response
			.scopes()
			.map(|scopes| ScopeSet::lenient(scopes.iter().map(|scope| scope.as_str()))),
	}
}

fn map_request_error<E, T, M>(
	meta: Option<ResponseMetadata>,
	err: RequestTokenError<HttpClientError<E>, StandardErrorResponse<T>>,
	mapper: &M,
) -> ExchangeError
where
	E: 'static + Send + Sync + StdError,
	T: oauth2::ErrorResponseType + AsRef<str> + std::fmt::Display,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|m| m.status);

	match err {
		RequestTokenError::ServerResponse(response) => ExchangeError::Provider {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().filter(|d| !d.is_empty()).cloned(),
			status,
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(meta.as_ref(), error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::ResponseParse { source, status }.into(),
		RequestTokenError::Other(message) => TransientError::Endpoint {
			message,
			status,
			retry_after: meta.as_ref().and_then(|m| m.retry_after),
		}
		.into(),
	}
}

fn ensure_secure(endpoint: &'static str, url: Url) -> Result<Url, ConfigError> {
	let loopback = match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	match url.scheme() {
		"https" => Ok(url),
		"http" if loopback => Ok(url),
		_ => Err(ConfigError::InsecureEndpoint { endpoint, url: url.to_string() }),
	}
}

fn ensure_https(endpoint: &'static str, url: Url) -> Result<Url, ConfigError> {
	match url.scheme() {
		"https" => Ok(url),
		_ => Err(ConfigError::InsecureEndpoint { endpoint, url: url.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoints_require_https_outside_loopback() {
		assert!(SsoEndpoints::parse("https://login.example.com/v2/oauth/token", None).is_ok());
		assert!(SsoEndpoints::parse("http://127.0.0.1:8080/token", None).is_ok());
		assert!(matches!(
			SsoEndpoints::parse("http://login.example.com/token", None),
			Err(ConfigError::InsecureEndpoint { endpoint: "token", .. })
		));
		assert!(matches!(
			SsoEndpoints::parse("https://login.example.com/token", Some("not a url")),
			Err(ConfigError::InvalidEndpoint { endpoint: "revocation", .. })
		));
		assert!(matches!(
			SsoEndpoints::parse("http://127.0.0.1/token", Some("http://127.0.0.1/revoke")),
			Err(ConfigError::InsecureEndpoint { endpoint: "revocation", .. })
		));
	}

	#[test]
	fn blank_fields_count_as_missing() {
		let response: BasicTokenResponse = serde_json::from_str(
			r#"{"access_token":"a","refresh_token":"","expires_in":1199,"token_type":"Bearer"}"#,
		)
		.expect("Token body fixture should parse.");
		let response = map_token_response(&response);

		assert!(response.access_token.is_some_and(|token| token.matches("a")));
		assert!(response.refresh_token.is_none());
		assert_eq!(response.expires_in, Some(1199));
		assert!(response.token_type.is_some_and(|kind| kind.eq_ignore_ascii_case("bearer")));
		assert!(response.scope.is_none());
	}
}
