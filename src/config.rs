//! Deserializable options and the constructors deriving runtime components from them.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_SUBJECT_PREFIX, ExpiryPolicy, SchemeName, ScopeSet, TokenKind},
	claims::{EnrichmentToggles, IssuerClaimToggles},
	error::ConfigError,
	exchange::SsoEndpoints,
	handler::{DEFAULT_AUTHENTICATION_TYPE, StorageStrategy, TicketPolicy},
	identity::{IdentityMode, IdentityResolver, UserAccessor},
	provider::{HandlerRegistry, TokenHandlerConfiguration},
	signin::SignInSettings,
};

/// Identity and token lifecycle options.
///
/// Every field has a default, so an empty document deserializes into a working embedded-storage
/// setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityOptions {
	/// Scheme the local session lives in.
	pub local_scheme: String,
	/// Scheme holding the external authorization result.
	pub external_scheme: String,
	/// How identities of multiple schemes are resolved.
	pub identity_mode: IdentityMode,
	/// Seconds before expiry at which access tokens are renewed.
	pub renewal_margin_secs: u64,
	/// Scopes requested on renewal; empty keeps the granted ones.
	pub scopes: Vec<String>,
	/// Redirect target after a failed sign-in.
	pub failure_path: Option<String>,
	/// Authentication type of SSO identities.
	pub authentication_type: String,
	/// Provider prefix stripped from subjects.
	pub subject_prefix: String,
	/// Issuer of claims added by the crate.
	pub claims_issuer: String,
	/// Optional provider claims copied into the identity.
	pub issuer_claims: IssuerClaimToggles,
	/// Profile claims added on sign-in.
	pub enrichment: EnrichmentToggles,
	/// Where the local scheme keeps its tokens.
	pub token_storage: StorageStrategy,
	/// SSO endpoints used for renewal and revocation.
	pub endpoints: Option<SsoEndpoints>,
}
impl IdentityOptions {
	/// Default local scheme.
	pub const DEFAULT_LOCAL_SCHEME: &str = "sso.cookie";
	/// Default external scheme.
	pub const DEFAULT_EXTERNAL_SCHEME: &str = "sso.external";
	/// Default renewal margin in seconds.
	pub const DEFAULT_RENEWAL_MARGIN_SECS: u64 = 300;

	/// Renewal policy derived from the margin.
	pub fn expiry_policy(&self) -> ExpiryPolicy {
		let secs = i64::try_from(self.renewal_margin_secs).unwrap_or(i64::MAX);

		ExpiryPolicy::new(Duration::seconds(secs))
	}

	/// Renewal scopes, or `None` when none are configured.
	pub fn scope_set(&self) -> Result<Option<ScopeSet>, ConfigError> {
		if self.scopes.is_empty() {
			return Ok(None);
		}

		Ok(Some(ScopeSet::new(&self.scopes)?))
	}

	/// Local and external scheme names.
	pub fn schemes(&self) -> Result<(SchemeName, SchemeName), ConfigError> {
		Ok((SchemeName::new(&self.local_scheme)?, SchemeName::new(&self.external_scheme)?))
	}

	/// Ticket policy for the configured authentication type and subject prefix.
	pub fn ticket_policy(&self) -> TicketPolicy {
		TicketPolicy {
			authentication_type: self.authentication_type.clone(),
			subject_prefix: self.subject_prefix.clone(),
		}
	}

	/// Resolver for the configured identity mode.
	pub fn identity_resolver(&self) -> IdentityResolver {
		IdentityResolver::new(self.identity_mode, self.authentication_type.clone())
	}

	/// Typed accessor for the current SSO user.
	pub fn user_accessor(&self) -> UserAccessor {
		UserAccessor::new(self.identity_resolver(), self.subject_prefix.clone())
	}

	/// Access and refresh handler configurations of the local scheme.
	pub fn handler_configurations(&self) -> Result<Vec<TokenHandlerConfiguration>, ConfigError> {
		let (local, _) = self.schemes()?;

		Ok([TokenKind::Access, TokenKind::Refresh]
			.into_iter()
			.map(|kind| TokenHandlerConfiguration::new(local.clone(), kind, self.token_storage))
			.collect())
	}

	/// Registry of the local scheme's handlers.
	pub fn registry(&self) -> Result<HandlerRegistry, ConfigError> {
		HandlerRegistry::new(self.handler_configurations()?)
	}

	/// Sign-in settings.
	pub fn sign_in_settings(&self) -> Result<SignInSettings, ConfigError> {
		let (local, external) = self.schemes()?;
		let mut settings = SignInSettings::new(local, external);

		settings.failure_path = self.failure_path.clone();
		settings.claims_issuer = self.claims_issuer.clone();
		settings.issuer_claims = self.issuer_claims;
		settings.policy = self.ticket_policy();

		Ok(settings)
	}

	/// Validated SSO endpoints, if configured.
	pub fn sso_endpoints(&self) -> Result<Option<&SsoEndpoints>, ConfigError> {
		match &self.endpoints {
			Some(endpoints) => {
				endpoints.validate()?;

				Ok(Some(endpoints))
			},
			None => Ok(None),
		}
	}
}
impl Default for IdentityOptions {
	fn default() -> Self {
		Self {
			local_scheme: Self::DEFAULT_LOCAL_SCHEME.into(),
			external_scheme: Self::DEFAULT_EXTERNAL_SCHEME.into(),
			identity_mode: IdentityMode::default(),
			renewal_margin_secs: Self::DEFAULT_RENEWAL_MARGIN_SECS,
			scopes: Vec::new(),
			failure_path: None,
			authentication_type: DEFAULT_AUTHENTICATION_TYPE.into(),
			subject_prefix: DEFAULT_SUBJECT_PREFIX.into(),
			claims_issuer: SignInSettings::DEFAULT_CLAIMS_ISSUER.into(),
			issuer_claims: IssuerClaimToggles::default(),
			enrichment: EnrichmentToggles::default(),
			token_storage: StorageStrategy::default(),
			endpoints: None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let options: IdentityOptions =
			serde_json::from_str("{}").expect("Empty options should deserialize.");

		assert_eq!(options, IdentityOptions::default());
		assert_eq!(options.expiry_policy(), ExpiryPolicy::default());
		assert_eq!(options.scope_set().expect("No scopes is valid."), None);
		assert_eq!(options.registry().expect("Default registry should build.").len(), 2);
	}

	#[test]
	fn overrides_flow_into_components() {
		let options: IdentityOptions = serde_json::from_value(serde_json::json!({
			"identity_mode": "mixed",
			"renewal_margin_secs": 60,
			"scopes": ["publicData", "esi-skills.read_skills.v1"],
			"failure_path": "/login-failed",
			"token_storage": "external",
			"issuer_claims": { "owner": true },
			"endpoints": {
				"token": "https://login.example.com/v2/oauth/token",
				"revocation": "https://login.example.com/v2/oauth/revoke"
			}
		}))
		.expect("Options should deserialize.");

		assert_eq!(options.identity_resolver().mode(), IdentityMode::Mixed);
		assert_eq!(options.expiry_policy().margin(), Duration::minutes(1));
		assert!(options.issuer_claims.owner && options.issuer_claims.region);
		assert!(options.sso_endpoints().expect("Endpoints are HTTPS.").is_some());

		let settings = options.sign_in_settings().expect("Settings should build.");

		assert_eq!(settings.failure_path.as_deref(), Some("/login-failed"));

		let configurations = options.handler_configurations().expect("Schemes are valid.");

		assert!(configurations.iter().all(|c| c.storage == StorageStrategy::External));
	}

	#[test]
	fn insecure_endpoints_are_rejected() {
		let options: IdentityOptions = serde_json::from_value(serde_json::json!({
			"endpoints": { "token": "http://login.example.com/v2/oauth/token" }
		}))
		.expect("Options should deserialize.");

		assert!(matches!(options.sso_endpoints(), Err(ConfigError::InsecureEndpoint { .. })));
	}
}
