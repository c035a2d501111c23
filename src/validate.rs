//! Access token validation contract and JWT payload inspection.
//!
//! Signature verification is the host's concern; the bundled [`PayloadClaimsValidator`] only
//! checks issuer, audience, and lifetime of the decoded payload.

// std
use std::collections::HashSet;
// crates.io
use jsonwebtoken::{DecodingKey, Validation, errors::ErrorKind};
// self
use crate::{_prelude::*, auth::ScopeSet};

pub use jsonwebtoken::errors::Error as JwtError;

/// Boxed future returned by [`AccessTokenValidator::validate`].
pub type ValidationFuture<'a> = Pin<Box<dyn Future<Output = ValidationOutcome> + 'a + Send>>;

/// Validates access tokens freshly returned by the token endpoint.
pub trait AccessTokenValidator
where
	Self: Send + Sync,
{
	/// Checks `access_token`; never raises.
	fn validate<'a>(&'a self, access_token: &'a str) -> ValidationFuture<'a>;
}

/// Result of [`AccessTokenValidator::validate`].
#[derive(Debug)]
pub enum ValidationOutcome {
	/// Token accepted.
	Valid,
	/// Token rejected.
	Invalid {
		/// Short description of the failed check.
		error: String,
		/// Underlying failure, if any.
		cause: Option<Box<dyn StdError + Send + Sync>>,
	},
}
impl ValidationOutcome {
	/// Builds an [`Invalid`](Self::Invalid) outcome without a cause.
	pub fn invalid(error: impl Into<String>) -> Self {
		Self::Invalid { error: error.into(), cause: None }
	}

	/// Returns `true` for [`Valid`](Self::Valid).
	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid)
	}
}

/// Validator accepting every token, for hosts that verify tokens elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;
impl AccessTokenValidator for AcceptAll {
	fn validate<'a>(&'a self, _access_token: &'a str) -> ValidationFuture<'a> {
		Box::pin(async { ValidationOutcome::Valid })
	}
}

/// String-or-array JSON value, as used by `aud` and `scp`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
	/// Field absent.
	#[default]
	None,
	/// Single string.
	One(String),
	/// Array of strings.
	Many(Vec<String>),
}
impl OneOrMany {
	/// Iterates over the contained values.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		let slice: &[String] = match self {
			Self::None => &[],
			Self::One(value) => std::slice::from_ref(value),
			Self::Many(values) => values,
		};

		slice.iter().map(String::as_str)
	}
}

/// Registered and provider claims read from an access token payload.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct JwtPayload {
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Issuer.
	#[serde(default)]
	pub iss: Option<String>,
	/// Audiences.
	#[serde(default)]
	pub aud: OneOrMany,
	/// Expiry as a Unix timestamp.
	#[serde(default)]
	pub exp: Option<i64>,
	/// Issued-at as a Unix timestamp.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Granted scopes.
	#[serde(default)]
	pub scp: OneOrMany,
}
impl JwtPayload {
	/// Decodes the payload of a compact JWT without verifying its signature or claims.
	pub fn decode(token: &str) -> Result<Self, JwtError> {
		let mut validation = Validation::default();

		validation.insecure_disable_signature_validation();
		validation.required_spec_claims.clear();
		validation.validate_exp = false;
		validation.validate_aud = false;

		Ok(jsonwebtoken::decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)?.claims)
	}

	/// Scopes granted in the `scp` claim.
	pub fn scopes(&self) -> ScopeSet {
		ScopeSet::lenient(self.scp.iter())
	}
}

/// Reads granted scopes from an access token, if it is a decodable JWT.
pub fn granted_scopes(access_token: &str) -> Option<ScopeSet> {
	JwtPayload::decode(access_token).ok().map(|payload| payload.scopes())
}

/// Boxed future returned by [`ScopeAccessValidator::has_scope`].
pub type ScopeAccessFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a + Send>>;

/// Decides whether an access token grants a scope.
pub trait ScopeAccessValidator
where
	Self: Send + Sync,
{
	/// Returns `true` when `access_token` grants `scope`.
	fn has_scope<'a>(&'a self, access_token: &'a str, scope: &'a str) -> ScopeAccessFuture<'a>;
}

/// Reads the `scp` claim of JWT access tokens; opaque tokens grant nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct JwtScopeAccessValidator;
impl JwtScopeAccessValidator {
	/// Synchronous form of [`ScopeAccessValidator::has_scope`].
	pub fn grants(access_token: &str, scope: &str) -> bool {
		JwtPayload::decode(access_token)
			.map(|payload| payload.scp.iter().any(|granted| granted == scope))
			.unwrap_or(false)
	}
}
impl ScopeAccessValidator for JwtScopeAccessValidator {
	fn has_scope<'a>(&'a self, access_token: &'a str, scope: &'a str) -> ScopeAccessFuture<'a> {
		Box::pin(async move { Self::grants(access_token, scope) })
	}
}

/// Validates issuer, audience, and lifetime of a JWT access token payload.
#[derive(Clone, Debug)]
pub struct PayloadClaimsValidator {
	validation: Validation,
}
impl PayloadClaimsValidator {
	/// Default clock skew tolerated on `exp`.
	pub const DEFAULT_LEEWAY: Duration = Duration::seconds(30);

	/// Accepts tokens issued by any of `issuers` for any of `audiences`.
	///
	/// Issuers compare without their URL scheme, so `login.example.com` and
	/// `https://login.example.com` are equivalent.
	pub fn new<I, A>(issuers: I, audiences: A) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
		A: IntoIterator,
		A::Item: Into<String>,
	{
		let issuers = issuers
			.into_iter()
			.flat_map(|issuer| {
				let bare = strip_scheme(&issuer.into()).to_owned();

				[format!("https://{bare}"), format!("https://{bare}/"), bare]
			})
			.collect::<HashSet<_>>();
		let audiences = audiences.into_iter().map(Into::into).collect::<Vec<String>>();
		let mut validation = Validation::default();

		validation.insecure_disable_signature_validation();

		if !issuers.is_empty() {
			validation.iss = Some(issuers);
		}
		if audiences.is_empty() {
			validation.validate_aud = false;
		} else {
			validation.set_audience(&audiences);
		}

		Self { validation }.with_leeway(Self::DEFAULT_LEEWAY)
	}

	/// Overrides the tolerated clock skew.
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.validation.leeway = u64::try_from(leeway.whole_seconds()).unwrap_or_default();

		self
	}

	fn check(&self, access_token: &str) -> ValidationOutcome {
		let decoded = jsonwebtoken::decode::<JwtPayload>(
			access_token,
			&DecodingKey::from_secret(&[]),
			&self.validation,
		);
		let Err(e) = decoded else {
			return ValidationOutcome::Valid;
		};

		let rejected = match e.kind() {
			ErrorKind::InvalidIssuer => Some("Access token issuer is not trusted"),
			ErrorKind::InvalidAudience => Some("Access token audience is not accepted"),
			ErrorKind::ExpiredSignature => Some("Access token is expired"),
			ErrorKind::MissingRequiredClaim(claim) if claim == "exp" =>
				Some("Access token has no expiry"),
			_ => None,
		};

		match rejected {
			Some(error) => ValidationOutcome::invalid(error),
			None => ValidationOutcome::Invalid {
				error: "Access token payload cannot be decoded".into(),
				cause: Some(Box::new(e)),
			},
		}
	}
}
impl AccessTokenValidator for PayloadClaimsValidator {
	fn validate<'a>(&'a self, access_token: &'a str) -> ValidationFuture<'a> {
		Box::pin(async move { self.check(access_token) })
	}
}

fn strip_scheme(issuer: &str) -> &str {
	issuer.trim_start_matches("https://").trim_start_matches("http://").trim_end_matches('/')
}

/// Builds a compact JWT around `payload` with a placeholder signature; test fixtures only.
#[cfg(test)]
pub(crate) fn unsigned_jwt(payload: &serde_json::Value) -> String {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

	format!(
		"eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.c2ln",
		URL_SAFE_NO_PAD.encode(payload.to_string())
	)
}
