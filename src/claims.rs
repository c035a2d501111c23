//! Claims model and the transformation pipeline turning untrusted external claims into the
//! claims committed with a local identity.
//!
//! A sign-in extracts the provider's claims ([`extract_external_claims`]), runs them through an
//! ordered [`ClaimsPipeline`], and finally checks [`RequiredClaims`] before the identity is built.

pub mod enrich;
pub mod external;
pub mod pipeline;
pub mod required;
pub mod types;

pub use enrich::*;
pub use external::*;
pub use pipeline::*;
pub use required::*;

// self
use crate::_prelude::*;

/// Failures that abort the claims pipeline.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Required claims are absent after the pipeline ran.
	#[error("Required claims are missing: {}.", .0.join(", "))]
	MissingRequired(Vec<String>),
	/// Profile lookup for enrichment failed.
	#[error("Profile lookup for subject `{subject}` failed.")]
	Enrichment {
		/// Normalized subject the lookup ran for.
		subject: String,
		/// Failure reported by the profile source.
		#[source]
		source: ProfileError,
	},
}

/// Single claim asserted about a subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
	/// Claim type, e.g. `sub`.
	pub claim_type: String,
	/// Claim value.
	pub value: String,
	/// Value type; [`Claim::STRING`] unless stated otherwise.
	#[serde(default = "Claim::default_value_type")]
	pub value_type: String,
	/// Issuer that asserted the claim.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issuer: Option<String>,
}
impl Claim {
	/// Value type of textual claims.
	pub const STRING: &str = "string";
	/// Value type of integer claims.
	pub const INTEGER: &str = "integer";

	/// Creates a string claim without an issuer.
	pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			claim_type: claim_type.into(),
			value: value.into(),
			value_type: Self::STRING.into(),
			issuer: None,
		}
	}

	/// Sets the value type.
	pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
		self.value_type = value_type.into();

		self
	}

	/// Sets the issuer.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Returns `true` when the claim has type `claim_type`.
	pub fn is(&self, claim_type: &str) -> bool {
		self.claim_type == claim_type
	}

	/// Equality used for identity deduplication: type and value compare case-insensitively,
	/// value type compares exactly.
	pub fn same_as(&self, other: &Self) -> bool {
		self.claim_type.eq_ignore_ascii_case(&other.claim_type)
			&& self.value.to_lowercase() == other.value.to_lowercase()
			&& self.value_type == other.value_type
	}

	fn default_value_type() -> String {
		Self::STRING.into()
	}
}
