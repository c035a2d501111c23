//! Identities committed to host sessions and multi-scheme identity resolution.

pub mod accessor;
pub mod mode;

pub use accessor::*;
pub use mode::*;

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, SubjectId},
	claims::{Claim, types},
};

/// Claims asserted about one principal by one authentication type.
///
/// Claims are deduplicated on insertion with [`Claim::same_as`], keeping the first occurrence,
/// so the order claims were added in is preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	authentication_type: Option<String>,
	claims: Vec<Claim>,
}
impl Identity {
	/// Claim type holding the display name.
	pub const NAME_CLAIM: &str = types::NAME;

	/// Creates an authenticated identity of `authentication_type`.
	pub fn new(authentication_type: impl Into<String>) -> Self {
		Self { authentication_type: Some(authentication_type.into()), claims: Vec::new() }
	}

	/// Creates an identity without an authentication type.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Adds `claim` unless an equal claim is already present.
	pub fn add_claim(&mut self, claim: Claim) {
		if !self.claims.iter().any(|existing| existing.same_as(&claim)) {
			self.claims.push(claim);
		}
	}

	/// Adds every claim of `claims`, deduplicating.
	pub fn with_claims(mut self, claims: impl IntoIterator<Item = Claim>) -> Self {
		for claim in claims {
			self.add_claim(claim);
		}

		self
	}

	/// Authentication type, if any.
	pub fn authentication_type(&self) -> Option<&str> {
		self.authentication_type.as_deref()
	}

	/// Returns `true` when an authentication type is set.
	pub fn is_authenticated(&self) -> bool {
		self.authentication_type.as_deref().is_some_and(|kind| !kind.is_empty())
	}

	/// Returns `true` when authenticated with `authentication_type`.
	pub fn is_authenticated_as(&self, authentication_type: &str) -> bool {
		self.is_authenticated() && self.authentication_type() == Some(authentication_type)
	}

	/// Claims in insertion order.
	pub fn claims(&self) -> &[Claim] {
		&self.claims
	}

	/// Value of the first claim of `claim_type`.
	pub fn find_first(&self, claim_type: &str) -> Option<&str> {
		self.claims.iter().find(|claim| claim.is(claim_type)).map(|claim| claim.value.as_str())
	}

	/// Display name.
	pub fn name(&self) -> Option<&str> {
		self.find_first(Self::NAME_CLAIM)
	}

	/// Normalized subject, stripping `prefix` from the `sub` claim.
	pub fn subject(&self, prefix: &str) -> Option<Result<SubjectId, IdentifierError>> {
		self.find_first(types::SUBJECT).map(|raw| SubjectId::with_prefix(raw, prefix))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn claims_dedup_case_insensitively_and_keep_order() {
		let identity = Identity::new("sso").with_claims([
			Claim::new("name", "Pilot"),
			Claim::new("SCP", "PublicData"),
			Claim::new("scp", "publicdata"),
			Claim::new("scp", "publicdata").with_value_type(Claim::INTEGER),
			Claim::new("name", "Other Pilot"),
		]);

		assert_eq!(identity.claims().len(), 4);
		assert_eq!(identity.name(), Some("Pilot"));
		assert_eq!(identity.claims()[1].claim_type, "SCP");
	}

	#[test]
	fn authentication_type_marks_identity_authenticated() {
		assert!(Identity::new("sso").is_authenticated_as("sso"));
		assert!(!Identity::new("").is_authenticated());
		assert!(!Identity::anonymous().is_authenticated_as("sso"));
	}

	#[test]
	fn subject_is_normalized() {
		let identity =
			Identity::new("sso").with_claims([Claim::new(types::SUBJECT, "CHARACTER:EVE:2112")]);
		let subject = identity
			.subject("CHARACTER:EVE:")
			.expect("Subject claim should be present.")
			.expect("Subject should be valid.");

		assert_eq!(subject.as_ref(), "2112");
		assert!(Identity::new("sso").subject("CHARACTER:EVE:").is_none());
	}
}
