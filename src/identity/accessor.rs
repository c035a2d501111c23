//! Typed view of the signed-in SSO user.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_SUBJECT_PREFIX, strip_subject_prefix},
	claims::types,
	handler::DEFAULT_AUTHENTICATION_TYPE,
	identity::{Identity, IdentityMode, IdentityResolver},
};

/// Profile of the signed-in SSO user, read from identity claims.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsoUser {
	/// Numeric subject with the provider prefix removed.
	pub character_id: u64,
	/// Display name.
	pub name: String,
	/// Organization, when enrichment added it.
	pub organization_id: Option<u64>,
	/// Alliance, when the organization belongs to one.
	pub alliance_id: Option<u64>,
	/// Portrait image.
	pub portrait_url: Option<Url>,
}
impl SsoUser {
	/// Reads the user from `identity`; `None` when the subject or name is missing or malformed.
	pub fn from_identity(identity: &Identity, subject_prefix: &str) -> Option<Self> {
		let subject = identity.find_first(types::SUBJECT)?;
		let character_id = strip_subject_prefix(subject, subject_prefix).parse().ok()?;
		let name = identity.name().filter(|name| !name.is_empty())?.to_owned();
		let organization_id = integer_claim(identity, types::ORGANIZATION)?;
		let alliance_id = integer_claim(identity, types::ALLIANCE)?;
		let portrait_url =
			identity.find_first(types::PORTRAIT).and_then(|raw| Url::parse(raw).ok());

		Some(Self { character_id, name, organization_id, alliance_id, portrait_url })
	}
}

/// Resolves the current [`SsoUser`] from the identities of one principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccessor {
	resolver: IdentityResolver,
	subject_prefix: String,
}
impl UserAccessor {
	/// Reads SSO identities picked by `resolver`, stripping `subject_prefix` from subjects.
	pub fn new(resolver: IdentityResolver, subject_prefix: impl Into<String>) -> Self {
		Self { resolver, subject_prefix: subject_prefix.into() }
	}

	/// Returns `true` when the principal carries an authenticated SSO identity, whatever the
	/// identity mode.
	pub fn is_authenticated(&self, identities: &[Identity]) -> bool {
		self.resolver.sso(identities).is_some()
	}

	/// Current SSO user, if authenticated and readable.
	pub fn current(&self, identities: &[Identity]) -> Option<SsoUser> {
		self.resolver
			.sso(identities)
			.and_then(|identity| SsoUser::from_identity(identity, &self.subject_prefix))
	}

	/// Primary identity under the configured mode.
	pub fn primary<'a>(&self, identities: &'a [Identity]) -> Option<&'a Identity> {
		self.resolver.select(identities)
	}
}
impl Default for UserAccessor {
	fn default() -> Self {
		Self::new(
			IdentityResolver::new(IdentityMode::default(), DEFAULT_AUTHENTICATION_TYPE),
			DEFAULT_SUBJECT_PREFIX,
		)
	}
}

/// `Some(None)` when the claim is absent, `None` when it is not an integer.
fn integer_claim(identity: &Identity, claim_type: &str) -> Option<Option<u64>> {
	match identity.find_first(claim_type) {
		Some(raw) => raw.parse().ok().map(Some),
		None => Some(None),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::claims::Claim;

	fn pilot() -> Identity {
		Identity::new(DEFAULT_AUTHENTICATION_TYPE).with_claims([
			Claim::new(types::SUBJECT, "CHARACTER:EVE:2112"),
			Claim::new(types::NAME, "Pilot"),
			Claim::new(types::ORGANIZATION, "98000001"),
			Claim::new(types::PORTRAIT, "https://images.example.com/characters/2112/portrait"),
		])
	}

	#[test]
	fn current_user_is_read_from_the_sso_identity() {
		let identities = vec![Identity::new("cookie"), pilot()];
		let accessor = UserAccessor::default();
		let user = accessor.current(&identities).expect("SSO user should be readable.");

		assert!(accessor.is_authenticated(&identities));
		assert_eq!(user.character_id, 2112);
		assert_eq!(user.name, "Pilot");
		assert_eq!(user.organization_id, Some(98_000_001));
		assert_eq!(user.alliance_id, None);
		assert_eq!(
			user.portrait_url.as_ref().map(Url::as_str),
			Some("https://images.example.com/characters/2112/portrait")
		);
	}

	#[test]
	fn authentication_ignores_the_identity_mode() {
		let identities = vec![Identity::new("cookie"), pilot()];
		let accessor = UserAccessor::new(
			IdentityResolver::new(IdentityMode::Secondary, DEFAULT_AUTHENTICATION_TYPE),
			DEFAULT_SUBJECT_PREFIX,
		);

		let primary = accessor.primary(&identities).and_then(Identity::authentication_type);

		assert_eq!(primary, Some("cookie"));
		assert!(accessor.is_authenticated(&identities));
		assert!(accessor.current(&identities).is_some());
	}

	#[test]
	fn unreadable_identities_yield_no_user() {
		let accessor = UserAccessor::default();
		let anonymous = vec![Identity::anonymous(), Identity::new("cookie")];

		assert!(!accessor.is_authenticated(&anonymous));
		assert!(accessor.current(&anonymous).is_none());

		let malformed = vec![pilot().with_claims([Claim::new(types::ALLIANCE, "not-a-number")])];

		assert!(accessor.is_authenticated(&malformed));
		assert!(accessor.current(&malformed).is_none());

		let nameless = vec![
			Identity::new(DEFAULT_AUTHENTICATION_TYPE)
				.with_claims([Claim::new(types::SUBJECT, "CHARACTER:EVE:2112")]),
		];

		assert!(accessor.current(&nameless).is_none());
	}
}
