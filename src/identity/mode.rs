//! Primary-identity selection across the identities of one principal.

// self
use crate::{_prelude::*, identity::Identity};

/// How the SSO identity ranks against identities from other authentication types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
	/// SSO identity first.
	#[default]
	Primary,
	/// Other identities first, SSO identity as fallback.
	Secondary,
	/// Authenticated non-SSO identity, then authenticated SSO identity.
	Mixed,
}

/// Picks the primary identity according to an [`IdentityMode`].
///
/// Ties resolve to enumeration order; every mode falls back to the first identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityResolver {
	mode: IdentityMode,
	sso_type: String,
}
impl IdentityResolver {
	/// Creates a resolver treating `sso_type` as the SSO authentication type.
	pub fn new(mode: IdentityMode, sso_type: impl Into<String>) -> Self {
		Self { mode, sso_type: sso_type.into() }
	}

	/// Configured mode.
	pub fn mode(&self) -> IdentityMode {
		self.mode
	}

	/// Selects the primary identity; `None` only for an empty slice.
	pub fn select<'a>(&self, identities: &'a [Identity]) -> Option<&'a Identity> {
		let sso = || self.sso(identities);
		let other = || {
			identities.iter().find(|identity| identity.is_authenticated() && !self.is_sso(identity))
		};
		let picked = match self.mode {
			IdentityMode::Primary => sso(),
			IdentityMode::Secondary => other(),
			IdentityMode::Mixed => other().or_else(sso),
		};

		picked.or_else(|| identities.first())
	}

	/// Authenticated SSO identity, regardless of the mode.
	pub fn sso<'a>(&self, identities: &'a [Identity]) -> Option<&'a Identity> {
		identities.iter().find(|identity| self.is_sso(identity))
	}

	fn is_sso(&self, identity: &Identity) -> bool {
		identity.is_authenticated_as(&self.sso_type)
	}
}
