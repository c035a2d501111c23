//! Selection of the provider claims carried into a local identity.

// self
use crate::{
	_prelude::*,
	claims::{Claim, types},
};

/// Switches for optional provider claims copied during extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerClaimToggles {
	/// Copy `region`.
	pub region: bool,
	/// Copy `iss`.
	pub issuer: bool,
	/// Copy `tier`.
	pub tier: bool,
	/// Copy `tenant`.
	pub tenant: bool,
	/// Copy `jti`.
	pub jwt_id: bool,
	/// Copy `owner`.
	pub owner: bool,
	/// Copy `aud`.
	pub audience: bool,
	/// Copy `azp`.
	pub authorized_party: bool,
	/// Copy `kid`.
	pub key_id: bool,
}
impl IssuerClaimToggles {
	/// Claim types enabled by these toggles.
	pub fn enabled(&self) -> Vec<&'static str> {
		[
			(self.region, types::REGION),
			(self.issuer, types::ISSUER),
			(self.tier, types::TIER),
			(self.tenant, types::TENANT),
			(self.jwt_id, types::JWT_ID),
			(self.owner, types::OWNER),
			(self.audience, types::AUDIENCE),
			(self.authorized_party, types::AUTHORIZED_PARTY),
			(self.key_id, types::KEY_ID),
		]
		.into_iter()
		.filter_map(|(on, claim_type)| on.then_some(claim_type))
		.collect()
	}
}
impl Default for IssuerClaimToggles {
	fn default() -> Self {
		Self {
			region: true,
			issuer: true,
			tier: true,
			tenant: true,
			jwt_id: false,
			owner: false,
			audience: false,
			authorized_party: false,
			key_id: false,
		}
	}
}

/// Selects the claims a sign-in starts from.
///
/// Copies the first `name`, `sub`, `iat` and `exp` claims, every `scp` claim, and every claim
/// enabled by `toggles`. A grant without scopes still yields one empty `scp` claim issued by
/// `issuer`.
pub fn extract_external_claims(
	external: &[Claim],
	toggles: &IssuerClaimToggles,
	issuer: &str,
) -> Vec<Claim> {
	let mut claims = [types::NAME, types::SUBJECT, types::ISSUED_AT, types::EXPIRATION]
		.into_iter()
		.filter_map(|claim_type| external.iter().find(|claim| claim.is(claim_type)).cloned())
		.collect::<Vec<_>>();
	let optional = toggles.enabled();
	let scopes =
		external.iter().filter(|claim| claim.is(types::SCOPE)).cloned().collect::<Vec<_>>();

	if scopes.is_empty() {
		claims.push(Claim::new(types::SCOPE, "").with_issuer(issuer));
	} else {
		claims.extend(scopes);
	}

	claims.extend(
		external
			.iter()
			.filter(|claim| optional.iter().any(|claim_type| claim.is(claim_type)))
			.cloned(),
	);

	claims
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn external() -> Vec<Claim> {
		vec![
			Claim::new(types::SUBJECT, "CHARACTER:EVE:2112"),
			Claim::new(types::NAME, "Pilot"),
			Claim::new(types::ISSUED_AT, "1735689600").with_value_type(Claim::INTEGER),
			Claim::new(types::EXPIRATION, "1735690800").with_value_type(Claim::INTEGER),
			Claim::new(types::SCOPE, "publicData"),
			Claim::new(types::SCOPE, "esi-skills.read_skills.v1"),
			Claim::new(types::REGION, "world"),
			Claim::new(types::OWNER, "owner-hash"),
			Claim::new("unrelated", "value"),
		]
	}

	#[test]
	fn default_toggles_copy_region_but_not_owner() {
		let toggles = IssuerClaimToggles::default();
		let claims = extract_external_claims(&external(), &toggles, "login.example.com");
		let kinds = claims.iter().map(|claim| claim.claim_type.as_str()).collect::<Vec<_>>();

		assert_eq!(kinds, vec!["name", "sub", "iat", "exp", "scp", "scp", "region"]);
	}

	#[test]
	fn empty_scope_claim_is_added_for_login_only_grants() {
		let external = external()
			.into_iter()
			.filter(|claim| !claim.is(types::SCOPE))
			.collect::<Vec<_>>();
		let toggles = IssuerClaimToggles { region: false, owner: true, ..Default::default() };
		let claims = extract_external_claims(&external, &toggles, "login.example.com");
		let scope = claims
			.iter()
			.find(|claim| claim.is(types::SCOPE))
			.expect("An empty scope claim should be present.");

		assert_eq!(scope.value, "");
		assert_eq!(scope.issuer.as_deref(), Some("login.example.com"));
		assert!(claims.iter().any(|claim| claim.is(types::OWNER)));
		assert!(!claims.iter().any(|claim| claim.is(types::REGION)));
	}
}
