//! Required-claims check run after the full pipeline.

// self
use crate::claims::{Claim, ClaimsError, types};

/// Claim types every committed identity must carry.
pub const REQUIRED_CLAIMS: [&str; 5] =
	[types::NAME, types::SUBJECT, types::ISSUED_AT, types::EXPIRATION, types::SCOPE];

/// Validates the presence of [`REQUIRED_CLAIMS`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredClaims;
impl RequiredClaims {
	/// Fails with exactly the required claim types absent from `claims`.
	pub fn validate(claims: &[Claim]) -> Result<(), ClaimsError> {
		let missing = REQUIRED_CLAIMS
			.iter()
			.filter(|claim_type| !claims.iter().any(|claim| claim.is(claim_type)))
			.map(|claim_type| (*claim_type).to_owned())
			.collect::<Vec<_>>();

		if missing.is_empty() { Ok(()) } else { Err(ClaimsError::MissingRequired(missing)) }
	}
}
