//! Claim type names issued by the SSO provider and added by enrichment.

/// Display name.
pub const NAME: &str = "name";
/// Subject identifier.
pub const SUBJECT: &str = "sub";
/// Issued-at timestamp.
pub const ISSUED_AT: &str = "iat";
/// Expiry timestamp.
pub const EXPIRATION: &str = "exp";
/// Granted scope; one claim per scope.
pub const SCOPE: &str = "scp";
/// Provider region.
pub const REGION: &str = "region";
/// Token issuer.
pub const ISSUER: &str = "iss";
/// Provider tier.
pub const TIER: &str = "tier";
/// Provider tenant.
pub const TENANT: &str = "tenant";
/// Token identifier.
pub const JWT_ID: &str = "jti";
/// Account owner hash.
pub const OWNER: &str = "owner";
/// Audience.
pub const AUDIENCE: &str = "aud";
/// Authorized party.
pub const AUTHORIZED_PARTY: &str = "azp";
/// Signing key identifier.
pub const KEY_ID: &str = "kid";

/// Organization the subject belongs to.
pub const ORGANIZATION: &str = "sso:subject:organization";
/// Alliance the subject's organization belongs to.
pub const ALLIANCE: &str = "sso:subject:alliance";
/// Portrait image URL.
pub const PORTRAIT: &str = "sso:subject:portrait";
