mod common;

// std
use std::sync::Arc;
// crates.io
use time::Duration;
// self
use common::{LOCAL, NOW, ScriptedExchange};
use oauth2_identity::{
	auth::{SubjectId, TokenKind, TokenSecret},
	config::IdentityOptions,
	handler::{AccessTokenStoreRequest, RevocationOutcome, TokenFailureReason},
	identity::{Identity, IdentityMode},
	provider::HandlerInit,
	service::TokenService,
	session::{AuthTicket, MemorySessions, PropertyBag},
	store::{MemoryStore, TokenStore},
};

#[tokio::test]
async fn revocation_reads_the_token_of_the_requested_kind() -> color_eyre::Result<()> {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let exchange = ScriptedExchange::new(Vec::new());
	let service = TokenService::new(
		common::provider(&sessions, common::services(exchange.clone(), common::clock()), None),
		Arc::new(sessions.clone()),
	);

	sessions.insert(
		local.clone(),
		common::embedded_ticket("2112", "access-1", "refresh-1", "2025-01-01T13:00:00Z"),
	);

	assert_eq!(
		service.revoke_remote_token(&local, TokenKind::Access).await?,
		Ok(RevocationOutcome::Revoked)
	);
	assert_eq!(
		service.revoke_remote_token(&local, TokenKind::Refresh).await?,
		Ok(RevocationOutcome::Revoked)
	);
	assert_eq!(exchange.revocations(), vec![
		(TokenKind::Access, "access-1".to_owned()),
		(TokenKind::Refresh, "refresh-1".to_owned()),
	]);

	Ok(())
}

#[tokio::test]
async fn revocation_without_a_stored_token_sends_nothing() {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let exchange = ScriptedExchange::new(Vec::new());
	let service = TokenService::new(
		common::provider(&sessions, common::services(exchange.clone(), common::clock()), None),
		Arc::new(sessions.clone()),
	);
	let mut ticket =
		common::embedded_ticket("2112", "access-1", "refresh-1", "2025-01-01T13:00:00Z");

	ticket.properties.remove_token(PropertyBag::REFRESH_TOKEN);
	sessions.insert(local.clone(), ticket);

	let revocation = service
		.revoke_remote_token(&local, TokenKind::Refresh)
		.await
		.expect("Handler lookup should succeed.");

	assert_eq!(revocation, Ok(RevocationOutcome::Absent));
	assert!(exchange.revocations().is_empty());
}

#[tokio::test]
async fn sign_out_clears_external_records_and_the_session() -> color_eyre::Result<()> {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let store = Arc::new(MemoryStore::default());
	let exchange = ScriptedExchange::new(Vec::new());
	let seeding = common::provider(
		&sessions,
		common::services(exchange.clone(), common::clock()),
		Some(store.clone() as Arc<dyn TokenStore>),
	);
	let handler = seeding.access_handler(&local, HandlerInit::Deferred).await?;
	let mut properties = PropertyBag::default();

	properties.set_session_id(&common::session_id("session-1"));
	handler.attach(Some(AuthTicket::new(common::sso_identity("2112"), properties))).await;
	handler
		.store_tokens(&AccessTokenStoreRequest {
			subject: SubjectId::new("2112")?,
			access_token: TokenSecret::new("access-1"),
			refresh_token: TokenSecret::new("refresh-1"),
			granted_scopes: common::scopes(&["publicData"]),
			issued_at: NOW,
			expires_at: NOW + Duration::hours(1),
		})
		.await?;

	let context = handler.context().await.expect("Handler should be authenticated.");

	sessions.insert(local.clone(), AuthTicket::new(context.identity, context.properties));

	let service = TokenService::new(
		common::provider(
			&sessions,
			common::services(exchange.clone(), common::clock()),
			Some(store.clone() as Arc<dyn TokenStore>),
		),
		Arc::new(sessions.clone()),
	);
	let outcome = service.sign_out(&local).await?;

	assert_eq!(outcome.revocation, Ok(RevocationOutcome::Revoked));
	assert_eq!(outcome.discarded, Ok(2));
	assert_eq!(exchange.revocations(), vec![(TokenKind::Refresh, "refresh-1".to_owned())]);
	assert!(store.is_empty());
	assert!(sessions.ticket(&local).is_none());

	Ok(())
}

#[tokio::test]
async fn sign_out_of_an_unauthenticated_scheme_still_signs_out() {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let service = TokenService::new(
		common::provider(
			&sessions,
			common::services(ScriptedExchange::new(Vec::new()), common::clock()),
			None,
		),
		Arc::new(sessions.clone()),
	);
	let outcome = service.sign_out(&local).await.expect("Sign-out should succeed.");

	assert!(outcome.revocation.is_err_and(|f| f.reason == TokenFailureReason::NotAuthenticated));
	assert!(outcome.discarded.is_err());
	assert_eq!(sessions.signed_out(), vec![local]);
}

#[test]
fn configured_identity_mode_selects_the_primary_identity() {
	let options: IdentityOptions = serde_json::from_value(serde_json::json!({
		"identity_mode": "secondary",
	}))
	.expect("Options should deserialize.");
	let identities = [common::sso_identity("2112"), Identity::new("cookie")];
	let resolver = options.identity_resolver();
	let primary = resolver.select(&identities).expect("Non-empty principal has a primary.");

	assert_eq!(resolver.mode(), IdentityMode::Secondary);
	assert_eq!(primary.authentication_type(), Some("cookie"));
	assert_eq!(
		IdentityOptions::default().identity_resolver().select(&identities),
		Some(&identities[0])
	);
}
