mod common;

// std
use std::sync::Arc;
// self
use common::{EXTERNAL, LOCAL, ScriptedExchange};
use oauth2_identity::{
	error::{ConfigError, Error},
	handler::{HandlerServices, StorageStrategy},
	provider::{DefaultHandlerFactory, HandlerInit, TokenHandlerProvider},
	service::TokenService,
	session::{MemorySessions, PropertyBag},
};

fn services() -> HandlerServices {
	common::services(ScriptedExchange::new(Vec::new()), common::clock())
}

#[tokio::test]
async fn scheme_is_authenticated_once_per_request() -> color_eyre::Result<()> {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let provider = common::provider(&sessions, services(), None);

	sessions.insert(
		local.clone(),
		common::embedded_ticket("2112", "access-1", "refresh-1", "2025-01-01T13:00:00Z"),
	);

	let access = provider.access_handler(&local, HandlerInit::Initialize).await?;
	let cached = provider.access_handler(&local, HandlerInit::Initialize).await?;
	let refresh = provider.refresh_handler(&local, HandlerInit::Initialize).await?;

	assert_eq!(sessions.authentications(), 1);
	assert!(Arc::ptr_eq(access.refresh_handler().session(), cached.refresh_handler().session()));
	assert!(Arc::ptr_eq(access.refresh_handler().session(), refresh.session()));
	assert_eq!(access.context().await, refresh.context().await);

	let context = refresh.context().await.expect("Ticket should authenticate the scheme.");

	assert_eq!(context.subject.as_ref(), "2112");

	Ok(())
}

#[tokio::test]
async fn deferred_handlers_skip_authentication_and_the_cache() {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let provider = common::provider(&sessions, services(), None);

	sessions.insert(
		local.clone(),
		common::embedded_ticket("2112", "access-1", "refresh-1", "2025-01-01T13:00:00Z"),
	);

	let deferred = provider
		.access_handler(&local, HandlerInit::Deferred)
		.await
		.expect("Deferred lookup should succeed.");

	assert_eq!(sessions.authentications(), 0);
	assert!(deferred.context().await.is_none());

	let cached = provider
		.access_handler(&local, HandlerInit::Initialize)
		.await
		.expect("Initialized lookup should succeed.");

	assert!(!Arc::ptr_eq(deferred.refresh_handler().session(), cached.refresh_handler().session()));
	assert!(cached.context().await.is_some());
}

#[tokio::test]
async fn unregistered_scheme_is_a_configuration_error() {
	let sessions = MemorySessions::default();
	let provider = common::provider(&sessions, services(), None);
	let err = provider
		.access_handler(&common::scheme(EXTERNAL), HandlerInit::Initialize)
		.await
		.expect_err("External scheme has no handlers.");

	assert!(matches!(err, Error::Config(ConfigError::HandlerNotRegistered { .. })));
	assert_eq!(sessions.authentications(), 0);
}

#[tokio::test]
async fn external_storage_requires_a_store() {
	let sessions = MemorySessions::default();
	let provider = TokenHandlerProvider::new(
		common::registry(StorageStrategy::External),
		Arc::new(DefaultHandlerFactory::new(services())),
		Arc::new(sessions.clone()),
	);
	let err = provider
		.refresh_handler(&common::scheme(LOCAL), HandlerInit::Initialize)
		.await
		.expect_err("External storage without a store cannot build handlers.");

	assert!(matches!(err, Error::Config(ConfigError::MissingTokenStore { .. })));
}

#[tokio::test]
async fn recommit_is_skipped_when_the_subject_changed() {
	let local = common::scheme(LOCAL);
	let sessions = MemorySessions::default();
	let script = vec![Ok(common::response("access-2", "refresh-2", 1_200))];
	let provider = common::provider(
		&sessions,
		common::services(ScriptedExchange::new(script), common::clock()),
		None,
	);
	let service = TokenService::new(provider, Arc::new(sessions.clone()));

	sessions.insert(
		local.clone(),
		common::embedded_ticket("2112", "access-1", "refresh-1", "2025-01-01T12:01:00Z"),
	);
	service
		.request_access_token(&local)
		.await
		.expect("Handler lookup should succeed.")
		.expect("Renewal should succeed.");
	sessions.insert(
		local.clone(),
		common::embedded_ticket("9001", "access-9", "refresh-9", "2025-01-01T13:00:00Z"),
	);

	assert_eq!(service.finish_response().await.expect("Finish should succeed."), 0);
	assert_eq!(sessions.commits(), 0);

	let ticket = sessions.ticket(&local).expect("Other subject should stay signed in.");

	assert_eq!(ticket.properties.token(PropertyBag::ACCESS_TOKEN), Some("access-9"));
}
