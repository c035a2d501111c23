//! Access token handler: serves fresh tokens and renews stale ones.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RefreshToken, ScopeSet, TokenKind, TokenSecret},
	exchange::TokenExchangeResponse,
	handler::{
		AccessTokenResult, AccessTokenStoreRequest, HandlerContext, HandlerServices,
		RefreshTokenHandler, RenewalFailure, RenewalSuccess, RevocationResult, SchemeSession,
		TokenFailure, TokenFailureReason, TokenStorage,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, debug_event, warn_event},
	session::AuthTicket,
	validate::{self, ValidationOutcome},
};

/// Serves the access token of one scheme, renewing it through the scheme's refresh handler.
#[derive(Clone)]
pub struct AccessTokenHandler {
	session: Arc<SchemeSession>,
	storage: Arc<dyn TokenStorage>,
	services: Arc<HandlerServices>,
	refresh: RefreshTokenHandler,
}
impl AccessTokenHandler {
	/// Creates a handler sharing `refresh`'s session, storage, and services.
	pub fn new(refresh: RefreshTokenHandler) -> Self {
		Self {
			session: refresh.session.clone(),
			storage: refresh.storage.clone(),
			services: refresh.services.clone(),
			refresh,
		}
	}

	/// Replaces the handler context with one derived from `ticket`.
	pub async fn attach(&self, ticket: Option<AuthTicket>) -> bool {
		self.session.attach(ticket).await
	}

	/// Copy of the authenticated context, if any.
	pub async fn context(&self) -> Option<HandlerContext> {
		self.session.snapshot().await
	}

	/// Refresh handler this handler renews through.
	pub fn refresh_handler(&self) -> &RefreshTokenHandler {
		&self.refresh
	}

	/// Returns the stored access token while it is fresh; renews it otherwise.
	pub async fn request_token(&self) -> AccessTokenResult {
		let Some(context) = self.session.snapshot().await else {
			return Err(TokenFailure::not_authenticated());
		};
		let now = self.services.clock.now();
		let stored = self.storage.load_access(&context).await.map_err(TokenFailure::storage)?;
		let fresh =
			stored.filter(|token| !self.services.policy.needs_renewal(token.expires_at, now));

		if let Some(token) = fresh {
			return Ok(token);
		}

		debug_event!(scheme = %context.scheme, "Access token is missing or stale; renewing.");

		self.renewal(None).await
	}

	/// Renews the access token with `refresh_token` instead of the stored one.
	pub async fn renew(&self, refresh_token: &str) -> AccessTokenResult {
		self.renewal(Some(refresh_token)).await
	}

	/// Persists the tokens obtained by a sign-in for the attached subject.
	pub async fn store_tokens(
		&self,
		request: &AccessTokenStoreRequest,
	) -> Result<(), TokenFailure> {
		let mut guard = self.session.lock().await;
		let Some(context) = guard.as_mut() else {
			return Err(TokenFailure::not_authenticated());
		};

		if context.subject != request.subject {
			return Err(TokenFailure::new(
				TokenFailureReason::NotAuthenticated,
				"Token storage was requested for a different subject.",
			));
		}

		self.storage.persist(context, request).await.map_err(TokenFailure::storage)
	}

	/// Revokes the stored access token at the provider.
	pub async fn revoke(&self) -> RevocationResult {
		let Some(context) = self.session.snapshot().await else {
			return Err(TokenFailure::not_authenticated());
		};
		let stored = self.storage.load_access(&context).await.map_err(TokenFailure::storage)?;

		super::revoke_stored(
			&self.services,
			self.session.scheme(),
			TokenKind::Access,
			stored.map(|token| token.value),
		)
		.await
	}

	/// Removes every stored token of the context, returning how many were removed.
	pub async fn discard(&self) -> Result<usize, TokenFailure> {
		super::discard_stored(&self.session, self.storage.as_ref()).await
	}

	async fn renewal(&self, submitted: Option<&str>) -> AccessTokenResult {
		let span = FlowSpan::new(FlowKind::Renewal, "access_token_renewal");

		span.instrument(async move {
			obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Attempt);
			self.services.events.attempting(self.session.scheme());

			let context = self.session.snapshot().await;
			let result = match context.as_ref() {
				Some(context) => self.renew_inner(context, submitted).await,
				None => Err(TokenFailure::not_authenticated()),
			};

			match &result {
				Ok(_) => obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Success),
				Err(failure) => {
					obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Failure);
					self.report(context.as_ref(), failure);
				},
			}

			result
		})
		.await
	}

	async fn renew_inner(
		&self,
		context: &HandlerContext,
		submitted: Option<&str>,
	) -> AccessTokenResult {
		let loaded;
		let refresh_value = match submitted {
			Some(value) => value,
			None => {
				loaded = self.refresh.load(context).await?;

				loaded.value.expose()
			},
		};
		let response = self
			.services
			.exchange
			.renew(refresh_value, self.services.scopes.as_ref())
			.await
			.map_err(|e| TokenFailure::new(e.reason(), e.to_string()))?;
		let (access, refresh, expires_in, scope) = required_fields(response)?;

		if let ValidationOutcome::Invalid { error, cause } =
			self.services.validator.validate(access.expose()).await
		{
			let message = match cause {
				Some(cause) => format!("Access token validation failed: {error} ({cause})."),
				None => format!("Access token validation failed: {error}."),
			};

			return Err(TokenFailure::new(TokenFailureReason::AccessTokenValidationFailed, message));
		}

		let now = self.services.clock.now();
		let expires_at = self.services.policy.expires_at(now, expires_in);
		let previous =
			self.storage.load_access(context).await.map_err(TokenFailure::storage)?;
		let granted_scopes = validate::granted_scopes(access.expose())
			.filter(|scopes| !scopes.is_empty())
			.or(scope)
			.or_else(|| previous.map(|token| token.granted_scopes))
			.unwrap_or_default();
		let token = AccessToken { value: access, expires_at, granted_scopes };
		let rotated = !refresh.matches(refresh_value);
		let mut guard = self.session.lock().await;
		let Some(current) = guard.as_mut().filter(|current| current.subject == context.subject)
		else {
			return Err(TokenFailure::not_authenticated());
		};

		// The rotated refresh token is written first; the previous one is already spent.
		if rotated {
			let renewed = RefreshToken {
				value: refresh.clone(),
				subject: current.subject.clone(),
				session: current.session.clone(),
				issued_at: now,
			};

			self.storage.replace_refresh(current, &renewed).await.map_err(TokenFailure::storage)?;
		}

		let written = self.storage.replace_access(current, &token).await;

		drop(guard);

		if self.storage.requires_recommit() {
			self.session.mark_dirty();
		}
		if let Err(e) = written {
			if rotated {
				warn_event!(
					scheme = %context.scheme,
					error = %e,
					"Refresh token rotated but the renewed access token was not stored."
				);
			}

			return Err(TokenFailure::storage(e));
		}

		self.services.events.renewed(&RenewalSuccess {
			scheme: context.scheme.clone(),
			subject: context.subject.clone(),
			session: context.session.clone(),
			old_refresh: TokenSecret::new(refresh_value),
			new_refresh: refresh,
			expires_at,
		});

		Ok(token)
	}

	fn report(&self, context: Option<&HandlerContext>, failure: &TokenFailure) {
		warn_event!(
			scheme = %self.session.scheme(),
			reason = %failure.reason,
			message = %failure.message,
			"Access token renewal failed."
		);

		self.services.events.failed(&RenewalFailure {
			scheme: self.session.scheme().clone(),
			subject: context.map(|context| context.subject.clone()),
			session: context.map(|context| context.session.clone()),
			reason: failure.reason,
			message: failure.message.clone(),
		});
	}
}
impl Debug for AccessTokenHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessTokenHandler")
			.field("scheme", self.session.scheme())
			.field("strategy", &self.storage.strategy())
			.finish_non_exhaustive()
	}
}

type RequiredFields = (TokenSecret, TokenSecret, u64, Option<ScopeSet>);

fn required_fields(response: TokenExchangeResponse) -> Result<RequiredFields, TokenFailure> {
	let TokenExchangeResponse { access_token, refresh_token, expires_in, scope, .. } = response;
	let access = access_token.filter(|t| !t.expose().is_empty()).ok_or_else(|| {
		TokenFailure::new(
			TokenFailureReason::MissingAccessTokenInResponse,
			"Token endpoint response has no access_token.",
		)
	})?;
	let refresh = refresh_token.filter(|t| !t.expose().is_empty()).ok_or_else(|| {
		TokenFailure::new(
			TokenFailureReason::MissingRefreshTokenInResponse,
			"Token endpoint response has no refresh_token.",
		)
	})?;
	let expires_in = expires_in.ok_or_else(|| {
		TokenFailure::new(
			TokenFailureReason::MissingExpiryInResponse,
			"Token endpoint response has no expires_in.",
		)
	})?;

	Ok((access, refresh, expires_in, scope))
}
