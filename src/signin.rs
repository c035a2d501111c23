//! Post-authorization sign-in: reconciles a completed external authorization with the local
//! session, persists the obtained tokens, and commits the resulting identity.
//!
//! The orchestrator moves through [`SignInState`]s and never raises; every failure is cleaned up
//! and translated into a [`SignInOutcome`] that leaks no internal detail.

// self
use crate::{
	_prelude::*,
	auth::{
		Clock, IdentifierError, SchemeName, ScopeSet, SessionId, SubjectId, SystemClock, TokenKind,
		TokenSecret,
	},
	claims::{
		Claim, ClaimsError, ClaimsPipeline, IssuerClaimToggles, RequiredClaims, TransformContext,
		extract_external_claims, types,
	},
	exchange::RemoteTokenExchange,
	handler::{AccessTokenHandler, AccessTokenStoreRequest, TicketPolicy, TokenFailure},
	identity::Identity,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, debug_event, warn_event},
	provider::{HandlerInit, TokenHandlerProvider},
	session::{
		AuthTicket, DeferredCommit, PendingCommit, PropertyBag, RandomSessionIds, SessionCommitter,
		SessionError, SessionIdGenerator,
	},
	validate::{self, JwtPayload},
};

/// OAuth tokens returned by the external authorization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalTokens {
	/// Access token.
	pub access_token: Option<TokenSecret>,
	/// Refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Access token expiry, when the external scheme reported one.
	pub expires_at: Option<OffsetDateTime>,
	/// Scopes granted by the authorization.
	pub scopes: ScopeSet,
}

/// Result of authenticating the external scheme after the authorization-code flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalAuthResult {
	/// Whether the external scheme authenticated.
	pub succeeded: bool,
	/// Claims the provider asserted.
	pub claims: Vec<Claim>,
	/// Tokens the provider issued.
	pub tokens: ExternalTokens,
	/// Properties of the external authentication, carrying the return URL.
	pub properties: PropertyBag,
}
impl ExternalAuthResult {
	/// Successful result.
	pub fn success(claims: Vec<Claim>, tokens: ExternalTokens, properties: PropertyBag) -> Self {
		Self { succeeded: true, claims, tokens, properties }
	}

	/// Failed result.
	pub fn failure() -> Self {
		Self::default()
	}
}

/// Sign-in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignInState {
	/// External result accepted for processing.
	#[default]
	Initialized,
	/// Identity built and its commit scheduled.
	SignedIn,
	/// Tokens persisted through the access token handler.
	TokensPersisted,
	/// Local session committed.
	Committed,
	/// Sign-in aborted and cleaned up.
	Failed,
}

/// Why a sign-in aborted.
#[derive(Debug, ThisError)]
pub enum SignInFailure {
	/// External scheme did not authenticate.
	#[error("External authentication did not succeed.")]
	AuthenticationFailed,
	/// External result lacked a required token.
	#[error("External authentication returned no {0}.")]
	MissingTokens(&'static str),
	/// External result lacked a subject claim.
	#[error("External authentication returned no subject.")]
	MissingSubject,
	/// External subject failed validation.
	#[error(transparent)]
	Subject(#[from] IdentifierError),
	/// Claims pipeline aborted.
	#[error(transparent)]
	Claims(#[from] ClaimsError),
	/// Host session collaborator failed.
	#[error(transparent)]
	Session(#[from] SessionError),
	/// Token handler failed.
	#[error(transparent)]
	Token(#[from] TokenFailure),
	/// Handler lookup failed.
	#[error(transparent)]
	Setup(#[from] Error),
}

/// What the host should answer with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInOutcome {
	/// Redirect to a path.
	Redirect(String),
	/// Answer `401 Unauthorized` with a generic message.
	Unauthorized {
		/// Local scheme the sign-in targeted.
		scheme: SchemeName,
		/// Body text.
		message: String,
	},
}

/// Static inputs of a sign-in.
#[derive(Clone, Debug)]
pub struct SignInSettings {
	/// Scheme the local session is committed to.
	pub local_scheme: SchemeName,
	/// Scheme holding the external authorization result.
	pub external_scheme: SchemeName,
	/// Redirect target on failure; `None` answers `401`.
	pub failure_path: Option<String>,
	/// Issuer of claims added by the crate.
	pub claims_issuer: String,
	/// Optional provider claims copied into the identity.
	pub issuer_claims: IssuerClaimToggles,
	/// SSO authentication type and subject prefix.
	pub policy: TicketPolicy,
}
impl SignInSettings {
	/// Default issuer of claims added by the crate.
	pub const DEFAULT_CLAIMS_ISSUER: &str = "sso";

	/// Creates settings for `local_scheme` and `external_scheme`.
	pub fn new(local_scheme: SchemeName, external_scheme: SchemeName) -> Self {
		Self {
			local_scheme,
			external_scheme,
			failure_path: None,
			claims_issuer: Self::DEFAULT_CLAIMS_ISSUER.into(),
			issuer_claims: IssuerClaimToggles::default(),
			policy: TicketPolicy::default(),
		}
	}

	/// Redirects failures to `path`.
	pub fn with_failure_path(mut self, path: impl Into<String>) -> Self {
		self.failure_path = Some(path.into());

		self
	}
}

/// Drives one sign-in from the external result to the committed local session.
pub struct SignInOrchestrator {
	settings: SignInSettings,
	provider: Arc<TokenHandlerProvider>,
	committer: Arc<dyn SessionCommitter>,
	exchange: Arc<dyn RemoteTokenExchange>,
	pipeline: ClaimsPipeline,
	session_ids: Arc<dyn SessionIdGenerator>,
	clock: Arc<dyn Clock>,
	commit: DeferredCommit,
	state: SignInState,
	persisted: Option<AccessTokenHandler>,
	revoked: HashSet<String>,
}
impl SignInOrchestrator {
	/// Creates an orchestrator with the default pipeline, random session ids, and the wall clock.
	pub fn new(
		settings: SignInSettings,
		provider: Arc<TokenHandlerProvider>,
		committer: Arc<dyn SessionCommitter>,
		exchange: Arc<dyn RemoteTokenExchange>,
	) -> Self {
		Self {
			settings,
			provider,
			committer,
			exchange,
			pipeline: ClaimsPipeline::default(),
			session_ids: Arc::new(RandomSessionIds),
			clock: Arc::new(SystemClock),
			commit: DeferredCommit::default(),
			state: SignInState::default(),
			persisted: None,
			revoked: HashSet::new(),
		}
	}

	/// Replaces the claims pipeline.
	pub fn with_pipeline(mut self, pipeline: ClaimsPipeline) -> Self {
		self.pipeline = pipeline;

		self
	}

	/// Replaces the session id generator.
	pub fn with_session_ids(mut self, session_ids: Arc<dyn SessionIdGenerator>) -> Self {
		self.session_ids = session_ids;

		self
	}

	/// Replaces the clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Current state.
	pub fn state(&self) -> SignInState {
		self.state
	}

	/// Runs the sign-in for `result`.
	pub async fn run(&mut self, result: &ExternalAuthResult) -> SignInOutcome {
		let span = FlowSpan::new(FlowKind::SignIn, "sign_in");

		span.instrument(async move {
			obs::record_flow_outcome(FlowKind::SignIn, FlowOutcome::Attempt);

			match self.sign_in(result).await {
				Ok(()) => {
					obs::record_flow_outcome(FlowKind::SignIn, FlowOutcome::Success);

					self.succeed(result).await
				},
				Err(failure) => {
					obs::record_flow_outcome(FlowKind::SignIn, FlowOutcome::Failure);

					self.state = SignInState::Failed;

					self.fail(result, &failure).await
				},
			}
		})
		.await
	}

	async fn sign_in(&mut self, result: &ExternalAuthResult) -> Result<(), SignInFailure> {
		self.state = SignInState::Initialized;

		if !result.succeeded {
			return Err(SignInFailure::AuthenticationFailed);
		}

		let access = present(&result.tokens.access_token)
			.ok_or(SignInFailure::MissingTokens("access token"))?;
		let refresh = present(&result.tokens.refresh_token)
			.ok_or(SignInFailure::MissingTokens("refresh token"))?;
		let raw_subject = result
			.claims
			.iter()
			.find(|claim| claim.is(types::SUBJECT))
			.map(|claim| claim.value.as_str())
			.filter(|value| !value.is_empty())
			.ok_or(SignInFailure::MissingSubject)?;
		let subject = SubjectId::with_prefix(raw_subject, &self.settings.policy.subject_prefix)?;
		let session = self.reconcile_session(&subject).await?;
		let identity = self.build_identity(result).await?;
		let mut properties = PropertyBag::default();

		properties.set_session_id(&session);

		if let Some(url) = result.properties.return_url() {
			properties.set_return_url(url);
		}

		self.commit.schedule(PendingCommit {
			scheme: self.settings.local_scheme.clone(),
			identity: identity.clone(),
			properties: properties.clone(),
		});
		self.state = SignInState::SignedIn;

		let handler =
			self.provider.access_handler(&self.settings.local_scheme, HandlerInit::Deferred).await?;

		if !handler.attach(Some(AuthTicket::new(identity, properties))).await {
			return Err(TokenFailure::not_authenticated().into());
		}

		self.persisted = Some(handler.clone());

		let request = AccessTokenStoreRequest {
			subject,
			granted_scopes: granted_scopes(&result.tokens, access.expose()),
			expires_at: access_expiry(&result.tokens, access.expose())
				.ok_or(SignInFailure::MissingTokens("access token expiry"))?,
			access_token: access,
			refresh_token: refresh,
			issued_at: self.clock.now(),
		};

		handler.store_tokens(&request).await?;

		let context = handler.context().await.ok_or_else(TokenFailure::not_authenticated)?;

		self.commit.schedule(PendingCommit {
			scheme: self.settings.local_scheme.clone(),
			identity: context.identity,
			properties: context.properties,
		});
		self.state = SignInState::TokensPersisted;
		self.commit.execute(self.committer.as_ref()).await?;
		self.state = SignInState::Committed;

		Ok(())
	}

	async fn reconcile_session(&self, subject: &SubjectId) -> Result<SessionId, SignInFailure> {
		let local = self.provider.authenticator().authenticate(&self.settings.local_scheme).await?;
		let reused = local
			.filter(|ticket| {
				self.settings.policy.subject_of(&ticket.identity).as_ref() == Some(subject)
			})
			.and_then(|ticket| ticket.properties.session_id());

		match reused {
			Some(session) => {
				debug_event!(session = %session, "Reusing the local session of the same subject.");

				Ok(session)
			},
			None => Ok(self.session_ids.generate()),
		}
	}

	async fn build_identity(&self, result: &ExternalAuthResult) -> Result<Identity, SignInFailure> {
		let issuer = self.settings.claims_issuer.as_str();
		let claims = extract_external_claims(&result.claims, &self.settings.issuer_claims, issuer);
		let mut context = TransformContext::new(claims, issuer, &result.tokens, &result.claims);

		self.pipeline.run(&mut context).await?;

		let claims = context.into_claims();

		RequiredClaims::validate(&claims)?;

		Ok(Identity::new(self.settings.policy.authentication_type.clone()).with_claims(claims))
	}

	async fn succeed(&self, result: &ExternalAuthResult) -> SignInOutcome {
		if let Err(e) = self.committer.sign_out(&self.settings.external_scheme).await {
			warn_event!(error = %e, "Failed to sign out of the external scheme.");
		}

		SignInOutcome::Redirect(local_return_url(result.properties.return_url()))
	}

	async fn fail(
		&mut self,
		result: &ExternalAuthResult,
		failure: &SignInFailure,
	) -> SignInOutcome {
		let scheme = self.settings.local_scheme.clone();

		warn_event!(
			scheme = %scheme,
			error = %failure,
			succeeded = result.succeeded,
			"Failed to sign in."
		);

		self.commit.cancel();

		for target in [&self.settings.external_scheme, &scheme] {
			if let Err(e) = self.committer.sign_out(target).await {
				warn_event!(scheme = %target, error = %e, "Cleanup sign-out failed.");
			}
		}

		if let Some(handler) = self.persisted.take() {
			let discarded = handler.discard().await;

			if let Err(e) = discarded {
				warn_event!(scheme = %scheme, error = %e, "Cleanup token discard failed.");
			}
		}

		let unrevoked = present(&result.tokens.refresh_token)
			.filter(|refresh| self.revoked.insert(refresh.expose().to_owned()));

		if let Some(refresh) = unrevoked {
			let revoked = self.exchange.revoke(TokenKind::Refresh, refresh.expose()).await;

			if let Err(e) = revoked {
				warn_event!(scheme = %scheme, error = %e, "Cleanup token revocation failed.");
			}
		}

		match &self.settings.failure_path {
			Some(path) => SignInOutcome::Redirect(path.clone()),
			None => SignInOutcome::Unauthorized {
				message: format!("Failed to sign in using authentication scheme: {scheme}"),
				scheme,
			},
		}
	}
}
impl Debug for SignInOrchestrator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignInOrchestrator")
			.field("settings", &self.settings)
			.field("pipeline", &self.pipeline)
			.field("state", &self.state)
			.finish_non_exhaustive()
	}
}

fn present(token: &Option<TokenSecret>) -> Option<TokenSecret> {
	token.clone().filter(|token| !token.expose().is_empty())
}

fn granted_scopes(tokens: &ExternalTokens, access_token: &str) -> ScopeSet {
	if tokens.scopes.is_empty() {
		validate::granted_scopes(access_token).unwrap_or_default()
	} else {
		tokens.scopes.clone()
	}
}

fn access_expiry(tokens: &ExternalTokens, access_token: &str) -> Option<OffsetDateTime> {
	tokens.expires_at.or_else(|| {
		JwtPayload::decode(access_token)
			.ok()
			.and_then(|payload| payload.exp)
			.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
	})
}

/// Keeps local, path-absolute return URLs and falls back to `/` for anything else.
pub fn local_return_url(raw: Option<&str>) -> String {
	match raw {
		Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.starts_with("/\\") =>
			url.to_owned(),
		_ => "/".into(),
	}
}
