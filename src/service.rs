//! Request-scoped facade over the handler provider.
//!
//! The outer [`Result`] carries setup and session-backend errors; the inner result is the typed
//! token lifecycle outcome.

// self
use crate::{
	_prelude::*,
	auth::{SchemeName, TokenKind},
	handler::{AccessTokenResult, RefreshTokenResult, RevocationResult, TokenFailure},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, warn_event},
	provider::{HandlerInit, TokenHandlerProvider},
	session::SessionCommitter,
};

/// What [`TokenService::sign_out`] did besides signing the scheme out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignOutOutcome {
	/// Remote revocation of the refresh token.
	pub revocation: RevocationResult,
	/// Number of stored tokens discarded.
	pub discarded: Result<usize, TokenFailure>,
}

/// Token operations for one request.
pub struct TokenService {
	provider: Arc<TokenHandlerProvider>,
	committer: Arc<dyn SessionCommitter>,
}
impl TokenService {
	/// Creates a service over the request's `provider`, writing sessions through `committer`.
	pub fn new(provider: Arc<TokenHandlerProvider>, committer: Arc<dyn SessionCommitter>) -> Self {
		Self { provider, committer }
	}

	/// Handler provider of the request.
	pub fn provider(&self) -> &Arc<TokenHandlerProvider> {
		&self.provider
	}

	/// Returns a fresh access token for `scheme`, renewing it when needed.
	pub async fn request_access_token(&self, scheme: &SchemeName) -> Result<AccessTokenResult> {
		let handler = self.provider.access_handler(scheme, HandlerInit::Initialize).await?;

		Ok(handler.request_token().await)
	}

	/// Returns the stored refresh token of `scheme`.
	pub async fn request_refresh_token(&self, scheme: &SchemeName) -> Result<RefreshTokenResult> {
		let handler = self.provider.refresh_handler(scheme, HandlerInit::Initialize).await?;

		Ok(handler.request_token().await)
	}

	/// Revokes the stored token of `kind` at the provider.
	///
	/// The token is read from the handler of that same kind.
	pub async fn revoke_remote_token(
		&self,
		scheme: &SchemeName,
		kind: TokenKind,
	) -> Result<RevocationResult> {
		let revocation = match kind {
			TokenKind::Access => {
				let handler = self.provider.access_handler(scheme, HandlerInit::Initialize).await?;

				handler.revoke().await
			},
			TokenKind::Refresh => {
				let handler = self.provider.refresh_handler(scheme, HandlerInit::Initialize).await?;

				handler.revoke().await
			},
		};

		Ok(revocation)
	}

	/// Revokes the refresh token, discards stored tokens, and signs the local `scheme` out.
	///
	/// Revocation and discard failures are reported in the outcome and do not stop the sign-out.
	pub async fn sign_out(&self, scheme: &SchemeName) -> Result<SignOutOutcome> {
		let span = FlowSpan::new(FlowKind::SignOut, "token_service_sign_out");

		span.instrument(async move {
			obs::record_flow_outcome(FlowKind::SignOut, FlowOutcome::Attempt);

			let result = self.sign_out_inner(scheme).await;
			let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

			obs::record_flow_outcome(FlowKind::SignOut, outcome);

			result
		})
		.await
	}

	/// Re-commits sessions whose embedded tokens changed during the request.
	pub async fn finish_response(&self) -> Result<usize> {
		self.provider.finish_response(self.committer.as_ref()).await
	}

	async fn sign_out_inner(&self, scheme: &SchemeName) -> Result<SignOutOutcome> {
		let handler = self.provider.refresh_handler(scheme, HandlerInit::Initialize).await?;
		let revocation = handler.revoke().await;

		if let Err(failure) = &revocation {
			warn_event!(scheme = %scheme, reason = %failure.reason, "Sign-out revocation failed.");
		}

		let discarded = handler.discard().await;

		if let Err(failure) = &discarded {
			warn_event!(scheme = %scheme, reason = %failure.reason, "Sign-out discard failed.");
		}

		self.committer.sign_out(scheme).await?;

		Ok(SignOutOutcome { revocation, discarded })
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService").field("provider", &self.provider).finish_non_exhaustive()
	}
}
