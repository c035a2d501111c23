//! Refresh token handler.

// self
use crate::{
	_prelude::*,
	auth::TokenKind,
	handler::{
		HandlerContext, HandlerServices, RefreshTokenResult, RevocationResult, SchemeSession,
		TokenFailure, TokenFailureReason, TokenStorage,
	},
	session::AuthTicket,
};

/// Serves the stored refresh token of one scheme.
#[derive(Clone)]
pub struct RefreshTokenHandler {
	pub(crate) session: Arc<SchemeSession>,
	pub(crate) storage: Arc<dyn TokenStorage>,
	pub(crate) services: Arc<HandlerServices>,
}
impl RefreshTokenHandler {
	/// Creates a handler over `session`, reading tokens through `storage`.
	pub fn new(
		session: Arc<SchemeSession>,
		storage: Arc<dyn TokenStorage>,
		services: Arc<HandlerServices>,
	) -> Self {
		Self { session, storage, services }
	}

	/// Replaces the handler context with one derived from `ticket`.
	pub async fn attach(&self, ticket: Option<AuthTicket>) -> bool {
		self.session.attach(ticket).await
	}

	/// Copy of the authenticated context, if any.
	pub async fn context(&self) -> Option<HandlerContext> {
		self.session.snapshot().await
	}

	/// Shared session of this handler's scheme.
	pub fn session(&self) -> &Arc<SchemeSession> {
		&self.session
	}

	/// Storage strategy in use.
	pub fn storage(&self) -> &Arc<dyn TokenStorage> {
		&self.storage
	}

	/// Returns the stored refresh token.
	pub async fn request_token(&self) -> RefreshTokenResult {
		let Some(context) = self.session.snapshot().await else {
			return Err(TokenFailure::not_authenticated());
		};

		self.load(&context).await
	}

	/// Revokes the stored refresh token at the provider.
	///
	/// Succeeds with [`RevocationOutcome::Absent`](crate::handler::RevocationOutcome::Absent)
	/// when nothing is stored.
	pub async fn revoke(&self) -> RevocationResult {
		let Some(context) = self.session.snapshot().await else {
			return Err(TokenFailure::not_authenticated());
		};
		let stored = self.storage.load_refresh(&context).await.map_err(TokenFailure::storage)?;

		super::revoke_stored(
			&self.services,
			self.session.scheme(),
			TokenKind::Refresh,
			stored.map(|token| token.value),
		)
		.await
	}

	/// Removes every stored token of the context, returning how many were removed.
	pub async fn discard(&self) -> Result<usize, TokenFailure> {
		super::discard_stored(&self.session, self.storage.as_ref()).await
	}

	pub(crate) async fn load(&self, context: &HandlerContext) -> RefreshTokenResult {
		match self.storage.load_refresh(context).await {
			Ok(Some(token)) => Ok(token),
			Ok(None) => Err(TokenFailure::new(
				TokenFailureReason::MissingRefreshToken,
				format!("No refresh token is stored for scheme `{}`.", context.scheme),
			)),
			Err(e) => Err(TokenFailure::storage(e)),
		}
	}
}
impl Debug for RefreshTokenHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshTokenHandler")
			.field("scheme", self.session.scheme())
			.field("strategy", &self.storage.strategy())
			.finish_non_exhaustive()
	}
}
