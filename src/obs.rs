//! Observability helpers for token lifecycle flows.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `oauth2_identity.flow` with `flow` and `stage` fields,
//!   plus warn/debug events on failure and cleanup paths.
//! - `metrics` increments the `oauth2_identity_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

pub(crate) use self::tracing::{debug_event, warn_event};
#[cfg(not(feature = "tracing"))]
pub(crate) use self::tracing::event_fields;

// self
use crate::_prelude::*;

/// Lifecycle flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Access token renewal through a refresh token.
	Renewal,
	/// Remote token revocation.
	Revocation,
	/// Post-authorization sign-in.
	SignIn,
	/// Local sign-out with token cleanup.
	SignOut,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Renewal => "renewal",
			FlowKind::Revocation => "revocation",
			FlowKind::SignIn => "sign_in",
			FlowKind::SignOut => "sign_out",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Flow started.
	Attempt,
	/// Flow completed.
	Success,
	/// Flow ended in a failure result.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
