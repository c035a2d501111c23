//! Renewal notifications and counters.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{SchemeName, SessionId, SubjectId, TokenSecret},
	handler::TokenFailureReason,
};

/// Observer of access token renewals.
///
/// Callbacks run inline on the renewing request and must not block.
pub trait RenewalEvents
where
	Self: Send + Sync,
{
	/// A renewal for `scheme` is starting.
	fn attempting(&self, _scheme: &SchemeName) {}

	/// A renewal succeeded.
	fn renewed(&self, _event: &RenewalSuccess) {}

	/// A renewal failed.
	fn failed(&self, _event: &RenewalFailure) {}
}

/// Details of a successful renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalSuccess {
	/// Scheme the tokens belong to.
	pub scheme: SchemeName,
	/// Token owner.
	pub subject: SubjectId,
	/// Local session.
	pub session: SessionId,
	/// Refresh token submitted to the provider.
	pub old_refresh: TokenSecret,
	/// Refresh token returned by the provider; equal to `old_refresh` unless rotated.
	pub new_refresh: TokenSecret,
	/// Expiry of the new access token.
	pub expires_at: OffsetDateTime,
}
impl RenewalSuccess {
	/// Returns `true` when the provider rotated the refresh token.
	pub fn rotated(&self) -> bool {
		self.old_refresh != self.new_refresh
	}
}

/// Details of a failed renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalFailure {
	/// Scheme the renewal ran for.
	pub scheme: SchemeName,
	/// Token owner, when the handler was authenticated.
	pub subject: Option<SubjectId>,
	/// Local session, when the handler was authenticated.
	pub session: Option<SessionId>,
	/// Failure category.
	pub reason: TokenFailureReason,
	/// Failure description.
	pub message: String,
}

/// Observer ignoring every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvents;
impl RenewalEvents for NoopEvents {}

/// Thread-safe counters for renewal attempts.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	rotations: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the total number of renewal attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful renewals.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed renewals.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that rotated the refresh token.
	pub fn rotations(&self) -> u64 {
		self.rotations.load(Ordering::Relaxed)
	}
}
impl RenewalEvents for RenewalMetrics {
	fn attempting(&self, _scheme: &SchemeName) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn renewed(&self, event: &RenewalSuccess) {
		self.success.fetch_add(1, Ordering::Relaxed);

		if event.rotated() {
			self.rotations.fetch_add(1, Ordering::Relaxed);
		}
	}

	fn failed(&self, _event: &RenewalFailure) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
