//! Clock abstraction and the proactive renewal policy.

// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);
impl FixedClock {
	/// Creates a clock frozen at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Mutex::new(instant))
	}

	/// Moves the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// Decides when an access token must be renewed ahead of its expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
	margin: Duration,
}
impl ExpiryPolicy {
	/// Default skew margin applied before expiry.
	pub const DEFAULT_MARGIN: Duration = Duration::minutes(5);

	/// Creates a policy renewing `margin` before expiry; negative margins clamp to zero.
	pub fn new(margin: Duration) -> Self {
		Self { margin: if margin.is_negative() { Duration::ZERO } else { margin } }
	}

	/// Returns the configured margin.
	pub fn margin(&self) -> Duration {
		self.margin
	}

	/// Derives the absolute expiry from a relative `expires_in` in seconds.
	pub fn expires_at(&self, now: OffsetDateTime, expires_in_secs: u64) -> OffsetDateTime {
		let secs = i64::try_from(expires_in_secs).unwrap_or(i64::MAX);

		now.checked_add(Duration::seconds(secs)).unwrap_or(now)
	}

	/// Returns `true` once `now` falls within the margin of `expires_at`.
	pub fn needs_renewal(&self, expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
		match expires_at.checked_sub(self.margin) {
			Some(threshold) => now >= threshold,
			None => true,
		}
	}
}
impl Default for ExpiryPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MARGIN)
	}
}
