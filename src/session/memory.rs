//! In-process session host for local development and tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::SchemeName,
	identity::Identity,
	session::{AuthTicket, PropertyBag, SchemeAuthenticator, SessionCommitter, SessionFuture},
};

/// Keeps one ticket per scheme in memory, standing in for the host's cookie handlers.
#[derive(Clone, Debug, Default)]
pub struct MemorySessions(Arc<MemorySessionsInner>);
impl MemorySessions {
	/// Seeds `scheme` with `ticket`.
	pub fn insert(&self, scheme: SchemeName, ticket: AuthTicket) {
		self.0.tickets.write().insert(scheme, ticket);
	}

	/// Ticket currently held for `scheme`.
	pub fn ticket(&self, scheme: &SchemeName) -> Option<AuthTicket> {
		self.0.tickets.read().get(scheme).cloned()
	}

	/// Number of commits performed.
	pub fn commits(&self) -> usize {
		self.0.commits.load(Ordering::Relaxed)
	}

	/// Number of authentications performed.
	pub fn authentications(&self) -> usize {
		self.0.authentications.load(Ordering::Relaxed)
	}

	/// Schemes signed out, in call order.
	pub fn signed_out(&self) -> Vec<SchemeName> {
		self.0.signed_out.lock().clone()
	}
}
impl SchemeAuthenticator for MemorySessions {
	fn authenticate<'a>(&'a self, scheme: &'a SchemeName) -> SessionFuture<'a, Option<AuthTicket>> {
		Box::pin(async move {
			self.0.authentications.fetch_add(1, Ordering::Relaxed);

			Ok(self.ticket(scheme))
		})
	}
}
impl SessionCommitter for MemorySessions {
	fn commit<'a>(
		&'a self,
		scheme: &'a SchemeName,
		identity: Identity,
		properties: PropertyBag,
	) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			self.0.commits.fetch_add(1, Ordering::Relaxed);
			self.insert(scheme.clone(), AuthTicket::new(identity, properties));

			Ok(())
		})
	}

	fn sign_out<'a>(&'a self, scheme: &'a SchemeName) -> SessionFuture<'a, ()> {
		Box::pin(async move {
			self.0.tickets.write().remove(scheme);
			self.0.signed_out.lock().push(scheme.clone());

			Ok(())
		})
	}
}

#[derive(Debug, Default)]
struct MemorySessionsInner {
	tickets: RwLock<HashMap<SchemeName, AuthTicket>>,
	signed_out: Mutex<Vec<SchemeName>>,
	commits: AtomicUsize,
	authentications: AtomicUsize,
}
