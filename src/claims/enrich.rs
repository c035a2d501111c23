//! Profile enrichment: organization, alliance, and portrait claims looked up per subject.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_SUBJECT_PREFIX, strip_subject_prefix},
	claims::{Claim, ClaimsError, ClaimsFuture, ClaimsTransformer, TransformContext, types},
};

/// Failure reported by a [`ProfileSource`].
pub type ProfileError = Box<dyn StdError + Send + Sync>;
/// Boxed future returned by [`ProfileSource::fetch`].
pub type ProfileFuture<'a> =
	Pin<Box<dyn Future<Output = Result<SubjectProfile, ProfileError>> + 'a + Send>>;

/// Looks up public profile data for a subject.
pub trait ProfileSource
where
	Self: Send + Sync,
{
	/// Fetches the profile of the normalized `subject`.
	fn fetch<'a>(&'a self, subject: &'a str) -> ProfileFuture<'a>;
}

/// Public profile data of a subject.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectProfile {
	/// Organization identifier.
	pub organization: Option<String>,
	/// Alliance identifier.
	pub alliance: Option<String>,
	/// Portrait image URL.
	pub portrait: Option<Url>,
}

/// Switches for the claims [`ProfileEnricher`] may add.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentToggles {
	/// Add [`types::ORGANIZATION`].
	pub organization: bool,
	/// Add [`types::ALLIANCE`].
	pub alliance: bool,
	/// Add [`types::PORTRAIT`].
	pub portrait: bool,
}
impl Default for EnrichmentToggles {
	fn default() -> Self {
		Self { organization: true, alliance: true, portrait: true }
	}
}

/// Adds profile claims for the subject being signed in.
///
/// A failed lookup aborts the pipeline; absent profile fields only skip their claim.
#[derive(Clone)]
pub struct ProfileEnricher {
	source: Arc<dyn ProfileSource>,
	toggles: EnrichmentToggles,
	prefix: String,
}
impl ProfileEnricher {
	/// Enriches from `source` with every claim enabled.
	pub fn new(source: Arc<dyn ProfileSource>) -> Self {
		Self {
			source,
			toggles: EnrichmentToggles::default(),
			prefix: DEFAULT_SUBJECT_PREFIX.into(),
		}
	}

	/// Overrides which claims are added.
	pub fn with_toggles(mut self, toggles: EnrichmentToggles) -> Self {
		self.toggles = toggles;

		self
	}

	/// Overrides the subject prefix stripped before lookup.
	pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();

		self
	}

	fn apply(&self, context: &mut TransformContext<'_>, profile: SubjectProfile) {
		let SubjectProfile { organization, alliance, portrait } = profile;
		let issuer = context.issuer().to_owned();

		if let Some(organization) = organization.filter(|_| self.toggles.organization) {
			context.claims.push(
				Claim::new(types::ORGANIZATION, organization)
					.with_value_type(Claim::INTEGER)
					.with_issuer(&issuer),
			);
		}
		if let Some(alliance) = alliance.filter(|_| self.toggles.alliance) {
			context.claims.push(
				Claim::new(types::ALLIANCE, alliance)
					.with_value_type(Claim::INTEGER)
					.with_issuer(&issuer),
			);
		}
		if let Some(portrait) = portrait.filter(|_| self.toggles.portrait) {
			context.add(types::PORTRAIT, without_size(portrait));
		}
	}
}
impl ClaimsTransformer for ProfileEnricher {
	fn transform<'a>(&'a self, context: &'a mut TransformContext<'_>) -> ClaimsFuture<'a> {
		Box::pin(async move {
			let Some(raw) = context.find_first(types::SUBJECT) else {
				return Ok(());
			};
			let subject = strip_subject_prefix(raw, &self.prefix).to_owned();
			let profile = self
				.source
				.fetch(&subject)
				.await
				.map_err(|source| ClaimsError::Enrichment { subject, source })?;

			self.apply(context, profile);

			Ok(())
		})
	}
}
impl Debug for ProfileEnricher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProfileEnricher")
			.field("toggles", &self.toggles)
			.field("prefix", &self.prefix)
			.finish()
	}
}

fn without_size(mut url: Url) -> String {
	let kept = url
		.query_pairs()
		.filter(|(key, _)| key != "size")
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect::<Vec<_>>();

	if kept.is_empty() {
		url.set_query(None);
	} else {
		url.query_pairs_mut().clear().extend_pairs(kept);
	}

	url.into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::signin::ExternalTokens;

	struct Fixed(Option<SubjectProfile>);
	impl ProfileSource for Fixed {
		fn fetch<'a>(&'a self, subject: &'a str) -> ProfileFuture<'a> {
			Box::pin(async move {
				assert_eq!(subject, "2112");

				self.0.clone().ok_or_else(|| ProfileError::from("profile service unavailable"))
			})
		}
	}

	fn portrait() -> Url {
		Url::parse("https://images.example.com/character/2112/portrait?tenant=tq&size=64")
			.expect("Portrait fixture should parse.")
	}

	#[test]
	fn size_is_dropped_from_portrait_urls() {
		assert_eq!(
			without_size(portrait()),
			"https://images.example.com/character/2112/portrait?tenant=tq"
		);

		let only_size = Url::parse("https://images.example.com/p?size=128")
			.expect("Portrait fixture should parse.");

		assert_eq!(without_size(only_size), "https://images.example.com/p");
	}

	#[tokio::test]
	async fn enrichment_adds_present_and_enabled_claims() {
		let tokens = ExternalTokens::default();
		let mut context = TransformContext::new(
			vec![Claim::new(types::SUBJECT, "CHARACTER:EVE:2112")],
			"login.example.com",
			&tokens,
			&[],
		);
		let profile = SubjectProfile {
			organization: Some("98000001".into()),
			alliance: None,
			portrait: Some(portrait()),
		};
		let enricher = ProfileEnricher::new(Arc::new(Fixed(Some(profile))))
			.with_toggles(EnrichmentToggles { portrait: false, ..Default::default() });

		enricher.transform(&mut context).await.expect("Enrichment should succeed.");

		assert_eq!(context.find_first(types::ORGANIZATION), Some("98000001"));
		assert!(context.find_first(types::ALLIANCE).is_none());
		assert!(context.find_first(types::PORTRAIT).is_none());
	}

	#[tokio::test]
	async fn lookup_failure_is_terminal() {
		let tokens = ExternalTokens::default();
		let mut context = TransformContext::new(
			vec![Claim::new(types::SUBJECT, "2112")],
			"login.example.com",
			&tokens,
			&[],
		);
		let err = ProfileEnricher::new(Arc::new(Fixed(None)))
			.transform(&mut context)
			.await
			.expect_err("Lookup failure must abort the pipeline.");

		assert!(matches!(err, ClaimsError::Enrichment { ref subject, .. } if subject == "2112"));
	}
}
