//! Ordered claims transformation.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_SUBJECT_PREFIX, strip_subject_prefix},
	claims::{Claim, ClaimsError, types},
	signin::ExternalTokens,
};

/// Boxed future returned by [`ClaimsTransformer::transform`].
pub type ClaimsFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClaimsError>> + 'a + Send>>;

/// Single step of a [`ClaimsPipeline`].
pub trait ClaimsTransformer
where
	Self: Send + Sync,
{
	/// Rewrites, adds, or removes claims in `context`.
	fn transform<'a>(&'a self, context: &'a mut TransformContext<'_>) -> ClaimsFuture<'a>;
}

/// State threaded through a [`ClaimsPipeline`] run.
///
/// Only [`claims`](Self::claims) is mutable; the issuer, the raw OAuth tokens, and the raw
/// external claims are read-only inputs.
#[derive(Debug)]
pub struct TransformContext<'a> {
	/// Claims that will be committed with the identity.
	pub claims: Vec<Claim>,
	issuer: &'a str,
	tokens: &'a ExternalTokens,
	external_claims: &'a [Claim],
}
impl<'a> TransformContext<'a> {
	/// Starts a run over `claims`.
	pub fn new(
		claims: Vec<Claim>,
		issuer: &'a str,
		tokens: &'a ExternalTokens,
		external_claims: &'a [Claim],
	) -> Self {
		Self { claims, issuer, tokens, external_claims }
	}

	/// Issuer assigned to claims added during the run.
	pub fn issuer(&self) -> &str {
		self.issuer
	}

	/// OAuth tokens returned by the external authorization.
	pub fn tokens(&self) -> &ExternalTokens {
		self.tokens
	}

	/// Every claim the external scheme asserted, before filtering.
	pub fn external_claims(&self) -> &[Claim] {
		self.external_claims
	}

	/// Value of the first claim of `claim_type`.
	pub fn find_first(&self, claim_type: &str) -> Option<&str> {
		self.claims.iter().find(|claim| claim.is(claim_type)).map(|claim| claim.value.as_str())
	}

	/// Appends a string claim carrying the run's issuer.
	pub fn add(&mut self, claim_type: &str, value: impl Into<String>) {
		let claim = Claim::new(claim_type, value).with_issuer(self.issuer);

		self.claims.push(claim);
	}

	/// Consumes the context, returning the transformed claims.
	pub fn into_claims(self) -> Vec<Claim> {
		self.claims
	}
}

/// Explicit, ordered sequence of transformers.
///
/// [`ClaimsPipeline::default`] holds a [`SubjectNormalizer`] only; [`ClaimsPipeline::empty`]
/// starts with no steps.
#[derive(Clone)]
pub struct ClaimsPipeline {
	steps: Vec<Arc<dyn ClaimsTransformer>>,
}
impl ClaimsPipeline {
	/// Creates a pipeline with no steps.
	pub fn empty() -> Self {
		Self { steps: Vec::new() }
	}

	/// Appends `step`.
	pub fn push(&mut self, step: Arc<dyn ClaimsTransformer>) {
		self.steps.push(step);
	}

	/// Appends `step`, returning the pipeline.
	pub fn with(mut self, step: impl 'static + ClaimsTransformer) -> Self {
		self.steps.push(Arc::new(step));

		self
	}

	/// Number of steps.
	pub fn len(&self) -> usize {
		self.steps.len()
	}

	/// Returns `true` when the pipeline has no steps.
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Runs every step in order, stopping at the first failure.
	pub async fn run(&self, context: &mut TransformContext<'_>) -> Result<(), ClaimsError> {
		for step in &self.steps {
			step.transform(context).await?;
		}

		Ok(())
	}
}
impl Default for ClaimsPipeline {
	fn default() -> Self {
		Self::empty().with(SubjectNormalizer::default())
	}
}
impl Debug for ClaimsPipeline {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClaimsPipeline").field("steps", &self.steps.len()).finish()
	}
}

/// Rewrites every `sub` claim to its normalized form.
#[derive(Clone, Debug)]
pub struct SubjectNormalizer {
	prefix: String,
}
impl SubjectNormalizer {
	/// Strips `prefix` instead of the provider default.
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}

	fn normalize(&self, claims: &mut [Claim]) {
		for claim in claims.iter_mut().filter(|claim| claim.is(types::SUBJECT)) {
			let normalized = strip_subject_prefix(&claim.value, &self.prefix);

			if normalized != claim.value {
				claim.value = normalized.to_owned();
			}
		}
	}
}
impl Default for SubjectNormalizer {
	fn default() -> Self {
		Self::with_prefix(DEFAULT_SUBJECT_PREFIX)
	}
}
impl ClaimsTransformer for SubjectNormalizer {
	fn transform<'a>(&'a self, context: &'a mut TransformContext<'_>) -> ClaimsFuture<'a> {
		Box::pin(async move {
			self.normalize(&mut context.claims);

			Ok(())
		})
	}
}
