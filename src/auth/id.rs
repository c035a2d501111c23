//! Strongly typed identifiers for subjects, sessions, and authentication schemes.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		def_id_views!($name, $kind);
	};
}

macro_rules! def_id_views {
	($name:ident, $kind:literal) => {
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;
const SESSION_ID_LEN: usize = 32;

/// Prefix the SSO provider puts in front of subject identifiers.
pub const DEFAULT_SUBJECT_PREFIX: &str = "CHARACTER:EVE:";

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (subject, session, scheme).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (subject, session, scheme).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (subject, session, scheme).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { SessionId, "Identifier joining a local session to its stored tokens.", "Session" }
def_id! { SchemeName, "Name of a host authentication scheme.", "Scheme" }
impl SessionId {
	/// Generates a fresh random session identifier.
	pub fn generate() -> Self {
		let value = rand::rng()
			.sample_iter(Alphanumeric)
			.take(SESSION_ID_LEN)
			.map(char::from)
			.collect::<String>();

		Self(value)
	}
}

/// Normalized external user identifier.
///
/// Construction strips every leading occurrence of the provider prefix (compared
/// case-insensitively), so raw and normalized forms of the same subject compare equal and
/// normalizing twice is a no-op.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);
impl SubjectId {
	/// Normalizes `value` with [`DEFAULT_SUBJECT_PREFIX`].
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Self::with_prefix(value, DEFAULT_SUBJECT_PREFIX)
	}

	/// Normalizes `value` by stripping `prefix`, then validates the remainder.
	pub fn with_prefix(value: impl AsRef<str>, prefix: &str) -> Result<Self, IdentifierError> {
		let view = strip_subject_prefix(value.as_ref(), prefix);

		validate_view("Subject", view)?;

		Ok(Self(view.to_owned()))
	}
}
impl TryFrom<String> for SubjectId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for SubjectId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
def_id_views!(SubjectId, "Subject");

/// Strips every leading, case-insensitive occurrence of `prefix` from `raw`.
pub fn strip_subject_prefix<'a>(raw: &'a str, prefix: &str) -> &'a str {
	let mut view = raw.trim();

	if prefix.is_empty() {
		return view;
	}

	while view.len() >= prefix.len()
		&& view.is_char_boundary(prefix.len())
		&& view[..prefix.len()].eq_ignore_ascii_case(prefix)
	{
		view = &view[prefix.len()..];
	}

	view
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn subject_normalization_is_idempotent() {
		for raw in [
			"CHARACTER:EVE:90000001",
			"character:eve:90000001",
			"CHARACTER:EVE:CHARACTER:EVE:90000001",
			"90000001",
		] {
			let once = SubjectId::new(raw).expect("Subject fixture should normalize.");
			let twice =
				SubjectId::new(once.as_ref()).expect("Normalized subject should stay valid.");

			assert_eq!(once, twice);
			assert_eq!(once.as_ref(), "90000001");
		}
	}

	#[test]
	fn subject_rejects_bare_prefix() {
		assert!(matches!(
			SubjectId::new("CHARACTER:EVE:"),
			Err(IdentifierError::Empty { kind: "Subject" })
		));
	}

	#[test]
	fn custom_prefix_only_strips_leading_occurrences() {
		let subject = SubjectId::with_prefix("user|abc|user|", "user|")
			.expect("Subject with trailing prefix text should be valid.");

		assert_eq!(subject.as_ref(), "abc|user|");
	}

	#[test]
	fn generated_sessions_are_distinct() {
		let first = SessionId::generate();
		let second = SessionId::generate();

		assert_eq!(first.len(), SESSION_ID_LEN);
		assert_ne!(first, second);
		assert!(SessionId::new(first.as_ref()).is_ok());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let subject: SubjectId = serde_json::from_str("\"CHARACTER:EVE:42\"")
			.expect("Subject should deserialize successfully.");

		assert_eq!(subject.as_ref(), "42");
		assert_eq!(format!("{subject:?}"), "Subject(42)");
		assert!(serde_json::from_str::<SchemeName>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SchemeName, u8> = HashMap::from_iter([(
			SchemeName::new("sso.cookie").expect("Scheme used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("sso.cookie"), Some(&7));
	}
}
