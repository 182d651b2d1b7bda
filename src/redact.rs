//! Secret string wrapper and masking helpers that keep credentials out of logs.

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::_prelude::*;

/// Marker substituted for redacted values.
pub const REDACTED: &str = "--redacted--";
/// Marker serialized for empty secrets.
pub const UNSET: &str = "--unset--";

/// Private string (password, client secret, bearer token).
///
/// Deserializes from a plain string, but serializes, prints, and debugs as a marker.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Redact(String);
impl Redact {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when no secret is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns a same-length placeholder for the secret.
	pub fn masked(&self) -> String {
		mask(&self.0)
	}

	fn marker(&self) -> &'static str {
		if self.0.is_empty() { UNSET } else { REDACTED }
	}
}
impl From<&str> for Redact {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for Redact {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for Redact {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Redact").field(&self.marker()).finish()
	}
}
impl Display for Redact {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.marker())
	}
}
impl Serialize for Redact {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.marker())
	}
}
impl<'de> Deserialize<'de> for Redact {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(Self)
	}
}

/// Replaces every character of `value` with `x`, preserving its length.
pub fn mask(value: &str) -> String {
	"x".repeat(value.chars().count())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_redact() {
		let secret = Redact::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Redact(\"--redacted--\")");
		assert_eq!(format!("{secret}"), "--redacted--");
		assert_eq!(secret.expose(), "super-secret");
		assert_eq!(format!("{:?}", Redact::default()), "Redact(\"--unset--\")");
	}

	#[test]
	fn serializes_marker_but_deserializes_value() {
		let json = serde_json::to_string(&Redact::new("pw")).expect("Redact should serialize.");

		assert_eq!(json, "\"--redacted--\"");
		assert_eq!(
			serde_json::to_string(&Redact::default()).expect("Empty redact should serialize."),
			"\"--unset--\""
		);

		let parsed: Redact =
			serde_json::from_str("\"hunter2\"").expect("Redact should deserialize plain strings.");

		assert_eq!(parsed.expose(), "hunter2");
	}

	#[test]
	fn mask_preserves_length() {
		assert_eq!(mask("test-token-123"), "xxxxxxxxxxxxxx");
		assert_eq!(Redact::new("abc").masked(), "xxx");
		assert_eq!(mask(""), "");
	}
}
