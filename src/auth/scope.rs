//! Comma-delimited scope sets used by authorization URLs and token responses.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::_prelude::*;

/// Delimiter the platform expects between scopes in the `scope` parameter.
pub const SCOPE_DELIMITER: char = ',';

/// Deduplicated, sorted set of OAuth scopes.
///
/// Serializes as the platform's comma-joined string.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeSet(Arc<[String]>);
impl ScopeSet {
	/// Parses a scope string that may use commas, whitespace, or both as separators.
	///
	/// The platform echoes scopes comma-joined while RFC 6749 uses spaces; both are accepted.
	pub fn parse_delimited(raw: &str) -> Self {
		let parts = raw
			.split(|c: char| c == SCOPE_DELIMITER || c.is_whitespace())
			.filter(|part| !part.is_empty())
			.map(str::to_owned)
			.collect::<BTreeSet<_>>();

		Self(parts.into_iter().collect())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(scope)).is_ok()
	}

	/// Scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Joins the scopes with the platform delimiter (`read_only,user_read`).
	pub fn joined(&self) -> String {
		self.0.join(&SCOPE_DELIMITER.to_string())
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.joined())
	}
}
impl Serialize for ScopeSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.joined())
	}
}
impl<'de> Deserialize<'de> for ScopeSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Ok(Self::parse_delimited(&raw))
	}
}
