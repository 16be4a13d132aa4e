//! Access token produced by the authorization-code exchange.

// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
use serde_json::Map;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Token object returned by the platform after a successful code exchange.
///
/// The bridge never inspects the token beyond success versus failure. The response object is
/// kept exactly as the platform sent it and re-emitted to the host through `channel-connect`;
/// the typed fields are read from it for convenience. Only `access_token` is required.
#[derive(Clone, PartialEq)]
pub struct AccessToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type as reported by the platform, if any.
	pub token_type: Option<String>,
	/// Refresh token secret, if the platform issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime in seconds reported by the platform.
	pub expires_in: Option<u64>,
	/// Scopes echoed by the platform.
	pub scope: Option<ScopeSet>,
	/// Instant the bridge received the token. Not part of the emitted payload.
	pub issued_at: OffsetDateTime,
	raw: Map<String, Value>,
}
impl AccessToken {
	/// Reads a token response object; `None` when it carries no string `access_token`.
	pub fn from_response(raw: Map<String, Value>) -> Option<Self> {
		let text = |field: &str| raw.get(field).and_then(Value::as_str).map(str::to_owned);
		let access_token = TokenSecret::new(text("access_token")?);
		let expires_in = match raw.get("expires_in") {
			Some(Value::Number(secs)) => secs.as_u64(),
			Some(Value::String(secs)) => secs.trim().parse().ok(),
			_ => None,
		};

		Some(Self {
			access_token,
			token_type: text("token_type"),
			refresh_token: text("refresh_token").map(TokenSecret::new),
			expires_in,
			scope: text("scope").map(|scope| ScopeSet::parse_delimited(&scope)),
			issued_at: OffsetDateTime::now_utc(),
			raw,
		})
	}

	/// Creates a bearer token issued now with no optional fields.
	pub fn bearer(access_token: impl Into<TokenSecret>) -> Self {
		let access_token = access_token.into();
		let mut raw = Map::new();

		raw.insert("access_token".into(), Value::from(access_token.expose()));
		raw.insert("token_type".into(), Value::from("bearer"));

		Self {
			access_token,
			token_type: Some("bearer".into()),
			refresh_token: None,
			expires_in: None,
			scope: None,
			issued_at: OffsetDateTime::now_utc(),
			raw,
		}
	}

	/// Any field of the token response, as sent.
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.raw.get(field)
	}

	/// The token response object, as sent.
	pub fn raw(&self) -> &Map<String, Value> {
		&self.raw
	}

	/// Expiry instant derived from `issued_at + expires_in`, when the platform reported one.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let secs = i64::try_from(self.expires_in?).ok()?;

		self.issued_at.checked_add(Duration::seconds(secs))
	}

	/// Returns true when the token has a known expiry that is at or before `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at().is_some_and(|expires_at| now >= expires_at)
	}

	/// The JSON object hosts receive with `channel-connect`.
	pub fn to_value(&self) -> Value {
		Value::Object(self.raw.clone())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.finish_non_exhaustive()
	}
}
impl Serialize for AccessToken {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.raw.serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for AccessToken {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Map::deserialize(deserializer)?;

		Self::from_response(raw).ok_or_else(|| DeError::missing_field("access_token"))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros::datetime;
	// self
	use super::*;

	fn parse(value: Value) -> AccessToken {
		serde_json::from_value(value).expect("Token response should parse.")
	}

	#[test]
	fn expiry_is_derived_from_expires_in() {
		let mut token = AccessToken::bearer("T1");

		token.issued_at = datetime!(2025-01-01 00:00 UTC);

		assert_eq!(token.expires_at(), None);
		assert!(!token.is_expired_at(datetime!(2030-01-01 00:00 UTC)));

		token.expires_in = Some(3600);

		assert_eq!(token.expires_at(), Some(datetime!(2025-01-01 01:00 UTC)));
		assert!(token.is_expired_at(datetime!(2025-01-01 01:00 UTC)));
		assert!(!token.is_expired_at(datetime!(2025-01-01 00:59 UTC)));
		assert_eq!(parse(json!({ "access_token": "T1", "expires_in": "60" })).expires_in, Some(60));
	}

	#[test]
	fn payload_is_the_response_object_unchanged() {
		let body = json!({
			"access_token": "T1",
			"token_type": "Bearer",
			"scope": "user_read read_only",
			"channel_id": 42
		});
		let token = parse(body.clone());

		assert_eq!(token.to_value(), body);
		assert_eq!(serde_json::to_value(&token).expect("Token should serialize."), body);
		assert_eq!(token.token_type.as_deref(), Some("Bearer"));
		assert!(token.scope.as_ref().is_some_and(|scope| scope.contains("read_only")));
		assert_eq!(token.get("channel_id"), Some(&Value::from(42)));
	}

	#[test]
	fn only_access_token_is_required() {
		let token = parse(json!({ "access_token": "T1" }));

		assert_eq!(token.access_token.expose(), "T1");
		assert_eq!(token.token_type, None);
		assert!(serde_json::from_value::<AccessToken>(json!({ "token_type": "bearer" })).is_err());
		assert!(!format!("{token:?}").contains("T1"));
	}
}
