//! Bridge configuration: credentials, redirect wiring, listener, and platform endpoints.
//!
//! Configuration is supplied once and validated eagerly. Every required field missing from a
//! [`BridgeConfigBuilder`] fails [`BridgeConfigBuilder::build`] instead of surfacing later as a
//! broken callback or a rejected socket handshake.

// std
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
// self
use crate::{_prelude::*, auth::TokenSecret, catalog::EventNaming, error::ConfigError};

/// Default anti-forgery `state` marker sent with both authorization URLs.
pub const DEFAULT_STATE_MARKER: &str = "nodecg";
/// Default authorization endpoint.
pub const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://api.gamewisp.com/pub/v1/oauth/authorize";
/// Default token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.gamewisp.com/pub/v1/oauth/token";
/// Default realtime endpoint.
pub const DEFAULT_REALTIME_ENDPOINT: &str = "https://singularity.gamewisp.com";

/// Paths served by the bridge itself that a redirect path must not shadow.
pub const RESERVED_PATHS: [&str; 3] = ["/", "/auth", "/auth-subscriber"];

/// Client credentials identifying the integrating application.
///
/// The same pair authorizes the code exchange and authenticates the realtime socket.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Wraps a client identifier and secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into() }
	}

	/// Payload sent with the realtime `authentication` event.
	pub fn authentication_payload(&self) -> Value {
		serde_json::json!({ "key": self.client_id, "secret": self.client_secret.expose() })
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.finish()
	}
}

/// Remote endpoints of the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformEndpoints {
	/// OAuth authorization endpoint the browser is redirected to.
	pub authorization: Url,
	/// OAuth token endpoint used by the code exchange.
	pub token: Url,
	/// Realtime endpoint the session connects to.
	pub realtime: Url,
}
impl Default for PlatformEndpoints {
	fn default() -> Self {
		// The defaults are compile-time constants that always parse.
		Self {
			authorization: default_url(DEFAULT_AUTHORIZATION_ENDPOINT),
			token: default_url(DEFAULT_TOKEN_ENDPOINT),
			realtime: default_url(DEFAULT_REALTIME_ENDPOINT),
		}
	}
}

/// Validated, immutable bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
	/// Credentials shared by the code exchange and the realtime handshake.
	pub credentials: ClientCredentials,
	/// Redirect URI registered with the platform.
	pub redirect_uri: Url,
	/// Local route serving the authorization callback.
	pub redirect_path: String,
	/// Address the callback listener binds to.
	pub listen_address: IpAddr,
	/// Port the callback listener binds to (`0` picks an ephemeral port).
	pub listen_port: u16,
	/// Platform endpoints.
	pub endpoints: PlatformEndpoints,
	/// Constant `state` marker sent with authorization URLs.
	pub state_marker: String,
	/// Spelling policy for local catalog event names.
	pub event_naming: EventNaming,
	/// Also forward the access token over the socket as `channel-connect` after an exchange.
	pub relay_channel_token: bool,
}
impl BridgeConfig {
	/// Starts a new builder.
	pub fn builder() -> BridgeConfigBuilder {
		BridgeConfigBuilder::default()
	}

	/// Parses and validates a JSON configuration document.
	///
	/// Field names match [`BridgeConfigBuilder`]; parse errors report the offending path.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let builder: BridgeConfigBuilder = serde_path_to_error::deserialize(&mut de)?;

		builder.build()
	}

	/// Socket address of the callback listener.
	pub fn listen_socket(&self) -> SocketAddr {
		SocketAddr::new(self.listen_address, self.listen_port)
	}
}

/// Builder (and deserialization target) for [`BridgeConfig`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfigBuilder {
	/// OAuth client identifier (required).
	pub client_id: Option<String>,
	/// OAuth client secret (required).
	pub client_secret: Option<TokenSecret>,
	/// Redirect URI registered with the platform (required).
	pub redirect_uri: Option<String>,
	/// Local callback route (required).
	pub redirect_path: Option<String>,
	/// Callback listener port (required).
	pub listen_port: Option<u16>,
	/// Callback listener address (defaults to `0.0.0.0`).
	pub listen_address: Option<IpAddr>,
	/// Platform endpoints (defaults to the production hosts).
	pub endpoints: Option<PlatformEndpoints>,
	/// Authorization `state` marker (defaults to [`DEFAULT_STATE_MARKER`]).
	pub state_marker: Option<String>,
	/// Local event naming policy (defaults to [`EventNaming::Corrected`]).
	pub event_naming: Option<EventNaming>,
	/// Whether to forward the access token over the socket (defaults to `false`).
	pub relay_channel_token: Option<bool>,
}
impl BridgeConfigBuilder {
	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the OAuth client secret.
	pub fn client_secret(mut self, value: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(value.into());

		self
	}

	/// Sets the redirect URI registered with the platform.
	pub fn redirect_uri(mut self, value: impl Into<String>) -> Self {
		self.redirect_uri = Some(value.into());

		self
	}

	/// Sets the local callback route.
	pub fn redirect_path(mut self, value: impl Into<String>) -> Self {
		self.redirect_path = Some(value.into());

		self
	}

	/// Sets the callback listener port.
	pub fn listen_port(mut self, port: u16) -> Self {
		self.listen_port = Some(port);

		self
	}

	/// Sets the callback listener address.
	pub fn listen_address(mut self, address: IpAddr) -> Self {
		self.listen_address = Some(address);

		self
	}

	/// Overrides the platform endpoints.
	pub fn endpoints(mut self, endpoints: PlatformEndpoints) -> Self {
		self.endpoints = Some(endpoints);

		self
	}

	/// Overrides the authorization `state` marker.
	pub fn state_marker(mut self, value: impl Into<String>) -> Self {
		self.state_marker = Some(value.into());

		self
	}

	/// Overrides the local event naming policy.
	pub fn event_naming(mut self, naming: EventNaming) -> Self {
		self.event_naming = Some(naming);

		self
	}

	/// Enables or disables forwarding the access token over the socket.
	pub fn relay_channel_token(mut self, enabled: bool) -> Self {
		self.relay_channel_token = Some(enabled);

		self
	}

	/// Validates the builder and produces an immutable [`BridgeConfig`].
	pub fn build(self) -> Result<BridgeConfig, ConfigError> {
		let client_id = required("client_id", self.client_id)?;
		let client_secret = self.client_secret.ok_or(ConfigError::MissingField {
			field: "client_secret",
		})?;

		if client_secret.is_blank() {
			return Err(ConfigError::EmptyField { field: "client_secret" });
		}

		let redirect_uri = required("redirect_uri", self.redirect_uri)?;
		let redirect_uri = Url::parse(&redirect_uri)
			.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source })?;
		let redirect_path = required("redirect_path", self.redirect_path)?;
		let listen_port =
			self.listen_port.ok_or(ConfigError::MissingField { field: "listen_port" })?;

		validate_redirect_path(&redirect_path)?;

		if redirect_uri.path() != redirect_path {
			return Err(ConfigError::RedirectMismatch {
				uri_path: redirect_uri.path().to_owned(),
				path: redirect_path,
			});
		}

		let state_marker = match self.state_marker {
			Some(marker) if marker.trim().is_empty() =>
				return Err(ConfigError::EmptyField { field: "state_marker" }),
			Some(marker) => marker,
			None => DEFAULT_STATE_MARKER.into(),
		};

		Ok(BridgeConfig {
			credentials: ClientCredentials::new(client_id, client_secret),
			redirect_uri,
			redirect_path,
			listen_address: self.listen_address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
			listen_port,
			endpoints: self.endpoints.unwrap_or_default(),
			state_marker,
			event_naming: self.event_naming.unwrap_or_default(),
			relay_channel_token: self.relay_channel_token.unwrap_or(false),
		})
	}
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
	let value = value.ok_or(ConfigError::MissingField { field })?;

	if value.trim().is_empty() { Err(ConfigError::EmptyField { field }) } else { Ok(value) }
}

fn validate_redirect_path(path: &str) -> Result<(), ConfigError> {
	let routable = path.len() > 1
		&& path.starts_with('/')
		&& !path.contains("//")
		&& path.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~'));

	if !routable {
		return Err(ConfigError::InvalidRedirectPath { path: path.to_owned() });
	}
	if RESERVED_PATHS.contains(&path.trim_end_matches('/')) {
		return Err(ConfigError::ReservedRedirectPath { path: path.to_owned() });
	}

	Ok(())
}

fn default_url(raw: &'static str) -> Url {
	Url::parse(raw).unwrap_or_else(|err| unreachable!("Default endpoint `{raw}` is invalid: {err}."))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn scenario() -> BridgeConfigBuilder {
		BridgeConfig::builder()
			.client_id("abc")
			.client_secret("xyz")
			.redirect_uri("http://h/cb")
			.redirect_path("/cb")
			.listen_port(3000)
	}

	#[test]
	fn builder_applies_defaults() {
		let config = scenario().build().expect("Scenario configuration should be valid.");

		assert_eq!(config.credentials.client_id, "abc");
		assert_eq!(config.credentials.client_secret.expose(), "xyz");
		assert_eq!(config.redirect_uri.as_str(), "http://h/cb");
		assert_eq!(config.listen_socket(), "0.0.0.0:3000".parse().expect("Address should parse."));
		assert_eq!(config.state_marker, DEFAULT_STATE_MARKER);
		assert_eq!(config.event_naming, EventNaming::Corrected);
		assert!(!config.relay_channel_token);
		assert_eq!(config.endpoints.realtime.as_str(), "https://singularity.gamewisp.com/");
	}

	#[test]
	fn missing_fields_fail_fast() {
		let err = BridgeConfig::builder().build().expect_err("Empty builder must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "client_id" }));

		let err = BridgeConfigBuilder { listen_port: None, ..scenario() }
			.build()
			.expect_err("Missing port must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "listen_port" }));

		let err = scenario().client_secret(" ").build().expect_err("Blank secret must fail.");

		assert!(matches!(err, ConfigError::EmptyField { field: "client_secret" }));
	}

	#[test]
	fn redirect_wiring_is_validated() {
		let err = scenario().redirect_uri("not a url").build().expect_err("Bad URI must fail.");

		assert!(matches!(err, ConfigError::InvalidUrl { field: "redirect_uri", .. }));

		let err = scenario().redirect_path("/other").build().expect_err("Mismatch must fail.");

		assert!(matches!(err, ConfigError::RedirectMismatch { .. }));

		let err = scenario()
			.redirect_uri("http://h/auth")
			.redirect_path("/auth")
			.build()
			.expect_err("Reserved path must fail.");

		assert!(matches!(err, ConfigError::ReservedRedirectPath { .. }));

		for path in ["cb", "/", "/{code}", "/:code", "/a//b"] {
			let err = scenario()
				.redirect_uri(format!("http://h{path}"))
				.redirect_path(path)
				.build()
				.expect_err("Unroutable path must fail.");

			assert!(
				matches!(
					err,
					ConfigError::InvalidRedirectPath { .. } | ConfigError::RedirectMismatch { .. }
				),
				"Unexpected error for {path}: {err:?}"
			);
		}
	}

	#[test]
	fn json_documents_report_the_failing_field() {
		let config = BridgeConfig::from_json_str(
			r#"{"client_id":"abc","client_secret":"xyz","redirect_uri":"http://h/cb","redirect_path":"/cb","listen_port":3000,"event_naming":"legacy"}"#,
		)
		.expect("JSON configuration should be valid.");

		assert_eq!(config.event_naming, EventNaming::Legacy);

		let err = BridgeConfig::from_json_str(r#"{"listen_port":"three thousand"}"#)
			.expect_err("Wrong field type must fail.");

		match err {
			ConfigError::Parse(inner) => assert_eq!(inner.path().to_string(), "listen_port"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
