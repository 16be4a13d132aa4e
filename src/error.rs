//! Bridge-level error types shared across the exchange, session, transport, and server layers.

// self
use crate::_prelude::*;

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical bridge error exposed by public APIs and carried by the `error` event.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS) while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Realtime connection failure.
	#[error(transparent)]
	Realtime(#[from] RealtimeError),

	/// Authorization server answered the code exchange with an explicit error payload.
	#[error("Authorization server rejected the code ({error}).")]
	Authorization {
		/// OAuth `error` code returned by the platform.
		error: String,
		/// Optional human-readable `error_description`.
		description: Option<String>,
	},
}
impl Error {
	/// Returns the most descriptive message for an [`Error::Authorization`] payload.
	///
	/// Other variants fall back to their [`Display`] output.
	pub fn describe(&self) -> String {
		match self {
			Self::Authorization { error, description } =>
				description.clone().unwrap_or_else(|| error.clone()),
			other => other.to_string(),
		}
	}

	/// Indicates whether the failure came from an explicit authorization error payload.
	pub fn is_authorization(&self) -> bool {
		matches!(self, Self::Authorization { .. })
	}
}

/// Configuration and validation failures raised while constructing the bridge.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required configuration field was not supplied.
	#[error("Configuration field `{field}` is required.")]
	MissingField {
		/// Field name.
		field: &'static str,
	},
	/// A configuration field was supplied but is blank.
	#[error("Configuration field `{field}` must not be empty.")]
	EmptyField {
		/// Field name.
		field: &'static str,
	},
	/// A configured URL cannot be parsed.
	#[error("Configuration field `{field}` is not a valid URL.")]
	InvalidUrl {
		/// Field name.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect path is not a routable absolute path.
	#[error("Redirect path `{path}` must start with `/` and contain only unreserved characters.")]
	InvalidRedirectPath {
		/// Offending path.
		path: String,
	},
	/// Redirect path collides with a built-in route.
	#[error("Redirect path `{path}` collides with a built-in route.")]
	ReservedRedirectPath {
		/// Offending path.
		path: String,
	},
	/// Redirect URI and redirect path disagree.
	#[error("Redirect URI path `{uri_path}` does not match the redirect path `{path}`.")]
	RedirectMismatch {
		/// Path component of the redirect URI.
		uri_path: String,
		/// Configured local route.
		path: String,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration could not be parsed.")]
	Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Callback listener could not be bound.
	#[error("Failed to bind the callback listener on {address}.")]
	Bind {
		/// Socket address that was requested.
		address: std::net::SocketAddr,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Platform returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO) raised while calling the token endpoint.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures of the persistent realtime connection.
#[derive(Debug, ThisError)]
pub enum RealtimeError {
	/// Realtime endpoint URL cannot be turned into a socket URL.
	#[error("Realtime endpoint `{endpoint}` is not supported: {reason}.")]
	Endpoint {
		/// Offending endpoint.
		endpoint: String,
		/// Why the endpoint was rejected.
		reason: &'static str,
	},
	/// Connecting (or reconnecting) to the realtime endpoint failed.
	#[error("Failed to connect to the realtime endpoint.")]
	Connect {
		/// Underlying socket failure.
		#[source]
		source: BoxError,
	},
	/// Established socket failed while reading or writing.
	#[error("Realtime socket failed.")]
	Socket {
		/// Underlying socket failure.
		#[source]
		source: BoxError,
	},
	/// Remote sent a frame the bridge could not understand.
	#[error("Realtime endpoint sent an invalid frame: {message}.")]
	Protocol {
		/// Description of the framing problem.
		message: String,
	},
	/// Remote refused the namespace connection.
	#[error("Realtime endpoint refused the connection: {message}.")]
	Refused {
		/// Message supplied by the remote.
		message: String,
	},
	/// Reconnection gave up after the configured number of attempts.
	#[error("Realtime reconnection gave up after {attempts} attempts.")]
	ReconnectExhausted {
		/// Number of consecutive failed attempts.
		attempts: u32,
	},
	/// The bridge has no open link to send on.
	#[error("Realtime link is not open.")]
	LinkClosed,
}
impl RealtimeError {
	/// Wraps a connect failure.
	pub fn connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connect { source: Box::new(src) }
	}

	/// Wraps a failure on an established socket.
	pub fn socket(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Socket { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authorization_errors_prefer_description() {
		let err = Error::Authorization {
			error: "invalid_grant".into(),
			description: Some("bad code".into()),
		};

		assert!(err.is_authorization());
		assert_eq!(err.describe(), "bad code");
		assert_eq!(err.to_string(), "Authorization server rejected the code (invalid_grant).");

		let bare = Error::Authorization { error: "invalid_grant".into(), description: None };

		assert_eq!(bare.describe(), "invalid_grant");
	}

	#[test]
	fn non_authorization_errors_describe_with_display() {
		let err: Error = RealtimeError::LinkClosed.into();

		assert!(!err.is_authorization());
		assert_eq!(err.describe(), "Realtime link is not open.");
	}
}
