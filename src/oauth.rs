//! OAuth client facade over the `oauth2` crate, tuned for the platform's token endpoint.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AccessToken as OAuthAccessToken, AuthType, AuthUrl, AuthorizationCode, Client, ClientId,
	ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RedirectUrl, RefreshToken,
	RequestTokenError, Scope, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
use serde::{Deserializer, Serializer};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::{ClientCredentials, PlatformEndpoints},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

/// Token endpoint response as the platform sends it.
///
/// Only `access_token` is required. `token_type` defaults to bearer when absent and every field is
/// kept verbatim in the wrapped [`AccessToken`].
#[derive(Clone)]
pub(crate) struct PlatformTokenResponse {
	token: AccessToken,
	secret: OAuthAccessToken,
	token_type: BasicTokenType,
	refresh: Option<RefreshToken>,
	scopes: Option<Vec<Scope>>,
}
impl PlatformTokenResponse {
	fn new(token: AccessToken) -> Self {
		let token_type = match token.token_type.as_deref() {
			None => BasicTokenType::Bearer,
			Some(kind) if kind.eq_ignore_ascii_case("bearer") => BasicTokenType::Bearer,
			Some(kind) if kind.eq_ignore_ascii_case("mac") => BasicTokenType::Mac,
			Some(kind) => BasicTokenType::Extension(kind.to_owned()),
		};
		let scopes = token
			.scope
			.as_ref()
			.map(|scope| scope.iter().map(|scope| Scope::new(scope.to_owned())).collect());

		Self {
			secret: OAuthAccessToken::new(token.access_token.expose().to_owned()),
			refresh: token
				.refresh_token
				.as_ref()
				.map(|refresh| RefreshToken::new(refresh.expose().to_owned())),
			token_type,
			scopes,
			token,
		}
	}

	pub(crate) fn into_token(self) -> AccessToken {
		self.token
	}
}
impl Debug for PlatformTokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PlatformTokenResponse").field(&self.token).finish()
	}
}
impl Serialize for PlatformTokenResponse {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.token.serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for PlatformTokenResponse {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		AccessToken::deserialize(deserializer).map(Self::new)
	}
}
impl TokenResponse for PlatformTokenResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &OAuthAccessToken {
		&self.secret
	}

	fn token_type(&self) -> &BasicTokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.token.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

type UnconfiguredClient = Client<
	BasicErrorResponse,
	PlatformTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	PlatformTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Boxed future returned by exchange operations.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into bridge [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a bridge error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unknown transport failure"),
		}
	}
}

/// Authorization-code exchanger bound to one client and redirect URI.
pub(crate) struct CodeExchangeFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> CodeExchangeFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the facade; client credentials travel in the request body as the platform expects.
	pub(crate) fn new(
		endpoints: &PlatformEndpoints,
		credentials: &ClientCredentials,
		redirect_uri: &Url,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Self {
		let auth_url = AuthUrl::from_url(endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(endpoints.token.clone());
		let redirect_url = RedirectUrl::from_url(redirect_uri.clone());
		let oauth_client = UnconfiguredClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Self { oauth_client, http_client, error_mapper }
	}

	/// Exchanges `code` for an [`AccessToken`], repeating `redirect_uri` as RFC 6749 requires.
	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> ExchangeFuture<'a, AccessToken> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::from_url(redirect_uri.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			Ok(response.into_token())
		})
	}
}

/// Error payload the platform sometimes returns with a 2xx status.
#[derive(Debug, Deserialize)]
struct EmbeddedErrorPayload {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => Error::Authorization {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, body) => match embedded_error(&body) {
			Some(payload) =>
				Error::Authorization { error: payload.error, description: payload.error_description },
			None =>
				TransientError::TokenResponseParse { source: error, status: meta_status(meta_ref) }
					.into(),
		},
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn embedded_error(body: &[u8]) -> Option<EmbeddedErrorPayload> {
	serde_json::from_slice::<EmbeddedErrorPayload>(body).ok()
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
