//! HTTP seam of the code exchange.
//!
//! Every callback gets a fresh [`ResponseMetadataSlot`]. The handle clears it before sending and
//! fills it once the token endpoint answers, so a failed exchange can still report the status and
//! `Retry-After` the platform sent.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	Request as ReqwestRequest,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// HTTP stack used for the callback's token request.
///
/// A single client serves every callback, so it must be shareable across tasks. The handle it
/// returns owns its state, which keeps the exchange future `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error raised by the underlying stack when no response arrives.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request [`AsyncHttpClient`] that reports into a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle for one token request; its outcome lands in `slot`.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and `Retry-After` hint of the last token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// Status code, when a response arrived.
	pub status: Option<u16>,
	/// `Retry-After`, relative to now.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	fn observe(status: u16, headers: &HeaderMap) -> Self {
		Self { status: Some(status), retry_after: parse_retry_after(headers) }
	}
}

/// Shared cell the HTTP handle fills and the error mapper drains.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Records the outcome of the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Drains the recorded outcome.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default [`TokenHttpClient`] built on reqwest.
///
/// The platform's token endpoint answers directly, so redirects are never followed. A client
/// supplied through [`ReqwestHttpClient::with_client`] should be built the same way.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
}
impl ReqwestHttpClient {
	/// Builds the default client with a 30 second request timeout.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(std::time::Duration::from_secs(30))
			.build()?;

		Ok(Self { client })
	}

	/// Uses a preconfigured reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client }
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestTokenRequest;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestTokenRequest { client: self.client.clone(), slot }
	}
}

/// One token request issued through [`ReqwestHttpClient`].
#[derive(Clone, Debug)]
pub struct ReqwestTokenRequest {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ReqwestTokenRequest {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let request: ReqwestRequest = request.try_into().map_err(Box::new)?;
			let response = self.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			self.slot.store(ResponseMetadata::observe(status.as_u16(), &headers));

			let body = response.bytes().await.map_err(Box::new)?;
			let mut reply = HttpResponse::new(body.to_vec());

			*reply.status_mut() = status;
			*reply.headers_mut() = headers;

			Ok(reply)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	match value.parse::<i64>() {
		Ok(secs) => (secs >= 0).then(|| Duration::seconds(secs)),
		Err(_) => {
			let delta = OffsetDateTime::parse(value, &Rfc2822).ok()? - OffsetDateTime::now_utc();

			delta.is_positive().then_some(delta)
		},
	}
}
