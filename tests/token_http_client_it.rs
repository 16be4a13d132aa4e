// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use wisp_bridge::{
	BridgeConfig,
	error::{Error, Result, TransientError},
	exchange::{AuthorizationExchange, AuthorizationFlow},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
		},
	},
};

#[derive(Debug)]
struct GatewayUnavailable;
impl Display for GatewayUnavailable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Token gateway unavailable.")
	}
}
impl StdError for GatewayUnavailable {}

enum Scripted {
	Respond { status: u16, body: &'static str },
	Unavailable { status: u16, retry_after: Duration },
}

/// Replays scripted token endpoint outcomes and records every request body.
#[derive(Clone, Default)]
struct ScriptedHttpClient {
	script: Arc<Mutex<VecDeque<Scripted>>>,
	bodies: Arc<Mutex<Vec<String>>>,
}
impl ScriptedHttpClient {
	fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
		Self { script: Arc::new(Mutex::new(script.into_iter().collect())), ..Default::default() }
	}

	fn bodies(&self) -> Vec<String> {
		self.bodies.lock().clone()
	}
}
impl TokenHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = GatewayUnavailable;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { client: self.clone(), slot }
	}
}

struct ScriptedHandle {
	client: ScriptedHttpClient,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for ScriptedHandle {
	type Error = HttpClientError<GatewayUnavailable>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			assert!(self.slot.take().is_none(), "Every exchange should start with an empty slot.");

			self.client.bodies.lock().push(String::from_utf8_lossy(request.body()).into_owned());

			let next = self.client.script.lock().pop_front();

			match next.expect("Script should cover every request.") {
				Scripted::Respond { status, body } => {
					self.slot.store(ResponseMetadata { status: Some(status), retry_after: None });

					let mut response = HttpResponse::new(body.as_bytes().to_vec());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");
					response
						.headers_mut()
						.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

					Ok(response)
				},
				Scripted::Unavailable { status, retry_after } => {
					self.slot.store(ResponseMetadata {
						status: Some(status),
						retry_after: Some(retry_after),
					});

					Err(HttpClientError::Reqwest(Box::new(GatewayUnavailable)))
				},
			}
		})
	}
}

#[derive(Default)]
struct RecordingMapper {
	statuses: Mutex<Vec<Option<u16>>>,
}
impl TransportErrorMapper<GatewayUnavailable> for RecordingMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<GatewayUnavailable>,
	) -> Error {
		let status = meta.and_then(|value| value.status);

		self.statuses.lock().push(status);

		TransientError::TokenEndpoint {
			message: format!("Scripted transport failure: {err}"),
			status,
			retry_after: meta.and_then(|value| value.retry_after),
		}
		.into()
	}
}

fn build_exchange(
	client: &ScriptedHttpClient,
	mapper: Arc<RecordingMapper>,
) -> AuthorizationExchange<ScriptedHttpClient, RecordingMapper> {
	let config = BridgeConfig::builder()
		.client_id("overlay")
		.client_secret("s3cret")
		.redirect_uri("http://localhost:9000/callback")
		.redirect_path("/callback")
		.listen_port(9000)
		.build()
		.expect("Scripted configuration should be valid.");

	AuthorizationExchange::with_http_client(&config, Arc::new(client.clone()), mapper)
}

#[tokio::test]
async fn custom_clients_carry_the_code_and_credentials_in_the_body() {
	let client = ScriptedHttpClient::new([Scripted::Respond {
		status: 200,
		body: "{\"access_token\":\"T1\",\"token_type\":\"bearer\",\"scope\":\"read_only,user_read\"}",
	}]);
	let mapper = Arc::new(RecordingMapper::default());
	let exchange = build_exchange(&client, mapper.clone());
	let token = exchange.exchange("GOOD").await.expect("Scripted exchange should succeed.");

	assert_eq!(token.access_token.expose(), "T1");
	assert!(token.scope.is_some_and(|scope| scope.contains("read_only")));
	assert!(mapper.statuses.lock().is_empty());

	let bodies = client.bodies();

	assert_eq!(bodies.len(), 1);

	for pair in ["grant_type=authorization_code", "code=GOOD", "client_id=overlay", "client_secret=s3cret"]
	{
		assert!(bodies[0].contains(pair), "Missing `{pair}` in {}.", bodies[0]);
	}
}

#[tokio::test]
async fn embedded_errors_bypass_the_transport_mapper() {
	let client = ScriptedHttpClient::new([Scripted::Respond {
		status: 200,
		body: "{\"error\":\"invalid_grant\",\"error_description\":\"Code already used.\"}",
	}]);
	let mapper = Arc::new(RecordingMapper::default());
	let exchange = build_exchange(&client, mapper.clone());
	let err = exchange.exchange_code("USED").await.expect_err("Used code should be rejected.");

	assert!(err.is_authorization());
	assert_eq!(err.describe(), "Code already used.");
	assert!(mapper.statuses.lock().is_empty());
}

#[tokio::test]
async fn transport_failures_surface_metadata_on_every_attempt() {
	let client = ScriptedHttpClient::new([
		Scripted::Unavailable { status: 503, retry_after: Duration::seconds(5) },
		Scripted::Unavailable { status: 502, retry_after: Duration::seconds(30) },
	]);
	let mapper = Arc::new(RecordingMapper::default());
	let exchange = build_exchange(&client, mapper.clone());

	for (status, retry_after) in [(503, Duration::seconds(5)), (502, Duration::seconds(30))] {
		match exchange.exchange("GOOD").await.expect_err("Gateway should be unavailable.") {
			Error::Transient(TransientError::TokenEndpoint {
				status: seen_status,
				retry_after: seen_retry_after,
				..
			}) => {
				assert_eq!(seen_status, Some(status));
				assert_eq!(seen_retry_after, Some(retry_after));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	assert_eq!(*mapper.statuses.lock(), vec![Some(503), Some(502)]);
}
