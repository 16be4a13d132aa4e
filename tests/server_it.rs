// std
use std::time::Duration;
// crates.io
use axum::{
	body::Body,
	http::{Request, StatusCode, header::LOCATION},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use tokio::{sync::mpsc::UnboundedReceiver, time};
use tower::ServiceExt;
// self
use wisp_bridge::{
	Bridge, BridgeConfig, BridgeEvent,
	config::PlatformEndpoints,
	serde_json::json,
	session::SessionState,
	transport::MemoryTransport,
	url::Url,
};

fn build_config(token_endpoint: Url) -> BridgeConfig {
	BridgeConfig::builder()
		.client_id("abc")
		.client_secret("xyz")
		.redirect_uri("http://h/cb")
		.redirect_path("/cb")
		.listen_port(3000)
		.endpoints(PlatformEndpoints { token: token_endpoint, ..Default::default() })
		.build()
		.expect("Route configuration should be valid.")
}

fn build_bridge(server: &MockServer) -> (Bridge, MemoryTransport) {
	let transport = MemoryTransport::new();
	let token = Url::parse(&server.url("/token")).expect("Mock token endpoint should parse.");
	let bridge = Bridge::builder(build_config(token))
		.transport(transport.clone())
		.build()
		.expect("Bridge should build without a listener.");

	(bridge, transport)
}

async fn get(bridge: &Bridge, uri: &str) -> (StatusCode, Option<String>, String) {
	let request =
		Request::builder().uri(uri).body(Body::empty()).expect("Request should build successfully.");
	let response = bridge.router().oneshot(request).await.expect("Router should respond.");
	let status = response.status();
	let location = response
		.headers()
		.get(LOCATION)
		.and_then(|value| value.to_str().ok())
		.map(str::to_owned);
	let body = response
		.into_body()
		.collect()
		.await
		.expect("Response body should be readable.")
		.to_bytes();

	(status, location, String::from_utf8_lossy(&body).into_owned())
}

async fn next_event(rx: &mut UnboundedReceiver<BridgeEvent>) -> BridgeEvent {
	time::timeout(Duration::from_secs(2), rx.recv())
		.await
		.expect("Event should arrive before the timeout.")
		.expect("Event channel should stay open.")
}

fn drain_names(rx: &mut UnboundedReceiver<BridgeEvent>) -> Vec<&'static str> {
	std::iter::from_fn(|| rx.try_recv().ok()).map(|event| event.name()).collect()
}

#[tokio::test]
async fn auth_routes_redirect_to_the_authorization_urls() {
	let server = MockServer::start_async().await;
	let (bridge, _) = build_bridge(&server);
	let (status, location, _) = get(&bridge, "/auth").await;
	let location = location.expect("Channel redirect should carry a Location header.");

	assert_eq!(status, StatusCode::FOUND);
	assert!(location.contains("scope=read_only%2Cuser_read"));

	let parsed = Url::parse(&location).expect("Location should be an absolute URL.");
	let redirect_uri = parsed
		.query_pairs()
		.find(|(key, _)| key == "redirect_uri")
		.map(|(_, value)| value.into_owned());

	assert_eq!(redirect_uri.as_deref(), Some("http://h/cb"));
	assert_eq!(location, bridge.channel_authorization_url().as_str());

	let (status, location, _) = get(&bridge, "/auth-subscriber").await;

	assert_eq!(status, StatusCode::FOUND);
	assert_eq!(location.as_deref(), Some(bridge.subscriber_authorization_url().as_str()));

	let (status, _, body) = get(&bridge, "/").await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("/auth-subscriber"));
}

#[tokio::test]
async fn valid_code_emits_channel_connect_and_reauthenticates() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"token_type\":\"bearer\"}");
		})
		.await;
	let (bridge, transport) = build_bridge(&server);
	let mut rx = bridge.subscribe();

	assert!(transport.connect());
	assert_eq!(next_event(&mut rx).await.name(), "connected");
	assert_eq!(bridge.state(), SessionState::Connected);
	assert_eq!(transport.drain_outbound().len(), 1);

	let (status, _, body) = get(&bridge, "/cb?code=GOOD&state=nodecg").await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("T1"));

	match next_event(&mut rx).await {
		BridgeEvent::ChannelConnect(token) => assert_eq!(token.access_token.expose(), "T1"),
		other => panic!("Unexpected event: {other:?}."),
	}

	assert!(drain_names(&mut rx).is_empty());

	let resent = transport.drain_outbound();

	assert_eq!(resent.len(), 1);
	assert_eq!(resent[0].name, "authentication");
	assert_eq!(resent[0].payload, json!({ "key": "abc", "secret": "xyz" }));
}

#[tokio::test]
async fn token_bodies_without_token_type_are_accepted() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\"}");
		})
		.await;
	let (bridge, _) = build_bridge(&server);
	let mut rx = bridge.subscribe();
	let (status, _, body) = get(&bridge, "/cb?code=GOOD").await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("T1"));

	match next_event(&mut rx).await {
		BridgeEvent::ChannelConnect(token) => {
			assert_eq!(token.token_type, None);
			assert_eq!(BridgeEvent::ChannelConnect(token).to_payload(), json!({ "access_token": "T1" }));
		},
		other => panic!("Unexpected event: {other:?}."),
	}
}

#[tokio::test]
async fn channel_connect_carries_the_token_body_verbatim() {
	let token_body = json!({
		"access_token": "T1",
		"token_type": "Bearer",
		"scope": "user_read read_only",
		"refresh_token": "R1",
		"expires_in": 3600
	});
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").json_body(token_body.clone());
		})
		.await;
	let (bridge, _) = build_bridge(&server);
	let mut rx = bridge.subscribe();
	let (status, _, _) = get(&bridge, "/cb?code=GOOD").await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);

	let event = next_event(&mut rx).await;

	assert_eq!(event.name(), "channel-connect");
	assert_eq!(event.to_payload(), token_body);
}

#[tokio::test]
async fn rejected_code_renders_the_description_without_channel_connect() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"bad code\"}");
		})
		.await;
	let (bridge, _) = build_bridge(&server);
	let mut rx = bridge.subscribe();
	let (status, _, body) = get(&bridge, "/cb?code=BAD").await;

	mock.assert_async().await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("bad code"));
	assert!(drain_names(&mut rx).is_empty());
}

#[tokio::test]
async fn malformed_callbacks_are_rejected_without_an_exchange() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let (bridge, _) = build_bridge(&server);
	let mut rx = bridge.subscribe();
	let (status, _, _) = get(&bridge, "/cb").await;

	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _, _) = get(&bridge, "/cb?code=GOOD&state=forged").await;

	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _, body) =
		get(&bridge, "/cb?error=access_denied&error_description=User+denied+access").await;

	assert_eq!(status, StatusCode::OK);
	assert!(body.contains("User denied access"));

	mock.assert_calls_async(0).await;

	assert!(drain_names(&mut rx).is_empty());
}

#[tokio::test]
async fn network_failures_emit_error_and_answer_bad_gateway() {
	let transport = MemoryTransport::new();
	let closed = Url::parse("http://127.0.0.1:1/token").expect("Closed endpoint should parse.");
	let bridge = Bridge::builder(build_config(closed))
		.transport(transport)
		.build()
		.expect("Bridge should build without a listener.");
	let mut rx = bridge.subscribe();
	let (status, _, _) = get(&bridge, "/cb?code=GOOD").await;

	assert_eq!(status, StatusCode::BAD_GATEWAY);

	match next_event(&mut rx).await {
		BridgeEvent::Error(err) => assert!(!err.is_authorization()),
		other => panic!("Unexpected event: {other:?}."),
	}
}
