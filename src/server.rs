//! HTTP route group: authorization redirects, the informational page, and the OAuth callback.

// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::{StatusCode, header::LOCATION},
	response::{Html, IntoResponse, Response},
	routing::get,
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	event::{BridgeEvent, EventHub},
	exchange::{AuthorizationFlow, AuthorizationKind},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionBridge,
};

const INDEX_PAGE: &str = "<!DOCTYPE html>
<html>
<head><title>wisp-bridge</title></head>
<body>
<h1>wisp-bridge</h1>
<p>Visit <a href=\"/auth\">/auth</a> to connect a channel or
<a href=\"/auth-subscriber\">/auth-subscriber</a> to connect a subscriber.</p>
</body>
</html>
";

/// Shared state of the route group.
#[derive(Clone)]
pub struct RouteState {
	flow: Arc<dyn AuthorizationFlow>,
	session: SessionBridge,
	hub: EventHub,
}
impl RouteState {
	/// Bundles the collaborators the routes call into.
	pub fn new(flow: Arc<dyn AuthorizationFlow>, session: SessionBridge, hub: EventHub) -> Self {
		Self { flow, session, hub }
	}
}
impl Debug for RouteState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RouteState").field("session", &self.session).finish_non_exhaustive()
	}
}

/// Query string of the OAuth callback.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
	/// Authorization code.
	pub code: Option<String>,
	/// Anti-forgery marker echoed by the platform.
	pub state: Option<String>,
	/// Denial reported by the platform.
	pub error: Option<String>,
	/// Human-readable denial.
	pub error_description: Option<String>,
}

/// Builds the route group with the callback mounted at `redirect_path`.
pub fn router(redirect_path: &str, state: RouteState) -> Router {
	Router::new()
		.route("/", get(index))
		.route("/auth", get(authorize_channel))
		.route("/auth-subscriber", get(authorize_subscriber))
		.route(redirect_path, get(callback))
		.with_state(state)
}

async fn index() -> Html<&'static str> {
	Html(INDEX_PAGE)
}

async fn authorize_channel(State(state): State<RouteState>) -> Response {
	redirect(state.flow.authorization_url(AuthorizationKind::Channel))
}

async fn authorize_subscriber(State(state): State<RouteState>) -> Response {
	redirect(state.flow.authorization_url(AuthorizationKind::Subscriber))
}

fn redirect(url: &Url) -> Response {
	(StatusCode::FOUND, [(LOCATION, url.as_str().to_owned())]).into_response()
}

async fn callback(State(state): State<RouteState>, Query(query): Query<CallbackQuery>) -> Response {
	const KIND: FlowKind = FlowKind::Callback;

	let span = FlowSpan::new(KIND, "callback");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let (outcome, response) = span.instrument(complete_callback(state, query)).await;

	obs::record_flow_outcome(KIND, outcome);

	response
}

async fn complete_callback(state: RouteState, query: CallbackQuery) -> (FlowOutcome, Response) {
	if let Some(error) = query.error {
		obs::log_callback_rejected("authorization denied");

		let message = query.error_description.unwrap_or(error);

		return (FlowOutcome::Rejected, error_page(StatusCode::OK, &message));
	}
	if !state.flow.validate_state(query.state.as_deref()) {
		obs::log_callback_rejected("state mismatch");

		return (
			FlowOutcome::Rejected,
			error_page(StatusCode::BAD_REQUEST, "The authorization state did not match."),
		);
	}

	let Some(code) = query.code.filter(|code| !code.is_empty()) else {
		obs::log_callback_rejected("missing code");

		return (
			FlowOutcome::Rejected,
			error_page(StatusCode::BAD_REQUEST, "The callback did not include an authorization code."),
		);
	};

	match state.flow.exchange_code(&code).await {
		Ok(token) => {
			let page = token_page(&token);

			state.hub.emit(BridgeEvent::ChannelConnect(token.clone()));
			state.session.send_authentication(&token);

			(FlowOutcome::Success, page)
		},
		Err(err) if err.is_authorization() => {
			obs::log_callback_rejected("authorization error");

			(FlowOutcome::Rejected, error_page(StatusCode::OK, &err.describe()))
		},
		Err(err) => {
			obs::log_server_failure(&err);

			let page = error_page(StatusCode::BAD_GATEWAY, &err.to_string());

			state.hub.emit(BridgeEvent::Error(Arc::new(err)));

			(FlowOutcome::Failure, page)
		},
	}
}

fn token_page(token: &AccessToken) -> Response {
	let body = format!(
		"<!DOCTYPE html>\n<html>\n<head><title>Authorized</title></head>\n<body>\n<h1>Authorized</h1>\n\
		 <p>Access token: <code>{}</code></p>\n</body>\n</html>\n",
		escape_html(token.access_token.expose())
	);

	(StatusCode::OK, Html(body)).into_response()
}

fn error_page(status: StatusCode, message: &str) -> Response {
	let body = format!(
		"<!DOCTYPE html>\n<html>\n<head><title>Authorization failed</title></head>\n<body>\n\
		 <h1>Authorization failed</h1>\n<p>{}</p>\n</body>\n</html>\n",
		escape_html(message)
	);

	(status, Html(body)).into_response()
}

fn escape_html(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			other => escaped.push(other),
		}
	}

	escaped
}
