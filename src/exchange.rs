//! Authorization-code exchange: the two authorization URLs and the code-for-token grant.
//!
//! [`AuthorizationExchange`] precomputes both authorization URLs from [`BridgeConfig`] so every
//! call returns the same value, then turns the callback's `code` into an [`AccessToken`]. Each
//! exchange runs inside a `wisp_bridge.flow` span and bumps the flow counter.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet},
	config::BridgeConfig,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{CodeExchangeFacade, ExchangeFuture, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Which authorization URL a browser is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthorizationKind {
	/// Channel owner authorization (`read_only,user_read`).
	Channel,
	/// Subscriber authorization (`user_read`).
	Subscriber,
}
impl AuthorizationKind {
	/// Scopes requested for this kind.
	pub fn scope(self) -> ScopeSet {
		match self {
			AuthorizationKind::Channel => ScopeSet::parse_delimited("read_only,user_read"),
			AuthorizationKind::Subscriber => ScopeSet::parse_delimited("user_read"),
		}
	}
}

/// Capability the callback route depends on.
///
/// [`AuthorizationExchange`] is the production implementation; tests substitute fakes.
pub trait AuthorizationFlow
where
	Self: 'static + Send + Sync,
{
	/// Authorization URL for `kind`; identical on every call.
	fn authorization_url(&self, kind: AuthorizationKind) -> &Url;

	/// Exchanges an authorization code for an access token.
	fn exchange_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a, AccessToken>;

	/// Checks a callback's `state` against the configured marker; absent values pass.
	fn validate_state(&self, returned: Option<&str>) -> bool;
}

/// OAuth authorization-code exchange against the platform's token endpoint.
pub struct AuthorizationExchange<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: CodeExchangeFacade<C, M>,
	redirect_uri: Url,
	channel_url: Url,
	subscriber_url: Url,
	state_marker: String,
}
impl AuthorizationExchange {
	/// Builds the exchange over the default reqwest stack.
	pub fn new(config: &BridgeConfig, http_client: ReqwestHttpClient) -> Self {
		Self::with_http_client(config, Arc::new(http_client), Arc::new(ReqwestTransportErrorMapper))
	}
}
impl<C, M> AuthorizationExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the exchange over a custom HTTP client and error mapper.
	pub fn with_http_client(config: &BridgeConfig, http_client: Arc<C>, mapper: Arc<M>) -> Self {
		let facade = CodeExchangeFacade::new(
			&config.endpoints,
			&config.credentials,
			&config.redirect_uri,
			http_client,
			mapper,
		);

		Self {
			facade,
			redirect_uri: config.redirect_uri.clone(),
			channel_url: build_authorization_url(config, AuthorizationKind::Channel),
			subscriber_url: build_authorization_url(config, AuthorizationKind::Subscriber),
			state_marker: config.state_marker.clone(),
		}
	}

	/// Channel authorization URL (`read_only,user_read`).
	pub fn channel_authorization_url(&self) -> &Url {
		&self.channel_url
	}

	/// Subscriber authorization URL (`user_read`).
	pub fn subscriber_authorization_url(&self) -> &Url {
		&self.subscriber_url
	}

	/// Performs the authorization-code grant.
	pub async fn exchange(&self, code: &str) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::CodeExchange;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(self.facade.exchange_authorization_code(code, &self.redirect_uri))
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(err) if err.is_authorization() =>
				obs::record_flow_outcome(KIND, FlowOutcome::Rejected),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
impl<C, M> AuthorizationFlow for AuthorizationExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authorization_url(&self, kind: AuthorizationKind) -> &Url {
		match kind {
			AuthorizationKind::Channel => &self.channel_url,
			AuthorizationKind::Subscriber => &self.subscriber_url,
		}
	}

	fn exchange_code<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a, AccessToken> {
		Box::pin(self.exchange(code))
	}

	fn validate_state(&self, returned: Option<&str>) -> bool {
		returned.is_none_or(|state| state == self.state_marker)
	}
}
impl<C, M> Debug for AuthorizationExchange<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationExchange")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("channel_url", &self.channel_url.as_str())
			.field("subscriber_url", &self.subscriber_url.as_str())
			.finish_non_exhaustive()
	}
}

fn build_authorization_url(config: &BridgeConfig, kind: AuthorizationKind) -> Url {
	let mut url = config.endpoints.authorization.clone();

	url.query_pairs_mut()
		.append_pair("response_type", "code")
		.append_pair("client_id", &config.credentials.client_id)
		.append_pair("redirect_uri", config.redirect_uri.as_str())
		.append_pair("scope", &kind.scope().joined())
		.append_pair("state", &config.state_marker);

	url
}
