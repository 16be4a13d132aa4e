//! Public facade composing the authorization exchange, the realtime session, and the routes.

// std
use std::net::SocketAddr;
// crates.io
use axum::Router;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	config::BridgeConfig,
	error::ConfigError,
	event::{BridgeEvent, EventHub, ListenerId},
	exchange::{AuthorizationExchange, AuthorizationFlow, AuthorizationKind},
	http::ReqwestHttpClient,
	obs,
	server::{self, RouteState},
	session::{SessionBridge, SessionState},
	transport::{RealtimeTransport, WebSocketTransport},
};

/// Assembles a [`Bridge`] with optional custom collaborators.
pub struct BridgeBuilder {
	config: BridgeConfig,
	transport: Option<Arc<dyn RealtimeTransport>>,
	flow: Option<Arc<dyn AuthorizationFlow>>,
	http_client: Option<ReqwestHttpClient>,
}
impl BridgeBuilder {
	/// Replaces the realtime transport (defaults to [`WebSocketTransport`]).
	pub fn transport(mut self, transport: impl RealtimeTransport) -> Self {
		self.transport = Some(Arc::new(transport));

		self
	}

	/// Replaces the authorization flow (defaults to [`AuthorizationExchange`]).
	pub fn authorization_flow(mut self, flow: impl AuthorizationFlow) -> Self {
		self.flow = Some(Arc::new(flow));

		self
	}

	/// Supplies the HTTP client of the default [`AuthorizationExchange`].
	pub fn http_client(mut self, client: ReqwestHttpClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Builds the bridge and starts its session without binding a listener.
	///
	/// Use [`Bridge::router`] to mount the routes elsewhere. Must be called from within a tokio
	/// runtime.
	pub fn build(self) -> Result<Bridge> {
		let flow: Arc<dyn AuthorizationFlow> = match self.flow {
			Some(flow) => flow,
			None => {
				let http_client = match self.http_client {
					Some(client) => client,
					None => ReqwestHttpClient::new()?,
				};

				Arc::new(AuthorizationExchange::new(&self.config, http_client))
			},
		};
		let transport: Arc<dyn RealtimeTransport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(WebSocketTransport::new()),
		};
		let hub = EventHub::default();
		let session = SessionBridge::new(&self.config, transport, hub.clone());

		session.start()?;

		Ok(Bridge { config: Arc::new(self.config), hub, session, flow, listener: Mutex::new(None) })
	}

	/// Builds the bridge and binds the callback listener.
	pub async fn start(self) -> Result<Bridge> {
		let bridge = self.build()?;

		if let Err(err) = bridge.listen().await {
			bridge.session.shutdown().await;

			return Err(err);
		}

		Ok(bridge)
	}
}
impl Debug for BridgeBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BridgeBuilder")
			.field("config", &self.config)
			.field("custom_transport", &self.transport.is_some())
			.field("custom_flow", &self.flow.is_some())
			.finish_non_exhaustive()
	}
}

struct Listener {
	address: SocketAddr,
	stop: oneshot::Sender<()>,
	task: JoinHandle<()>,
}

/// Handle the host interacts with.
///
/// The realtime session starts as soon as the bridge is built, before any authorization.
pub struct Bridge {
	config: Arc<BridgeConfig>,
	hub: EventHub,
	session: SessionBridge,
	flow: Arc<dyn AuthorizationFlow>,
	listener: Mutex<Option<Listener>>,
}
impl Bridge {
	/// Builds a bridge with the default collaborators and binds its listener.
	pub async fn start(config: BridgeConfig) -> Result<Self> {
		Self::builder(config).start().await
	}

	/// Starts a builder.
	pub fn builder(config: BridgeConfig) -> BridgeBuilder {
		BridgeBuilder { config, transport: None, flow: None, http_client: None }
	}

	/// Validated configuration.
	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Event hub shared by the routes and the session.
	pub fn events(&self) -> &EventHub {
		&self.hub
	}

	/// Realtime session.
	pub fn session(&self) -> &SessionBridge {
		&self.session
	}

	/// Registers a listener for one local event name.
	pub fn on<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
	where
		F: 'static + Fn(&BridgeEvent) + Send + Sync,
	{
		self.hub.on(name, handler)
	}

	/// Registers a listener for every event.
	pub fn on_any<F>(&self, handler: F) -> ListenerId
	where
		F: 'static + Fn(&BridgeEvent) + Send + Sync,
	{
		self.hub.on_any(handler)
	}

	/// Removes a listener.
	pub fn off(&self, id: ListenerId) -> bool {
		self.hub.off(id)
	}

	/// Receives every subsequent event.
	pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<BridgeEvent> {
		self.hub.subscribe()
	}

	/// Current session state.
	pub fn state(&self) -> SessionState {
		self.session.state()
	}

	/// Bound listener address, once [`BridgeBuilder::start`] succeeded.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.listener.lock().as_ref().map(|listener| listener.address)
	}

	/// Channel authorization URL (`read_only,user_read`).
	pub fn channel_authorization_url(&self) -> &Url {
		self.flow.authorization_url(AuthorizationKind::Channel)
	}

	/// Subscriber authorization URL (`user_read`).
	pub fn subscriber_authorization_url(&self) -> &Url {
		self.flow.authorization_url(AuthorizationKind::Subscriber)
	}

	/// Route group serving `/`, `/auth`, `/auth-subscriber`, and the callback.
	pub fn router(&self) -> Router {
		server::router(
			&self.config.redirect_path,
			RouteState::new(Arc::clone(&self.flow), self.session.clone(), self.hub.clone()),
		)
	}

	/// Stops the listener and closes the realtime session.
	pub async fn shutdown(&self) {
		let listener = self.listener.lock().take();

		if let Some(Listener { stop, task, .. }) = listener {
			let _ = stop.send(());
			let _ = task.await;
		}

		self.session.shutdown().await;
	}

	async fn listen(&self) -> Result<()> {
		let requested = self.config.listen_socket();
		let tcp = TcpListener::bind(requested)
			.await
			.map_err(|source| ConfigError::Bind { address: requested, source })?;
		let address =
			tcp.local_addr().map_err(|source| ConfigError::Bind { address: requested, source })?;
		let router = self.router();
		let (stop, stopped) = oneshot::channel::<()>();
		let task = tokio::spawn(async move {
			let served = axum::serve(tcp, router)
				.with_graceful_shutdown(async move {
					let _ = stopped.await;
				})
				.await;

			if let Err(source) = served {
				obs::log_server_failure(&Error::from(ConfigError::Bind { address, source }));
			}
		});

		obs::log_listening(address);

		*self.listener.lock() = Some(Listener { address, stop, task });

		Ok(())
	}
}
impl Debug for Bridge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bridge")
			.field("config", &self.config)
			.field("session", &self.session)
			.field("local_addr", &self.local_addr())
			.finish_non_exhaustive()
	}
}
