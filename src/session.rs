//! Realtime session: one persistent link, its authentication state, and the catalog relay.
//!
//! [`SessionBridge`] opens a single [`TransportLink`] and spawns a pump task that handles the
//! link's [`TransportEvent`]s strictly in arrival order. State moves
//! `Disconnected → Connected → Authenticated`; only an `authenticated` event from the remote
//! reaches `Authenticated`.

// crates.io
use tokio::{
	sync::mpsc::{UnboundedReceiver, UnboundedSender},
	task::JoinHandle,
	time,
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	catalog::{CatalogEvent, EventNaming},
	config::{BridgeConfig, ClientCredentials},
	event::{BridgeEvent, CatalogMessage, EventHub},
	obs,
	transport::{OutboundEvent, RealtimeTransport, TransportEvent, TransportLink},
};

/// Outbound event carrying the client credentials.
pub const AUTHENTICATION: &str = "authentication";
/// Optional outbound event carrying the access token.
pub const CHANNEL_CONNECT: &str = "channel-connect";
/// Inbound acknowledgement of the credentials.
pub const AUTHENTICATED: &str = "authenticated";
/// Inbound rejection of the credentials.
pub const UNAUTHORIZED: &str = "unauthorized";

const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

/// Connection and authentication state of the realtime session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// No live link.
	#[default]
	Disconnected,
	/// Link up, credentials not (yet) accepted.
	Connected,
	/// Remote accepted the credentials.
	Authenticated,
}
impl SessionState {
	/// Stable label for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionState::Disconnected => "disconnected",
			SessionState::Connected => "connected",
			SessionState::Authenticated => "authenticated",
		}
	}

	/// True while a link is up, authenticated or not.
	pub const fn is_connected(self) -> bool {
		!matches!(self, SessionState::Disconnected)
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

struct ActiveLink {
	outbound: UnboundedSender<OutboundEvent>,
	pump: JoinHandle<()>,
	driver: Option<JoinHandle<()>>,
}

struct SessionInner {
	transport: Arc<dyn RealtimeTransport>,
	endpoint: Url,
	credentials: ClientCredentials,
	naming: EventNaming,
	relay_channel_token: bool,
	hub: EventHub,
	state: RwLock<SessionState>,
	link: Mutex<Option<ActiveLink>>,
}

/// Owner of the single realtime link of a bridge.
///
/// Clones share the same session.
#[derive(Clone)]
pub struct SessionBridge(Arc<SessionInner>);
impl SessionBridge {
	/// Creates an idle session; nothing connects until [`start`](Self::start).
	pub fn new(config: &BridgeConfig, transport: Arc<dyn RealtimeTransport>, hub: EventHub) -> Self {
		Self(Arc::new(SessionInner {
			transport,
			endpoint: config.endpoints.realtime.clone(),
			credentials: config.credentials.clone(),
			naming: config.event_naming,
			relay_channel_token: config.relay_channel_token,
			hub,
			state: RwLock::new(SessionState::Disconnected),
			link: Mutex::new(None),
		}))
	}

	/// Current state.
	pub fn state(&self) -> SessionState {
		*self.0.state.read()
	}

	/// Whether a link is open (connected or still connecting).
	pub fn is_started(&self) -> bool {
		self.0.link.lock().is_some()
	}

	/// Opens the link unless one already exists; returns whether a new link was opened.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(&self) -> Result<bool> {
		let mut slot = self.0.link.lock();

		if slot.is_some() {
			return Ok(false);
		}

		let TransportLink { inbound, outbound, task } = self.0.transport.open(&self.0.endpoint)?;
		let pump = tokio::spawn(pump(Arc::downgrade(&self.0), inbound));

		*slot = Some(ActiveLink { outbound, pump, driver: task });

		Ok(true)
	}

	/// Re-sends the credentials after a code exchange.
	///
	/// While disconnected this does nothing: the connect handler authenticates on its own. With
	/// `relay_channel_token` enabled the token is also emitted as `channel-connect`. Returns
	/// whether the credentials were handed to the link.
	pub fn send_authentication(&self, token: &AccessToken) -> bool {
		if !self.state().is_connected() {
			return false;
		}

		let sent = self.send_credentials();

		if self.0.relay_channel_token {
			self.send(OutboundEvent::new(
				CHANNEL_CONNECT,
				serde_json::json!({ "access_token": token.access_token.expose() }),
			));
		}

		sent
	}

	/// Closes the link and stops the pump; a later [`start`](Self::start) opens a fresh link.
	pub async fn shutdown(&self) {
		let Some(link) = self.0.link.lock().take() else {
			return;
		};
		let ActiveLink { outbound, pump, driver } = link;

		drop(outbound);
		pump.abort();

		if let Some(driver) = driver {
			let abort = driver.abort_handle();

			if time::timeout(SHUTDOWN_GRACE, driver).await.is_err() {
				abort.abort();
			}
		}

		if self.transition(SessionState::Disconnected).is_connected() {
			self.0.hub.emit(BridgeEvent::Disconnected { reason: "io client disconnect".into() });
		}
	}

	/// Applies one transport event.
	pub(crate) fn handle(&self, event: TransportEvent) {
		let hub = &self.0.hub;

		match event {
			TransportEvent::Connect => {
				self.transition(SessionState::Connected);
				hub.emit(BridgeEvent::Connected);
				self.send_credentials();
			},
			TransportEvent::Event { name, payload } => match name.as_str() {
				AUTHENTICATED => {
					self.transition(SessionState::Authenticated);
					hub.emit(BridgeEvent::Authenticated);
				},
				UNAUTHORIZED => {
					self.transition(SessionState::Connected);
					hub.emit(BridgeEvent::AuthenticationFailed { detail: payload });
				},
				other => match CatalogEvent::from_inbound(other) {
					Some(event) => {
						let local = event.local_name(self.0.naming);

						obs::log_relay(local);
						obs::record_relay(local);
						hub.emit(BridgeEvent::Catalog(CatalogMessage { event, name: local, payload }));
					},
					None => obs::log_ignored(other),
				},
			},
			TransportEvent::Disconnect { reason } => {
				self.transition(SessionState::Disconnected);
				hub.emit(BridgeEvent::Disconnected { reason });
			},
			TransportEvent::Error(err) => {
				let err = Error::from(err);

				obs::log_session_failure(&err);
				hub.emit(BridgeEvent::Error(Arc::new(err)));
			},
		}
	}

	fn send_credentials(&self) -> bool {
		self.send(OutboundEvent::new(AUTHENTICATION, self.0.credentials.authentication_payload()))
	}

	fn send(&self, event: OutboundEvent) -> bool {
		let name = event.name.clone();
		let delivered =
			self.0.link.lock().as_ref().is_some_and(|link| link.outbound.send(event).is_ok());

		obs::log_outbound(&name, delivered);

		delivered
	}

	/// Sets the state and returns the previous one.
	fn transition(&self, to: SessionState) -> SessionState {
		let from = std::mem::replace(&mut *self.0.state.write(), to);

		if from != to {
			obs::log_transition(from, to);
			obs::record_transition(to);
		}

		from
	}
}
impl Debug for SessionBridge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBridge")
			.field("endpoint", &self.0.endpoint.as_str())
			.field("state", &self.state())
			.field("started", &self.is_started())
			.finish()
	}
}

async fn pump(session: std::sync::Weak<SessionInner>, mut inbound: UnboundedReceiver<TransportEvent>) {
	while let Some(event) = inbound.recv().await {
		let Some(inner) = session.upgrade() else {
			return;
		};

		SessionBridge(inner).handle(event);
	}
}
