//! Local event surface shared by the callback routes and the realtime session.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{_prelude::*, auth::AccessToken, catalog::CatalogEvent};

/// Local name of [`BridgeEvent::Connected`].
pub const CONNECTED: &str = "connected";
/// Local name of [`BridgeEvent::Authenticated`].
pub const AUTHENTICATED: &str = "authenticated";
/// Local name of [`BridgeEvent::AuthenticationFailed`].
pub const AUTHENTICATION_FAILED: &str = "authenticationFailed";
/// Local name of [`BridgeEvent::Disconnected`].
pub const DISCONNECTED: &str = "disconnected";
/// Local name of [`BridgeEvent::ChannelConnect`].
pub const CHANNEL_CONNECT: &str = "channel-connect";
/// Local name of [`BridgeEvent::Error`].
pub const ERROR: &str = "error";

type Handler = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Relayed catalog event together with the name it was emitted under.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogMessage {
	/// Catalog entry the inbound event matched.
	pub event: CatalogEvent,
	/// Local name under the active [`EventNaming`](crate::catalog::EventNaming) policy.
	pub name: &'static str,
	/// Remote payload, unchanged.
	pub payload: Value,
}

/// Everything the bridge reports to the host.
#[derive(Clone, Debug)]
pub enum BridgeEvent {
	/// Realtime transport connected.
	Connected,
	/// Remote acknowledged the client credentials.
	Authenticated,
	/// Remote rejected the client credentials.
	AuthenticationFailed {
		/// Remote payload, carried opaquely.
		detail: Value,
	},
	/// Realtime transport disconnected.
	Disconnected {
		/// Reason reported by the transport.
		reason: String,
	},
	/// A code exchange produced a token.
	ChannelConnect(AccessToken),
	/// A failure that did not stop the bridge.
	Error(Arc<Error>),
	/// A relayed catalog event.
	Catalog(CatalogMessage),
}
impl BridgeEvent {
	/// Local event name listeners register under.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Connected => CONNECTED,
			Self::Authenticated => AUTHENTICATED,
			Self::AuthenticationFailed { .. } => AUTHENTICATION_FAILED,
			Self::Disconnected { .. } => DISCONNECTED,
			Self::ChannelConnect(_) => CHANNEL_CONNECT,
			Self::Error(_) => ERROR,
			Self::Catalog(message) => message.name,
		}
	}

	/// JSON payload for hosts that forward events untyped.
	pub fn to_payload(&self) -> Value {
		match self {
			Self::Connected | Self::Authenticated => Value::Null,
			Self::AuthenticationFailed { detail } => detail.clone(),
			Self::Disconnected { reason } => Value::String(reason.clone()),
			Self::ChannelConnect(token) => token.to_value(),
			Self::Error(err) => Value::String(err.describe()),
			Self::Catalog(message) => message.payload.clone(),
		}
	}
}

/// Handle returned by [`EventHub::on`] and [`EventHub::on_any`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Filter {
	Name(String),
	Any,
}
impl Filter {
	fn matches(&self, name: &str) -> bool {
		match self {
			Filter::Name(wanted) => wanted == name,
			Filter::Any => true,
		}
	}
}

#[derive(Default)]
struct Registry {
	next_id: u64,
	listeners: Vec<(ListenerId, Filter, Handler)>,
	subscribers: Vec<UnboundedSender<BridgeEvent>>,
}
impl Registry {
	fn insert(&mut self, filter: Filter, handler: Handler) -> ListenerId {
		let id = ListenerId(self.next_id);

		self.next_id += 1;
		self.listeners.push((id, filter, handler));

		id
	}
}

/// Observer registry for [`BridgeEvent`]s.
///
/// Clones share one registry. Listeners run on the emitting task, outside the registry lock, in
/// registration order; they may register or remove listeners themselves.
#[derive(Clone, Default)]
pub struct EventHub(Arc<Mutex<Registry>>);
impl EventHub {
	/// Registers `handler` for every event emitted under `name`.
	pub fn on<F>(&self, name: impl Into<String>, handler: F) -> ListenerId
	where
		F: 'static + Fn(&BridgeEvent) + Send + Sync,
	{
		self.0.lock().insert(Filter::Name(name.into()), Arc::new(handler))
	}

	/// Registers `handler` for every event.
	pub fn on_any<F>(&self, handler: F) -> ListenerId
	where
		F: 'static + Fn(&BridgeEvent) + Send + Sync,
	{
		self.0.lock().insert(Filter::Any, Arc::new(handler))
	}

	/// Removes a listener; returns whether it was registered.
	pub fn off(&self, id: ListenerId) -> bool {
		let mut registry = self.0.lock();
		let before = registry.listeners.len();

		registry.listeners.retain(|(listener, _, _)| *listener != id);

		registry.listeners.len() != before
	}

	/// Opens a channel receiving every subsequent event.
	///
	/// Dropping the receiver unsubscribes it on the next emission.
	pub fn subscribe(&self) -> UnboundedReceiver<BridgeEvent> {
		let (tx, rx) = mpsc::unbounded_channel();

		self.0.lock().subscribers.push(tx);

		rx
	}

	/// Number of registered listeners, excluding channel subscribers.
	pub fn listener_count(&self) -> usize {
		self.0.lock().listeners.len()
	}

	/// Delivers `event` to every matching listener and subscriber.
	pub fn emit(&self, event: BridgeEvent) {
		let name = event.name();
		let handlers = {
			let mut registry = self.0.lock();

			registry.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
			registry
				.listeners
				.iter()
				.filter(|(_, filter, _)| filter.matches(name))
				.map(|(_, _, handler)| Arc::clone(handler))
				.collect::<Vec<_>>()
		};

		for handler in handlers {
			handler(&event);
		}
	}
}
impl Debug for EventHub {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let registry = self.0.lock();

		f.debug_struct("EventHub")
			.field("listeners", &registry.listeners.len())
			.field("subscribers", &registry.subscribers.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	fn counter(hub: &EventHub, name: &str) -> Arc<AtomicUsize> {
		let hits = Arc::new(AtomicUsize::new(0));
		let inner = Arc::clone(&hits);

		hub.on(name, move |_| {
			inner.fetch_add(1, Ordering::SeqCst);
		});

		hits
	}

	#[test]
	fn listeners_filter_by_name() {
		let hub = EventHub::default();
		let connected = counter(&hub, CONNECTED);
		let errors = counter(&hub, ERROR);
		let any = Arc::new(AtomicUsize::new(0));
		let any_inner = Arc::clone(&any);

		hub.on_any(move |_| {
			any_inner.fetch_add(1, Ordering::SeqCst);
		});
		hub.emit(BridgeEvent::Connected);
		hub.emit(BridgeEvent::Disconnected { reason: "transport close".into() });

		assert_eq!(connected.load(Ordering::SeqCst), 1);
		assert_eq!(errors.load(Ordering::SeqCst), 0);
		assert_eq!(any.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn off_removes_only_the_given_listener() {
		let hub = EventHub::default();
		let id = hub.on(CONNECTED, |_| {});
		let kept = counter(&hub, CONNECTED);

		assert!(hub.off(id));
		assert!(!hub.off(id));
		assert_eq!(hub.listener_count(), 1);

		hub.emit(BridgeEvent::Connected);

		assert_eq!(kept.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn listeners_may_mutate_the_registry_while_handling() {
		let hub = EventHub::default();
		let inner = hub.clone();

		hub.on(AUTHENTICATED, move |_| {
			inner.on(CONNECTED, |_| {});
		});
		hub.emit(BridgeEvent::Authenticated);

		assert_eq!(hub.listener_count(), 2);
	}

	#[test]
	fn subscribers_receive_events_until_dropped() {
		let hub = EventHub::default();
		let mut rx = hub.subscribe();
		let dropped = hub.subscribe();

		drop(dropped);
		hub.emit(BridgeEvent::Catalog(CatalogMessage {
			event: CatalogEvent::SubscriberNew,
			name: "subscriber-new",
			payload: serde_json::json!({ "id": 1 }),
		}));

		let event = rx.try_recv().expect("Subscriber should receive the relayed event.");

		assert_eq!(event.name(), "subscriber-new");
		assert_eq!(event.to_payload(), serde_json::json!({ "id": 1 }));
		assert_eq!(format!("{:?}", hub), "EventHub { listeners: 0, subscribers: 1 }");
	}

	#[test]
	fn payloads_match_local_names() {
		let failed = BridgeEvent::AuthenticationFailed { detail: Value::from("nope") };
		let error = BridgeEvent::Error(Arc::new(Error::Authorization {
			error: "invalid_grant".into(),
			description: Some("bad code".into()),
		}));

		assert_eq!(failed.name(), AUTHENTICATION_FAILED);
		assert_eq!(failed.to_payload(), Value::from("nope"));
		assert_eq!(error.name(), ERROR);
		assert_eq!(error.to_payload(), Value::from("bad code"));
		assert_eq!(BridgeEvent::Connected.to_payload(), Value::Null);
	}
}
