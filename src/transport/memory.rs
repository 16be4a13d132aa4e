//! In-process transport for tests and demos.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
// self
use crate::{
	_prelude::*,
	transport::{OutboundEvent, RealtimeTransport, TransportEvent, TransportLink},
};

#[derive(Default)]
struct MemoryState {
	opens: usize,
	last_endpoint: Option<Url>,
	inbound: Option<UnboundedSender<TransportEvent>>,
	outbound: Option<UnboundedReceiver<OutboundEvent>>,
	sent: Vec<OutboundEvent>,
}
impl MemoryState {
	/// Moves queued emits into `sent`; returns whether the link is still open.
	fn collect(&mut self) -> bool {
		let Some(outbound) = self.outbound.as_mut() else {
			return false;
		};

		loop {
			match outbound.try_recv() {
				Ok(event) => self.sent.push(event),
				Err(TryRecvError::Empty) => return true,
				Err(TryRecvError::Disconnected) => {
					self.outbound = None;

					return false;
				},
			}
		}
	}
}

/// Transport whose remote side is driven by the caller.
///
/// Clones share state, so a test can hand one clone to the bridge and script the remote through
/// another. Each `open` replaces the previous link.
#[derive(Clone, Default)]
pub struct MemoryTransport(Arc<Mutex<MemoryState>>);
impl MemoryTransport {
	/// Creates a transport with no open link.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of links opened so far.
	pub fn open_count(&self) -> usize {
		self.0.lock().opens
	}

	/// Endpoint passed to the most recent `open`.
	pub fn last_endpoint(&self) -> Option<Url> {
		self.0.lock().last_endpoint.clone()
	}

	/// Delivers an inbound event; returns false when no link is listening.
	pub fn inject(&self, event: TransportEvent) -> bool {
		self.0.lock().inbound.as_ref().is_some_and(|tx| tx.send(event).is_ok())
	}

	/// Simulates the remote accepting the connection.
	pub fn connect(&self) -> bool {
		self.inject(TransportEvent::Connect)
	}

	/// Simulates a named event from the remote.
	pub fn emit(&self, name: impl Into<String>, payload: Value) -> bool {
		self.inject(TransportEvent::Event { name: name.into(), payload })
	}

	/// Simulates the link dropping.
	pub fn disconnect(&self, reason: impl Into<String>) -> bool {
		self.inject(TransportEvent::Disconnect { reason: reason.into() })
	}

	/// Returns every emit sent since the last drain.
	pub fn drain_outbound(&self) -> Vec<OutboundEvent> {
		let mut state = self.0.lock();

		state.collect();

		std::mem::take(&mut state.sent)
	}

	/// Whether the bridge still holds the outbound side of the current link.
	pub fn is_link_open(&self) -> bool {
		self.0.lock().collect()
	}
}
impl RealtimeTransport for MemoryTransport {
	fn open(&self, endpoint: &Url) -> Result<TransportLink> {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let mut state = self.0.lock();

		state.collect();
		state.opens += 1;
		state.last_endpoint = Some(endpoint.clone());
		state.inbound = Some(inbound_tx);
		state.outbound = Some(outbound_rx);

		Ok(TransportLink::new(inbound_rx, outbound_tx))
	}
}
impl Debug for MemoryTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.0.lock();

		f.debug_struct("MemoryTransport")
			.field("opens", &state.opens)
			.field("last_endpoint", &state.last_endpoint.as_ref().map(Url::as_str))
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn endpoint() -> Url {
		Url::parse("https://singularity.example.com").expect("Endpoint should parse.")
	}

	#[test]
	fn inject_requires_an_open_link() {
		let transport = MemoryTransport::new();

		assert!(!transport.connect());

		let mut link = transport.open(&endpoint()).expect("Memory transport should open.");

		assert!(transport.emit("subscriber-new", json!({ "id": 1 })));
		assert!(matches!(
			link.inbound.try_recv(),
			Ok(TransportEvent::Event { name, .. }) if name == "subscriber-new"
		));
		assert_eq!(transport.open_count(), 1);
		assert_eq!(transport.last_endpoint(), Some(endpoint()));
	}

	#[test]
	fn outbound_emits_are_drained_and_closure_is_observed() {
		let transport = MemoryTransport::new();
		let link = transport.open(&endpoint()).expect("Memory transport should open.");

		link.outbound
			.send(OutboundEvent::new("authentication", json!({ "key": "abc" })))
			.expect("Outbound channel should accept emits.");

		assert!(transport.is_link_open());

		drop(link);

		let sent = transport.drain_outbound();

		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].name, "authentication");
		assert!(!transport.is_link_open());
		assert!(transport.drain_outbound().is_empty());
	}
}
