//! Persistent realtime connection capability.
//!
//! A [`RealtimeTransport`] opens one [`TransportLink`] per session: an inbound stream of
//! [`TransportEvent`]s in arrival order plus an outbound sender of named emits. Dropping the
//! outbound sender closes the link.

pub mod frame;
pub mod memory;
pub mod websocket;

pub use memory::*;
pub use websocket::*;

// crates.io
use tokio::{
	sync::mpsc::{UnboundedReceiver, UnboundedSender},
	task::JoinHandle,
};
// self
use crate::{_prelude::*, error::RealtimeError};

/// Something the realtime link reported.
#[derive(Debug)]
pub enum TransportEvent {
	/// The link (re)connected and is ready for emits.
	Connect,
	/// A named event arrived from the remote.
	Event {
		/// Remote event name.
		name: String,
		/// First event argument, or `null` when the event carried none.
		payload: Value,
	},
	/// The link dropped.
	Disconnect {
		/// Transport-level reason.
		reason: String,
	},
	/// The link reported a failure; the link itself may still recover.
	Error(RealtimeError),
}

/// Named emit sent to the remote.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundEvent {
	/// Event name.
	pub name: String,
	/// Single event argument.
	pub payload: Value,
}
impl OutboundEvent {
	/// Builds an emit.
	pub fn new(name: impl Into<String>, payload: Value) -> Self {
		Self { name: name.into(), payload }
	}
}

/// Both directions of an open realtime link.
#[derive(Debug)]
pub struct TransportLink {
	/// Inbound events in arrival order.
	pub inbound: UnboundedReceiver<TransportEvent>,
	/// Outbound emits; dropping it closes the link.
	pub outbound: UnboundedSender<OutboundEvent>,
	/// Background task driving the link, when the transport spawned one.
	pub task: Option<JoinHandle<()>>,
}
impl TransportLink {
	/// Pairs inbound and outbound channels without a driver task.
	pub fn new(
		inbound: UnboundedReceiver<TransportEvent>,
		outbound: UnboundedSender<OutboundEvent>,
	) -> Self {
		Self { inbound, outbound, task: None }
	}

	/// Attaches the task driving the link so shutdown can wait for it.
	pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
		self.task = Some(task);

		self
	}
}

/// Opens realtime links.
///
/// `open` must return without waiting for the remote: connection progress is reported through
/// [`TransportEvent::Connect`] and friends. Implementations that spawn tasks require a running
/// tokio runtime.
pub trait RealtimeTransport
where
	Self: 'static + Send + Sync,
{
	/// Opens a link to `endpoint`.
	fn open(&self, endpoint: &Url) -> Result<TransportLink>;
}
impl<T> RealtimeTransport for Arc<T>
where
	T: ?Sized + RealtimeTransport,
{
	fn open(&self, endpoint: &Url) -> Result<TransportLink> {
		(**self).open(endpoint)
	}
}
