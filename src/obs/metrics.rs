// self
use crate::{
	obs::{FlowKind, FlowOutcome},
	session::SessionState,
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"wisp_bridge_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts one relayed catalog event under its local name.
pub fn record_relay(local_name: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("wisp_bridge_relay_total", "event" => local_name).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = local_name;
	}
}

/// Counts a session state transition.
pub fn record_transition(to: SessionState) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("wisp_bridge_session_transition_total", "to" => to.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = to;
	}
}
