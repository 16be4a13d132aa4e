//! Fixed relay table of realtime events the bridge forwards to local listeners.
//!
//! The catalog covers the platform's on-demand responses (`app-channel-*`) and its real-time
//! subscription lifecycle events. Inbound names map to identical local names, except for
//! [`CatalogEvent::TierBenefitRemoved`] which historically went out as `tier-benefit-remoed`;
//! [`EventNaming`] selects which spelling the bridge emits.

// self
use crate::_prelude::*;

/// Spelling policy for local event names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventNaming {
	/// Emit every catalog event under its inbound name.
	#[default]
	Corrected,
	/// Emit `tier-benefit-removed` as `tier-benefit-remoed` for hosts wired to the old name.
	Legacy,
}

/// Every inbound event name the bridge relays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogEvent {
	/// On-demand: the app's connection to a channel was confirmed.
	AppChannelConnected,
	/// On-demand: subscriber listing for the channel.
	AppChannelSubscribers,
	/// On-demand: tier listing for the channel.
	AppChannelTiers,
	/// A new subscriber joined.
	SubscriberNew,
	/// A subscriber renewed.
	SubscriberRenewed,
	/// A subscriber's status changed (tier change, cancellation, ...).
	SubscriberStatusChange,
	/// A subscriber's benefits changed.
	SubscriberBenefitsChange,
	/// A benefit was fulfilled.
	BenefitFulfilled,
	/// A benefit was dismissed by the subscriber.
	BenefitDismissedUser,
	/// A benefit was dismissed by the channel.
	BenefitDismissedChannel,
	/// A tier was published.
	TierPublished,
	/// A tier was unpublished.
	TierUnpublished,
	/// A tier was modified.
	TierModified,
	/// A benefit was added to a tier.
	TierBenefitAdded,
	/// A benefit was removed from a tier.
	TierBenefitRemoved,
}
impl CatalogEvent {
	/// Every catalog entry in relay-table order.
	pub const ALL: [CatalogEvent; 15] = [
		CatalogEvent::AppChannelConnected,
		CatalogEvent::AppChannelSubscribers,
		CatalogEvent::AppChannelTiers,
		CatalogEvent::SubscriberNew,
		CatalogEvent::SubscriberRenewed,
		CatalogEvent::SubscriberStatusChange,
		CatalogEvent::SubscriberBenefitsChange,
		CatalogEvent::BenefitFulfilled,
		CatalogEvent::BenefitDismissedUser,
		CatalogEvent::BenefitDismissedChannel,
		CatalogEvent::TierPublished,
		CatalogEvent::TierUnpublished,
		CatalogEvent::TierModified,
		CatalogEvent::TierBenefitAdded,
		CatalogEvent::TierBenefitRemoved,
	];
	/// Historical spelling of [`CatalogEvent::TierBenefitRemoved`].
	pub const LEGACY_TIER_BENEFIT_REMOVED: &'static str = "tier-benefit-remoed";

	/// Name the remote endpoint uses on the wire.
	pub const fn inbound_name(self) -> &'static str {
		match self {
			CatalogEvent::AppChannelConnected => "app-channel-connected",
			CatalogEvent::AppChannelSubscribers => "app-channel-subscribers",
			CatalogEvent::AppChannelTiers => "app-channel-tiers",
			CatalogEvent::SubscriberNew => "subscriber-new",
			CatalogEvent::SubscriberRenewed => "subscriber-renewed",
			CatalogEvent::SubscriberStatusChange => "subscriber-status-change",
			CatalogEvent::SubscriberBenefitsChange => "subscriber-benefits-change",
			CatalogEvent::BenefitFulfilled => "benefit-fulfilled",
			CatalogEvent::BenefitDismissedUser => "benefit-dismissed-user",
			CatalogEvent::BenefitDismissedChannel => "benefit-dismissed-channel",
			CatalogEvent::TierPublished => "tier-published",
			CatalogEvent::TierUnpublished => "tier-unpublished",
			CatalogEvent::TierModified => "tier-modified",
			CatalogEvent::TierBenefitAdded => "tier-benefit-added",
			CatalogEvent::TierBenefitRemoved => "tier-benefit-removed",
		}
	}

	/// Name the bridge emits locally under the given spelling policy.
	pub const fn local_name(self, naming: EventNaming) -> &'static str {
		match (self, naming) {
			(CatalogEvent::TierBenefitRemoved, EventNaming::Legacy) =>
				Self::LEGACY_TIER_BENEFIT_REMOVED,
			_ => self.inbound_name(),
		}
	}

	/// Looks up a catalog entry by its wire name.
	pub fn from_inbound(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|event| event.inbound_name() == name)
	}

	/// True for the on-demand responses (answers to requests the app issued).
	pub const fn is_on_demand(self) -> bool {
		matches!(
			self,
			CatalogEvent::AppChannelConnected
				| CatalogEvent::AppChannelSubscribers
				| CatalogEvent::AppChannelTiers
		)
	}
}
impl Display for CatalogEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.inbound_name())
	}
}
