//! Per-connection subscription manager.
//!
//! Tracks which device IDs a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::domain::{BridgeEvent, DeviceId};

/// Manages the set of device subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed device IDs. If `subscribe_all` is true, this set is ignored.
    device_ids: HashSet<DeviceId>,
    /// Whether the client subscribes to all devices (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds device IDs to the subscription set. `wildcard` enables `"*"`.
    pub fn subscribe(&mut self, ids: &[DeviceId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.device_ids.extend(ids.iter().cloned());
    }

    /// Removes device IDs from the subscription set. `wildcard` drops `"*"`.
    pub fn unsubscribe(&mut self, ids: &[DeviceId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.device_ids.remove(id);
        }
    }

    /// Returns `true` if the event should be delivered to this client.
    ///
    /// Feed failures go to every client with at least one subscription.
    #[must_use]
    pub fn matches(&self, event: &BridgeEvent) -> bool {
        if self.subscribe_all {
            return true;
        }
        if event.is_broadcast() {
            return !self.device_ids.is_empty();
        }
        self.device_ids.iter().any(|id| event.concerns(id))
    }

    /// Returns the view of `event` this client should receive, or `None`.
    ///
    /// Wildcard clients get the event as published. Other clients only see
    /// the transactions of their subscribed devices.
    #[must_use]
    pub fn project<'a>(&self, event: &'a BridgeEvent) -> Option<Cow<'a, BridgeEvent>> {
        if !self.matches(event) {
            return None;
        }
        if self.subscribe_all || !matches!(event, BridgeEvent::TransactionsObserved { .. }) {
            return Some(Cow::Borrowed(event));
        }
        Some(Cow::Owned(
            event.restricted_to(|id| self.device_ids.contains(id)),
        ))
    }

    /// Returns the number of explicitly subscribed device IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.device_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::domain::{DeviceRecord, DeviceStatus, TransactionEvent};

    fn id(raw: &str) -> DeviceId {
        let Ok(id) = DeviceId::parse(raw) else {
            panic!("valid id");
        };
        id
    }

    fn updated(raw: &str) -> BridgeEvent {
        BridgeEvent::DeviceUpdated {
            device_id: id(raw),
            status: DeviceStatus::Online,
            record: DeviceRecord::new(id(raw)),
            timestamp: Utc::now(),
        }
    }

    fn feed_failed() -> BridgeEvent {
        BridgeEvent::FeedFailed {
            error: "closed".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&updated("A")));
        assert!(!mgr.matches(&feed_failed()));
    }

    #[test]
    fn subscribe_specific_device() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id("A")], false);
        assert!(mgr.matches(&updated("A")));
        assert!(!mgr.matches(&updated("B")));
        assert!(mgr.matches(&feed_failed()));
    }

    #[test]
    fn transaction_batches_match_any_contained_device() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id("B")], false);
        let batch = BridgeEvent::transactions_observed(vec![
            TransactionEvent::decode("k1", &json!({ "deviceId": "A" })),
            TransactionEvent::decode("k2", &json!({ "deviceId": "B" })),
        ]);
        assert!(mgr.matches(&batch));

        let other = BridgeEvent::transactions_observed(vec![TransactionEvent::decode(
            "k3",
            &json!({ "deviceId": "C" }),
        )]);
        assert!(!mgr.matches(&other));
    }

    #[test]
    fn device_subscribers_only_see_their_transactions() {
        let batch = BridgeEvent::transactions_observed(vec![
            TransactionEvent::decode("k1", &json!({ "deviceId": "A", "amount": 5 })),
            TransactionEvent::decode("k2", &json!({ "deviceId": "B", "amount": 9 })),
        ]);

        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id("B")], false);
        let Some(view) = mgr.project(&batch) else {
            panic!("batch concerns B");
        };
        let BridgeEvent::TransactionsObserved {
            count,
            device_ids,
            transactions,
            ..
        } = view.as_ref()
        else {
            panic!("wrong variant");
        };
        assert_eq!(*count, 1);
        assert_eq!(device_ids, &vec![id("B")]);
        assert!(transactions.iter().all(|t| t.device_id == Some(id("B"))));

        let mut all = SubscriptionManager::new();
        all.subscribe(&[], true);
        assert!(matches!(all.project(&batch), Some(Cow::Borrowed(_))));

        let mut none = SubscriptionManager::new();
        none.subscribe(&[id("C")], false);
        assert!(none.project(&batch).is_none());
    }

    #[test]
    fn wildcard_matches_everything_until_dropped() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(&updated("A")));
        assert!(mgr.matches(&updated("B")));

        mgr.unsubscribe(&[], true);
        assert!(!mgr.is_subscribed_all());
        assert!(!mgr.matches(&updated("A")));
    }

    #[test]
    fn unsubscribe_removes_device() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[id("A"), id("B")], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id("A")], false);
        assert!(!mgr.matches(&updated("A")));
        assert_eq!(mgr.count(), 1);
    }
}
