//! Subscription bookkeeping.
//!
//! Each subscription message is sent at most once per connection
//! lifetime; the identity-key set enforces that. The set is cleared
//! before a reconnect so every subscription is resent on the new socket.

use crate::message::StreamSubscription;
use hldesk_core::Scope;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Tracks which subscriptions have been sent on the current connection.
pub struct SubscriptionManager {
    sent: RwLock<HashSet<String>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(HashSet::new()),
        }
    }

    /// The subscription set a (scope, address) stream needs: always the
    /// price stream for the scope; account-state and spot-balance streams
    /// when an address is present.
    pub fn required_for(scope: &Scope, address: Option<&str>) -> Vec<StreamSubscription> {
        let mut subs = vec![StreamSubscription::all_mids(scope)];
        if let Some(addr) = address {
            subs.push(StreamSubscription::account_state(addr));
            subs.push(StreamSubscription::spot_state(addr));
        }
        subs
    }

    /// Record a subscription; returns `true` the first time it is seen on
    /// this connection, `false` for repeats (which must not be resent).
    pub fn mark_if_new(&self, sub: &StreamSubscription) -> bool {
        self.sent.write().insert(sub.identity_key())
    }

    /// Forget everything. Called before resubscribing on reconnect.
    pub fn clear(&self) {
        self.sent.write().clear();
    }

    pub fn active_count(&self) -> usize {
        self.sent.read().len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_set_without_address() {
        let subs = SubscriptionManager::required_for(&Scope::Main, None);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].kind, "allMids");
    }

    #[test]
    fn test_required_set_with_address() {
        let scope = Scope::Dex("xyz".to_string());
        let subs = SubscriptionManager::required_for(&scope, Some("0xabc"));
        let kinds: Vec<&str> = subs.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["allMids", "webData3", "spotState"]);
        assert_eq!(subs[0].dex.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_repeat_subscriptions_suppressed() {
        let mgr = SubscriptionManager::new();
        let sub = StreamSubscription::all_mids(&Scope::Main);
        assert!(mgr.mark_if_new(&sub));
        assert!(!mgr.mark_if_new(&sub));
        assert_eq!(mgr.active_count(), 1);
    }

    #[test]
    fn test_clear_allows_resend_exactly_once() {
        let mgr = SubscriptionManager::new();
        let subs = SubscriptionManager::required_for(&Scope::Main, Some("0xabc"));
        for sub in &subs {
            assert!(mgr.mark_if_new(sub));
        }

        mgr.clear();
        assert_eq!(mgr.active_count(), 0);

        let mut resent = 0;
        for sub in &subs {
            if mgr.mark_if_new(sub) {
                resent += 1;
            }
        }
        assert_eq!(resent, subs.len());
    }
}
