//! Subscription storage.
//!
//! Subscriptions live either in a bucket keyed by their exact event type or
//! in the wildcard list. Every list stays sorted by `(priority, sequence)`
//! after each insertion, and a bucket that becomes empty is removed.

use std::collections::HashMap;
use std::sync::Arc;

use super::subscription::{Subscription, SubscriptionHandle, WILDCARD};

/// Type-keyed buckets plus the wildcard list
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    buckets: HashMap<String, Vec<Arc<Subscription>>>,
    wildcards: Vec<Arc<Subscription>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription into its list and restore ordering
    pub(crate) fn insert(&mut self, subscription: Arc<Subscription>) {
        let list = if subscription.event_type() == WILDCARD {
            &mut self.wildcards
        } else {
            self.buckets
                .entry(subscription.event_type().to_string())
                .or_default()
        };
        list.push(subscription);
        list.sort_by_key(|s| s.order_key());
    }

    /// Remove by identity. Returns `false` when the subscription is unknown.
    pub(crate) fn remove(&mut self, handle: &SubscriptionHandle) -> bool {
        if handle.is_wildcard() {
            return remove_by_id(&mut self.wildcards, handle);
        }

        let Some(bucket) = self.buckets.get_mut(handle.event_type()) else {
            return false;
        };
        let removed = remove_by_id(bucket, handle);
        if bucket.is_empty() {
            self.buckets.remove(handle.event_type());
        }
        removed
    }

    /// Clear everything (`None`), only wildcards (`"*"`), or one bucket
    pub(crate) fn clear(&mut self, event_type: Option<&str>) -> usize {
        match event_type {
            None => {
                let removed = self.len();
                for subscription in self.buckets.values().flatten() {
                    subscription.retire();
                }
                self.buckets.clear();
                retire_all(std::mem::take(&mut self.wildcards));
                removed
            }
            Some(WILDCARD) => retire_all(std::mem::take(&mut self.wildcards)),
            Some(event_type) => self.buckets.remove(event_type).map_or(0, retire_all),
        }
    }

    /// Number of subscriptions for a pattern, or in total for `None`
    pub(crate) fn count(&self, event_type: Option<&str>) -> usize {
        match event_type {
            None => self.len(),
            Some(WILDCARD) => self.wildcards.len(),
            Some(event_type) => self.buckets.get(event_type).map_or(0, Vec::len),
        }
    }

    fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum::<usize>() + self.wildcards.len()
    }

    /// Snapshot of every subscription that may receive `event_type`.
    ///
    /// The bucket and wildcard lists are each sorted, but their concatenation
    /// is not, so the merged snapshot is sorted again.
    pub(crate) fn candidates(&self, event_type: &str) -> Vec<Arc<Subscription>> {
        let bucket = self.buckets.get(event_type).map(Vec::as_slice).unwrap_or(&[]);
        let mut candidates: Vec<Arc<Subscription>> = bucket
            .iter()
            .chain(self.wildcards.iter())
            .cloned()
            .collect();
        candidates.sort_by_key(|s| s.order_key());
        candidates
    }

    /// Snapshot of every subscription carrying a throttle policy
    pub(crate) fn throttled(&self) -> Vec<Arc<Subscription>> {
        self.buckets
            .values()
            .flatten()
            .chain(self.wildcards.iter())
            .filter(|s| s.is_throttled())
            .cloned()
            .collect()
    }

    /// Event types that currently have a bucket
    pub(crate) fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.buckets.keys().cloned().collect();
        types.sort();
        types
    }
}

fn retire_all(list: Vec<Arc<Subscription>>) -> usize {
    for subscription in &list {
        subscription.retire();
    }
    list.len()
}

fn remove_by_id(list: &mut Vec<Arc<Subscription>>, handle: &SubscriptionHandle) -> bool {
    match list.iter().position(|s| s.id() == handle.id()) {
        Some(index) => {
            list.remove(index).retire();
            true
        }
        None => false,
    }
}
