//! In-memory registry of push endpoints.
//!
//! The registry is the only shared mutable state in the fanout engine.
//! Endpoints are kept in insertion order in a slot vector; an identity
//! index maps each identity to its slot so removal is O(1) amortized.
//! Removed slots become tombstones, trailing tombstones are popped
//! immediately (keeping [`EndpointRegistry::most_recent`] O(1)), and the
//! vector is compacted once tombstones outnumber live entries.
//!
//! Every operation runs under a single `RwLock`, so mutations are atomic
//! with respect to both structures and readers always observe a complete
//! point-in-time view.
//!
//! # Example
//!
//! ```
//! use pushcast_core::{Endpoint, EndpointRegistry};
//!
//! # async fn example() -> pushcast_core::Result<()> {
//! let registry = EndpointRegistry::new();
//! let endpoint = Endpoint::from_parts("https://push.example.com/a", "p256dh", "auth")?;
//!
//! assert_eq!(registry.add(endpoint.clone()).await, 1);
//! assert_eq!(registry.add(endpoint).await, 1);
//! assert_eq!(registry.count().await, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    models::{Endpoint, EndpointIdentity, EndpointSummary},
};

/// Tombstone count below which compaction is never attempted.
const COMPACTION_FLOOR: usize = 32;

/// Deduplicated, insertion-ordered collection of push endpoints.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    state: RwLock<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: Vec<Option<Endpoint>>,
    index: HashMap<EndpointIdentity, usize>,
}

impl RegistryState {
    fn live(&self) -> impl DoubleEndedIterator<Item = &Endpoint> {
        self.slots.iter().flatten()
    }

    fn tombstones(&self) -> usize {
        self.slots.len() - self.index.len()
    }

    fn trim_trailing_tombstones(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }

    fn compact_if_sparse(&mut self) {
        let tombstones = self.tombstones();
        if tombstones < COMPACTION_FLOOR || tombstones <= self.index.len() {
            return;
        }

        let live: Vec<Endpoint> = self.slots.drain(..).flatten().collect();
        self.index.clear();
        for (slot, endpoint) in live.iter().enumerate() {
            self.index.insert(endpoint.identity().clone(), slot);
        }
        self.slots = live.into_iter().map(Some).collect();

        debug!(reclaimed = tombstones, live = self.index.len(), "compacted endpoint registry");
    }
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint and returns the resulting total count.
    ///
    /// Re-registering an identity that is already present refreshes its
    /// credential material in place (last write wins) and keeps its original
    /// position, so the count never grows for a known identity.
    pub async fn add(&self, endpoint: Endpoint) -> usize {
        let mut state = self.state.write().await;

        if let Some(&slot) = state.index.get(endpoint.identity()) {
            debug!(endpoint = %endpoint.identity().preview(), "refreshed existing endpoint");
            state.slots[slot] = Some(endpoint);
        } else {
            let slot = state.slots.len();
            state.index.insert(endpoint.identity().clone(), slot);
            state.slots.push(Some(endpoint));
        }

        state.index.len()
    }

    /// Removes every endpoint and returns how many were present.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let previous = state.index.len();
        state.slots.clear();
        state.index.clear();
        previous
    }

    /// Removes the endpoint with the given identity.
    ///
    /// Returns `false` without error when the identity is unknown.
    pub async fn remove(&self, identity: &EndpointIdentity) -> bool {
        let mut state = self.state.write().await;

        let Some(slot) = state.index.remove(identity) else {
            return false;
        };
        state.slots[slot] = None;
        state.trim_trailing_tombstones();
        state.compact_if_sparse();
        true
    }

    /// Returns a point-in-time copy of all endpoints in insertion order.
    pub async fn snapshot(&self) -> Vec<Endpoint> {
        self.state.read().await.live().cloned().collect()
    }

    /// Number of registered endpoints.
    pub async fn count(&self) -> usize {
        self.state.read().await.index.len()
    }

    /// Whether the registry holds no endpoints.
    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }

    /// Whether an endpoint with the given identity is registered.
    pub async fn contains(&self, identity: &EndpointIdentity) -> bool {
        self.state.read().await.index.contains_key(identity)
    }

    /// The most recently inserted endpoint still present.
    pub async fn most_recent(&self) -> Option<Endpoint> {
        self.state.read().await.live().next_back().cloned()
    }

    /// Redacted summaries of the last `n` endpoints, oldest first.
    pub async fn sample_tail(&self, n: usize) -> Vec<EndpointSummary> {
        let state = self.state.read().await;
        let mut tail: Vec<EndpointSummary> =
            state.live().rev().take(n).map(Endpoint::summary).collect();
        tail.reverse();
        tail
    }

    /// Verifies that the identity index and slot vector agree.
    pub async fn check_invariants(&self) -> Result<()> {
        let state = self.state.read().await;

        let live = state.live().count();
        if live != state.index.len() {
            return Err(CoreError::invariant(format!(
                "index holds {} identities but {live} slots are live",
                state.index.len()
            )));
        }

        for (identity, &slot) in &state.index {
            match state.slots.get(slot) {
                Some(Some(endpoint)) if endpoint.identity() == identity => {},
                _ => {
                    return Err(CoreError::invariant(format!(
                        "identity {} does not resolve to its slot {slot}",
                        identity.preview()
                    )));
                },
            }
        }

        if matches!(state.slots.last(), Some(None)) {
            return Err(CoreError::invariant("trailing tombstone left in slot vector"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(n: usize) -> Endpoint {
        Endpoint::from_parts(format!("https://push.example.com/{n}"), "p256dh", "auth").unwrap()
    }

    fn identity(n: usize) -> EndpointIdentity {
        EndpointIdentity::new(format!("https://push.example.com/{n}")).unwrap()
    }

    #[tokio::test]
    async fn add_returns_running_count() {
        let registry = EndpointRegistry::new();

        assert_eq!(registry.add(endpoint(1)).await, 1);
        assert_eq!(registry.add(endpoint(2)).await, 2);
        assert_eq!(registry.add(endpoint(3)).await, 3);
    }

    #[tokio::test]
    async fn re_adding_identity_is_idempotent() {
        let registry = EndpointRegistry::new();

        registry.add(endpoint(1)).await;
        registry.add(endpoint(1)).await;

        assert_eq!(registry.count().await, 1);
        registry.check_invariants().await.unwrap();
    }

    #[tokio::test]
    async fn re_adding_refreshes_credentials_in_place() {
        let registry = EndpointRegistry::new();
        registry.add(endpoint(1)).await;
        registry.add(endpoint(2)).await;

        let refreshed =
            Endpoint::from_parts("https://push.example.com/1", "new-p256dh", "new-auth").unwrap();
        assert_eq!(registry.add(refreshed.clone()).await, 2);

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[0], refreshed);
        assert_eq!(registry.most_recent().await, Some(endpoint(2)));
    }

    #[tokio::test]
    async fn remove_unknown_identity_is_noop() {
        let registry = EndpointRegistry::new();
        registry.add(endpoint(1)).await;

        assert!(!registry.remove(&identity(99)).await);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn most_recent_skips_removed_tail() {
        let registry = EndpointRegistry::new();
        for n in 1..=3 {
            registry.add(endpoint(n)).await;
        }

        assert!(registry.remove(&identity(3)).await);
        assert_eq!(registry.most_recent().await, Some(endpoint(2)));

        assert!(registry.remove(&identity(1)).await);
        assert_eq!(registry.most_recent().await, Some(endpoint(2)));
        registry.check_invariants().await.unwrap();
    }

    #[tokio::test]
    async fn clear_is_total() {
        let registry = EndpointRegistry::new();
        for n in 0..5 {
            registry.add(endpoint(n)).await;
        }

        assert_eq!(registry.clear().await, 5);
        assert_eq!(registry.count().await, 0);
        assert!(registry.most_recent().await.is_none());
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn sample_tail_returns_latest_oldest_first() {
        let registry = EndpointRegistry::new();
        for n in 0..10 {
            registry.add(endpoint(n)).await;
        }

        let tail = registry.sample_tail(3).await;
        let previews: Vec<_> = tail.iter().map(|s| s.identity_preview.as_str()).collect();
        assert_eq!(previews, vec![
            "https://push.example.com/7",
            "https://push.example.com/8",
            "https://push.example.com/9",
        ]);

        assert_eq!(registry.sample_tail(50).await.len(), 10);
        assert!(registry.sample_tail(0).await.is_empty());
    }

    #[tokio::test]
    async fn compaction_preserves_order_and_index() {
        let registry = EndpointRegistry::new();
        for n in 0..200 {
            registry.add(endpoint(n)).await;
        }

        for n in (0..200).filter(|n| n % 4 != 0) {
            assert!(registry.remove(&identity(n)).await);
        }

        registry.check_invariants().await.unwrap();
        let remaining: Vec<_> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|e| e.identity().as_str().to_string())
            .collect();
        let expected: Vec<_> =
            (0..200).filter(|n| n % 4 == 0).map(|n| format!("https://push.example.com/{n}")).collect();
        assert_eq!(remaining, expected);

        let state = registry.state.read().await;
        assert!(state.slots.len() <= 2 * state.index.len() + COMPACTION_FLOOR);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_mutation() {
        let registry = EndpointRegistry::new();
        registry.add(endpoint(1)).await;

        let snapshot = registry.snapshot().await;
        registry.add(endpoint(2)).await;
        registry.remove(&identity(1)).await;

        assert_eq!(snapshot, vec![endpoint(1)]);
    }
}
