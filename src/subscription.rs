//! Event subscription registry
//!
//! Binds (event source, event kind) pairs to dispatch routes with a hard
//! lifetime rule: every subscription is removed exactly once, on whichever
//! side dies first. The owning entity holds a move-only
//! [`SubscriptionHandle`]; consuming it is the only way to unsubscribe, so
//! a double deregistration cannot be written. When the source itself dies,
//! [`Registry::retire`] sweeps its remaining subscriptions and any handle
//! still held by the entity becomes an inert token.
//!
//! Dispatch consults [`Registry::routes`]: an event for a retired source
//! finds no routes and is dropped, which is what makes destroy handling a
//! cancellation point for everything still queued behind it.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::backend::{OutputId, SurfaceId, ViewId};

/// An event source the core can subscribe against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Output(OutputId),
    Surface(SurfaceId),
}

/// Event kinds a source can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Frame,
    Destroy,
}

/// Where a subscribed event is routed by the server's dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    OutputFrame(OutputId),
    OutputDestroy(OutputId),
    ViewDestroy(ViewId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SubscriptionId(u64);

/// Move-only proof of a live subscription. Owned by the subscribing
/// entity and consumed on unsubscribe.
#[derive(Debug)]
#[must_use = "dropping a handle without unsubscribing leaves the entry to the source's retirement"]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

struct Entry<H> {
    source: Source,
    kind: EventKind,
    route: H,
}

pub struct Registry<H> {
    entries: HashMap<SubscriptionId, Entry<H>>,
    by_source: HashMap<(Source, EventKind), Vec<SubscriptionId>>,
    live: HashSet<Source>,
    next_id: u64,
}

impl<H: Copy> Registry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_source: HashMap::new(),
            live: HashSet::new(),
            next_id: 1,
        }
    }

    /// Mark a source as live. Must precede any subscribe against it.
    pub fn announce(&mut self, source: Source) {
        self.live.insert(source);
    }

    pub fn is_live(&self, source: Source) -> bool {
        self.live.contains(&source)
    }

    /// Register a route for (source, kind). Subscribing to a source that
    /// was never announced or already retired is a programming error.
    pub fn subscribe(&mut self, source: Source, kind: EventKind, route: H) -> SubscriptionHandle {
        debug_assert!(
            self.live.contains(&source),
            "subscribe on dead source {:?}",
            source
        );
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { source, kind, route });
        self.by_source.entry((source, kind)).or_default().push(id);
        trace!("subscribed {:?} to {:?}/{:?}", id, source, kind);
        SubscriptionHandle { id }
    }

    /// Remove a subscription by consuming its handle. A no-op when the
    /// source's retirement already swept the entry.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        if let Some(entry) = self.entries.remove(&handle.id) {
            if let Some(ids) = self.by_source.get_mut(&(entry.source, entry.kind)) {
                ids.retain(|id| *id != handle.id);
                if ids.is_empty() {
                    self.by_source.remove(&(entry.source, entry.kind));
                }
            }
            trace!("unsubscribed {:?}", handle.id);
        }
    }

    /// The source is gone: drop everything still registered against it and
    /// stop accepting new subscriptions for it.
    pub fn retire(&mut self, source: Source) {
        self.live.remove(&source);
        for kind in [EventKind::Frame, EventKind::Destroy] {
            if let Some(ids) = self.by_source.remove(&(source, kind)) {
                for id in ids {
                    self.entries.remove(&id);
                }
            }
        }
    }

    /// Routes currently bound to (source, kind). Empty for retired or
    /// unknown sources, which silently drops their queued events.
    pub fn routes(&self, source: Source, kind: EventKind) -> Vec<H> {
        self.by_source
            .get(&(source, kind))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entries.get(id).map(|e| e.route))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscription_count(&self) -> usize {
        self.entries.len()
    }
}

impl<H: Copy> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_source() -> Source {
        Source::Output(OutputId(1))
    }

    #[test]
    fn subscribe_then_unsubscribe_removes_route() {
        let mut registry: Registry<u32> = Registry::new();
        registry.announce(output_source());

        let handle = registry.subscribe(output_source(), EventKind::Frame, 7);
        assert_eq!(registry.routes(output_source(), EventKind::Frame), vec![7]);

        registry.unsubscribe(handle);
        assert!(registry.routes(output_source(), EventKind::Frame).is_empty());
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn retire_sweeps_all_subscriptions_of_source() {
        let mut registry: Registry<u32> = Registry::new();
        registry.announce(output_source());
        let frame = registry.subscribe(output_source(), EventKind::Frame, 1);
        let _destroy = registry.subscribe(output_source(), EventKind::Destroy, 2);

        registry.retire(output_source());
        assert_eq!(registry.subscription_count(), 0);
        assert!(!registry.is_live(output_source()));

        // The handle the entity still holds is inert now; consuming it
        // must not remove anything twice or panic.
        registry.unsubscribe(frame);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn routes_are_isolated_per_source_and_kind() {
        let mut registry: Registry<u32> = Registry::new();
        let a = Source::Output(OutputId(1));
        let b = Source::Surface(SurfaceId(1));
        registry.announce(a);
        registry.announce(b);
        let _ha = registry.subscribe(a, EventKind::Frame, 10);
        let _hb = registry.subscribe(b, EventKind::Destroy, 20);

        assert_eq!(registry.routes(a, EventKind::Frame), vec![10]);
        assert!(registry.routes(a, EventKind::Destroy).is_empty());
        assert_eq!(registry.routes(b, EventKind::Destroy), vec![20]);
    }

    #[test]
    #[should_panic(expected = "subscribe on dead source")]
    fn subscribing_to_unannounced_source_is_fatal_in_debug() {
        let mut registry: Registry<u32> = Registry::new();
        let _ = registry.subscribe(output_source(), EventKind::Frame, 1);
    }

    #[test]
    fn events_for_unknown_sources_have_no_routes() {
        let registry: Registry<u32> = Registry::new();
        assert!(registry
            .routes(Source::Surface(SurfaceId(99)), EventKind::Destroy)
            .is_empty());
    }
}
