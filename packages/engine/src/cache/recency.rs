//! Recency list over an index arena
//!
//! Head is the least recently used node, tail the most recently used.
//! Slots are reused through a free list; a `NodeId` stays valid until the
//! node is unlinked.

use std::sync::Arc;

use super::CacheKey;
use crate::resource::Resource;

pub(crate) type NodeId = usize;

/// Mutable timing of a cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timing {
    pub(crate) last_refresh: u64,
    /// `last_refresh + max_age`
    pub(crate) fresh_until: u64,
    pub(crate) last_used: u64,
    /// A refresh is in flight; never evicted while set
    pub(crate) being_loaded: bool,
}

impl Timing {
    pub(crate) fn fresh(now: u64, max_age: u64) -> Self {
        Self {
            last_refresh: now,
            fresh_until: now.saturating_add(max_age),
            last_used: now,
            being_loaded: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) resource: Arc<Resource>,
    pub(crate) key: CacheKey,
    pub(crate) size: u64,
    pub(crate) timing: Timing,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug, Default)]
pub(crate) struct RecencyList {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
    total_bytes: u64,
}

impl RecencyList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Append as most recently used.
    pub(crate) fn push_back(&mut self, key: CacheKey, resource: Arc<Resource>, timing: Timing) -> NodeId {
        let size = resource.size();
        let node = Node {
            resource,
            key,
            size,
            timing,
            prev: self.tail,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        match self.tail {
            Some(tail) => {
                if let Some(t) = self.get_mut(tail) {
                    t.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        self.total_bytes += size;
        id
    }

    /// Detach and free a node.
    pub(crate) fn unlink(&mut self, id: NodeId) -> Option<Node> {
        let node = self.slots.get_mut(id)?.take()?;
        match node.prev {
            Some(prev) => {
                if let Some(p) = self.get_mut(prev) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.get_mut(next) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        self.free.push(id);
        self.len -= 1;
        self.total_bytes -= node.size;
        Some(node)
    }

    /// Mark `id` most recently used.
    pub(crate) fn touch(&mut self, id: NodeId) {
        if self.tail == Some(id) {
            return;
        }
        let Some(node) = self.slots.get_mut(id).and_then(Option::take) else {
            return;
        };
        // Relink in place: detach, then append without touching the totals.
        let (prev, next) = (node.prev, node.next);
        match prev {
            Some(p) => {
                if let Some(p) = self.get_mut(p) {
                    p.next = next;
                }
            }
            None => self.head = next,
        }
        if let Some(n) = next.and_then(|n| self.get_mut(n)) {
            n.prev = prev;
        }
        let old_tail = self.tail;
        if let Some(t) = old_tail.and_then(|t| self.get_mut(t)) {
            t.next = Some(id);
        }
        self.slots[id] = Some(Node {
            prev: old_tail,
            next: None,
            ..node
        });
        self.tail = Some(id);
        if self.head.is_none() {
            self.head = Some(id);
        }
    }

    /// Up to `limit` node ids, least recently used first.
    pub(crate) fn oldest(&self, limit: usize) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(limit.min(self.len));
        let mut cursor = self.head;
        while let Some(id) = cursor {
            if ids.len() == limit {
                break;
            }
            ids.push(id);
            cursor = self.get(id).and_then(|n| n.next);
        }
        ids
    }

    /// Every node id, least recently used first.
    pub(crate) fn ids(&self) -> Vec<NodeId> {
        self.oldest(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceBuilder, ResourceKind};
    use crate::variant::Variant;

    fn node(list: &mut RecencyList, name: &str, size: usize) -> NodeId {
        let url = format!("http://a.com/{name}.png");
        let resource = ResourceBuilder::new(ResourceKind::Image, url.clone(), vec![0u8; size]).build();
        let key = CacheKey::new(Variant::NON_PAGE, &url);
        let size = resource.size();
        let id = list.push_back(key, Arc::new(resource), Timing::fresh(0, 10));
        assert_eq!(list.get(id).map(|n| n.size), Some(size));
        id
    }

    #[test]
    fn touch_moves_to_tail() {
        let mut list = RecencyList::default();
        let a = node(&mut list, "a", 10);
        let b = node(&mut list, "b", 20);
        let c = node(&mut list, "c", 30);
        list.touch(a);
        assert_eq!(list.ids(), [b, c, a]);
        list.touch(c);
        assert_eq!(list.ids(), [b, a, c]);
        list.touch(c);
        assert_eq!(list.ids(), [b, a, c]);
        // Images hold original and optimized copies.
        assert_eq!(list.total_bytes(), 120);
    }

    #[test]
    fn unlink_keeps_links_and_totals() {
        let mut list = RecencyList::default();
        let a = node(&mut list, "a", 10);
        let b = node(&mut list, "b", 20);
        let c = node(&mut list, "c", 30);
        assert!(list.unlink(b).is_some());
        assert!(list.unlink(b).is_none());
        assert_eq!(list.ids(), [a, c]);
        assert_eq!(list.total_bytes(), 80);
        list.unlink(a);
        list.unlink(c);
        assert_eq!(list.len(), 0);
        assert_eq!(list.total_bytes(), 0);
        assert!(list.ids().is_empty());
        // Freed slots are reused.
        let d = node(&mut list, "d", 5);
        assert!(d <= c);
        assert_eq!(list.oldest(5), [d]);
    }
}
