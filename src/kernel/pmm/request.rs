// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Delayed (asynchronous) allocation requests.
//!
//! A `DelayedRequest` is queued when a caller wants pages but cannot block
//! the calling thread waiting for memory to free up. A dedicated request
//! thread (`PmmNode::request_thread_step`) services the FIFO queue once the
//! memory-availability level rises above OOM, invoking the caller's
//! `on_available` callback with the node lock released.

use alloc::collections::VecDeque;

/// Caller-supplied context plus the two callbacks invoked by the request
/// thread. `ctx` is an opaque token round-tripped back to the callbacks;
/// this crate never inspects it.
pub struct DelayedRequest {
    pub offset: u64,
    pub length: u64,
    pub ctx: u64,
    id: u64,
}

impl DelayedRequest {
    pub fn new(offset: u64, length: u64, ctx: u64, id: u64) -> Self {
        DelayedRequest {
            offset,
            length,
            ctx,
            id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Result of servicing one request through its `on_available` callback.
pub struct ServiceOutcome {
    pub dropped_ref: bool,
    pub requeued: bool,
}

/// FIFO queue of pending requests plus the single "current" (in-flight)
/// request, mirroring `PmmNode`'s `request_list_`/`current_request_` pair.
#[derive(Default)]
pub struct RequestQueue {
    pending: VecDeque<DelayedRequest>,
    current: Option<DelayedRequest>,
    next_id: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        RequestQueue {
            pending: VecDeque::new(),
            current: None,
            next_id: 1,
        }
    }

    /// Enqueue a new request at the tail; returns its id so the caller can
    /// later `clear` it.
    pub fn enqueue(&mut self, offset: u64, length: u64, ctx: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(DelayedRequest::new(offset, length, ctx, id));
        id
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    /// Move the head pending request into `current`, returning its fields
    /// for the caller to pass to `on_available` with the node lock dropped.
    pub fn begin_service(&mut self) -> Option<(u64, u64, u64, u64)> {
        let req = self.pending.pop_front()?;
        let fields = (req.id, req.offset, req.length, req.ctx);
        self.current = Some(req);
        Some(fields)
    }

    /// Called after `on_available` returns `actual_supplied` pages for the
    /// request with id `id`. If the request is still current: either it is
    /// fully satisfied (drop its ref) or it needs more (advance and
    /// requeue at the head). If `clear` raced us and cleared `current` in
    /// the meantime, neither happens: the caller already took ownership of
    /// the context.
    pub fn finish_service(&mut self, id: u64, actual_supplied: u64) -> ServiceOutcome {
        match &self.current {
            Some(cur) if cur.id() == id => {}
            _ => {
                return ServiceOutcome {
                    dropped_ref: false,
                    requeued: false,
                }
            }
        }
        let mut req = self.current.take().unwrap();
        if actual_supplied < req.length {
            req.offset += actual_supplied;
            req.length -= actual_supplied;
            self.pending.push_front(req);
            ServiceOutcome {
                dropped_ref: false,
                requeued: true,
            }
        } else {
            ServiceOutcome {
                dropped_ref: true,
                requeued: false,
            }
        }
    }

    /// Cancel request `id`. Returns `true` if it was still pending (caller
    /// keeps ownership of its context), `false` if it was the in-flight
    /// current request (the servicer will see `current` cleared and skip
    /// both requeue and drop-ref; the caller must drop the context itself).
    pub fn clear(&mut self, id: u64) -> bool {
        if let Some(pos) = self.pending.iter().position(|r| r.id() == id) {
            self.pending.remove(pos);
            return true;
        }
        if matches!(&self.current, Some(cur) if cur.id() == id) {
            self.current = None;
        }
        false
    }

    /// Replace request `id`'s offset/length/ctx in place, wherever it lives
    /// (pending or current), preserving its id.
    pub fn swap(&mut self, id: u64, offset: u64, length: u64, ctx: u64) -> bool {
        if let Some(req) = self.pending.iter_mut().find(|r| r.id() == id) {
            req.offset = offset;
            req.length = length;
            req.ctx = ctx;
            return true;
        }
        if let Some(cur) = &mut self.current {
            if cur.id() == id {
                cur.offset = offset;
                cur.length = length;
                cur.ctx = ctx;
                return true;
            }
        }
        false
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let mut q = RequestQueue::new();
        let a = q.enqueue(0, 4, 100);
        let b = q.enqueue(0, 4, 200);
        let (id, _, _, ctx) = q.begin_service().unwrap();
        assert_eq!(id, a);
        assert_eq!(ctx, 100);
        q.finish_service(id, 4);
        let (id2, _, _, ctx2) = q.begin_service().unwrap();
        assert_eq!(id2, b);
        assert_eq!(ctx2, 200);
    }

    #[test]
    fn partial_fill_requeues_at_head_with_advanced_offset() {
        let mut q = RequestQueue::new();
        q.enqueue(0, 10, 1);
        let (id, offset, length, _) = q.begin_service().unwrap();
        assert_eq!((offset, length), (0, 10));
        let outcome = q.finish_service(id, 4);
        assert!(outcome.requeued);
        assert!(!outcome.dropped_ref);
        let (_, offset2, length2, _) = q.begin_service().unwrap();
        assert_eq!((offset2, length2), (4, 6));
    }

    #[test]
    fn clear_pending_returns_true() {
        let mut q = RequestQueue::new();
        let id = q.enqueue(0, 4, 1);
        assert!(q.clear(id));
        assert!(q.is_idle());
    }

    #[test]
    fn clear_current_returns_false_and_is_absorbed_by_finish_service() {
        let mut q = RequestQueue::new();
        let id = q.enqueue(0, 4, 1);
        q.begin_service().unwrap();
        assert!(!q.clear(id));
        // finish_service now sees no current request matching `id` and
        // performs neither requeue nor drop-ref.
        let outcome = q.finish_service(id, 4);
        assert!(!outcome.dropped_ref);
        assert!(!outcome.requeued);
    }

    #[test]
    fn swap_preserves_id_while_replacing_fields() {
        let mut q = RequestQueue::new();
        let id = q.enqueue(0, 4, 1);
        assert!(q.swap(id, 8, 16, 2));
        let (sid, offset, length, ctx) = q.begin_service().unwrap();
        assert_eq!(sid, id);
        assert_eq!((offset, length, ctx), (8, 16, 2));
    }
}
