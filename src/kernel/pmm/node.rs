// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! PmmNode: the top-level allocator. Composes arenas, free lists, the
//! watermark machine, and the delayed-request queue behind a single lock.

use alloc::vec::Vec;

use spin::{Mutex, Once};

use crate::kernel::pmm::arena::{Arena, PAGE_SIZE};
use crate::kernel::pmm::cow_pages::CowPages;
use crate::kernel::pmm::counters::PmmCounters;
use crate::kernel::pmm::error::{PmmError, PmmResult};
use crate::kernel::pmm::evictor::{EvictedCounts, EvictionLevel, EvictionTarget, Evictor};
use crate::kernel::pmm::flags::AllocFlags;
use crate::kernel::pmm::free_list::{FreeList, PageId};
use crate::kernel::pmm::loan_sweeper::{LoanSweeper, PhysicalOrder};
use crate::kernel::pmm::page::{PageState, QueueTag};
use crate::kernel::pmm::page_queues::{PageQueues, Sublist};
use crate::kernel::pmm::request::RequestQueue;
use crate::kernel::pmm::watermark::WatermarkMachine;
use crate::rustux::types::PAddr;

/// A small xorshift PRNG used only by the `debug_set_random_should_fail_percent`
/// fault-injection knob. Not suitable for anything security-sensitive; the
/// real PRNG (ChaCha20/SHA256-based) lives outside this crate's scope.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        XorShift64 {
            state: if seed == 0 { 0x9e3779b97f4a7c15 } else { seed },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }
}

pub struct PmmNode {
    arenas: Vec<Arena>,
    /// Indices into `arenas`, kept sorted by descending priority. `arenas`
    /// itself never reorders after insertion so `PageId::arena` indices
    /// stay valid for the lifetime of the node.
    arena_priority_order: Vec<usize>,
    free: FreeList,
    watermark: WatermarkMachine,
    requests: RequestQueue,
    page_queues: PageQueues,
    evictor: Evictor,
    loan_sweeper: LoanSweeper,
    borrowing_enabled: bool,
    counters: PmmCounters,
    rng: XorShift64,
    debug_random_fail_percent: u8,
    free_fill_enabled: bool,
}

impl PmmNode {
    pub fn new() -> Self {
        PmmNode {
            arenas: Vec::new(),
            arena_priority_order: Vec::new(),
            free: FreeList::new(),
            watermark: WatermarkMachine::uninitialized(),
            requests: RequestQueue::new(),
            page_queues: PageQueues::new(),
            evictor: Evictor::new(),
            loan_sweeper: LoanSweeper::new(),
            borrowing_enabled: false,
            counters: PmmCounters::default(),
            rng: XorShift64::new(0xa5a5_1234_dead_beef),
            debug_random_fail_percent: 0,
            free_fill_enabled: false,
        }
    }

    pub fn counters(&self) -> &PmmCounters {
        &self.counters
    }

    // ---- Arenas ----------------------------------------------------

    /// Register a new arena. `arenas` is append-only: a `PageId::arena`
    /// handed out for this arena's index must stay valid for the node's
    /// lifetime. Priority ordering (used by `alloc_contiguous` and anything
    /// that wants to walk arenas highest-priority-first) is tracked
    /// separately in `arena_priority_order`. Rejects arenas that physically
    /// overlap an existing one.
    pub fn add_arena(&mut self, name: &str, base: PAddr, size: u64, priority: i32) -> PmmResult {
        let arena = Arena::new(name, base, size, priority)?;
        for existing in &self.arenas {
            if arena.overlaps(existing) {
                return Err(PmmError::InvalidArgs);
            }
        }
        let index = self.arenas.len();
        let free_pages = arena.page_count();
        self.arenas.push(arena);
        let pos = self
            .arena_priority_order
            .iter()
            .position(|&i| self.arenas[i].priority < priority)
            .unwrap_or(self.arena_priority_order.len());
        self.arena_priority_order.insert(pos, index);
        self.add_free_pages(index, free_pages);
        Ok(())
    }

    /// Arenas in descending-priority order, for callers (debug dump,
    /// `alloc_contiguous`) that want to prefer higher-priority arenas first.
    pub fn arenas_by_priority(&self) -> impl Iterator<Item = &Arena> {
        self.arena_priority_order.iter().map(move |&i| &self.arenas[i])
    }

    fn add_free_pages(&mut self, arena_index: usize, count: usize) {
        for i in 0..count {
            self.free.push_regular(PageId {
                arena: arena_index as u32,
                index: i as u32,
            });
        }
        self.on_free_count_changed();
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    fn find_arena_for(&self, paddr: PAddr) -> Option<usize> {
        self.arenas.iter().position(|a| a.contains(paddr))
    }

    // ---- Counting ----------------------------------------------------

    pub fn count_free_pages(&self) -> u64 {
        self.free.total_count() as u64
    }

    pub fn count_total_pages(&self) -> u64 {
        self.arenas.iter().map(|a| a.page_count() as u64).sum()
    }

    pub fn count_total_bytes(&self) -> u64 {
        self.count_total_pages() * PAGE_SIZE
    }

    fn is_in_oom_state(&self) -> bool {
        self.watermark.is_oom()
    }

    /// Debug-only fault injection: while not actually OOM, randomly refuse
    /// a fraction of allocations to surface bugs that only manifest under
    /// allocation failure. Never applied when the caller is about to get
    /// `SHOULD_WAIT` anyway (that path already exercises failure).
    fn debug_should_randomly_fail(&mut self) -> bool {
        if self.debug_random_fail_percent == 0 {
            return false;
        }
        (self.rng.next_u32() % 100) < self.debug_random_fail_percent as u32
    }

    pub fn debug_set_random_should_fail_percent(&mut self, pct: u8) {
        self.debug_random_fail_percent = pct.min(100);
    }

    pub fn set_free_fill_enabled(&mut self, enabled: bool) {
        self.free_fill_enabled = enabled;
    }

    // ---- Allocation ----------------------------------------------------

    fn alloc_one_locked(&mut self, flags: AllocFlags) -> PmmResult<PageId> {
        // Only a `CAN_WAIT` caller is turned away purely for being in OOM: an
        // allocator without `CAN_WAIT` may still succeed while OOM, as long
        // as a page is actually available. It only sees `NO_MEMORY` once the
        // relevant free sublist is genuinely empty, below.
        if flags.contains(AllocFlags::CAN_WAIT) && self.is_in_oom_state() {
            return Err(PmmError::ShouldWait);
        }
        if self.debug_should_randomly_fail() {
            return Err(PmmError::NoMemory);
        }

        let id = if flags.contains(AllocFlags::MUST_BORROW) {
            self.free.pop_loaned().ok_or(PmmError::NoMemory)?
        } else if let Some(id) = self.free.pop_regular() {
            id
        } else if flags.contains(AllocFlags::CAN_BORROW) {
            self.free.pop_loaned().ok_or(PmmError::NoMemory)?
        } else {
            return Err(PmmError::NoMemory);
        };

        self.arenas[id.arena as usize].page_mut(id.index as usize).state = PageState::Alloc;
        self.on_free_count_changed();
        Ok(id)
    }

    pub fn alloc_page(&mut self, flags: AllocFlags) -> PmmResult<PageId> {
        self.alloc_one_locked(flags)
    }

    /// All-or-nothing bulk pop. Rolls back (re-frees) everything already
    /// popped if the run cannot be completed.
    pub fn alloc_pages(&mut self, count: usize, flags: AllocFlags) -> PmmResult<Vec<PageId>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if count == 1 {
            return self.alloc_one_locked(flags).map(|p| alloc::vec![p]);
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            match self.alloc_one_locked(flags) {
                Ok(id) => out.push(id),
                Err(e) => {
                    for id in out {
                        self.free_one_locked(id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Pop the `count` pages starting at `paddr`, which must all belong to
    /// one arena and currently be FREE. On partial failure, everything
    /// already popped in this call is put back.
    pub fn alloc_range(&mut self, paddr: PAddr, count: usize) -> PmmResult<Vec<PageId>> {
        let arena_idx = self.find_arena_for(paddr).ok_or(PmmError::NotFound)?;
        let start_index = self.arenas[arena_idx]
            .index_of(paddr)
            .ok_or(PmmError::NotFound)?;

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let index = start_index + i;
            if index >= self.arenas[arena_idx].page_count() {
                self.rollback_range(arena_idx, &out);
                return Err(PmmError::NotFound);
            }
            let page = self.arenas[arena_idx].page_mut(index);
            if !page.is_free() {
                self.rollback_range(arena_idx, &out);
                return Err(PmmError::NotFound);
            }
            page.state = PageState::Alloc;
            let id = PageId {
                arena: arena_idx as u32,
                index: index as u32,
            };
            self.remove_from_free_list(id);
            out.push(id);
        }
        self.on_free_count_changed();
        Ok(out)
    }

    fn rollback_range(&mut self, arena_idx: usize, popped: &[PageId]) {
        for &id in popped {
            debug_assert_eq!(id.arena as usize, arena_idx);
            self.free_one_locked(id);
        }
    }

    /// Remove a specific page from whichever free sublist currently holds
    /// it. `alloc_range` needs this because it targets a specific address
    /// rather than popping the head.
    fn remove_from_free_list(&mut self, id: PageId) {
        let removed = self.free.remove(id);
        debug_assert!(removed, "page targeted by alloc_range was not on a free list");
    }

    /// Walk arenas in priority order looking for a contiguous free run.
    pub fn alloc_contiguous(
        &mut self,
        count: usize,
        align_log2: u8,
        _flags: AllocFlags,
    ) -> PmmResult<(PAddr, Vec<PageId>)> {
        for &arena_idx in &self.arena_priority_order {
            if let Some(start) = self.arenas[arena_idx].find_free_contiguous(count, align_log2) {
                let mut out = Vec::with_capacity(count);
                let paddr = self.arenas[arena_idx].paddr_of(start);
                for i in start..start + count {
                    self.arenas[arena_idx].page_mut(i).state = PageState::Alloc;
                    out.push(PageId {
                        arena: arena_idx as u32,
                        index: i as u32,
                    });
                }
                self.on_free_count_changed();
                return Ok((paddr, out));
            }
        }
        Err(PmmError::NotFound)
    }

    fn free_one_locked(&mut self, id: PageId) {
        let page = self.arenas[id.arena as usize].page_mut(id.index as usize);
        debug_assert!(!page.is_pinned());
        page.state = PageState::Free;
        let is_loaned = page.is_loaned;
        self.free.push(id, is_loaned);
        self.on_free_count_changed();
    }

    pub fn free_page(&mut self, id: PageId) {
        self.free_one_locked(id);
    }

    pub fn free_pages(&mut self, ids: &[PageId]) {
        for &id in ids {
            self.free_one_locked(id);
        }
    }

    fn on_free_count_changed(&mut self) {
        let free = self.count_free_pages();
        self.watermark.observe(free);
    }

    // ---- Reclamation configuration ----------------------------------

    pub fn init_reclamation(&mut self, watermarks: &[u64], debounce: u64) -> PmmResult {
        let free = self.count_free_pages();
        self.watermark.init(watermarks, debounce, free)
    }

    pub fn mem_avail_level(&self) -> usize {
        self.watermark.level()
    }

    pub fn is_oom(&self) -> bool {
        self.watermark.is_oom()
    }

    // ---- Delayed requests ----------------------------------------------

    pub fn alloc_pages_async(&mut self, offset: u64, length: u64, ctx: u64) -> u64 {
        PmmCounters::inc(&self.counters.alloc_async);
        self.requests.enqueue(offset, length, ctx)
    }

    pub fn clear_request(&mut self, id: u64) -> bool {
        self.requests.clear(id)
    }

    pub fn swap_request(&mut self, id: u64, offset: u64, length: u64, ctx: u64) -> bool {
        self.requests.swap(id, offset, length, ctx)
    }

    pub fn requests_pending(&self) -> bool {
        self.requests.has_pending()
    }

    /// One iteration of the request thread: if the node is not in OOM and a
    /// request is pending, service it with `on_available` called with the
    /// node lock conceptually released (the caller must not hold the node
    /// lock across this call in a real lock-tracking build; this function
    /// signature cannot enforce that directly since the node owns its own
    /// state). `on_drop_ref` is invoked exactly once, with the request's
    /// `ctx`, iff the request was fully satisfied and is not about to be
    /// requeued; it is not called at all if `clear_request` raced this
    /// service and already took ownership of `ctx` itself.
    pub fn request_thread_step<F, D>(&mut self, on_available: F, on_drop_ref: D) -> bool
    where
        F: FnOnce(u64, u64, u64) -> u64,
        D: FnOnce(u64),
    {
        if self.watermark.is_oom() || !self.requests.has_pending() {
            return false;
        }
        let Some((id, offset, length, ctx)) = self.requests.begin_service() else {
            return false;
        };
        let actual = on_available(offset, length, ctx);
        let outcome = self.requests.finish_service(id, actual);
        if outcome.dropped_ref {
            on_drop_ref(ctx);
        }
        true
    }

    // ---- Page-queue classification ------------------------------------

    fn sync_queue_tag(&mut self, page: PageId) {
        let tag = self
            .page_queues
            .sublist_of(page)
            .map(QueueTag::from)
            .unwrap_or(QueueTag::None);
        self.arenas[page.arena as usize].page_mut(page.index as usize).queue_tag = tag;
    }

    /// Install a page into a reclamation sublist for the first time (e.g.
    /// when the VMO layer backs it with a page and marks it `Object`),
    /// keeping `Page::queue_tag` in sync with the sublist it now occupies.
    pub fn install_page_in_queues(&mut self, page: PageId, sublist: Sublist, owner: u64, offset: u64) {
        self.page_queues.set(page, sublist, owner, offset);
        self.sync_queue_tag(page);
    }

    pub fn move_page_in_queues(&mut self, page: PageId, sublist: Sublist) {
        self.page_queues.move_to(page, sublist);
        self.sync_queue_tag(page);
    }

    pub fn remove_page_from_queues(&mut self, page: PageId) {
        self.page_queues.remove(page);
        self.arenas[page.arena as usize].page_mut(page.index as usize).queue_tag = QueueTag::None;
    }

    pub fn sublist_of(&self, page: PageId) -> Option<Sublist> {
        self.page_queues.sublist_of(page)
    }

    pub fn mark_page_accessed(&mut self, page: PageId) {
        self.page_queues.mark_accessed(page);
        self.sync_queue_tag(page);
    }

    pub fn rotate_reclaim_queues(&mut self) {
        let moved = self.page_queues.rotate_reclaim_queues();
        for page in moved {
            self.sync_queue_tag(page);
        }
    }

    // ---- Eviction --------------------------------------------------------

    pub fn set_discardable_evictions_percent(&mut self, pct: u8) {
        self.evictor.set_discardable_evictions_percent(pct);
    }

    pub fn debug_set_min_discardable_age(&mut self, age: u64) {
        self.evictor.debug_set_min_discardable_age(age);
    }

    pub fn set_one_shot_eviction_target(&mut self, target: EvictionTarget) {
        self.evictor.set_one_shot_target(target);
    }

    pub fn combine_one_shot_eviction_target(&mut self, target: EvictionTarget) {
        self.evictor.combine_one_shot_target(target);
    }

    pub fn enable_continuous_eviction(&mut self, min_pages: u64, free_pages_target: u64, level: EvictionLevel) {
        self.evictor.enable_continuous(min_pages, free_pages_target, level);
    }

    pub fn disable_continuous_eviction(&mut self) {
        self.evictor.disable_continuous();
    }

    /// Run one evictor-thread tick against real node state: pages the
    /// evictor collects are transitioned back to FREE and handed to the
    /// free list in one batch, `Page::queue_tag` is cleared for each, and
    /// the named counters are updated.
    pub fn run_evictor_step(&mut self, cow: &mut dyn CowPages) -> EvictedCounts {
        let free = self.count_free_pages();
        let (counts, freed_pages) = self.evictor.evictor_thread_step(free, &mut self.page_queues, cow);
        for &id in &freed_pages {
            self.arenas[id.arena as usize].page_mut(id.index as usize).queue_tag = QueueTag::None;
        }
        if !freed_pages.is_empty() {
            self.free_pages(&freed_pages);
        }
        PmmCounters::add(&self.counters.pages_evicted_pager_backed, counts.pager_backed);
        PmmCounters::add(&self.counters.pages_evicted_discardable, counts.discardable);
        counts
    }

    pub fn set_borrowing_enabled(&mut self, enabled: bool) {
        self.borrowing_enabled = enabled;
    }

    /// Run one synchronous loan-sweep pass against real arena state,
    /// mirroring the sweep's counters into the node's named counters.
    pub fn run_loan_sweep(&mut self, cow: &mut dyn CowPages) -> PmmResult {
        let order = ArenaOrder {
            arenas: &self.arenas,
            borrowing_enabled: self.borrowing_enabled,
        };
        let before = self.loan_sweeper.counters();
        let result = self.loan_sweeper.force_synchronous_sweep(&order, &mut self.page_queues, cow);
        let after = self.loan_sweeper.counters();
        PmmCounters::add(&self.counters.sweep_count, after.sweep_count - before.sweep_count);
        PmmCounters::add(&self.counters.sweep_looped, after.sweep_looped - before.sweep_looped);
        PmmCounters::add(
            &self.counters.sweep_pages_examined,
            after.sweep_pages_examined - before.sweep_pages_examined,
        );
        PmmCounters::add(
            &self.counters.sweep_pages_swept_to_loaned,
            after.sweep_pages_swept_to_loaned - before.sweep_pages_swept_to_loaned,
        );
        PmmCounters::add(
            &self.counters.sweep_page_chase_retried,
            after.sweep_page_chase_retried - before.sweep_page_chase_retried,
        );
        PmmCounters::add(
            &self.counters.sweep_page_chase_gave_up,
            after.sweep_page_chase_gave_up - before.sweep_page_chase_gave_up,
        );
        result
    }
}

/// `PhysicalOrder` view over a node's arenas in their stable (append)
/// order. Address/priority ordering is a future refinement; this is
/// sufficient to let the loan sweeper walk real per-page state.
struct ArenaOrder<'a> {
    arenas: &'a [Arena],
    borrowing_enabled: bool,
}

impl<'a> PhysicalOrder for ArenaOrder<'a> {
    fn page_count(&self) -> usize {
        self.arenas.iter().map(|a| a.page_count()).sum()
    }

    fn page_id_at(&self, linear_index: usize) -> PageId {
        let mut idx = linear_index;
        for (i, a) in self.arenas.iter().enumerate() {
            let count = a.page_count();
            if idx < count {
                return PageId {
                    arena: i as u32,
                    index: idx as u32,
                };
            }
            idx -= count;
        }
        panic!("linear_index out of range for ArenaOrder");
    }

    fn state(&self, page: PageId) -> PageState {
        self.arenas[page.arena as usize].page(page.index as usize).state
    }

    fn is_loaned(&self, page: PageId) -> bool {
        self.arenas[page.arena as usize].page(page.index as usize).is_loaned
    }

    fn any_borrowing_enabled(&self) -> bool {
        self.borrowing_enabled
    }
}

impl Default for PmmNode {
    fn default() -> Self {
        PmmNode::new()
    }
}

static GLOBAL_NODE: Once<Mutex<PmmNode>> = Once::new();

/// The machine's single `PmmNode` instance. Lazily initialized on first
/// access; matches the spec's "single PMM instance with multiple arenas"
/// non-goal around NUMA-aware multi-instance allocation.
pub fn global() -> &'static Mutex<PmmNode> {
    GLOBAL_NODE.call_once(|| Mutex::new(PmmNode::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_arena(pages: usize) -> PmmNode {
        let mut node = PmmNode::new();
        node.add_arena("test", 0, (pages as u64) * PAGE_SIZE, 0).unwrap();
        node
    }

    #[test]
    fn alloc_page_decrements_free_count() {
        let mut node = node_with_arena(4);
        assert_eq!(node.count_free_pages(), 4);
        let _ = node.alloc_page(AllocFlags::ANY).unwrap();
        assert_eq!(node.count_free_pages(), 3);
    }

    #[test]
    fn alloc_without_can_wait_returns_no_memory_when_empty() {
        let mut node = node_with_arena(1);
        let _ = node.alloc_page(AllocFlags::ANY).unwrap();
        assert_eq!(node.alloc_page(AllocFlags::ANY).unwrap_err(), PmmError::NoMemory);
    }

    #[test]
    fn alloc_pages_rolls_back_on_partial_failure() {
        let mut node = node_with_arena(3);
        let err = node.alloc_pages(5, AllocFlags::ANY).unwrap_err();
        assert_eq!(err, PmmError::NoMemory);
        assert_eq!(node.count_free_pages(), 3);
    }

    #[test]
    fn arenas_are_walked_by_descending_priority() {
        let mut node = PmmNode::new();
        node.add_arena("low", 0, PAGE_SIZE, 0).unwrap();
        node.add_arena("high", PAGE_SIZE * 8, PAGE_SIZE, 10).unwrap();
        let names: Vec<&str> = node.arenas_by_priority().map(|a| a.name.as_str()).collect();
        assert_eq!(names, alloc::vec!["high", "low"]);
    }

    #[test]
    fn page_ids_stay_valid_after_a_higher_priority_arena_is_inserted() {
        // "low" is registered first and gets arena index 0; inserting "high"
        // afterward must not renumber it, or page ids already pushed onto
        // the free list for "low" would silently resolve to "high"'s pages.
        let mut node = PmmNode::new();
        node.add_arena("low", 0, PAGE_SIZE * 2, 0).unwrap();
        node.add_arena("high", PAGE_SIZE * 8, PAGE_SIZE * 2, 10).unwrap();
        let id = node.alloc_page(AllocFlags::ANY).unwrap();
        // Priority order puts "high" first, so the first allocation must
        // come from "high" (arena index 1), not "low" (arena index 0).
        assert_eq!(id.arena, 1);
        assert_eq!(node.arenas[1].name, "high");
        assert_eq!(node.arenas[0].name, "low");
    }

    #[test]
    fn overlapping_arenas_are_rejected() {
        let mut node = PmmNode::new();
        node.add_arena("a", 0, PAGE_SIZE * 4, 0).unwrap();
        assert_eq!(
            node.add_arena("b", PAGE_SIZE * 2, PAGE_SIZE * 4, 0).unwrap_err(),
            PmmError::InvalidArgs
        );
    }

    #[test]
    fn watermark_hysteresis_flows_through_alloc_and_free() {
        let mut node = node_with_arena(100);
        node.init_reclamation(&[10, 20], 2).unwrap();
        assert_eq!(node.mem_avail_level(), 2);
        let mut allocated = Vec::new();
        // 81 allocations leave free_count = 19, still above
        // lower_bound = watermarks[1] - debounce = 18.
        for _ in 0..81 {
            allocated.push(node.alloc_page(AllocFlags::ANY).unwrap());
        }
        assert_eq!(node.mem_avail_level(), 2);
        // The 82nd allocation drops free_count to 18, crossing into level 1.
        allocated.push(node.alloc_page(AllocFlags::ANY).unwrap());
        assert_eq!(node.mem_avail_level(), 1);
        // Allocating down to free_count = 8 crosses into OOM (level 0).
        for _ in 0..10 {
            allocated.push(node.alloc_page(AllocFlags::ANY).unwrap());
        }
        assert!(node.is_oom());
    }

    #[test]
    fn delayed_request_partial_fill_loops_until_satisfied() {
        let mut node = node_with_arena(10);
        node.alloc_pages_async(0, 10, 42);
        let mut supplied_calls = Vec::new();
        let mut dropped_refs = Vec::new();
        let done = node.request_thread_step(
            |offset, length, ctx| {
                supplied_calls.push((offset, length, ctx));
                4
            },
            |ctx| dropped_refs.push(ctx),
        );
        assert!(done);
        assert!(node.requests_pending());
        assert!(dropped_refs.is_empty());
        node.request_thread_step(
            |offset, length, ctx| {
                supplied_calls.push((offset, length, ctx));
                length
            },
            |ctx| dropped_refs.push(ctx),
        );
        assert!(!node.requests_pending());
        assert_eq!(supplied_calls, alloc::vec![(0, 10, 42), (4, 6, 42)]);
        // The second call fully satisfied the request: on_drop_ref fires
        // exactly once, with the original ctx.
        assert_eq!(dropped_refs, alloc::vec![42]);
    }

    #[test]
    fn clear_request_while_pending_returns_true() {
        let mut node = node_with_arena(4);
        let id = node.alloc_pages_async(0, 4, 1);
        assert!(node.clear_request(id));
        assert!(!node.requests_pending());
    }

    #[test]
    fn request_thread_step_does_not_drop_ref_on_partial_fill() {
        let mut node = node_with_arena(10);
        node.alloc_pages_async(0, 10, 7);
        let mut dropped_refs: Vec<u64> = Vec::new();
        node.request_thread_step(|_, _, _| 4, |ctx| dropped_refs.push(ctx));
        assert!(dropped_refs.is_empty());
    }

    struct FakeCow {
        evictable: Vec<(PageId, u64, u64)>,
    }

    impl CowPages for FakeCow {
        fn evict_page(&mut self, page: PageId, owner: u64, offset: u64) -> bool {
            if let Some(pos) = self
                .evictable
                .iter()
                .position(|(p, o, off)| *p == page && *o == owner && *off == offset)
            {
                self.evictable.remove(pos);
                true
            } else {
                false
            }
        }

        fn replace_page(&mut self, _page: PageId, _offset: u64, _with_loaned: bool) -> Result<(), PmmError> {
            Err(PmmError::NotFound)
        }

        fn reclaim_pages_from_discardable(&mut self, _target_pages: u64, _min_age: u64) -> u64 {
            0
        }
    }

    #[test]
    fn queue_tag_tracks_sublist_membership() {
        let mut node = node_with_arena(4);
        let id = node.alloc_page(AllocFlags::ANY).unwrap();
        node.install_page_in_queues(id, Sublist::Reclaim(3), 1, 0);
        assert_eq!(
            node.arenas[id.arena as usize].page(id.index as usize).queue_tag,
            QueueTag::Reclaim(3)
        );
        node.move_page_in_queues(id, Sublist::Wired);
        assert_eq!(
            node.arenas[id.arena as usize].page(id.index as usize).queue_tag,
            QueueTag::Wired
        );
        node.remove_page_from_queues(id);
        assert_eq!(
            node.arenas[id.arena as usize].page(id.index as usize).queue_tag,
            QueueTag::None
        );
    }

    #[test]
    fn evicted_pager_backed_pages_return_to_the_free_list() {
        let mut node = node_with_arena(4);
        let id = node.alloc_page(AllocFlags::ANY).unwrap();
        node.arenas[id.arena as usize].page_mut(id.index as usize).state = PageState::Object;
        node.install_page_in_queues(id, Sublist::Reclaim(3), 9, 0);
        let free_before = node.count_free_pages();

        let mut cow = FakeCow {
            evictable: alloc::vec![(id, 9, 0)],
        };
        let counts = node.run_evictor_step(&mut cow);
        assert_eq!(counts.pager_backed, 0); // no target set yet: evictor_thread_step no-ops
        assert_eq!(node.count_free_pages(), free_before);

        node.set_one_shot_eviction_target(EvictionTarget {
            pending: true,
            min_pages_to_free: 1,
            free_pages_target: 0,
            level: crate::kernel::pmm::evictor::EvictionLevel::OnlyOldest,
            print_counts: false,
        });
        let counts = node.run_evictor_step(&mut cow);
        assert_eq!(counts.pager_backed, 1);
        assert_eq!(node.count_free_pages(), free_before + 1);
        assert_eq!(
            node.arenas[id.arena as usize].page(id.index as usize).state,
            PageState::Free
        );
        assert_eq!(
            node.arenas[id.arena as usize].page(id.index as usize).queue_tag,
            QueueTag::None
        );
        assert_eq!(PmmCounters::get(&node.counters().pages_evicted_pager_backed), 1);
    }

    struct NotFoundCow;
    impl CowPages for NotFoundCow {
        fn evict_page(&mut self, _page: PageId, _owner: u64, _offset: u64) -> bool {
            false
        }
        fn replace_page(&mut self, _page: PageId, _offset: u64, _with_loaned: bool) -> Result<(), PmmError> {
            Err(PmmError::NotFound)
        }
        fn reclaim_pages_from_discardable(&mut self, _target_pages: u64, _min_age: u64) -> u64 {
            0
        }
    }

    #[test]
    fn loan_sweep_runs_against_real_arena_state_and_mirrors_counters() {
        let mut node = node_with_arena(3);
        let mut cow = NotFoundCow;
        node.run_loan_sweep(&mut cow).unwrap();
        assert_eq!(PmmCounters::get(&node.counters().sweep_count), 1);
        assert_eq!(PmmCounters::get(&node.counters().sweep_pages_examined), 3);
    }
}
