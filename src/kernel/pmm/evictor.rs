// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Evictor: turns (min-free, min-pages-to-free, level) targets into
//! concrete `CowPages` reclamation calls.

use alloc::vec::Vec;

use crate::kernel::pmm::cow_pages::CowPages;
use crate::kernel::pmm::free_list::PageId;
use crate::kernel::pmm::page_queues::PageQueues;

/// Which end of the reclaim ladder eviction may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionLevel {
    /// Skip `reclaim[0]` (the youngest bucket); only evict older pages.
    OnlyOldest,
    /// Evict from any bucket, including the newest.
    IncludeNewest,
}

/// A combinable eviction goal. See the combination rule in
/// `combine_one_shot_target`.
#[derive(Debug, Clone, Copy)]
pub struct EvictionTarget {
    pub pending: bool,
    pub min_pages_to_free: u64,
    pub free_pages_target: u64,
    pub level: EvictionLevel,
    pub print_counts: bool,
}

impl Default for EvictionTarget {
    fn default() -> Self {
        EvictionTarget {
            pending: false,
            min_pages_to_free: 0,
            free_pages_target: 0,
            level: EvictionLevel::OnlyOldest,
            print_counts: false,
        }
    }
}

/// Pages freed by one eviction pass, split by source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictedCounts {
    pub discardable: u64,
    pub pager_backed: u64,
}

impl EvictedCounts {
    pub fn total(&self) -> u64 {
        self.discardable + self.pager_backed
    }
}

/// Test-only override for the minimum age a discardable VMO must have
/// reached before it is eligible, bypassed in production where the real
/// discardable-owner registry enforces its own aging policy. `u64::MAX`
/// means "no override".
const NO_MIN_AGE_OVERRIDE: u64 = u64::MAX;

pub struct Evictor {
    one_shot: EvictionTarget,
    continuous: EvictionTarget,
    discardable_evictions_percent: u8,
    debug_min_discardable_age: u64,
}

impl Evictor {
    pub fn new() -> Self {
        Evictor {
            one_shot: EvictionTarget::default(),
            continuous: EvictionTarget::default(),
            discardable_evictions_percent: 100,
            debug_min_discardable_age: NO_MIN_AGE_OVERRIDE,
        }
    }

    pub fn set_discardable_evictions_percent(&mut self, pct: u8) {
        self.discardable_evictions_percent = pct.min(100);
    }

    pub fn debug_set_min_discardable_age(&mut self, age: u64) {
        self.debug_min_discardable_age = age;
    }

    fn min_discardable_age(&self) -> u64 {
        self.debug_min_discardable_age
    }

    pub fn one_shot_target(&self) -> EvictionTarget {
        self.one_shot
    }

    pub fn continuous_target(&self) -> EvictionTarget {
        self.continuous
    }

    pub fn set_one_shot_target(&mut self, target: EvictionTarget) {
        self.one_shot = target;
    }

    /// Combine `target` into the pending one-shot target: `pending` = OR,
    /// `level` = max (`IncludeNewest` wins), `min_pages_to_free` = SUM,
    /// `free_pages_target` = MAX, `print_counts` = OR.
    pub fn combine_one_shot_target(&mut self, target: EvictionTarget) {
        let cur = &mut self.one_shot;
        cur.pending = cur.pending || target.pending;
        cur.level = if cur.level == EvictionLevel::IncludeNewest || target.level == EvictionLevel::IncludeNewest
        {
            EvictionLevel::IncludeNewest
        } else {
            EvictionLevel::OnlyOldest
        };
        cur.min_pages_to_free += target.min_pages_to_free;
        cur.free_pages_target = cur.free_pages_target.max(target.free_pages_target);
        cur.print_counts = cur.print_counts || target.print_counts;
    }

    pub fn enable_continuous(&mut self, min_pages: u64, free_pages_target: u64, level: EvictionLevel) {
        self.continuous.min_pages_to_free += min_pages;
        self.continuous.free_pages_target = free_pages_target;
        self.continuous.level = level;
        self.continuous.pending = true;
    }

    pub fn disable_continuous(&mut self) {
        self.continuous = EvictionTarget::default();
    }

    /// Synchronous one-shot eviction: run `evict_until_targets_met` for
    /// `min_pages` with no free-pages floor.
    pub fn evict_one_shot_sync(
        &mut self,
        min_pages: u64,
        level: EvictionLevel,
        free_count: u64,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> (EvictedCounts, Vec<PageId>) {
        self.evict_until_targets_met(min_pages, 0, level, free_count, pq, cow)
    }

    /// Execute whatever one-shot target is currently set (no-op if none is
    /// pending), then clear it.
    pub fn evict_one_shot_from_preloaded_target(
        &mut self,
        free_count: u64,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> (EvictedCounts, Vec<PageId>) {
        if !self.one_shot.pending {
            return (EvictedCounts::default(), Vec::new());
        }
        let target = self.one_shot;
        self.one_shot = EvictionTarget::default();
        self.evict_until_targets_met(
            target.min_pages_to_free,
            target.free_pages_target,
            target.level,
            free_count,
            pq,
            cow,
        )
    }

    /// Serialized core loop: repeatedly splits the remaining shortfall
    /// between discardable and pager-backed reclamation until both targets
    /// are met or a pass frees nothing. Returns the pager-backed pages
    /// collected along the way; the caller frees them in one `free_list`
    /// call (discardable reclamation has no page-level handle to return:
    /// the discardable owner frees its own pages directly).
    pub fn evict_until_targets_met(
        &mut self,
        min_pages: u64,
        free_pages_target: u64,
        level: EvictionLevel,
        mut free_count: u64,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> (EvictedCounts, Vec<PageId>) {
        let mut total = EvictedCounts::default();
        let mut freed_pages = Vec::new();
        loop {
            if total.total() >= min_pages && free_count >= free_pages_target {
                break;
            }
            let want = (min_pages.saturating_sub(total.total())).max(free_pages_target.saturating_sub(free_count));
            if want == 0 {
                break;
            }
            let want_discardable = want * self.discardable_evictions_percent as u64 / 100;
            let freed_d = self.evict_discardable(want_discardable, cow);
            let (freed_p, mut pages_p) = self.evict_pager_backed(want.saturating_sub(freed_d), level, pq, cow);
            if freed_d + freed_p == 0 {
                break;
            }
            total.discardable += freed_d;
            total.pager_backed += freed_p;
            free_count += freed_d + freed_p;
            freed_pages.append(&mut pages_p);
        }
        (total, freed_pages)
    }

    fn evict_discardable(&self, want: u64, cow: &mut dyn CowPages) -> u64 {
        if want == 0 {
            return 0;
        }
        cow.reclaim_pages_from_discardable(want, self.min_discardable_age())
    }

    fn evict_pager_backed(
        &self,
        want: u64,
        level: EvictionLevel,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> (u64, Vec<PageId>) {
        let lowest_k = match level {
            EvictionLevel::IncludeNewest => 1,
            EvictionLevel::OnlyOldest => crate::kernel::pmm::page_queues::NUM_RECLAIM - 1,
        };
        let mut freed: Vec<PageId> = Vec::new();
        for _ in 0..want {
            let Some(bl) = pq.peek_reclaim(lowest_k) else {
                break;
            };
            if cow.evict_page(bl.page, bl.owner, bl.offset) {
                pq.remove(bl.page);
                freed.push(bl.page);
            } else {
                break;
            }
        }
        let n = freed.len() as u64;
        (n, freed)
    }

    /// One tick of the evictor thread: run any preloaded one-shot target;
    /// if it froze nothing, fall back to the continuous target and
    /// decrement its remaining `min_pages_to_free` by what was freed.
    pub fn evictor_thread_step(
        &mut self,
        free_count: u64,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> (EvictedCounts, Vec<PageId>) {
        let (one_shot, pages) = self.evict_one_shot_from_preloaded_target(free_count, pq, cow);
        if one_shot.total() > 0 {
            return (one_shot, pages);
        }
        if !self.continuous.pending {
            return (EvictedCounts::default(), Vec::new());
        }
        let target = self.continuous;
        let (freed, pages) = self.evict_until_targets_met(
            target.min_pages_to_free,
            target.free_pages_target,
            target.level,
            free_count,
            pq,
            cow,
        );
        self.continuous.min_pages_to_free = self.continuous.min_pages_to_free.saturating_sub(freed.total());
        if self.continuous.min_pages_to_free == 0 && self.continuous.free_pages_target == 0 {
            self.continuous.pending = false;
        }
        (freed, pages)
    }
}

impl Default for Evictor {
    fn default() -> Self {
        Evictor::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCow {
        discardable_available: u64,
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

        fn replace_page(&mut self, _page: PageId, _offset: u64, _with_loaned: bool) -> Result<(), crate::kernel::pmm::error::PmmError> {
            Err(crate::kernel::pmm::error::PmmError::NotFound)
        }

        fn reclaim_pages_from_discardable(&mut self, target_pages: u64, _min_age: u64) -> u64 {
            let got = target_pages.min(self.discardable_available);
            self.discardable_available -= got;
            got
        }
    }

    fn pid(i: u32) -> PageId {
        PageId { arena: 0, index: i }
    }

    #[test]
    fn combine_rule_sums_min_pages_and_maxes_free_target() {
        let mut e = Evictor::new();
        e.combine_one_shot_target(EvictionTarget {
            pending: true,
            min_pages_to_free: 5,
            free_pages_target: 100,
            level: EvictionLevel::OnlyOldest,
            print_counts: false,
        });
        e.combine_one_shot_target(EvictionTarget {
            pending: false,
            min_pages_to_free: 3,
            free_pages_target: 50,
            level: EvictionLevel::IncludeNewest,
            print_counts: true,
        });
        let t = e.one_shot_target();
        assert!(t.pending);
        assert_eq!(t.min_pages_to_free, 8);
        assert_eq!(t.free_pages_target, 100);
        assert_eq!(t.level, EvictionLevel::IncludeNewest);
        assert!(t.print_counts);
    }

    #[test]
    fn evicts_discardable_before_pager_backed_by_percent() {
        let mut e = Evictor::new();
        e.set_discardable_evictions_percent(100);
        let mut pq = PageQueues::new();
        pq.set(pid(1), crate::kernel::pmm::page_queues::Sublist::Reclaim(3), 7, 0);
        let mut cow = FakeCow {
            discardable_available: 10,
            evictable: alloc::vec![(pid(1), 7, 0)],
        };
        let (freed, pages) = e.evict_one_shot_sync(4, EvictionLevel::OnlyOldest, 0, &mut pq, &mut cow);
        assert_eq!(freed.discardable, 4);
        assert_eq!(freed.pager_backed, 0);
        assert!(pages.is_empty());
    }

    #[test]
    fn falls_back_to_pager_backed_when_discardable_exhausted() {
        let mut e = Evictor::new();
        e.set_discardable_evictions_percent(100);
        let mut pq = PageQueues::new();
        pq.set(pid(1), crate::kernel::pmm::page_queues::Sublist::Reclaim(3), 7, 0);
        let mut cow = FakeCow {
            discardable_available: 0,
            evictable: alloc::vec![(pid(1), 7, 0)],
        };
        let (freed, pages) = e.evict_one_shot_sync(1, EvictionLevel::OnlyOldest, 0, &mut pq, &mut cow);
        assert_eq!(freed.pager_backed, 1);
        assert_eq!(pages, alloc::vec![pid(1)]);
    }

    #[test]
    fn enable_continuous_accumulates_and_disable_zeroes() {
        let mut e = Evictor::new();
        e.enable_continuous(10, 100, EvictionLevel::OnlyOldest);
        e.enable_continuous(5, 200, EvictionLevel::IncludeNewest);
        let t = e.continuous_target();
        assert_eq!(t.min_pages_to_free, 15);
        assert_eq!(t.free_pages_target, 200);
        assert!(t.pending);
        e.disable_continuous();
        let t = e.continuous_target();
        assert_eq!(t.min_pages_to_free, 0);
        assert!(!t.pending);
    }

    #[test]
    fn gives_up_when_a_pass_frees_nothing() {
        let mut e = Evictor::new();
        let mut pq = PageQueues::new();
        let mut cow = FakeCow {
            discardable_available: 0,
            evictable: Vec::new(),
        };
        let (freed, pages) = e.evict_one_shot_sync(10, EvictionLevel::OnlyOldest, 0, &mut pq, &mut cow);
        assert_eq!(freed.total(), 0);
        assert!(pages.is_empty());
    }
}
