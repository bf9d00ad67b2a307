// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! LoanSweeper: walks physical memory in address order looking for
//! non-loaned pages that can be replaced with loaned ones, to satisfy
//! contiguous-VMO backing requests.

use crate::kernel::pmm::cow_pages::CowPages;
use crate::kernel::pmm::error::PmmError;
use crate::kernel::pmm::free_list::PageId;
use crate::kernel::pmm::page::PageState;
use crate::kernel::pmm::page_queues::PageQueues;

/// A sweep gives up on chasing a single page after this many
/// `NotFound`-retry attempts and moves on.
const MAX_PAGE_CHASE_ITERATIONS: u32 = 3;

/// Monotone counters incremented as sweeps run. Exposed so
/// `kernel::pmm::counters` can register and mirror them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepCounters {
    pub sweep_count: u64,
    pub sweep_looped: u64,
    pub sweep_pages_examined: u64,
    pub sweep_pages_swept_to_loaned: u64,
    pub sweep_page_chase_retried: u64,
    pub sweep_page_chase_gave_up: u64,
}

/// Minimal view of a linear physical-page sequence the sweeper walks, cast
/// in terms of `(arena_index, page_index)` pairs rather than raw `PAddr`
/// arithmetic so the sweeper stays decoupled from `Arena`'s internal page
/// array layout.
pub trait PhysicalOrder {
    /// Total number of physical pages across every arena, in sweep order.
    fn page_count(&self) -> usize;
    fn page_id_at(&self, linear_index: usize) -> PageId;
    fn state(&self, page: PageId) -> PageState;
    fn is_loaned(&self, page: PageId) -> bool;
    fn any_borrowing_enabled(&self) -> bool;
}

pub struct LoanSweeper {
    next_start: usize,
    counters: SweepCounters,
}

impl LoanSweeper {
    pub fn new() -> Self {
        LoanSweeper {
            next_start: 0,
            counters: SweepCounters::default(),
        }
    }

    pub fn counters(&self) -> SweepCounters {
        self.counters
    }

    /// Run one full synchronous sweep pass, wrapping once from
    /// `next_start` back to itself, resuming next time from wherever this
    /// pass left off.
    pub fn force_synchronous_sweep(
        &mut self,
        order: &dyn PhysicalOrder,
        pq: &mut PageQueues,
        cow: &mut dyn CowPages,
    ) -> PmmError2OrOk {
        let total = order.page_count();
        if total == 0 {
            return Ok(());
        }
        self.counters.sweep_count += 1;
        let ppb_enabled = order.any_borrowing_enabled();
        let start = self.next_start % total;
        let mut iter = start;
        let mut first = true;

        while iter != start || first {
            first = false;
            let page = order.page_id_at(iter);
            self.counters.sweep_pages_examined += 1;

            if order.state(page) == PageState::Object && ppb_enabled != order.is_loaned(page) {
                let mut replaced = false;
                let mut gave_up = true;
                for attempt in 0..MAX_PAGE_CHASE_ITERATIONS {
                    let Some(bl) = pq.backlink_of(page) else {
                        break;
                    };
                    match cow.replace_page(page, bl.offset, ppb_enabled) {
                        Ok(()) => {
                            replaced = true;
                            gave_up = false;
                            break;
                        }
                        Err(PmmError::NotFound) => {
                            if attempt + 1 < MAX_PAGE_CHASE_ITERATIONS {
                                self.counters.sweep_page_chase_retried += 1;
                            }
                            continue;
                        }
                        Err(PmmError::NoMemory) => {
                            self.next_start = iter;
                            return Err(PmmError::NoMemory);
                        }
                        Err(_) => {
                            gave_up = false;
                            break;
                        }
                    }
                }
                if gave_up {
                    self.counters.sweep_page_chase_gave_up += 1;
                }
                if replaced && ppb_enabled {
                    self.counters.sweep_pages_swept_to_loaned += 1;
                }
            }

            iter = (iter + 1) % total;
        }

        if iter == start {
            self.counters.sweep_looped += 1;
        }
        self.next_start = iter;
        Ok(())
    }
}

/// Alias kept narrow: the sweeper only ever surfaces `NoMemory` as a hard
/// stop; every other non-OK outcome from `replace_page` is absorbed into
/// the per-page chase loop.
pub type PmmError2OrOk = Result<(), PmmError>;

impl Default for LoanSweeper {
    fn default() -> Self {
        LoanSweeper::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    struct FakeOrder {
        states: Vec<PageState>,
        loaned: Vec<bool>,
        ppb_enabled: bool,
    }

    impl PhysicalOrder for FakeOrder {
        fn page_count(&self) -> usize {
            self.states.len()
        }
        fn page_id_at(&self, linear_index: usize) -> PageId {
            PageId {
                arena: 0,
                index: linear_index as u32,
            }
        }
        fn state(&self, page: PageId) -> PageState {
            self.states[page.index as usize]
        }
        fn is_loaned(&self, page: PageId) -> bool {
            self.loaned[page.index as usize]
        }
        fn any_borrowing_enabled(&self) -> bool {
            self.ppb_enabled
        }
    }

    struct FakeCow;
    impl CowPages for FakeCow {
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
    fn empty_arena_set_is_a_noop() {
        let order = FakeOrder {
            states: Vec::new(),
            loaned: Vec::new(),
            ppb_enabled: true,
        };
        let mut sweeper = LoanSweeper::new();
        let mut pq = PageQueues::new();
        let mut cow = FakeCow;
        assert!(sweeper.force_synchronous_sweep(&order, &mut pq, &mut cow).is_ok());
        assert_eq!(sweeper.counters().sweep_count, 0);
    }

    #[test]
    fn sweep_examines_every_page_and_counts_the_pass() {
        let order = FakeOrder {
            states: alloc::vec![PageState::Free, PageState::Free, PageState::Free],
            loaned: alloc::vec![false, false, false],
            ppb_enabled: false,
        };
        let mut sweeper = LoanSweeper::new();
        let mut pq = PageQueues::new();
        let mut cow = FakeCow;
        sweeper.force_synchronous_sweep(&order, &mut pq, &mut cow).unwrap();
        assert_eq!(sweeper.counters().sweep_count, 1);
        assert_eq!(sweeper.counters().sweep_pages_examined, 3);
        assert_eq!(sweeper.counters().sweep_looped, 1);
    }

    #[test]
    fn resumes_from_where_the_previous_pass_stopped() {
        let order = FakeOrder {
            states: alloc::vec![PageState::Free; 5],
            loaned: alloc::vec![false; 5],
            ppb_enabled: false,
        };
        let mut sweeper = LoanSweeper::new();
        sweeper.next_start = 2;
        let mut pq = PageQueues::new();
        let mut cow = FakeCow;
        sweeper.force_synchronous_sweep(&order, &mut pq, &mut cow).unwrap();
        assert_eq!(sweeper.next_start, 2);
    }
}
