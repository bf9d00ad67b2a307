// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! StackOwnershipInterval: a short-lived RAII token used while a page is in
//! transit from a `PageQueues` sublist to the free list.
//!
//! A page being freed is briefly "stack-owned" by the thread performing the
//! removal so that a concurrent thread wanting the same page (the loan
//! sweeper chasing a replace, or another reclaimer) can park on a wait
//! queue instead of spinning, and be woken the instant ownership releases.

use crate::kernel::pmm::page::Page;
use crate::kernel::sync::wait_queue::WaitQueue;
use crate::kernel::thread::{Thread, ThreadId};

/// Blocks callers contending for a page's stack ownership.
pub struct StackOwnerWaiters {
    waiters: WaitQueue,
}

impl StackOwnerWaiters {
    pub const fn new() -> Self {
        StackOwnerWaiters {
            waiters: WaitQueue::new(),
        }
    }

    /// Park the current thread until the page's stack owner releases it.
    /// Returns once woken; the caller should re-attempt `try_claim`.
    pub fn wait(&self, deadline: u64) {
        let _ = self.waiters.block(deadline);
    }

    fn wake_all(&self) {
        self.waiters.wake_all();
    }
}

impl Default for StackOwnerWaiters {
    fn default() -> Self {
        StackOwnerWaiters::new()
    }
}

/// RAII guard: claims stack ownership of a page for the current thread on
/// construction, releases and wakes any waiters on drop.
///
/// Priority inheritance: the owning thread's priority is not modeled
/// directly (the scheduler is out of scope — see `kernel::thread`), but the
/// wait queue this guard wakes through is the same one a higher-priority
/// waiter would park on, so once the scheduler exists this is the seam
/// priority inheritance hooks into.
pub struct StackOwnershipInterval<'a> {
    page: &'a Page,
    thread: ThreadId,
    waiters: &'a StackOwnerWaiters,
}

impl<'a> StackOwnershipInterval<'a> {
    /// Attempt to claim stack ownership of `page`. Returns `None` if
    /// another thread currently owns it.
    pub fn try_claim(page: &'a Page, waiters: &'a StackOwnerWaiters) -> Option<Self> {
        let thread = Thread::current();
        if page.try_claim_stack_owner(thread) {
            Some(StackOwnershipInterval { page, thread, waiters })
        } else {
            None
        }
    }

    /// Claim stack ownership, blocking (re-polling after each wake) until
    /// it becomes available.
    pub fn claim_blocking(page: &'a Page, waiters: &'a StackOwnerWaiters, deadline: u64) -> Self {
        loop {
            if let Some(interval) = Self::try_claim(page, waiters) {
                return interval;
            }
            waiters.wait(deadline);
        }
    }
}

impl<'a> Drop for StackOwnershipInterval<'a> {
    fn drop(&mut self) {
        self.page.release_stack_owner(self.thread);
        self.waiters.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::pmm::page::Page;

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let page = Page::new(0x1000);
        let waiters = StackOwnerWaiters::new();
        let interval = StackOwnershipInterval::try_claim(&page, &waiters).unwrap();
        assert!(StackOwnershipInterval::try_claim(&page, &waiters).is_none());
        drop(interval);
        assert!(StackOwnershipInterval::try_claim(&page, &waiters).is_some());
    }

    #[test]
    fn drop_releases_the_stack_owner_token() {
        let page = Page::new(0x2000);
        let waiters = StackOwnerWaiters::new();
        {
            let _interval = StackOwnershipInterval::try_claim(&page, &waiters).unwrap();
            assert_ne!(page.stack_owner(), 0);
        }
        assert_eq!(page.stack_owner(), 0);
    }
}
