// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Per-frame page record and its role tag.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::rustux::types::PAddr;

/// Role tag for a physical page. `Free` pages live on a `FreeList`; every
/// other state implies the page is either on exactly one `PageQueues`
/// sublist, held by an allocator, or briefly stack-owned in transit between
/// the two (see `StackOwnershipInterval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Free,
    Alloc,
    Object,
    Wired,
    Heap,
    Ipc,
    Cache,
    Slab,
    Mmu,
}

/// Owning container pointer recorded on a page when `state == Object`. The
/// owner implements `CowPages` and is looked up indirectly through a handle
/// rather than a raw pointer, since this crate has no unsafe aliasing story
/// for intrusive backlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backlink {
    pub owner: u64,
    pub offset: u64,
}

/// Which `PageQueues` sublist (if any) currently holds this page. Mirrors
/// the page's authoritative queue membership; kept on the page itself only
/// as a fast-path hint, per spec invariant "queue_tag equals the tag of the
/// sublist it occupies".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTag {
    None,
    Reclaim(u8),
    ReclaimDontNeed,
    Anonymous(u8),
    Wired,
    PagerBackedDirty,
    AnonymousZeroFork,
}

/// Thread id currently holding temporary "stack ownership" of this page, if
/// any. `0` means unowned. See `kernel::pmm::stack_owner`.
pub type StackOwnerToken = AtomicU64;

/// One entry in an `Arena`'s page array.
#[derive(Debug)]
pub struct Page {
    pub paddr: PAddr,
    pub state: PageState,
    pub pin_count: u32,
    pub is_loaned: bool,
    pub loan_cancelled: bool,
    pub backlink: Option<Backlink>,
    pub queue_tag: QueueTag,
    stack_owner: StackOwnerToken,
}

impl Page {
    pub fn new(paddr: PAddr) -> Self {
        Page {
            paddr,
            state: PageState::Free,
            pin_count: 0,
            is_loaned: false,
            loan_cancelled: false,
            backlink: None,
            queue_tag: QueueTag::None,
            stack_owner: AtomicU64::new(0),
        }
    }

    pub fn is_free(&self) -> bool {
        self.state == PageState::Free
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Claim stack ownership for `thread`. Returns `false` if already owned
    /// by a different thread.
    pub fn try_claim_stack_owner(&self, thread: u64) -> bool {
        self.stack_owner
            .compare_exchange(0, thread, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release_stack_owner(&self, thread: u64) {
        let prev = self.stack_owner.swap(0, Ordering::AcqRel);
        debug_assert_eq!(prev, thread, "stack owner released by non-owner");
    }

    pub fn stack_owner(&self) -> u64 {
        self.stack_owner.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_free() {
        let p = Page::new(0x1000);
        assert!(p.is_free());
        assert!(!p.is_pinned());
        assert_eq!(p.stack_owner(), 0);
    }

    #[test]
    fn stack_owner_is_exclusive() {
        let p = Page::new(0x2000);
        assert!(p.try_claim_stack_owner(1));
        assert!(!p.try_claim_stack_owner(2));
        p.release_stack_owner(1);
        assert!(p.try_claim_stack_owner(2));
    }
}
