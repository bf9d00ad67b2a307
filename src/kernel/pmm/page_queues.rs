// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Page-queue reclamation classifier.
//!
//! Pages that are not FREE live on exactly one named sublist here. Aging
//! buckets (`reclaim[0..K)`) rotate toward the tail; the oldest bucket and
//! `reclaim_dont_need` are where the evictor looks first.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::kernel::pmm::free_list::PageId;
use crate::kernel::pmm::page::QueueTag;

/// Number of aging buckets for each of the reclaim/anonymous ladders.
pub const NUM_RECLAIM: usize = 4;

/// A page's backlink as handed back to the evictor/loan-sweeper: which
/// `CowPages` owner it belongs to, and at what offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueBacklink {
    pub page: PageId,
    pub owner: u64,
    pub offset: u64,
}

/// Which named sublist a page sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sublist {
    Reclaim(usize),
    ReclaimDontNeed,
    Anonymous(usize),
    Wired,
    PagerBackedDirty,
    AnonymousZeroFork,
}

impl From<Sublist> for QueueTag {
    fn from(s: Sublist) -> Self {
        match s {
            Sublist::Reclaim(k) => QueueTag::Reclaim(k as u8),
            Sublist::ReclaimDontNeed => QueueTag::ReclaimDontNeed,
            Sublist::Anonymous(k) => QueueTag::Anonymous(k as u8),
            Sublist::Wired => QueueTag::Wired,
            Sublist::PagerBackedDirty => QueueTag::PagerBackedDirty,
            Sublist::AnonymousZeroFork => QueueTag::AnonymousZeroFork,
        }
    }
}

struct Entry {
    owner: u64,
    offset: u64,
}

/// Classifier state: one FIFO per named sublist, keyed by `PageId`.
pub struct PageQueues {
    reclaim: Vec<VecDeque<PageId>>,
    dont_need: VecDeque<PageId>,
    anonymous: Vec<VecDeque<PageId>>,
    wired: VecDeque<PageId>,
    pager_backed_dirty: VecDeque<PageId>,
    anonymous_zero_fork: VecDeque<PageId>,
    backlinks: alloc::collections::BTreeMap<PageId, Entry>,
    membership: alloc::collections::BTreeMap<PageId, Sublist>,
}

impl PageQueues {
    pub fn new() -> Self {
        PageQueues {
            reclaim: (0..NUM_RECLAIM).map(|_| VecDeque::new()).collect(),
            dont_need: VecDeque::new(),
            anonymous: (0..NUM_RECLAIM).map(|_| VecDeque::new()).collect(),
            wired: VecDeque::new(),
            pager_backed_dirty: VecDeque::new(),
            anonymous_zero_fork: VecDeque::new(),
            backlinks: alloc::collections::BTreeMap::new(),
            membership: alloc::collections::BTreeMap::new(),
        }
    }

    fn list_mut(&mut self, s: Sublist) -> &mut VecDeque<PageId> {
        match s {
            Sublist::Reclaim(k) => &mut self.reclaim[k],
            Sublist::ReclaimDontNeed => &mut self.dont_need,
            Sublist::Anonymous(k) => &mut self.anonymous[k],
            Sublist::Wired => &mut self.wired,
            Sublist::PagerBackedDirty => &mut self.pager_backed_dirty,
            Sublist::AnonymousZeroFork => &mut self.anonymous_zero_fork,
        }
    }

    fn unlink(&mut self, page: PageId) {
        if let Some(s) = self.membership.remove(&page) {
            let list = self.list_mut(s);
            if let Some(pos) = list.iter().position(|p| *p == page) {
                list.remove(pos);
            }
        }
        self.backlinks.remove(&page);
    }

    fn link(&mut self, page: PageId, sublist: Sublist, owner: u64, offset: u64) {
        self.list_mut(sublist).push_front(page);
        self.membership.insert(page, sublist);
        self.backlinks.insert(page, Entry { owner, offset });
    }

    /// Install a page into `sublist` for the first time (it must not
    /// already be on any sublist).
    pub fn set(&mut self, page: PageId, sublist: Sublist, owner: u64, offset: u64) {
        debug_assert!(!self.membership.contains_key(&page));
        self.link(page, sublist, owner, offset);
    }

    /// Move a page already on some sublist to a different one, preserving
    /// its backlink unless a new one is given.
    pub fn move_to(&mut self, page: PageId, sublist: Sublist) {
        let entry = self.backlinks.remove(&page);
        self.unlink(page);
        let (owner, offset) = entry.map(|e| (e.owner, e.offset)).unwrap_or((0, 0));
        self.link(page, sublist, owner, offset);
    }

    /// Unlink a page from whichever sublist it occupies. The caller decides
    /// what happens next (usually freeing the page).
    pub fn remove(&mut self, page: PageId) {
        self.unlink(page);
    }

    pub fn sublist_of(&self, page: PageId) -> Option<Sublist> {
        self.membership.get(&page).copied()
    }

    /// Look up the backlink recorded for a specific page, regardless of
    /// which sublist it sits on. Used by the loan sweeper, which already
    /// knows the page it wants to replace and only needs its offset/owner.
    pub fn backlink_of(&self, page: PageId) -> Option<QueueBacklink> {
        self.backlinks.get(&page).map(|e| QueueBacklink {
            page,
            owner: e.owner,
            offset: e.offset,
        })
    }

    /// Move a page observed with its accessed bit set back to the youngest
    /// reclaim bucket. No-op for wired/dirty pages.
    pub fn mark_accessed(&mut self, page: PageId) {
        match self.sublist_of(page) {
            Some(Sublist::Reclaim(_)) | Some(Sublist::ReclaimDontNeed) => {
                self.move_to(page, Sublist::Reclaim(0));
            }
            _ => {}
        }
    }

    /// Advance every bucket toward the tail: `reclaim[k]` pages are spliced
    /// onto the head of `reclaim[k+1]`, oldest-last. `dont_need` is never
    /// rotated. Returns every page that moved, so the caller can resync its
    /// `queue_tag`.
    pub fn rotate_reclaim_queues(&mut self) -> Vec<PageId> {
        let mut moved_all = Vec::new();
        for k in (0..NUM_RECLAIM - 1).rev() {
            // `drain` yields front-to-back, i.e. newest-to-oldest. Pushing
            // in reverse onto the front of reclaim[k+1] preserves that
            // relative order as a block ahead of whatever was already there.
            let moved: Vec<PageId> = self.reclaim[k].drain(..).collect();
            for page in moved.into_iter().rev() {
                self.reclaim[k + 1].push_front(page);
                self.membership.insert(page, Sublist::Reclaim(k + 1));
                moved_all.push(page);
            }
        }
        moved_all
    }

    /// Return the oldest eviction candidate at or below `lowest_k`,
    /// preferring `dont_need` first. The page remains on its sublist.
    pub fn peek_reclaim(&self, lowest_k: usize) -> Option<QueueBacklink> {
        if let Some(&page) = self.dont_need.back() {
            if let Some(e) = self.backlinks.get(&page) {
                return Some(QueueBacklink {
                    page,
                    owner: e.owner,
                    offset: e.offset,
                });
            }
        }
        for k in (lowest_k..NUM_RECLAIM).rev() {
            if let Some(&page) = self.reclaim[k].back() {
                if let Some(e) = self.backlinks.get(&page) {
                    return Some(QueueBacklink {
                        page,
                        owner: e.owner,
                        offset: e.offset,
                    });
                }
            }
        }
        None
    }

    pub fn active_inactive_counts(&self) -> (usize, usize) {
        let active = self.reclaim[0].len()
            + self.reclaim.get(1).map_or(0, |q| q.len())
            + self.wired.len();
        let total: usize = self.reclaim.iter().map(|q| q.len()).sum::<usize>()
            + self.dont_need.len()
            + self.anonymous.iter().map(|q| q.len()).sum::<usize>()
            + self.wired.len()
            + self.pager_backed_dirty.len()
            + self.anonymous_zero_fork.len();
        (active, total - active)
    }

    pub fn len(&self, sublist: Sublist) -> usize {
        match sublist {
            Sublist::Reclaim(k) => self.reclaim[k].len(),
            Sublist::ReclaimDontNeed => self.dont_need.len(),
            Sublist::Anonymous(k) => self.anonymous[k].len(),
            Sublist::Wired => self.wired.len(),
            Sublist::PagerBackedDirty => self.pager_backed_dirty.len(),
            Sublist::AnonymousZeroFork => self.anonymous_zero_fork.len(),
        }
    }
}

impl Default for PageQueues {
    fn default() -> Self {
        PageQueues::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: u32) -> PageId {
        PageId { arena: 0, index: i }
    }

    #[test]
    fn set_then_peek_returns_backlink() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Reclaim(0), 42, 0);
        let bl = pq.peek_reclaim(0).unwrap();
        assert_eq!(bl.owner, 42);
        assert_eq!(bl.page, pid(1));
    }

    #[test]
    fn dont_need_is_preferred_over_reclaim_buckets() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Reclaim(3), 1, 0);
        pq.set(pid(2), Sublist::ReclaimDontNeed, 2, 0);
        let bl = pq.peek_reclaim(0).unwrap();
        assert_eq!(bl.page, pid(2));
    }

    #[test]
    fn rotation_moves_pages_one_bucket_older() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Reclaim(0), 1, 0);
        let moved = pq.rotate_reclaim_queues();
        assert_eq!(moved, alloc::vec![pid(1)]);
        assert_eq!(pq.sublist_of(pid(1)), Some(Sublist::Reclaim(1)));
        assert_eq!(pq.len(Sublist::Reclaim(0)), 0);
    }

    #[test]
    fn rotation_into_nonempty_bucket_keeps_incoming_pages_newer() {
        let mut pq = PageQueues::new();
        // reclaim[1] already holds a page from a previous rotation.
        pq.set(pid(9), Sublist::Reclaim(1), 1, 0);
        // reclaim[0] holds two pages, pid(2) younger than pid(1).
        pq.set(pid(1), Sublist::Reclaim(0), 1, 0);
        pq.set(pid(2), Sublist::Reclaim(0), 1, 0);
        pq.rotate_reclaim_queues();
        // The rotated-in pages must now be evicted before the page that was
        // already resident in reclaim[1]: peek_reclaim returns the back
        // (oldest) entry, which must still be pid(9).
        let bl = pq.peek_reclaim(1).unwrap();
        assert_eq!(bl.page, pid(9));
    }

    #[test]
    fn mark_accessed_resets_to_youngest_bucket() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Reclaim(3), 1, 0);
        pq.mark_accessed(pid(1));
        assert_eq!(pq.sublist_of(pid(1)), Some(Sublist::Reclaim(0)));
    }

    #[test]
    fn mark_accessed_does_not_move_wired_pages() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Wired, 1, 0);
        pq.mark_accessed(pid(1));
        assert_eq!(pq.sublist_of(pid(1)), Some(Sublist::Wired));
    }

    #[test]
    fn remove_clears_membership() {
        let mut pq = PageQueues::new();
        pq.set(pid(1), Sublist::Reclaim(0), 1, 0);
        pq.remove(pid(1));
        assert_eq!(pq.sublist_of(pid(1)), None);
        assert_eq!(pq.peek_reclaim(0), None);
    }
}
