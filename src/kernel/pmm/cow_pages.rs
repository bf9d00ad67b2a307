// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! `CowPages`: the external contract the VMO layer implements so the PMM
//! can reclaim or replace pages it has backlinked.
//!
//! The virtual-memory object layer is out of scope for this crate (see the
//! crate-level docs); this trait is the seam it plugs into.

use crate::kernel::pmm::error::PmmError;
use crate::kernel::pmm::free_list::PageId;

/// Capability implemented by whatever container owns a page with
/// `state == Object`. Looked up indirectly through the backlink's `owner`
/// handle rather than a raw pointer.
pub trait CowPages {
    /// Called by the evictor with a page peeked off a reclaim sublist.
    /// Implementations remove the page from their own bookkeeping, call
    /// `PageQueues::remove`, and return `true` iff the page was actually
    /// reclaimed (the caller is then responsible for freeing it).
    fn evict_page(&mut self, page: PageId, owner: u64, offset: u64) -> bool;

    /// Called by the loan sweeper to substitute `page` at `offset` with a
    /// loaned page (`with_loaned == true`) or a regular page. Returns
    /// `NotFound` if the owner no longer has `page` installed at that
    /// offset (the sweeper's chase-loop retries in that case), `NoMemory`
    /// if no replacement page could be obtained.
    fn replace_page(&mut self, page: PageId, offset: u64, with_loaned: bool) -> Result<(), PmmError>;

    /// Ask this owner (assumed to represent all registered discardable
    /// VMOs) to give back up to `target_pages` pages that have been
    /// untouched for at least `min_age` ticks. Returns the number actually
    /// reclaimed.
    fn reclaim_pages_from_discardable(&mut self, target_pages: u64, min_age: u64) -> u64;
}
