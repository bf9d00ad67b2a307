// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Physical memory manager and page reclamation subsystem.
//!
//! Owns every physical page in the machine: arena-backed allocation,
//! low-memory watermarks, delayed allocation requests, the page-queue
//! reclamation classifier, the evictor, and the loan sweeper.

pub mod arena;
pub mod counters;
pub mod cow_pages;
pub mod debug;
pub mod error;
pub mod evictor;
pub mod flags;
pub mod free_list;
pub mod loan_sweeper;
pub mod node;
pub mod page;
pub mod page_queues;
pub mod request;
pub mod stack_owner;
pub mod watermark;

pub use counters::CountersSnapshot;
pub use cow_pages::CowPages;
pub use error::{PmmError, PmmResult};
pub use evictor::{EvictedCounts, EvictionLevel, EvictionTarget};
pub use flags::AllocFlags;
pub use free_list::PageId;
pub use loan_sweeper::{PhysicalOrder, SweepCounters};
pub use page_queues::{QueueBacklink, Sublist, NUM_RECLAIM};

/// Register the console command and counter names. Call once during
/// kernel startup, before the request/evictor/loan-sweeper threads start
/// calling their `*_step` methods.
pub fn init() {
    node::global().lock().counters().register();
    debug::register();
}
