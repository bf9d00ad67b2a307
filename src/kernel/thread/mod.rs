// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Minimal thread identity stub.
//!
//! The real scheduler lives outside this crate's scope. This module keeps
//! just enough surface for `kernel::sync` to name "the current thread" and
//! for the PMM's stack-ownership interval (kernel::pmm::stack_owner) to
//! expose itself as a lock owner once priority inheritance is wired up.

use core::sync::atomic::{AtomicU64, Ordering};

/// Opaque thread identity. The real kernel assigns these at thread creation;
/// this stub hands out a fresh id per call to `current()` on the assumption
/// that there is exactly one logical thread of control until the scheduler
/// exists.
pub type ThreadId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A minimal handle standing in for a real `Thread` object.
pub struct Thread {
    id: ThreadId,
}

impl Thread {
    /// Id of the thread currently executing.
    ///
    /// TODO: replace with a real per-CPU current-thread pointer once the
    /// scheduler lands; for now every caller observes the same id.
    pub fn current() -> ThreadId {
        1
    }

    /// Allocate a fresh, never-reused thread id (used by tests that need
    /// distinct identities).
    pub fn new_id() -> ThreadId {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}
