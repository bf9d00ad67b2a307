// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Allocation flags accepted by `PmmNode::alloc_*`.

use bitflags::bitflags;

bitflags! {
    /// Flags controlling page allocation behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        /// No constraint (the default).
        const ANY = 0;
        /// Return `SHOULD_WAIT` when in the OOM state instead of `NO_MEMORY`.
        const CAN_WAIT = 1 << 0;
        /// May draw from `free_loaned` when the regular free list is empty.
        const CAN_BORROW = 1 << 1;
        /// Fail unless the page came from `free_loaned`.
        const MUST_BORROW = 1 << 2;
    }
}

impl Default for AllocFlags {
    fn default() -> Self {
        AllocFlags::ANY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_empty() {
        assert!(AllocFlags::ANY.is_empty());
        assert_eq!(AllocFlags::default(), AllocFlags::ANY);
    }

    #[test]
    fn flags_compose() {
        let f = AllocFlags::CAN_WAIT | AllocFlags::CAN_BORROW;
        assert!(f.contains(AllocFlags::CAN_WAIT));
        assert!(f.contains(AllocFlags::CAN_BORROW));
        assert!(!f.contains(AllocFlags::MUST_BORROW));
    }
}
