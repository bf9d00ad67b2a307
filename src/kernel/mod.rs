// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux Microkernel - Core Kernel Module
//!
//! This module contains the physical memory manager and the small set of
//! ambient kernel facilities (synchronization primitives, logging, debug
//! console, counters) that it is built against.

// Re-export commonly used types
pub use crate::rustux::types::*;

// Common type aliases for kernel convenience
pub use crate::kernel::sync::spin::SpinMutex as Mutex;
pub use alloc::vec::Vec;
pub use alloc::string::String;
pub use core::sync::atomic::AtomicUsize;
pub use core::sync::atomic::AtomicU64;
pub use core::sync::atomic::AtomicBool;

pub mod align;
pub mod atomic;
pub mod debug;
pub mod lib;
pub mod pmm;
pub mod sync;
pub mod thread;

/// Kernel initialization
///
/// This is the main initialization function called from kmain().
pub fn init() {
    pmm::init();
}
