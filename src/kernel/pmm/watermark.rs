// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Hysteretic memory-availability watermark state machine.
//!
//! Level 0 means "below the smallest watermark" (the OOM state). Levels
//! `1..=N` mean "at or above `watermarks[level - 1]`". Transitions are
//! debounced so that oscillation around a single watermark boundary cannot
//! flap the callback: moving down into level `i` requires
//! `free_count <= watermarks[i] - debounce`, moving up into level `i + 1`
//! requires `free_count >= watermarks[i] + debounce`.

use alloc::vec::Vec;

use crate::kernel::pmm::error::{PmmError, PmmResult};

pub const MAX_WATERMARK_COUNT: usize = 8;

/// Installed watermark ladder plus current hysteresis state.
pub struct WatermarkMachine {
    watermarks: Vec<u64>,
    debounce: u64,
    current_level: usize,
    upper_bound: u64,
    lower_bound: u64,
}

impl WatermarkMachine {
    /// An instance with no watermarks installed; `current_level` is always
    /// treated as the top level (no OOM tracking) until `init` is called.
    pub fn uninitialized() -> Self {
        WatermarkMachine {
            watermarks: Vec::new(),
            debounce: 0,
            current_level: 0,
            upper_bound: u64::MAX,
            lower_bound: 0,
        }
    }

    /// Validate and install a strictly increasing watermark ladder. Mirrors
    /// `PmmNode::InitReclamation`'s checks: non-empty, bounded count, and
    /// `watermarks[0] >= debounce`.
    pub fn init(&mut self, watermarks: &[u64], debounce: u64, free_count: u64) -> PmmResult {
        if watermarks.is_empty() || watermarks.len() > MAX_WATERMARK_COUNT {
            return Err(PmmError::InvalidArgs);
        }
        for w in watermarks.windows(2) {
            if w[1] <= w[0] {
                return Err(PmmError::InvalidArgs);
            }
        }
        if watermarks[0] < debounce {
            return Err(PmmError::InvalidArgs);
        }
        self.watermarks = watermarks.to_vec();
        self.debounce = debounce;
        self.recompute(free_count);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        !self.watermarks.is_empty()
    }

    pub fn level(&self) -> usize {
        self.current_level
    }

    pub fn is_oom(&self) -> bool {
        self.is_initialized() && self.current_level == 0
    }

    pub fn level_count(&self) -> usize {
        self.watermarks.len()
    }

    /// Re-derive `current_level` from scratch for `free_count` (used at
    /// init time, where there is no previous level to hysterese from).
    fn recompute(&mut self, free_count: u64) {
        let mut level = self.watermarks.len();
        for (i, w) in self.watermarks.iter().enumerate() {
            if free_count < *w {
                level = i;
                break;
            }
        }
        self.set_level(level);
    }

    fn set_level(&mut self, level: usize) {
        self.current_level = level;
        self.lower_bound = if level == 0 {
            0
        } else {
            self.watermarks[level - 1].saturating_sub(self.debounce)
        };
        self.upper_bound = if level == self.watermarks.len() {
            u64::MAX
        } else {
            self.watermarks[level].saturating_add(self.debounce)
        };
    }

    /// Feed a new free-page count through the hysteresis edges. Returns
    /// `Some(new_level)` if the level changed, `None` otherwise.
    pub fn observe(&mut self, free_count: u64) -> Option<usize> {
        if !self.is_initialized() {
            return None;
        }
        if free_count >= self.upper_bound {
            let mut level = self.current_level;
            while level < self.watermarks.len() && free_count >= self.watermarks[level] + self.debounce
            {
                level += 1;
            }
            if level != self.current_level {
                self.set_level(level);
                return Some(level);
            }
        } else if free_count <= self.lower_bound {
            let mut level = self.current_level;
            while level > 0
                && free_count <= self.watermarks[level - 1].saturating_sub(self.debounce)
            {
                level -= 1;
            }
            if level != self.current_level {
                self.set_level(level);
                return Some(level);
            }
        }
        None
    }
}

impl Default for WatermarkMachine {
    fn default() -> Self {
        WatermarkMachine::uninitialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_increasing_watermarks() {
        let mut wm = WatermarkMachine::uninitialized();
        assert_eq!(wm.init(&[10, 10, 20], 2, 100).unwrap_err(), PmmError::InvalidArgs);
    }

    #[test]
    fn rejects_debounce_exceeding_first_watermark() {
        let mut wm = WatermarkMachine::uninitialized();
        assert_eq!(wm.init(&[5, 10], 10, 100).unwrap_err(), PmmError::InvalidArgs);
    }

    #[test]
    fn init_computes_starting_level() {
        let mut wm = WatermarkMachine::uninitialized();
        wm.init(&[10, 20, 30], 2, 25).unwrap();
        assert_eq!(wm.level(), 2);
        assert!(!wm.is_oom());
    }

    #[test]
    fn hysteresis_prevents_flapping_at_the_boundary() {
        let mut wm = WatermarkMachine::uninitialized();
        wm.init(&[10, 20], 2, 15).unwrap();
        assert_eq!(wm.level(), 1);
        // Dropping to 9 (just under watermark[0]=10) should not drop the
        // level on its own unless it crosses watermarks[0] - debounce = 8.
        assert_eq!(wm.observe(9), None);
        assert_eq!(wm.observe(8), Some(0));
        assert!(wm.is_oom());
        // Climbing back to just above 10 should not restore level 1 until
        // watermarks[0] + debounce = 12 is reached.
        assert_eq!(wm.observe(11), None);
        assert_eq!(wm.observe(12), Some(1));
    }
}
