// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Named PMM counters.
//!
//! `kernel::lib::counters::counter_add`/`counter_set` only record a
//! descriptor today (no per-CPU storage is implemented yet), so this
//! module keeps its own `AtomicU64` values as the source of truth and
//! registers the same names through `register_counter` to keep the debug
//! console's counter-dump surface accurate once per-CPU storage lands.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::kernel::lib::counters::{register_counter, CounterDesc, CounterType};

macro_rules! pmm_counters {
    ($($field:ident => $name:literal),+ $(,)?) => {
        #[derive(Default)]
        pub struct PmmCounters {
            $(pub $field: AtomicU64),+
        }

        /// A point-in-time read of every named counter, for tests and the
        /// `pmm dump` debug command.
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct CountersSnapshot {
            $(pub $field: u64),+
        }

        impl PmmCounters {
            /// Register every counter name with the console-facing registry.
            /// Safe to call once at init; `register_counter` is `unsafe`
            /// only because it must run before any counter is read.
            pub fn register(&self) {
                $(
                    unsafe {
                        register_counter(CounterDesc {
                            name: $name,
                            counter_type: CounterType::Sum,
                            varname: stringify!($field),
                        });
                    }
                )+
            }

            /// Read every counter at once.
            pub fn snapshot(&self) -> CountersSnapshot {
                CountersSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed)),+
                }
            }
        }
    };
}

pmm_counters! {
    alloc_async => "vm.pmm.alloc.async",
    pages_evicted_pager_backed => "vm.reclamation.pages_evicted_pager_backed",
    pages_evicted_discardable => "vm.reclamation.pages_evicted_discardable",
    sweep_count => "vm.reclamation.sweep_count",
    sweep_looped => "vm.reclamation.sweep_looped",
    sweep_pages_examined => "vm.reclamation.sweep_pages_examined",
    sweep_pages_swept_to_loaned => "vm.reclamation.sweep_pages_swept_to_loaned",
    sweep_page_chase_retried => "vm.reclamation.sweep_page_chase_retried",
    sweep_page_chase_gave_up => "vm.reclamation.sweep_page_chase_gave_up",
}

impl PmmCounters {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        if n != 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let c = PmmCounters::default();
        assert_eq!(PmmCounters::get(&c.sweep_count), 0);
    }

    #[test]
    fn inc_and_add_accumulate() {
        let c = PmmCounters::default();
        PmmCounters::inc(&c.sweep_count);
        PmmCounters::add(&c.sweep_pages_examined, 5);
        assert_eq!(PmmCounters::get(&c.sweep_count), 1);
        assert_eq!(PmmCounters::get(&c.sweep_pages_examined), 5);
    }

    #[test]
    fn snapshot_reflects_current_values() {
        let c = PmmCounters::default();
        PmmCounters::inc(&c.alloc_async);
        PmmCounters::add(&c.pages_evicted_pager_backed, 3);
        let snap = c.snapshot();
        assert_eq!(snap.alloc_async, 1);
        assert_eq!(snap.pages_evicted_pager_backed, 3);
        assert_eq!(snap.sweep_count, 0);
    }
}
