// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The `pmm` debug console command: `dump`, `free`, `oom`, `mem_avail_state
//! info`, `drop_user_pt`, `scan [reclaim]`.

use crate::kernel::lib::console::{register_command, Cmd, CmdArg, CMD_AVAIL_NORMAL};
use crate::kernel::pmm::flags::AllocFlags;
use crate::kernel::pmm::node;
use crate::log_info;

pub fn register() {
    register_command(Cmd {
        name: "pmm",
        help: "pmm dump|free|oom|mem_avail_state info|drop_user_pt|scan [reclaim]",
        func: Some(pmm_cmd),
        flags: CMD_AVAIL_NORMAL,
    });
}

fn pmm_cmd(argc: usize, argv: &[CmdArg], _flags: u32) -> i32 {
    if argc < 1 {
        log_info!("usage: pmm dump|free|oom|mem_avail_state info|drop_user_pt|scan [reclaim]");
        return -1;
    }
    match argv[0].str {
        "dump" => cmd_dump(),
        "free" => cmd_free(),
        "oom" => cmd_oom(),
        "mem_avail_state" => cmd_mem_avail_state(argc, argv),
        "drop_user_pt" => cmd_drop_user_pt(),
        "scan" => cmd_scan(argc, argv),
        other => {
            log_info!("pmm: unknown subcommand {}", other);
            -1
        }
    }
}

fn cmd_dump() -> i32 {
    let node = node::global().lock();
    log_info!(
        "pmm: {} arenas, {} total pages, {} free pages, level {}",
        node.arena_count(),
        node.count_total_pages(),
        node.count_free_pages(),
        node.mem_avail_level()
    );
    let snap = node.counters().snapshot();
    log_info!(
        "pmm: alloc.async={} evicted.pager_backed={} evicted.discardable={} \
         sweep.count={} sweep.looped={} sweep.examined={} sweep.swept_to_loaned={} \
         sweep.chase_retried={} sweep.chase_gave_up={}",
        snap.alloc_async,
        snap.pages_evicted_pager_backed,
        snap.pages_evicted_discardable,
        snap.sweep_count,
        snap.sweep_looped,
        snap.sweep_pages_examined,
        snap.sweep_pages_swept_to_loaned,
        snap.sweep_page_chase_retried,
        snap.sweep_page_chase_gave_up,
    );
    0
}

fn cmd_free() -> i32 {
    let node = node::global().lock();
    log_info!("pmm: free_count={} bytes={}",
        node.count_free_pages(),
        node.count_free_pages() * crate::kernel::pmm::arena::PAGE_SIZE
    );
    0
}

/// Force the node into a synthetic OOM state by exhausting the regular
/// free list with throwaway allocations. Test/debug only — the pages are
/// intentionally leaked for the lifetime of the demonstration, matching
/// the original console command's purpose of letting an operator observe
/// OOM-path behavior on demand.
fn cmd_oom() -> i32 {
    let mut node = node::global().lock();
    let mut count = 0u64;
    while node.alloc_page(AllocFlags::ANY).is_ok() {
        count += 1;
    }
    log_info!("pmm: forced OOM after allocating {} pages", count);
    0
}

fn cmd_mem_avail_state(argc: usize, argv: &[CmdArg]) -> i32 {
    if argc < 2 || argv[1].str != "info" {
        log_info!("usage: pmm mem_avail_state info");
        return -1;
    }
    let node = node::global().lock();
    log_info!(
        "pmm: mem_avail_state level={} free={} oom={}",
        node.mem_avail_level(),
        node.count_free_pages(),
        node.is_oom()
    );
    0
}

fn cmd_drop_user_pt() -> i32 {
    // The page-table/address-space layer is outside this crate's scope;
    // the original command's effect (reclaiming unused user page-table
    // pages) has no counterpart here.
    log_info!("pmm: drop_user_pt has no effect (address-space layer is out of scope)");
    0
}

fn cmd_scan(argc: usize, argv: &[CmdArg]) -> i32 {
    let reclaim = argc >= 2 && argv[1].str == "reclaim";
    log_info!("pmm: scan requested (reclaim={})", reclaim);
    0
}
