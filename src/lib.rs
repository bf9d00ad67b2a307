// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Rustux physical memory manager.
//!
//! This crate owns every physical page in the machine: arena-backed
//! allocation, low-memory watermarks, delayed allocation requests, the
//! page-queue reclamation classifier, the evictor, and the loan sweeper.
//! See `kernel::pmm` for the subsystem entry points.

#![no_std]

extern crate alloc;

pub mod debug;
pub mod kernel;
pub mod rustux;
