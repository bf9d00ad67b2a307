// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! PMM error taxonomy.

use core::fmt;

use crate::rustux::errors::Error as RxError;
use crate::rustux::types::{status, Status};

/// Errors returned by the physical memory manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmmError {
    /// No page could be allocated and the caller did not opt into waiting.
    NoMemory,
    /// Caller opted into waiting; retry when the memory-availability level
    /// rises above 0.
    ShouldWait,
    /// `alloc_range` could not find the requested paddr free, or
    /// `replace_page` no longer owns the page.
    NotFound,
    /// Operation attempted on a pinned page, or on a discarded discardable.
    BadState,
    /// Offset/length past the backing region.
    OutOfRange,
    /// Malformed watermarks, zero-size allocs, misaligned specifics.
    InvalidArgs,
    /// Arena too small to host its own page array.
    BufferTooSmall,
}

pub type PmmResult<T = ()> = Result<T, PmmError>;

impl PmmError {
    pub fn as_str(self) -> &'static str {
        match self {
            PmmError::NoMemory => "NO_MEMORY",
            PmmError::ShouldWait => "SHOULD_WAIT",
            PmmError::NotFound => "NOT_FOUND",
            PmmError::BadState => "BAD_STATE",
            PmmError::OutOfRange => "OUT_OF_RANGE",
            PmmError::InvalidArgs => "INVALID_ARGS",
            PmmError::BufferTooSmall => "BUFFER_TOO_SMALL",
        }
    }
}

impl fmt::Display for PmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PmmError> for RxError {
    fn from(e: PmmError) -> Self {
        match e {
            PmmError::NoMemory => RxError::NoMemory,
            PmmError::ShouldWait => RxError::TimedOut,
            PmmError::NotFound => RxError::NotFound,
            PmmError::BadState => RxError::BadState,
            PmmError::OutOfRange => RxError::Err,
            PmmError::InvalidArgs => RxError::InvalidArgs,
            PmmError::BufferTooSmall => RxError::Err,
        }
    }
}

impl From<PmmError> for Status {
    fn from(e: PmmError) -> Self {
        match e {
            PmmError::NoMemory => status::ERR_NO_MEMORY,
            PmmError::ShouldWait => -18, // RX_ERR_SHOULD_WAIT
            PmmError::NotFound => status::ERR_NOT_FOUND,
            PmmError::BadState => status::ERR_BAD_STATE,
            PmmError::OutOfRange => status::ERR_OUT_OF_RANGE,
            PmmError::InvalidArgs => status::ERR_INVALID_ARGS,
            PmmError::BufferTooSmall => status::ERR_NOT_ENOUGH_BUFFER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_taxonomy_names() {
        assert_eq!(PmmError::NoMemory.as_str(), "NO_MEMORY");
        assert_eq!(PmmError::BufferTooSmall.as_str(), "BUFFER_TOO_SMALL");
    }

    #[test]
    fn converts_to_rustux_error() {
        let e: RxError = PmmError::NotFound.into();
        assert_eq!(e, RxError::NotFound);
    }
}
