//! C entry points of the process-wide scanner.
//!
//! ```c
//! int32_t  Initialize(uint32_t start, uint32_t end, uint32_t step);
//! uint32_t GetBufferSize(void);
//! int32_t  GetBins(float *out, uint32_t capacity);
//! int32_t  GetTotalMagnitude(void);
//! int32_t  SetUseDB(int32_t use_db);
//! int32_t  GetLastError(void);
//! int32_t  Shutdown(void);
//! int32_t  IsSimulated(void);
//! ```
//!
//! Builds without the `rtlsdr` feature scan a simulated receiver; callers can
//! check for that with `IsSimulated`.
//!
//! Negative return values are error codes: -1 invalid configuration, -2
//! device unavailable, -3 teardown timeout, -4 not ready, -5 output buffer too
//! small, -6 anything else.
#![allow(non_snake_case)]

use log::debug;
use rtlscan_engine::{Error, global};

fn status(result: rtlscan_engine::Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Start scanning `[start, end)` in bins of `step` Hz, replacing any running scan.
#[unsafe(no_mangle)]
pub extern "C" fn Initialize(start: u32, end: u32, step: u32) -> i32 {
    debug!("Initialize({}, {}, {})", start, end, step);
    status(global::initialize(start, end, step))
}

/// Number of bins `GetBins` writes. Zero before a successful `Initialize`.
#[unsafe(no_mangle)]
pub extern "C" fn GetBufferSize() -> u32 {
    u32::try_from(global::buffer_size()).unwrap_or(u32::MAX)
}

/// Copy the current bins into `out`.
///
/// # Safety
///
/// `out` must be null or point to `capacity` writable, aligned `f32`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn GetBins(out: *mut f32, capacity: u32) -> i32 {
    if out.is_null() {
        return global::record_failure(Error::BufferTooSmall {
            needed: global::buffer_size(),
            provided: 0,
        });
    }
    // SAFETY: non-null, and the caller guarantees `capacity` valid elements
    let out = unsafe { std::slice::from_raw_parts_mut(out, capacity as usize) };
    match global::bins(out) {
        Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
        Err(e) => e.code(),
    }
}

/// Sum of the current bins, or 0 when no sweep is available (see `GetLastError`).
#[unsafe(no_mangle)]
pub extern "C" fn GetTotalMagnitude() -> i32 {
    global::total_magnitude().unwrap_or(0)
}

/// Non-zero selects decibel output. Returns the previous setting as 0 or 1.
#[unsafe(no_mangle)]
pub extern "C" fn SetUseDB(use_db: i32) -> i32 {
    i32::from(global::set_use_db(use_db != 0))
}

/// Code of the most recent failure, 0 if none.
#[unsafe(no_mangle)]
pub extern "C" fn GetLastError() -> i32 {
    global::last_error().map_or(0, |(code, _)| code)
}

/// 1 when `Initialize` drives the simulated receiver instead of an RTL-SDR dongle.
#[unsafe(no_mangle)]
pub extern "C" fn IsSimulated() -> i32 {
    i32::from(global::is_simulated())
}

/// Stop acquisition and release the receiver.
#[unsafe(no_mangle)]
pub extern "C" fn Shutdown() -> i32 {
    status(global::shutdown())
}
