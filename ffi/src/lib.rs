//! C-ABI wrapper around `fetch-core`.
//!
//! # Overview
//! Lets any language with a C FFI start a fetch task, observe its lifecycle,
//! cancel it, and receive the single outcome through plain function pointers.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - The caller creates one `FfiFetchRuntime` and starts tasks on it. Tasks
//!   run on the runtime's threads, so callbacks arrive there too.
//! - Results are lent to the `on_response_fetched` callback and freed when it
//!   returns. Copy anything that must outlive the call.
//! - The caller owns the runtime and handle pointers and must release them
//!   with the matching `*_free` function.
//! - The C header is generated by `build.rs` into cargo's `OUT_DIR` as
//!   `fetch_ffi.h`.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use fetch_core::{FetchConfig, FetchTask, RequestDescriptor};

use types::*;

// ---------------------------------------------------------------------------
// Runtime lifecycle
// ---------------------------------------------------------------------------

/// Create a runtime to run fetch tasks on.
///
/// Returns null if the runtime cannot be built or an internal panic occurs.
/// The caller must free the returned pointer with `fetch_runtime_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_runtime_new() -> *mut FfiFetchRuntime {
    catch_unwind(|| {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .thread_name("fetch-ffi")
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "failed to build fetch runtime");
                return std::ptr::null_mut();
            }
        };
        Box::into_raw(Box::new(FfiFetchRuntime { runtime }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a runtime created by `fetch_runtime_new`. Safe to call with null.
///
/// Unfinished tasks end as `Cancelled`: their progress indicator is
/// dismissed and no result callback fires. Blocks until requests already on
/// the wire have returned. Must not be called from inside a callback.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_runtime_free(runtime: *mut FfiFetchRuntime) {
    if !runtime.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(runtime) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Start fetching `url` on `runtime`.
///
/// `url` may be null; the task then fails and calls `on_request_failed`.
/// `shape` is 0 for a JSON array and 1 for a JSON object; any other value
/// fails the task without a request. Settings come from the `FETCH_*`
/// environment variables.
///
/// Returns null if `runtime` is null or an internal panic occurs, in which
/// case no callback fires. The caller must free the returned handle with
/// `fetch_handle_free`.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_task_start(
    runtime: *const FfiFetchRuntime,
    url: *const c_char,
    shape: u32,
    callbacks: FfiCallbacks,
) -> *mut FfiFetchHandle {
    catch_unwind(AssertUnwindSafe(|| {
        if runtime.is_null() {
            return std::ptr::null_mut();
        }
        let runtime = unsafe { &*runtime };
        let shape = FfiResultShape::from_raw(shape);
        let descriptor = if url.is_null() {
            RequestDescriptor::without_url(shape)
        } else {
            let url = unsafe { CStr::from_ptr(url) }.to_string_lossy().into_owned();
            RequestDescriptor::new(url, shape)
        };

        let callbacks = Callbacks(callbacks);
        let mut task = FetchTask::new(move || callbacks.is_online(), descriptor, Arc::new(callbacks))
            .with_config(FetchConfig::from_env());
        if callbacks.has_progress() {
            task = task.with_progress_indicator(CallbackIndicator(callbacks));
        }

        let handle = task.spawn_on(runtime.runtime.handle());
        Box::into_raw(Box::new(FfiFetchHandle {
            runtime: runtime.runtime.handle().clone(),
            cancel: handle.cancellation_token(),
            state: handle.task_state(),
            join: Mutex::new(Some(handle)),
        }))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Ask the task to stop. A task that is not yet terminal ends as
/// `Cancelled` and calls neither result callback. No-op on null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_handle_cancel(handle: *const FfiFetchHandle) {
    if handle.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &*handle };
        handle.cancel.cancel();
    }));
}

/// Current lifecycle state. Returns `NullArg` if `handle` is null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_handle_state(handle: *const FfiFetchHandle) -> FfiLifecycle {
    if handle.is_null() {
        return FfiLifecycle::NullArg;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &*handle };
        FfiLifecycle::from(handle.state.get())
    }))
    .unwrap_or(FfiLifecycle::NullArg)
}

/// Block until the task is terminal and return its final state. The
/// terminal callback, if any, has already returned by then.
///
/// Must not be called from inside a callback. Returns `NullArg` if `handle`
/// is null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_handle_wait(handle: *const FfiFetchHandle) -> FfiLifecycle {
    if handle.is_null() {
        return FfiLifecycle::NullArg;
    }
    catch_unwind(AssertUnwindSafe(|| {
        let handle = unsafe { &*handle };
        let join = handle.join.lock().ok().and_then(|mut guard| guard.take());
        match join {
            Some(join) => FfiLifecycle::from(handle.runtime.block_on(join.join())),
            // Someone already waited; the task is terminal.
            None => FfiLifecycle::from(handle.state.get()),
        }
    }))
    .unwrap_or(FfiLifecycle::NullArg)
}

/// Free a handle. Does not cancel the task, which keeps running and still
/// calls back. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn fetch_handle_free(handle: *mut FfiFetchHandle) {
    if !handle.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(handle) });
        }));
    }
}
