//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! The C caller supplies one `FfiCallbacks` table per task. Internally that
//! table is wrapped in `Callbacks`, which plays every collaborator role the
//! core needs: listener, connectivity check and progress indicator. Results
//! are lent to C for the duration of one callback and freed by Rust
//! afterwards, so no `*_free_result` function is needed.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use fetch_core::{
    CancellationToken, FetchHandle, FetchResult, Lifecycle, ProgressIndicator, ResultListener, ResultShape,
    TaskState,
};

/// Opaque runtime that executes fetch tasks. One per process is enough.
pub struct FfiFetchRuntime {
    pub(crate) runtime: tokio::runtime::Runtime,
}

/// Opaque handle to one started fetch task.
pub struct FfiFetchHandle {
    pub(crate) runtime: tokio::runtime::Handle,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: TaskState,
    pub(crate) join: Mutex<Option<FetchHandle>>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Expected result shape. Passed into `fetch_task_start` as a plain `u32`
/// so values outside this enum stay representable.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResultShape {
    Array = 0,
    Object = 1,
    Unknown = 2,
}

impl FfiResultShape {
    /// Any raw value other than 0 or 1 is unsupported.
    pub(crate) fn from_raw(raw: u32) -> ResultShape {
        match raw {
            0 => ResultShape::Array,
            1 => ResultShape::Object,
            _ => ResultShape::Unknown,
        }
    }
}

impl From<ResultShape> for FfiResultShape {
    fn from(shape: ResultShape) -> Self {
        match shape {
            ResultShape::Array => FfiResultShape::Array,
            ResultShape::Object => FfiResultShape::Object,
            ResultShape::Unknown => FfiResultShape::Unknown,
        }
    }
}

/// Task lifecycle as seen from C. `NullArg` is returned for a null handle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiLifecycle {
    Created = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
    Cancelled = 4,
    NullArg = 5,
}

impl From<Lifecycle> for FfiLifecycle {
    fn from(state: Lifecycle) -> Self {
        match state {
            Lifecycle::Created => FfiLifecycle::Created,
            Lifecycle::Running => FfiLifecycle::Running,
            Lifecycle::Succeeded => FfiLifecycle::Succeeded,
            Lifecycle::Failed => FfiLifecycle::Failed,
            Lifecycle::Cancelled => FfiLifecycle::Cancelled,
        }
    }
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

pub type FfiIsOnlineFn = extern "C" fn(user_data: *mut c_void) -> bool;
pub type FfiNotifyFn = extern "C" fn(user_data: *mut c_void);
pub type FfiResponseFn = extern "C" fn(user_data: *mut c_void, result: *const FfiFetchResult);

/// Caller-supplied callback table. Every pointer may be null:
/// - `is_online` null means "always online";
/// - `show_progress`/`dismiss_progress` null means no indicator;
/// - a null terminal callback silently drops that outcome.
///
/// Callbacks run on runtime threads; `user_data` must be safe to use from
/// any thread and stay valid until the task is terminal.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiCallbacks {
    pub user_data: *mut c_void,
    pub is_online: Option<FfiIsOnlineFn>,
    pub on_response_fetched: Option<FfiResponseFn>,
    pub on_request_failed: Option<FfiNotifyFn>,
    pub show_progress: Option<FfiNotifyFn>,
    pub dismiss_progress: Option<FfiNotifyFn>,
}

/// A successful outcome, borrowed for the duration of `on_response_fetched`.
///
/// `parameters` holds `parameters_len` C strings; an entry is null when the
/// query key was absent from the URL.
#[repr(C)]
pub struct FfiFetchResult {
    pub shape: FfiResultShape,
    pub payload_json: *const c_char,
    pub parameters: *const *const c_char,
    pub parameters_len: u32,
}

#[derive(Clone, Copy)]
pub(crate) struct Callbacks(pub(crate) FfiCallbacks);

// SAFETY: the C caller promises `user_data` and the callbacks are usable from
// any thread (see `FfiCallbacks`).
unsafe impl Send for Callbacks {}
unsafe impl Sync for Callbacks {}

impl Callbacks {
    pub(crate) fn is_online(&self) -> bool {
        match self.0.is_online {
            Some(f) => f(self.0.user_data),
            None => true,
        }
    }

    pub(crate) fn has_progress(&self) -> bool {
        self.0.show_progress.is_some() || self.0.dismiss_progress.is_some()
    }
}

impl ResultListener for Callbacks {
    fn on_response_fetched(&self, result: FetchResult) {
        let Some(callback) = self.0.on_response_fetched else {
            return;
        };

        // serde_json escapes control characters, so the payload has no NULs.
        let payload = result
            .payload
            .to_json_string()
            .ok()
            .and_then(|json| CString::new(json).ok())
            .unwrap_or_default();
        let params: Vec<Option<CString>> = result
            .parameters
            .into_iter()
            .map(|p| p.and_then(|p| CString::new(p).ok()))
            .collect();
        let param_ptrs: Vec<*const c_char> = params
            .iter()
            .map(|p| p.as_ref().map_or(std::ptr::null(), |p| p.as_ptr()))
            .collect();

        let ffi_result = FfiFetchResult {
            shape: result.payload.shape().into(),
            payload_json: payload.as_ptr(),
            parameters: if param_ptrs.is_empty() {
                std::ptr::null()
            } else {
                param_ptrs.as_ptr()
            },
            parameters_len: param_ptrs.len() as u32,
        };
        callback(self.0.user_data, &ffi_result);
    }

    fn on_request_failed(&self) {
        if let Some(callback) = self.0.on_request_failed {
            callback(self.0.user_data);
        }
    }
}

/// Progress indicator backed by the C show/dismiss callbacks.
pub(crate) struct CallbackIndicator(pub(crate) Callbacks);

impl ProgressIndicator for CallbackIndicator {
    fn show(&mut self) {
        if let Some(f) = self.0 .0.show_progress {
            f(self.0 .0.user_data);
        }
    }

    fn dismiss(&mut self) {
        if let Some(f) = self.0 .0.dismiss_progress {
            f(self.0 .0.user_data);
        }
    }
}
