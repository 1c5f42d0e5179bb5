//! Host-facing side of the wrapped plug-in's callbacks.
//!
//! [`HostContext`] is the [`HostCallbacks`] implementation handed to the
//! plug-in adapter. Parameter changes the plug-in makes on its own are
//! scaled into host units and forwarded through the [`EventSink`] the native
//! shim installed; display updates are only flagged here and picked up by
//! the next idle pass on the control context.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use symbiosis_core::{HostCallbacks, ParameterMap, PRODUCT, VENDOR, VENDOR_VERSION};

/// Capabilities the bridge reports to the wrapped plug-in.
pub const HOST_CAPABILITIES: [&str; 6] = [
    "sendVstEvents",
    "sendVstMidiEvent",
    "sendVstTimeInfo",
    "reportConnectionChanges",
    "sizeWindow",
    "supplyIdle",
];

/// Notification callbacks into the native shim.
///
/// Every callback is optional. `user_data` is passed back unchanged.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EventSink {
    pub user_data: *mut c_void,
    pub property_changed: Option<unsafe extern "C" fn(user_data: *mut c_void, property: u32, scope: u32, element: u32)>,
    pub begin_gesture: Option<unsafe extern "C" fn(user_data: *mut c_void, parameter: u32)>,
    pub parameter_changed: Option<unsafe extern "C" fn(user_data: *mut c_void, parameter: u32, value: f32)>,
    pub end_gesture: Option<unsafe extern "C" fn(user_data: *mut c_void, parameter: u32)>,
    pub resize_view: Option<unsafe extern "C" fn(user_data: *mut c_void, width: i32, height: i32) -> bool>,
}

impl Default for EventSink {
    fn default() -> Self {
        Self {
            user_data: std::ptr::null_mut(),
            property_changed: None,
            begin_gesture: None,
            parameter_changed: None,
            end_gesture: None,
            resize_view: None,
        }
    }
}

// SAFETY: the shim guarantees its callbacks and `user_data` may be used from
// any thread for the lifetime of the component.
unsafe impl Send for EventSink {}
// SAFETY: see above; the sink is never mutated after construction.
unsafe impl Sync for EventSink {}

/// Callback target of one wrapped plug-in instance.
pub struct HostContext {
    sink: EventSink,
    parameters: OnceLock<Arc<ParameterMap>>,
    display_dirty: AtomicBool,
}

impl HostContext {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            parameters: OnceLock::new(),
            display_dirty: AtomicBool::new(false),
        }
    }

    /// Install the mapping table once it has been loaded. Later calls are
    /// ignored.
    pub fn install_parameters(&self, parameters: Arc<ParameterMap>) {
        if self.parameters.set(parameters).is_err() {
            log::warn!("Parameter mapping already installed");
        }
    }

    /// Whether `update_display` was called since the last check.
    pub fn take_display_dirty(&self) -> bool {
        self.display_dirty.swap(false, Ordering::AcqRel)
    }

    /// Tell the shim a property changed without any listener registered.
    pub fn notify_property(&self, property: u32, scope: u32, element: u32) {
        if let Some(callback) = self.sink.property_changed {
            // SAFETY: the shim installed this callback with its user data.
            unsafe { callback(self.sink.user_data, property, scope, element) };
        }
    }

    fn mapped(&self, index: usize) -> Option<&ParameterMap> {
        self.parameters
            .get()
            .map(Arc::as_ref)
            .filter(|parameters| parameters.contains(index))
    }
}

impl HostCallbacks for HostContext {
    fn automate(&self, index: usize, value: f32) {
        let Some(parameters) = self.mapped(index) else {
            return;
        };
        let Some(host_value) = parameters.scale_to_host(index, value) else {
            return;
        };
        if let Some(callback) = self.sink.parameter_changed {
            // SAFETY: the shim installed this callback with its user data.
            unsafe { callback(self.sink.user_data, index as u32, host_value) };
        }
    }

    fn begin_edit(&self, index: usize) {
        if self.mapped(index).is_none() {
            return;
        }
        if let Some(callback) = self.sink.begin_gesture {
            // SAFETY: the shim installed this callback with its user data.
            unsafe { callback(self.sink.user_data, index as u32) };
        }
    }

    fn end_edit(&self, index: usize) {
        if self.mapped(index).is_none() {
            return;
        }
        if let Some(callback) = self.sink.end_gesture {
            // SAFETY: the shim installed this callback with its user data.
            unsafe { callback(self.sink.user_data, index as u32) };
        }
    }

    fn update_display(&self) {
        self.display_dirty.store(true, Ordering::Release);
    }

    fn resize_window(&self, width: i32, height: i32) -> bool {
        match self.sink.resize_view {
            // SAFETY: the shim installed this callback with its user data.
            Some(callback) => unsafe { callback(self.sink.user_data, width, height) },
            None => false,
        }
    }

    fn can_do(&self, capability: &str) -> bool {
        HOST_CAPABILITIES.contains(&capability)
    }

    fn vendor(&self) -> &str {
        VENDOR
    }

    fn product(&self) -> &str {
        PRODUCT
    }

    fn vendor_version(&self) -> i32 {
        VENDOR_VERSION
    }
}
