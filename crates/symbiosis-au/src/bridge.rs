//! C-ABI bridge for the native host shim.
//!
//! The component entry points the host calls are implemented by a thin
//! native shim that forwards every selector here:
//!
//! ```text
//! AU Host (Logic, GarageBand, ...)
//!        ↓
//! native shim (component dispatcher)
//!        ↓ (C-ABI calls)
//! bridge.rs (this module)
//!        ↓
//! BridgeComponent<VstPlugin>
//!        ↓
//! wrapped VST 2 binary
//! ```
//!
//! Plain-data properties travel as raw bytes through
//! `symbiosis_au_get_property` / `symbiosis_au_set_property`. Properties
//! that own strings or dictionaries have dedicated entry points; the shim
//! turns their results into the host's object types.
//!
//! # Safety
//!
//! Every function checks its pointers for null and runs inside
//! `std::panic::catch_unwind`, so a panic never crosses into the host.
//! Failures come back as OSStatus codes.

// These are C-ABI entry points called from the shim, which is responsible
// for passing valid pointers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::cell::UnsafeCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr;

use symbiosis_core::{
    ComponentDescription, ComponentType, FourCharCode, ProtocolFault, Result, SymbiosisError, WrappedPlugin,
    MAX_CHANNELS, MAX_MIDI_EVENTS,
};
use symbiosis_vst2::VstPlugin;

use crate::buffers::AudioBufferList;
use crate::component::BridgeComponent;
use crate::config::{standard_preset_roots, BundleConfig, HostApplication};
use crate::error::{os_status, status_of, to_os_status, OSStatus};
use crate::factory;
use crate::host::EventSink;
use crate::parameters::{copy_str_to_char_array, parameter_info_record};
use crate::presets::{PresetDocument, PresetEntry};
use crate::properties::{PropertyAddress, PropertyInfo, PropertyShape, PropertyValue};
use crate::types::{
    property_ids, AURenderCallback, AudioStreamBasicDescription, AudioTimeStamp, AudioUnitConnection,
    AudioUnitParameterEvent, AuPresetRecord, Boolean, HostCallbackInfo, ParameterInfoRecord, PropertyListenerProc,
    RenderCallbackStruct, Scope,
};

// =============================================================================
// Compile-time checks for shim header constant sync
// =============================================================================

const _: () = assert!(MAX_MIDI_EVENTS == 1024, "Update SYMBIOSIS_AU_MAX_MIDI_EVENTS in the shim header");
const _: () = assert!(MAX_CHANNELS == 32, "Update SYMBIOSIS_AU_MAX_CHANNELS in the shim header");

/// Interval at which the shim calls `symbiosis_au_idle`.
pub const IDLE_INTERVAL_MS: u32 = 25;

// =============================================================================
// Macros
// =============================================================================

/// Run `$body` with the instance state, handling null handles and panics
/// by returning `$default`.
macro_rules! with_state {
    ($instance:expr, $default:expr, |$state:ident| $body:expr) => {{
        if $instance.is_null() {
            return $default;
        }
        catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: the shim only passes handles returned by
            // `symbiosis_au_create` that it has not destroyed, and keeps to
            // the host's calling contract.
            let $state = unsafe { (*$instance).instance() };
            $body
        }))
        .unwrap_or($default)
    }};
}

/// Variant of `with_state!` for functions that return `()`.
macro_rules! with_state_void {
    ($instance:expr, |$state:ident| $body:expr) => {{
        if $instance.is_null() {
            return;
        }
        let _ = catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: as in `with_state!`.
            let $state = unsafe { (*$instance).instance() };
            $body
        }));
    }};
}

// =============================================================================
// Instance handle
// =============================================================================

/// What one host instance owns.
pub struct Instance<P: WrappedPlugin = VstPlugin> {
    pub component: BridgeComponent<P>,
    /// Backing store of the last preset name handed to the shim. Valid until
    /// the next preset read.
    preset_name: CString,
}

/// Opaque per-instance handle owned by the shim.
///
/// There is no lock. The host never changes the bus layout, buffer sizes or
/// sample rate while a render is in flight, and the render context only
/// reads that configuration, so render never waits on the control context.
pub struct SymbiosisInstance<P: WrappedPlugin = VstPlugin> {
    state: UnsafeCell<Instance<P>>,
}

// SAFETY: the host serializes reconfiguration against render, and the shim
// serializes destruction against every other call on the same handle.
unsafe impl<P: WrappedPlugin> Send for SymbiosisInstance<P> {}
// SAFETY: as above.
unsafe impl<P: WrappedPlugin> Sync for SymbiosisInstance<P> {}

impl<P: WrappedPlugin> SymbiosisInstance<P> {
    pub fn new(instance: Instance<P>) -> Self {
        Self {
            state: UnsafeCell::new(instance),
        }
    }

    /// # Safety
    ///
    /// The caller keeps to the host's calling contract: no call changes the
    /// configuration render reads while a render is in flight.
    #[allow(clippy::mut_from_ref)]
    unsafe fn instance(&self) -> &mut Instance<P> {
        // SAFETY: forwarded from the caller.
        unsafe { &mut *self.state.get() }
    }
}

pub type SymbiosisInstanceHandle = *mut SymbiosisInstance;

impl<P: WrappedPlugin> Instance<P> {
    pub fn new(component: BridgeComponent<P>) -> Self {
        Self {
            component,
            preset_name: CString::default(),
        }
    }

    /// Read a plain-data property into `data`, which holds `*size` bytes.
    /// On success `*size` is the number of bytes written.
    ///
    /// # Safety
    ///
    /// `data` must be valid for writes of `*size` bytes.
    pub unsafe fn get_pod(&mut self, address: &PropertyAddress, data: *mut c_void, size: &mut u32) -> Result<()> {
        let shape = self.component.property_shape(address.id)?;
        if !shape.is_pod() {
            return Err(dedicated_entry_point(address));
        }
        let capacity = *size as usize;
        let value = self.component.get_property(address, None)?;
        // SAFETY: `data` holds `capacity` bytes, forwarded from the caller.
        let written = unsafe {
            match value {
                PropertyValue::Float64(value) => write_pod(value, data, capacity)?,
                PropertyValue::UInt32(value) => write_pod(value, data, capacity)?,
                PropertyValue::Format(format) => write_pod(format, data, capacity)?,
                PropertyValue::ChannelInfo(info) => write_pod(info, data, capacity)?,
                PropertyValue::ParameterList(ids) => {
                    let needed = ids.len() * std::mem::size_of::<u32>();
                    if capacity < needed {
                        return Err(too_small(address));
                    }
                    ptr::copy_nonoverlapping(ids.as_ptr() as *const u8, data as *mut u8, needed);
                    needed
                }
                PropertyValue::HostCallbacks(callbacks) => {
                    // Hosts may ask for a prefix of the structure, which has
                    // no padding.
                    let count = capacity.min(std::mem::size_of::<HostCallbackInfo>());
                    ptr::copy_nonoverlapping(
                        &callbacks as *const HostCallbackInfo as *const u8,
                        data as *mut u8,
                        count,
                    );
                    count
                }
                PropertyValue::Preset(entry) => {
                    self.preset_name = CString::new(entry.name.replace('\0', "")).unwrap_or_default();
                    let record = AuPresetRecord {
                        preset_number: entry.number,
                        preset_name: self.preset_name.as_ptr(),
                    };
                    write_pod(record, data, capacity)?
                }
                _ => return Err(dedicated_entry_point(address)),
            }
        };
        *size = written as u32;
        Ok(())
    }

    /// Write a plain-data property from `size` bytes at `data`.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `size` bytes. Callback pointers in
    /// the data must be callable, and a preset name pointer must be null or
    /// point at a NUL-terminated string.
    pub unsafe fn set_pod(&mut self, address: &PropertyAddress, data: *const c_void, size: u32) -> Result<()> {
        let shape = self.component.property_shape(address.id)?;
        // SAFETY: forwarded from the caller for every arm.
        let value = unsafe {
            match shape {
                PropertyShape::Connection => PropertyValue::Connection(read_pod::<AudioUnitConnection>(address, data, size)?),
                PropertyShape::RenderCallback => {
                    PropertyValue::RenderCallback(read_pod::<RenderCallbackStruct>(address, data, size)?)
                }
                PropertyShape::Float64 => PropertyValue::Float64(read_pod::<f64>(address, data, size)?),
                PropertyShape::UInt32 => PropertyValue::UInt32(read_pod::<u32>(address, data, size)?),
                PropertyShape::StreamFormat => {
                    PropertyValue::Format(read_pod::<AudioStreamBasicDescription>(address, data, size)?)
                }
                PropertyShape::HostCallbacks => {
                    let mut callbacks = HostCallbackInfo::default();
                    let count = (size as usize).min(std::mem::size_of::<HostCallbackInfo>());
                    if count > 0 {
                        ptr::copy_nonoverlapping(
                            data as *const u8,
                            &mut callbacks as *mut HostCallbackInfo as *mut u8,
                            count,
                        );
                    }
                    PropertyValue::HostCallbacks(callbacks)
                }
                PropertyShape::Preset => PropertyValue::Preset(self.read_preset(address, data, size)?),
                _ => return Err(dedicated_entry_point(address)),
            }
        };
        self.component.set_property(address, value)
    }

    /// A preset record, or only its number when the host passes four bytes.
    /// Without a name the current name is kept.
    unsafe fn read_preset(&self, address: &PropertyAddress, data: *const c_void, size: u32) -> Result<PresetEntry> {
        let keep_name = || self.component.current_preset().name.clone();
        if (size as usize) < std::mem::size_of::<AuPresetRecord>() {
            // SAFETY: forwarded from the caller.
            let number = unsafe { read_pod::<i32>(address, data, size)? };
            return Ok(PresetEntry {
                number,
                name: keep_name(),
            });
        }
        // SAFETY: forwarded from the caller.
        let record = unsafe { read_pod::<AuPresetRecord>(address, data, size)? };
        let name = if record.preset_name.is_null() {
            keep_name()
        } else {
            // SAFETY: the caller guarantees a NUL-terminated name.
            unsafe { CStr::from_ptr(record.preset_name) }.to_string_lossy().into_owned()
        };
        Ok(PresetEntry {
            number: record.preset_number,
            name,
        })
    }

    /// Preset dictionary of the current state, serialized.
    pub fn class_info(&mut self) -> Result<Vec<u8>> {
        match self.component.get_property(&PropertyAddress::global(property_ids::CLASS_INFO), None)? {
            PropertyValue::Document(document) => document.to_bytes(),
            _ => Err(unexpected_value(property_ids::CLASS_INFO)),
        }
    }

    pub fn set_class_info(&mut self, bytes: &[u8]) -> Result<()> {
        let document = PresetDocument::from_bytes(bytes)?;
        self.component
            .set_property(&PropertyAddress::global(property_ids::CLASS_INFO), PropertyValue::Document(document))
    }

    /// Value of a text-valued property.
    pub fn text(&mut self, address: &PropertyAddress, request: Option<&PropertyValue>) -> Result<String> {
        match self.component.get_property(address, request)? {
            PropertyValue::Text(text) => Ok(text),
            _ => Err(unexpected_value(address.id)),
        }
    }

    pub fn value_strings(&mut self, parameter: u32) -> Result<Vec<String>> {
        let address = PropertyAddress::new(property_ids::PARAMETER_VALUE_STRINGS, Scope::Global as u32, parameter);
        match self.component.get_property(&address, None)? {
            PropertyValue::ValueStrings(strings) => Ok(strings),
            _ => Err(unexpected_value(address.id)),
        }
    }

    pub fn value_from_string(&mut self, parameter: u32, text: String) -> Result<f32> {
        let address = PropertyAddress::global(property_ids::PARAMETER_VALUE_FROM_STRING);
        let request = PropertyValue::ValueFromString { parameter, text };
        match self.component.get_property(&address, Some(&request))? {
            PropertyValue::Float32(value) => Ok(value),
            _ => Err(unexpected_value(address.id)),
        }
    }

    pub fn factory_presets(&mut self) -> Result<Vec<PresetEntry>> {
        let address = PropertyAddress::global(property_ids::FACTORY_PRESETS);
        match self.component.get_property(&address, None)? {
            PropertyValue::FactoryPresets(presets) => Ok(presets),
            _ => Err(unexpected_value(address.id)),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn dedicated_entry_point(address: &PropertyAddress) -> SymbiosisError {
    SymbiosisError::protocol(
        ProtocolFault::InvalidProperty,
        format!("property {} has a dedicated entry point", address.id),
    )
}

fn too_small(address: &PropertyAddress) -> SymbiosisError {
    SymbiosisError::protocol(
        ProtocolFault::InvalidArgument,
        format!("buffer too small for property {}", address.id),
    )
}

fn unexpected_value(id: u32) -> SymbiosisError {
    SymbiosisError::protocol(ProtocolFault::InvalidPropertyValue, format!("property {}", id))
}

/// # Safety
///
/// `data` must be valid for writes of `capacity` bytes.
unsafe fn write_pod<T: Copy>(value: T, data: *mut c_void, capacity: usize) -> Result<usize> {
    let size = std::mem::size_of::<T>();
    if data.is_null() || capacity < size {
        return Err(SymbiosisError::protocol(ProtocolFault::InvalidArgument, "property buffer too small"));
    }
    // SAFETY: `data` holds at least `size` bytes.
    unsafe { ptr::write_unaligned(data as *mut T, value) };
    Ok(size)
}

/// # Safety
///
/// `data` must be valid for reads of `size` bytes, and those bytes must be
/// a valid `T`.
unsafe fn read_pod<T: Copy>(address: &PropertyAddress, data: *const c_void, size: u32) -> Result<T> {
    if data.is_null() || (size as usize) < std::mem::size_of::<T>() {
        return Err(SymbiosisError::protocol(
            ProtocolFault::InvalidPropertyValue,
            format!("property {} value of {} bytes", address.id, size),
        ));
    }
    // SAFETY: `data` holds at least `size_of::<T>()` bytes.
    Ok(unsafe { ptr::read_unaligned(data as *const T) })
}

/// Copy `text` into a C buffer of `size` bytes.
///
/// # Safety
///
/// `buffer` must be valid for writes of `size` bytes.
unsafe fn copy_text(text: &str, buffer: *mut c_char, size: u32) -> OSStatus {
    if buffer.is_null() || size == 0 {
        return os_status::PARAM_ERR;
    }
    // SAFETY: forwarded from the caller.
    let dest = unsafe { std::slice::from_raw_parts_mut(buffer, size as usize) };
    copy_str_to_char_array(text, dest);
    os_status::NO_ERR
}

/// # Safety
///
/// `text` must be null or a NUL-terminated string.
unsafe fn string_arg(text: *const c_char) -> Option<String> {
    if text.is_null() {
        return None;
    }
    // SAFETY: forwarded from the caller.
    Some(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
}

fn status_from<T>(operation: &str, result: Result<T>, on_success: impl FnOnce(T)) -> OSStatus {
    match result {
        Ok(value) => {
            on_success(value);
            os_status::NO_ERR
        }
        Err(error) => {
            log::debug!("{} failed: {}", operation, error);
            to_os_status(&error)
        }
    }
}

// =============================================================================
// Bundle Registration
// =============================================================================

/// Register the bundle this binary serves. Later calls are accepted and
/// ignored.
///
/// # Safety
///
/// `bundle_path`, `info_json` and `name` must be NUL-terminated UTF-8
/// strings.
#[no_mangle]
pub extern "C" fn symbiosis_au_register_bundle(
    bundle_path: *const c_char,
    info_json: *const c_char,
    component_type: u32,
    subtype: u32,
    manufacturer: u32,
    name: *const c_char,
) -> OSStatus {
    if bundle_path.is_null() || info_json.is_null() || name.is_null() {
        return os_status::PARAM_ERR;
    }
    let result = catch_unwind(|| {
        if factory::is_registered() {
            return os_status::NO_ERR;
        }
        let Some(component_type) = ComponentType::from_code(FourCharCode::from_u32(component_type)) else {
            return os_status::PARAM_ERR;
        };
        let description = ComponentDescription::new(
            component_type,
            FourCharCode::from_u32(subtype),
            FourCharCode::from_u32(manufacturer),
        );
        // SAFETY: all three were checked for null above.
        let (bundle_path, info_json, name) = unsafe {
            (
                CStr::from_ptr(bundle_path).to_string_lossy().into_owned(),
                CStr::from_ptr(info_json).to_string_lossy().into_owned(),
                CStr::from_ptr(name).to_string_lossy().into_owned(),
            )
        };
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let config = BundleConfig::from_bundle(Path::new(&bundle_path), description, name, &info_json)
            .map(|config| config.with_preset_roots(standard_preset_roots(home.as_deref())));
        match config.and_then(factory::register_bundle) {
            Ok(()) => os_status::NO_ERR,
            Err(error) => {
                log::error!("Failed to register bundle {}: {}", bundle_path, error);
                to_os_status(&error)
            }
        }
    });
    result.unwrap_or(os_status::K_AUDIO_UNIT_ERR_FAILED_INITIALIZATION)
}

/// Interval at which the shim should call `symbiosis_au_idle`.
#[no_mangle]
pub extern "C" fn symbiosis_au_idle_interval_ms() -> u32 {
    IDLE_INTERVAL_MS
}

// =============================================================================
// Instance Lifecycle
// =============================================================================

/// Create a component for the registered bundle.
///
/// # Safety
///
/// - `sink` must be null or point at an `EventSink` whose callbacks stay
///   valid for the lifetime of the instance
/// - `host_bundle_id` and `host_version` must be null or NUL-terminated
/// - The returned handle must be destroyed with `symbiosis_au_destroy`
///
/// # Returns
///
/// A handle, or null if the wrapped plug-in could not be loaded.
#[no_mangle]
pub extern "C" fn symbiosis_au_create(
    sink: *const EventSink,
    unit: *mut c_void,
    host_bundle_id: *const c_char,
    host_version: *const c_char,
) -> SymbiosisInstanceHandle {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let sink = if sink.is_null() {
            EventSink::default()
        } else {
            // SAFETY: checked for null; the shim owns the sink.
            unsafe { *sink }
        };
        // SAFETY: both are null or NUL-terminated.
        let host = match unsafe { (string_arg(host_bundle_id), string_arg(host_version)) } {
            (Some(bundle_id), Some(version)) => HostApplication::identify(&bundle_id, &version),
            _ => HostApplication::Undetermined,
        };
        match factory::create_component(sink, unit, host) {
            Ok(component) => Box::into_raw(Box::new(SymbiosisInstance::new(Instance::new(component)))),
            Err(error) => {
                log::error!("Failed to create component: {}", error);
                ptr::null_mut()
            }
        }
    }));
    result.unwrap_or(ptr::null_mut())
}

/// Destroy an instance, closing the wrapped plug-in.
///
/// # Safety
///
/// - `instance` must be null or a handle from `symbiosis_au_create`
/// - It must not be used afterwards, nor concurrently with this call
#[no_mangle]
pub extern "C" fn symbiosis_au_destroy(instance: SymbiosisInstanceHandle) {
    if instance.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the handle came from `Box::into_raw` in `symbiosis_au_create`.
        drop(unsafe { Box::from_raw(instance) });
    }));
}

#[no_mangle]
pub extern "C" fn symbiosis_au_initialize(instance: SymbiosisInstanceHandle) -> OSStatus {
    with_state!(instance, os_status::K_AUDIO_UNIT_ERR_FAILED_INITIALIZATION, |state| {
        status_of("initialize", state.component.initialize())
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_uninitialize(instance: SymbiosisInstanceHandle) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        state.component.uninitialize();
        os_status::NO_ERR
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_reset(instance: SymbiosisInstanceHandle, scope: u32, element: u32) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        status_of("reset", state.component.reset(scope, element))
    })
}

/// Plug-in idle and deferred preset refresh. Called every
/// [`IDLE_INTERVAL_MS`] on the main thread.
#[no_mangle]
pub extern "C" fn symbiosis_au_idle(instance: SymbiosisInstanceHandle) {
    with_state_void!(instance, |state| state.component.idle())
}

// =============================================================================
// Properties
// =============================================================================

/// Size and writability of a property.
///
/// # Safety
///
/// `size` and `writable` must each be null or valid for writes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_property_info(
    instance: SymbiosisInstanceHandle,
    id: u32,
    scope: u32,
    element: u32,
    size: *mut u32,
    writable: *mut Boolean,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let info: Result<PropertyInfo> = state.component.property_info(&PropertyAddress::new(id, scope, element));
        status_from("property info", info, |info| {
            // SAFETY: each pointer is written only when non-null.
            unsafe {
                if !size.is_null() {
                    *size = info.normal_size;
                }
                if !writable.is_null() {
                    *writable = info.writable as Boolean;
                }
            }
        })
    })
}

/// Read a plain-data property.
///
/// # Safety
///
/// - `data` must be valid for writes of `*size` bytes
/// - On success `*size` holds the number of bytes written
#[no_mangle]
pub extern "C" fn symbiosis_au_get_property(
    instance: SymbiosisInstanceHandle,
    id: u32,
    scope: u32,
    element: u32,
    data: *mut c_void,
    size: *mut u32,
) -> OSStatus {
    if data.is_null() || size.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let address = PropertyAddress::new(id, scope, element);
        // SAFETY: both pointers were checked for null; the shim sizes the
        // buffer.
        let result = unsafe { state.get_pod(&address, data, &mut *size) };
        status_of("get property", result)
    })
}

/// Write a plain-data property.
///
/// # Safety
///
/// `data` must be valid for reads of `size` bytes and hold the property's
/// C structure.
#[no_mangle]
pub extern "C" fn symbiosis_au_set_property(
    instance: SymbiosisInstanceHandle,
    id: u32,
    scope: u32,
    element: u32,
    data: *const c_void,
    size: u32,
) -> OSStatus {
    if data.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let address = PropertyAddress::new(id, scope, element);
        // SAFETY: checked for null; the shim passes the host's value.
        let result = unsafe { state.set_pod(&address, data, size) };
        status_of("set property", result)
    })
}

/// Serialized preset dictionary of the current state.
///
/// With a null `buffer`, only stores the required size in `*size`.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `*size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_class_info(
    instance: SymbiosisInstanceHandle,
    buffer: *mut u8,
    size: *mut u32,
) -> OSStatus {
    if size.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let bytes = match state.class_info() {
            Ok(bytes) => bytes,
            Err(error) => {
                log::error!("Failed to capture class info: {}", error);
                return to_os_status(&error);
            }
        };
        // SAFETY: `size` was checked for null.
        let capacity = unsafe { *size } as usize;
        // SAFETY: as above.
        unsafe { *size = bytes.len() as u32 };
        if buffer.is_null() {
            return os_status::NO_ERR;
        }
        if capacity < bytes.len() {
            return os_status::PARAM_ERR;
        }
        // SAFETY: `buffer` holds `capacity` bytes.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len()) };
        os_status::NO_ERR
    })
}

/// Restore a serialized preset dictionary.
///
/// # Safety
///
/// `buffer` must be valid for reads of `size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_set_class_info(instance: SymbiosisInstanceHandle, buffer: *const u8, size: u32) -> OSStatus {
    if buffer.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        // SAFETY: checked for null; the shim passes `size` readable bytes.
        let bytes = unsafe { std::slice::from_raw_parts(buffer, size as usize) };
        status_of("set class info", state.set_class_info(bytes))
    })
}

/// Name of an input or output bus.
///
/// # Safety
///
/// `buffer` must be valid for writes of `size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_element_name(
    instance: SymbiosisInstanceHandle,
    scope: u32,
    element: u32,
    buffer: *mut c_char,
    size: u32,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let address = PropertyAddress::new(property_ids::ELEMENT_NAME, scope, element);
        match state.text(&address, None) {
            // SAFETY: forwarded from the caller.
            Ok(name) => unsafe { copy_text(&name, buffer, size) },
            Err(error) => to_os_status(&error),
        }
    })
}

/// Metadata of one mapped parameter.
///
/// # Safety
///
/// `info` must be valid for writes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_parameter_info(
    instance: SymbiosisInstanceHandle,
    scope: u32,
    parameter: u32,
    info: *mut ParameterInfoRecord,
) -> OSStatus {
    if info.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let address = PropertyAddress::new(property_ids::PARAMETER_INFO, scope, parameter);
        let record = state
            .component
            .property_info(&address)
            .and_then(|_| parameter_info_record(state.component.parameters(), parameter));
        status_from("parameter info", record, |record| {
            // SAFETY: checked for null above.
            unsafe { info.write(record) }
        })
    })
}

/// Number of value strings of an indexed parameter, 0 for other parameters.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_parameter_value_string_count(instance: SymbiosisInstanceHandle, parameter: u32) -> u32 {
    with_state!(instance, 0, |state| {
        state.value_strings(parameter).map_or(0, |strings| strings.len() as u32)
    })
}

/// One value string of an indexed parameter.
///
/// # Safety
///
/// `buffer` must be valid for writes of `size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_parameter_value_string(
    instance: SymbiosisInstanceHandle,
    parameter: u32,
    index: u32,
    buffer: *mut c_char,
    size: u32,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        match state.value_strings(parameter) {
            Ok(strings) => match strings.get(index as usize) {
                // SAFETY: forwarded from the caller.
                Some(text) => unsafe { copy_text(text, buffer, size) },
                None => os_status::PARAM_ERR,
            },
            Err(error) => to_os_status(&error),
        }
    })
}

/// Display text for `*value`, or for the current value when `value` is
/// null.
///
/// # Safety
///
/// `value` must be null or readable; `buffer` must be valid for writes of
/// `size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_string_from_value(
    instance: SymbiosisInstanceHandle,
    parameter: u32,
    value: *const f32,
    buffer: *mut c_char,
    size: u32,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        // SAFETY: read only when non-null.
        let value = (!value.is_null()).then(|| unsafe { *value });
        let address = PropertyAddress::global(property_ids::PARAMETER_STRING_FROM_VALUE);
        let request = PropertyValue::StringFromValue { parameter, value };
        match state.text(&address, Some(&request)) {
            // SAFETY: forwarded from the caller.
            Ok(text) => unsafe { copy_text(&text, buffer, size) },
            Err(error) => to_os_status(&error),
        }
    })
}

/// Parameter value for a display text.
///
/// # Safety
///
/// `text` must be NUL-terminated; `value` must be valid for writes.
#[no_mangle]
pub extern "C" fn symbiosis_au_value_from_string(
    instance: SymbiosisInstanceHandle,
    parameter: u32,
    text: *const c_char,
    value: *mut f32,
) -> OSStatus {
    if text.is_null() || value.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        // SAFETY: checked for null above.
        let text = unsafe { string_arg(text) }.unwrap_or_default();
        status_from("value from string", state.value_from_string(parameter, text), |parsed| {
            // SAFETY: checked for null above.
            unsafe { *value = parsed }
        })
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_get_factory_preset_count(instance: SymbiosisInstanceHandle) -> u32 {
    with_state!(instance, 0, |state| {
        state.factory_presets().map_or(0, |presets| presets.len() as u32)
    })
}

/// Number and name of one factory preset.
///
/// # Safety
///
/// `number` must be valid for writes; `buffer` must be valid for writes of
/// `size` bytes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_factory_preset(
    instance: SymbiosisInstanceHandle,
    index: u32,
    number: *mut i32,
    buffer: *mut c_char,
    size: u32,
) -> OSStatus {
    if number.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let presets = match state.factory_presets() {
            Ok(presets) => presets,
            Err(error) => return to_os_status(&error),
        };
        let Some(preset) = presets.get(index as usize) else {
            return os_status::PARAM_ERR;
        };
        // SAFETY: checked for null above.
        unsafe { *number = preset.number };
        // SAFETY: forwarded from the caller.
        unsafe { copy_text(&preset.name, buffer, size) }
    })
}

// =============================================================================
// Parameters
// =============================================================================

/// # Safety
///
/// `value` must be valid for writes.
#[no_mangle]
pub extern "C" fn symbiosis_au_get_parameter(
    instance: SymbiosisInstanceHandle,
    parameter: u32,
    scope: u32,
    _element: u32,
    value: *mut f32,
) -> OSStatus {
    if value.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        status_from("get parameter", state.component.get_parameter(scope, parameter), |current| {
            // SAFETY: checked for null above.
            unsafe { *value = current }
        })
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_set_parameter(
    instance: SymbiosisInstanceHandle,
    parameter: u32,
    scope: u32,
    _element: u32,
    value: f32,
    _buffer_offset: u32,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        status_of("set parameter", state.component.set_parameter(scope, parameter, value))
    })
}

/// Apply parameter events. Ramped events are ignored.
///
/// # Safety
///
/// `events` must point at `count` events.
#[no_mangle]
pub extern "C" fn symbiosis_au_schedule_parameters(
    instance: SymbiosisInstanceHandle,
    events: *const AudioUnitParameterEvent,
    count: u32,
) -> OSStatus {
    if events.is_null() && count > 0 {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let events = if count == 0 {
            &[][..]
        } else {
            // SAFETY: checked for null; the shim passes `count` events.
            unsafe { std::slice::from_raw_parts(events, count as usize) }
        };
        status_of("schedule parameters", state.component.schedule_parameters(events))
    })
}

// =============================================================================
// Render
// =============================================================================

/// Render one output bus.
///
/// # Safety
///
/// - `time_stamp` and `data` must be valid for the call; `action_flags` may
///   be null
/// - Every non-null buffer in `data` must hold `frame_count` samples
/// - Thread safety: runs on the audio thread and never blocks. The host must
///   not change stream formats, maximum frames or connections during the
///   call; other control calls may run concurrently
#[no_mangle]
pub extern "C" fn symbiosis_au_render(
    instance: SymbiosisInstanceHandle,
    action_flags: *mut u32,
    time_stamp: *const AudioTimeStamp,
    bus: u32,
    frame_count: u32,
    data: *mut AudioBufferList,
) -> OSStatus {
    // SAFETY: forwarded from the caller.
    unsafe { render_instance(instance, action_flags, time_stamp, bus, frame_count, data) }
}

/// # Safety
///
/// As for [`symbiosis_au_render`].
unsafe fn render_instance<P: WrappedPlugin>(
    instance: *mut SymbiosisInstance<P>,
    action_flags: *mut u32,
    time_stamp: *const AudioTimeStamp,
    bus: u32,
    frame_count: u32,
    data: *mut AudioBufferList,
) -> OSStatus {
    if instance.is_null() || time_stamp.is_null() || data.is_null() {
        return os_status::PARAM_ERR;
    }
    with_state!(instance, os_status::K_AUDIO_UNIT_ERR_CANNOT_DO_IN_CURRENT_CONTEXT, |state| {
        // SAFETY: forwarded from the caller.
        unsafe { state.component.render(action_flags, time_stamp, bus, frame_count, data) }
    })
}

/// Queue a MIDI event for the next render.
#[no_mangle]
pub extern "C" fn symbiosis_au_midi_event(
    instance: SymbiosisInstanceHandle,
    status: u32,
    data1: u32,
    data2: u32,
    offset_frames: u32,
) -> OSStatus {
    with_state!(instance, os_status::PARAM_ERR, |state| {
        let result = state
            .component
            .midi_event(status as u8, data1 as u8, data2 as u8, offset_frames);
        status_of("MIDI event", result)
    })
}

// =============================================================================
// Listeners and notifications
// =============================================================================

#[no_mangle]
pub extern "C" fn symbiosis_au_add_property_listener(
    instance: SymbiosisInstanceHandle,
    property: u32,
    callback: Option<PropertyListenerProc>,
    ref_con: *mut c_void,
) -> OSStatus {
    let Some(callback) = callback else {
        return os_status::PARAM_ERR;
    };
    with_state!(instance, os_status::PARAM_ERR, |state| {
        status_of(
            "add property listener",
            state.component.add_property_listener(property, callback, ref_con),
        )
    })
}

/// Remove listeners of `property` with this callback; with `match_ref_con`
/// only those registered with `ref_con`.
#[no_mangle]
pub extern "C" fn symbiosis_au_remove_property_listener(
    instance: SymbiosisInstanceHandle,
    property: u32,
    callback: Option<PropertyListenerProc>,
    ref_con: *mut c_void,
    match_ref_con: bool,
) -> OSStatus {
    let Some(callback) = callback else {
        return os_status::PARAM_ERR;
    };
    with_state!(instance, os_status::PARAM_ERR, |state| {
        state
            .component
            .remove_property_listener(property, callback, match_ref_con.then_some(ref_con));
        os_status::NO_ERR
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_add_render_notify(
    instance: SymbiosisInstanceHandle,
    callback: Option<AURenderCallback>,
    ref_con: *mut c_void,
) -> OSStatus {
    let Some(callback) = callback else {
        return os_status::PARAM_ERR;
    };
    with_state!(instance, os_status::PARAM_ERR, |state| {
        status_of("add render notify", state.component.add_render_notify(callback, ref_con))
    })
}

#[no_mangle]
pub extern "C" fn symbiosis_au_remove_render_notify(
    instance: SymbiosisInstanceHandle,
    callback: Option<AURenderCallback>,
    ref_con: *mut c_void,
) -> OSStatus {
    let Some(callback) = callback else {
        return os_status::PARAM_ERR;
    };
    with_state!(instance, os_status::PARAM_ERR, |state| {
        state.component.remove_render_notify(callback, ref_con);
        os_status::NO_ERR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::FixedBufferList;
    use crate::component::tests::{fixture, Fixture, PLUGIN_ID};
    use approx::assert_relative_eq;
    use symbiosis_core::testing::MockPlugin;

    fn instance(plugin: MockPlugin) -> (Instance<MockPlugin>, tempfile::TempDir) {
        let Fixture { component, dir, .. } = fixture(plugin);
        (Instance::new(component), dir)
    }

    #[test]
    fn test_null_handle_safety() {
        symbiosis_au_destroy(ptr::null_mut());
        symbiosis_au_idle(ptr::null_mut());
        assert_eq!(symbiosis_au_initialize(ptr::null_mut()), os_status::K_AUDIO_UNIT_ERR_FAILED_INITIALIZATION);
        assert_eq!(symbiosis_au_reset(ptr::null_mut(), 0, 0), os_status::PARAM_ERR);
        assert_eq!(symbiosis_au_set_parameter(ptr::null_mut(), 0, 0, 0, 0.5, 0), os_status::PARAM_ERR);
        assert_eq!(symbiosis_au_get_factory_preset_count(ptr::null_mut()), 0);

        let mut value = 0.0f32;
        assert_eq!(
            symbiosis_au_get_parameter(ptr::null_mut(), 0, 0, 0, &mut value),
            os_status::PARAM_ERR
        );
        let time_stamp = AudioTimeStamp::at_sample(0.0);
        assert_eq!(
            symbiosis_au_render(ptr::null_mut(), ptr::null_mut(), &time_stamp, 0, 64, ptr::null_mut()),
            os_status::PARAM_ERR
        );
        assert_eq!(
            symbiosis_au_add_render_notify(ptr::null_mut(), None, ptr::null_mut()),
            os_status::PARAM_ERR
        );
        assert_eq!(symbiosis_au_idle_interval_ms(), 25);
    }

    #[test]
    fn test_register_rejects_null_arguments() {
        assert_eq!(
            symbiosis_au_register_bundle(ptr::null(), ptr::null(), 0, 0, 0, ptr::null()),
            os_status::PARAM_ERR
        );
    }

    #[test]
    fn test_sample_rate_through_bytes() {
        let (mut instance, _dir) = instance(MockPlugin::new(PLUGIN_ID, 1, 1));
        let address = PropertyAddress::new(property_ids::SAMPLE_RATE, Scope::Output as u32, 0);

        let rate = 48000.0f64;
        // SAFETY: `rate` is a live f64.
        unsafe { instance.set_pod(&address, &rate as *const f64 as *const c_void, 8) }.unwrap();

        let mut read = 0.0f64;
        let mut size = 8u32;
        // SAFETY: `read` holds `size` bytes.
        unsafe { instance.get_pod(&address, &mut read as *mut f64 as *mut c_void, &mut size) }.unwrap();
        assert_relative_eq!(read, 48000.0);
        assert_eq!(size, 8);

        let short = 1u32;
        // SAFETY: `short` is a live u32; the length check refuses it.
        let error = unsafe { instance.set_pod(&address, &short as *const u32 as *const c_void, 4) }.unwrap_err();
        assert_eq!(error.protocol_fault(), Some(ProtocolFault::InvalidPropertyValue));
    }

    #[test]
    fn test_parameter_list_needs_room() {
        let (mut instance, _dir) = instance(MockPlugin::new(PLUGIN_ID, 3, 1));
        let address = PropertyAddress::global(property_ids::PARAMETER_LIST);

        let mut ids = [u32::MAX; 3];
        let mut size = 12u32;
        // SAFETY: `ids` holds 12 bytes.
        unsafe { instance.get_pod(&address, ids.as_mut_ptr() as *mut c_void, &mut size) }.unwrap();
        assert_eq!(ids, [0, 1, 2]);

        let mut size = 8u32;
        // SAFETY: `ids` holds more than `size` bytes.
        let error = unsafe { instance.get_pod(&address, ids.as_mut_ptr() as *mut c_void, &mut size) }.unwrap_err();
        assert_eq!(error.protocol_fault(), Some(ProtocolFault::InvalidArgument));
    }

    #[test]
    fn test_dictionary_properties_have_own_entry_points() {
        let (mut instance, _dir) = instance(MockPlugin::new(PLUGIN_ID, 1, 1));
        let mut buffer = [0u8; 64];
        let mut size = 64u32;
        let address = PropertyAddress::global(property_ids::CLASS_INFO);
        // SAFETY: `buffer` holds `size` bytes.
        let error = unsafe { instance.get_pod(&address, buffer.as_mut_ptr() as *mut c_void, &mut size) }.unwrap_err();
        assert_eq!(error.protocol_fault(), Some(ProtocolFault::InvalidProperty));

        let bytes = instance.class_info().unwrap();
        assert!(instance.set_class_info(&bytes).is_ok());
        assert!(instance.set_class_info(b"not a preset").is_err());
    }

    #[test]
    fn test_preset_record() {
        let (mut instance, _dir) = instance(MockPlugin::new(PLUGIN_ID, 1, 2));
        let address = PropertyAddress::global(property_ids::PRESENT_PRESET);

        let mut record = AuPresetRecord {
            preset_number: 0,
            preset_name: ptr::null(),
        };
        let mut size = std::mem::size_of::<AuPresetRecord>() as u32;
        // SAFETY: `record` holds `size` bytes.
        unsafe { instance.get_pod(&address, &mut record as *mut AuPresetRecord as *mut c_void, &mut size) }.unwrap();
        assert_eq!(record.preset_number, instance.component.current_preset().number);
        // SAFETY: the name stays alive until the next preset read.
        let name = unsafe { CStr::from_ptr(record.preset_name) };
        assert_eq!(name.to_str().unwrap(), instance.component.current_preset().name);

        let name = CString::new("Mine").unwrap();
        let record = AuPresetRecord {
            preset_number: -1,
            preset_name: name.as_ptr(),
        };
        // SAFETY: `record` and its name are live.
        unsafe { instance.set_pod(&address, &record as *const AuPresetRecord as *const c_void, size) }.unwrap();
        assert_eq!(instance.component.plugin().program_names[0], "Mine");
    }

    #[test]
    fn test_host_callbacks_accept_a_prefix() {
        unsafe extern "C" fn beat(_: *mut c_void, beat: *mut f64, tempo: *mut f64) -> OSStatus {
            // SAFETY: callers pass live pointers.
            unsafe {
                *beat = 1.0;
                *tempo = 100.0;
            }
            0
        }

        let (mut instance, _dir) = instance(MockPlugin::new(PLUGIN_ID, 1, 1));
        let address = PropertyAddress::global(property_ids::HOST_CALLBACKS);
        let callbacks = HostCallbackInfo {
            beat_and_tempo_proc: Some(beat),
            ..HostCallbackInfo::default()
        };
        let prefix = (2 * std::mem::size_of::<*const c_void>()) as u32;
        // SAFETY: `callbacks` is larger than the prefix.
        unsafe { instance.set_pod(&address, &callbacks as *const HostCallbackInfo as *const c_void, prefix) }
            .unwrap();
        let stored = instance.component.host_callbacks();
        assert!(stored.beat_and_tempo_proc.is_some());
        assert!(stored.transport_state_proc.is_none());
    }

    fn handle(plugin: MockPlugin) -> (*mut SymbiosisInstance<MockPlugin>, tempfile::TempDir) {
        let (instance, dir) = instance(plugin);
        (Box::into_raw(Box::new(SymbiosisInstance::new(instance))), dir)
    }

    fn faulting_control_call(handle: *mut SymbiosisInstance<MockPlugin>) -> OSStatus {
        with_state!(handle, os_status::PARAM_ERR, |state| {
            if state.component.plugin().process_calls == 0 {
                panic!("fault inside a control call");
            }
            os_status::NO_ERR
        })
    }

    #[test]
    fn test_render_after_a_faulted_control_call() {
        let (handle, _dir) = handle(MockPlugin::new(PLUGIN_ID, 1, 1));
        // SAFETY: live handle, used from this thread only.
        unsafe { (*handle).instance() }.component.initialize().unwrap();
        assert_eq!(faulting_control_call(handle), os_status::PARAM_ERR);

        let mut left = vec![-1.0f32; 32];
        let mut right = vec![-1.0f32; 32];
        let mut output = FixedBufferList::default();
        output.point_at(&[left.as_mut_ptr(), right.as_mut_ptr()], 32);
        let time_stamp = AudioTimeStamp::at_sample(0.0);
        let mut flags = 0;
        // SAFETY: live handle; the buffers hold 32 frames.
        let status = unsafe { render_instance(handle, &mut flags, &time_stamp, 0, 32, output.as_list_ptr()) };
        assert_eq!(status, os_status::NO_ERR);
        // SAFETY: as above.
        assert_eq!(unsafe { (*handle).instance() }.component.plugin().process_calls, 1);
        assert!(left.iter().chain(&right).all(|&sample| sample == 0.5));

        // SAFETY: created by `Box::into_raw` above.
        drop(unsafe { Box::from_raw(handle) });
    }

    #[test]
    fn test_copy_text_truncates() {
        let mut buffer = [1 as c_char; 4];
        // SAFETY: `buffer` holds 4 bytes.
        assert_eq!(unsafe { copy_text("Stereo", buffer.as_mut_ptr(), 4) }, os_status::NO_ERR);
        assert_eq!(buffer, [b'S' as c_char, b't' as c_char, b'e' as c_char, 0]);
        // SAFETY: null is refused before any write.
        assert_eq!(unsafe { copy_text("x", ptr::null_mut(), 4) }, os_status::PARAM_ERR);
    }
}
