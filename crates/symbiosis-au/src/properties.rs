//! Property registry of the bridge component.
//!
//! Every property the component answers is one [`PropertyEntry`]: its id,
//! the shape of its value, its static access, and the accessors that
//! compute its info, read it and write it. [`PropertyRegistry::new`]
//! validates the table when it is built: ids are unique and every entry
//! that may be read has a getter, every entry that may be written a setter.
//! Unknown ids are refused with `InvalidProperty`.
//!
//! Values travel as [`PropertyValue`]. The C-ABI layer turns plain-data
//! shapes into raw bytes; shapes that own strings or dictionaries have
//! dedicated entry points.

use std::sync::Arc;

use symbiosis_core::{ParameterInfo, ProtocolFault, Result, SymbiosisError, WrappedPlugin};

use crate::component::BridgeComponent;
use crate::parameters;
use crate::presets::{PresetDocument, PresetEntry};
use crate::types::{
    property_ids, AUChannelInfo, AuPresetRecord, AudioStreamBasicDescription, AudioUnitConnection,
    HostCallbackInfo, RenderCallbackStruct, Scope,
};

// =============================================================================
// Sizes reported to the host
// =============================================================================

const POINTER_SIZE: u32 = std::mem::size_of::<*const std::ffi::c_void>() as u32;
const FLOAT64_SIZE: u32 = 8;
const UINT32_SIZE: u32 = 4;
const FORMAT_SIZE: u32 = std::mem::size_of::<AudioStreamBasicDescription>() as u32;
const CONNECTION_SIZE: u32 = std::mem::size_of::<AudioUnitConnection>() as u32;
const RENDER_CALLBACK_SIZE: u32 = std::mem::size_of::<RenderCallbackStruct>() as u32;
const HOST_CALLBACKS_SIZE: u32 = std::mem::size_of::<HostCallbackInfo>() as u32;
const CHANNEL_INFO_SIZE: u32 = std::mem::size_of::<AUChannelInfo>() as u32;
const PRESET_SIZE: u32 = std::mem::size_of::<AuPresetRecord>() as u32;
/// `sizeof(AudioUnitParameterInfo)`.
const PARAMETER_INFO_SIZE: u32 = 104;
/// `sizeof(AudioUnitParameterStringFromValue)` and its inverse.
const STRING_VALUE_SIZE: u32 = 24;

// =============================================================================
// Types
// =============================================================================

/// Where a property request points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAddress {
    pub id: u32,
    pub scope: u32,
    pub element: u32,
}

impl PropertyAddress {
    pub fn new(id: u32, scope: u32, element: u32) -> Self {
        Self { id, scope, element }
    }

    pub fn global(id: u32) -> Self {
        Self::new(id, Scope::Global as u32, 0)
    }
}

/// Answer to a property info query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyInfo {
    pub readable: bool,
    pub writable: bool,
    /// Smallest buffer a get or set accepts.
    pub min_size: u32,
    pub normal_size: u32,
}

impl PropertyInfo {
    fn read_only(size: u32) -> Self {
        Self {
            readable: true,
            writable: false,
            min_size: size,
            normal_size: size,
        }
    }

    fn write_only(size: u32) -> Self {
        Self {
            readable: false,
            writable: true,
            min_size: size,
            normal_size: size,
        }
    }

    fn read_write(size: u32) -> Self {
        Self {
            readable: true,
            writable: true,
            min_size: size,
            normal_size: size,
        }
    }
}

/// Static access of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

/// Layout of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyShape {
    /// Preset dictionary.
    Document,
    Connection,
    RenderCallback,
    Float64,
    UInt32,
    StreamFormat,
    /// Array of parameter ids.
    ParameterList,
    ParameterInfo,
    ValueStrings,
    ChannelInfo,
    HostCallbacks,
    FactoryPresets,
    Preset,
    Text,
    StringFromValue,
    ValueFromString,
}

impl PropertyShape {
    /// Whether the value is plain data the C-ABI layer copies byte-wise.
    pub fn is_pod(self) -> bool {
        matches!(
            self,
            PropertyShape::Connection
                | PropertyShape::RenderCallback
                | PropertyShape::Float64
                | PropertyShape::UInt32
                | PropertyShape::StreamFormat
                | PropertyShape::ParameterList
                | PropertyShape::ChannelInfo
                | PropertyShape::HostCallbacks
                | PropertyShape::Preset
        )
    }
}

/// A property value in or out of the component.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Document(PresetDocument),
    Connection(AudioUnitConnection),
    RenderCallback(RenderCallbackStruct),
    Float64(f64),
    Float32(f32),
    UInt32(u32),
    Format(AudioStreamBasicDescription),
    ParameterList(Vec<u32>),
    ParameterInfo(ParameterInfo),
    ValueStrings(Vec<String>),
    ChannelInfo(AUChannelInfo),
    HostCallbacks(HostCallbackInfo),
    FactoryPresets(Vec<PresetEntry>),
    Preset(PresetEntry),
    Text(String),
    /// Request: display text for `value`, or the current value when `None`.
    StringFromValue { parameter: u32, value: Option<f32> },
    /// Request: value for `text`.
    ValueFromString { parameter: u32, text: String },
}

pub type InfoFn<P> = fn(&BridgeComponent<P>, &PropertyAddress) -> Result<PropertyInfo>;
pub type GetFn<P> = fn(&mut BridgeComponent<P>, &PropertyAddress, Option<&PropertyValue>) -> Result<PropertyValue>;
pub type SetFn<P> = fn(&mut BridgeComponent<P>, &PropertyAddress, PropertyValue) -> Result<()>;

/// One registered property.
pub struct PropertyEntry<P: WrappedPlugin> {
    pub id: u32,
    pub name: &'static str,
    pub shape: PropertyShape,
    pub access: Access,
    pub info: InfoFn<P>,
    pub get: Option<GetFn<P>>,
    pub set: Option<SetFn<P>>,
}

impl<P: WrappedPlugin> Clone for PropertyEntry<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: WrappedPlugin> Copy for PropertyEntry<P> {}

impl<P: WrappedPlugin> std::fmt::Debug for PropertyEntry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("access", &self.access)
            .finish()
    }
}

/// Validated table of properties, sorted by id.
pub struct PropertyRegistry<P: WrappedPlugin> {
    entries: Vec<PropertyEntry<P>>,
}

impl<P: WrappedPlugin> PropertyRegistry<P> {
    /// Build a registry, refusing duplicate ids and entries whose accessors
    /// do not match their access.
    pub fn new(mut entries: Vec<PropertyEntry<P>>) -> Result<Self> {
        entries.sort_by_key(|entry| entry.id);
        for pair in entries.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(registration_error(format!(
                    "property {} registered twice ({} and {})",
                    pair[0].id, pair[0].name, pair[1].name
                )));
            }
        }
        for entry in &entries {
            if entry.access.readable() != entry.get.is_some() {
                return Err(registration_error(format!("property {} getter does not match access", entry.name)));
            }
            if entry.access.writable() != entry.set.is_some() {
                return Err(registration_error(format!("property {} setter does not match access", entry.name)));
            }
        }
        Ok(Self { entries })
    }

    /// Every property the bridge answers.
    pub fn standard() -> Result<Arc<Self>> {
        Self::new(standard_entries()).map(Arc::new)
    }

    pub fn entry(&self, id: u32) -> Result<PropertyEntry<P>> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .map(|slot| self.entries[slot])
            .map_err(|_| SymbiosisError::protocol(ProtocolFault::InvalidProperty, format!("property {}", id)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }
}

fn registration_error(message: String) -> SymbiosisError {
    SymbiosisError::protocol(ProtocolFault::InvalidProperty, message)
}

// =============================================================================
// Shared checks
// =============================================================================

fn fault(fault: ProtocolFault, address: &PropertyAddress) -> SymbiosisError {
    SymbiosisError::protocol(
        fault,
        format!("property {} scope {} element {}", address.id, address.scope, address.element),
    )
}

fn global_only(address: &PropertyAddress) -> Result<()> {
    if address.scope != Scope::Global as u32 {
        return Err(fault(ProtocolFault::InvalidScope, address));
    }
    Ok(())
}

fn input_only(address: &PropertyAddress) -> Result<()> {
    if address.scope != Scope::Input as u32 {
        return Err(fault(ProtocolFault::InvalidScope, address));
    }
    Ok(())
}

fn check_element(address: &PropertyAddress, count: usize) -> Result<()> {
    if address.element as usize >= count {
        return Err(fault(ProtocolFault::InvalidElement, address));
    }
    Ok(())
}

/// Bus count behind a stream property: input buses for the input scope,
/// output buses for the global and output scopes.
fn stream_bus_count<P: WrappedPlugin>(component: &BridgeComponent<P>, address: &PropertyAddress) -> Result<usize> {
    match Scope::from_raw(address.scope) {
        Some(Scope::Input) => Ok(component.input_buses().len()),
        Some(Scope::Global | Scope::Output) => Ok(component.output_buses().len()),
        None => Err(fault(ProtocolFault::InvalidScope, address)),
    }
}

fn expect_value(address: &PropertyAddress) -> SymbiosisError {
    fault(ProtocolFault::InvalidPropertyValue, address)
}

// =============================================================================
// Entries
// =============================================================================

fn standard_entries<P: WrappedPlugin>() -> Vec<PropertyEntry<P>> {
    vec![
        PropertyEntry {
            id: property_ids::CLASS_INFO,
            name: "ClassInfo",
            shape: PropertyShape::Document,
            access: Access::ReadWrite,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo::read_write(POINTER_SIZE))
            },
            get: Some(|component, _, _| component.capture_class_info().map(PropertyValue::Document)),
            set: Some(|component, address, value| match value {
                PropertyValue::Document(document) => component.restore_class_info(&document),
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::MAKE_CONNECTION,
            name: "MakeConnection",
            shape: PropertyShape::Connection,
            access: Access::WriteOnly,
            info: |component, address| {
                input_only(address)?;
                check_element(address, component.input_buses().len())?;
                Ok(PropertyInfo::write_only(CONNECTION_SIZE))
            },
            get: None,
            set: Some(|component, address, value| match value {
                PropertyValue::Connection(connection) => component.make_connection(address.element as usize, connection),
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::SAMPLE_RATE,
            name: "SampleRate",
            shape: PropertyShape::Float64,
            access: Access::ReadWrite,
            info: |component, address| {
                check_element(address, stream_bus_count(component, address)?)?;
                let mut info = PropertyInfo::read_write(FLOAT64_SIZE);
                info.writable = !component.input_is_connected(address);
                Ok(info)
            },
            get: Some(|component, _, _| Ok(PropertyValue::Float64(component.sample_rate()))),
            set: Some(|component, address, value| match value {
                PropertyValue::Float64(rate) => component.update_sample_rate(rate),
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::PARAMETER_LIST,
            name: "ParameterList",
            shape: PropertyShape::ParameterList,
            access: Access::ReadOnly,
            info: |component, address| {
                let size = if address.scope == Scope::Global as u32 {
                    UINT32_SIZE * component.parameters().len() as u32
                } else {
                    0
                };
                Ok(PropertyInfo::read_only(size))
            },
            get: Some(|component, address, _| {
                let ids = if address.scope == Scope::Global as u32 {
                    component.parameters().ids()
                } else {
                    Vec::new()
                };
                Ok(PropertyValue::ParameterList(ids))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::PARAMETER_INFO,
            name: "ParameterInfo",
            shape: PropertyShape::ParameterInfo,
            access: Access::ReadOnly,
            info: |component, address| {
                global_only(address)?;
                check_element(address, component.plugin().parameter_count())?;
                Ok(PropertyInfo::read_only(PARAMETER_INFO_SIZE))
            },
            get: Some(|component, address, _| {
                component
                    .parameters()
                    .get(address.element as usize)
                    .cloned()
                    .map(PropertyValue::ParameterInfo)
                    .ok_or_else(|| fault(ProtocolFault::InvalidParameter, address))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::STREAM_FORMAT,
            name: "StreamFormat",
            shape: PropertyShape::StreamFormat,
            access: Access::ReadWrite,
            info: |component, address| {
                check_element(address, stream_bus_count(component, address)?)?;
                let mut info = PropertyInfo::read_write(FORMAT_SIZE);
                info.writable = !component.input_is_connected(address);
                Ok(info)
            },
            get: Some(|component, address, _| {
                component
                    .stream_format(address.scope, address.element as usize)
                    .map(PropertyValue::Format)
            }),
            set: Some(|component, address, value| match value {
                PropertyValue::Format(format) => {
                    component.update_format(address.scope, address.element as usize, &format)
                }
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::ELEMENT_COUNT,
            name: "ElementCount",
            shape: PropertyShape::UInt32,
            access: Access::ReadOnly,
            info: |_, _| Ok(PropertyInfo::read_only(UINT32_SIZE)),
            get: Some(|component, address, _| {
                let count = match Scope::from_raw(address.scope) {
                    Some(Scope::Input) => component.input_buses().len(),
                    Some(Scope::Output) => component.output_buses().len(),
                    _ => 0,
                };
                Ok(PropertyValue::UInt32(count as u32))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::LATENCY,
            name: "Latency",
            shape: PropertyShape::Float64,
            access: Access::ReadOnly,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo::read_only(FLOAT64_SIZE))
            },
            get: Some(|component, _, _| {
                component.refresh_latency_and_tail(false);
                Ok(PropertyValue::Float64(component.latency_seconds()))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::SUPPORTED_NUM_CHANNELS,
            name: "SupportedNumChannels",
            shape: PropertyShape::ChannelInfo,
            access: Access::ReadOnly,
            info: |component, address| {
                if !component.buses().supports_uniform_channels() {
                    return Err(fault(ProtocolFault::InvalidProperty, address));
                }
                global_only(address)?;
                Ok(PropertyInfo::read_only(CHANNEL_INFO_SIZE))
            },
            get: Some(|component, _, _| {
                let (inputs, outputs) = component.buses().uniform_channels();
                Ok(PropertyValue::ChannelInfo(AUChannelInfo {
                    in_channels: inputs as i16,
                    out_channels: outputs as i16,
                }))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::MAXIMUM_FRAMES_PER_SLICE,
            name: "MaximumFramesPerSlice",
            shape: PropertyShape::UInt32,
            access: Access::ReadWrite,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo::read_write(UINT32_SIZE))
            },
            get: Some(|component, _, _| Ok(PropertyValue::UInt32(component.max_frames() as u32))),
            set: Some(|component, address, value| match value {
                PropertyValue::UInt32(frames) => component.update_max_frames(frames as usize),
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::PARAMETER_VALUE_STRINGS,
            name: "ParameterValueStrings",
            shape: PropertyShape::ValueStrings,
            access: Access::ReadOnly,
            info: |component, address| {
                global_only(address)?;
                check_element(address, component.plugin().parameter_count())?;
                parameters::value_strings(component.parameters(), address.element)?;
                Ok(PropertyInfo::read_only(POINTER_SIZE))
            },
            get: Some(|component, address, _| {
                parameters::value_strings(component.parameters(), address.element).map(PropertyValue::ValueStrings)
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::TAIL_TIME,
            name: "TailTime",
            shape: PropertyShape::Float64,
            access: Access::ReadOnly,
            info: |component, address| {
                if !component.supports_tail() {
                    return Err(fault(ProtocolFault::InvalidProperty, address));
                }
                global_only(address)?;
                Ok(PropertyInfo::read_only(FLOAT64_SIZE))
            },
            get: Some(|component, _, _| {
                component.refresh_latency_and_tail(false);
                Ok(PropertyValue::Float64(component.tail_seconds()))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::BYPASS_EFFECT,
            name: "BypassEffect",
            shape: PropertyShape::UInt32,
            access: Access::ReadWrite,
            info: |component, address| {
                if !component.supports_bypass() {
                    return Err(fault(ProtocolFault::InvalidProperty, address));
                }
                global_only(address)?;
                Ok(PropertyInfo::read_write(UINT32_SIZE))
            },
            get: Some(|component, _, _| Ok(PropertyValue::UInt32(component.is_bypassed() as u32))),
            set: Some(|component, address, value| match value {
                PropertyValue::UInt32(bypass) => {
                    component.set_bypass(bypass != 0);
                    Ok(())
                }
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::LAST_RENDER_ERROR,
            name: "LastRenderError",
            shape: PropertyShape::UInt32,
            access: Access::ReadOnly,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo::read_only(UINT32_SIZE))
            },
            get: Some(|_, _, _| Ok(PropertyValue::UInt32(0))),
            set: None,
        },
        PropertyEntry {
            id: property_ids::SET_RENDER_CALLBACK,
            name: "SetRenderCallback",
            shape: PropertyShape::RenderCallback,
            access: Access::WriteOnly,
            info: |component, address| {
                input_only(address)?;
                check_element(address, component.input_buses().len())?;
                Ok(PropertyInfo::write_only(RENDER_CALLBACK_SIZE))
            },
            get: None,
            set: Some(|component, address, value| match value {
                PropertyValue::RenderCallback(callback) => {
                    component.set_render_callback(address.element as usize, callback)
                }
                _ => Err(expect_value(address)),
            }),
        },
        PropertyEntry {
            id: property_ids::FACTORY_PRESETS,
            name: "FactoryPresets",
            shape: PropertyShape::FactoryPresets,
            access: Access::ReadOnly,
            info: |component, address| {
                if component.factory_presets().is_empty() {
                    return Err(fault(ProtocolFault::InvalidProperty, address));
                }
                global_only(address)?;
                Ok(PropertyInfo::read_only(POINTER_SIZE))
            },
            get: Some(|component, _, _| Ok(PropertyValue::FactoryPresets(component.factory_preset_entries()))),
            set: None,
        },
        PropertyEntry {
            id: property_ids::HOST_CALLBACKS,
            name: "HostCallbacks",
            shape: PropertyShape::HostCallbacks,
            access: Access::ReadWrite,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo {
                    readable: true,
                    writable: true,
                    min_size: 0,
                    normal_size: HOST_CALLBACKS_SIZE,
                })
            },
            get: Some(|component, _, _| Ok(PropertyValue::HostCallbacks(component.host_callbacks()))),
            set: Some(|component, address, value| match value {
                PropertyValue::HostCallbacks(callbacks) => {
                    component.set_host_callbacks(callbacks);
                    Ok(())
                }
                _ => Err(expect_value(address)),
            }),
        },
        preset_entry(property_ids::CURRENT_PRESET, "CurrentPreset"),
        PropertyEntry {
            id: property_ids::ELEMENT_NAME,
            name: "ElementName",
            shape: PropertyShape::Text,
            access: Access::ReadOnly,
            info: |component, address| {
                if !component.has_bus_names() {
                    return Err(fault(ProtocolFault::InvalidProperty, address));
                }
                match Scope::from_raw(address.scope) {
                    Some(Scope::Input | Scope::Output) => {}
                    _ => return Err(fault(ProtocolFault::InvalidScope, address)),
                }
                if component.bus_name(address.scope, address.element as usize).is_none() {
                    return Err(fault(ProtocolFault::InvalidElement, address));
                }
                Ok(PropertyInfo::read_only(POINTER_SIZE))
            },
            get: Some(|component, address, _| {
                component
                    .bus_name(address.scope, address.element as usize)
                    .map(|name| PropertyValue::Text(name.to_string()))
                    .ok_or_else(|| fault(ProtocolFault::InvalidElement, address))
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::PARAMETER_STRING_FROM_VALUE,
            name: "ParameterStringFromValue",
            shape: PropertyShape::StringFromValue,
            access: Access::ReadOnly,
            info: text_conversion_info,
            get: Some(|component, address, request| match request {
                Some(PropertyValue::StringFromValue { parameter, value }) => component
                    .string_from_value(*parameter, *value)
                    .map(PropertyValue::Text),
                _ => Err(expect_value(address)),
            }),
            set: None,
        },
        preset_entry(property_ids::PRESENT_PRESET, "PresentPreset"),
        PropertyEntry {
            id: property_ids::PARAMETER_VALUE_FROM_STRING,
            name: "ParameterValueFromString",
            shape: PropertyShape::ValueFromString,
            access: Access::ReadOnly,
            info: text_conversion_info,
            get: Some(|component, address, request| match request {
                Some(PropertyValue::ValueFromString { parameter, text }) => component
                    .value_from_string(*parameter, text)
                    .map(PropertyValue::Float32),
                _ => Err(expect_value(address)),
            }),
            set: None,
        },
        PropertyEntry {
            id: property_ids::INSTRUMENT_COUNT,
            name: "InstrumentCount",
            shape: PropertyShape::UInt32,
            access: Access::ReadOnly,
            info: |_, address| {
                global_only(address)?;
                Ok(PropertyInfo::read_only(UINT32_SIZE))
            },
            get: Some(|_, _, _| Ok(PropertyValue::UInt32(0))),
            set: None,
        },
    ]
}

/// Current and present preset share everything but their id.
fn preset_entry<P: WrappedPlugin>(id: u32, name: &'static str) -> PropertyEntry<P> {
    PropertyEntry {
        id,
        name,
        shape: PropertyShape::Preset,
        access: Access::ReadWrite,
        info: |_, address| {
            global_only(address)?;
            Ok(PropertyInfo {
                readable: true,
                writable: true,
                min_size: UINT32_SIZE,
                normal_size: PRESET_SIZE,
            })
        },
        get: Some(|component, _, _| {
            component.update_current_preset();
            Ok(PropertyValue::Preset(component.current_preset().clone()))
        }),
        set: Some(|component, address, value| match value {
            PropertyValue::Preset(entry) => component.select_preset(entry),
            _ => Err(expect_value(address)),
        }),
    }
}

fn text_conversion_info<P: WrappedPlugin>(
    component: &BridgeComponent<P>,
    address: &PropertyAddress,
) -> Result<PropertyInfo> {
    global_only(address)?;
    check_element(address, component.plugin().parameter_count())?;
    if !component.has_extensions() {
        return Err(fault(ProtocolFault::InvalidProperty, address));
    }
    Ok(PropertyInfo::read_only(STRING_VALUE_SIZE))
}
