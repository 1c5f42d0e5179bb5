//! Audio Unit binary interface.
//!
//! `#[repr(C)]` mirrors of the Core Audio structures that cross the host
//! boundary, plus the numeric property ids and flag words the bridge handles.
//! Layouts match the Core Audio headers so the native shim can pass host
//! pointers straight through.

use std::ffi::{c_char, c_void};

use crate::buffers::AudioBufferList;
use crate::error::OSStatus;

/// Mac `Boolean`.
pub type Boolean = u8;

// =============================================================================
// Scopes and property ids
// =============================================================================

/// `AudioUnitScope` values the bridge serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Scope {
    Global = 0,
    Input = 1,
    Output = 2,
}

impl Scope {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Scope::Global),
            1 => Some(Scope::Input),
            2 => Some(Scope::Output),
            _ => None,
        }
    }
}

/// `AudioUnitPropertyID` values of the property surface.
pub mod property_ids {
    pub const CLASS_INFO: u32 = 0;
    pub const MAKE_CONNECTION: u32 = 1;
    pub const SAMPLE_RATE: u32 = 2;
    pub const PARAMETER_LIST: u32 = 3;
    pub const PARAMETER_INFO: u32 = 4;
    pub const STREAM_FORMAT: u32 = 8;
    pub const ELEMENT_COUNT: u32 = 11;
    pub const LATENCY: u32 = 12;
    pub const SUPPORTED_NUM_CHANNELS: u32 = 13;
    pub const MAXIMUM_FRAMES_PER_SLICE: u32 = 14;
    pub const PARAMETER_VALUE_STRINGS: u32 = 16;
    pub const TAIL_TIME: u32 = 20;
    pub const BYPASS_EFFECT: u32 = 21;
    pub const LAST_RENDER_ERROR: u32 = 22;
    pub const SET_RENDER_CALLBACK: u32 = 23;
    pub const FACTORY_PRESETS: u32 = 24;
    pub const HOST_CALLBACKS: u32 = 27;
    pub const CURRENT_PRESET: u32 = 28;
    pub const ELEMENT_NAME: u32 = 30;
    pub const PARAMETER_STRING_FROM_VALUE: u32 = 33;
    pub const PRESENT_PRESET: u32 = 36;
    pub const PARAMETER_VALUE_FROM_STRING: u32 = 38;
    pub const INSTRUMENT_COUNT: u32 = 1000;
}

/// `AudioUnitRenderActionFlags` bits.
pub mod render_flags {
    pub const PRE_RENDER: u32 = 1 << 2;
    pub const POST_RENDER: u32 = 1 << 3;
    pub const OUTPUT_IS_SILENCE: u32 = 1 << 4;
}

// =============================================================================
// Stream format
// =============================================================================

/// `AudioStreamBasicDescription`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioStreamBasicDescription {
    pub sample_rate: f64,
    pub format_id: u32,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
    pub reserved: u32,
}

const _: () = assert!(std::mem::size_of::<AudioStreamBasicDescription>() == 40);

impl AudioStreamBasicDescription {
    /// `kAudioFormatLinearPCM`.
    pub const FORMAT_LINEAR_PCM: u32 = u32::from_be_bytes(*b"lpcm");
    pub const FLAG_IS_FLOAT: u32 = 1;
    pub const FLAG_IS_BIG_ENDIAN: u32 = 1 << 1;
    pub const FLAG_IS_PACKED: u32 = 1 << 3;
    pub const FLAG_IS_NON_INTERLEAVED: u32 = 1 << 5;

    #[cfg(target_endian = "big")]
    pub const FLAGS_NATIVE_ENDIAN: u32 = Self::FLAG_IS_BIG_ENDIAN;
    #[cfg(target_endian = "little")]
    pub const FLAGS_NATIVE_ENDIAN: u32 = 0;

    /// Canonical format: native-endian, packed, non-interleaved 32-bit float.
    pub fn canonical(sample_rate: f64, channels: u32) -> Self {
        Self {
            sample_rate,
            format_id: Self::FORMAT_LINEAR_PCM,
            format_flags: Self::FLAG_IS_FLOAT
                | Self::FLAGS_NATIVE_ENDIAN
                | Self::FLAG_IS_PACKED
                | Self::FLAG_IS_NON_INTERLEAVED,
            bytes_per_packet: 4,
            frames_per_packet: 1,
            bytes_per_frame: 4,
            channels_per_frame: channels,
            bits_per_channel: 32,
            reserved: 0,
        }
    }
}

// =============================================================================
// Connections and render callbacks
// =============================================================================

/// `AudioUnitConnection`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AudioUnitConnection {
    /// Upstream unit, null to disconnect.
    pub source_audio_unit: *mut c_void,
    pub source_output_number: u32,
    pub dest_input_number: u32,
}

impl Default for AudioUnitConnection {
    fn default() -> Self {
        Self {
            source_audio_unit: std::ptr::null_mut(),
            source_output_number: 0,
            dest_input_number: 0,
        }
    }
}

/// `AURenderCallback`.
pub type AURenderCallback = unsafe extern "C" fn(
    ref_con: *mut c_void,
    action_flags: *mut u32,
    time_stamp: *const AudioTimeStamp,
    bus_number: u32,
    frame_count: u32,
    data: *mut AudioBufferList,
) -> OSStatus;

/// `AURenderCallbackStruct`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RenderCallbackStruct {
    pub input_proc: Option<AURenderCallback>,
    pub input_proc_ref_con: *mut c_void,
}

impl Default for RenderCallbackStruct {
    fn default() -> Self {
        Self {
            input_proc: None,
            input_proc_ref_con: std::ptr::null_mut(),
        }
    }
}

impl RenderCallbackStruct {
    pub fn is_set(&self) -> bool {
        self.input_proc.is_some()
    }
}

/// `AUChannelInfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AUChannelInfo {
    pub in_channels: i16,
    pub out_channels: i16,
}

// =============================================================================
// Host callbacks
// =============================================================================

pub type HostCallbackGetBeatAndTempo =
    unsafe extern "C" fn(host_user_data: *mut c_void, beat: *mut f64, tempo: *mut f64) -> OSStatus;

pub type HostCallbackGetMusicalTimeLocation = unsafe extern "C" fn(
    host_user_data: *mut c_void,
    delta_sample_offset_to_next_beat: *mut u32,
    time_sig_numerator: *mut f32,
    time_sig_denominator: *mut u32,
    current_measure_downbeat: *mut f64,
) -> OSStatus;

pub type HostCallbackGetTransportState = unsafe extern "C" fn(
    host_user_data: *mut c_void,
    is_playing: *mut Boolean,
    transport_state_changed: *mut Boolean,
    current_sample_in_time_line: *mut f64,
    is_cycling: *mut Boolean,
    cycle_start_beat: *mut f64,
    cycle_end_beat: *mut f64,
) -> OSStatus;

pub type HostCallbackGetTransportState2 = unsafe extern "C" fn(
    host_user_data: *mut c_void,
    is_playing: *mut Boolean,
    is_recording: *mut Boolean,
    transport_state_changed: *mut Boolean,
    current_sample_in_time_line: *mut f64,
    is_cycling: *mut Boolean,
    cycle_start_beat: *mut f64,
    cycle_end_beat: *mut f64,
) -> OSStatus;

/// `HostCallbackInfo`. Every procedure is optional.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCallbackInfo {
    pub host_user_data: *mut c_void,
    pub beat_and_tempo_proc: Option<HostCallbackGetBeatAndTempo>,
    pub musical_time_location_proc: Option<HostCallbackGetMusicalTimeLocation>,
    pub transport_state_proc: Option<HostCallbackGetTransportState>,
    pub transport_state_proc2: Option<HostCallbackGetTransportState2>,
}

impl Default for HostCallbackInfo {
    fn default() -> Self {
        Self {
            host_user_data: std::ptr::null_mut(),
            beat_and_tempo_proc: None,
            musical_time_location_proc: None,
            transport_state_proc: None,
            transport_state_proc2: None,
        }
    }
}

/// `AudioUnitPropertyListenerProc`.
pub type PropertyListenerProc = unsafe extern "C" fn(
    ref_con: *mut c_void,
    unit: *mut c_void,
    property: u32,
    scope: u32,
    element: u32,
);

// =============================================================================
// Parameter events
// =============================================================================

pub const PARAMETER_EVENT_IMMEDIATE: u32 = 1;
pub const PARAMETER_EVENT_RAMPED: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterRamp {
    pub start_buffer_offset: i32,
    pub duration_in_frames: u32,
    pub start_value: f32,
    pub end_value: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterImmediate {
    pub buffer_offset: u32,
    pub value: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union ParameterEventValues {
    pub ramp: ParameterRamp,
    pub immediate: ParameterImmediate,
}

/// `AudioUnitParameterEvent`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AudioUnitParameterEvent {
    pub scope: u32,
    pub element: u32,
    pub parameter: u32,
    pub event_type: u32,
    pub values: ParameterEventValues,
}

impl AudioUnitParameterEvent {
    pub fn immediate(parameter: u32, value: f32) -> Self {
        Self {
            scope: Scope::Global as u32,
            element: 0,
            parameter,
            event_type: PARAMETER_EVENT_IMMEDIATE,
            values: ParameterEventValues {
                immediate: ParameterImmediate {
                    buffer_offset: 0,
                    value,
                },
            },
        }
    }

    /// Value of an immediate event.
    pub fn immediate_value(&self) -> Option<f32> {
        if self.event_type == PARAMETER_EVENT_IMMEDIATE {
            // SAFETY: `event_type` selects the immediate variant.
            Some(unsafe { self.values.immediate.value })
        } else {
            None
        }
    }
}

// =============================================================================
// Presets and parameter info
// =============================================================================

/// `AUPreset`: number plus a borrowed name string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AuPresetRecord {
    pub preset_number: i32,
    pub preset_name: *const c_char,
}

const _: () = assert!(std::mem::size_of::<AuPresetRecord>() == 16 || cfg!(target_pointer_width = "32"));

/// Longest parameter or unit name passed to the shim, terminator included.
pub const MAX_PARAMETER_NAME_LENGTH: usize = 128;

/// Parameter metadata in the shape the shim turns into
/// `AudioUnitParameterInfo`.
#[derive(Debug)]
#[repr(C)]
pub struct ParameterInfoRecord {
    pub id: u32,
    pub name: [c_char; MAX_PARAMETER_NAME_LENGTH],
    /// Empty unless `unit` is a custom unit.
    pub unit_name: [c_char; MAX_PARAMETER_NAME_LENGTH],
    pub unit: u32,
    pub min_value: f32,
    pub max_value: f32,
    pub default_value: f32,
    pub flags: u32,
}

impl Default for ParameterInfoRecord {
    fn default() -> Self {
        Self {
            id: 0,
            name: [0; MAX_PARAMETER_NAME_LENGTH],
            unit_name: [0; MAX_PARAMETER_NAME_LENGTH],
            unit: 0,
            min_value: 0.0,
            max_value: 0.0,
            default_value: 0.0,
            flags: 0,
        }
    }
}

// =============================================================================
// Time stamps
// =============================================================================

/// SMPTE time structure.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SMPTETime {
    pub subframes: i16,
    pub subframe_divisor: i16,
    pub counter: u32,
    pub smpte_type: u32,
    pub flags: u32,
    pub hours: i16,
    pub minutes: i16,
    pub seconds: i16,
    pub frames: i16,
}

/// Audio timestamp structure from Core Audio.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioTimeStamp {
    /// Sample time
    pub sample_time: f64,
    /// Host time (Mach absolute time)
    pub host_time: u64,
    /// Rate scalar
    pub rate_scalar: f64,
    /// Word clock time
    pub word_clock_time: u64,
    /// SMPTE time
    pub smpte_time: SMPTETime,
    /// Flags indicating which fields are valid
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl AudioTimeStamp {
    pub const SAMPLE_TIME_VALID: u32 = 1;

    pub fn at_sample(sample_time: f64) -> Self {
        Self {
            sample_time,
            flags: Self::SAMPLE_TIME_VALID,
            ..Self::default()
        }
    }
}
