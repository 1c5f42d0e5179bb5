//! VST 2.x binary interface.
//!
//! Layouts and numeric constants of the plug-in side of the interface. Only
//! the subset the adapter uses is declared.

use std::ffi::{c_char, c_void};

/// `'VstP'`, the first field of every valid [`AEffect`].
pub const EFFECT_MAGIC: i32 = i32::from_be_bytes(*b"VstP");

/// Host version reported to plug-ins (2.3).
pub const HOST_VST_VERSION: isize = 2300;

pub type HostCallbackProc =
    unsafe extern "C" fn(effect: *mut AEffect, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize;

// Plug-in functions may unwind; the adapter catches the fault at each call.

pub type DispatcherProc =
    unsafe extern "C-unwind" fn(effect: *mut AEffect, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize;

pub type ProcessProc =
    unsafe extern "C-unwind" fn(effect: *mut AEffect, inputs: *mut *mut f32, outputs: *mut *mut f32, frames: i32);

pub type ProcessDoubleProc =
    unsafe extern "C-unwind" fn(effect: *mut AEffect, inputs: *mut *mut f64, outputs: *mut *mut f64, frames: i32);

pub type SetParameterProc = unsafe extern "C-unwind" fn(effect: *mut AEffect, index: i32, value: f32);

pub type GetParameterProc = unsafe extern "C-unwind" fn(effect: *mut AEffect, index: i32) -> f32;

/// Entry point exported by a plug-in binary.
pub type EntryProc = unsafe extern "C-unwind" fn(host: HostCallbackProc) -> *mut AEffect;

/// Plug-in instance as returned by the entry point.
#[repr(C)]
pub struct AEffect {
    pub magic: i32,
    pub dispatcher: Option<DispatcherProc>,
    /// Accumulating process, deprecated.
    pub process: Option<ProcessProc>,
    pub set_parameter: Option<SetParameterProc>,
    pub get_parameter: Option<GetParameterProc>,
    pub num_programs: i32,
    pub num_params: i32,
    pub num_inputs: i32,
    pub num_outputs: i32,
    pub flags: i32,
    /// Reserved for the host. The callback bridge keeps its instance
    /// binding here.
    pub resvd1: isize,
    pub resvd2: isize,
    pub initial_delay: i32,
    pub real_qualities: i32,
    pub off_qualities: i32,
    pub io_ratio: f32,
    pub object: *mut c_void,
    pub user: *mut c_void,
    pub unique_id: i32,
    pub version: i32,
    pub process_replacing: Option<ProcessProc>,
    pub process_double_replacing: Option<ProcessDoubleProc>,
    pub future: [u8; 56],
}

/// `AEffect::flags` bits.
pub mod effect_flags {
    pub const HAS_EDITOR: i32 = 1;
    pub const CAN_REPLACING: i32 = 1 << 4;
    pub const PROGRAM_CHUNKS: i32 = 1 << 5;
    pub const IS_SYNTH: i32 = 1 << 8;
    pub const NO_SOUND_IN_STOP: i32 = 1 << 9;
}

/// Host-to-plug-in dispatcher opcodes.
pub mod effect_opcodes {
    pub const OPEN: i32 = 0;
    pub const CLOSE: i32 = 1;
    pub const SET_PROGRAM: i32 = 2;
    pub const GET_PROGRAM: i32 = 3;
    pub const SET_PROGRAM_NAME: i32 = 4;
    pub const GET_PROGRAM_NAME: i32 = 5;
    pub const GET_PARAM_LABEL: i32 = 6;
    pub const GET_PARAM_DISPLAY: i32 = 7;
    pub const GET_PARAM_NAME: i32 = 8;
    pub const SET_SAMPLE_RATE: i32 = 10;
    pub const SET_BLOCK_SIZE: i32 = 11;
    pub const MAINS_CHANGED: i32 = 12;
    pub const EDIT_GET_RECT: i32 = 13;
    pub const EDIT_OPEN: i32 = 14;
    pub const EDIT_CLOSE: i32 = 15;
    pub const EDIT_IDLE: i32 = 19;
    pub const GET_CHUNK: i32 = 23;
    pub const SET_CHUNK: i32 = 24;
    pub const PROCESS_EVENTS: i32 = 25;
    pub const STRING_TO_PARAMETER: i32 = 27;
    pub const GET_PROGRAM_NAME_INDEXED: i32 = 29;
    pub const CONNECT_INPUT: i32 = 31;
    pub const CONNECT_OUTPUT: i32 = 32;
    pub const GET_INPUT_PROPERTIES: i32 = 33;
    pub const GET_OUTPUT_PROPERTIES: i32 = 34;
    pub const SET_BYPASS: i32 = 44;
    pub const GET_VENDOR_STRING: i32 = 47;
    pub const GET_PRODUCT_STRING: i32 = 48;
    pub const VENDOR_SPECIFIC: i32 = 50;
    pub const CAN_DO: i32 = 51;
    pub const GET_TAIL_SIZE: i32 = 52;
    pub const IDLE: i32 = 53;
    pub const GET_VST_VERSION: i32 = 58;
    pub const BEGIN_SET_PROGRAM: i32 = 67;
    pub const END_SET_PROGRAM: i32 = 68;
}

/// Plug-in-to-host callback opcodes.
pub mod host_opcodes {
    pub const AUTOMATE: i32 = 0;
    pub const VERSION: i32 = 1;
    pub const CURRENT_ID: i32 = 2;
    pub const IDLE: i32 = 3;
    pub const PIN_CONNECTED: i32 = 4;
    pub const WANT_MIDI: i32 = 6;
    pub const GET_TIME: i32 = 7;
    pub const GET_PARAMETER_QUANTIZATION: i32 = 12;
    pub const NEED_IDLE: i32 = 14;
    pub const SIZE_WINDOW: i32 = 15;
    pub const GET_SAMPLE_RATE: i32 = 16;
    pub const GET_BLOCK_SIZE: i32 = 17;
    pub const GET_VENDOR_STRING: i32 = 32;
    pub const GET_PRODUCT_STRING: i32 = 33;
    pub const GET_VENDOR_VERSION: i32 = 34;
    pub const CAN_DO: i32 = 37;
    pub const GET_LANGUAGE: i32 = 38;
    pub const UPDATE_DISPLAY: i32 = 42;
    pub const BEGIN_EDIT: i32 = 43;
    pub const END_EDIT: i32 = 44;
}

/// `kVstLangEnglish`.
pub const LANGUAGE_ENGLISH: isize = 1;

/// Longest vendor or product string, terminator included.
pub const MAX_VENDOR_STRING: usize = 64;

/// Pin metadata filled by `GET_INPUT_PROPERTIES` / `GET_OUTPUT_PROPERTIES`.
#[repr(C)]
pub struct VstPinProperties {
    pub label: [c_char; 64],
    pub flags: i32,
    pub arrangement_type: i32,
    pub short_label: [c_char; 8],
    pub future: [u8; 48],
}

impl Default for VstPinProperties {
    fn default() -> Self {
        Self {
            label: [0; 64],
            flags: 0,
            arrangement_type: 0,
            short_label: [0; 8],
            future: [0; 48],
        }
    }
}

pub mod pin_flags {
    pub const IS_ACTIVE: i32 = 1;
    pub const IS_STEREO: i32 = 1 << 1;
}

pub const MIDI_EVENT_TYPE: i32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct VstMidiEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub note_length: i32,
    pub note_offset: i32,
    pub midi_data: [u8; 4],
    pub detune: i8,
    pub note_off_velocity: u8,
    pub reserved1: u8,
    pub reserved2: u8,
}

impl VstMidiEvent {
    pub fn new(delta_frames: i32, bytes: [u8; 3]) -> Self {
        Self {
            event_type: MIDI_EVENT_TYPE,
            byte_size: std::mem::size_of::<VstMidiEvent>() as i32,
            delta_frames,
            midi_data: [bytes[0], bytes[1], bytes[2], 0],
            ..Self::default()
        }
    }
}

/// Event list header. The plug-in reads `num_events` pointers starting at
/// `events`, so the list must be backed by a larger allocation.
#[repr(C)]
pub struct VstEvents {
    pub num_events: i32,
    pub reserved: isize,
    pub events: [*mut VstMidiEvent; 2],
}

/// Transport snapshot handed out through `GET_TIME`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct VstTimeInfo {
    pub sample_pos: f64,
    pub sample_rate: f64,
    pub nano_seconds: f64,
    pub ppq_pos: f64,
    pub tempo: f64,
    pub bar_start_pos: f64,
    pub cycle_start_pos: f64,
    pub cycle_end_pos: f64,
    pub time_sig_numerator: i32,
    pub time_sig_denominator: i32,
    pub smpte_offset: i32,
    pub smpte_frame_rate: i32,
    pub samples_to_next_clock: i32,
    pub flags: i32,
}

/// Editor rectangle returned by `EDIT_GET_RECT`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug)]
pub struct ERect {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic() {
        assert_eq!(EFFECT_MAGIC, 0x5673_7450);
    }

    #[test]
    fn test_midi_event_size() {
        assert_eq!(std::mem::size_of::<VstMidiEvent>(), 32);
        assert_eq!(VstMidiEvent::new(3, [0x90, 60, 100]).byte_size, 32);
    }

    #[test]
    fn test_pin_properties_size() {
        assert_eq!(std::mem::size_of::<VstPinProperties>(), 64 + 4 + 4 + 8 + 48);
    }
}
