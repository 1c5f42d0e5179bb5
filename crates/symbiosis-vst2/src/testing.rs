//! Test fixtures: an in-process plug-in built from `extern "C-unwind"` functions
//! and a host that records what the plug-in asked for.

use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::Mutex;

use symbiosis_core::{HostCallbacks, PRODUCT, VENDOR, VENDOR_VERSION};

use crate::aeffect::{
    effect_flags, effect_opcodes, host_opcodes, pin_flags, AEffect, ERect, HostCallbackProc, VstEvents,
    VstMidiEvent, VstPinProperties, VstTimeInfo, EFFECT_MAGIC,
};
use crate::callback::copy_c_string;

pub const FAKE_ID: i32 = i32::from_be_bytes(*b"Fake");

const HOST_CAPABILITIES: [&str; 6] = [
    "sendVstEvents",
    "sendVstMidiEvent",
    "sendVstTimeInfo",
    "reportConnectionChanges",
    "sizeWindow",
    "supplyIdle",
];

/// Records parameter and display requests in arrival order.
#[derive(Default)]
pub struct RecordingHost {
    log: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl HostCallbacks for RecordingHost {
    fn automate(&self, index: usize, value: f32) {
        self.push(format!("automate {} {}", index, value));
    }

    fn begin_edit(&self, index: usize) {
        self.push(format!("begin {}", index));
    }

    fn end_edit(&self, index: usize) {
        self.push(format!("end {}", index));
    }

    fn update_display(&self) {
        self.push("display".to_string());
    }

    fn resize_window(&self, _width: i32, _height: i32) -> bool {
        true
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

/// Private state of the fake plug-in.
pub struct FakeState {
    host: HostCallbackProc,
    parameters: [f32; 4],
    program: i32,
    program_names: [String; 3],
    chunk: Vec<u8>,
    rect: ERect,
    pub version_during_construction: isize,
    pub sample_rate_during_construction: isize,
    pub opened: bool,
    pub resumed: bool,
    pub sample_rate: f32,
    pub block_size: isize,
    pub received_chunk: Vec<u8>,
    pub midi: Vec<[u8; 3]>,
    pub tempo_seen_in_process: f64,
}

#[repr(C)]
struct FakeEffect {
    effect: AEffect,
    state: FakeState,
}

/// Access the fake plug-in's state.
///
/// # Safety
///
/// `effect` must come from [`fake_entry`] and not be closed yet.
pub unsafe fn fake_state<'a>(effect: *mut AEffect) -> &'a mut FakeState {
    // SAFETY: `AEffect` is the first field of the `repr(C)` wrapper.
    unsafe { &mut (*(effect as *mut FakeEffect)).state }
}

unsafe extern "C-unwind" fn fake_dispatcher(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    // SAFETY: only fake instances use this dispatcher.
    let state = unsafe { fake_state(effect) };
    match opcode {
        effect_opcodes::OPEN => {
            state.opened = true;
            0
        }
        effect_opcodes::CLOSE => {
            // SAFETY: allocated by `fake_entry`; the host never touches the
            // instance after closing it.
            drop(unsafe { Box::from_raw(effect as *mut FakeEffect) });
            1
        }
        effect_opcodes::SET_PROGRAM => {
            state.program = value as i32;
            0
        }
        effect_opcodes::GET_PROGRAM => state.program as isize,
        effect_opcodes::SET_PROGRAM_NAME => {
            // SAFETY: the host passes a NUL-terminated name.
            let name = unsafe { CStr::from_ptr(ptr as *const c_char) }.to_string_lossy().into_owned();
            state.program_names[state.program as usize] = name;
            0
        }
        effect_opcodes::GET_PROGRAM_NAME => {
            // SAFETY: the host passes a 1024-byte buffer.
            unsafe { copy_c_string(ptr, &state.program_names[state.program as usize], 1024) };
            0
        }
        effect_opcodes::GET_PROGRAM_NAME_INDEXED => match state.program_names.get(index as usize) {
            Some(name) => {
                // SAFETY: as above.
                unsafe { copy_c_string(ptr, name, 1024) };
                1
            }
            None => 0,
        },
        effect_opcodes::GET_PARAM_NAME => {
            // SAFETY: as above.
            unsafe { copy_c_string(ptr, &format!("Param {}", index), 1024) };
            0
        }
        effect_opcodes::GET_PARAM_LABEL => {
            // SAFETY: as above.
            unsafe { copy_c_string(ptr, if index == 0 { "dB" } else { "" }, 1024) };
            0
        }
        effect_opcodes::GET_PARAM_DISPLAY => {
            let text = format!("{:.2}", state.parameters[index as usize]);
            // SAFETY: as above.
            unsafe { copy_c_string(ptr, &text, 1024) };
            0
        }
        effect_opcodes::STRING_TO_PARAMETER => {
            // SAFETY: the host passes a NUL-terminated string.
            let text = unsafe { CStr::from_ptr(ptr as *const c_char) }.to_string_lossy();
            match text.parse::<f32>() {
                Ok(parsed) => {
                    state.parameters[index as usize] = parsed;
                    1
                }
                Err(_) => 0,
            }
        }
        effect_opcodes::SET_SAMPLE_RATE => {
            state.sample_rate = opt;
            0
        }
        effect_opcodes::SET_BLOCK_SIZE => {
            state.block_size = value;
            0
        }
        effect_opcodes::MAINS_CHANGED => {
            state.resumed = value != 0;
            0
        }
        effect_opcodes::EDIT_GET_RECT => {
            // SAFETY: the host passes a pointer to an `ERect` pointer.
            unsafe { *(ptr as *mut *mut ERect) = &mut state.rect };
            1
        }
        effect_opcodes::EDIT_OPEN => 1,
        effect_opcodes::GET_CHUNK => {
            // SAFETY: the host passes a pointer to a data pointer.
            unsafe { *(ptr as *mut *mut u8) = state.chunk.as_mut_ptr() };
            state.chunk.len() as isize
        }
        effect_opcodes::SET_CHUNK => {
            // SAFETY: the host passes `value` bytes.
            state.received_chunk = unsafe { std::slice::from_raw_parts(ptr as *const u8, value as usize) }.to_vec();
            1
        }
        effect_opcodes::PROCESS_EVENTS => {
            let events = ptr as *const VstEvents;
            // SAFETY: the host passes a list of `num_events` MIDI events.
            unsafe {
                let pointers = ptr::addr_of!((*events).events) as *const *mut VstMidiEvent;
                for i in 0..(*events).num_events as usize {
                    let data = (**pointers.add(i)).midi_data;
                    state.midi.push([data[0], data[1], data[2]]);
                }
            }
            1
        }
        effect_opcodes::GET_INPUT_PROPERTIES | effect_opcodes::GET_OUTPUT_PROPERTIES => {
            let properties = ptr as *mut VstPinProperties;
            let label = if opcode == effect_opcodes::GET_INPUT_PROPERTIES {
                "Main In"
            } else {
                "Main Out"
            };
            // SAFETY: the host passes a properties record.
            unsafe {
                (*properties).flags = pin_flags::IS_ACTIVE | if index == 0 { pin_flags::IS_STEREO } else { 0 };
                copy_c_string((*properties).label.as_mut_ptr() as *mut c_void, label, 64);
            }
            1
        }
        effect_opcodes::SET_BYPASS => 1,
        effect_opcodes::VENDOR_SPECIFIC => (index == i32::from_be_bytes(*b"sHi!")) as isize,
        effect_opcodes::GET_TAIL_SIZE => 4410,
        effect_opcodes::IDLE => {
            let host = state.host;
            let value = state.parameters[0];
            // SAFETY: calling back into the host with our own instance.
            unsafe {
                host(effect, host_opcodes::AUTOMATE, 0, 0, ptr::null_mut(), value);
                host(effect, host_opcodes::UPDATE_DISPLAY, 0, 0, ptr::null_mut(), 0.0);
            }
            0
        }
        _ => 0,
    }
}

unsafe extern "C-unwind" fn fake_set_parameter(effect: *mut AEffect, index: i32, value: f32) {
    // SAFETY: fake instance.
    unsafe { fake_state(effect).parameters[index as usize] = value };
}

unsafe extern "C-unwind" fn fake_get_parameter(effect: *mut AEffect, index: i32) -> f32 {
    // SAFETY: fake instance.
    unsafe { fake_state(effect).parameters[index as usize] }
}

/// Doubles every sample and records the tempo it reads from the host.
unsafe extern "C-unwind" fn fake_process_replacing(
    effect: *mut AEffect,
    inputs: *mut *mut f32,
    outputs: *mut *mut f32,
    frames: i32,
) {
    // SAFETY: fake instance; the host passes two channels of `frames`.
    unsafe {
        let state = fake_state(effect);
        let time = (state.host)(effect, host_opcodes::GET_TIME, 0, 0, ptr::null_mut(), 0.0) as *const VstTimeInfo;
        if let Some(time) = time.as_ref() {
            state.tempo_seen_in_process = time.tempo;
        }
        for channel in 0..2 {
            let input = *inputs.add(channel);
            let output = *outputs.add(channel);
            for frame in 0..frames as usize {
                *output.add(frame) = *input.add(frame) * 2.0;
            }
        }
    }
}

fn fake_effect(host: HostCallbackProc) -> Box<FakeEffect> {
    Box::new(FakeEffect {
        effect: AEffect {
            magic: EFFECT_MAGIC,
            dispatcher: Some(fake_dispatcher),
            process: None,
            set_parameter: Some(fake_set_parameter),
            get_parameter: Some(fake_get_parameter),
            num_programs: 3,
            num_params: 4,
            num_inputs: 2,
            num_outputs: 2,
            flags: effect_flags::CAN_REPLACING | effect_flags::PROGRAM_CHUNKS | effect_flags::HAS_EDITOR,
            resvd1: 0,
            resvd2: 0,
            initial_delay: 64,
            real_qualities: 0,
            off_qualities: 0,
            io_ratio: 1.0,
            object: ptr::null_mut(),
            user: ptr::null_mut(),
            unique_id: FAKE_ID,
            version: 7,
            process_replacing: Some(fake_process_replacing),
            process_double_replacing: None,
            future: [0; 56],
        },
        state: FakeState {
            host,
            parameters: [0.0; 4],
            program: 0,
            program_names: ["Factory 0".into(), "Factory 1".into(), "Factory 2".into()],
            chunk: b"fake-state".to_vec(),
            rect: ERect {
                top: 10,
                left: 20,
                bottom: 210,
                right: 340,
            },
            version_during_construction: 0,
            sample_rate_during_construction: 0,
            opened: false,
            resumed: false,
            sample_rate: 0.0,
            block_size: 0,
            received_chunk: Vec::new(),
            midi: Vec::new(),
            tempo_seen_in_process: 0.0,
        },
    })
}

/// Entry point of the fake plug-in. Calls back before returning, once with
/// no instance and once with its unbound instance.
pub unsafe extern "C-unwind" fn fake_entry(host: HostCallbackProc) -> *mut AEffect {
    // SAFETY: the host callback accepts null instances.
    let version = unsafe { host(ptr::null_mut(), host_opcodes::VERSION, 0, 0, ptr::null_mut(), 0.0) };
    let effect = Box::into_raw(fake_effect(host)) as *mut AEffect;
    // SAFETY: the instance is live; its reserved field is still zero.
    unsafe {
        let sample_rate = host(effect, host_opcodes::GET_SAMPLE_RATE, 0, 0, ptr::null_mut(), 0.0);
        let state = fake_state(effect);
        state.version_during_construction = version;
        state.sample_rate_during_construction = sample_rate;
    }
    effect
}

pub unsafe extern "C-unwind" fn null_entry(_host: HostCallbackProc) -> *mut AEffect {
    ptr::null_mut()
}

pub unsafe extern "C-unwind" fn bad_magic_entry(host: HostCallbackProc) -> *mut AEffect {
    let mut fake = fake_effect(host);
    fake.effect.magic = 0;
    // Leaked; a rejected instance is never closed.
    Box::into_raw(fake) as *mut AEffect
}

/// Dispatcher that faults on tail-size and parameter-name requests and
/// otherwise behaves like the fake plug-in.
unsafe extern "C-unwind" fn faulting_dispatcher(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    match opcode {
        effect_opcodes::GET_TAIL_SIZE | effect_opcodes::GET_PARAM_NAME => panic!("faulting dispatcher"),
        // SAFETY: same instance layout as the fake plug-in.
        _ => unsafe { fake_dispatcher(effect, opcode, index, value, ptr, opt) },
    }
}

unsafe extern "C-unwind" fn faulting_get_parameter(_effect: *mut AEffect, _index: i32) -> f32 {
    panic!("faulting parameter read")
}

/// Scribbles on the first output, then faults.
unsafe extern "C-unwind" fn faulting_process_replacing(
    _effect: *mut AEffect,
    _inputs: *mut *mut f32,
    outputs: *mut *mut f32,
    _frames: i32,
) {
    // SAFETY: the host passes at least one output channel.
    unsafe { **outputs = 9.0 };
    panic!("faulting process")
}

/// The fake plug-in with a dispatcher, parameter read and process call that
/// fault.
pub unsafe extern "C-unwind" fn faulting_entry(host: HostCallbackProc) -> *mut AEffect {
    let mut fake = fake_effect(host);
    fake.effect.dispatcher = Some(faulting_dispatcher);
    fake.effect.get_parameter = Some(faulting_get_parameter);
    fake.effect.process_replacing = Some(faulting_process_replacing);
    Box::into_raw(fake) as *mut AEffect
}

pub unsafe extern "C-unwind" fn faulting_construction_entry(_host: HostCallbackProc) -> *mut AEffect {
    panic!("faulting entry point")
}
