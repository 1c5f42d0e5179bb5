//! In-memory plug-in for tests.
//!
//! [`MockPlugin`] implements [`WrappedPlugin`] over plain vectors so preset,
//! parameter and render logic can be exercised without loading a binary.
//! Every field is public; tests poke state directly and inspect what the
//! bridge did.

use std::ffi::{c_char, c_void, CStr};

use crate::fourcc;
use crate::midi::MidiEvent;
use crate::plugin::{PinDirection, PinProperties, PluginFlags, TailSize, WrappedPlugin};
use crate::transport::TimeInfo;

/// Vendor extension selectors understood by [`MockPlugin`] when
/// `extensions` is set.
pub const PROBE_SELECTOR: i32 = fourcc!(b"sHi!").as_i32();
pub const INPUT_SILENCE_SELECTOR: i32 = fourcc!(b"sI00").as_i32();
pub const OUTPUT_SILENCE_SELECTOR: i32 = fourcc!(b"sO00").as_i32();
pub const VALUE_TO_STRING_SELECTOR: i32 = fourcc!(b"sV2S").as_i32();
pub const STRING_TO_VALUE_SELECTOR: i32 = fourcc!(b"sS2V").as_i32();

fn default_display(value: f32) -> String {
    format!("{:.2}", value)
}

/// Scriptable [`WrappedPlugin`].
#[derive(Debug, Clone)]
pub struct MockPlugin {
    pub unique_id: i32,
    pub version: i32,
    pub inputs: usize,
    pub outputs: usize,
    pub flags: PluginFlags,
    pub initial_delay: usize,
    pub tail: TailSize,
    /// Parameter values per program.
    pub programs: Vec<Vec<f32>>,
    pub program_names: Vec<String>,
    pub current: usize,
    pub parameter_names: Vec<String>,
    pub parameter_labels: Vec<String>,
    /// Formats a normalized value for display.
    pub display: fn(f32) -> String,
    /// Opaque state returned from `chunk`; empty means "no chunk".
    pub chunk_data: Vec<u8>,
    pub input_pins: Vec<PinProperties>,
    pub output_pins: Vec<PinProperties>,
    pub wants_midi: bool,
    /// Answer the vendor extension selectors.
    pub extensions: bool,
    pub accepts_bypass: bool,

    pub opened: bool,
    pub resumed: bool,
    pub sample_rate: f32,
    pub block_size: usize,
    pub bypassed: bool,
    pub time_info: TimeInfo,
    pub received_events: Vec<MidiEvent>,
    pub process_calls: usize,
    pub last_frame_count: usize,
    pub input_silent_hint: Option<bool>,
    /// Reported by the output-silence query.
    pub output_silent: bool,
    pub connected_pins: Vec<(PinDirection, usize, bool)>,
    pub editor_open: bool,
    pub idle_calls: usize,
    pub begin_set_program_calls: usize,
    pub end_set_program_calls: usize,
}

impl MockPlugin {
    /// A stereo effect with `parameters` zeroed parameters and `programs`
    /// programs named "Program N".
    pub fn new(unique_id: i32, parameters: usize, programs: usize) -> Self {
        Self {
            unique_id,
            version: 1,
            inputs: 2,
            outputs: 2,
            flags: PluginFlags {
                can_replacing: true,
                ..PluginFlags::default()
            },
            initial_delay: 0,
            tail: TailSize::Unsupported,
            programs: vec![vec![0.0; parameters]; programs.max(1)],
            program_names: (0..programs.max(1)).map(|p| format!("Program {}", p)).collect(),
            current: 0,
            parameter_names: (0..parameters).map(|i| format!("Param {}", i)).collect(),
            parameter_labels: vec![String::new(); parameters],
            display: default_display,
            chunk_data: Vec::new(),
            input_pins: Vec::new(),
            output_pins: Vec::new(),
            wants_midi: false,
            extensions: false,
            accepts_bypass: false,
            opened: false,
            resumed: false,
            sample_rate: 44100.0,
            block_size: 1024,
            bypassed: false,
            time_info: TimeInfo::default(),
            received_events: Vec::new(),
            process_calls: 0,
            last_frame_count: 0,
            input_silent_hint: None,
            output_silent: false,
            connected_pins: Vec::new(),
            editor_open: false,
            idle_calls: 0,
            begin_set_program_calls: 0,
            end_set_program_calls: 0,
        }
    }

    pub fn with_io(mut self, inputs: usize, outputs: usize) -> Self {
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }

    fn pins(&self, direction: PinDirection) -> &[PinProperties] {
        match direction {
            PinDirection::Input => &self.input_pins,
            PinDirection::Output => &self.output_pins,
        }
    }
}

impl WrappedPlugin for MockPlugin {
    fn open(&mut self) -> crate::Result<()> {
        debug_assert!(!self.opened);
        self.opened = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn resume(&mut self) {
        debug_assert!(!self.resumed);
        self.resumed = true;
    }

    fn suspend(&mut self) {
        debug_assert!(self.resumed);
        self.resumed = false;
    }

    fn is_resumed(&self) -> bool {
        self.resumed
    }

    fn idle(&mut self) {
        self.idle_calls += 1;
    }

    fn unique_id(&self) -> i32 {
        self.unique_id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn input_count(&self) -> usize {
        self.inputs
    }

    fn output_count(&self) -> usize {
        self.outputs
    }

    fn parameter_count(&self) -> usize {
        self.parameter_names.len()
    }

    fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn flags(&self) -> PluginFlags {
        self.flags
    }

    fn initial_delay(&self) -> usize {
        self.initial_delay
    }

    fn tail_size(&mut self) -> TailSize {
        self.tail
    }

    fn pin_properties(&mut self, direction: PinDirection, pin: usize) -> Option<PinProperties> {
        self.pins(direction).get(pin).cloned()
    }

    fn connect_pin(&mut self, direction: PinDirection, pin: usize, connected: bool) {
        self.connected_pins.push((direction, pin, connected));
    }

    fn wants_midi(&self) -> bool {
        self.wants_midi
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
    }

    fn set_bypass(&mut self, bypass: bool) -> bool {
        if self.accepts_bypass {
            self.bypassed = bypass;
        }
        self.accepts_bypass
    }

    fn current_program(&mut self) -> usize {
        self.current.min(self.programs.len().saturating_sub(1))
    }

    fn set_current_program(&mut self, program: usize) {
        if program < self.programs.len() {
            self.current = program;
        }
    }

    fn current_program_name(&mut self) -> String {
        self.program_names[self.current].clone()
    }

    fn set_current_program_name(&mut self, name: &str) {
        self.program_names[self.current] = name.to_string();
    }

    fn program_name(&mut self, program: usize) -> Option<String> {
        self.program_names.get(program).cloned()
    }

    fn begin_set_program(&mut self) {
        self.begin_set_program_calls += 1;
    }

    fn end_set_program(&mut self) {
        self.end_set_program_calls += 1;
    }

    fn parameter(&mut self, index: usize) -> f32 {
        self.programs[self.current].get(index).copied().unwrap_or(0.0)
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.programs[self.current].get_mut(index) {
            *slot = value.clamp(0.0, 1.0);
        }
    }

    fn parameter_name(&mut self, index: usize) -> String {
        self.parameter_names.get(index).cloned().unwrap_or_default()
    }

    fn parameter_label(&mut self, index: usize) -> String {
        self.parameter_labels.get(index).cloned().unwrap_or_default()
    }

    fn parameter_display(&mut self, index: usize) -> String {
        let value = self.parameter(index);
        (self.display)(value)
    }

    fn string_to_parameter(&mut self, index: usize, text: &str) -> bool {
        match text.trim().parse::<f32>() {
            Ok(value) => {
                self.set_parameter(index, value);
                true
            }
            Err(_) => false,
        }
    }

    fn chunk(&mut self, _is_program: bool) -> Option<Vec<u8>> {
        if self.chunk_data.is_empty() {
            None
        } else {
            Some(self.chunk_data.clone())
        }
    }

    fn set_chunk(&mut self, _is_program: bool, data: &[u8]) -> bool {
        self.chunk_data = data.to_vec();
        true
    }

    fn set_time_info(&mut self, info: &TimeInfo) {
        self.time_info = *info;
    }

    fn process_events(&mut self, events: &[MidiEvent]) {
        self.received_events.extend_from_slice(events);
    }

    /// Output `n` is input `n` plus 0.5; outputs without a matching input
    /// are filled with 0.25.
    unsafe fn process_replacing(&mut self, inputs: &[*mut f32], outputs: &[*mut f32], frame_count: usize) {
        debug_assert!(self.resumed);
        self.process_calls += 1;
        self.last_frame_count = frame_count;
        for (channel, output) in outputs.iter().enumerate() {
            for frame in 0..frame_count {
                // SAFETY: the caller guarantees `frame_count` valid samples
                // behind every pointer; reading before writing keeps
                // in-place processing correct.
                unsafe {
                    let value = match inputs.get(channel) {
                        Some(input) => *input.add(frame) + 0.5,
                        None => 0.25,
                    };
                    *output.add(frame) = value;
                }
            }
        }
    }

    fn vendor_specific(&mut self, selector: i32, index: isize, ptr: *mut c_void, _opt: f32) -> isize {
        if !self.extensions {
            return 0;
        }
        match selector {
            PROBE_SELECTOR => 1,
            INPUT_SILENCE_SELECTOR => {
                self.input_silent_hint = Some(index != 0);
                1
            }
            OUTPUT_SILENCE_SELECTOR => self.output_silent as isize,
            VALUE_TO_STRING_SELECTOR if !ptr.is_null() => {
                // SAFETY: the caller passes a buffer of at least 25 bytes
                // holding a native f32 on entry.
                unsafe {
                    let value = (ptr as *const f32).read_unaligned();
                    let text = format!("{:.1}", value * 100.0);
                    let bytes = text.as_bytes();
                    let len = bytes.len().min(24);
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, len);
                    *(ptr as *mut u8).add(len) = 0;
                }
                1
            }
            STRING_TO_VALUE_SELECTOR if !ptr.is_null() => {
                // SAFETY: the caller passes a NUL-terminated string in a
                // buffer large enough for the f32 result.
                unsafe {
                    let text = CStr::from_ptr(ptr as *const c_char).to_string_lossy().into_owned();
                    match text.trim().parse::<f32>() {
                        Ok(value) => {
                            (ptr as *mut f32).write_unaligned(value / 100.0);
                            1
                        }
                        Err(_) => 0,
                    }
                }
            }
            _ => 0,
        }
    }

    fn editor_size(&mut self) -> Option<(u16, u16)> {
        self.flags.has_editor.then_some((400, 300))
    }

    fn open_editor(&mut self, _parent: *mut c_void) -> bool {
        self.editor_open = self.flags.has_editor;
        self.editor_open
    }

    fn close_editor(&mut self) {
        self.editor_open = false;
    }

    fn is_editor_open(&self) -> bool {
        self.editor_open
    }
}
