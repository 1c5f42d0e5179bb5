//! Plugin Adapter over a loaded VST 2.x binary.
//!
//! [`VstPlugin`] owns one plug-in instance and translates every
//! [`WrappedPlugin`] operation into the dispatcher opcode or function pointer
//! the binary interface defines. Strings are read through fixed 1024-byte
//! buffers and cut to [`MAX_NAME_LENGTH`] characters, since many plug-ins
//! overrun the official 8-character limits.
//!
//! Every call into the plug-in goes through [`contain`]: a fault inside the
//! plug-in is logged and the call yields a neutral value instead.

use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use symbiosis_core::{
    truncate_name, HostCallbacks, LoadStage, MidiEvent, PinDirection, PinProperties, PluginFlags,
    Result, SymbiosisError, TailSize, TimeInfo, WrappedPlugin, MAX_MIDI_EVENTS, MAX_NAME_LENGTH,
};

use crate::aeffect::{
    effect_flags, effect_opcodes, pin_flags, AEffect, ERect, EntryProc, VstEvents, VstMidiEvent,
    VstPinProperties, VstTimeInfo,
};
use crate::callback::{construct, CallbackState};

/// Entry point names, tried in order.
pub const ENTRY_SYMBOLS: [&[u8]; 3] = [b"VSTPluginMain\0", b"main_macho\0", b"main\0"];

const STRING_BUFFER_SIZE: usize = 1024;

/// Run one call into the plug-in, yielding `neutral` if it faults.
fn contain<T>(call: fmt::Arguments<'_>, neutral: T, foreign: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(foreign)).unwrap_or_else(|_| {
        log::error!("Plug-in faulted in {}", call);
        neutral
    })
}

/// Event list with room for a full block of events.
#[repr(C)]
struct EventList {
    num_events: i32,
    reserved: isize,
    events: [*mut VstMidiEvent; MAX_MIDI_EVENTS],
}

/// One loaded VST 2.x plug-in instance.
pub struct VstPlugin {
    effect: NonNull<AEffect>,
    state: Box<CallbackState>,
    is_open: bool,
    is_resumed: bool,
    block_size: usize,
    midi_events: Box<[VstMidiEvent; MAX_MIDI_EVENTS]>,
    event_list: Box<EventList>,
    path: PathBuf,
    // Dropped after the instance is closed.
    _library: Option<libloading::Library>,
}

impl VstPlugin {
    /// Load the plug-in binary at `path` (a file or a `.vst` bundle) and
    /// instantiate it.
    ///
    /// `sample_rate` and `block_size` are what the plug-in sees if it asks
    /// during construction.
    pub fn load(path: &Path, host: Arc<dyn HostCallbacks>, sample_rate: f32, block_size: usize) -> Result<Self> {
        let binary = resolve_binary(path)?;
        log::debug!("Loading plug-in binary {}", binary.display());

        // SAFETY: loading runs the library's initializers; the path names a
        // plug-in binary the bundle configuration points at.
        let library = unsafe { libloading::Library::new(&binary) }.map_err(|e| SymbiosisError::LoadFailed {
            path: binary.clone(),
            stage: LoadStage::Opening,
            reason: e.to_string(),
        })?;

        let entry = ENTRY_SYMBOLS
            .iter()
            // SAFETY: the symbol type matches the plug-in entry point.
            .find_map(|name| unsafe { library.get::<EntryProc>(name) }.ok().map(|symbol| *symbol))
            .ok_or_else(|| SymbiosisError::LoadFailed {
                path: binary.clone(),
                stage: LoadStage::EntryPoint,
                reason: "no VSTPluginMain, main_macho or main symbol".to_string(),
            })?;

        Self::instantiate(entry, host, sample_rate, block_size, binary, Some(library))
    }

    /// Instantiate a plug-in from an entry point that is already linked in.
    pub fn from_entry(entry: EntryProc, host: Arc<dyn HostCallbacks>, sample_rate: f32, block_size: usize) -> Result<Self> {
        Self::instantiate(entry, host, sample_rate, block_size, PathBuf::new(), None)
    }

    fn instantiate(
        entry: EntryProc,
        host: Arc<dyn HostCallbacks>,
        sample_rate: f32,
        block_size: usize,
        path: PathBuf,
        library: Option<libloading::Library>,
    ) -> Result<Self> {
        let state = Box::new(CallbackState::new(host, sample_rate, block_size));
        let effect = construct(entry, &state).map_err(|reason| SymbiosisError::LoadFailed {
            path: path.clone(),
            stage: LoadStage::Instantiation,
            reason,
        })?;
        let effect = NonNull::new(effect).ok_or_else(|| SymbiosisError::LoadFailed {
            path: path.clone(),
            stage: LoadStage::Instantiation,
            reason: "entry point returned no instance".to_string(),
        })?;

        let plugin = Self {
            effect,
            state,
            is_open: false,
            is_resumed: false,
            block_size,
            midi_events: Box::new([VstMidiEvent::default(); MAX_MIDI_EVENTS]),
            event_list: Box::new(EventList {
                num_events: 0,
                reserved: 0,
                events: [ptr::null_mut(); MAX_MIDI_EVENTS],
            }),
            path,
            _library: library,
        };

        plugin.validate()?;
        log::info!(
            "Instantiated plug-in {:#010x} v{} ({} in, {} out, {} parameters, {} programs)",
            plugin.unique_id(),
            plugin.version(),
            plugin.input_count(),
            plugin.output_count(),
            plugin.parameter_count(),
            plugin.program_count()
        );
        Ok(plugin)
    }

    fn validate(&self) -> Result<()> {
        let effect = self.raw();
        let reason = if effect.dispatcher.is_none() {
            Some("instance has no dispatcher")
        } else if effect.num_params < 0 || effect.num_programs < 0 || effect.num_inputs < 0 || effect.num_outputs < 0
        {
            Some("instance reports negative counts")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(SymbiosisError::LoadFailed {
                path: self.path.clone(),
                stage: LoadStage::Validation,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Path of the loaded binary; empty for linked-in entry points.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn raw(&self) -> &AEffect {
        // SAFETY: the instance stays alive until `Drop` closes it.
        unsafe { self.effect.as_ref() }
    }

    #[cfg(test)]
    pub(crate) fn effect_ptr(&self) -> *mut AEffect {
        self.effect.as_ptr()
    }

    #[cfg(test)]
    pub(crate) fn published_time_info(&self) -> VstTimeInfo {
        self.state.time_info()
    }

    fn dispatch(&self, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        let Some(dispatcher) = self.raw().dispatcher else {
            return 0;
        };
        let effect = self.effect.as_ptr();
        contain(format_args!("dispatcher opcode {}", opcode), 0, || {
            // SAFETY: the instance is live and the dispatcher follows the
            // binary interface.
            unsafe { dispatcher(effect, opcode, index, value, ptr, opt) }
        })
    }

    fn read_string(&self, opcode: i32, index: i32, value: isize) -> String {
        let mut buffer = [0u8; STRING_BUFFER_SIZE];
        self.dispatch(opcode, index, value, buffer.as_mut_ptr() as *mut c_void, 0.0);
        // Keep the buffer terminated even if the plug-in overran it.
        buffer[STRING_BUFFER_SIZE - 1] = 0;
        let text = CStr::from_bytes_until_nul(&buffer)
            .map(|text| text.to_string_lossy().into_owned())
            .unwrap_or_default();
        truncate_name(&text)
    }

    fn has_flag(&self, flag: i32) -> bool {
        self.raw().flags & flag != 0
    }

    fn check_parameter(&self, index: usize) -> bool {
        let valid = index < self.parameter_count();
        if !valid {
            log::warn!("Parameter index {} out of range", index);
        }
        valid
    }
}

impl Drop for VstPlugin {
    fn drop(&mut self) {
        if self.state.editor_open() {
            self.close_editor();
        }
        if self.is_resumed {
            self.suspend();
        }
        // Closing destroys the instance.
        self.dispatch(effect_opcodes::CLOSE, 0, 0, ptr::null_mut(), 0.0);
        log::debug!("Closed plug-in instance");
    }
}

/// Locate the executable inside a `.vst` bundle, or accept a plain file.
pub fn resolve_binary(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(SymbiosisError::LoadFailed {
                path: path.to_path_buf(),
                stage: LoadStage::Opening,
                reason: "no such file".to_string(),
            })
        };
    }

    let executables = path.join("Contents").join("MacOS");
    if let Some(stem) = path.file_stem() {
        let candidate = executables.join(stem);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    std::fs::read_dir(&executables)
        .ok()
        .and_then(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .find(|candidate| candidate.is_file())
        })
        .ok_or_else(|| SymbiosisError::LoadFailed {
            path: path.to_path_buf(),
            stage: LoadStage::Opening,
            reason: "bundle has no executable".to_string(),
        })
}

fn to_vst_time_info(info: &TimeInfo) -> VstTimeInfo {
    VstTimeInfo {
        sample_pos: info.sample_pos,
        sample_rate: info.sample_rate,
        nano_seconds: 0.0,
        ppq_pos: info.ppq_pos,
        tempo: info.tempo,
        bar_start_pos: info.bar_start_pos,
        cycle_start_pos: info.cycle_start_pos,
        cycle_end_pos: info.cycle_end_pos,
        time_sig_numerator: info.time_sig_numerator,
        time_sig_denominator: info.time_sig_denominator,
        smpte_offset: 0,
        smpte_frame_rate: 0,
        samples_to_next_clock: 0,
        flags: info.flags.0,
    }
}

impl WrappedPlugin for VstPlugin {
    fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Err(SymbiosisError::Foreign("plug-in is already open".to_string()));
        }
        self.dispatch(effect_opcodes::OPEN, 0, 0, ptr::null_mut(), 0.0);
        self.is_open = true;
        let sample_rate = self.state.sample_rate();
        self.set_sample_rate(sample_rate);
        if self.block_size != 0 {
            self.set_block_size(self.block_size);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn resume(&mut self) {
        debug_assert!(self.is_open && !self.is_resumed, "resume while running");
        self.dispatch(effect_opcodes::MAINS_CHANGED, 0, 1, ptr::null_mut(), 0.0);
        self.is_resumed = true;
    }

    fn suspend(&mut self) {
        debug_assert!(self.is_resumed, "suspend while suspended");
        self.dispatch(effect_opcodes::MAINS_CHANGED, 0, 0, ptr::null_mut(), 0.0);
        self.is_resumed = false;
    }

    fn is_resumed(&self) -> bool {
        self.is_resumed
    }

    fn idle(&mut self) {
        self.dispatch(effect_opcodes::IDLE, 0, 0, ptr::null_mut(), 0.0);
        if self.state.editor_open() {
            self.dispatch(effect_opcodes::EDIT_IDLE, 0, 0, ptr::null_mut(), 0.0);
        }
    }

    fn unique_id(&self) -> i32 {
        self.raw().unique_id
    }

    fn version(&self) -> i32 {
        self.raw().version
    }

    fn input_count(&self) -> usize {
        self.raw().num_inputs.max(0) as usize
    }

    fn output_count(&self) -> usize {
        self.raw().num_outputs.max(0) as usize
    }

    fn parameter_count(&self) -> usize {
        self.raw().num_params.max(0) as usize
    }

    fn program_count(&self) -> usize {
        self.raw().num_programs.max(0) as usize
    }

    fn flags(&self) -> PluginFlags {
        PluginFlags {
            has_editor: self.has_flag(effect_flags::HAS_EDITOR),
            can_replacing: self.has_flag(effect_flags::CAN_REPLACING),
            program_chunks: self.has_flag(effect_flags::PROGRAM_CHUNKS),
            is_synth: self.has_flag(effect_flags::IS_SYNTH),
            no_sound_in_stop: self.has_flag(effect_flags::NO_SOUND_IN_STOP),
        }
    }

    fn initial_delay(&self) -> usize {
        self.raw().initial_delay.max(0) as usize
    }

    fn tail_size(&mut self) -> TailSize {
        TailSize::from_raw(self.dispatch(effect_opcodes::GET_TAIL_SIZE, 0, 0, ptr::null_mut(), 0.0))
    }

    fn pin_properties(&mut self, direction: PinDirection, pin: usize) -> Option<PinProperties> {
        let opcode = match direction {
            PinDirection::Input => effect_opcodes::GET_INPUT_PROPERTIES,
            PinDirection::Output => effect_opcodes::GET_OUTPUT_PROPERTIES,
        };
        let mut properties = VstPinProperties::default();
        let supported = self.dispatch(opcode, pin as i32, 0, &mut properties as *mut _ as *mut c_void, 0.0) != 0;
        if !supported {
            return None;
        }
        properties.label[properties.label.len() - 1] = 0;
        // SAFETY: the label was just terminated.
        let label = unsafe { CStr::from_ptr(properties.label.as_ptr()) }.to_string_lossy().into_owned();
        Some(PinProperties {
            is_stereo: properties.flags & pin_flags::IS_STEREO != 0,
            label,
        })
    }

    fn connect_pin(&mut self, direction: PinDirection, pin: usize, connected: bool) {
        let opcode = match direction {
            PinDirection::Input => effect_opcodes::CONNECT_INPUT,
            PinDirection::Output => effect_opcodes::CONNECT_OUTPUT,
        };
        self.dispatch(opcode, pin as i32, connected as isize, ptr::null_mut(), 0.0);
    }

    fn wants_midi(&self) -> bool {
        self.state.wants_midi()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.state.set_sample_rate(sample_rate);
        if self.is_open {
            self.dispatch(effect_opcodes::SET_SAMPLE_RATE, 0, 0, ptr::null_mut(), sample_rate);
        }
    }

    fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.state.set_block_size(block_size);
        if self.is_open {
            self.dispatch(effect_opcodes::SET_BLOCK_SIZE, 0, block_size as isize, ptr::null_mut(), 0.0);
        }
    }

    fn set_bypass(&mut self, bypass: bool) -> bool {
        self.dispatch(effect_opcodes::SET_BYPASS, 0, bypass as isize, ptr::null_mut(), 0.0) != 0
    }

    fn current_program(&mut self) -> usize {
        let program = self.dispatch(effect_opcodes::GET_PROGRAM, 0, 0, ptr::null_mut(), 0.0);
        (program.max(0) as usize).min(self.program_count().saturating_sub(1))
    }

    fn set_current_program(&mut self, program: usize) {
        debug_assert!(program < self.program_count().max(1));
        self.dispatch(effect_opcodes::SET_PROGRAM, 0, program as isize, ptr::null_mut(), 0.0);
    }

    fn current_program_name(&mut self) -> String {
        self.read_string(effect_opcodes::GET_PROGRAM_NAME, 0, 0)
    }

    fn set_current_program_name(&mut self, name: &str) {
        let name: String = truncate_name(name).chars().filter(|c| *c != '\0').collect();
        if let Ok(name) = CString::new(name) {
            self.dispatch(effect_opcodes::SET_PROGRAM_NAME, 0, 0, name.as_ptr() as *mut c_void, 0.0);
        }
    }

    fn program_name(&mut self, program: usize) -> Option<String> {
        let mut buffer = [0u8; STRING_BUFFER_SIZE];
        let known = self.dispatch(
            effect_opcodes::GET_PROGRAM_NAME_INDEXED,
            program as i32,
            -1,
            buffer.as_mut_ptr() as *mut c_void,
            0.0,
        ) != 0;
        if !known {
            return None;
        }
        buffer[STRING_BUFFER_SIZE - 1] = 0;
        let text = CStr::from_bytes_until_nul(&buffer).ok()?.to_string_lossy();
        Some(text.chars().take(MAX_NAME_LENGTH).collect())
    }

    fn begin_set_program(&mut self) {
        self.dispatch(effect_opcodes::BEGIN_SET_PROGRAM, 0, 0, ptr::null_mut(), 0.0);
    }

    fn end_set_program(&mut self) {
        self.dispatch(effect_opcodes::END_SET_PROGRAM, 0, 0, ptr::null_mut(), 0.0);
    }

    fn parameter(&mut self, index: usize) -> f32 {
        if !self.check_parameter(index) {
            return 0.0;
        }
        let Some(get_parameter) = self.raw().get_parameter else {
            return 0.0;
        };
        let effect = self.effect.as_ptr();
        contain(format_args!("get parameter {}", index), 0.0, || {
            // SAFETY: live instance, index in range.
            unsafe { get_parameter(effect, index as i32) }
        })
    }

    fn set_parameter(&mut self, index: usize, value: f32) {
        if !self.check_parameter(index) {
            return;
        }
        if let Some(set_parameter) = self.raw().set_parameter {
            let effect = self.effect.as_ptr();
            contain(format_args!("set parameter {}", index), (), || {
                // SAFETY: live instance, index in range.
                unsafe { set_parameter(effect, index as i32, value.clamp(0.0, 1.0)) }
            });
        }
    }

    fn parameter_name(&mut self, index: usize) -> String {
        self.read_string(effect_opcodes::GET_PARAM_NAME, index as i32, -1)
    }

    fn parameter_label(&mut self, index: usize) -> String {
        self.read_string(effect_opcodes::GET_PARAM_LABEL, index as i32, -1)
    }

    fn parameter_display(&mut self, index: usize) -> String {
        self.read_string(effect_opcodes::GET_PARAM_DISPLAY, index as i32, -1)
    }

    fn string_to_parameter(&mut self, index: usize, text: &str) -> bool {
        match CString::new(text) {
            Ok(text) => {
                self.dispatch(effect_opcodes::STRING_TO_PARAMETER, index as i32, 0, text.as_ptr() as *mut c_void, 0.0)
                    != 0
            }
            Err(_) => false,
        }
    }

    fn chunk(&mut self, is_program: bool) -> Option<Vec<u8>> {
        let mut data: *mut c_void = ptr::null_mut();
        let size = self.dispatch(
            effect_opcodes::GET_CHUNK,
            is_program as i32,
            0,
            &mut data as *mut *mut c_void as *mut c_void,
            0.0,
        );
        if size <= 0 || data.is_null() {
            return None;
        }
        // SAFETY: the plug-in owns `size` bytes at `data` until its next call.
        Some(unsafe { std::slice::from_raw_parts(data as *const u8, size as usize) }.to_vec())
    }

    fn set_chunk(&mut self, is_program: bool, data: &[u8]) -> bool {
        self.dispatch(
            effect_opcodes::SET_CHUNK,
            is_program as i32,
            data.len() as isize,
            data.as_ptr() as *mut c_void,
            0.0,
        ) != 0
    }

    fn set_time_info(&mut self, info: &TimeInfo) {
        self.state.publish_time_info(to_vst_time_info(info));
    }

    fn process_events(&mut self, events: &[MidiEvent]) {
        if events.is_empty() {
            return;
        }
        let count = events.len().min(MAX_MIDI_EVENTS);
        for (slot, event) in self.midi_events.iter_mut().zip(&events[..count]) {
            *slot = VstMidiEvent::new(event.delta_frames as i32, event.bytes());
        }
        for (slot, event) in self.event_list.events.iter_mut().zip(self.midi_events.iter_mut()).take(count) {
            *slot = event as *mut VstMidiEvent;
        }
        self.event_list.num_events = count as i32;
        let list = &mut *self.event_list as *mut EventList as *mut VstEvents;
        self.dispatch(effect_opcodes::PROCESS_EVENTS, 0, 0, list as *mut c_void, 0.0);
    }

    unsafe fn process_replacing(&mut self, inputs: &[*mut f32], outputs: &[*mut f32], frame_count: usize) {
        debug_assert!(self.is_resumed, "process while suspended");
        let raw = self.raw();
        let effect = self.effect.as_ptr();
        let inputs_ptr = inputs.as_ptr() as *mut *mut f32;
        let outputs_ptr = outputs.as_ptr() as *mut *mut f32;

        let process = if let (true, Some(process)) = (self.has_flag(effect_flags::CAN_REPLACING), raw.process_replacing) {
            process
        } else if let Some(process) = raw.process {
            // Accumulating plug-ins add into the output.
            for output in outputs {
                // SAFETY: each output holds `frame_count` samples.
                unsafe { ptr::write_bytes(*output, 0, frame_count) };
            }
            process
        } else {
            log::error!("Plug-in has no process function");
            return;
        };

        let completed = contain(format_args!("process"), false, || {
            // SAFETY: the caller guarantees the pointer arrays and buffers.
            unsafe { process(effect, inputs_ptr, outputs_ptr, frame_count as i32) };
            true
        });
        if !completed {
            // A faulted block is delivered as silence.
            for output in outputs {
                // SAFETY: each output holds `frame_count` samples.
                unsafe { ptr::write_bytes(*output, 0, frame_count) };
            }
        }
    }

    fn vendor_specific(&mut self, selector: i32, index: isize, ptr: *mut c_void, opt: f32) -> isize {
        self.dispatch(effect_opcodes::VENDOR_SPECIFIC, selector, index, ptr, opt)
    }

    fn editor_size(&mut self) -> Option<(u16, u16)> {
        if !self.flags().has_editor {
            return None;
        }
        let mut rect: *mut ERect = ptr::null_mut();
        self.dispatch(
            effect_opcodes::EDIT_GET_RECT,
            0,
            0,
            &mut rect as *mut *mut ERect as *mut c_void,
            0.0,
        );
        // SAFETY: a non-null rectangle is owned by the plug-in and valid
        // until its next call.
        let rect = unsafe { rect.as_ref() }?;
        let width = (rect.right - rect.left).max(0) as u16;
        let height = (rect.bottom - rect.top).max(0) as u16;
        Some((width, height))
    }

    fn open_editor(&mut self, parent: *mut c_void) -> bool {
        if !self.flags().has_editor || parent.is_null() || self.state.editor_open() {
            return false;
        }
        // Resize requests may arrive while the editor opens.
        self.state.set_editor_open(true);
        let opened = self.dispatch(effect_opcodes::EDIT_OPEN, 0, 0, parent, 0.0) != 0;
        if !opened {
            log::warn!("Plug-in could not open its editor");
            self.state.set_editor_open(false);
        }
        opened
    }

    fn close_editor(&mut self) {
        if self.state.editor_open() {
            self.dispatch(effect_opcodes::EDIT_CLOSE, 0, 0, ptr::null_mut(), 0.0);
            self.state.set_editor_open(false);
        }
    }

    fn is_editor_open(&self) -> bool {
        self.state.editor_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        bad_magic_entry, fake_entry, fake_state, faulting_construction_entry, faulting_entry, null_entry,
        RecordingHost, FAKE_ID,
    };
    use approx::assert_abs_diff_eq;
    use symbiosis_core::{preset, LoadOutcome, TimeInfoFlags};

    fn load() -> (VstPlugin, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let mut plugin = VstPlugin::from_entry(fake_entry, host.clone(), 48000.0, 256).unwrap();
        plugin.open().unwrap();
        (plugin, host)
    }

    #[test]
    fn test_construction_callbacks_reach_pending_state() {
        let (plugin, _) = load();
        // SAFETY: the fake instance is alive while `plugin` is.
        let fake = unsafe { fake_state(plugin.effect_ptr()) };
        assert_eq!(fake.version_during_construction, 2300);
        assert_eq!(fake.sample_rate_during_construction, 48000);
        assert_eq!(fake.sample_rate, 48000.0);
        assert_eq!(fake.block_size, 256);
        assert!(fake.opened);
    }

    #[test]
    fn test_load_failures() {
        let host: Arc<dyn HostCallbacks> = Arc::new(RecordingHost::default());
        for entry in [null_entry as EntryProc, bad_magic_entry] {
            match VstPlugin::from_entry(entry, host.clone(), 44100.0, 512) {
                Err(SymbiosisError::LoadFailed { stage, .. }) => assert_eq!(stage, LoadStage::Instantiation),
                _ => panic!("expected a load failure"),
            }
        }
    }

    #[test]
    fn test_fault_in_entry_point_fails_the_load() {
        let host: Arc<dyn HostCallbacks> = Arc::new(RecordingHost::default());
        assert!(matches!(
            VstPlugin::from_entry(faulting_construction_entry, host, 44100.0, 512),
            Err(SymbiosisError::LoadFailed { stage: LoadStage::Instantiation, .. })
        ));

        // Construction is still possible afterwards.
        let (mut plugin, _) = load();
        plugin.set_parameter(0, 0.5);
        assert_eq!(plugin.parameter(0), 0.5);
    }

    #[test]
    fn test_faults_in_plugin_calls_yield_neutral_values() {
        let host: Arc<dyn HostCallbacks> = Arc::new(RecordingHost::default());
        let mut plugin = VstPlugin::from_entry(faulting_entry, host, 44100.0, 64).unwrap();
        plugin.open().unwrap();

        assert_eq!(plugin.parameter(0), 0.0);
        assert_eq!(plugin.tail_size(), TailSize::Unsupported);
        assert_eq!(plugin.parameter_name(1), "");

        // The instance keeps working after each fault.
        plugin.set_parameter(2, 0.5);
        assert_eq!(plugin.parameter_display(2), "0.50");
        plugin.set_current_program(1);
        assert_eq!(plugin.current_program(), 1);
        assert_eq!(plugin.program_name(0).as_deref(), Some("Factory 0"));
    }

    #[test]
    fn test_fault_during_process_delivers_silence() {
        let host: Arc<dyn HostCallbacks> = Arc::new(RecordingHost::default());
        let mut plugin = VstPlugin::from_entry(faulting_entry, host, 44100.0, 64).unwrap();
        plugin.open().unwrap();
        plugin.resume();

        let mut left = vec![0.25f32; 8];
        let mut right = vec![0.25f32; 8];
        let channels = [left.as_mut_ptr(), right.as_mut_ptr()];
        // SAFETY: two in-place channels of 8 samples.
        unsafe { plugin.process_replacing(&channels, &channels, 8) };
        assert!(left.iter().chain(&right).all(|sample| *sample == 0.0));

        // Still resumable and closable.
        plugin.suspend();
        // SAFETY: the instance is alive while `plugin` is.
        assert!(!unsafe { fake_state(plugin.effect_ptr()) }.resumed);
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let host: Arc<dyn HostCallbacks> = Arc::new(RecordingHost::default());
        let missing = dir.path().join("Nothing.vst");
        assert!(matches!(
            VstPlugin::load(&missing, host, 44100.0, 512),
            Err(SymbiosisError::LoadFailed { stage: LoadStage::Opening, .. })
        ));
    }

    #[test]
    fn test_bundle_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Delay.vst");
        let executables = bundle.join("Contents").join("MacOS");
        std::fs::create_dir_all(&executables).unwrap();
        std::fs::write(executables.join("Delay"), b"").unwrap();
        assert_eq!(resolve_binary(&bundle).unwrap(), executables.join("Delay"));

        let empty = dir.path().join("Empty.vst");
        std::fs::create_dir_all(empty.join("Contents").join("MacOS")).unwrap();
        assert!(resolve_binary(&empty).is_err());
    }

    #[test]
    fn test_shape_and_flags() {
        let (mut plugin, _) = load();
        assert_eq!(plugin.unique_id(), FAKE_ID);
        assert_eq!(plugin.version(), 7);
        assert_eq!((plugin.input_count(), plugin.output_count()), (2, 2));
        assert_eq!(plugin.parameter_count(), 4);
        assert_eq!(plugin.program_count(), 3);
        assert_eq!(plugin.initial_delay(), 64);
        assert_eq!(plugin.tail_size(), TailSize::Samples(4410));
        let flags = plugin.flags();
        assert!(flags.can_replacing && flags.program_chunks && flags.has_editor);
        assert!(!flags.is_synth);
        let pin = plugin.pin_properties(PinDirection::Output, 0).unwrap();
        assert!(pin.is_stereo);
        assert_eq!(pin.label, "Main Out");
        assert_eq!(plugin.editor_size(), Some((320, 200)));
    }

    #[test]
    fn test_parameters_and_strings() {
        let (mut plugin, _) = load();
        plugin.set_parameter(1, 0.25);
        assert_eq!(plugin.parameter(1), 0.25);
        plugin.set_parameter(1, 3.0);
        assert_eq!(plugin.parameter(1), 1.0);
        assert_eq!(plugin.parameter(99), 0.0);
        assert_eq!(plugin.parameter_name(2), "Param 2");
        assert_eq!(plugin.parameter_label(0), "dB");
        plugin.set_parameter(0, 0.5);
        assert_eq!(plugin.parameter_display(0), "0.50");
        assert!(plugin.string_to_parameter(3, "0.75"));
        assert_eq!(plugin.parameter(3), 0.75);
    }

    #[test]
    fn test_programs() {
        let (mut plugin, _) = load();
        plugin.set_current_program(2);
        assert_eq!(plugin.current_program(), 2);
        plugin.set_current_program_name("A name that is far longer than allowed");
        assert_eq!(plugin.current_program_name(), "A name that is far longe");
        assert_eq!(plugin.program_name(0).as_deref(), Some("Factory 0"));
        assert_eq!(plugin.program_name(5), None);
    }

    #[test]
    fn test_chunks_and_presets() {
        let (mut plugin, _) = load();
        assert_eq!(plugin.chunk(true).unwrap(), b"fake-state".to_vec());
        let bytes = preset::create_program_preset(&mut plugin).unwrap();
        assert_eq!(preset::load_preset(&mut plugin, &bytes).unwrap(), LoadOutcome::Perfect);
        // SAFETY: fake instance alive.
        let fake = unsafe { fake_state(plugin.effect_ptr()) };
        assert_eq!(fake.received_chunk, b"fake-state".to_vec());
    }

    #[test]
    fn test_process_and_events() {
        let (mut plugin, _) = load();
        plugin.resume();
        let mut time = TimeInfo::default();
        time.begin_block(1024.0, 48000.0);
        time.tempo = 96.0;
        time.flags.insert(TimeInfoFlags::TEMPO_VALID);
        plugin.set_time_info(&time);
        assert_eq!(plugin.published_time_info().tempo, 96.0);

        plugin.process_events(&[MidiEvent::new(0, 0x90, 60, 100), MidiEvent::new(12, 0x80, 60, 0)]);

        let mut left = vec![0.25f32; 16];
        let mut right = vec![-0.5f32; 16];
        let channels = [left.as_mut_ptr(), right.as_mut_ptr()];
        // SAFETY: two in-place channels of 16 samples.
        unsafe { plugin.process_replacing(&channels, &channels, 16) };
        assert_abs_diff_eq!(left[15], 0.5);
        assert_abs_diff_eq!(right[0], -1.0);

        // SAFETY: fake instance alive.
        let fake = unsafe { fake_state(plugin.effect_ptr()) };
        assert_eq!(fake.midi, vec![[0x90, 60, 100], [0x80, 60, 0]]);
        assert_eq!(fake.tempo_seen_in_process, 96.0);
        assert!(fake.resumed);
        plugin.suspend();
        assert!(!unsafe { fake_state(plugin.effect_ptr()) }.resumed);
    }

    #[test]
    fn test_callbacks_after_binding_reach_host() {
        let (mut plugin, host) = load();
        plugin.set_parameter(0, 0.5);
        plugin.idle();
        assert_eq!(host.log(), vec!["automate 0 0.5".to_string(), "display".into()]);
    }

    #[test]
    fn test_editor_lifecycle() {
        let (mut plugin, _) = load();
        assert!(!plugin.open_editor(ptr::null_mut()));
        let mut window = 0u8;
        assert!(plugin.open_editor(&mut window as *mut u8 as *mut c_void));
        assert!(plugin.is_editor_open());
        plugin.close_editor();
        assert!(!plugin.is_editor_open());
    }

    #[test]
    fn test_vendor_extension_probe() {
        let (mut plugin, _) = load();
        let probe = i32::from_be_bytes(*b"sHi!");
        assert_ne!(plugin.vendor_specific(probe, 0, ptr::null_mut(), 0.0), 0);
        assert_eq!(plugin.vendor_specific(0, 0, ptr::null_mut(), 0.0), 0);
    }

    #[test]
    fn test_concurrent_construction() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    let (mut plugin, host) = load();
                    plugin.set_parameter(0, 0.125);
                    plugin.idle();
                    host.log()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec!["automate 0 0.125".to_string(), "display".into()]);
        }
    }
}
