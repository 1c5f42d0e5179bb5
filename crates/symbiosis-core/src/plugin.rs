//! Capability contracts between the bridge and the wrapped plug-in.
//!
//! [`WrappedPlugin`] is the Plugin Adapter contract: the uniform set of
//! operations the Bridge Component may invoke on one loaded plug-in instance.
//! The wrapped protocol's numeric opcode table stays behind the single
//! implementation of this trait; nothing above it sees an opcode.
//!
//! [`HostCallbacks`] is the reverse direction: what the plug-in may ask of its
//! host while it runs. The Callback Bridge forwards each such request into an
//! implementation supplied by the Bridge Component.
//!
//! # Lifecycle
//!
//! ```text
//! loaded --open()--> open (suspended) --resume()--> running
//!                          ^                           |
//!                          +--------suspend()----------+
//! ```
//!
//! `resume` and `suspend` must strictly alternate starting from suspended.
//! Violating the order is a caller defect and trips a debug assertion.
//!
//! # Foreign faults
//!
//! Implementations must never let a fault raised inside the plug-in escape a
//! method. A fault is logged and the method returns the neutral default that
//! its documentation names (zero, empty, `false` or `None`).

use std::ffi::c_void;

use crate::midi::MidiEvent;
use crate::transport::TimeInfo;

/// Longest program, parameter and label name the bridge passes through.
pub const MAX_NAME_LENGTH: usize = 24;

/// Truncate a name to [`MAX_NAME_LENGTH`] characters.
pub fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LENGTH).collect()
}

/// Static capability flags advertised by the plug-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginFlags {
    pub has_editor: bool,
    pub can_replacing: bool,
    pub program_chunks: bool,
    pub is_synth: bool,
    pub no_sound_in_stop: bool,
}

/// Per-pin metadata the plug-in may publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinProperties {
    /// The pin is the first channel of a stereo pair.
    pub is_stereo: bool,
    pub label: String,
}

/// Tail length reported by the plug-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailSize {
    /// The plug-in does not report a tail.
    Unsupported,
    /// Tail length in samples. The wrapped protocol encodes "no tail" as 1.
    Samples(usize),
}

impl TailSize {
    pub fn from_raw(raw: isize) -> Self {
        if raw <= 0 {
            TailSize::Unsupported
        } else {
            TailSize::Samples(raw as usize)
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, TailSize::Samples(_))
    }
}

/// Direction of an audio pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Operations the Bridge Component invokes on the wrapped plug-in.
pub trait WrappedPlugin {
    // ---- lifecycle ----

    /// Open the plug-in. Illegal to call twice.
    fn open(&mut self) -> crate::Result<()>;
    fn is_open(&self) -> bool;
    /// Start processing. Only legal while suspended.
    fn resume(&mut self);
    /// Stop processing. Only legal while running.
    fn suspend(&mut self);
    fn is_resumed(&self) -> bool;
    /// Periodic housekeeping on the control context.
    fn idle(&mut self);

    // ---- identity and shape ----

    fn unique_id(&self) -> i32;
    fn version(&self) -> i32;
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn parameter_count(&self) -> usize;
    fn program_count(&self) -> usize;
    fn flags(&self) -> PluginFlags;
    /// Latency in samples.
    fn initial_delay(&self) -> usize;
    fn tail_size(&mut self) -> TailSize;
    /// `None` when the plug-in does not publish pin metadata.
    fn pin_properties(&mut self, direction: PinDirection, pin: usize) -> Option<PinProperties>;
    fn connect_pin(&mut self, direction: PinDirection, pin: usize, connected: bool);
    /// Whether the plug-in asked to receive MIDI.
    fn wants_midi(&self) -> bool;

    // ---- configuration ----

    fn set_sample_rate(&mut self, sample_rate: f32);
    fn set_block_size(&mut self, block_size: usize);
    /// Returns `true` when the plug-in accepted the bypass request.
    fn set_bypass(&mut self, bypass: bool) -> bool;

    // ---- programs ----

    /// Current program, clamped into the program count.
    fn current_program(&mut self) -> usize;
    fn set_current_program(&mut self, program: usize);
    fn current_program_name(&mut self) -> String;
    fn set_current_program_name(&mut self, name: &str);
    /// `None` when the plug-in cannot name programs by index.
    fn program_name(&mut self, program: usize) -> Option<String>;
    fn begin_set_program(&mut self);
    fn end_set_program(&mut self);

    // ---- parameters ----

    /// Normalized value in [0, 1]; 0.0 on a foreign fault.
    fn parameter(&mut self, index: usize) -> f32;
    /// Values are clamped into [0, 1] before reaching the plug-in.
    fn set_parameter(&mut self, index: usize, value: f32);
    fn parameter_name(&mut self, index: usize) -> String;
    fn parameter_label(&mut self, index: usize) -> String;
    fn parameter_display(&mut self, index: usize) -> String;
    /// Ask the plug-in to parse `text` into a value for `index`.
    fn string_to_parameter(&mut self, index: usize, text: &str) -> bool;

    // ---- opaque state ----

    /// Opaque state of the current program (`is_program`) or the whole bank.
    fn chunk(&mut self, is_program: bool) -> Option<Vec<u8>>;
    fn set_chunk(&mut self, is_program: bool, data: &[u8]) -> bool;

    // ---- processing ----

    /// Publish the transport snapshot the plug-in reads while processing.
    fn set_time_info(&mut self, info: &TimeInfo);
    /// Deliver all pending events for the next block in one call.
    fn process_events(&mut self, events: &[MidiEvent]);

    /// Process one block.
    ///
    /// # Safety
    ///
    /// `inputs` must hold `input_count()` pointers and `outputs` must hold
    /// `output_count()` pointers, each valid for `frame_count` samples.
    /// Input and output pointers may alias (in-place processing). Only legal
    /// while resumed.
    unsafe fn process_replacing(
        &mut self,
        inputs: &[*mut f32],
        outputs: &[*mut f32],
        frame_count: usize,
    );

    /// Vendor-specific extension call. Returns 0 when unsupported.
    fn vendor_specific(&mut self, selector: i32, index: isize, ptr: *mut c_void, opt: f32) -> isize;

    // ---- editor ----

    /// Editor size as `(width, height)`, if the plug-in has one.
    fn editor_size(&mut self) -> Option<(u16, u16)>;
    /// Open the editor inside a host-provided native window.
    fn open_editor(&mut self, parent: *mut c_void) -> bool;
    fn close_editor(&mut self);
    fn is_editor_open(&self) -> bool;
}

/// Requests the wrapped plug-in may make of its host.
///
/// Called from whatever context the plug-in chooses, including the render
/// context, so implementations must not block.
pub trait HostCallbacks: Send + Sync {
    /// The plug-in changed a parameter from its own interface.
    fn automate(&self, index: usize, value: f32);
    /// Start of a user gesture on a parameter.
    fn begin_edit(&self, index: usize);
    /// End of a user gesture on a parameter.
    fn end_edit(&self, index: usize);
    /// The plug-in's programs or display changed.
    fn update_display(&self);
    /// The editor wants a new size. Returns `true` if honoured.
    fn resize_window(&self, width: i32, height: i32) -> bool;
    /// The plug-in asks for an idle pass.
    fn idle(&self) {}
    fn can_do(&self, capability: &str) -> bool;
    fn vendor(&self) -> &str;
    fn product(&self) -> &str;
    fn vendor_version(&self) -> i32;
    /// Whether the host has a stream connected to a pin.
    fn is_pin_connected(&self, _direction: PinDirection, _pin: usize) -> bool {
        true
    }
}
