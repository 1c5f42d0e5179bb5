//! Callback Bridge.
//!
//! The wrapped protocol has one process-wide host callback with no context
//! argument besides the instance pointer. Each plug-in instance gets a
//! [`CallbackState`]; its address is stored in the instance's reserved field
//! right after construction so every later request finds its owner.
//!
//! Plug-ins may call back while their entry point is still running, before
//! the instance is bound (with a null instance pointer, or with a fresh
//! instance whose reserved field is still zero). Those requests are routed
//! through a process-wide pending slot. Construction holds a global token for
//! its whole duration so no two instances ever share the slot.

use std::cell::UnsafeCell;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use symbiosis_core::{HostCallbacks, PinDirection};

use crate::aeffect::{host_opcodes, AEffect, EntryProc, VstTimeInfo, EFFECT_MAGIC, HOST_VST_VERSION, LANGUAGE_ENGLISH, MAX_VENDOR_STRING};

/// Instance being constructed, for callbacks that arrive before binding.
static PENDING: AtomicPtr<CallbackState> = AtomicPtr::new(ptr::null_mut());

/// Held for the whole of one construction.
static CONSTRUCTION: Mutex<()> = Mutex::new(());

/// Per-instance state the host callback answers from.
pub(crate) struct CallbackState {
    host: Arc<dyn HostCallbacks>,
    effect: AtomicPtr<AEffect>,
    sample_rate: AtomicU32,
    block_size: AtomicUsize,
    wants_midi: AtomicBool,
    editor_open: AtomicBool,
    time_info: UnsafeCell<VstTimeInfo>,
}

impl CallbackState {
    pub(crate) fn new(host: Arc<dyn HostCallbacks>, sample_rate: f32, block_size: usize) -> Self {
        Self {
            host,
            effect: AtomicPtr::new(ptr::null_mut()),
            sample_rate: AtomicU32::new(sample_rate.to_bits()),
            block_size: AtomicUsize::new(block_size),
            wants_midi: AtomicBool::new(false),
            editor_open: AtomicBool::new(false),
            time_info: UnsafeCell::new(VstTimeInfo {
                sample_rate: sample_rate as f64,
                tempo: 120.0,
                time_sig_numerator: 4,
                time_sig_denominator: 4,
                ..VstTimeInfo::default()
            }),
        }
    }

    pub(crate) fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate.load(Ordering::Relaxed))
    }

    pub(crate) fn set_sample_rate(&self, sample_rate: f32) {
        self.sample_rate.store(sample_rate.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_block_size(&self, block_size: usize) {
        self.block_size.store(block_size, Ordering::Relaxed);
    }

    pub(crate) fn wants_midi(&self) -> bool {
        self.wants_midi.load(Ordering::Relaxed)
    }

    pub(crate) fn editor_open(&self) -> bool {
        self.editor_open.load(Ordering::Relaxed)
    }

    pub(crate) fn set_editor_open(&self, open: bool) {
        self.editor_open.store(open, Ordering::Relaxed);
    }

    /// Replace the snapshot `GET_TIME` hands out.
    ///
    /// Only called from the render context, which is also the only context
    /// the plug-in reads the snapshot from.
    pub(crate) fn publish_time_info(&self, info: VstTimeInfo) {
        // SAFETY: the render context is the single writer and the plug-in
        // only dereferences the pointer inside calls made from that context.
        unsafe { *self.time_info.get() = info };
    }

    #[cfg(test)]
    pub(crate) fn time_info(&self) -> VstTimeInfo {
        // SAFETY: tests read on the thread that wrote.
        unsafe { *self.time_info.get() }
    }

    fn bind(&self, effect: *mut AEffect) {
        self.effect.store(effect, Ordering::Release);
        // SAFETY: `effect` is a live instance owned by this state.
        unsafe { (*effect).resvd1 = self as *const CallbackState as isize };
    }

    fn handle(&self, opcode: i32, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        match opcode {
            host_opcodes::AUTOMATE => {
                if index >= 0 {
                    self.host.automate(index as usize, opt);
                }
                0
            }
            host_opcodes::VERSION => HOST_VST_VERSION,
            host_opcodes::CURRENT_ID => {
                let effect = self.effect.load(Ordering::Acquire);
                if effect.is_null() {
                    0
                } else {
                    // SAFETY: a bound instance outlives its state.
                    unsafe { (*effect).unique_id as isize }
                }
            }
            host_opcodes::IDLE => {
                self.host.idle();
                0
            }
            host_opcodes::PIN_CONNECTED => {
                let direction = if value == 0 {
                    PinDirection::Input
                } else {
                    PinDirection::Output
                };
                // Inverted: 0 means connected.
                if index >= 0 && self.host.is_pin_connected(direction, index as usize) {
                    0
                } else {
                    1
                }
            }
            host_opcodes::WANT_MIDI => {
                self.wants_midi.store(true, Ordering::Relaxed);
                1
            }
            host_opcodes::GET_TIME => self.time_info.get() as isize,
            host_opcodes::GET_PARAMETER_QUANTIZATION => 1,
            host_opcodes::NEED_IDLE => 1,
            host_opcodes::SIZE_WINDOW => {
                if !self.editor_open() {
                    log::debug!("Resize request {}x{} with no editor open", index, value);
                }
                self.host.resize_window(index, value as i32) as isize
            }
            host_opcodes::GET_SAMPLE_RATE => (self.sample_rate() + 0.5) as isize,
            host_opcodes::GET_BLOCK_SIZE => self.block_size.load(Ordering::Relaxed) as isize,
            host_opcodes::GET_VENDOR_STRING => {
                // SAFETY: the plug-in passes a buffer of MAX_VENDOR_STRING bytes.
                unsafe { copy_c_string(ptr, self.host.vendor(), MAX_VENDOR_STRING) };
                1
            }
            host_opcodes::GET_PRODUCT_STRING => {
                // SAFETY: as above.
                unsafe { copy_c_string(ptr, self.host.product(), MAX_VENDOR_STRING) };
                1
            }
            host_opcodes::GET_VENDOR_VERSION => self.host.vendor_version() as isize,
            host_opcodes::CAN_DO => {
                if ptr.is_null() {
                    return 0;
                }
                // SAFETY: the plug-in passes a NUL-terminated capability name.
                let capability = unsafe { CStr::from_ptr(ptr as *const c_char) }.to_string_lossy();
                // Unsupported is 0 rather than -1; some plug-ins treat any
                // non-zero answer as yes.
                self.host.can_do(&capability) as isize
            }
            host_opcodes::GET_LANGUAGE => LANGUAGE_ENGLISH,
            host_opcodes::UPDATE_DISPLAY => {
                self.host.update_display();
                1
            }
            host_opcodes::BEGIN_EDIT => {
                if index >= 0 {
                    self.host.begin_edit(index as usize);
                }
                1
            }
            host_opcodes::END_EDIT => {
                if index >= 0 {
                    self.host.end_edit(index as usize);
                }
                1
            }
            _ => {
                log::trace!("Unsupported host callback opcode {}", opcode);
                0
            }
        }
    }
}

/// Copy `text` into a C buffer of `capacity` bytes, always terminated.
///
/// # Safety
///
/// `dest` must be null or valid for `capacity` bytes.
pub(crate) unsafe fn copy_c_string(dest: *mut c_void, text: &str, capacity: usize) {
    if dest.is_null() || capacity == 0 {
        return;
    }
    let len = text.len().min(capacity - 1);
    // SAFETY: `len + 1 <= capacity` and the caller guarantees the buffer.
    unsafe {
        ptr::copy_nonoverlapping(text.as_ptr(), dest as *mut u8, len);
        *(dest as *mut u8).add(len) = 0;
    }
}

/// Find the state that owns `effect`, binding a fresh instance on first use.
///
/// # Safety
///
/// `effect` must be null or point to a live instance.
unsafe fn resolve<'a>(effect: *mut AEffect) -> Option<&'a CallbackState> {
    let state = if effect.is_null() {
        PENDING.load(Ordering::Acquire)
    } else {
        // SAFETY: caller guarantees a live instance.
        let bound = unsafe { (*effect).resvd1 } as *mut CallbackState;
        if bound.is_null() {
            let pending = PENDING.load(Ordering::Acquire);
            if !pending.is_null() {
                // SAFETY: the pending state lives until construction ends.
                unsafe { (*pending).bind(effect) };
            }
            pending
        } else {
            bound
        }
    };
    // SAFETY: non-null states are either pending (alive for the whole
    // construction) or bound (alive until the instance is closed).
    unsafe { state.as_ref() }
}

/// The host callback handed to every plug-in entry point.
pub(crate) unsafe extern "C" fn host_callback(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the plug-in passes its own instance or null.
        match unsafe { resolve(effect) } {
            Some(state) => state.handle(opcode, index, value, ptr, opt),
            None if opcode == host_opcodes::VERSION => HOST_VST_VERSION,
            None => {
                log::warn!("Host callback {} from an unknown plug-in instance", opcode);
                0
            }
        }
    }));
    outcome.unwrap_or_else(|_| {
        log::error!("Panic while handling host callback {}", opcode);
        0
    })
}

/// Run a plug-in entry point and bind the instance it returns to `state`.
///
/// Returns the reason on failure: a fault, a null instance or a bad magic
/// number.
pub(crate) fn construct(entry: EntryProc, state: &CallbackState) -> std::result::Result<*mut AEffect, String> {
    let _token = CONSTRUCTION.lock().unwrap_or_else(PoisonError::into_inner);

    PENDING.store(state as *const CallbackState as *mut CallbackState, Ordering::Release);
    // SAFETY: the entry point follows the plug-in binary interface.
    let effect = panic::catch_unwind(|| unsafe { entry(host_callback) });

    let result = match effect {
        Err(_) => {
            log::error!("Plug-in faulted in its entry point");
            Err("entry point faulted".to_string())
        }
        Ok(effect) => bind_constructed(effect, state),
    };

    PENDING.store(ptr::null_mut(), Ordering::Release);
    result
}

fn bind_constructed(effect: *mut AEffect, state: &CallbackState) -> std::result::Result<*mut AEffect, String> {
    if effect.is_null() {
        Err("entry point returned no instance".to_string())
    } else {
        // SAFETY: non-null instances returned by the entry point are live.
        let magic = unsafe { (*effect).magic };
        if magic == EFFECT_MAGIC {
            state.bind(effect);
            Ok(effect)
        } else {
            Err(format!("bad instance magic {:#010x}", magic))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHost;

    #[test]
    fn test_null_instance_without_pending_answers_version_only() {
        // SAFETY: null instances are allowed.
        unsafe {
            assert_eq!(host_callback(ptr::null_mut(), host_opcodes::VERSION, 0, 0, ptr::null_mut(), 0.0), 2300);
        }
    }

    #[test]
    fn test_copy_c_string_truncates() {
        let mut buffer = [0xffu8; 8];
        // SAFETY: buffer is 8 bytes.
        unsafe { copy_c_string(buffer.as_mut_ptr() as *mut c_void, "Symbiosis", 8) };
        assert_eq!(&buffer, b"Symbios\0");
    }

    #[test]
    fn test_fixed_replies() {
        let host = Arc::new(RecordingHost::default());
        let state = CallbackState::new(host.clone(), 44099.6, 512);
        let mut vendor = [0u8; MAX_VENDOR_STRING];
        let reply = |opcode, index, value, ptr| state.handle(opcode, index, value, ptr, 0.0);

        assert_eq!(reply(host_opcodes::VERSION, 0, 0, ptr::null_mut()), 2300);
        assert_eq!(reply(host_opcodes::GET_SAMPLE_RATE, 0, 0, ptr::null_mut()), 44100);
        assert_eq!(reply(host_opcodes::GET_BLOCK_SIZE, 0, 0, ptr::null_mut()), 512);
        assert_eq!(reply(host_opcodes::GET_LANGUAGE, 0, 0, ptr::null_mut()), 1);
        assert_eq!(reply(host_opcodes::NEED_IDLE, 0, 0, ptr::null_mut()), 1);
        assert_eq!(reply(host_opcodes::GET_PARAMETER_QUANTIZATION, 0, 0, ptr::null_mut()), 1);
        assert_eq!(reply(host_opcodes::GET_VENDOR_VERSION, 0, 0, ptr::null_mut()), 0x010000);
        assert_eq!(reply(host_opcodes::PIN_CONNECTED, 0, 0, ptr::null_mut()), 0);
        assert_eq!(reply(host_opcodes::CURRENT_ID, 0, 0, ptr::null_mut()), 0);

        assert_eq!(
            reply(host_opcodes::GET_VENDOR_STRING, 0, 0, vendor.as_mut_ptr() as *mut c_void),
            1
        );
        assert_eq!(&vendor[..19], b"NuEdge Development\0");

        assert!(!state.wants_midi());
        assert_eq!(reply(host_opcodes::WANT_MIDI, 0, 0, ptr::null_mut()), 1);
        assert!(state.wants_midi());

        let time = reply(host_opcodes::GET_TIME, 0, 0, ptr::null_mut()) as *const VstTimeInfo;
        // SAFETY: GET_TIME returns the state's own snapshot.
        assert_eq!(unsafe { (*time).tempo }, 120.0);
    }

    #[test]
    fn test_can_do() {
        let host = Arc::new(RecordingHost::default());
        let state = CallbackState::new(host, 44100.0, 512);
        for (capability, expected) in [
            (&b"sendVstMidiEvent\0"[..], 1),
            (&b"supplyIdle\0"[..], 1),
            (&b"offline\0"[..], 0),
        ] {
            let reply = state.handle(host_opcodes::CAN_DO, 0, 0, capability.as_ptr() as *mut c_void, 0.0);
            assert_eq!(reply, expected);
        }
    }

    #[test]
    fn test_parameter_requests_are_forwarded() {
        let host = Arc::new(RecordingHost::default());
        let state = CallbackState::new(host.clone(), 44100.0, 512);
        state.handle(host_opcodes::BEGIN_EDIT, 3, 0, ptr::null_mut(), 0.0);
        state.handle(host_opcodes::AUTOMATE, 3, 0, ptr::null_mut(), 0.75);
        state.handle(host_opcodes::END_EDIT, 3, 0, ptr::null_mut(), 0.0);
        state.handle(host_opcodes::UPDATE_DISPLAY, 0, 0, ptr::null_mut(), 0.0);
        assert_eq!(
            host.log(),
            vec!["begin 3".to_string(), "automate 3 0.75".into(), "end 3".into(), "display".into()]
        );
    }
}
