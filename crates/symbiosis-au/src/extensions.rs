//! Optional vendor extensions a wrapped plug-in may answer.
//!
//! Plug-ins built for the bridge can answer a handful of vendor-specific
//! selectors. The probe tells whether any of them are supported; the others
//! carry silence hints around processing and text conversion of parameter
//! values. Every helper falls back to "unsupported" when the plug-in
//! returns 0.

use std::ffi::{c_char, c_void, CStr};

use symbiosis_core::{fourcc, WrappedPlugin};

pub const PROBE: i32 = fourcc!(b"sHi!").as_i32();
pub const INPUT_SILENCE: i32 = fourcc!(b"sI00").as_i32();
pub const OUTPUT_SILENCE: i32 = fourcc!(b"sO00").as_i32();
pub const VALUE_TO_STRING: i32 = fourcc!(b"sV2S").as_i32();
pub const STRING_TO_VALUE: i32 = fourcc!(b"sS2V").as_i32();

/// Scratch space handed to the text conversion selectors.
const TEXT_BUFFER_SIZE: usize = 256;

pub fn probe<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> bool {
    plugin.vendor_specific(PROBE, 0, std::ptr::null_mut(), 0.0) != 0
}

/// Tell the plug-in whether the next block's input is all zeros.
pub fn hint_input_silence<P: WrappedPlugin + ?Sized>(plugin: &mut P, silent: bool) {
    plugin.vendor_specific(INPUT_SILENCE, silent as isize, std::ptr::null_mut(), 0.0);
}

/// Whether the block just processed produced only zeros.
pub fn output_is_silent<P: WrappedPlugin + ?Sized>(plugin: &mut P) -> bool {
    plugin.vendor_specific(OUTPUT_SILENCE, 0, std::ptr::null_mut(), 0.0) != 0
}

/// Display text for a normalized value, without touching the parameter.
pub fn value_to_string<P: WrappedPlugin + ?Sized>(plugin: &mut P, index: usize, normalized: f32) -> Option<String> {
    let mut buffer = [0u8; TEXT_BUFFER_SIZE];
    buffer[..4].copy_from_slice(&normalized.to_ne_bytes());
    let handled = plugin.vendor_specific(VALUE_TO_STRING, index as isize, buffer.as_mut_ptr() as *mut c_void, 0.0);
    if handled == 0 {
        return None;
    }
    // Never read past the scratch buffer.
    buffer[TEXT_BUFFER_SIZE - 1] = 0;
    let text = CStr::from_bytes_until_nul(&buffer).ok()?;
    Some(text.to_string_lossy().into_owned())
}

/// Normalized value for a display text.
pub fn string_to_value<P: WrappedPlugin + ?Sized>(plugin: &mut P, index: usize, text: &str) -> Option<f32> {
    let mut buffer = [0u8; TEXT_BUFFER_SIZE];
    let bytes = text.as_bytes();
    let len = bytes.len().min(TEXT_BUFFER_SIZE - 1);
    buffer[..len].copy_from_slice(&bytes[..len]);
    let handled = plugin.vendor_specific(
        STRING_TO_VALUE,
        index as isize,
        buffer.as_mut_ptr() as *mut c_char as *mut c_void,
        0.0,
    );
    if handled == 0 {
        return None;
    }
    Some(f32::from_ne_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]))
}
