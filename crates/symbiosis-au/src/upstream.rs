//! Calls into an upstream Audio Unit connected to one of our inputs.
//!
//! Only macOS has upstream units to talk to; elsewhere a connection can be
//! recorded but never pulled from.

#[cfg(target_os = "macos")]
use std::ffi::c_void;

#[cfg(not(target_os = "macos"))]
use symbiosis_core::ProtocolFault;
use symbiosis_core::{Result, SymbiosisError};

use crate::buffers::AudioBufferList;
use crate::error::OSStatus;
use crate::types::{AudioStreamBasicDescription, AudioTimeStamp, AudioUnitConnection};

#[cfg(target_os = "macos")]
mod ffi {
    use super::*;

    #[link(name = "AudioToolbox", kind = "framework")]
    extern "C" {
        pub fn AudioUnitRender(
            unit: *mut c_void,
            action_flags: *mut u32,
            time_stamp: *const AudioTimeStamp,
            output_bus_number: u32,
            frame_count: u32,
            data: *mut AudioBufferList,
        ) -> OSStatus;

        pub fn AudioUnitGetProperty(
            unit: *mut c_void,
            id: u32,
            scope: u32,
            element: u32,
            data: *mut c_void,
            size: *mut u32,
        ) -> OSStatus;
    }
}

/// Render `frame_count` frames from the upstream unit into `data`.
///
/// # Safety
///
/// `connection.source_audio_unit` must be a live unit, and `time_stamp` and
/// `data` must be valid for the duration of the call.
#[cfg(target_os = "macos")]
pub unsafe fn pull(
    connection: &AudioUnitConnection,
    action_flags: &mut u32,
    time_stamp: *const AudioTimeStamp,
    frame_count: u32,
    data: *mut AudioBufferList,
) -> OSStatus {
    // SAFETY: forwarded from the caller.
    unsafe {
        ffi::AudioUnitRender(
            connection.source_audio_unit,
            action_flags,
            time_stamp,
            connection.source_output_number,
            frame_count,
            data,
        )
    }
}

/// # Safety
///
/// Nothing is dereferenced; the signature matches the macOS variant.
#[cfg(not(target_os = "macos"))]
pub unsafe fn pull(
    _connection: &AudioUnitConnection,
    _action_flags: &mut u32,
    _time_stamp: *const AudioTimeStamp,
    _frame_count: u32,
    _data: *mut AudioBufferList,
) -> OSStatus {
    crate::error::os_status::K_AUDIO_UNIT_ERR_NO_CONNECTION
}

/// Output format of the upstream unit's connected bus.
#[cfg(target_os = "macos")]
pub fn source_format(connection: &AudioUnitConnection) -> Result<AudioStreamBasicDescription> {
    let mut format = AudioStreamBasicDescription::default();
    let mut size = std::mem::size_of::<AudioStreamBasicDescription>() as u32;
    // SAFETY: the host handed us the unit in a connection it keeps alive;
    // `format` and `size` outlive the call.
    let status = unsafe {
        ffi::AudioUnitGetProperty(
            connection.source_audio_unit,
            crate::types::property_ids::STREAM_FORMAT,
            crate::types::Scope::Output as u32,
            connection.source_output_number,
            &mut format as *mut AudioStreamBasicDescription as *mut c_void,
            &mut size,
        )
    };
    if status != crate::error::os_status::NO_ERR {
        return Err(SymbiosisError::Foreign(format!(
            "upstream unit refused its stream format ({})",
            status
        )));
    }
    Ok(format)
}

#[cfg(not(target_os = "macos"))]
pub fn source_format(_connection: &AudioUnitConnection) -> Result<AudioStreamBasicDescription> {
    Err(SymbiosisError::protocol(
        ProtocolFault::InvalidPropertyValue,
        "upstream units are only reachable on macOS",
    ))
}

#[cfg(all(test, not(target_os = "macos")))]
mod tests {
    use super::*;

    #[test]
    fn test_no_upstream_outside_macos() {
        let connection = AudioUnitConnection::default();
        let mut flags = 0;
        let time_stamp = AudioTimeStamp::at_sample(0.0);
        // SAFETY: the portable variant dereferences nothing.
        let status = unsafe { pull(&connection, &mut flags, &time_stamp, 64, std::ptr::null_mut()) };
        assert_eq!(status, crate::error::os_status::K_AUDIO_UNIT_ERR_NO_CONNECTION);
        assert!(source_format(&connection).is_err());
    }
}
