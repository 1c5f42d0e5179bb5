//! Status codes of the host protocol and the translation of bridge errors
//! into them.
//!
//! Errors travel as [`SymbiosisError`] through the crate and are turned into
//! an [`OSStatus`] exactly once, at the C-ABI boundary in `bridge.rs`.

use symbiosis_core::{ProtocolFault, SymbiosisError};

/// Status word returned by every host-facing call.
pub type OSStatus = i32;

// OSStatus error codes used by the Audio Unit surface
pub mod os_status {
    /// No error.
    pub const NO_ERR: i32 = 0;

    /// Generic parameter error (null pointer, bad index).
    pub const PARAM_ERR: i32 = -50;

    /// Out of memory or a fixed-capacity table is full.
    pub const MEM_FULL_ERR: i32 = -108;

    /// Unknown component selector.
    pub const BAD_COMPONENT_SELECTOR: i32 = 0x8000_8002_u32 as i32;

    /// Invalid property.
    pub const K_AUDIO_UNIT_ERR_INVALID_PROPERTY: i32 = -10879;

    /// Invalid parameter.
    pub const K_AUDIO_UNIT_ERR_INVALID_PARAMETER: i32 = -10878;

    /// Invalid element.
    pub const K_AUDIO_UNIT_ERR_INVALID_ELEMENT: i32 = -10877;

    /// No upstream connection to pull input from.
    pub const K_AUDIO_UNIT_ERR_NO_CONNECTION: i32 = -10876;

    /// Initialization failed.
    pub const K_AUDIO_UNIT_ERR_FAILED_INITIALIZATION: i32 = -10875;

    /// Too many frames to process.
    pub const K_AUDIO_UNIT_ERR_TOO_MANY_FRAMES_TO_PROCESS: i32 = -10874;

    /// Invalid file.
    pub const K_AUDIO_UNIT_ERR_INVALID_FILE: i32 = -10871;

    /// Format not supported.
    pub const K_AUDIO_UNIT_ERR_FORMAT_NOT_SUPPORTED: i32 = -10868;

    /// Uninitialized.
    pub const K_AUDIO_UNIT_ERR_UNINITIALIZED: i32 = -10867;

    /// Invalid scope.
    pub const K_AUDIO_UNIT_ERR_INVALID_SCOPE: i32 = -10866;

    /// Property not writable.
    pub const K_AUDIO_UNIT_ERR_PROPERTY_NOT_WRITABLE: i32 = -10865;

    /// Cannot do in current context.
    pub const K_AUDIO_UNIT_ERR_CANNOT_DO_IN_CURRENT_CONTEXT: i32 = -10863;

    /// Invalid property value.
    pub const K_AUDIO_UNIT_ERR_INVALID_PROPERTY_VALUE: i32 = -10851;

    /// Property not in use.
    pub const K_AUDIO_UNIT_ERR_PROPERTY_NOT_IN_USE: i32 = -10850;

    /// Already initialized.
    pub const K_AUDIO_UNIT_ERR_INITIALIZED: i32 = -10849;
}

/// Status code for a refused host request.
pub fn fault_status(fault: ProtocolFault) -> OSStatus {
    match fault {
        ProtocolFault::InvalidScope => os_status::K_AUDIO_UNIT_ERR_INVALID_SCOPE,
        ProtocolFault::InvalidElement => os_status::K_AUDIO_UNIT_ERR_INVALID_ELEMENT,
        ProtocolFault::InvalidProperty => os_status::K_AUDIO_UNIT_ERR_INVALID_PROPERTY,
        ProtocolFault::InvalidPropertyValue => os_status::K_AUDIO_UNIT_ERR_INVALID_PROPERTY_VALUE,
        ProtocolFault::InvalidParameter => os_status::K_AUDIO_UNIT_ERR_INVALID_PARAMETER,
        ProtocolFault::FormatNotSupported => os_status::K_AUDIO_UNIT_ERR_FORMAT_NOT_SUPPORTED,
        ProtocolFault::TooManyFrames => os_status::K_AUDIO_UNIT_ERR_TOO_MANY_FRAMES_TO_PROCESS,
        ProtocolFault::Uninitialized => os_status::K_AUDIO_UNIT_ERR_UNINITIALIZED,
        ProtocolFault::InvalidArgument => os_status::PARAM_ERR,
        ProtocolFault::BadSelector => os_status::BAD_COMPONENT_SELECTOR,
    }
}

/// Nearest status code for any bridge error.
pub fn to_os_status(error: &SymbiosisError) -> OSStatus {
    match error {
        SymbiosisError::HostProtocol { fault, .. } => fault_status(*fault),
        SymbiosisError::Format(_) | SymbiosisError::Bounds(_) | SymbiosisError::Serialization(_) => {
            os_status::K_AUDIO_UNIT_ERR_INVALID_PROPERTY_VALUE
        }
        SymbiosisError::Io(_) => os_status::K_AUDIO_UNIT_ERR_INVALID_FILE,
        SymbiosisError::Resource(_) => os_status::MEM_FULL_ERR,
        SymbiosisError::Foreign(_) => os_status::K_AUDIO_UNIT_ERR_CANNOT_DO_IN_CURRENT_CONTEXT,
        SymbiosisError::LoadFailed { .. } => os_status::K_AUDIO_UNIT_ERR_FAILED_INITIALIZATION,
    }
}

/// Collapse a unit result into a status, logging the failure.
pub(crate) fn status_of(operation: &str, result: symbiosis_core::Result<()>) -> OSStatus {
    match result {
        Ok(()) => os_status::NO_ERR,
        Err(error) => {
            log::debug!("{} failed: {}", operation, error);
            to_os_status(&error)
        }
    }
}
