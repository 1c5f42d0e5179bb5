//! Error types for the bridge.
//!
//! Every fault the bridge can raise falls into one of five families:
//! malformed preset data ([`SymbiosisError::Format`]), truncated binary data
//! ([`SymbiosisError::Bounds`]), host requests the protocol does not allow
//! ([`SymbiosisError::HostProtocol`]), exhausted fixed-capacity resources
//! ([`SymbiosisError::Resource`]) and misbehaviour of the wrapped plug-in
//! ([`SymbiosisError::Foreign`], [`SymbiosisError::LoadFailed`]).
//!
//! The host-protocol crate translates these into status codes at its outer
//! dispatch boundary; nothing here knows about status numbers.

use std::path::PathBuf;
use thiserror::Error;

/// Stage of loading a wrapped plug-in binary at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Opening,
    EntryPoint,
    Instantiation,
    Validation,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::EntryPoint => write!(f, "resolving entry point"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Validation => write!(f, "validating instance"),
        }
    }
}

/// A request from the host that the bridge refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    InvalidScope,
    InvalidElement,
    InvalidProperty,
    InvalidPropertyValue,
    InvalidParameter,
    FormatNotSupported,
    TooManyFrames,
    Uninitialized,
    /// Null or out-of-range argument on a call that has no dedicated code.
    InvalidArgument,
    BadSelector,
}

impl std::fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ProtocolFault::InvalidScope => "invalid scope",
            ProtocolFault::InvalidElement => "invalid element",
            ProtocolFault::InvalidProperty => "invalid property",
            ProtocolFault::InvalidPropertyValue => "invalid property value",
            ProtocolFault::InvalidParameter => "invalid parameter",
            ProtocolFault::FormatNotSupported => "format not supported",
            ProtocolFault::TooManyFrames => "too many frames to process",
            ProtocolFault::Uninitialized => "uninitialized",
            ProtocolFault::InvalidArgument => "invalid argument",
            ProtocolFault::BadSelector => "bad selector",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum SymbiosisError {
    #[error("Invalid preset format: {0}")]
    Format(String),

    #[error("Unexpected end of data: {0}")]
    Bounds(String),

    #[error("Host protocol fault ({fault}): {context}")]
    HostProtocol {
        fault: ProtocolFault,
        context: String,
    },

    #[error("Resource exhausted: {0}")]
    Resource(String),

    #[error("Wrapped plug-in fault: {0}")]
    Foreign(String),

    #[error("Plug-in load failed at {stage} stage: {path}\n  Reason: {reason}")]
    LoadFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SymbiosisError {
    /// Shorthand for a [`SymbiosisError::HostProtocol`] fault.
    pub fn protocol(fault: ProtocolFault, context: impl Into<String>) -> Self {
        SymbiosisError::HostProtocol {
            fault,
            context: context.into(),
        }
    }

    /// The protocol fault carried by this error, if any.
    pub fn protocol_fault(&self) -> Option<ProtocolFault> {
        match self {
            SymbiosisError::HostProtocol { fault, .. } => Some(*fault),
            _ => None,
        }
    }

    /// Whether this error came from decoding malformed or truncated data.
    pub fn is_data_fault(&self) -> bool {
        matches!(self, SymbiosisError::Format(_) | SymbiosisError::Bounds(_))
    }
}

pub type Result<T> = std::result::Result<T, SymbiosisError>;
