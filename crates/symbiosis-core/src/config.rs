//! Bridge configuration.
//!
//! Two kinds of configuration reach the bridge: the identity of the host-side
//! component (type, subtype and manufacturer four-char codes plus a display
//! name) and the three behaviour switches read from the `SYConfig` dictionary
//! of the bundle's info document.
//!
//! # Example
//!
//! ```ignore
//! use symbiosis_core::config::{ComponentDescription, ComponentType, SymbiosisConfig};
//! use symbiosis_core::fourcc;
//!
//! let description = ComponentDescription::new(ComponentType::Effect, fourcc!(b"Dely"), fourcc!(b"NuEd"));
//! let config = SymbiosisConfig::from_info_json(r#"{ "SYConfig": { "AutoConvertPresets": true,
//!     "PresetIsFXB": false, "UpdateNameOnLoad": true } }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SymbiosisError};

// =========================================================================
// FourCharCode
// =========================================================================

/// Four-character code (FourCC) used for component identity and preset tags.
///
/// Serialized as its big-endian 32-bit value, which is how preset documents
/// store type, subtype and manufacturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct FourCharCode(pub [u8; 4]);

impl FourCharCode {
    /// Create a new FourCharCode from a 4-byte array.
    ///
    /// # Panics
    /// Debug builds will panic if any byte is not ASCII.
    pub const fn new(bytes: &[u8; 4]) -> Self {
        debug_assert!(bytes[0].is_ascii(), "FourCC bytes must be ASCII");
        debug_assert!(bytes[1].is_ascii(), "FourCC bytes must be ASCII");
        debug_assert!(bytes[2].is_ascii(), "FourCC bytes must be ASCII");
        debug_assert!(bytes[3].is_ascii(), "FourCC bytes must be ASCII");
        Self(*bytes)
    }

    /// Build from a big-endian 32-bit value.
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Get the FourCC as a 32-bit value (big-endian).
    pub const fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Get the FourCC as a signed 32-bit value, the form vendor-specific calls use.
    pub const fn as_i32(&self) -> i32 {
        i32::from_be_bytes(self.0)
    }

    /// Get the FourCC as a string slice.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl From<u32> for FourCharCode {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<FourCharCode> for u32 {
    fn from(code: FourCharCode) -> Self {
        code.as_u32()
    }
}

impl std::fmt::Display for FourCharCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Macro for creating FourCharCode at compile time with validation.
///
/// # Example
///
/// ```ignore
/// use symbiosis_core::fourcc;
///
/// const MANUFACTURER: FourCharCode = fourcc!(b"NuEd");
/// const SUBTYPE: FourCharCode = fourcc!(b"Dely");
/// ```
#[macro_export]
macro_rules! fourcc {
    ($s:literal) => {{
        const BYTES: &[u8] = $s;
        const _: () = assert!(BYTES.len() == 4, "FourCC must be exactly 4 bytes");
        const _: () = assert!(BYTES[0].is_ascii(), "FourCC byte 0 must be ASCII");
        const _: () = assert!(BYTES[1].is_ascii(), "FourCC byte 1 must be ASCII");
        const _: () = assert!(BYTES[2].is_ascii(), "FourCC byte 2 must be ASCII");
        const _: () = assert!(BYTES[3].is_ascii(), "FourCC byte 3 must be ASCII");
        $crate::config::FourCharCode::new(&[BYTES[0], BYTES[1], BYTES[2], BYTES[3]])
    }};
}

// =========================================================================
// Component identity
// =========================================================================

/// Host-side component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// `aufx`: audio in, audio out.
    Effect,
    /// `aumf`: audio and MIDI in, audio out.
    MusicEffect,
    /// `aumu`: MIDI in, audio out.
    MusicDevice,
}

impl ComponentType {
    pub const fn code(&self) -> FourCharCode {
        match self {
            ComponentType::Effect => FourCharCode::new(b"aufx"),
            ComponentType::MusicEffect => FourCharCode::new(b"aumf"),
            ComponentType::MusicDevice => FourCharCode::new(b"aumu"),
        }
    }

    pub fn from_code(code: FourCharCode) -> Option<Self> {
        match &code.0 {
            b"aufx" => Some(ComponentType::Effect),
            b"aumf" => Some(ComponentType::MusicEffect),
            b"aumu" => Some(ComponentType::MusicDevice),
            _ => None,
        }
    }

    /// Whether the host delivers MIDI to this kind of component.
    pub const fn accepts_midi(&self) -> bool {
        !matches!(self, ComponentType::Effect)
    }
}

/// Identity of the host-side component wrapping the plug-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescription {
    pub component_type: ComponentType,
    pub subtype: FourCharCode,
    pub manufacturer: FourCharCode,
}

impl ComponentDescription {
    pub const fn new(
        component_type: ComponentType,
        subtype: FourCharCode,
        manufacturer: FourCharCode,
    ) -> Self {
        Self {
            component_type,
            subtype,
            manufacturer,
        }
    }

    /// Check an externally supplied `(type, subtype, manufacturer)` triple.
    pub fn matches(&self, component_type: u32, subtype: u32, manufacturer: u32) -> bool {
        self.component_type.code().as_u32() == component_type
            && self.subtype.as_u32() == subtype
            && self.manufacturer.as_u32() == manufacturer
    }
}

/// Split a component name of the form `"Manufacturer: Product"` into its
/// trimmed, non-empty path segments.
pub fn component_name_segments(name: &str) -> Vec<&str> {
    name.split(':')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

// =========================================================================
// SYConfig
// =========================================================================

/// Behaviour switches read from the `SYConfig` dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SymbiosisConfig {
    /// Convert legacy `.fxp`/`.fxb` files found in the preset folders on load.
    pub auto_convert_presets: bool,
    /// Presets hold the whole bank instead of the current program.
    #[serde(rename = "PresetIsFXB")]
    pub preset_is_fxb: bool,
    /// Loading a preset renames the current program to the preset name.
    pub update_name_on_load: bool,
}

#[derive(Deserialize)]
struct InfoDocument {
    #[serde(rename = "SYConfig")]
    sy_config: Option<SymbiosisConfig>,
}

impl SymbiosisConfig {
    /// Key of the configuration dictionary inside the bundle info document.
    pub const INFO_KEY: &'static str = "SYConfig";

    /// Read the configuration from a bundle info document in JSON form.
    pub fn from_info_json(text: &str) -> Result<Self> {
        let info: InfoDocument = serde_json::from_str(text)?;
        info.sy_config.ok_or_else(|| {
            SymbiosisError::Format(format!("missing {} dictionary in info document", Self::INFO_KEY))
        })
    }
}
