//! # Symbiosis
//!
//! Host one VST 2.x plug-in inside an Audio Unit.
//!
//! The wrapped plug-in is loaded from the component bundle at run time; a
//! native shim implements the Audio Unit entry points and forwards every
//! request to the C-ABI functions of `symbiosis-au`.
//!
//! ## Architecture
//!
//! ```text
//! AU Host
//!    ↓
//! native shim
//!    ↓ (C ABI)
//! symbiosis-au   BridgeComponent: properties, parameters, presets, render
//!    ↓
//! symbiosis-core WrappedPlugin contract, preset codec, parameter mapping,
//!                bus negotiation, MIDI queue, time info
//!    ↓
//! symbiosis-vst2 VstPlugin over the dynamically loaded binary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use symbiosis::prelude::*;
//!
//! let description = ComponentDescription::new(ComponentType::Effect, fourcc!(b"Dely"), fourcc!(b"NuEd"));
//! let config = BundleConfig::from_bundle(bundle_dir, description, "NuEdge: Delay", &info_json)?;
//! symbiosis::au::factory::register_bundle(config)?;
//! ```

// Re-export sub-crates
pub use symbiosis_core as core;
pub use symbiosis_vst2 as vst2;

#[cfg(feature = "au")]
pub use symbiosis_au as au;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use symbiosis::prelude::*;
/// ```
pub mod prelude {
    pub use symbiosis_core::{
        // Identity and configuration
        fourcc, ComponentDescription, ComponentType, FourCharCode, SymbiosisConfig,
        // Errors
        LoadStage, ProtocolFault, Result, SymbiosisError,
        // Plug-in contract
        HostCallbacks, PinDirection, PinProperties, PluginFlags, TailSize, WrappedPlugin,
        // Parameters
        ParameterFlags, ParameterInfo, ParameterMap, ParameterUnit,
        // Presets
        LoadOutcome, PresetBinary, PresetPayload,
        // Buses, MIDI and timing
        BusConfiguration, BusLayout, MidiEvent, MidiEventQueue, TimeInfo,
    };

    pub use symbiosis_vst2::VstPlugin;

    #[cfg(feature = "au")]
    pub use symbiosis_au::{
        os_status, BridgeComponent, BundleConfig, EventSink, HostApplication, OSStatus, PresetDocument,
        PresetEntry, PropertyAddress, PropertyValue, Scope, UnitState,
    };
}
