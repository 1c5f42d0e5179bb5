//! # symbiosis-core
//!
//! Protocol-neutral core of the Symbiosis bridge, which hosts one VST 2.x
//! plug-in inside an Audio Unit.
//!
//! Nothing in this crate knows either binary interface. It holds the parts of
//! the bridge that both sides agree on:
//!
//! - [`plugin`] - the [`WrappedPlugin`] and [`HostCallbacks`] contracts
//! - [`preset`] - the binary preset/bank codec
//! - [`parameter_map`] and [`parameter_info`] - the host-visible parameter table
//! - [`bus_config`] - channel-to-bus negotiation
//! - [`midi`] and [`transport`] - per-block event and timing state
//! - [`config`] - component identity and bundle configuration
//! - [`error`] - the shared error type

pub mod bus_config;
pub mod config;
pub mod error;
pub mod midi;
pub mod parameter_info;
pub mod parameter_map;
pub mod plugin;
pub mod preset;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bus_config::{BusConfiguration, BusDescriptor, BusLayout};
pub use config::{ComponentDescription, ComponentType, FourCharCode, SymbiosisConfig};
pub use error::{LoadStage, ProtocolFault, Result, SymbiosisError};
pub use midi::{MidiEvent, MidiEventQueue, MAX_MIDI_EVENTS};
pub use parameter_info::{ParameterFlags, ParameterInfo, ParameterUnit};
pub use parameter_map::{generate_default_mapping, ParameterMap, MAX_MAPPED_PARAMETERS};
pub use plugin::{
    truncate_name, HostCallbacks, PinDirection, PinProperties, PluginFlags, TailSize, WrappedPlugin,
    MAX_NAME_LENGTH,
};
pub use preset::{LoadOutcome, PresetBinary, PresetPayload, ProgramBlock};
pub use transport::{BeatAndTempo, MusicalLocation, TimeInfo, TimeInfoFlags, TransportState};

/// Most channels per direction.
pub const MAX_CHANNELS: usize = 32;

/// Most buses per direction.
pub const MAX_BUSES: usize = 32;

/// Most factory presets listed to the host.
pub const MAX_FACTORY_PRESETS: usize = 128;

/// Sample rate assumed before the host sets one.
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Largest block assumed before the host sets one.
pub const DEFAULT_MAX_FRAMES: usize = 4096;

/// Host identity reported to the wrapped plug-in.
pub const VENDOR: &str = "NuEdge Development";
pub const PRODUCT: &str = "Symbiosis";
pub const VENDOR_VERSION: i32 = 0x010000;
