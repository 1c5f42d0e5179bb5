//! # symbiosis-au
//!
//! Audio Unit side of the Symbiosis bridge.
//!
//! A [`BridgeComponent`] owns one wrapped VST 2.x plug-in and answers the
//! host's Audio Unit requests on its behalf: properties, parameters,
//! presets, lifecycle and rendering. A thin native shim implements the
//! component entry points and forwards each selector to the C-ABI
//! functions in [`bridge`].
//!
//! ## Architecture
//!
//! ```text
//! AU Host
//!    ↓
//! native shim ──→ bridge (C ABI, catch_unwind, OSStatus)
//!                    ↓
//!              BridgeComponent ──→ properties (registry)
//!                    │          ──→ parameters, presets, extensions
//!                    │          ──→ render (pull, process, deliver)
//!                    ↓
//!              WrappedPlugin (symbiosis-vst2::VstPlugin)
//!                    ↑
//!              HostContext (plug-in callbacks → shim EventSink)
//! ```
//!
//! Errors inside the crate are [`symbiosis_core::SymbiosisError`]; they are
//! turned into host status codes by [`error::to_os_status`] at the C-ABI
//! boundary only.

pub mod bridge;
pub mod buffers;
pub mod component;
pub mod config;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod host;
pub mod lifecycle;
pub mod parameters;
pub mod presets;
pub mod properties;
pub mod render;
pub mod types;
pub mod upstream;

pub use bridge::{Instance, SymbiosisInstance, SymbiosisInstanceHandle, IDLE_INTERVAL_MS};
pub use component::{BridgeComponent, MAX_PROPERTY_LISTENERS, MAX_RENDER_NOTIFICATIONS, PARAMETERS_FILE};
pub use config::{standard_preset_roots, BundleConfig, HostApplication};
pub use error::{fault_status, os_status, to_os_status, OSStatus};
pub use host::{EventSink, HostContext};
pub use lifecycle::UnitState;
pub use presets::{FactoryPreset, PresetDocument, PresetEntry};
pub use properties::{PropertyAddress, PropertyInfo, PropertyRegistry, PropertyShape, PropertyValue};
pub use types::{AudioStreamBasicDescription, AudioTimeStamp, Scope};
