//! VST 2.x side of the Symbiosis bridge.
//!
//! [`VstPlugin`] loads a plug-in binary, instantiates it and implements
//! [`symbiosis_core::WrappedPlugin`] over its dispatcher. The process-wide
//! host callback routes every request the plug-in makes back to the
//! [`symbiosis_core::HostCallbacks`] of the instance that made it.

pub mod aeffect;
mod callback;
pub mod plugin;

#[cfg(test)]
mod testing;

pub use plugin::{resolve_binary, VstPlugin, ENTRY_SYMBOLS};
