//! Component factory.
//!
//! The native shim registers the bundle's configuration once, when the
//! component is first opened, and then creates one [`BridgeComponent`] per
//! host instance. Construction is serialized: wrapped plug-ins frequently
//! keep global state that is not safe to initialize from two threads.

use std::ffi::c_void;
use std::sync::{Mutex, OnceLock};

use symbiosis_core::{ProtocolFault, Result, SymbiosisError};
use symbiosis_vst2::VstPlugin;

use crate::component::BridgeComponent;
use crate::config::{BundleConfig, HostApplication};
use crate::host::EventSink;

/// Configuration of the bundle this binary serves.
static BUNDLE_CONFIG: OnceLock<BundleConfig> = OnceLock::new();

/// Held while a component is being constructed.
static CONSTRUCTION: Mutex<()> = Mutex::new(());

/// Register the bundle configuration.
///
/// A binary serves exactly one bundle; a second registration is refused.
pub fn register_bundle(config: BundleConfig) -> Result<()> {
    let name = config.name.clone();
    BUNDLE_CONFIG.set(config).map_err(|_| {
        SymbiosisError::protocol(ProtocolFault::InvalidArgument, "bundle already registered")
    })?;
    log::debug!("Registered bundle: {}", name);
    Ok(())
}

pub fn is_registered() -> bool {
    BUNDLE_CONFIG.get().is_some()
}

pub fn bundle_config() -> Option<&'static BundleConfig> {
    BUNDLE_CONFIG.get()
}

/// Run `construct` while no other component is being constructed.
pub fn serialized<T>(construct: impl FnOnce() -> T) -> T {
    // A panic during a previous construction leaves nothing half-built
    // behind the lock, so a poisoned lock is still usable.
    let _guard = CONSTRUCTION.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    construct()
}

/// Create a component for the registered bundle, loading the wrapped
/// plug-in.
pub fn create_component(sink: EventSink, unit: *mut c_void, host: HostApplication) -> Result<BridgeComponent<VstPlugin>> {
    let config = bundle_config()
        .ok_or_else(|| SymbiosisError::protocol(ProtocolFault::InvalidArgument, "no bundle registered"))?
        .clone()
        .with_host(host);
    serialized(|| BridgeComponent::new(config, sink, unit))
}
