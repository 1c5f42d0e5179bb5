//! Lifecycle of the Bridge Component.
//!
//! ```text
//! Uninitialized --[initialize]--> Initialized (plug-in resumed)
//!       ^                               |
//!       +---------[uninitialize]--------+ (plug-in suspended)
//! ```
//!
//! `reset` keeps the state and bounces a running plug-in through
//! suspend/resume so it drops its tails. Rendering is only legal while
//! initialized.

use symbiosis_core::{ProtocolFault, Result, SymbiosisError, WrappedPlugin};

use crate::component::{BridgeComponent, NO_RENDER_YET};
use crate::types::Scope;

/// Host-visible state of a component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnitState {
    #[default]
    Uninitialized,
    Initialized,
}

impl UnitState {
    pub fn is_initialized(&self) -> bool {
        matches!(self, UnitState::Initialized)
    }
}

impl<P: WrappedPlugin> BridgeComponent<P> {
    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Start processing.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.plugin.is_resumed() {
            self.plugin.resume();
        }
        self.state = UnitState::Initialized;
        self.refresh_latency_and_tail(true);
        log::debug!("Initialized {}", self.bundle.name);
        Ok(())
    }

    pub fn uninitialize(&mut self) {
        if self.plugin.is_resumed() {
            self.plugin.suspend();
        }
        self.state = UnitState::Uninitialized;
        log::debug!("Uninitialized {}", self.bundle.name);
    }

    /// Drop any processing state. Only the global scope can be reset.
    pub fn reset(&mut self, scope: u32, element: u32) -> Result<()> {
        if scope != Scope::Global as u32 {
            return Err(SymbiosisError::protocol(
                ProtocolFault::InvalidScope,
                format!("reset of scope {} element {}", scope, element),
            ));
        }
        if self.plugin.is_resumed() {
            self.plugin.suspend();
            self.plugin.resume();
            self.refresh_latency_and_tail(true);
        }
        self.last_render_sample_time = NO_RENDER_YET;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::tests::{fixture, PLUGIN_ID};
    use symbiosis_core::testing::MockPlugin;

    #[test]
    fn test_initialize_resumes() {
        let mut fixture = fixture(MockPlugin::new(PLUGIN_ID, 1, 1));
        let component = &mut fixture.component;
        assert_eq!(component.state(), UnitState::Uninitialized);

        component.initialize().unwrap();
        assert!(component.state().is_initialized());
        assert!(component.plugin().resumed);

        // A second initialize must not resume twice.
        component.initialize().unwrap();
        assert!(component.plugin().resumed);

        component.uninitialize();
        assert_eq!(component.state(), UnitState::Uninitialized);
        assert!(!component.plugin().resumed);
        component.uninitialize();
    }

    #[test]
    fn test_reset_forgets_last_render() {
        let mut fixture = fixture(MockPlugin::new(PLUGIN_ID, 1, 1));
        let component = &mut fixture.component;
        component.initialize().unwrap();
        component.last_render_sample_time = 512.0;

        component.reset(Scope::Global as u32, 0).unwrap();
        assert_eq!(component.last_render_sample_time, NO_RENDER_YET);
        assert!(component.plugin().resumed);

        let error = component.reset(Scope::Input as u32, 0).unwrap_err();
        assert_eq!(error.protocol_fault(), Some(ProtocolFault::InvalidScope));
    }
}
