//! Environment of one bridge component.
//!
//! [`BundleConfig`] gathers what the Bridge Component needs from the bundle
//! it was loaded from: identity, resource folder, the wrapped binary, the
//! `SYConfig` switches, the preset search roots and the identity of the
//! host application.

use std::path::{Path, PathBuf};

use symbiosis_core::{ComponentDescription, Result, SymbiosisConfig, SymbiosisError};

/// File extension of a wrapped plug-in bundle.
pub const PLUGIN_EXTENSION: &str = "vst";

/// Host applications whose quirks change negotiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostApplication {
    #[default]
    Undetermined,
    /// Logic before 8.0.
    OlderLogic,
    /// Logic 8.0.0.
    Logic8_0,
    /// GarageBand before 4.2.
    OlderGarageBand,
}

impl HostApplication {
    /// Classify a host from its bundle identifier and version string.
    pub fn identify(bundle_id: &str, version: &str) -> Self {
        let version = parse_version(version);
        match bundle_id {
            "com.apple.logic.pro" | "com.apple.logic.express" => {
                if version < [8, 0, 0] {
                    HostApplication::OlderLogic
                } else if version < [8, 0, 1] {
                    HostApplication::Logic8_0
                } else {
                    HostApplication::Undetermined
                }
            }
            "com.apple.garageband" if version < [4, 2, 0] => HostApplication::OlderGarageBand,
            _ => HostApplication::Undetermined,
        }
    }

    /// The host cannot handle buses of different widths, even on
    /// instruments.
    pub fn requires_uniform_channels(&self) -> bool {
        matches!(self, HostApplication::OlderLogic)
    }

    /// The host offers stereo formats to mono buses and expects them to be
    /// accepted.
    pub fn accepts_stereo_on_mono_bus(&self) -> bool {
        matches!(self, HostApplication::Logic8_0 | HostApplication::OlderGarageBand)
    }
}

/// `"major.minor.patch"`, missing or non-numeric parts read as 0.
fn parse_version(text: &str) -> [u32; 3] {
    let mut parts = [0; 3];
    for (slot, part) in parts.iter_mut().zip(text.trim().split('.')) {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        *slot = digits.parse().unwrap_or(0);
    }
    parts
}

/// Everything the bridge reads from its environment.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    pub description: ComponentDescription,
    /// `"Manufacturer: Product"`.
    pub name: String,
    pub resources_dir: PathBuf,
    /// Wrapped plug-in bundle or binary.
    pub plugin_path: PathBuf,
    pub settings: SymbiosisConfig,
    /// Preset roots searched for legacy presets, user domain first.
    pub preset_roots: Vec<PathBuf>,
    pub host: HostApplication,
}

impl BundleConfig {
    /// Read the configuration of the bundle at `bundle_dir`.
    ///
    /// The wrapped plug-in is the single `.vst` entry in the bundle's
    /// resource folder. Without one, the bundle itself is the plug-in.
    pub fn from_bundle(
        bundle_dir: &Path,
        description: ComponentDescription,
        name: impl Into<String>,
        info_json: &str,
    ) -> Result<Self> {
        let resources_dir = bundle_dir.join("Contents").join("Resources");
        let settings = SymbiosisConfig::from_info_json(info_json)?;
        let plugin_path = match find_plugin(&resources_dir)? {
            Some(path) => path,
            None => bundle_dir.to_path_buf(),
        };
        log::debug!("Wrapped plug-in: {}", plugin_path.display());

        Ok(Self {
            description,
            name: name.into(),
            resources_dir,
            plugin_path,
            settings,
            preset_roots: Vec::new(),
            host: HostApplication::Undetermined,
        })
    }

    /// Configuration for a plug-in at a known path.
    pub fn new(description: ComponentDescription, name: impl Into<String>, resources_dir: PathBuf) -> Self {
        Self {
            description,
            name: name.into(),
            plugin_path: resources_dir.clone(),
            resources_dir,
            settings: SymbiosisConfig::default(),
            preset_roots: Vec::new(),
            host: HostApplication::Undetermined,
        }
    }

    pub fn with_plugin_path(mut self, path: PathBuf) -> Self {
        self.plugin_path = path;
        self
    }

    pub fn with_settings(mut self, settings: SymbiosisConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_preset_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.preset_roots = roots;
        self
    }

    pub fn with_host(mut self, host: HostApplication) -> Self {
        self.host = host;
        self
    }

    /// Path of a resource file.
    pub fn resource(&self, name: &str) -> PathBuf {
        self.resources_dir.join(name)
    }
}

/// Preset search roots, user domain first.
pub fn standard_preset_roots(home: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = Vec::with_capacity(2);
    if let Some(home) = home {
        roots.push(home.join("Library").join("Audio").join("Presets"));
    }
    roots.push(PathBuf::from("/Library/Audio/Presets"));
    roots
}

fn find_plugin(resources_dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(resources_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let mut found = None;
    for entry in entries {
        let path = entry?.path();
        let is_plugin = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PLUGIN_EXTENSION));
        if !is_plugin {
            continue;
        }
        if found.is_some() {
            return Err(SymbiosisError::LoadFailed {
                path: resources_dir.to_path_buf(),
                stage: symbiosis_core::LoadStage::Opening,
                reason: "more than one wrapped plug-in in resources".to_string(),
            });
        }
        found = Some(path);
    }
    Ok(found)
}
