//! Preset documents, factory presets and legacy preset conversion.
//!
//! A preset document is what the host stores as the component's class info:
//! the component identity, a display name and the binary preset produced by
//! the preset codec. Documents are persisted as JSON with the keys
//! `version`, `type`, `subtype`, `manufacturer`, `name`, `vstdata` and an
//! optional `ProgramNumber`.
//!
//! Factory presets are documents in the bundle's resource folder, listed one
//! file name per line in `SYFactoryPresets.txt`. When the list is missing it
//! is generated from the plug-in's own programs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use symbiosis_core::config::component_name_segments;
use symbiosis_core::preset::{create_bank_preset, create_program_preset, load_preset};
use symbiosis_core::{
    truncate_name, ComponentDescription, FourCharCode, LoadOutcome, Result, SymbiosisError, WrappedPlugin,
    MAX_FACTORY_PRESETS,
};

pub const AU_PRESET_EXTENSION: &str = "aupreset";
pub const FACTORY_PRESETS_LIST: &str = "SYFactoryPresets.txt";
pub const DEFAULT_FACTORY_PRESET_FILE: &str = "FactoryPreset.aupreset";
pub const DEFAULT_FACTORY_PRESET_NAME: &str = "Default";
/// Name of the current preset before anything was loaded.
pub const INITIAL_PRESET_NAME: &str = "Untitled";

/// Persisted preset of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDocument {
    pub version: i32,
    #[serde(rename = "type")]
    pub component_type: FourCharCode,
    pub subtype: FourCharCode,
    pub manufacturer: FourCharCode,
    pub name: String,
    /// Binary program or bank.
    pub vstdata: Vec<u8>,
    #[serde(rename = "ProgramNumber", default, skip_serializing_if = "Option::is_none")]
    pub program_number: Option<i32>,
}

impl PresetDocument {
    pub const VERSION: i32 = 1;

    pub fn new(description: &ComponentDescription, name: impl Into<String>, vstdata: Vec<u8>) -> Self {
        Self {
            version: Self::VERSION,
            component_type: description.component_type.code(),
            subtype: description.subtype,
            manufacturer: description.manufacturer,
            name: name.into(),
            vstdata,
            program_number: None,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Write the document, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Check the version and that the document belongs to `description`.
    pub fn validate(&self, description: &ComponentDescription) -> Result<()> {
        if self.version != Self::VERSION {
            return Err(SymbiosisError::Format(format!("unsupported preset version {}", self.version)));
        }
        if !description.matches(
            self.component_type.as_u32(),
            self.subtype.as_u32(),
            self.manufacturer.as_u32(),
        ) {
            return Err(SymbiosisError::Format(format!(
                "preset belongs to {} {} {}",
                self.component_type, self.subtype, self.manufacturer
            )));
        }
        Ok(())
    }
}

/// Capture the plug-in's current program, or its whole bank, as a document.
pub fn capture_document<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    description: &ComponentDescription,
    name: &str,
    whole_bank: bool,
) -> Result<PresetDocument> {
    let data = if whole_bank {
        create_bank_preset(plugin)?
    } else {
        create_program_preset(plugin)?
    };
    let mut document = PresetDocument::new(description, name, data);
    document.program_number = Some(plugin.current_program() as i32);
    Ok(document)
}

/// Apply a document from the host.
///
/// The stored program number is selected first, program 0 when it is
/// missing or out of range. An imperfect load is only logged.
pub fn apply_document<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    document: &PresetDocument,
    description: &ComponentDescription,
    update_name: bool,
) -> Result<LoadOutcome> {
    document.validate(description)?;

    let program = document
        .program_number
        .filter(|&number| number >= 0 && (number as usize) < plugin.program_count())
        .unwrap_or(0);
    plugin.set_current_program(program as usize);

    let outcome = load_preset(plugin, &document.vstdata)?;
    if outcome == LoadOutcome::Imperfect {
        log::warn!("Preset {:?} may not have loaded perfectly", document.name);
    }
    if update_name {
        plugin.set_current_program_name(&truncate_name(&document.name));
    }
    Ok(outcome)
}

// =============================================================================
// Factory presets
// =============================================================================

/// One entry of the factory preset list.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryPreset {
    pub name: String,
    pub data: Vec<u8>,
}

/// Number and name of a preset as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetEntry {
    /// Index into the factory presets, -1 for a user preset.
    pub number: i32,
    pub name: String,
}

impl Default for PresetEntry {
    fn default() -> Self {
        Self {
            number: -1,
            name: INITIAL_PRESET_NAME.to_string(),
        }
    }
}

/// Read the factory presets listed in `resources_dir`.
///
/// Entries that cannot be read are logged and skipped.
pub fn load_factory_presets(resources_dir: &Path) -> Result<Vec<FactoryPreset>> {
    let list = std::fs::read_to_string(resources_dir.join(FACTORY_PRESETS_LIST))?;
    let mut presets = Vec::new();
    for line in list.split(['\r', '\n']) {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with(';') {
            continue;
        }
        if presets.len() >= MAX_FACTORY_PRESETS {
            log::warn!("More than {} factory presets listed; ignoring the rest", MAX_FACTORY_PRESETS);
            break;
        }
        match PresetDocument::load(&resources_dir.join(entry)) {
            Ok(document) => presets.push(FactoryPreset {
                name: document.name,
                data: document.vstdata,
            }),
            Err(error) => log::warn!("Skipping factory preset {:?}: {}", entry, error),
        }
    }
    log::debug!("Loaded {} factory presets", presets.len());
    Ok(presets)
}

/// Generate the factory presets and their list from the plug-in.
///
/// In bank mode one document named "Default" holds the whole bank;
/// otherwise every program becomes its own document.
pub fn create_factory_presets<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    resources_dir: &Path,
    description: &ComponentDescription,
    whole_bank: bool,
) -> Result<()> {
    let mut list = String::new();
    if whole_bank {
        let document = PresetDocument::new(description, DEFAULT_FACTORY_PRESET_NAME, create_bank_preset(plugin)?);
        document.save(&resources_dir.join(DEFAULT_FACTORY_PRESET_FILE))?;
        list.push_str(DEFAULT_FACTORY_PRESET_FILE);
        list.push('\r');
        log::debug!("Converted bank to a single factory preset");
    } else {
        convert_loaded_programs(plugin, resources_dir, description, Some(&mut list))?;
    }
    std::fs::write(resources_dir.join(FACTORY_PRESETS_LIST), list)?;
    Ok(())
}

/// Load the factory presets, generating them first when the list is missing.
pub fn load_or_create_factory_presets<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    resources_dir: &Path,
    description: &ComponentDescription,
    whole_bank: bool,
) -> Result<Vec<FactoryPreset>> {
    if !resources_dir.join(FACTORY_PRESETS_LIST).exists() {
        create_factory_presets(plugin, resources_dir, description, whole_bank)?;
    }
    load_factory_presets(resources_dir)
}

// =============================================================================
// Program conversion
// =============================================================================

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == ':' { '-' } else { c })
        .collect()
}

/// Write every program of the plug-in to `<name>.aupreset` in `dir`.
///
/// Names are trimmed, empty names are skipped, and so is a program named
/// like the last one written. Existing files are replaced. File names are
/// appended to `list`, each followed by `\r`. The selected program is
/// restored afterwards, also on failure.
pub fn convert_loaded_programs<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    dir: &Path,
    description: &ComponentDescription,
    list: Option<&mut String>,
) -> Result<()> {
    let previous = plugin.current_program();
    let result = write_programs(plugin, dir, description, list);
    plugin.set_current_program(previous);
    result
}

fn write_programs<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    dir: &Path,
    description: &ComponentDescription,
    mut list: Option<&mut String>,
) -> Result<()> {
    let mut last_name = String::new();
    for program in 0..plugin.program_count() {
        plugin.set_current_program(program);
        let name = plugin.current_program_name();
        let name = name.trim_matches(' ');
        if name.is_empty() || name == last_name {
            continue;
        }
        last_name = name.to_string();

        let document = PresetDocument::new(description, name, create_program_preset(plugin)?);
        let file_name = format!("{}.{}", sanitize_file_name(name), AU_PRESET_EXTENSION);
        document.save(&dir.join(&file_name))?;
        log::debug!("Converted program: {}", file_name);

        if let Some(list) = list.as_deref_mut() {
            list.push_str(&file_name);
            list.push('\r');
        }
    }
    Ok(())
}

// =============================================================================
// Legacy presets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyKind {
    Program,
    Bank,
}

fn legacy_kind(path: &Path) -> Option<LegacyKind> {
    let extension = path.extension()?.to_str()?;
    if extension.eq_ignore_ascii_case("fxp") {
        Some(LegacyKind::Program)
    } else if extension.eq_ignore_ascii_case("fxb") {
        Some(LegacyKind::Bank)
    } else {
        None
    }
}

/// Convert one `.fxp`/`.fxb` file next to itself.
///
/// A bank in program mode becomes a folder of per-program documents; it is
/// loaded into the plug-in to get there. Anything else is wrapped as is
/// into one document. Existing targets are left alone.
pub fn convert_legacy_preset<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    path: &Path,
    description: &ComponentDescription,
    whole_bank: bool,
) -> Result<()> {
    let kind = legacy_kind(path)
        .ok_or_else(|| SymbiosisError::Format(format!("not a legacy preset: {}", path.display())))?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    if kind == LegacyKind::Bank && !whole_bank {
        let folder = parent.join(&stem);
        if folder.exists() {
            return Ok(());
        }
        std::fs::create_dir(&folder)?;
        let bytes = std::fs::read(path)?;
        load_preset(plugin, &bytes)?;
        convert_loaded_programs(plugin, &folder, description, None)?;
        log::debug!("Converted {} to multiple presets", path.display());
    } else {
        let target = parent.join(format!("{}.{}", stem, AU_PRESET_EXTENSION));
        if target.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(path)?;
        PresetDocument::new(description, stem, bytes).save(&target)?;
        log::debug!("Converted {} to a single preset", path.display());
    }
    Ok(())
}

/// Convert the legacy presets under every root.
///
/// Each root is searched in `<root>/<Manufacturer>/<Product>/`, created when
/// missing. Failures are logged per file and per root and never returned.
pub fn convert_legacy_presets<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    roots: &[std::path::PathBuf],
    component_name: &str,
    description: &ComponentDescription,
    whole_bank: bool,
) {
    for root in roots {
        if let Err(error) = convert_in_root(plugin, root, component_name, description, whole_bank) {
            log::warn!("Failed converting presets in {}: {}", root.display(), error);
        }
    }
}

fn convert_in_root<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    root: &Path,
    component_name: &str,
    description: &ComponentDescription,
    whole_bank: bool,
) -> Result<()> {
    let mut folder = root.to_path_buf();
    for segment in component_name_segments(component_name) {
        folder.push(segment);
    }
    std::fs::create_dir_all(&folder)?;

    for entry in std::fs::read_dir(&folder)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type()?.is_file() {
            continue;
        }
        let convert = match legacy_kind(&path) {
            Some(LegacyKind::Program) => !whole_bank,
            Some(LegacyKind::Bank) => true,
            None => false,
        };
        if convert {
            log::debug!("Found legacy preset: {}", path.display());
            if let Err(error) = convert_legacy_preset(plugin, &path, description, whole_bank) {
                log::warn!("Failed converting {}: {}", path.display(), error);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbiosis_core::testing::MockPlugin;
    use symbiosis_core::{fourcc, ComponentType, PresetBinary};

    const ID: i32 = 0x4E75_4564;

    fn description() -> ComponentDescription {
        ComponentDescription::new(ComponentType::Effect, fourcc!(b"Dely"), fourcc!(b"NuEd"))
    }

    fn plugin_with_names(names: &[&str]) -> MockPlugin {
        let mut plugin = MockPlugin::new(ID, 2, names.len());
        plugin.program_names = names.iter().map(|name| name.to_string()).collect();
        for (program, values) in plugin.programs.iter_mut().enumerate() {
            values[0] = program as f32 / 10.0;
        }
        plugin
    }

    #[test]
    fn test_document_keys() {
        let mut document = PresetDocument::new(&description(), "Warm", vec![1, 2, 3]);
        document.program_number = Some(4);
        let text = String::from_utf8(document.to_bytes().unwrap()).unwrap();
        for key in ["\"version\"", "\"type\"", "\"subtype\"", "\"manufacturer\"", "\"vstdata\"", "\"ProgramNumber\""] {
            assert!(text.contains(key), "missing {}", key);
        }
        assert_eq!(PresetDocument::from_bytes(text.as_bytes()).unwrap(), document);
    }

    #[test]
    fn test_program_number_is_optional() {
        let document = PresetDocument::new(&description(), "Warm", vec![]);
        let text = String::from_utf8(document.to_bytes().unwrap()).unwrap();
        assert!(!text.contains("ProgramNumber"));
        assert_eq!(PresetDocument::from_bytes(text.as_bytes()).unwrap().program_number, None);
    }

    #[test]
    fn test_validate() {
        let document = PresetDocument::new(&description(), "Warm", vec![]);
        assert!(document.validate(&description()).is_ok());

        let other = ComponentDescription::new(ComponentType::Effect, fourcc!(b"Verb"), fourcc!(b"NuEd"));
        assert!(matches!(document.validate(&other), Err(SymbiosisError::Format(_))));

        let mut future = document.clone();
        future.version = 2;
        assert!(matches!(future.validate(&description()), Err(SymbiosisError::Format(_))));
    }

    #[test]
    fn test_capture_and_apply_document() {
        let mut plugin = plugin_with_names(&["A", "B", "C"]);
        plugin.current = 2;
        let document = capture_document(&mut plugin, &description(), "Mine", false).unwrap();
        assert_eq!(document.program_number, Some(2));

        let mut target = plugin_with_names(&["A", "B", "C"]);
        let outcome = apply_document(&mut target, &document, &description(), true).unwrap();
        assert_eq!(outcome, LoadOutcome::Perfect);
        assert_eq!(target.current, 2);
        assert_eq!(target.program_names[2], "Mine");
        approx::assert_relative_eq!(target.programs[2][0], 0.2);
    }

    #[test]
    fn test_apply_out_of_range_program_selects_first() {
        let mut plugin = plugin_with_names(&["A", "B"]);
        let mut document = capture_document(&mut plugin, &description(), "Mine", false).unwrap();
        document.program_number = Some(9);
        plugin.current = 1;
        apply_document(&mut plugin, &document, &description(), false).unwrap();
        assert_eq!(plugin.current, 0);
        assert_eq!(plugin.program_names[0], "A");
    }

    #[test]
    fn test_convert_loaded_programs() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin_with_names(&["Init", "Init", "   ", " Lead ", "Init"]);
        plugin.current = 3;

        let mut list = String::new();
        convert_loaded_programs(&mut plugin, dir.path(), &description(), Some(&mut list)).unwrap();

        // Only consecutive duplicates are skipped; the last "Init" overwrites the first.
        assert_eq!(list, "Init.aupreset\rLead.aupreset\rInit.aupreset\r");
        assert_eq!(plugin.current, 3);

        let init = PresetDocument::load(&dir.path().join("Init.aupreset")).unwrap();
        let binary = PresetBinary::decode(&init.vstdata, ID).unwrap();
        assert!(!binary.is_bank());
        assert_eq!(init.name, "Init");
        assert!(dir.path().join("Lead.aupreset").exists());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("A/B: C"), "A-B- C");
    }

    #[test]
    fn test_bank_factory_preset() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin_with_names(&["A", "B"]);
        let presets = load_or_create_factory_presets(&mut plugin, dir.path(), &description(), true).unwrap();

        let list = std::fs::read_to_string(dir.path().join(FACTORY_PRESETS_LIST)).unwrap();
        assert_eq!(list, "FactoryPreset.aupreset\r");
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "Default");
        assert!(PresetBinary::decode(&presets[0].data, ID).unwrap().is_bank());
    }

    #[test]
    fn test_program_factory_presets() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin_with_names(&["Soft", "Hard"]);
        let presets = load_or_create_factory_presets(&mut plugin, dir.path(), &description(), false).unwrap();
        let names: Vec<_> = presets.iter().map(|preset| preset.name.as_str()).collect();
        assert_eq!(names, vec!["Soft", "Hard"]);
    }

    #[test]
    fn test_existing_list_is_not_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FACTORY_PRESETS_LIST), "; nothing here\r\n").unwrap();
        let mut plugin = plugin_with_names(&["Soft"]);
        let presets = load_or_create_factory_presets(&mut plugin, dir.path(), &description(), false).unwrap();
        assert!(presets.is_empty());
        assert!(!dir.path().join("Soft.aupreset").exists());
    }

    #[test]
    fn test_bad_factory_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        PresetDocument::new(&description(), "Good", vec![9])
            .save(&dir.path().join("Good.aupreset"))
            .unwrap();
        std::fs::write(dir.path().join("Broken.aupreset"), "not json").unwrap();
        std::fs::write(
            dir.path().join(FACTORY_PRESETS_LIST),
            "; factory presets\r  Missing.aupreset\rBroken.aupreset\rGood.aupreset\r",
        )
        .unwrap();

        let presets = load_factory_presets(dir.path()).unwrap();
        assert_eq!(presets, vec![FactoryPreset { name: "Good".into(), data: vec![9] }]);
    }

    #[test]
    fn test_missing_list_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_factory_presets(dir.path()), Err(SymbiosisError::Io(_))));
    }

    #[test]
    fn test_convert_legacy_presets() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("NuEdge").join("Delay");
        std::fs::create_dir_all(&folder).unwrap();

        let mut source = plugin_with_names(&["Soft", "Hard"]);
        let fxp = create_program_preset(&mut source).unwrap();
        let fxb = create_bank_preset(&mut source).unwrap();
        std::fs::write(folder.join("Warm.FXP"), &fxp).unwrap();
        std::fs::write(folder.join("Pads.fxb"), &fxb).unwrap();
        std::fs::write(folder.join(".Hidden.fxp"), &fxp).unwrap();

        let mut plugin = plugin_with_names(&["X", "Y"]);
        let roots = vec![root.path().to_path_buf()];
        convert_legacy_presets(&mut plugin, &roots, "NuEdge: Delay", &description(), false);

        let warm = PresetDocument::load(&folder.join("Warm.aupreset")).unwrap();
        assert_eq!(warm.name, "Warm");
        assert_eq!(warm.vstdata, fxp);
        assert!(folder.join("Pads").join("Soft.aupreset").exists());
        assert!(folder.join("Pads").join("Hard.aupreset").exists());
        assert!(!folder.join(".Hidden.aupreset").exists());

        // Existing targets are never overwritten.
        std::fs::write(folder.join("Warm.aupreset"), "keep").unwrap();
        convert_legacy_presets(&mut plugin, &roots, "NuEdge: Delay", &description(), false);
        assert_eq!(std::fs::read_to_string(folder.join("Warm.aupreset")).unwrap(), "keep");
    }

    #[test]
    fn test_bank_mode_skips_programs() {
        let root = tempfile::tempdir().unwrap();
        let mut source = plugin_with_names(&["Soft"]);
        let fxp = create_program_preset(&mut source).unwrap();
        let fxb = create_bank_preset(&mut source).unwrap();

        let mut plugin = plugin_with_names(&["X"]);
        let roots = vec![root.path().to_path_buf()];
        // Creates the folders on the first pass.
        convert_legacy_presets(&mut plugin, &roots, "NuEdge: Delay", &description(), true);
        let folder = root.path().join("NuEdge").join("Delay");
        std::fs::write(folder.join("One.fxp"), &fxp).unwrap();
        std::fs::write(folder.join("All.fxb"), &fxb).unwrap();

        convert_legacy_presets(&mut plugin, &roots, "NuEdge: Delay", &description(), true);
        assert!(!folder.join("One.aupreset").exists());
        assert_eq!(PresetDocument::load(&folder.join("All.aupreset")).unwrap().vstdata, fxb);
    }

    #[test]
    fn test_conversion_failures_are_swallowed() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("NuEdge").join("Delay");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Corrupt.fxb"), b"garbage").unwrap();

        let mut plugin = plugin_with_names(&["X"]);
        convert_legacy_presets(&mut plugin, &[root.path().to_path_buf()], "NuEdge: Delay", &description(), false);
        // The folder was created before decoding failed.
        assert!(folder.join("Corrupt").is_dir());
        assert_eq!(plugin.program_names, vec!["X".to_string()]);
    }
}
