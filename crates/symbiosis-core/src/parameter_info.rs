//! Host-visible parameter metadata.
//!
//! This module provides types for describing one mapped parameter:
//! - [`ParameterInfo`] - Complete description (name, range, default, strings)
//! - [`ParameterFlags`] - Behavioural flags (value strings, global meta)
//! - [`ParameterUnit`] - Unit class, which also selects the quantization rule
//!
//! The wrapped plug-in works in normalized `[0, 1]` values; the host sees
//! values in the mapped `[min, max]` range. [`ParameterInfo::scale_to_host`]
//! and [`ParameterInfo::scale_from_host`] convert between the two.

/// AudioUnitParameterUnit values used by mapped parameters.
///
/// The values match Apple's `AudioUnitParameterUnit` enum for direct FFI
/// compatibility.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ParameterUnit {
    /// Generic parameter (default slider)
    #[default]
    Generic = 0,
    /// Indexed parameter (dropdown menu)
    Indexed = 1,
    /// Boolean parameter (checkbox)
    Boolean = 2,
    /// Custom unit (use `unit_name` for display)
    CustomUnit = 26,
}

impl ParameterUnit {
    /// Whether host values of this unit are whole numbers.
    #[inline]
    pub const fn is_quantized(&self) -> bool {
        matches!(self, ParameterUnit::Indexed | ParameterUnit::Boolean)
    }
}

/// Flags controlling parameter presentation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParameterFlags {
    /// The host should ask for a display string per value.
    pub has_value_strings: bool,
    /// Changing this parameter may change others.
    pub is_meta: bool,
}

impl ParameterFlags {
    pub const AU_VALUES_HAVE_STRINGS: u32 = 1 << 21;
    pub const AU_IS_GLOBAL_META: u32 = 1 << 18;
    pub const AU_HAS_CF_NAME_STRING: u32 = 1 << 27;
    pub const AU_IS_READABLE: u32 = 1 << 30;
    pub const AU_IS_WRITABLE: u32 = 1 << 31;

    /// The `AudioUnitParameterInfo` flag word for a mapped parameter.
    pub const fn au_flags(&self) -> u32 {
        let mut flags = Self::AU_HAS_CF_NAME_STRING | Self::AU_IS_READABLE | Self::AU_IS_WRITABLE;
        if self.has_value_strings {
            flags |= Self::AU_VALUES_HAVE_STRINGS;
        }
        if self.is_meta {
            flags |= Self::AU_IS_GLOBAL_META;
        }
        flags
    }
}

/// One host-visible parameter.
///
/// Immutable once the mapping table is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    /// Index in the wrapped plug-in's packed parameter space; also the host
    /// parameter id.
    pub index: usize,
    pub name: String,
    /// Display unit for [`ParameterUnit::CustomUnit`].
    pub unit_name: Option<String>,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: ParameterUnit,
    pub flags: ParameterFlags,
    /// Choice labels of an indexed parameter, one per whole value from `min`.
    pub value_strings: Vec<String>,
}

impl ParameterInfo {
    /// Linear parameter covering `[min, max]`.
    pub fn new(index: usize, name: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            index,
            name: name.into(),
            unit_name: None,
            min,
            max,
            default,
            unit: ParameterUnit::Generic,
            flags: ParameterFlags::default(),
            value_strings: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: ParameterUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_unit_name(mut self, unit_name: impl Into<String>) -> Self {
        self.unit_name = Some(unit_name.into());
        self.unit = ParameterUnit::CustomUnit;
        self
    }

    pub fn with_flags(mut self, flags: ParameterFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Indexed parameter over a list of choices; range becomes `0..n-1`.
    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.min = 0.0;
        self.max = choices.len().saturating_sub(1) as f32;
        self.unit = ParameterUnit::Indexed;
        self.value_strings = choices;
        self
    }

    /// Convert a normalized plug-in value to the host's range.
    ///
    /// Indexed and boolean values round to the nearest whole number with
    /// ties going up (`floor(x + 0.5)`), which recovers both endpoints
    /// exactly.
    pub fn scale_to_host(&self, normalized: f32) -> f32 {
        let value = self.min + normalized * (self.max - self.min);
        if self.unit.is_quantized() {
            (value + 0.5).floor()
        } else {
            value
        }
    }

    /// Convert a host value back to the plug-in's normalized range.
    pub fn scale_from_host(&self, host_value: f32) -> f32 {
        (host_value - self.min) / (self.max - self.min)
    }

    /// Whether the host can ask for this parameter's choice list.
    pub fn has_choices(&self) -> bool {
        !self.value_strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn all_kinds() -> Vec<ParameterInfo> {
        vec![
            ParameterInfo::new(0, "Cutoff", 20.0, 20000.0, 1000.0),
            ParameterInfo::new(1, "Gain", -60.0, 12.0, 0.0).with_unit_name("dB"),
            ParameterInfo::new(2, "Enabled", 0.0, 1.0, 1.0).with_unit(ParameterUnit::Boolean),
            ParameterInfo::new(3, "Mode", 0.0, 0.0, 0.0)
                .with_choices(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
        ]
    }

    #[test]
    fn test_endpoints_are_exact() {
        for info in all_kinds() {
            assert_eq!(info.scale_to_host(0.0), info.min, "{}", info.name);
            assert_eq!(info.scale_to_host(1.0), info.max, "{}", info.name);
            assert_eq!(info.scale_from_host(info.scale_to_host(0.0)), 0.0, "{}", info.name);
            assert_eq!(info.scale_from_host(info.scale_to_host(1.0)), 1.0, "{}", info.name);
        }
    }

    #[test]
    fn test_linear_midpoint_round_trip() {
        for info in all_kinds().into_iter().filter(|i| !i.unit.is_quantized()) {
            assert_abs_diff_eq!(info.scale_from_host(info.scale_to_host(0.5)), 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_indexed_rounding() {
        let info = ParameterInfo::new(3, "Mode", 0.0, 3.0, 0.0).with_unit(ParameterUnit::Indexed);
        assert_eq!(info.scale_to_host(0.4), 1.0);
        assert_abs_diff_eq!(info.scale_from_host(1.0), 1.0 / 3.0, epsilon = 1e-6);
        // Ties go up.
        assert_eq!(info.scale_to_host(0.5), 2.0);
    }

    #[test]
    fn test_boolean_rounding() {
        let info = ParameterInfo::new(2, "On", 0.0, 1.0, 0.0).with_unit(ParameterUnit::Boolean);
        assert_eq!(info.scale_to_host(0.49), 0.0);
        assert_eq!(info.scale_to_host(0.5), 1.0);
        assert_eq!(info.scale_from_host(info.scale_to_host(0.5)), 1.0);
    }

    #[test]
    fn test_choices_set_range() {
        let info = ParameterInfo::new(0, "Wave", 5.0, 9.0, 0.0)
            .with_choices(vec!["Sine".into(), "Saw".into()]);
        assert_eq!(info.min, 0.0);
        assert_eq!(info.max, 1.0);
        assert_eq!(info.unit, ParameterUnit::Indexed);
        assert!(info.has_choices());
    }

    #[test]
    fn test_au_flags() {
        let plain = ParameterFlags::default().au_flags();
        assert_ne!(plain & ParameterFlags::AU_IS_READABLE, 0);
        assert_ne!(plain & ParameterFlags::AU_IS_WRITABLE, 0);
        assert_eq!(plain & ParameterFlags::AU_VALUES_HAVE_STRINGS, 0);

        let meta = ParameterFlags {
            has_value_strings: true,
            is_meta: true,
        }
        .au_flags();
        assert_ne!(meta & ParameterFlags::AU_VALUES_HAVE_STRINGS, 0);
        assert_ne!(meta & ParameterFlags::AU_IS_GLOBAL_META, 0);
    }

    #[test]
    fn test_unit_values_match_audio_unit() {
        assert_eq!(ParameterUnit::Generic as u32, 0);
        assert_eq!(ParameterUnit::Indexed as u32, 1);
        assert_eq!(ParameterUnit::Boolean as u32, 2);
        assert_eq!(ParameterUnit::CustomUnit as u32, 26);
    }
}
