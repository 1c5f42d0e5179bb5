//! Parameter Mapping Table.
//!
//! A curated, tab-separated text table decides which of the wrapped plug-in's
//! parameters the host sees and how. Each data line has seven fields:
//!
//! ```text
//! vst param #   name   min   max   display   unit   default
//! 0             Cutoff 20    20000 =         Hz     1000
//! 3+            Mode   0     1     Lo|Mid|Hi -      0
//! ```
//!
//! - A trailing `+` on the index marks a global meta parameter.
//! - Display `=` is linear, `?` is linear with value strings from the
//!   plug-in, `b` is a boolean and anything else is a `|`-separated choice
//!   list (indexed).
//! - A unit other than `-` becomes a custom unit label.
//!
//! The first line is a header. Blank lines and lines starting with `;` are
//! ignored. Invalid lines are skipped with a warning; the first valid line for
//! an index wins.
//!
//! When the table does not exist yet, [`generate_default_mapping`] writes one
//! that exposes every parameter of the live plug-in.

use std::collections::HashMap;

use crate::error::{Result, SymbiosisError};
use crate::parameter_info::{ParameterFlags, ParameterInfo, ParameterUnit};
use crate::plugin::WrappedPlugin;

/// Maximum number of host-visible parameters.
pub const MAX_MAPPED_PARAMETERS: usize = 1024;

/// Header line of a generated table.
pub const MAPPING_HEADER: &str = "vst param #\tname\tmin\tmax\tdisplay\tunit\tdefault";

/// Immutable table of host-visible parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    /// In table order.
    parameters: Vec<ParameterInfo>,
    by_index: HashMap<usize, usize>,
}

impl ParameterMap {
    /// Parse a mapping table against a plug-in with `live_count` parameters.
    pub fn parse(text: &str, live_count: usize) -> Result<Self> {
        let mut map = ParameterMap::default();

        // Line 1 is the header.
        for (offset, line) in split_lines(text).skip(1).enumerate() {
            let line_number = offset + 2;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            match parse_line(trimmed, live_count) {
                Some(info) if map.by_index.contains_key(&info.index) => {
                    log::warn!(
                        "Parameter mapping line {}: index {} is already mapped",
                        line_number,
                        info.index
                    );
                }
                Some(info) => {
                    if map.parameters.len() >= MAX_MAPPED_PARAMETERS {
                        return Err(SymbiosisError::Resource(format!(
                            "more than {} mapped parameters",
                            MAX_MAPPED_PARAMETERS
                        )));
                    }
                    map.by_index.insert(info.index, map.parameters.len());
                    map.parameters.push(info);
                }
                None => {
                    log::warn!("Parameter mapping line {} is invalid: {:?}", line_number, line);
                }
            }
        }

        Ok(map)
    }

    /// Host-visible parameter for a wrapped parameter index.
    pub fn get(&self, index: usize) -> Option<&ParameterInfo> {
        self.by_index.get(&index).map(|slot| &self.parameters[*slot])
    }

    pub fn contains(&self, index: usize) -> bool {
        self.by_index.contains_key(&index)
    }

    /// Mapped parameters in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterInfo> {
        self.parameters.iter()
    }

    /// Host parameter ids in table order.
    pub fn ids(&self) -> Vec<u32> {
        self.parameters.iter().map(|info| info.index as u32).collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Normalized plug-in value to host value, `None` for unmapped indices.
    pub fn scale_to_host(&self, index: usize, normalized: f32) -> Option<f32> {
        self.get(index).map(|info| info.scale_to_host(normalized))
    }

    /// Host value to normalized plug-in value, `None` for unmapped indices.
    pub fn scale_from_host(&self, index: usize, host_value: f32) -> Option<f32> {
        self.get(index).map(|info| info.scale_from_host(host_value))
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut lines = text.split(['\r', '\n']);
    // Keep the header as the first item even for CRLF files, then drop the
    // empty pieces CRLF leaves behind.
    let header = lines.next();
    header.into_iter().chain(lines.filter(|line| !line.is_empty()))
}

fn parse_line(line: &str, live_count: usize) -> Option<ParameterInfo> {
    let fields: Vec<&str> = line.split('\t').filter(|field| !field.is_empty()).collect();
    if fields.len() < 7 {
        return None;
    }

    let index_field = fields[0].trim();
    let (index_text, is_meta) = match index_field.strip_suffix('+') {
        Some(stripped) => (stripped, true),
        None => (index_field, false),
    };
    let index: usize = index_text.parse().ok()?;
    let name = fields[1];
    let min: f32 = fields[2].trim().parse().ok()?;
    let max: f32 = fields[3].trim().parse().ok()?;
    let display = fields[4].trim_start();
    let unit = fields[5];
    let default: f32 = fields[6].trim().parse().ok()?;

    if index >= live_count || min >= max || default < min || default > max || display.is_empty() {
        return None;
    }

    let mut info = ParameterInfo::new(index, name, min, max, default);
    if !unit.is_empty() && unit != "-" {
        info = info.with_unit_name(unit);
    }
    let mut flags = ParameterFlags {
        has_value_strings: false,
        is_meta,
    };
    match display {
        "=" => {}
        "?" => flags.has_value_strings = true,
        "b" => {
            info.min = 0.0;
            info.max = 1.0;
            info.unit = ParameterUnit::Boolean;
        }
        choices => {
            info = info.with_choices(choices.split('|').map(str::to_string).collect());
        }
    }
    Some(info.with_flags(flags))
}

fn non_empty_or_dash(text: &str) -> &str {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        "-"
    } else {
        trimmed
    }
}

fn parse_display(text: &str) -> Option<f32> {
    text.trim_start().parse().ok()
}

/// Build a mapping table exposing every parameter of `plugin`.
///
/// Each parameter's display text is probed at 0, 0.5 and 1. When the display
/// is numeric and linear, the displayed range becomes the host range;
/// otherwise the parameter is exposed as a plain `0..1` control. The
/// parameter's value is restored after probing.
pub fn generate_default_mapping<P: WrappedPlugin + ?Sized>(plugin: &mut P, has_extensions: bool) -> String {
    let mut text = String::from(MAPPING_HEADER);
    text.push('\r');

    for index in 0..plugin.parameter_count() {
        let name = plugin.parameter_name(index);
        let label = plugin.parameter_label(index);

        let current = plugin.parameter(index);
        let display_default = plugin.parameter_display(index);
        plugin.set_parameter(index, 0.0);
        let display_low = plugin.parameter_display(index);
        plugin.set_parameter(index, 0.5);
        let display_mid = plugin.parameter_display(index);
        plugin.set_parameter(index, 1.0);
        let display_high = plugin.parameter_display(index);
        plugin.set_parameter(index, current);

        let name = non_empty_or_dash(&name);
        let mut unit = non_empty_or_dash(&label);

        let numeric = (|| {
            let low = parse_display(&display_low)?;
            let default = parse_display(&display_default)?;
            let high = parse_display(&display_high)?;
            let mid = parse_display(&display_mid)?;
            let average = (low + high) * 0.5;
            if mid < average - 0.0001 || mid > average + 0.0001 {
                return None;
            }
            Some((low, high, default))
        })();

        let (display, low, high, default) = match numeric {
            Some((low, high, default)) => ('=', low, high, default),
            None => {
                let display = if has_extensions {
                    '?'
                } else {
                    unit = "-";
                    '='
                };
                (display, 0.0, 1.0, current)
            }
        };

        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\r",
            index, name, low, high, display, unit, default
        ));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;

    const TABLE: &str = "vst param #\tname\tmin\tmax\tdisplay\tunit\tdefault\r\
        0\tCutoff\t20\t20000\t=\tHz\t1000\r\
        ; a comment\r\
        \r\
        1+\tMode\t0\t1\tLo|Mid|Hi\t-\t0\r\
        2\tActive\t0\t1\tb\t-\t1\r\
        3\tDrive\t0\t10\t?\t-\t5\r";

    #[test]
    fn test_parse_kinds() {
        let map = ParameterMap::parse(TABLE, 8).unwrap();
        assert_eq!(map.ids(), vec![0, 1, 2, 3]);

        let cutoff = map.get(0).unwrap();
        assert_eq!(cutoff.unit, ParameterUnit::CustomUnit);
        assert_eq!(cutoff.unit_name.as_deref(), Some("Hz"));
        assert_eq!(cutoff.max, 20000.0);

        let mode = map.get(1).unwrap();
        assert_eq!(mode.unit, ParameterUnit::Indexed);
        assert_eq!(mode.max, 2.0);
        assert_eq!(mode.value_strings, vec!["Lo", "Mid", "Hi"]);
        assert!(mode.flags.is_meta);

        assert_eq!(map.get(2).unwrap().unit, ParameterUnit::Boolean);
        assert!(map.get(3).unwrap().flags.has_value_strings);
        assert_eq!(map.get(3).unwrap().unit, ParameterUnit::Generic);
    }

    #[test]
    fn test_unmapped_indices_are_invisible() {
        let map = ParameterMap::parse(TABLE, 8).unwrap();
        assert!(map.get(5).is_none());
        assert!(map.scale_to_host(5, 0.5).is_none());
        assert_eq!(map.scale_to_host(0, 1.0), Some(20000.0));
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let table = "header\n\
            0\tA\t1\t0\t=\t-\t0\n\
            1\tB\t0\t1\t=\t-\t2\n\
            9\tC\t0\t1\t=\t-\t0\n\
            2\tD\t0\t1\n\
            3\tE\t0\t1\t=\t-\t0.5\n\
            3\tE again\t0\t1\t=\t-\t0.5\n";
        let map = ParameterMap::parse(table, 4).unwrap();
        assert_eq!(map.ids(), vec![3]);
        assert_eq!(map.get(3).unwrap().name, "E");
    }

    #[test]
    fn test_runs_of_tabs_are_one_separator() {
        let table = "header\r\n0\t\tWide\t\t0\t1\t\t=\t-\t\t0.25\r\n";
        let map = ParameterMap::parse(table, 1).unwrap();
        assert_eq!(map.get(0).unwrap().name, "Wide");
        assert_eq!(map.get(0).unwrap().default, 0.25);
    }

    #[test]
    fn test_too_many_parameters() {
        let mut table = String::from("header\n");
        for i in 0..=MAX_MAPPED_PARAMETERS {
            table.push_str(&format!("{}\tP\t0\t1\t=\t-\t0\n", i));
        }
        assert!(matches!(
            ParameterMap::parse(&table, MAX_MAPPED_PARAMETERS + 1),
            Err(SymbiosisError::Resource(_))
        ));
    }

    #[test]
    fn test_generate_default_linear_display() {
        let mut plugin = MockPlugin::new(0, 1, 1);
        plugin.parameter_names[0] = "Gain".into();
        plugin.parameter_labels[0] = "dB".into();
        plugin.display = |value| format!("{}", -60.0 + value * 72.0);
        plugin.programs[0][0] = 0.5;

        let text = generate_default_mapping(&mut plugin, false);
        let lines: Vec<&str> = text.split('\r').filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], MAPPING_HEADER);
        assert_eq!(lines[1], "0\tGain\t-60\t12\t=\tdB\t-24");
        // Probing restores the value.
        assert_eq!(plugin.programs[0][0], 0.5);

        let map = ParameterMap::parse(&text, 1).unwrap();
        assert_eq!(map.get(0).unwrap().unit_name.as_deref(), Some("dB"));
    }

    #[test]
    fn test_generate_default_non_numeric_display() {
        let mut plugin = MockPlugin::new(0, 1, 1);
        plugin.display = |value| if value < 0.5 { "Off".into() } else { "On".into() };
        plugin.parameter_labels[0] = "sw".into();
        plugin.programs[0][0] = 1.0;

        let text = generate_default_mapping(&mut plugin, false);
        assert!(text.contains("0\t-\t0\t1\t=\t-\t1\r"));

        let text = generate_default_mapping(&mut plugin, true);
        assert!(text.contains("0\t-\t0\t1\t?\tsw\t1\r"));
    }
}
