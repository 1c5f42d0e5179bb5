//! Parameter bridge between the host and the wrapped plug-in.
//!
//! The host only sees parameters present in the [`ParameterMap`], addressed
//! by their wrapped index and expressed in the mapped range. The plug-in
//! sees normalized values; every host write is clamped into `[0, 1]` before
//! it reaches the plug-in.

use std::ffi::c_char;

use symbiosis_core::{ParameterMap, ProtocolFault, Result, SymbiosisError, WrappedPlugin};

use crate::extensions;
use crate::types::{AudioUnitParameterEvent, ParameterInfoRecord, Scope};

fn check_scope(scope: u32) -> Result<()> {
    if scope != Scope::Global as u32 {
        return Err(SymbiosisError::protocol(
            ProtocolFault::InvalidScope,
            format!("parameter scope {}", scope),
        ));
    }
    Ok(())
}

/// A parameter id the host may address: inside the plug-in's range and
/// present in the mapping table.
fn check_mapped<P: WrappedPlugin + ?Sized>(plugin: &P, parameters: &ParameterMap, id: u32) -> Result<usize> {
    let index = id as usize;
    if index >= plugin.parameter_count() || !parameters.contains(index) {
        return Err(SymbiosisError::protocol(
            ProtocolFault::InvalidParameter,
            format!("parameter {}", id),
        ));
    }
    Ok(index)
}

fn check_in_range<P: WrappedPlugin + ?Sized>(plugin: &P, id: u32) -> Result<usize> {
    let index = id as usize;
    if index >= plugin.parameter_count() {
        return Err(SymbiosisError::protocol(
            ProtocolFault::InvalidParameter,
            format!("parameter {}", id),
        ));
    }
    Ok(index)
}

/// Current value of a mapped parameter in host units.
pub fn get_parameter<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    parameters: &ParameterMap,
    scope: u32,
    id: u32,
) -> Result<f32> {
    check_scope(scope)?;
    let index = check_mapped(plugin, parameters, id)?;
    let normalized = plugin.parameter(index);
    Ok(parameters.scale_to_host(index, normalized).unwrap_or(normalized))
}

/// Set a mapped parameter from a host value.
pub fn set_parameter<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    parameters: &ParameterMap,
    scope: u32,
    id: u32,
    value: f32,
) -> Result<()> {
    check_scope(scope)?;
    let index = check_mapped(plugin, parameters, id)?;
    let normalized = parameters.scale_from_host(index, value).unwrap_or(value);
    plugin.set_parameter(index, normalized.clamp(0.0, 1.0));
    Ok(())
}

/// Apply scheduled parameter events.
///
/// Immediate events take effect at once, whatever their buffer offset.
/// Ramps are accepted and ignored. The first invalid event stops the batch.
pub fn schedule_parameters<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    parameters: &ParameterMap,
    events: &[AudioUnitParameterEvent],
) -> Result<()> {
    for event in events {
        check_scope(event.scope)?;
        let index = check_mapped(plugin, parameters, event.parameter)?;
        if let Some(value) = event.immediate_value() {
            let normalized = parameters.scale_from_host(index, value).unwrap_or(value);
            plugin.set_parameter(index, normalized.clamp(0.0, 1.0));
        }
    }
    Ok(())
}

pub(crate) fn copy_str_to_char_array(s: &str, dest: &mut [c_char]) {
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(dest.len() - 1);
    for (slot, &byte) in dest.iter_mut().zip(&bytes[..copy_len]) {
        *slot = byte as c_char;
    }
    dest[copy_len] = 0;
}

/// Metadata of a mapped parameter, shaped for the shim.
pub fn parameter_info_record(parameters: &ParameterMap, id: u32) -> Result<ParameterInfoRecord> {
    let info = parameters.get(id as usize).ok_or_else(|| {
        SymbiosisError::protocol(ProtocolFault::InvalidParameter, format!("parameter {} is not mapped", id))
    })?;

    let mut record = ParameterInfoRecord {
        id,
        unit: info.unit as u32,
        min_value: info.min,
        max_value: info.max,
        default_value: info.default,
        flags: info.flags.au_flags(),
        ..ParameterInfoRecord::default()
    };
    copy_str_to_char_array(&info.name, &mut record.name);
    if let Some(unit_name) = &info.unit_name {
        copy_str_to_char_array(unit_name, &mut record.unit_name);
    }
    Ok(record)
}

/// Choice labels of an indexed parameter.
pub fn value_strings(parameters: &ParameterMap, id: u32) -> Result<Vec<String>> {
    match parameters.get(id as usize) {
        Some(info) if info.has_choices() => Ok(info.value_strings.clone()),
        _ => Err(SymbiosisError::protocol(
            ProtocolFault::InvalidParameter,
            format!("parameter {} has no value strings", id),
        )),
    }
}

fn extensions_required(extensions: bool) -> Result<()> {
    if !extensions {
        return Err(SymbiosisError::protocol(
            ProtocolFault::InvalidProperty,
            "plug-in has no text conversion",
        ));
    }
    Ok(())
}

/// Display text for a host value, or for the current value when `value`
/// is `None`.
pub fn string_from_value<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    parameters: &ParameterMap,
    extensions: bool,
    id: u32,
    value: Option<f32>,
) -> Result<String> {
    extensions_required(extensions)?;
    let index = check_in_range(plugin, id)?;
    let text = match value {
        None => plugin.parameter_display(index),
        Some(value) => {
            let normalized = parameters.scale_from_host(index, value).unwrap_or(value);
            extensions::value_to_string(plugin, index, normalized).ok_or_else(|| {
                SymbiosisError::protocol(ProtocolFault::InvalidProperty, "value to string refused")
            })?
        }
    };
    Ok(text.trim_start_matches(' ').to_string())
}

/// Host value for a display text.
pub fn value_from_string<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    parameters: &ParameterMap,
    extensions: bool,
    id: u32,
    text: &str,
) -> Result<f32> {
    extensions_required(extensions)?;
    let index = check_in_range(plugin, id)?;
    let normalized = extensions::string_to_value(plugin, index, text)
        .ok_or_else(|| SymbiosisError::protocol(ProtocolFault::InvalidProperty, "string to value refused"))?;
    Ok(parameters.scale_to_host(index, normalized).unwrap_or(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PARAMETER_EVENT_RAMPED;
    use approx::assert_relative_eq;
    use std::ffi::CStr;
    use symbiosis_core::testing::MockPlugin;

    const TABLE: &str = "header\r\
        0\tGain\t-60\t12\t=\tdB\t0\r\
        1\tMix\t0\t100\t?\t-\t50\r\
        2\tMode\t0\t3\tA|B|C|D\t-\t0\r";

    fn setup() -> (MockPlugin, ParameterMap) {
        let mut plugin = MockPlugin::new(1, 4, 1);
        plugin.extensions = true;
        let parameters = ParameterMap::parse(TABLE, 4).unwrap();
        (plugin, parameters)
    }

    fn fault<T: std::fmt::Debug>(result: Result<T>) -> ProtocolFault {
        result.unwrap_err().protocol_fault().unwrap()
    }

    #[test]
    fn test_get_and_set_in_host_units() {
        let (mut plugin, parameters) = setup();
        set_parameter(&mut plugin, &parameters, 0, 0, 12.0).unwrap();
        assert_relative_eq!(plugin.parameter(0), 1.0);
        assert_relative_eq!(get_parameter(&mut plugin, &parameters, 0, 0).unwrap(), 12.0);

        plugin.set_parameter(2, 0.4);
        assert_eq!(get_parameter(&mut plugin, &parameters, 0, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_host_writes_are_clamped() {
        let (mut plugin, parameters) = setup();
        set_parameter(&mut plugin, &parameters, 0, 0, 40.0).unwrap();
        assert_eq!(plugin.parameter(0), 1.0);
        set_parameter(&mut plugin, &parameters, 0, 0, -100.0).unwrap();
        assert_eq!(plugin.parameter(0), 0.0);
    }

    #[test]
    fn test_invalid_addresses() {
        let (mut plugin, parameters) = setup();
        assert_eq!(fault(get_parameter(&mut plugin, &parameters, 1, 0)), ProtocolFault::InvalidScope);
        // Index 3 exists in the plug-in but is not mapped.
        assert_eq!(fault(get_parameter(&mut plugin, &parameters, 0, 3)), ProtocolFault::InvalidParameter);
        assert_eq!(fault(set_parameter(&mut plugin, &parameters, 0, 9, 0.0)), ProtocolFault::InvalidParameter);
    }

    #[test]
    fn test_schedule_applies_immediate_events_only() {
        let (mut plugin, parameters) = setup();
        let mut ramp = AudioUnitParameterEvent::immediate(1, 100.0);
        ramp.event_type = PARAMETER_EVENT_RAMPED;
        let events = [AudioUnitParameterEvent::immediate(0, -60.0), ramp];
        plugin.set_parameter(0, 0.5);

        schedule_parameters(&mut plugin, &parameters, &events).unwrap();
        assert_eq!(plugin.parameter(0), 0.0);
        assert_eq!(plugin.parameter(1), 0.0);

        let bad = [AudioUnitParameterEvent::immediate(3, 1.0)];
        assert_eq!(fault(schedule_parameters(&mut plugin, &parameters, &bad)), ProtocolFault::InvalidParameter);
    }

    #[test]
    fn test_info_record() {
        let (_, parameters) = setup();
        let record = parameter_info_record(&parameters, 0).unwrap();
        // SAFETY: the record's strings are NUL-terminated.
        let name = unsafe { CStr::from_ptr(record.name.as_ptr()) };
        let unit_name = unsafe { CStr::from_ptr(record.unit_name.as_ptr()) };
        assert_eq!(name.to_str().unwrap(), "Gain");
        assert_eq!(unit_name.to_str().unwrap(), "dB");
        assert_eq!(record.min_value, -60.0);
        assert_eq!(record.max_value, 12.0);
        assert_ne!(record.flags & symbiosis_core::ParameterFlags::AU_IS_WRITABLE, 0);

        assert_eq!(fault(parameter_info_record(&parameters, 3)), ProtocolFault::InvalidParameter);
    }

    #[test]
    fn test_copy_str_truncates() {
        let mut dest = [1 as c_char; 4];
        copy_str_to_char_array("abcdef", &mut dest);
        assert_eq!(dest, [b'a' as c_char, b'b' as c_char, b'c' as c_char, 0]);
    }

    #[test]
    fn test_value_strings() {
        let (_, parameters) = setup();
        assert_eq!(value_strings(&parameters, 2).unwrap(), vec!["A", "B", "C", "D"]);
        assert_eq!(fault(value_strings(&parameters, 0)), ProtocolFault::InvalidParameter);
    }

    #[test]
    fn test_string_from_value() {
        let (mut plugin, parameters) = setup();
        // Mix is 0..100; 25 is 0.25 normalized, displayed as 25.0 by the mock.
        let text = string_from_value(&mut plugin, &parameters, true, 1, Some(25.0)).unwrap();
        assert_eq!(text, "25.0");

        plugin.set_parameter(1, 0.5);
        let current = string_from_value(&mut plugin, &parameters, true, 1, None).unwrap();
        assert_eq!(current, "0.50");

        assert_eq!(
            fault(string_from_value(&mut plugin, &parameters, false, 1, None)),
            ProtocolFault::InvalidProperty
        );
        assert_eq!(
            fault(string_from_value(&mut plugin, &parameters, true, 7, None)),
            ProtocolFault::InvalidParameter
        );
    }

    #[test]
    fn test_value_from_string() {
        let (mut plugin, parameters) = setup();
        let value = value_from_string(&mut plugin, &parameters, true, 1, "40").unwrap();
        assert_relative_eq!(value, 40.0, epsilon = 1e-4);
        assert_eq!(
            fault(value_from_string(&mut plugin, &parameters, true, 1, "loud")),
            ProtocolFault::InvalidProperty
        );
    }
}
