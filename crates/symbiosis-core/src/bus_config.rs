//! Bus/Channel Negotiator.
//!
//! The wrapped plug-in exposes a flat list of pins per direction; the host
//! wants streams (buses) with a channel count each. This module partitions
//! the pins into consecutive buses once at construction and caches the
//! result for the render path.
//!
//! Default policy pairs channels into stereo buses and leaves a mono bus for
//! an odd remainder. A pin's stereo hint, when the plug-in publishes one,
//! decides the width of the bus that starts at that pin. When the host
//! requires every bus in a direction to share one width, the first bus's
//! width is reused for the rest.

use std::ops::Range;

use crate::error::{Result, SymbiosisError};
use crate::plugin::{PinDirection, PinProperties, WrappedPlugin};
use crate::{MAX_BUSES, MAX_CHANNELS};

/// Contiguous channel group exposed to the host as one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusDescriptor {
    /// First channel (inclusive).
    pub start: usize,
    /// Last channel (exclusive).
    pub end: usize,
    /// Pin label of the first channel, if the plug-in published one.
    pub label: Option<String>,
}

impl BusDescriptor {
    pub fn width(&self) -> usize {
        self.end - self.start
    }

    pub fn channels(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Buses of one direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusLayout {
    buses: Vec<BusDescriptor>,
}

impl BusLayout {
    /// Partition `total` channels into buses.
    ///
    /// `hint` returns the pin metadata of a channel, if any. With
    /// `require_uniform` set, only the first bus consults the default policy
    /// and hints; later buses reuse its width unless that width no longer
    /// fits, in which case the remainder becomes the last bus.
    pub fn partition(
        total: usize,
        require_uniform: bool,
        mut hint: impl FnMut(usize) -> Option<PinProperties>,
    ) -> Result<Self> {
        if total > MAX_CHANNELS {
            return Err(SymbiosisError::Resource(format!(
                "{} channels exceeds the maximum of {}",
                total, MAX_CHANNELS
            )));
        }

        let mut buses = Vec::new();
        let mut start = 0;
        let mut width = 0;
        while start < total {
            let remaining = total - start;
            let properties = hint(start);
            if buses.is_empty() || !require_uniform {
                width = match &properties {
                    Some(pin) if pin.is_stereo => 2,
                    Some(_) => 1,
                    None if remaining >= 2 => 2,
                    None => 1,
                };
            }
            // Always make progress, never cross the end.
            let taken = width.clamp(1, remaining);

            if buses.len() >= MAX_BUSES {
                return Err(SymbiosisError::Resource(format!(
                    "more than {} buses needed for {} channels",
                    MAX_BUSES, total
                )));
            }
            buses.push(BusDescriptor {
                start,
                end: start + taken,
                label: properties.map(|pin| pin.label).filter(|label| !label.is_empty()),
            });
            start += taken;
        }

        Ok(Self { buses })
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    pub fn get(&self, bus: usize) -> Option<&BusDescriptor> {
        self.buses.get(bus)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BusDescriptor> {
        self.buses.iter()
    }

    pub fn total_channels(&self) -> usize {
        self.buses.last().map_or(0, |bus| bus.end)
    }

    /// Every bus has the same width.
    pub fn is_uniform(&self) -> bool {
        self.buses
            .first()
            .map_or(true, |first| self.buses.iter().all(|bus| bus.width() == first.width()))
    }

    /// Width of the first bus, or 0 without buses.
    pub fn first_width(&self) -> usize {
        self.buses.first().map_or(0, BusDescriptor::width)
    }
}

/// Negotiated buses for both directions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusConfiguration {
    pub inputs: BusLayout,
    pub outputs: BusLayout,
}

impl BusConfiguration {
    /// Partition the plug-in's pins using its published pin metadata.
    pub fn negotiate<P: WrappedPlugin + ?Sized>(plugin: &mut P, require_uniform: bool) -> Result<Self> {
        let input_count = plugin.input_count();
        let output_count = plugin.output_count();
        let inputs = BusLayout::partition(input_count, require_uniform, |pin| {
            plugin.pin_properties(PinDirection::Input, pin)
        })?;
        let outputs = BusLayout::partition(output_count, require_uniform, |pin| {
            plugin.pin_properties(PinDirection::Output, pin)
        })?;

        let config = Self { inputs, outputs };
        if require_uniform && !config.supports_uniform_channels() {
            log::warn!(
                "Pins {}/{} cannot be split into equal-width buses; per-bus formats required",
                input_count,
                output_count
            );
        }
        log::debug!(
            "{} inputs and {} outputs configured into {} input buses and {} output buses (uniform: {})",
            input_count,
            output_count,
            config.inputs.len(),
            config.outputs.len(),
            config.supports_uniform_channels()
        );
        Ok(config)
    }

    pub fn layout(&self, direction: PinDirection) -> &BusLayout {
        match direction {
            PinDirection::Input => &self.inputs,
            PinDirection::Output => &self.outputs,
        }
    }

    /// The host may be told one `(inputs, outputs)` channel configuration.
    pub fn supports_uniform_channels(&self) -> bool {
        self.inputs.is_uniform() && self.outputs.is_uniform()
    }

    /// The advertised `(inputs, outputs)` channel configuration.
    pub fn uniform_channels(&self) -> (usize, usize) {
        (self.inputs.first_width(), self.outputs.first_width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlugin;

    fn widths(layout: &BusLayout) -> Vec<usize> {
        layout.iter().map(BusDescriptor::width).collect()
    }

    #[test]
    fn test_stereo_plugin() {
        let mut plugin = MockPlugin::new(0, 0, 1).with_io(2, 2);
        let config = BusConfiguration::negotiate(&mut plugin, true).unwrap();
        assert_eq!(widths(&config.inputs), vec![2]);
        assert_eq!(widths(&config.outputs), vec![2]);
        assert!(config.supports_uniform_channels());
        assert_eq!(config.uniform_channels(), (2, 2));
    }

    #[test]
    fn test_odd_count_pairs_first() {
        let mut plugin = MockPlugin::new(0, 0, 1).with_io(0, 3);
        for require_uniform in [false, true] {
            let config = BusConfiguration::negotiate(&mut plugin, require_uniform).unwrap();
            assert_eq!(widths(&config.outputs), vec![2, 1]);
            assert!(!config.outputs.is_uniform());
            assert!(!config.supports_uniform_channels());
            assert!(config.inputs.is_empty());
        }
    }

    #[test]
    fn test_partition_is_contiguous() {
        for total in 0..=MAX_CHANNELS {
            let layout = BusLayout::partition(total, false, |_| None).unwrap();
            assert_eq!(layout.total_channels(), total);
            assert_eq!(layout.iter().map(BusDescriptor::width).sum::<usize>(), total);
            let mut next = 0;
            for bus in layout.iter() {
                assert_eq!(bus.start, next);
                next = bus.end;
            }
        }
    }

    #[test]
    fn test_mono_hints_override_pairing() {
        let layout = BusLayout::partition(4, false, |_| {
            Some(PinProperties {
                is_stereo: false,
                label: String::new(),
            })
        })
        .unwrap();
        assert_eq!(widths(&layout), vec![1, 1, 1, 1]);
        assert!(layout.is_uniform());
        assert_eq!(layout.get(0).unwrap().label, None);
    }

    #[test]
    fn test_mixed_hints_with_labels() {
        // Pin 0 is mono, pins 1-2 a stereo pair, pin 3 a trailing stereo
        // hint that cannot fit.
        let layout = BusLayout::partition(4, false, |pin| {
            Some(PinProperties {
                is_stereo: pin != 0,
                label: format!("Pin {}", pin),
            })
        })
        .unwrap();
        assert_eq!(widths(&layout), vec![1, 2, 1]);
        assert_eq!(layout.get(1).unwrap().label.as_deref(), Some("Pin 1"));
        assert_eq!(layout.get(2).unwrap().channels(), 3..4);
        assert!(!layout.is_uniform());
    }

    #[test]
    fn test_uniform_reuses_first_width() {
        let mut calls = 0;
        let layout = BusLayout::partition(6, true, |pin| {
            calls += 1;
            Some(PinProperties {
                is_stereo: pin == 0,
                label: String::new(),
            })
        })
        .unwrap();
        assert_eq!(widths(&layout), vec![2, 2, 2]);
        assert!(layout.is_uniform());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_too_many_channels() {
        assert!(matches!(
            BusLayout::partition(MAX_CHANNELS + 1, false, |_| None),
            Err(SymbiosisError::Resource(_))
        ));
    }
}
