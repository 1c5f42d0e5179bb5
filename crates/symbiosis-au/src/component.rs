//! The Bridge Component: one wrapped plug-in presented as an Audio Unit.
//!
//! [`BridgeComponent`] owns the plug-in, the negotiated buses, the parameter
//! mapping, the factory presets and the per-instance render state. This
//! module holds construction and the control-context operations behind the
//! property surface. The lifecycle selectors live in `lifecycle.rs` and the
//! render pipeline in `render.rs`, both as further `impl` blocks.
//!
//! Nothing here locks. The host guarantees that format and bus affecting
//! property writes never race a render call on the same instance.

use std::ffi::c_void;
use std::sync::Arc;

use symbiosis_core::preset::load_preset;
use symbiosis_core::{
    generate_default_mapping, truncate_name, BusConfiguration, BusLayout, ComponentType, LoadOutcome, MidiEvent,
    MidiEventQueue, ParameterMap, ProtocolFault, Result, SymbiosisError, TimeInfo, WrappedPlugin,
    DEFAULT_MAX_FRAMES, DEFAULT_SAMPLE_RATE, MAX_CHANNELS, MAX_MIDI_EVENTS,
};
use symbiosis_vst2::VstPlugin;

use crate::buffers::{FixedBufferList, IoBuffers};
use crate::config::BundleConfig;
use crate::extensions;
use crate::host::{EventSink, HostContext};
use crate::lifecycle::UnitState;
use crate::parameters;
use crate::presets::{
    apply_document, capture_document, convert_legacy_presets, load_or_create_factory_presets, FactoryPreset,
    PresetDocument, PresetEntry,
};
use crate::properties::{PropertyAddress, PropertyInfo, PropertyRegistry, PropertyShape, PropertyValue};
use crate::types::{
    property_ids, AURenderCallback, AudioStreamBasicDescription, AudioUnitConnection, HostCallbackInfo,
    PropertyListenerProc, RenderCallbackStruct, Scope,
};
use crate::upstream;

/// Parameter mapping resource.
pub const PARAMETERS_FILE: &str = "SYParameters.txt";

pub const MAX_PROPERTY_LISTENERS: usize = 128;
pub const MAX_RENDER_NOTIFICATIONS: usize = 128;

/// Sample time no host ever reports, so the first render always processes.
pub(crate) const NO_RENDER_YET: f64 = -12345678.0;

/// A registered property listener.
#[derive(Debug, Clone, Copy)]
pub struct PropertyListener {
    pub property: u32,
    pub callback: PropertyListenerProc,
    pub ref_con: *mut c_void,
}

/// A registered pre/post render notification.
#[derive(Debug, Clone, Copy)]
pub struct RenderNotification {
    pub callback: AURenderCallback,
    pub ref_con: *mut c_void,
}

/// One wrapped plug-in instance behind the host protocol.
pub struct BridgeComponent<P: WrappedPlugin = VstPlugin> {
    pub(crate) plugin: P,
    pub(crate) host: Arc<HostContext>,
    pub(crate) bundle: BundleConfig,
    pub(crate) registry: Arc<PropertyRegistry<P>>,
    pub(crate) buses: BusConfiguration,
    pub(crate) parameters: Arc<ParameterMap>,
    pub(crate) state: UnitState,

    pub(crate) extensions: bool,
    pub(crate) supports_tail: bool,
    pub(crate) supports_bypass: bool,
    pub(crate) bypass: bool,
    pub(crate) sample_rate: f64,
    pub(crate) max_frames: usize,
    pub(crate) latency_seconds: f64,
    pub(crate) tail_seconds: f64,

    pub(crate) connections: Vec<AudioUnitConnection>,
    pub(crate) render_callbacks: Vec<RenderCallbackStruct>,
    pub(crate) host_callbacks: HostCallbackInfo,
    pub(crate) listeners: Vec<PropertyListener>,
    pub(crate) render_notifications: Vec<RenderNotification>,

    // Render state
    pub(crate) midi: MidiEventQueue,
    pub(crate) time_info: TimeInfo,
    pub(crate) buffers: IoBuffers,
    pub(crate) input_list: FixedBufferList,
    pub(crate) input_pointers: [*mut f32; MAX_CHANNELS],
    pub(crate) last_render_sample_time: f64,
    pub(crate) output_silent: bool,

    pub(crate) factory_presets: Vec<FactoryPreset>,
    pub(crate) current_preset: PresetEntry,
    /// Handle passed back to property listeners.
    pub(crate) unit: *mut c_void,
}

impl BridgeComponent<VstPlugin> {
    /// Load the wrapped binary named by `bundle` and build the component
    /// around it.
    pub fn new(bundle: BundleConfig, sink: EventSink, unit: *mut c_void) -> Result<Self> {
        let host = Arc::new(HostContext::new(sink));
        let plugin = VstPlugin::load(
            &bundle.plugin_path,
            host.clone(),
            DEFAULT_SAMPLE_RATE as f32,
            DEFAULT_MAX_FRAMES,
        )?;
        Self::with_plugin(plugin, host, bundle, unit)
    }
}

impl<P: WrappedPlugin> BridgeComponent<P> {
    /// Build the component around an unopened plug-in.
    ///
    /// Opens the plug-in, negotiates buses, reads or generates the parameter
    /// mapping and the factory presets, and converts legacy presets when the
    /// bundle asks for it.
    pub fn with_plugin(mut plugin: P, host: Arc<HostContext>, bundle: BundleConfig, unit: *mut c_void) -> Result<Self> {
        plugin.open()?;

        let input_count = plugin.input_count();
        let output_count = plugin.output_count();
        if input_count > MAX_CHANNELS || output_count > MAX_CHANNELS {
            return Err(SymbiosisError::Resource(format!(
                "{} inputs and {} outputs exceed {} channels",
                input_count, output_count, MAX_CHANNELS
            )));
        }
        if !plugin.flags().can_replacing {
            return Err(SymbiosisError::Foreign("plug-in does not support replacing processing".to_string()));
        }

        let extensions = extensions::probe(&mut plugin);
        let supports_tail = plugin.tail_size().is_supported();
        let supports_bypass = plugin.set_bypass(false);
        log::debug!(
            "Plug-in {:08x}: extensions {}, tail {}, bypass {}",
            plugin.unique_id(),
            extensions,
            supports_tail,
            supports_bypass
        );

        let require_uniform = bundle.description.component_type != ComponentType::MusicDevice
            || bundle.host.requires_uniform_channels();
        let buses = BusConfiguration::negotiate(&mut plugin, require_uniform)?;

        plugin.set_sample_rate(DEFAULT_SAMPLE_RATE as f32);
        plugin.set_block_size(DEFAULT_MAX_FRAMES);
        let buffers = IoBuffers::new(input_count.max(output_count), DEFAULT_MAX_FRAMES);

        let parameters = Arc::new(read_or_create_parameter_mapping(&mut plugin, &bundle, extensions)?);
        host.install_parameters(parameters.clone());

        let whole_bank = bundle.settings.preset_is_fxb;
        let factory_presets =
            match load_or_create_factory_presets(&mut plugin, &bundle.resources_dir, &bundle.description, whole_bank) {
                Ok(presets) => presets,
                Err(error) => {
                    log::warn!("No factory presets: {}", error);
                    Vec::new()
                }
            };
        if bundle.settings.auto_convert_presets {
            convert_legacy_presets(
                &mut plugin,
                &bundle.preset_roots,
                &bundle.name,
                &bundle.description,
                whole_bank,
            );
        }

        let input_buses = buses.inputs.len();
        let mut component = Self {
            plugin,
            host,
            registry: PropertyRegistry::standard()?,
            buses,
            parameters,
            state: UnitState::Uninitialized,
            extensions,
            supports_tail,
            supports_bypass,
            bypass: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_frames: DEFAULT_MAX_FRAMES,
            latency_seconds: 0.0,
            tail_seconds: 0.0,
            connections: vec![AudioUnitConnection::default(); input_buses],
            render_callbacks: vec![RenderCallbackStruct::default(); input_buses],
            host_callbacks: HostCallbackInfo::default(),
            listeners: Vec::new(),
            render_notifications: Vec::new(),
            midi: MidiEventQueue::with_capacity(MAX_MIDI_EVENTS),
            time_info: TimeInfo::default(),
            buffers,
            input_list: FixedBufferList::default(),
            input_pointers: [std::ptr::null_mut(); MAX_CHANNELS],
            last_render_sample_time: NO_RENDER_YET,
            output_silent: false,
            factory_presets,
            current_preset: PresetEntry::default(),
            unit,
            bundle,
        };
        component.refresh_latency_and_tail(false);
        component.update_current_preset();
        log::debug!("Created {}", component.bundle.name);
        Ok(component)
    }

    // =========================================================================
    // Property dispatch
    // =========================================================================

    pub fn property_info(&self, address: &PropertyAddress) -> Result<PropertyInfo> {
        let entry = self.registry.entry(address.id)?;
        (entry.info)(self, address)
    }

    pub fn property_shape(&self, id: u32) -> Result<PropertyShape> {
        Ok(self.registry.entry(id)?.shape)
    }

    /// Read a property. `request` carries the input half of properties that
    /// take one, such as the string/value conversions.
    pub fn get_property(&mut self, address: &PropertyAddress, request: Option<&PropertyValue>) -> Result<PropertyValue> {
        let entry = self.registry.entry(address.id)?;
        let info = (entry.info)(self, address)?;
        match entry.get {
            Some(get) if info.readable => get(self, address, request),
            _ => Err(SymbiosisError::protocol(
                ProtocolFault::InvalidProperty,
                format!("{} is not readable", entry.name),
            )),
        }
    }

    pub fn set_property(&mut self, address: &PropertyAddress, value: PropertyValue) -> Result<()> {
        let entry = self.registry.entry(address.id)?;
        let info = (entry.info)(self, address)?;
        match entry.set {
            Some(set) if info.writable => set(self, address, value),
            _ => Err(SymbiosisError::protocol(
                ProtocolFault::InvalidProperty,
                format!("{} is not writable", entry.name),
            )),
        }
    }

    /// Tell listeners of `property` that it changed. Without a listener the
    /// shim is told instead.
    pub fn property_changed(&self, property: u32, scope: u32, element: u32) {
        let mut notified = false;
        for listener in self.listeners.iter().filter(|listener| listener.property == property) {
            // SAFETY: the host registered the listener with this reference
            // constant and keeps it valid until it removes the listener.
            unsafe { (listener.callback)(listener.ref_con, self.unit, property, scope, element) };
            notified = true;
        }
        if !notified {
            self.host.notify_property(property, scope, element);
        }
    }

    fn preset_changed(&self) {
        self.property_changed(property_ids::CURRENT_PRESET, Scope::Global as u32, 0);
        self.property_changed(property_ids::PRESENT_PRESET, Scope::Global as u32, 0);
    }

    // =========================================================================
    // Buses and formats
    // =========================================================================

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn plugin_mut(&mut self) -> &mut P {
        &mut self.plugin
    }

    pub fn bundle(&self) -> &BundleConfig {
        &self.bundle
    }

    pub fn buses(&self) -> &BusConfiguration {
        &self.buses
    }

    pub fn input_buses(&self) -> &BusLayout {
        &self.buses.inputs
    }

    pub fn output_buses(&self) -> &BusLayout {
        &self.buses.outputs
    }

    /// Whether an input bus is fed by an upstream unit.
    pub fn input_is_connected(&self, address: &PropertyAddress) -> bool {
        address.scope == Scope::Input as u32
            && self
                .connections
                .get(address.element as usize)
                .is_some_and(|connection| !connection.source_audio_unit.is_null())
    }

    fn bus_layout(&self, scope: u32) -> Result<&BusLayout> {
        match Scope::from_raw(scope) {
            Some(Scope::Input) => Ok(&self.buses.inputs),
            Some(Scope::Global | Scope::Output) => Ok(&self.buses.outputs),
            None => Err(SymbiosisError::protocol(ProtocolFault::InvalidScope, format!("scope {}", scope))),
        }
    }

    fn bus_width(&self, scope: u32, element: usize) -> Result<usize> {
        self.bus_layout(scope)?
            .get(element)
            .map(|bus| bus.width())
            .ok_or_else(|| SymbiosisError::protocol(ProtocolFault::InvalidElement, format!("bus {}", element)))
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn stream_format(&self, scope: u32, element: usize) -> Result<AudioStreamBasicDescription> {
        let width = self.bus_width(scope, element)?;
        Ok(AudioStreamBasicDescription::canonical(self.sample_rate, width as u32))
    }

    /// Accept a host format for one bus.
    ///
    /// Only native-endian, non-interleaved 32-bit float with the bus's own
    /// width is accepted. Hosts with the mono-bus quirk may offer stereo; that
    /// is swallowed.
    pub fn update_format(&mut self, scope: u32, element: usize, format: &AudioStreamBasicDescription) -> Result<()> {
        let width = self.bus_width(scope, element)?;
        let required = AudioStreamBasicDescription::FLAG_IS_FLOAT
            | AudioStreamBasicDescription::FLAGS_NATIVE_ENDIAN
            | AudioStreamBasicDescription::FLAG_IS_NON_INTERLEAVED;
        let acceptable = format.format_id == AudioStreamBasicDescription::FORMAT_LINEAR_PCM
            && format.frames_per_packet == 1
            && format.bytes_per_packet == format.bytes_per_frame
            && format.format_flags & required == required
            && format.bits_per_channel == 32
            && format.bytes_per_frame == 4
            && format.channels_per_frame as usize == width;
        if !acceptable {
            if self.bundle.host.accepts_stereo_on_mono_bus() && format.channels_per_frame == 2 {
                log::warn!("Host sets a stereo format on {}-channel bus {}; accepting", width, element);
            } else {
                return Err(SymbiosisError::protocol(
                    ProtocolFault::FormatNotSupported,
                    format!("{} channels on bus {} of width {}", format.channels_per_frame, element, width),
                ));
            }
        }
        self.update_sample_rate(format.sample_rate)
    }

    pub fn update_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            return Err(SymbiosisError::protocol(
                ProtocolFault::InvalidPropertyValue,
                format!("sample rate {}", sample_rate),
            ));
        }
        self.sample_rate = sample_rate;
        self.plugin.set_sample_rate(sample_rate as f32);
        for (scope, count) in [
            (Scope::Input, self.buses.inputs.len()),
            (Scope::Output, self.buses.outputs.len()),
        ] {
            for element in 0..count as u32 {
                self.property_changed(property_ids::STREAM_FORMAT, scope as u32, element);
                self.property_changed(property_ids::SAMPLE_RATE, scope as u32, element);
            }
        }
        self.refresh_latency_and_tail(true);
        Ok(())
    }

    /// Change the largest block the host will render.
    ///
    /// Channel storage is replaced wholesale; a running plug-in is suspended
    /// around the swap.
    pub fn update_max_frames(&mut self, max_frames: usize) -> Result<()> {
        if max_frames == 0 {
            return Err(SymbiosisError::protocol(
                ProtocolFault::InvalidPropertyValue,
                "maximum frames per slice of 0",
            ));
        }
        if max_frames == self.max_frames {
            return Ok(());
        }
        let running = self.plugin.is_resumed();
        if running {
            self.plugin.suspend();
        }
        let channels = self.plugin.input_count().max(self.plugin.output_count());
        self.buffers.reallocate(channels, max_frames);
        self.max_frames = max_frames;
        if running {
            self.plugin.resume();
        }
        self.property_changed(property_ids::MAXIMUM_FRAMES_PER_SLICE, Scope::Global as u32, 0);
        self.plugin.set_block_size(max_frames);
        Ok(())
    }

    pub fn has_bus_names(&self) -> bool {
        self.buses
            .inputs
            .iter()
            .chain(self.buses.outputs.iter())
            .any(|bus| bus.label.is_some())
    }

    pub fn bus_name(&self, scope: u32, element: usize) -> Option<&str> {
        let layout = match Scope::from_raw(scope)? {
            Scope::Input => &self.buses.inputs,
            Scope::Output => &self.buses.outputs,
            Scope::Global => return None,
        };
        layout.get(element)?.label.as_deref()
    }

    // =========================================================================
    // Latency, tail and bypass
    // =========================================================================

    /// Recompute latency and tail from the plug-in, telling listeners about
    /// changes when `notify` is set.
    pub fn refresh_latency_and_tail(&mut self, notify: bool) {
        let latency = self.plugin.initial_delay() as f64 / self.sample_rate;
        let latency_changed = latency != self.latency_seconds;
        self.latency_seconds = latency;

        let mut tail_changed = false;
        if self.supports_tail {
            let tail = match self.plugin.tail_size() {
                symbiosis_core::TailSize::Samples(samples) => samples as f64 / self.sample_rate,
                symbiosis_core::TailSize::Unsupported => 0.0,
            };
            tail_changed = tail != self.tail_seconds;
            self.tail_seconds = tail;
        }

        if notify && latency_changed {
            self.property_changed(property_ids::LATENCY, Scope::Global as u32, 0);
        }
        if notify && tail_changed {
            self.property_changed(property_ids::TAIL_TIME, Scope::Global as u32, 0);
        }
    }

    pub fn latency_seconds(&self) -> f64 {
        self.latency_seconds
    }

    pub fn tail_seconds(&self) -> f64 {
        self.tail_seconds
    }

    pub fn supports_tail(&self) -> bool {
        self.supports_tail
    }

    pub fn supports_bypass(&self) -> bool {
        self.supports_bypass
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
        if !self.plugin.set_bypass(bypass) {
            log::warn!("Plug-in refused bypass {}", bypass);
        }
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    pub fn has_extensions(&self) -> bool {
        self.extensions
    }

    pub fn get_parameter(&mut self, scope: u32, id: u32) -> Result<f32> {
        parameters::get_parameter(&mut self.plugin, &self.parameters, scope, id)
    }

    pub fn set_parameter(&mut self, scope: u32, id: u32, value: f32) -> Result<()> {
        parameters::set_parameter(&mut self.plugin, &self.parameters, scope, id, value)
    }

    pub fn schedule_parameters(&mut self, events: &[crate::types::AudioUnitParameterEvent]) -> Result<()> {
        parameters::schedule_parameters(&mut self.plugin, &self.parameters, events)
    }

    pub fn string_from_value(&mut self, parameter: u32, value: Option<f32>) -> Result<String> {
        parameters::string_from_value(&mut self.plugin, &self.parameters, self.extensions, parameter, value)
    }

    pub fn value_from_string(&mut self, parameter: u32, text: &str) -> Result<f32> {
        parameters::value_from_string(&mut self.plugin, &self.parameters, self.extensions, parameter, text)
    }

    // =========================================================================
    // Connections and callbacks
    // =========================================================================

    /// Feed an input bus from an upstream unit, replacing any pull callback.
    pub fn make_connection(&mut self, element: usize, connection: AudioUnitConnection) -> Result<()> {
        if connection.dest_input_number as usize != element || element >= self.connections.len() {
            return Err(SymbiosisError::protocol(
                ProtocolFault::InvalidPropertyValue,
                format!("connection to input {} set on bus {}", connection.dest_input_number, element),
            ));
        }
        if !connection.source_audio_unit.is_null() {
            let format = upstream::source_format(&connection)?;
            self.update_format(Scope::Input as u32, element, &format)?;
        }

        let current = self.connections[element];
        let connection_changed = current.source_audio_unit != connection.source_audio_unit
            || current.source_output_number != connection.source_output_number;
        if connection_changed {
            self.connections[element] = connection;
        }
        let callback_changed = self.render_callbacks[element].is_set();
        if callback_changed {
            self.render_callbacks[element] = RenderCallbackStruct::default();
        }

        if connection_changed {
            self.property_changed(property_ids::MAKE_CONNECTION, Scope::Input as u32, element as u32);
        }
        if callback_changed {
            self.property_changed(property_ids::SET_RENDER_CALLBACK, Scope::Input as u32, element as u32);
        }
        Ok(())
    }

    /// Feed an input bus from a pull callback, dropping any connection.
    pub fn set_render_callback(&mut self, element: usize, callback: RenderCallbackStruct) -> Result<()> {
        let Some(current) = self.render_callbacks.get(element).copied() else {
            return Err(SymbiosisError::protocol(ProtocolFault::InvalidElement, format!("input {}", element)));
        };
        let callback_changed = callback_address(&current) != callback_address(&callback)
            || current.input_proc_ref_con != callback.input_proc_ref_con;
        if callback_changed {
            self.render_callbacks[element] = callback;
        }
        let connection_changed = !self.connections[element].source_audio_unit.is_null();
        if connection_changed {
            self.connections[element] = AudioUnitConnection {
                dest_input_number: element as u32,
                ..AudioUnitConnection::default()
            };
        }

        if connection_changed {
            self.property_changed(property_ids::MAKE_CONNECTION, Scope::Input as u32, element as u32);
        }
        if callback_changed {
            self.property_changed(property_ids::SET_RENDER_CALLBACK, Scope::Input as u32, element as u32);
        }
        Ok(())
    }

    pub fn host_callbacks(&self) -> HostCallbackInfo {
        self.host_callbacks
    }

    pub fn set_host_callbacks(&mut self, callbacks: HostCallbackInfo) {
        if host_callback_addresses(&callbacks) != host_callback_addresses(&self.host_callbacks) {
            self.host_callbacks = callbacks;
            self.property_changed(property_ids::HOST_CALLBACKS, Scope::Global as u32, 0);
        }
    }

    // =========================================================================
    // Listeners, notifications and MIDI
    // =========================================================================

    pub fn add_property_listener(
        &mut self,
        property: u32,
        callback: PropertyListenerProc,
        ref_con: *mut c_void,
    ) -> Result<()> {
        if self.listeners.len() >= MAX_PROPERTY_LISTENERS {
            return Err(SymbiosisError::Resource(format!(
                "more than {} property listeners",
                MAX_PROPERTY_LISTENERS
            )));
        }
        self.listeners.push(PropertyListener {
            property,
            callback,
            ref_con,
        });
        Ok(())
    }

    /// Remove every listener of `property` with this callback, and with this
    /// reference constant when one is given.
    pub fn remove_property_listener(
        &mut self,
        property: u32,
        callback: PropertyListenerProc,
        ref_con: Option<*mut c_void>,
    ) {
        self.listeners.retain(|listener| {
            let matches = listener.property == property
                && listener.callback as usize == callback as usize
                && ref_con.map_or(true, |ref_con| ref_con == listener.ref_con);
            !matches
        });
    }

    pub fn add_render_notify(&mut self, callback: AURenderCallback, ref_con: *mut c_void) -> Result<()> {
        if self.render_notifications.len() >= MAX_RENDER_NOTIFICATIONS {
            return Err(SymbiosisError::Resource(format!(
                "more than {} render notifications",
                MAX_RENDER_NOTIFICATIONS
            )));
        }
        self.render_notifications.push(RenderNotification { callback, ref_con });
        Ok(())
    }

    pub fn remove_render_notify(&mut self, callback: AURenderCallback, ref_con: *mut c_void) {
        self.render_notifications.retain(|notification| {
            notification.callback as usize != callback as usize || notification.ref_con != ref_con
        });
    }

    /// Queue a MIDI event for the next block. Dropped when the plug-in never
    /// asked for MIDI.
    pub fn midi_event(&mut self, status: u8, data1: u8, data2: u8, offset_frames: u32) -> Result<()> {
        if !self.plugin.wants_midi() {
            return Ok(());
        }
        if !self.midi.push(MidiEvent::new(offset_frames, status, data1, data2)) {
            return Err(SymbiosisError::Resource(format!("more than {} MIDI events per block", MAX_MIDI_EVENTS)));
        }
        Ok(())
    }

    /// Housekeeping on the control context.
    pub fn idle(&mut self) {
        self.plugin.idle();
        if self.host.take_display_dirty() && self.update_current_preset() {
            self.preset_changed();
        }
    }

    // =========================================================================
    // Presets
    // =========================================================================

    pub fn factory_presets(&self) -> &[FactoryPreset] {
        &self.factory_presets
    }

    pub fn factory_preset_entries(&self) -> Vec<PresetEntry> {
        self.factory_presets
            .iter()
            .enumerate()
            .map(|(number, preset)| PresetEntry {
                number: number as i32,
                name: preset.name.clone(),
            })
            .collect()
    }

    pub fn current_preset(&self) -> &PresetEntry {
        &self.current_preset
    }

    /// Follow the plug-in's program name. A new name turns the current
    /// preset into a user preset; returns whether anything changed.
    pub fn update_current_preset(&mut self) -> bool {
        let name = self.plugin.current_program_name();
        if name == self.current_preset.name {
            return false;
        }
        log::debug!("Current preset is now user preset {:?}", name);
        self.current_preset = PresetEntry { number: -1, name };
        true
    }

    /// Select a factory preset, or rename the current program when
    /// `preset.number` is negative.
    pub fn select_preset(&mut self, preset: PresetEntry) -> Result<()> {
        if preset.number < 0 {
            if !preset.name.is_empty() {
                self.plugin.set_current_program_name(&truncate_name(&preset.name));
            }
            if self.update_current_preset() || self.current_preset.number != -1 {
                self.current_preset.number = -1;
                self.preset_changed();
            }
            return Ok(());
        }

        let factory = self.factory_presets.get(preset.number as usize).ok_or_else(|| {
            SymbiosisError::protocol(
                ProtocolFault::InvalidPropertyValue,
                format!("factory preset {} of {}", preset.number, self.factory_presets.len()),
            )
        })?;
        if load_preset(&mut self.plugin, &factory.data)? == LoadOutcome::Imperfect {
            log::warn!("Factory preset {:?} may not have loaded perfectly", factory.name);
        }
        self.current_preset = PresetEntry {
            number: preset.number,
            name: factory.name.clone(),
        };
        self.preset_changed();
        Ok(())
    }

    /// The state the host stores with a session.
    pub fn capture_class_info(&mut self) -> Result<PresetDocument> {
        capture_document(
            &mut self.plugin,
            &self.bundle.description,
            &self.current_preset.name,
            self.bundle.settings.preset_is_fxb,
        )
    }

    pub fn restore_class_info(&mut self, document: &PresetDocument) -> Result<()> {
        apply_document(
            &mut self.plugin,
            document,
            &self.bundle.description,
            self.bundle.settings.update_name_on_load,
        )?;
        self.update_current_preset();
        self.current_preset.number = -1;
        self.preset_changed();
        Ok(())
    }
}

fn callback_address(callback: &RenderCallbackStruct) -> usize {
    callback.input_proc.map_or(0, |proc_| proc_ as usize)
}

fn host_callback_addresses(callbacks: &HostCallbackInfo) -> [usize; 5] {
    [
        callbacks.host_user_data as usize,
        callbacks.beat_and_tempo_proc.map_or(0, |proc_| proc_ as usize),
        callbacks.musical_time_location_proc.map_or(0, |proc_| proc_ as usize),
        callbacks.transport_state_proc.map_or(0, |proc_| proc_ as usize),
        callbacks.transport_state_proc2.map_or(0, |proc_| proc_ as usize),
    ]
}

/// Read the mapping table from the resources, generating it from the
/// plug-in first when it is missing.
fn read_or_create_parameter_mapping<P: WrappedPlugin + ?Sized>(
    plugin: &mut P,
    bundle: &BundleConfig,
    extensions: bool,
) -> Result<ParameterMap> {
    let path = bundle.resource(PARAMETERS_FILE);
    if !path.exists() {
        log::debug!("Creating default parameter mapping {}", path.display());
        std::fs::write(&path, generate_default_mapping(plugin, extensions))?;
    }
    let bytes = std::fs::read(&path)?;
    ParameterMap::parse(&String::from_utf8_lossy(&bytes), plugin.parameter_count())
}
