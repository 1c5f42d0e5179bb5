//! Render pipeline of the Bridge Component.
//!
//! One render call serves one output bus. The plug-in processes every
//! channel in one block, so the first call for a timestamp gathers all
//! inputs, processes, and keeps the result in the channel storage; later
//! calls for other buses with the same timestamp only copy out.
//!
//! ```text
//! pre-render notifications (last registered first)
//!   new timestamp?
//!     time info  <- host beat/tempo, musical location, transport callbacks
//!     inputs     <- pull callback | upstream unit | zeros
//!     plug-in    <- MIDI, silence hint, process_replacing, silence query
//!   output bus   -> host buffers (copied, or our pointers when null)
//! post-render notifications (last registered first)
//! ```
//!
//! Runs on the real-time context: nothing here allocates, locks or logs on
//! the success path.

use std::ops::Range;

use symbiosis_core::{BeatAndTempo, MusicalLocation, ProtocolFault, TransportState, WrappedPlugin};

use crate::buffers::AudioBufferList;
use crate::component::BridgeComponent;
use crate::error::{fault_status, os_status, OSStatus};
use crate::extensions;
use crate::types::{render_flags, AudioTimeStamp, Boolean};
use crate::upstream;

impl<P: WrappedPlugin> BridgeComponent<P> {
    /// Render `frame_count` frames of output bus `bus` into `data`.
    ///
    /// Returns the host status word directly: a failed input pull hands the
    /// puller's own status back to the host.
    ///
    /// # Safety
    ///
    /// `action_flags` may be null. `time_stamp` and `data` must be null or
    /// valid for the call, and every non-null buffer in `data` must hold
    /// `frame_count` samples.
    pub unsafe fn render(
        &mut self,
        action_flags: *mut u32,
        time_stamp: *const AudioTimeStamp,
        bus: u32,
        frame_count: u32,
        data: *mut AudioBufferList,
    ) -> OSStatus {
        if data.is_null() || time_stamp.is_null() {
            return os_status::PARAM_ERR;
        }
        let Some(channels) = self.buses.outputs.get(bus as usize).map(|output| output.channels()) else {
            return os_status::PARAM_ERR;
        };
        let frames = frame_count as usize;
        if frames > self.max_frames {
            return fault_status(ProtocolFault::TooManyFrames);
        }
        if !self.state.is_initialized() {
            return fault_status(ProtocolFault::Uninitialized);
        }

        let mut flags = if action_flags.is_null() {
            0
        } else {
            // SAFETY: checked for null; the host owns the flags word.
            unsafe { *action_flags }
        };

        self.notify_render(render_flags::PRE_RENDER, &mut flags, time_stamp, bus, frame_count, data);

        // SAFETY: checked for null above.
        let sample_time = unsafe { (*time_stamp).sample_time };
        if sample_time != self.last_render_sample_time {
            self.last_render_sample_time = sample_time;
            self.update_time_info(sample_time);
            // SAFETY: `time_stamp` is valid for the call.
            let input_silent = match unsafe { self.pull_inputs(time_stamp, frames) } {
                Ok(silent) => silent,
                Err(status) => return status,
            };
            self.process_block(input_silent, frames);
        }

        if self.output_silent {
            flags |= render_flags::OUTPUT_IS_SILENCE;
        } else {
            flags &= !render_flags::OUTPUT_IS_SILENCE;
        }
        // SAFETY: `data` is non-null and sized by the caller.
        unsafe { self.deliver_output(channels, frames, data) };

        self.notify_render(render_flags::POST_RENDER, &mut flags, time_stamp, bus, frame_count, data);
        if !action_flags.is_null() {
            // SAFETY: checked for null above.
            unsafe { *action_flags = flags };
        }
        os_status::NO_ERR
    }

    /// Call the render notifications with `phase` set, last registered
    /// first.
    fn notify_render(
        &self,
        phase: u32,
        flags: &mut u32,
        time_stamp: *const AudioTimeStamp,
        bus: u32,
        frame_count: u32,
        data: *mut AudioBufferList,
    ) {
        *flags |= phase;
        let flags_ptr: *mut u32 = &mut *flags;
        for notification in self.render_notifications.iter().rev() {
            // SAFETY: the host registered the notification with this
            // reference constant and passes valid render arguments.
            unsafe {
                (notification.callback)(notification.ref_con, flags_ptr, time_stamp, bus, frame_count, data);
            }
        }
        *flags &= !phase;
    }

    /// Refresh the time info from the host callbacks and hand it to the
    /// plug-in. Callbacks that fail leave their fields invalid.
    fn update_time_info(&mut self, sample_time: f64) {
        let callbacks = self.host_callbacks;
        let user_data = callbacks.host_user_data;
        let mut info = self.time_info;
        info.begin_block(sample_time, self.sample_rate);

        if let Some(beat_and_tempo) = callbacks.beat_and_tempo_proc {
            let mut beat = 0.0;
            let mut tempo = 120.0;
            // SAFETY: host-provided callback with its own user data.
            if unsafe { beat_and_tempo(user_data, &mut beat, &mut tempo) } == os_status::NO_ERR {
                info.apply_beat_and_tempo(BeatAndTempo { beat, tempo });
            }
        }

        if let Some(musical_location) = callbacks.musical_time_location_proc {
            let mut offset_to_next_beat = 0u32;
            let mut numerator = 4.0f32;
            let mut denominator = 4u32;
            let mut downbeat = 0.0;
            // SAFETY: as above.
            let status = unsafe {
                musical_location(
                    user_data,
                    &mut offset_to_next_beat,
                    &mut numerator,
                    &mut denominator,
                    &mut downbeat,
                )
            };
            if status == os_status::NO_ERR {
                info.apply_musical_location(MusicalLocation {
                    time_sig_numerator: numerator,
                    time_sig_denominator: denominator,
                    measure_downbeat: downbeat,
                });
            }
        }

        let mut playing: Boolean = 0;
        let mut recording: Boolean = 0;
        let mut changed: Boolean = 0;
        let mut sample_in_timeline = 0.0;
        let mut cycling: Boolean = 0;
        let mut cycle_start = 0.0;
        let mut cycle_end = 0.0;
        let status = if let Some(transport) = callbacks.transport_state_proc {
            // SAFETY: as above.
            Some(unsafe {
                transport(
                    user_data,
                    &mut playing,
                    &mut changed,
                    &mut sample_in_timeline,
                    &mut cycling,
                    &mut cycle_start,
                    &mut cycle_end,
                )
            })
        } else if let Some(transport) = callbacks.transport_state_proc2 {
            // SAFETY: as above.
            Some(unsafe {
                transport(
                    user_data,
                    &mut playing,
                    &mut recording,
                    &mut changed,
                    &mut sample_in_timeline,
                    &mut cycling,
                    &mut cycle_start,
                    &mut cycle_end,
                )
            })
        } else {
            None
        };
        if status == Some(os_status::NO_ERR) {
            info.apply_transport_state(TransportState {
                is_playing: playing != 0,
                state_changed: changed != 0,
                sample_in_timeline,
                is_cycling: cycling != 0,
                cycle_start_beat: cycle_start,
                cycle_end_beat: cycle_end,
            });
        }

        self.time_info = info;
        self.plugin.set_time_info(&info);
    }

    /// Gather every input bus into `input_pointers`.
    ///
    /// Returns whether all inputs reported silence, or the status of the
    /// first source that failed.
    ///
    /// # Safety
    ///
    /// `time_stamp` must be valid for the call.
    unsafe fn pull_inputs(&mut self, time_stamp: *const AudioTimeStamp, frames: usize) -> Result<bool, OSStatus> {
        let mut all_silent = true;
        for (index, bus) in self.buses.inputs.iter().enumerate() {
            let channels = bus.channels();
            self.input_list.point_at(&self.buffers.pointers()[channels.clone()], frames);

            let mut input_flags = 0u32;
            let callback = self.render_callbacks[index];
            let connection = self.connections[index];
            let status = if let Some(pull) = callback.input_proc {
                // SAFETY: host-provided callback; the list points into our
                // own storage sized for `max_frames`.
                unsafe {
                    pull(
                        callback.input_proc_ref_con,
                        &mut input_flags,
                        time_stamp,
                        index as u32,
                        frames as u32,
                        self.input_list.as_list_ptr(),
                    )
                }
            } else if !connection.source_audio_unit.is_null() {
                // Let the upstream unit hand over its own buffers.
                for buffer in &mut self.input_list.buffers[..channels.len()] {
                    buffer.data = std::ptr::null_mut();
                }
                // SAFETY: the host keeps connected units alive while they
                // are connected.
                unsafe {
                    upstream::pull(
                        &connection,
                        &mut input_flags,
                        time_stamp,
                        frames as u32,
                        self.input_list.as_list_ptr(),
                    )
                }
            } else {
                self.buffers.clear(channels.clone(), frames);
                input_flags = render_flags::OUTPUT_IS_SILENCE;
                os_status::NO_ERR
            };
            if status != os_status::NO_ERR {
                return Err(status);
            }
            all_silent &= input_flags & render_flags::OUTPUT_IS_SILENCE != 0;

            for (offset, buffer) in self.input_list.buffers().iter().enumerate() {
                let channel = channels.start + offset;
                self.input_pointers[channel] = if buffer.data.is_null() {
                    self.buffers.pointers()[channel]
                } else {
                    buffer.data as *mut f32
                };
            }
        }
        Ok(all_silent)
    }

    fn process_block(&mut self, input_silent: bool, frames: usize) {
        if !self.midi.is_empty() {
            self.plugin.process_events(self.midi.as_slice());
            self.midi.clear();
        }
        if self.extensions {
            extensions::hint_input_silence(&mut self.plugin, input_silent);
        }
        let inputs = self.plugin.input_count();
        let outputs = self.plugin.output_count();
        // SAFETY: input pointers were gathered for every input channel this
        // block; output pointers cover our own storage of `max_frames`.
        unsafe {
            self.plugin.process_replacing(
                &self.input_pointers[..inputs],
                &self.buffers.pointers()[..outputs],
                frames,
            );
        }
        self.output_silent = self.extensions && extensions::output_is_silent(&mut self.plugin);
    }

    /// Copy one output bus into the host's buffers, or lend our own storage
    /// where the host passed null.
    ///
    /// # Safety
    ///
    /// `data` must be valid, and every non-null buffer must hold `frames`
    /// samples.
    unsafe fn deliver_output(&self, channels: Range<usize>, frames: usize, data: *mut AudioBufferList) {
        // SAFETY: forwarded from the caller.
        let list = unsafe { &mut *data };
        let count = (list.number_buffers as usize).min(channels.len());
        for offset in 0..count {
            let source = self.buffers.pointers()[channels.start + offset];
            // SAFETY: `offset` is below `number_buffers`.
            let buffer = unsafe { list.buffer_at_mut(offset as u32) };
            if buffer.data.is_null() {
                buffer.data = source as *mut std::ffi::c_void;
            } else {
                // SAFETY: both sides hold `frames` samples; the host may
                // hand back our own pointer, so the copy may overlap.
                unsafe { std::ptr::copy(source, buffer.data as *mut f32, frames) };
            }
            buffer.data_byte_size = (frames * std::mem::size_of::<f32>()) as u32;
        }
    }
}
