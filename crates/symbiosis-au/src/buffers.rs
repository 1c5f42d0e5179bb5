//! Audio buffer lists and the bridge's own channel storage.
//!
//! `AudioBufferList` is a C-style structure with a variable number of
//! buffers; [`FixedBufferList`] is the same layout with room for every
//! channel of one bus, so input pulls never allocate.
//!
//! [`IoBuffers`] owns one sample vector per channel, sized to the larger of
//! the input and output channel counts. Inputs are pulled into it and the
//! plug-in processes it in place. It is reallocated wholesale whenever the
//! maximum block size changes.

use std::ffi::c_void;

use symbiosis_core::MAX_CHANNELS;

/// Core Audio AudioBuffer structure.
///
/// Represents a single buffer of audio data.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AudioBuffer {
    /// Number of interleaved channels in the buffer.
    /// For non-interleaved audio, this is always 1.
    pub number_channels: u32,
    /// Size of the buffer in bytes.
    pub data_byte_size: u32,
    /// Pointer to the audio data.
    pub data: *mut c_void,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self {
            number_channels: 1,
            data_byte_size: 0,
            data: std::ptr::null_mut(),
        }
    }
}

/// Core Audio AudioBufferList structure.
///
/// Contains a variable number of AudioBuffer structures.
/// This is a flexible array member pattern - the actual size
/// depends on `number_buffers`.
#[repr(C)]
pub struct AudioBufferList {
    /// Number of buffers in the list.
    pub number_buffers: u32,
    /// First buffer (actual array continues beyond this).
    /// Use `buffer_at()` for safe access.
    pub buffers: [AudioBuffer; 1],
}

impl AudioBufferList {
    /// Get a reference to the buffer at the given index.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `index < number_buffers`.
    #[inline]
    pub unsafe fn buffer_at(&self, index: u32) -> &AudioBuffer {
        let buffers_ptr = self.buffers.as_ptr();
        // SAFETY: the list is backed by `number_buffers` entries and the
        // caller keeps `index` below that.
        unsafe { &*buffers_ptr.add(index as usize) }
    }

    /// Get a mutable reference to the buffer at the given index.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `index < number_buffers`.
    #[inline]
    pub unsafe fn buffer_at_mut(&mut self, index: u32) -> &mut AudioBuffer {
        let buffers_ptr = self.buffers.as_mut_ptr();
        // SAFETY: as for `buffer_at`.
        unsafe { &mut *buffers_ptr.add(index as usize) }
    }
}

/// `AudioBufferList` with inline storage for [`MAX_CHANNELS`] buffers.
#[repr(C)]
pub struct FixedBufferList {
    pub number_buffers: u32,
    pub buffers: [AudioBuffer; MAX_CHANNELS],
}

impl Default for FixedBufferList {
    fn default() -> Self {
        Self {
            number_buffers: 0,
            buffers: [AudioBuffer::default(); MAX_CHANNELS],
        }
    }
}

impl FixedBufferList {
    /// Point the list at `channels`, one mono buffer each.
    pub fn point_at(&mut self, channels: &[*mut f32], frame_count: usize) {
        let count = channels.len().min(MAX_CHANNELS);
        self.number_buffers = count as u32;
        for (buffer, &channel) in self.buffers.iter_mut().zip(&channels[..count]) {
            buffer.number_channels = 1;
            buffer.data_byte_size = (frame_count * std::mem::size_of::<f32>()) as u32;
            buffer.data = channel as *mut c_void;
        }
    }

    pub fn as_list_ptr(&mut self) -> *mut AudioBufferList {
        self as *mut FixedBufferList as *mut AudioBufferList
    }

    pub fn buffers(&self) -> &[AudioBuffer] {
        &self.buffers[..self.number_buffers as usize]
    }
}

/// Per-instance channel storage shared by inputs and outputs.
pub struct IoBuffers {
    channels: Vec<Vec<f32>>,
    pointers: Vec<*mut f32>,
    max_frames: usize,
}

// SAFETY: the raw pointers only ever point into `channels`, which the struct
// owns; moving the struct moves ownership of the storage with them.
unsafe impl Send for IoBuffers {}

impl IoBuffers {
    pub fn new(channel_count: usize, max_frames: usize) -> Self {
        let mut buffers = Self {
            channels: Vec::new(),
            pointers: Vec::new(),
            max_frames: 0,
        };
        buffers.reallocate(channel_count, max_frames);
        buffers
    }

    /// Replace the storage with fresh zeroed buffers.
    pub fn reallocate(&mut self, channel_count: usize, max_frames: usize) {
        let mut channels: Vec<Vec<f32>> = (0..channel_count).map(|_| vec![0.0; max_frames]).collect();
        let pointers = channels.iter_mut().map(|channel| channel.as_mut_ptr()).collect();
        self.channels = channels;
        self.pointers = pointers;
        self.max_frames = max_frames;
        log::debug!("Allocated {} channels of {} frames", channel_count, max_frames);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Raw channel pointers, `channel_count()` long.
    pub fn pointers(&self) -> &[*mut f32] {
        &self.pointers
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Zero the first `frame_count` samples of a channel range.
    pub fn clear(&mut self, channels: std::ops::Range<usize>, frame_count: usize) {
        for channel in &mut self.channels[channels] {
            let frames = frame_count.min(channel.len());
            channel[..frames].fill(0.0);
        }
    }
}
