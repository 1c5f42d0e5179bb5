//! Host transport and tempo state in the shape the wrapped plug-in reads it.
//!
//! The render pipeline fills a [`TimeInfo`] once per processed block from
//! whatever the host chose to report; fields the host did not report keep
//! their previous values and their validity flag stays cleared.

/// Validity and state bits of a [`TimeInfo`] snapshot.
///
/// Values match the wrapped protocol's time-info flags so the snapshot can be
/// copied straight into the plug-in's structure.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInfoFlags(pub i32);

impl TimeInfoFlags {
    pub const TRANSPORT_CHANGED: i32 = 1;
    pub const TRANSPORT_PLAYING: i32 = 1 << 1;
    pub const TRANSPORT_CYCLE_ACTIVE: i32 = 1 << 2;
    pub const TRANSPORT_RECORDING: i32 = 1 << 3;
    pub const NANOS_VALID: i32 = 1 << 8;
    pub const PPQ_POS_VALID: i32 = 1 << 9;
    pub const TEMPO_VALID: i32 = 1 << 10;
    pub const BARS_VALID: i32 = 1 << 11;
    pub const CYCLE_POS_VALID: i32 = 1 << 12;
    pub const TIME_SIG_VALID: i32 = 1 << 13;

    #[inline]
    pub fn contains(self, bits: i32) -> bool {
        (self.0 & bits) == bits
    }

    #[inline]
    pub fn insert(&mut self, bits: i32) {
        self.0 |= bits;
    }
}

/// Transport snapshot handed to the wrapped plug-in for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInfo {
    /// Position in samples; the host's timeline position when transport is known.
    pub sample_pos: f64,
    pub sample_rate: f64,
    /// Musical position in quarter notes.
    pub ppq_pos: f64,
    pub tempo: f64,
    /// Quarter-note position of the current bar's downbeat.
    pub bar_start_pos: f64,
    pub cycle_start_pos: f64,
    pub cycle_end_pos: f64,
    pub time_sig_numerator: i32,
    pub time_sig_denominator: i32,
    pub flags: TimeInfoFlags,
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self {
            sample_pos: 0.0,
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            ppq_pos: 0.0,
            tempo: 120.0,
            bar_start_pos: 0.0,
            cycle_start_pos: 0.0,
            cycle_end_pos: 0.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            flags: TimeInfoFlags::default(),
        }
    }
}

/// Beat position and tempo reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatAndTempo {
    pub beat: f64,
    pub tempo: f64,
}

/// Meter and bar position reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicalLocation {
    pub time_sig_numerator: f32,
    pub time_sig_denominator: u32,
    pub measure_downbeat: f64,
}

/// Transport state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    pub state_changed: bool,
    pub sample_in_timeline: f64,
    pub is_cycling: bool,
    pub cycle_start_beat: f64,
    pub cycle_end_beat: f64,
}

impl TimeInfo {
    /// Start a new block: position and rate are always valid, everything
    /// else must be re-reported.
    pub fn begin_block(&mut self, sample_time: f64, sample_rate: f64) {
        self.sample_pos = sample_time;
        self.sample_rate = sample_rate;
        self.flags = TimeInfoFlags::default();
    }

    pub fn apply_beat_and_tempo(&mut self, reported: BeatAndTempo) {
        self.ppq_pos = reported.beat;
        self.tempo = reported.tempo;
        self.flags
            .insert(TimeInfoFlags::PPQ_POS_VALID | TimeInfoFlags::TEMPO_VALID);
    }

    pub fn apply_musical_location(&mut self, reported: MusicalLocation) {
        self.time_sig_numerator = reported.time_sig_numerator as i32;
        self.time_sig_denominator = reported.time_sig_denominator as i32;
        self.bar_start_pos = reported.measure_downbeat;
        self.flags
            .insert(TimeInfoFlags::BARS_VALID | TimeInfoFlags::TIME_SIG_VALID);
    }

    pub fn apply_transport_state(&mut self, reported: TransportState) {
        if reported.is_playing {
            self.flags.insert(TimeInfoFlags::TRANSPORT_PLAYING);
        }
        if reported.state_changed {
            self.flags.insert(TimeInfoFlags::TRANSPORT_CHANGED);
        }
        // Song position, not samples processed so far.
        self.sample_pos = reported.sample_in_timeline;
        if reported.is_cycling {
            self.flags.insert(TimeInfoFlags::TRANSPORT_CYCLE_ACTIVE);
        }
        self.cycle_start_pos = reported.cycle_start_beat;
        self.cycle_end_pos = reported.cycle_end_beat;
        self.flags.insert(TimeInfoFlags::CYCLE_POS_VALID);
    }
}
