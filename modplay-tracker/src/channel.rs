//! Per-channel playback state and instrument mixing

use crate::module::{Instrument, Note};
use modplay_common::Interpolation;

/// Fractional bits of sample positions and steps.
pub(crate) const FP_SHIFT: u32 = 16;
const FP_ONE: u64 = 1 << FP_SHIFT;
const FP_MASK: u64 = FP_ONE - 1;

/// Largest period a slide can reach; matches the 16-bit period word.
pub(crate) const MAX_PERIOD: i32 = 0xFFFF;

#[derive(Debug, Clone, Default)]
pub(crate) struct Channel {
    pub id: usize,
    pub note: Note,
    pub period: i32,
    pub porta_period: i32,
    pub porta_speed: i32,
    /// Sample offset (in samples) applied on the next trigger.
    pub sample_offset: usize,
    pub sample_pos: u64,
    pub step: u64,
    pub volume: i32,
    pub panning: i32,
    pub fine_tune: u8,
    /// Mixing amplitude derived from volume, tremolo and gain.
    pub ampl: i32,
    pub instrument: usize,
    pub assigned: usize,
    pub pl_row: usize,
    pub fx_count: u8,
    pub vibrato_type: u8,
    pub vibrato_phase: u8,
    pub vibrato_speed: u8,
    pub vibrato_depth: u8,
    pub tremolo_type: u8,
    pub tremolo_phase: u8,
    pub tremolo_speed: u8,
    pub tremolo_depth: u8,
    pub vibrato_add: i32,
    pub tremolo_add: i32,
    pub arpeggio_add: usize,
}

impl Channel {
    pub fn new(id: usize) -> Self {
        // Amiga channel order: left, right, right, left.
        let panning = match id & 0x3 {
            0 | 3 => 0,
            _ => 127,
        };
        Self {
            id,
            panning,
            ..Default::default()
        }
    }

    /// Restart the assigned sample from the pending offset.
    pub fn restart_sample(&mut self) {
        self.sample_pos = (self.sample_offset as u64) << FP_SHIFT;
    }

    /// Move the period by `delta`, staying within `0..=MAX_PERIOD`.
    pub fn slide_period(&mut self, delta: i32) {
        self.period = (self.period + delta).clamp(0, MAX_PERIOD);
    }

    /// Add this channel's output for `out.len() / 2` stereo frames into `out`.
    pub fn mix_into(&mut self, instrument: &Instrument, out: &mut [f32], interpolation: Interpolation) {
        let loop_end = (instrument.loop_end() as u64) << FP_SHIFT;
        let loop_start = (instrument.loop_start as u64) << FP_SHIFT;
        let loop_length = (instrument.loop_length as u64) << FP_SHIFT;

        // Amplitude 0..=128 times pan 0..=127, scaled to 16-bit output range.
        let left_gain = (self.ampl * (127 - self.panning)) as f32 / 128.0;
        let right_gain = (self.ampl * self.panning) as f32 / 128.0;

        for frame in out.chunks_exact_mut(2) {
            if self.sample_pos >= loop_end {
                if !instrument.is_looped() {
                    self.sample_pos = loop_end;
                    return;
                }
                self.sample_pos = loop_start + (self.sample_pos - loop_start) % loop_length;
            }

            if left_gain != 0.0 || right_gain != 0.0 {
                let sample = sample_at(instrument, self.sample_pos, interpolation);
                frame[0] += sample * left_gain;
                frame[1] += sample * right_gain;
            }
            self.sample_pos += self.step;
        }
    }
}

/// Instrument sample at fixed-point position `pos`.
fn sample_at(instrument: &Instrument, pos: u64, interpolation: Interpolation) -> f32 {
    let index = (pos >> FP_SHIFT) as usize;
    let t = (pos & FP_MASK) as f32 / FP_ONE as f32;

    match interpolation {
        Interpolation::None => point(instrument, index),
        Interpolation::Linear => {
            let a = point(instrument, index);
            let b = point(instrument, index + 1);
            a + (b - a) * t
        }
        Interpolation::Cubic => {
            let p0 = point(instrument, index.saturating_sub(1));
            let p1 = point(instrument, index);
            let p2 = point(instrument, index + 1);
            let p3 = point(instrument, index + 2);
            // Catmull-Rom
            0.5 * (2.0 * p1
                + (p2 - p0) * t
                + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
                + (3.0 * (p1 - p2) + p3 - p0) * t * t * t)
        }
    }
}

/// Sample value at integer `index`, following the loop past its end.
fn point(instrument: &Instrument, index: usize) -> f32 {
    let end = instrument.loop_end();
    let index = if index < end {
        index
    } else if instrument.is_looped() {
        instrument.loop_start + (index - end) % instrument.loop_length
    } else {
        return 0.0;
    };
    instrument.data.get(index).map_or(0.0, |&s| s as f32)
}
