//! Module sequencing and rendering
//!
//! `ModRenderer` steps through the order list tick by tick, applies the
//! ProTracker effect set per channel, and mixes the channels into 16-bit PCM.
//! The playback clock is derived from the request delta, so the same module
//! renders identically for the same sequence of requests.

use crate::channel::{Channel, FP_SHIFT};
use crate::module::{Module, ROWS_PER_PATTERN};
use crate::tables::{ARP_TUNING, FINE_TUNING, SINE_TABLE};
use modplay_common::{ChannelLayout, Interpolation, ModuleEvent, ModuleSource, RenderRequest};
use tracing::{debug, trace};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_SPEED: i32 = 6;
const DEFAULT_TEMPO: u32 = 125;

/// Song position and timing shared by all channels.
#[derive(Debug)]
struct Sequencer {
    sample_rate: u32,
    c2_rate: u32,
    gain: i32,
    tempo: u32,
    /// Frames per tick at the current tempo.
    tick_len: usize,
    tick_offset: usize,
    position: usize,
    break_pattern: Option<usize>,
    row: usize,
    next_row: Option<usize>,
    tick: i32,
    speed: i32,
    pl_count: i32,
    pl_channel: Option<usize>,
    random_seed: u32,
    speed_zero: bool,
}

impl Sequencer {
    fn new(channel_count: usize) -> Self {
        let four_channel = channel_count == 4;
        let mut sequencer = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            c2_rate: if four_channel { 8287 } else { 8363 },
            gain: if four_channel { 64 } else { 32 },
            tempo: DEFAULT_TEMPO,
            tick_len: 0,
            tick_offset: 0,
            position: 0,
            break_pattern: None,
            row: 0,
            next_row: None,
            tick: 0,
            speed: DEFAULT_SPEED,
            pl_count: -1,
            pl_channel: None,
            random_seed: 0xABCDEF,
            speed_zero: false,
        };
        sequencer.set_tempo(DEFAULT_TEMPO);
        sequencer
    }

    fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo;
        // 2.5 * sample_rate / tempo frames per tick
        self.tick_len = (((self.sample_rate << 1) + (self.sample_rate >> 1)) / tempo).max(1) as usize;
    }

    fn update_frequency(&self, chan: &mut Channel) {
        let period = chan.period + chan.vibrato_add;
        let period = period * ARP_TUNING[chan.arpeggio_add & 0xF] as i32 >> 11;
        let mut period = (period >> 1) + (period & 1);
        if period < 14 {
            period = 6848;
        }
        let freq = self.c2_rate as u64 * 428 / period as u64;
        chan.step = (freq << FP_SHIFT) / self.sample_rate as u64;

        let volume = (chan.volume + chan.tremolo_add).clamp(0, 64);
        chan.ampl = (volume * self.gain) >> 5;
    }

    fn waveform(&mut self, phase: u8, kind: u8) -> i32 {
        let phase = phase as i32;
        match kind & 0x3 {
            0 => {
                let amplitude = SINE_TABLE[(phase & 0x1F) as usize] as i32;
                if phase & 0x20 != 0 {
                    -amplitude
                } else {
                    amplitude
                }
            }
            1 => 255 - (((phase + 0x20) & 0x3F) << 3),
            2 => 255 - ((phase & 0x20) << 4),
            _ => {
                let amplitude = (self.random_seed >> 20) as i32 - 255;
                self.random_seed = (self.random_seed.wrapping_mul(65).wrapping_add(17)) & 0x1FFF_FFFF;
                amplitude
            }
        }
    }

    fn vibrato(&mut self, chan: &mut Channel) {
        chan.vibrato_add =
            self.waveform(chan.vibrato_phase, chan.vibrato_type) * chan.vibrato_depth as i32 >> 7;
    }

    fn tremolo(&mut self, chan: &mut Channel) {
        chan.tremolo_add =
            self.waveform(chan.tremolo_phase, chan.tremolo_type) * chan.tremolo_depth as i32 >> 6;
    }

    fn trigger(&self, chan: &mut Channel, module: &Module) {
        let ins = chan.note.instrument as usize;
        if (1..=31).contains(&ins) {
            let instrument = module.instrument(ins);
            chan.assigned = ins;
            chan.sample_offset = 0;
            chan.fine_tune = instrument.fine_tune;
            chan.volume = instrument.volume as i32;
            if instrument.is_looped() && chan.instrument > 0 {
                chan.instrument = ins;
            }
        }
        match chan.note.effect {
            0x09 => chan.sample_offset = (chan.note.param as usize) << 8,
            0x15 => chan.fine_tune = chan.note.param,
            _ => {}
        }
        if chan.note.key > 0 {
            let period = (chan.note.key as i32 * FINE_TUNING[(chan.fine_tune & 0xF) as usize] as i32) >> 11;
            chan.porta_period = (period >> 1) + (period & 1);
            if chan.note.effect != 0x3 && chan.note.effect != 0x5 {
                chan.instrument = chan.assigned;
                chan.period = chan.porta_period;
                chan.restart_sample();
                if chan.vibrato_type < 4 {
                    chan.vibrato_phase = 0;
                }
                if chan.tremolo_type < 4 {
                    chan.tremolo_phase = 0;
                }
            }
        }
    }

    fn tone_portamento(chan: &mut Channel) {
        if chan.period < chan.porta_period {
            chan.period = (chan.period + chan.porta_speed).min(chan.porta_period);
        } else if chan.period > chan.porta_period {
            chan.period = (chan.period - chan.porta_speed).max(chan.porta_period);
        }
    }

    fn volume_slide(chan: &mut Channel, param: u8) {
        let volume = chan.volume + (param >> 4) as i32 - (param & 0xF) as i32;
        chan.volume = volume.clamp(0, 64);
    }

    fn channel_row(&mut self, chan: &mut Channel, module: &Module) {
        let effect = chan.note.effect;
        let param = chan.note.param;
        chan.vibrato_add = 0;
        chan.tremolo_add = 0;
        chan.arpeggio_add = 0;
        chan.fx_count = 0;

        // Note delay triggers on a later tick.
        if !(effect == 0x1D && param > 0) {
            self.trigger(chan, module);
        }

        match effect {
            0x3 => {
                if param > 0 {
                    chan.porta_speed = param as i32;
                }
            }
            0x4 => {
                if param & 0xF0 > 0 {
                    chan.vibrato_speed = param >> 4;
                }
                if param & 0x0F > 0 {
                    chan.vibrato_depth = param & 0xF;
                }
                self.vibrato(chan);
            }
            0x6 => self.vibrato(chan),
            0x7 => {
                if param & 0xF0 > 0 {
                    chan.tremolo_speed = param >> 4;
                }
                if param & 0x0F > 0 {
                    chan.tremolo_depth = param & 0xF;
                }
                self.tremolo(chan);
            }
            0x8 => {
                if module.channels() != 4 {
                    chan.panning = param.min(127) as i32;
                }
            }
            0xB => {
                if self.pl_count < 0 {
                    self.break_pattern = Some(param as usize);
                    self.next_row = Some(0);
                }
            }
            0xC => chan.volume = param.min(64) as i32,
            0xD => {
                if self.pl_count < 0 {
                    if self.break_pattern.is_none() {
                        self.break_pattern = Some(self.position + 1);
                    }
                    let row = ((param >> 4) * 10 + (param & 0xF)) as usize;
                    self.next_row = Some(if row >= ROWS_PER_PATTERN { 0 } else { row });
                }
            }
            0xF => {
                if param == 0 {
                    self.speed_zero = true;
                } else if param < 32 {
                    self.speed = param as i32;
                    self.tick = self.speed;
                } else {
                    self.set_tempo(param as u32);
                }
            }
            0x11 => chan.slide_period(-(param as i32)),
            0x12 => chan.slide_period(param as i32),
            0x14 => {
                if param < 8 {
                    chan.vibrato_type = param;
                }
            }
            0x16 => {
                if param == 0 {
                    chan.pl_row = self.row;
                }
                if chan.pl_row < self.row && self.break_pattern.is_none() {
                    if self.pl_count < 0 {
                        self.pl_count = param as i32;
                        self.pl_channel = Some(chan.id);
                    }
                    if self.pl_channel == Some(chan.id) {
                        if self.pl_count == 0 {
                            chan.pl_row = self.row + 1;
                        } else {
                            self.next_row = Some(chan.pl_row);
                        }
                        self.pl_count -= 1;
                    }
                }
            }
            0x17 => {
                if param < 8 {
                    chan.tremolo_type = param;
                }
            }
            0x1A => chan.volume = (chan.volume + param as i32).min(64),
            0x1B => chan.volume = (chan.volume - param as i32).max(0),
            0x1C => {
                if param == 0 {
                    chan.volume = 0;
                }
            }
            0x1E => self.tick = self.speed + self.speed * param as i32,
            _ => {}
        }
        self.update_frequency(chan);
    }

    fn channel_tick(&mut self, chan: &mut Channel, module: &Module) {
        let effect = chan.note.effect;
        let param = chan.note.param;
        chan.fx_count = chan.fx_count.wrapping_add(1);

        match effect {
            0x1 => chan.slide_period(-(param as i32)),
            0x2 => chan.slide_period(param as i32),
            0x3 => Self::tone_portamento(chan),
            0x4 => {
                chan.vibrato_phase = chan.vibrato_phase.wrapping_add(chan.vibrato_speed);
                self.vibrato(chan);
            }
            0x5 => {
                Self::tone_portamento(chan);
                Self::volume_slide(chan, param);
            }
            0x6 => {
                chan.vibrato_phase = chan.vibrato_phase.wrapping_add(chan.vibrato_speed);
                self.vibrato(chan);
                Self::volume_slide(chan, param);
            }
            0x7 => {
                chan.tremolo_phase = chan.tremolo_phase.wrapping_add(chan.tremolo_speed);
                self.tremolo(chan);
            }
            0xA => Self::volume_slide(chan, param),
            0xE => {
                if chan.fx_count > 2 {
                    chan.fx_count = 0;
                }
                chan.arpeggio_add = match chan.fx_count {
                    1 => (param >> 4) as usize,
                    2 => (param & 0xF) as usize,
                    _ => 0,
                };
            }
            0x19 => {
                if chan.fx_count >= param {
                    chan.fx_count = 0;
                    chan.sample_pos = 0;
                }
            }
            0x1C => {
                if param == chan.fx_count {
                    chan.volume = 0;
                }
            }
            0x1D => {
                if param == chan.fx_count {
                    self.trigger(chan, module);
                }
            }
            _ => {}
        }
        if effect > 0 {
            self.update_frequency(chan);
        }
    }

    /// Advance to the next row. Returns true when playback jumped back to an
    /// earlier (or the same) order position.
    fn sequence_row(&mut self, channels: &mut [Channel], module: &Module) -> bool {
        let mut song_end = false;

        if self.next_row.is_none() {
            self.break_pattern = Some(self.position + 1);
            self.next_row = Some(0);
        }
        if let Some(mut target) = self.break_pattern.take() {
            if target >= module.song_length() {
                target = 0;
                self.next_row = Some(0);
            }
            if target <= self.position {
                song_end = true;
            }
            self.position = target;
            for chan in channels.iter_mut() {
                chan.pl_row = 0;
            }
        }

        self.row = self.next_row.unwrap_or(0);
        self.next_row = (self.row + 1 < ROWS_PER_PATTERN).then_some(self.row + 1);

        let pattern = module.pattern_at(self.position);
        for (index, chan) in channels.iter_mut().enumerate() {
            chan.note = module.note(pattern, self.row, index);
            self.channel_row(chan, module);
        }
        song_end
    }

    fn sequence_tick(&mut self, channels: &mut [Channel], module: &Module) -> bool {
        self.tick -= 1;
        if self.tick <= 0 {
            self.tick = self.speed;
            self.sequence_row(channels, module)
        } else {
            for chan in channels.iter_mut() {
                self.channel_tick(chan, module);
            }
            false
        }
    }
}

/// Render session for one loaded module.
pub struct ModRenderer {
    module: Module,
    interpolation: Interpolation,
    channels: Vec<Channel>,
    sequencer: Sequencer,
    /// Stereo mix accumulator, reused across calls.
    mix: Vec<f32>,
    halted: bool,
}

impl ModRenderer {
    /// Start rendering `module` from order `position` (out-of-range positions
    /// start from the beginning).
    pub fn new(module: Module, interpolation: Interpolation, position: usize) -> Self {
        let channel_count = module.channels();
        let mut renderer = Self {
            channels: (0..channel_count).map(Channel::new).collect(),
            sequencer: Sequencer::new(channel_count),
            module,
            interpolation,
            mix: Vec::new(),
            halted: false,
        };
        renderer.set_position(position);
        renderer
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Current order position.
    pub fn position(&self) -> usize {
        self.sequencer.position
    }

    /// True once a speed-zero command stopped playback.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn set_position(&mut self, position: usize) {
        let position = if position >= self.module.song_length() {
            0
        } else {
            position
        };

        let seq = &mut self.sequencer;
        seq.break_pattern = Some(position);
        seq.next_row = Some(0);
        seq.tick = 1;
        seq.speed = DEFAULT_SPEED;
        seq.set_tempo(DEFAULT_TEMPO);
        seq.pl_count = -1;
        seq.pl_channel = None;
        seq.random_seed = 0xABCDEF;
        seq.speed_zero = false;
        for (id, chan) in self.channels.iter_mut().enumerate() {
            *chan = Channel::new(id);
        }

        // Starting position is not a loop.
        seq.sequence_tick(&mut self.channels, &self.module);
        seq.tick_offset = 0;
        self.halted = seq.speed_zero;
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        debug!("Renderer sample rate {} -> {}", self.sequencer.sample_rate, sample_rate);
        self.sequencer.sample_rate = sample_rate.max(1);
        let tempo = self.sequencer.tempo;
        self.sequencer.set_tempo(tempo);
        self.sequencer.tick_offset = self.sequencer.tick_offset.min(self.sequencer.tick_len - 1);
        for chan in self.channels.iter_mut() {
            self.sequencer.update_frequency(chan);
        }
    }
}

impl ModuleSource for ModRenderer {
    fn mixed_channels(&self) -> usize {
        self.module.channels()
    }

    fn render(
        &mut self,
        request: &RenderRequest,
        out: &mut [i16],
        events: &mut dyn FnMut(ModuleEvent),
    ) -> usize {
        if self.halted {
            return 0;
        }

        let sample_rate = request.delta.output_rate();
        if sample_rate != self.sequencer.sample_rate {
            self.set_sample_rate(sample_rate);
        }

        let frames = request.frame_count;
        self.mix.clear();
        self.mix.resize(frames * 2, 0.0);

        let mut offset = 0;
        while offset < frames {
            let seq = &mut self.sequencer;
            let remain = (seq.tick_len - seq.tick_offset).min(frames - offset);
            let span = &mut self.mix[offset * 2..(offset + remain) * 2];
            for chan in self.channels.iter_mut() {
                let instrument = self.module.instrument(chan.instrument);
                chan.mix_into(instrument, span, self.interpolation);
            }
            seq.tick_offset += remain;
            offset += remain;

            if seq.tick_offset == seq.tick_len {
                seq.tick_offset = 0;
                if seq.sequence_tick(&mut self.channels, &self.module) {
                    trace!("Loop at order {}", seq.position);
                    events(ModuleEvent::Loop);
                }
                if seq.speed_zero {
                    trace!("Speed zero at order {} row {}", seq.position, seq.row);
                    events(ModuleEvent::SpeedZero);
                    self.halted = true;
                    break;
                }
            }
        }

        let volume = request.volume;
        let produced = offset;
        match request.layout {
            ChannelLayout::Stereo => {
                for (frame, mixed) in out[..produced * 2]
                    .chunks_exact_mut(2)
                    .zip(self.mix.chunks_exact(2))
                {
                    frame[0] = to_i16(mixed[0] * volume);
                    frame[1] = to_i16(mixed[1] * volume);
                }
            }
            ChannelLayout::Mono => {
                for (sample, mixed) in out[..produced].iter_mut().zip(self.mix.chunks_exact(2)) {
                    *sample = to_i16((mixed[0] + mixed[1]) * 0.5 * volume);
                }
            }
        }
        produced
    }
}

impl Drop for ModRenderer {
    fn drop(&mut self) {
        debug!("Render session ended for '{}'", self.module.title());
    }
}

fn to_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
