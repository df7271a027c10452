//! Playback progress, loop and fade state
//!
//! Owned by the render pipeline and mutated once per rendered block, plus
//! from the event handler while a block is being rendered.

use modplay_common::ModuleEvent;

/// Volume, loop budget and fade progress of one playback session.
///
/// `volume` never goes below zero. Once it reaches zero, playback is
/// finished.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    volume: f32,
    initial_volume: f32,
    loops_remaining: i32,
    fadeout_seconds: f32,
    sample_rate: u32,
    loop_seen: bool,
    terminated: bool,
}

impl PlaybackState {
    /// # Arguments
    /// - `volume`: initial volume (> 0)
    /// - `loops`: loop boundaries to play through before fading
    /// - `fadeout_seconds`: fade length (0 = stop immediately)
    /// - `sample_rate`: output rate the fade is timed against
    pub fn new(volume: f32, loops: i32, fadeout_seconds: f32, sample_rate: u32) -> Self {
        Self {
            volume,
            initial_volume: volume,
            loops_remaining: loops,
            fadeout_seconds,
            sample_rate: sample_rate.max(1),
            loop_seen: false,
            terminated: false,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loops_remaining(&self) -> i32 {
        self.loops_remaining
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// True once the module reported speed zero.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Route an event raised by the Module Source.
    pub fn handle_event(&mut self, event: ModuleEvent) {
        match event {
            ModuleEvent::Loop => self.on_loop(),
            ModuleEvent::SpeedZero => self.on_speed_zero(),
        }
    }

    /// The module passed a loop boundary.
    pub fn on_loop(&mut self) {
        self.loops_remaining = self.loops_remaining.saturating_sub(1);
        self.loop_seen = true;
        if self.fadeout_seconds == 0.0 && self.loops_remaining <= 0 {
            self.volume = 0.0;
        }
    }

    /// The module can no longer advance.
    pub fn on_speed_zero(&mut self) {
        self.volume = 0.0;
        self.terminated = true;
    }

    /// True once the loop budget is spent.
    ///
    /// With a fadeout the budget is only spent at a loop boundary, so a
    /// session configured with zero loops still plays up to the first loop
    /// before fading.
    pub fn should_fade(&self) -> bool {
        self.loops_remaining <= 0 && (self.loop_seen || self.fadeout_seconds == 0.0)
    }

    /// Decay the volume for `frames_rendered` frames of fade, or stop at once
    /// when no fadeout is configured.
    pub fn apply_fade_or_stop(&mut self, frames_rendered: usize) {
        if self.fadeout_seconds > 0.0 {
            let step = self.initial_volume * frames_rendered as f32
                / self.sample_rate as f32
                / self.fadeout_seconds;
            self.volume = (self.volume - step).max(0.0);
        } else {
            self.volume = 0.0;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.volume <= 0.0
    }
}
