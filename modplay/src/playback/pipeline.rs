//! Render pipeline
//!
//! Pulls fixed-size blocks from the Module Source at the current volume and
//! delta, routes the events raised during each block into the playback
//! state, and applies fade decay after the block. No allocation and no
//! wall-clock dependency per call: identical block cadence yields identical
//! samples.

use super::state::PlaybackState;
use crate::config::PlaybackSettings;
use modplay_common::{ChannelLayout, ModuleSource, RenderRequest, ResamplerDelta};

/// Outcome of one `render_block` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderResult {
    pub frames_produced: usize,
    /// True when fewer frames than requested were produced or the volume
    /// reached zero.
    pub is_finished: bool,
}

/// Everything needed to build a pipeline except the output sample rate,
/// which only the sink knows.
pub struct PipelineBuilder {
    source: Box<dyn ModuleSource>,
    layout: ChannelLayout,
    volume: f32,
    loops: i32,
    fadeout: f32,
}

impl PipelineBuilder {
    /// Builder with compiled defaults: full volume, one loop, no fadeout.
    pub fn new(source: Box<dyn ModuleSource>, layout: ChannelLayout) -> Self {
        Self {
            source,
            layout,
            volume: 1.0,
            loops: 1,
            fadeout: 0.0,
        }
    }

    pub fn from_settings(source: Box<dyn ModuleSource>, settings: &PlaybackSettings) -> Self {
        Self::new(source, settings.layout)
            .volume(settings.volume)
            .loops(settings.loops)
            .fadeout(settings.fadeout)
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn loops(mut self, loops: i32) -> Self {
        self.loops = loops;
        self
    }

    pub fn fadeout(mut self, seconds: f32) -> Self {
        self.fadeout = seconds;
        self
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Build the pipeline for an output running at `sample_rate` Hz.
    pub fn build(self, sample_rate: u32) -> RenderPipeline {
        let state = PlaybackState::new(self.volume, self.loops, self.fadeout, sample_rate);
        RenderPipeline {
            delta: ResamplerDelta::from_sample_rate(state.sample_rate()),
            source: self.source,
            layout: self.layout,
            state,
            finished: false,
        }
    }
}

/// Produces blocks of interleaved 16-bit PCM until playback finishes.
pub struct RenderPipeline {
    source: Box<dyn ModuleSource>,
    state: PlaybackState,
    layout: ChannelLayout,
    delta: ResamplerDelta,
    finished: bool,
}

impl RenderPipeline {
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.sample_rate()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fill `out` with the next block.
    ///
    /// `out.len() / channels` frames are requested. Frames the source does
    /// not produce are zeroed. Once a block has reported `is_finished`,
    /// every later call returns silence without touching the source.
    pub fn render_block(&mut self, out: &mut [i16]) -> RenderResult {
        let channels = self.layout.count();
        let frame_count = out.len() / channels;

        if self.finished || frame_count == 0 {
            out.fill(0);
            return RenderResult {
                frames_produced: 0,
                is_finished: self.finished,
            };
        }

        let request = RenderRequest {
            frame_count,
            layout: self.layout,
            volume: self.state.volume(),
            delta: self.delta,
        };

        let state = &mut self.state;
        let produced = self
            .source
            .render(&request, &mut out[..request.sample_count()], &mut |event| {
                state.handle_event(event)
            })
            .min(frame_count);
        out[produced * channels..].fill(0);

        if self.state.should_fade() {
            self.state.apply_fade_or_stop(frame_count);
        }

        self.finished = produced < frame_count || self.state.is_finished();
        RenderResult {
            frames_produced: produced,
            is_finished: self.finished,
        }
    }
}
