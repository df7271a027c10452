//! Playback core: loop/fade state and the block render pipeline

pub mod pipeline;
pub mod state;

pub use pipeline::{PipelineBuilder, RenderPipeline, RenderResult};
pub use state::PlaybackState;
