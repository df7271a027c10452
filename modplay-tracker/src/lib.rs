//! # modplay Tracker Module Source
//!
//! Loads ProTracker-family MOD files (31 instruments, 4 to 32 channels) and
//! renders them as 16-bit PCM through the `ModuleSource` contract.
//!
//! Loop and speed-zero conditions are reported as `ModuleEvent`s from
//! `render`, in the order they occur within the block.

pub mod error;
pub mod module;
pub mod renderer;

mod channel;
mod tables;

use modplay_common::Interpolation;
use std::path::Path;
use tracing::debug;

pub use error::LoadError;
pub use module::{Instrument, Module, Note};
pub use renderer::ModRenderer;

/// Load a module from `path` and start a renderer at order `position`.
pub fn open(
    path: &Path,
    interpolation: Interpolation,
    position: usize,
) -> Result<ModRenderer, LoadError> {
    let module = Module::load(path)?;
    debug!(
        "Loaded '{}': {} channels, {} orders, interpolation={}",
        module.title(),
        module.channels(),
        module.song_length(),
        interpolation
    );
    Ok(ModRenderer::new(module, interpolation, position))
}
