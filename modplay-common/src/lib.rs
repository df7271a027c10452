//! # modplay Common Library
//!
//! Shared code for the modplay crates including:
//! - The Module Source contract (`ModuleSource`, `ModuleEvent`, `RenderRequest`)
//! - Channel layout, interpolation and resampler delta types
//! - Configuration defaults loading
//! - Common error type

pub mod config;
pub mod error;
pub mod source;

pub use error::{Error, Result};
pub use source::{
    ChannelLayout, Interpolation, ModuleEvent, ModuleSource, RenderRequest, ResamplerDelta,
};
