//! # modplay
//!
//! Streaming playback engine for tracker modules: a block render pipeline
//! with loop and fade handling, a live-device sink and a WAV file sink, and
//! the transport controller that drives them.
//!
//! The module decoder is reached only through the `ModuleSource` contract in
//! `modplay-common`; `modplay-tracker` provides the bundled implementation.

pub mod config;
pub mod error;
pub mod playback;
pub mod sink;
pub mod transport;

use modplay_common::ModuleSource;
use std::path::Path;
use tracing::info;

pub use config::{PlaybackOverrides, PlaybackSettings};
pub use error::{Error, Result};
pub use playback::{PipelineBuilder, PlaybackState, RenderPipeline, RenderResult};
pub use sink::{FileWriter, LiveDevice, Sink, SinkReport};
pub use transport::{CancelToken, SessionReport, TransportController, TransportState};

/// Open `path` as a Module Source with the configured interpolation and
/// start position.
///
/// # Errors
/// `Error::Load` naming the path when the file cannot be read or is not a
/// supported module.
pub fn load_module(path: &Path, settings: &PlaybackSettings) -> Result<Box<dyn ModuleSource>> {
    let source = modplay_tracker::open(path, settings.interpolation, settings.start).map_err(
        |e| Error::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    )?;
    info!(
        "Loaded {} ({} channels)",
        path.display(),
        source.mixed_channels()
    );
    Ok(Box::new(source))
}

/// Load `path` and play it to the configured sink: the WAV file named by
/// `settings.output`, or the audio device otherwise.
pub fn play(path: &Path, settings: &PlaybackSettings, cancel: CancelToken) -> Result<SessionReport> {
    let source = load_module(path, settings)?;
    let pipeline = PipelineBuilder::from_settings(source, settings);
    let mut controller = TransportController::new(cancel);

    match &settings.output {
        Some(output) => {
            let mut sink = FileWriter::create(output);
            controller.run(&mut sink, pipeline)
        }
        None => {
            let mut sink = LiveDevice::new(settings.device.clone());
            controller.run(&mut sink, pipeline)
        }
    }
}
